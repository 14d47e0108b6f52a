//! `keel build` command

use std::path::PathBuf;

use anyhow::{bail, Result};

use crate::cli::BuildArgs;
use keel::builder::MessageFormat;
use keel::ops::build;
use keel::util::diagnostic;

pub fn execute(args: BuildArgs, manifest_path: Option<PathBuf>, color: bool) -> Result<()> {
    let (ws, config) = super::load(manifest_path)?;

    let message_format = args
        .message_format
        .as_deref()
        .map(str::parse::<MessageFormat>)
        .transpose()?;

    let opts = keel::ops::BuildOptions {
        jobs: args.jobs,
        message_format,
        verbose_generator: args.verbose_generator,
        image: args.image,
        ..args.selection.into_options()
    };

    let result = build(&ws, &config, &opts)?;
    let report = &result.report;
    let json = message_format.or_else(|| config.message_format()) == Some(MessageFormat::Json);

    if !json {
        for component in &report.components {
            eprintln!("    Verified {} -> {}", component.name, component.output.display());
        }
        if let Some(ref image) = result.image {
            eprintln!("       Image {} component(s)", image.components.len());
        }
    }

    for failure in &report.failures {
        diagnostic::emit(&failure.error.to_diagnostic(), color);
    }

    if !report.is_success() {
        bail!(
            "build failed: {} node(s) failed, {} skipped",
            report.failures.len(),
            report.skipped.len()
        );
    }

    if !json {
        eprintln!(
            "    Finished {} component(s) in {:.2}s",
            report.components.len(),
            report.duration_ms as f64 / 1000.0
        );
    }

    Ok(())
}
