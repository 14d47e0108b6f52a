//! `keel plan` command

use std::path::PathBuf;

use anyhow::{Context, Result};

use crate::cli::PlanArgs;
use keel::ops::plan;

pub fn execute(args: PlanArgs, manifest_path: Option<PathBuf>) -> Result<()> {
    let (ws, config) = super::load(manifest_path)?;

    let summary = plan(&ws, &config, &args.selection.into_options())?;
    let json = serde_json::to_string_pretty(&summary).context("failed to serialize build plan")?;
    println!("{}", json);

    Ok(())
}
