//! Command implementations

pub mod build;
pub mod clean;
pub mod plan;

use std::path::PathBuf;

use anyhow::Result;

use crate::cli::SelectionArgs;
use keel::core::Workspace;
use keel::ops::BuildOptions;
use keel::util::{Config, GlobalContext};

/// Load the workspace and the merged configuration.
pub fn load(manifest_path: Option<PathBuf>) -> Result<(Workspace, Config)> {
    let ctx = GlobalContext::new()?;
    let manifest_path = match manifest_path {
        Some(path) => path,
        None => ctx.find_manifest()?,
    };

    let ws = Workspace::new(&manifest_path)?;
    let config = ctx.load_config(ws.root());
    Ok((ws, config))
}

impl SelectionArgs {
    pub fn into_options(self) -> BuildOptions {
        BuildOptions {
            profile: self.profile,
            arch: self.arch,
            platform: self.platform,
            components: self.components,
            ..Default::default()
        }
    }
}
