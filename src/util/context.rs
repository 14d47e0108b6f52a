//! Global context for keel operations.
//!
//! Provides centralized access to the working directory, configuration
//! locations and the loaded user configuration.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};

use crate::core::workspace::find_manifest_in;
use crate::util::config::{global_config_dir, load_config, project_config_path, Config};
use crate::util::diagnostic::suggestions;

/// Global context containing configuration and paths.
#[derive(Debug, Clone)]
pub struct GlobalContext {
    /// Current working directory
    cwd: PathBuf,

    /// Directory holding the global config file, if the platform has one
    config_dir: Option<PathBuf>,
}

impl GlobalContext {
    /// Create a new GlobalContext rooted at the process working directory.
    pub fn new() -> Result<Self> {
        let cwd = std::env::current_dir().context("failed to get current directory")?;
        Ok(Self::with_cwd(cwd))
    }

    /// Create a GlobalContext with a specific working directory.
    pub fn with_cwd(cwd: PathBuf) -> Self {
        GlobalContext {
            cwd,
            config_dir: global_config_dir(),
        }
    }

    /// Override the global config directory.
    #[cfg(test)]
    pub fn with_config_dir(mut self, dir: Option<PathBuf>) -> Self {
        self.config_dir = dir;
        self
    }

    /// Get the current working directory.
    pub fn cwd(&self) -> &Path {
        &self.cwd
    }

    /// Get the global configuration file path.
    pub fn config_path(&self) -> Option<PathBuf> {
        self.config_dir.as_ref().map(|d| d.join("config.toml"))
    }

    /// Load global and project configuration for a project root.
    pub fn load_config(&self, project_root: &Path) -> Config {
        load_config(
            self.config_path().as_deref(),
            &project_config_path(project_root),
        )
    }

    /// Find `Keel.toml` starting from cwd and searching upward.
    pub fn find_manifest(&self) -> Result<PathBuf> {
        let mut current = self.cwd.clone();
        loop {
            if let Some(path) = find_manifest_in(&current) {
                return Ok(path);
            }
            if !current.pop() {
                bail!(
                    "could not find Keel.toml in `{}` or any parent directory\n{}",
                    self.cwd.display(),
                    suggestions::NO_MANIFEST
                );
            }
        }
    }
}
