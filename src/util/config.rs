//! Configuration file support for keel.
//!
//! keel reads two configuration files:
//! - Global: `<config dir>/keel/config.toml` - User-wide defaults
//! - Project: `.keel/config.toml` next to `Keel.toml` - Project overrides
//!
//! Project config takes precedence over global config. Command line flags
//! take precedence over both.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::builder::events::MessageFormat;
use crate::util::fs::read_to_string;

/// Name of the per-project configuration directory.
pub const PROJECT_CONFIG_DIR: &str = ".keel";

/// keel configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Build settings
    pub build: BuildConfig,

    /// Host toolchain overrides (used to build generator tools)
    pub toolchain: ToolchainSettings,
}

/// Build settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildConfig {
    /// Number of parallel jobs
    pub jobs: Option<usize>,

    /// Output format ("human" or "json")
    pub message_format: Option<String>,

    /// Pass `-v` to interface generators
    pub verbose_generator: bool,

    /// Default profile when `--profile` is not given
    pub profile: Option<String>,
}

/// Host toolchain settings.
///
/// Generator tools run on the build machine, so they are compiled with the
/// host toolchain rather than the component profile's cross toolchain.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolchainSettings {
    /// Path to the host C compiler
    pub cc: Option<PathBuf>,

    /// Path to the host C++ compiler (also used as the link driver)
    pub cxx: Option<PathBuf>,
}

impl Config {
    /// Load configuration from a file.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = read_to_string(path)?;

        toml::from_str(&contents)
            .with_context(|| format!("failed to parse config file: {}", path.display()))
    }

    /// Load configuration with fallback to defaults if the file is missing
    /// or unreadable.
    pub fn load_or_default(path: &Path) -> Self {
        if path.exists() {
            Self::load(path).unwrap_or_else(|e| {
                tracing::warn!("Failed to load config from {}: {}", path.display(), e);
                Self::default()
            })
        } else {
            Self::default()
        }
    }

    /// Merge another config into this one (other takes precedence).
    pub fn merge(&mut self, other: Config) {
        if other.build.jobs.is_some() {
            self.build.jobs = other.build.jobs;
        }
        if other.build.message_format.is_some() {
            self.build.message_format = other.build.message_format;
        }
        if other.build.verbose_generator {
            self.build.verbose_generator = true;
        }
        if other.build.profile.is_some() {
            self.build.profile = other.build.profile;
        }

        if other.toolchain.cc.is_some() {
            self.toolchain.cc = other.toolchain.cc;
        }
        if other.toolchain.cxx.is_some() {
            self.toolchain.cxx = other.toolchain.cxx;
        }
    }

    /// Get the configured message format, if valid.
    pub fn message_format(&self) -> Option<MessageFormat> {
        self.build
            .message_format
            .as_ref()
            .and_then(|s| s.parse().ok())
    }
}

/// Get the global configuration directory.
pub fn global_config_dir() -> Option<PathBuf> {
    directories::ProjectDirs::from("org", "keel", "keel").map(|d| d.config_dir().to_path_buf())
}

/// Get the project configuration file path.
pub fn project_config_path(project_root: &Path) -> PathBuf {
    project_root.join(PROJECT_CONFIG_DIR).join("config.toml")
}

/// Load the global config and then the project config on top of it.
pub fn load_config(global_path: Option<&Path>, project_path: &Path) -> Config {
    let mut config = Config::default();

    if let Some(global_path) = global_path {
        config.merge(Config::load_or_default(global_path));
    }

    config.merge(Config::load_or_default(project_path));

    config
}
