//! Assembled components and their verification verdicts.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Extension of relocatable component objects.
pub const COMPONENT_EXTENSION: &str = "comp";

/// A linked relocatable component.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Component {
    pub name: String,
    pub objects: Vec<PathBuf>,
    pub include_dirs: Vec<PathBuf>,
    pub profile: String,
    /// `<out>/<name>.comp`
    pub output: PathBuf,
    /// `<out>/<name>.map`, only for non-hosted platforms
    pub map: Option<PathBuf>,
}

impl Component {
    pub fn output(&self) -> &Path {
        &self.output
    }

    pub fn map(&self) -> Option<&Path> {
        self.map.as_deref()
    }
}

/// Outcome of the undefined symbol check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "verdict", rename_all = "snake_case")]
pub enum Verdict {
    /// No disallowed undefined symbols. `digest` is the sha256 of the
    /// object that was checked.
    Pass { digest: String },
    /// Disallowed undefined symbols, in listing order.
    Fail { symbols: Vec<String> },
}

impl Verdict {
    pub fn is_pass(&self) -> bool {
        matches!(self, Verdict::Pass { .. })
    }
}
