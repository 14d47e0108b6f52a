//! Interface definition files.

use std::path::{Path, PathBuf};

use anyhow::{bail, Result};
use serde::Serialize;

/// File extension of interface definition files.
pub const INTERFACE_EXTENSION: &str = "if";

/// One `.if` interface definition file.
///
/// Immutable once constructed. The generator parses the contents; keel
/// only needs where the file lives and what it is called.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct InterfaceDefinition {
    path: PathBuf,
    base_name: String,
    dir: PathBuf,
    includes: Vec<String>,
}

impl InterfaceDefinition {
    /// Create a definition for the file at `path`.
    pub fn new(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();

        if path.extension().and_then(|e| e.to_str()) != Some(INTERFACE_EXTENSION) {
            bail!(
                "`{}` is not an interface definition (expected a .{} file)",
                path.display(),
                INTERFACE_EXTENSION
            );
        }

        let base_name = match path.file_stem().and_then(|s| s.to_str()) {
            Some(stem) if !stem.is_empty() => stem.to_string(),
            _ => bail!("interface file `{}` has no usable name", path.display()),
        };

        let dir = path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));

        Ok(InterfaceDefinition {
            path,
            base_name,
            dir,
            includes: Vec::new(),
        })
    }

    /// Attach the include entries declared for this interface.
    pub fn with_includes(mut self, includes: Vec<String>) -> Self {
        self.includes = includes;
        self
    }

    /// Path to the `.if` file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// File stem, e.g. `net_v1` for `net_v1.if`.
    pub fn base_name(&self) -> &str {
        &self.base_name
    }

    /// Directory containing the file.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Include entries declared for this interface.
    pub fn includes(&self) -> &[String] {
        &self.includes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interface_attributes() {
        let def = InterfaceDefinition::new("/src/modules/net/net_v1.if").unwrap();

        assert_eq!(def.base_name(), "net_v1");
        assert_eq!(def.dir(), Path::new("/src/modules/net"));
        assert!(def.includes().is_empty());
    }

    #[test]
    fn test_rejects_other_extensions() {
        let err = InterfaceDefinition::new("/src/net.cpp").unwrap_err();
        assert!(err.to_string().contains("not an interface definition"));
    }

    #[test]
    fn test_with_includes() {
        let def = InterfaceDefinition::new("foo_v1.if")
            .unwrap()
            .with_includes(vec!["#interfaces".to_string()]);

        assert_eq!(def.includes(), ["#interfaces".to_string()]);
        assert_eq!(def.dir(), Path::new(""));
    }
}
