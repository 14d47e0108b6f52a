//! Workspace - the project root and its manifest.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::core::manifest::Manifest;

/// Name of the manifest file.
pub const MANIFEST_NAME: &str = "Keel.toml";

/// Return the manifest path in `dir` if one exists.
pub fn find_manifest_in(dir: &Path) -> Option<PathBuf> {
    let candidate = dir.join(MANIFEST_NAME);
    candidate.is_file().then_some(candidate)
}

/// A loaded project.
#[derive(Debug, Clone)]
pub struct Workspace {
    manifest: Manifest,

    /// Canonical project root (directory containing Keel.toml)
    root: PathBuf,

    /// Build output directory
    out_dir: PathBuf,
}

impl Workspace {
    /// Load the workspace whose manifest is at `manifest_path`.
    pub fn new(manifest_path: &Path) -> Result<Self> {
        let manifest = Manifest::load(manifest_path)?;
        let parent = match manifest_path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        let root = parent
            .canonicalize()
            .with_context(|| format!("failed to resolve project root {}", parent.display()))?;

        let out_dir = root.join(&manifest.project.out_dir);

        Ok(Workspace {
            manifest,
            root,
            out_dir,
        })
    }

    pub fn manifest(&self) -> &Manifest {
        &self.manifest
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn out_dir(&self) -> &Path {
        &self.out_dir
    }

    pub fn name(&self) -> &str {
        &self.manifest.project.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_workspace_paths() {
        let tmp = TempDir::new().unwrap();
        let manifest = tmp.path().join(MANIFEST_NAME);
        std::fs::write(
            &manifest,
            "[project]\nname = \"metta\"\n[components.a]\nsources = [\"a.c\"]\n",
        )
        .unwrap();

        let ws = Workspace::new(&manifest).unwrap();
        let root = tmp.path().canonicalize().unwrap();
        assert_eq!(ws.root(), root);
        assert_eq!(ws.out_dir(), root.join("_build_"));
        assert_eq!(ws.name(), "metta");
    }

    #[test]
    fn test_find_manifest_in() {
        let tmp = TempDir::new().unwrap();
        assert!(find_manifest_in(tmp.path()).is_none());

        std::fs::write(tmp.path().join(MANIFEST_NAME), "").unwrap();
        assert_eq!(
            find_manifest_in(tmp.path()),
            Some(tmp.path().join(MANIFEST_NAME))
        );
    }
}
