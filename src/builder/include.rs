//! Include directory resolution.
//!
//! Entry forms:
//! - `#dir`      anchored at the project root
//! - `/abs/dir`  used as is
//! - `dir`       relative to the consuming unit's directory
//!
//! With defaults enabled the profile's architecture directories are
//! appended after the explicit entries.

use std::path::{Component, Path, PathBuf};

use crate::core::error::BuildError;
use crate::core::profile::ComponentProfile;
use crate::core::unit::OrderedSet;
use crate::util::fs::normalize_lexically;

/// Prefix marking an entry anchored at the project root.
pub const ROOT_ANCHOR: char = '#';

/// `..` once per nesting level of `rel_dir`, leading back to the root.
pub fn root_prefix(rel_dir: &Path) -> PathBuf {
    rel_dir
        .components()
        .filter(|c| matches!(c, Component::Normal(_)))
        .map(|_| Path::new(".."))
        .collect()
}

/// Resolves include entries for one profile.
#[derive(Debug, Clone)]
pub struct IncludeSetResolver<'a> {
    root: &'a Path,
    profile: &'a ComponentProfile,
}

impl<'a> IncludeSetResolver<'a> {
    pub fn new(root: &'a Path, profile: &'a ComponentProfile) -> Self {
        IncludeSetResolver { root, profile }
    }

    /// Resolve a single entry without checking that it exists.
    ///
    /// Absolute entries are returned unchanged.
    pub fn resolve_entry(&self, base: &Path, entry: &str) -> PathBuf {
        match entry.strip_prefix(ROOT_ANCHOR) {
            Some(anchored) => normalize_lexically(&self.root.join(anchored.trim_start_matches('/'))),
            None if Path::new(entry).is_absolute() => PathBuf::from(entry),
            None => normalize_lexically(&base.join(entry)),
        }
    }

    /// Resolve the include set of `unit`.
    ///
    /// Order of first occurrence is kept and duplicates are dropped. A
    /// declared entry that does not exist is an error; default directories
    /// that do not exist are skipped.
    pub fn resolve(
        &self,
        unit: &str,
        base: &Path,
        entries: &[String],
        root_prefix: &Path,
        with_defaults: bool,
    ) -> Result<Vec<PathBuf>, BuildError> {
        let mut dirs = Vec::new();
        let mut seen = OrderedSet::new();

        for entry in entries {
            let path = self.resolve_entry(base, entry);
            if !path.is_dir() {
                return Err(BuildError::UnresolvedIncludeDir {
                    unit: unit.to_string(),
                    entry: entry.clone(),
                    path,
                });
            }
            if seen.insert(normalize_lexically(&path)) {
                dirs.push(path);
            }
        }

        if with_defaults {
            let default_base = base.join(root_prefix);
            for dir in self.profile.default_include_dirs() {
                let path = normalize_lexically(&default_base.join(&dir));
                if path.is_dir() {
                    if seen.insert(path.clone()) {
                        dirs.push(path);
                    }
                } else {
                    tracing::debug!("skipping default include dir {}", path.display());
                }
            }
        }

        Ok(dirs)
    }
}
