//! Image manifest.
//!
//! The last step before a boot image is laid out: collect every registered
//! component and refuse unless each one has a passing verdict for the exact
//! object that is on disk now.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Serialize;

use crate::builder::registry::ComponentRegistry;
use crate::core::component::Verdict;
use crate::core::error::BuildError;
use crate::util::fs::write_string;
use crate::util::hash::sha256_file;

/// One component as listed in the image manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImageEntry {
    pub name: String,
    pub object: PathBuf,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub map: Option<PathBuf>,
    pub sha256: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ImageManifest {
    pub profile: String,
    pub components: Vec<ImageEntry>,
}

/// Collect image entries from `registry`.
///
/// Fails with [`BuildError::UnverifiedComponent`] for the first component
/// that was never verified, failed verification, or changed afterwards.
pub fn collect_image(registry: &ComponentRegistry) -> Result<Vec<ImageEntry>, BuildError> {
    let mut entries = Vec::new();

    for entry in registry.snapshot() {
        let component = entry.component;
        let refuse = |reason: String| BuildError::UnverifiedComponent {
            component: component.name.clone(),
            reason,
        };

        let digest = match entry.verdict {
            Some(Verdict::Pass { digest }) => digest,
            Some(Verdict::Fail { symbols }) => {
                return Err(refuse(format!(
                    "verification failed with undefined symbols: {}",
                    symbols.join(", ")
                )))
            }
            None => return Err(refuse("component was never verified".to_string())),
        };

        let current = sha256_file(component.output()).map_err(|e| refuse(format!("{:#}", e)))?;
        if current != digest {
            return Err(refuse(format!(
                "{} changed after it was verified",
                component.output().display()
            )));
        }

        entries.push(ImageEntry {
            name: component.name.clone(),
            object: component.output.clone(),
            map: component.map.clone(),
            sha256: digest,
        });
    }

    entries.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(entries)
}

/// Write the image manifest for `registry` to `path`.
pub fn write_image_manifest(registry: &ComponentRegistry, profile: &str, path: &Path) -> Result<ImageManifest> {
    let manifest = ImageManifest {
        profile: profile.to_string(),
        components: collect_image(registry)?,
    };

    let json = serde_json::to_string_pretty(&manifest).context("failed to serialize image manifest")?;
    write_string(path, &format!("{}\n", json))?;

    tracing::info!(
        "wrote image manifest with {} component(s) to {}",
        manifest.components.len(),
        path.display()
    );

    Ok(manifest)
}
