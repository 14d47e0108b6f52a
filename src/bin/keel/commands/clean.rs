//! `keel clean` command

use std::path::PathBuf;

use anyhow::Result;

use keel::ops::clean;

pub fn execute(manifest_path: Option<PathBuf>) -> Result<()> {
    let (ws, _) = super::load(manifest_path)?;

    if let Some(removed) = clean(&ws)? {
        eprintln!("     Removed {}", removed.display());
    }

    Ok(())
}
