//! Implementation of `keel clean`.

use std::path::PathBuf;

use anyhow::Result;

use crate::core::Workspace;
use crate::util::fs::remove_dir_all_if_exists;

/// Remove the output directory. Returns the removed path, or `None` when
/// there was nothing to remove.
pub fn clean(ws: &Workspace) -> Result<Option<PathBuf>> {
    let out_dir = ws.out_dir();
    if !out_dir.exists() {
        return Ok(None);
    }

    remove_dir_all_if_exists(out_dir)?;
    tracing::debug!("removed {}", out_dir.display());
    Ok(Some(out_dir.to_path_buf()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::fixtures::ProjectFixture;

    #[test]
    fn test_clean_removes_output() {
        let fixture = ProjectFixture::new();
        let ws = fixture.workspace();
        std::fs::create_dir_all(ws.out_dir().join("modules/net")).unwrap();

        assert_eq!(clean(&ws).unwrap().as_deref(), Some(ws.out_dir()));
        assert!(!ws.out_dir().exists());
        assert_eq!(clean(&ws).unwrap(), None);
    }
}
