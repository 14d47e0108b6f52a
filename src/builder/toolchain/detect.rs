//! Host toolchain detection.
//!
//! Generator tools are built for and run on the build machine, so they use
//! the host compiler rather than the profile's cross toolchain.

use std::path::PathBuf;

use anyhow::{bail, Result};

use crate::util::config::ToolchainSettings;
use crate::util::process::find_executable;

use super::GccToolchain;

const CC_CANDIDATES: &[&str] = &["cc", "gcc", "clang"];
const CXX_CANDIDATES: &[&str] = &["c++", "g++", "clang++"];

/// Detect the host toolchain.
///
/// Each tool is taken from the `[toolchain]` config first, then from its
/// environment variable, then from PATH.
pub fn detect_host_toolchain(settings: &ToolchainSettings) -> Result<GccToolchain> {
    let cc = from_config(settings.cc.as_ref(), "cc")
        .or_else(|| from_env("CC"))
        .or_else(|| search(CC_CANDIDATES));

    let cxx = from_config(settings.cxx.as_ref(), "cxx")
        .or_else(|| from_env("CXX"))
        .or_else(|| {
            cc.as_ref()
                .and_then(|cc| find_executable(GccToolchain::infer_cxx(cc)))
        })
        .or_else(|| search(CXX_CANDIDATES));

    let (cc, cxx) = match (cc, cxx) {
        (Some(cc), Some(cxx)) => (cc, cxx),
        (Some(cc), None) => (cc.clone(), cc),
        (None, Some(cxx)) => (cxx.clone(), cxx),
        (None, None) => bail!(
            "no host C/C++ compiler found\n\
             \n\
             Generator tools are built with the host compiler.\n\
             Set CC/CXX, configure [toolchain] in .keel/config.toml, or install gcc or clang."
        ),
    };

    let ld = from_env("LD").unwrap_or_else(|| PathBuf::from("ld"));
    let nm = from_env("NM").unwrap_or_else(|| PathBuf::from("nm"));

    tracing::debug!("host toolchain: cc={}, cxx={}", cc.display(), cxx.display());

    Ok(GccToolchain::new(cc, cxx, ld, nm))
}

fn from_config(path: Option<&PathBuf>, key: &str) -> Option<PathBuf> {
    let path = path?;
    match find_executable(path) {
        Some(found) => Some(found),
        None => {
            tracing::warn!("configured {} not found: {}", key, path.display());
            None
        }
    }
}

fn from_env(var: &str) -> Option<PathBuf> {
    let value = std::env::var(var).ok()?;
    if value.trim().is_empty() {
        return None;
    }
    find_executable(value.trim())
}

fn search(candidates: &[&str]) -> Option<PathBuf> {
    candidates.iter().find_map(|name| find_executable(name))
}
