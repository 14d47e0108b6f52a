//! Component build profiles.
//!
//! A profile fixes the target architecture and platform plus the tool
//! bindings used for every component in one invocation. Profiles are
//! declared in `Keel.toml`:
//!
//! ```toml
//! [profiles.embedded]
//! arch = "x86"
//! platform = "pc99"
//! cxx = "i686-elf-g++"
//! ld = "i686-elf-ld"
//! nm = "i686-elf-nm"
//! allowed_undefined = ["__cxa_*"]
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Platform name for components linked into a host process.
pub const HOSTED_PLATFORM: &str = "hosted";

/// Linker script used for non-hosted components when the profile names none.
pub const DEFAULT_COMPONENT_SCRIPT: &str = "component.lds";

/// Architecture/platform selection and environment bindings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ComponentProfile {
    #[serde(skip_deserializing)]
    pub name: String,
    pub arch: String,
    pub platform: String,
    pub cc: PathBuf,
    pub cxx: PathBuf,
    pub ld: PathBuf,
    pub nm: PathBuf,
    pub cflags: Vec<String>,
    pub cxxflags: Vec<String>,
    pub ldflags: Vec<String>,
    /// `NAME` or `NAME=VALUE`
    pub defines: Vec<String>,
    /// Glob patterns of undefined symbols a component may keep
    pub allowed_undefined: Vec<String>,
    /// Component linker script, relative to the project root
    pub linker_script: Option<PathBuf>,
    /// Append the architecture default include dirs
    pub include_defaults: bool,
}

impl Default for ComponentProfile {
    fn default() -> Self {
        ComponentProfile {
            name: "default".to_string(),
            arch: "x86".to_string(),
            platform: HOSTED_PLATFORM.to_string(),
            cc: PathBuf::from("cc"),
            cxx: PathBuf::from("c++"),
            ld: PathBuf::from("ld"),
            nm: PathBuf::from("nm"),
            cflags: Vec::new(),
            cxxflags: Vec::new(),
            ldflags: Vec::new(),
            defines: Vec::new(),
            allowed_undefined: Vec::new(),
            linker_script: None,
            include_defaults: true,
        }
    }
}

impl ComponentProfile {
    pub fn is_hosted(&self) -> bool {
        self.platform == HOSTED_PLATFORM
    }

    /// Apply command line overrides.
    pub fn with_overrides(mut self, arch: Option<&str>, platform: Option<&str>) -> Self {
        if let Some(arch) = arch {
            self.arch = arch.to_string();
        }
        if let Some(platform) = platform {
            self.platform = platform.to_string();
        }
        self
    }

    /// Architecture default include dirs, most specific first, relative to
    /// the project root.
    pub fn default_include_dirs(&self) -> [PathBuf; 4] {
        let arch = Path::new("arch").join(&self.arch);
        [
            arch.join(&self.platform),
            arch.join("shared"),
            arch,
            Path::new("arch").join("shared"),
        ]
    }

    /// Linker script path relative to the project root.
    pub fn component_script(&self) -> PathBuf {
        self.linker_script
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_COMPONENT_SCRIPT))
    }

    /// Defines split into name and optional value.
    pub fn parsed_defines(&self) -> Vec<(String, Option<String>)> {
        self.defines
            .iter()
            .map(|d| match d.split_once('=') {
                Some((name, value)) => (name.to_string(), Some(value.to_string())),
                None => (d.clone(), None),
            })
            .collect()
    }

    /// Whether an undefined `symbol` is on the allow-list.
    pub fn symbol_allowed(&self, symbol: &str) -> bool {
        self.allowed_undefined
            .iter()
            .any(|pattern| match glob::Pattern::new(pattern) {
                Ok(p) => p.matches(symbol),
                Err(_) => pattern == symbol,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_include_dirs_order() {
        let profile = ComponentProfile {
            arch: "x86".to_string(),
            platform: "pc99".to_string(),
            ..Default::default()
        };

        assert_eq!(
            profile.default_include_dirs(),
            [
                PathBuf::from("arch/x86/pc99"),
                PathBuf::from("arch/x86/shared"),
                PathBuf::from("arch/x86"),
                PathBuf::from("arch/shared"),
            ]
        );
    }

    #[test]
    fn test_overrides() {
        let profile = ComponentProfile::default().with_overrides(Some("arm"), Some("rpi"));
        assert_eq!(profile.arch, "arm");
        assert_eq!(profile.platform, "rpi");
        assert!(!profile.is_hosted());
    }

    #[test]
    fn test_symbol_allow_list_globs() {
        let profile = ComponentProfile {
            allowed_undefined: vec!["__cxa_*".to_string(), "memcpy".to_string()],
            ..Default::default()
        };

        assert!(profile.symbol_allowed("__cxa_pure_virtual"));
        assert!(profile.symbol_allowed("memcpy"));
        assert!(!profile.symbol_allowed("malloc"));
    }

    #[test]
    fn test_parsed_defines() {
        let profile = ComponentProfile {
            defines: vec!["KERNEL".to_string(), "ARCH=x86".to_string()],
            ..Default::default()
        };

        assert_eq!(
            profile.parsed_defines(),
            vec![
                ("KERNEL".to_string(), None),
                ("ARCH".to_string(), Some("x86".to_string())),
            ]
        );
    }

    #[test]
    fn test_component_script_default() {
        assert_eq!(
            ComponentProfile::default().component_script(),
            PathBuf::from(DEFAULT_COMPONENT_SCRIPT)
        );
    }
}
