//! Keel.toml manifest parsing and schema.
//!
//! ```toml
//! [project]
//! name = "metta"
//! generator = "meddler"
//! default_profile = "pc99"
//!
//! [profiles.pc99]
//! arch = "x86"
//! platform = "pc99"
//!
//! [tools.meddler]
//! dir = "tools/meddler"
//! sources = ["*.cpp"]
//!
//! [components.net]
//! dir = "modules/net"
//! sources = ["*.cpp"]
//! interfaces = ["net_v1.if"]
//! uses = ["hal"]
//! ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

use crate::core::profile::ComponentProfile;
use crate::core::registry::{
    ComponentTarget, InterfaceEntry, TargetRegistry, ToolSource, ToolTarget,
};
use crate::util::fs::read_to_string;

/// Default build output directory, relative to the project root.
pub const DEFAULT_OUT_DIR: &str = "_build_";

/// The parsed Keel.toml manifest.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Manifest {
    pub project: ProjectMetadata,

    #[serde(default)]
    pub profiles: BTreeMap<String, ComponentProfile>,

    #[serde(default)]
    pub tools: BTreeMap<String, ToolManifest>,

    #[serde(default)]
    pub components: BTreeMap<String, ComponentManifest>,
}

/// `[project]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectMetadata {
    pub name: String,

    #[serde(default = "default_out_dir")]
    pub out_dir: PathBuf,

    /// Profile used when none is selected
    #[serde(default)]
    pub default_profile: Option<String>,

    /// Generator tool for components that do not name one
    #[serde(default)]
    pub generator: Option<String>,
}

fn default_out_dir() -> PathBuf {
    PathBuf::from(DEFAULT_OUT_DIR)
}

/// `[tools.<name>]` section.
///
/// With `program` the tool is prebuilt. With `sources` it is compiled by the
/// host toolchain. With neither it is looked up on PATH by name.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolManifest {
    pub program: Option<PathBuf>,
    pub dir: Option<PathBuf>,
    pub sources: Vec<String>,
    pub includes: Vec<String>,
    pub cflags: Vec<String>,
    pub cxxflags: Vec<String>,
    pub ldflags: Vec<String>,
    pub libs: Vec<String>,
}

/// `[components.<name>]` section.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ComponentManifest {
    /// Component directory; defaults to the component name
    pub dir: Option<PathBuf>,
    pub sources: Vec<String>,
    pub interfaces: Vec<InterfaceSpec>,
    pub includes: Vec<String>,
    pub uses: Vec<String>,
    pub generator: Option<String>,
    pub defines: Vec<String>,
    pub cflags: Vec<String>,
    pub cxxflags: Vec<String>,
    pub include_defaults: Option<bool>,
}

/// An interface entry: a bare path or a table with its own includes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum InterfaceSpec {
    Path(String),
    Detailed {
        path: String,
        #[serde(default)]
        includes: Vec<String>,
    },
}

impl InterfaceSpec {
    fn to_entry(&self) -> InterfaceEntry {
        match self {
            InterfaceSpec::Path(path) => InterfaceEntry {
                path: path.clone(),
                includes: Vec::new(),
            },
            InterfaceSpec::Detailed { path, includes } => InterfaceEntry {
                path: path.clone(),
                includes: includes.clone(),
            },
        }
    }
}

impl Manifest {
    /// Load a manifest from a file.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = read_to_string(path)?;

        Self::parse(&contents)
            .with_context(|| format!("failed to parse manifest: {}", path.display()))
    }

    /// Parse manifest text.
    pub fn parse(contents: &str) -> Result<Self> {
        let mut manifest: Manifest = toml::from_str(contents)?;
        for (name, profile) in manifest.profiles.iter_mut() {
            profile.name = name.clone();
        }
        manifest.validate()?;
        Ok(manifest)
    }

    fn validate(&self) -> Result<()> {
        if self.project.name.trim().is_empty() {
            bail!("project name cannot be empty");
        }

        if let Some(ref default) = self.project.default_profile {
            if !self.profiles.contains_key(default) {
                bail!("default profile `{}` is not declared", default);
            }
        }

        for (name, tool) in &self.tools {
            if tool.program.is_some() && !tool.sources.is_empty() {
                bail!("tool `{}` sets both `program` and `sources`", name);
            }
        }

        for (name, component) in &self.components {
            if component.sources.is_empty() && component.interfaces.is_empty() {
                bail!("component `{}` has no sources or interfaces", name);
            }
        }

        Ok(())
    }

    /// Select a profile by name, falling back to `default_profile`.
    ///
    /// A manifest without profiles builds everything with the default
    /// hosted profile.
    pub fn profile(&self, name: Option<&str>) -> Result<ComponentProfile> {
        let name = name.or(self.project.default_profile.as_deref());

        match name {
            Some(name) => match self.profiles.get(name) {
                Some(profile) => Ok(profile.clone()),
                None => {
                    let available: Vec<&str> = self.profiles.keys().map(String::as_str).collect();
                    bail!(
                        "profile `{}` is not declared (available: {})",
                        name,
                        if available.is_empty() {
                            "none".to_string()
                        } else {
                            available.join(", ")
                        }
                    )
                }
            },
            None => match self.profiles.len() {
                0 => Ok(ComponentProfile::default()),
                1 => Ok(self.profiles.values().next().cloned().unwrap_or_default()),
                _ => bail!("several profiles are declared; select one with --profile"),
            },
        }
    }

    /// Build the typed registry of all declared targets.
    pub fn target_registry(&self) -> TargetRegistry {
        let mut registry = TargetRegistry::new();

        for (name, tool) in &self.tools {
            let source = match (&tool.program, tool.sources.is_empty()) {
                (Some(program), _) => ToolSource::Program(program.clone()),
                (None, true) => ToolSource::Program(PathBuf::from(name)),
                (None, false) => ToolSource::Build {
                    dir: tool.dir.clone().unwrap_or_else(|| PathBuf::from(".")),
                    sources: tool.sources.clone(),
                    includes: tool.includes.clone(),
                    cflags: tool.cflags.clone(),
                    cxxflags: tool.cxxflags.clone(),
                    ldflags: tool.ldflags.clone(),
                    libs: tool.libs.clone(),
                },
            };
            registry.add_tool(ToolTarget {
                name: name.clone(),
                source,
            });
        }

        for (name, component) in &self.components {
            registry.add_component(ComponentTarget {
                name: name.clone(),
                dir: component.dir.clone().unwrap_or_else(|| PathBuf::from(name)),
                sources: component.sources.clone(),
                interfaces: component.interfaces.iter().map(InterfaceSpec::to_entry).collect(),
                includes: component.includes.clone(),
                uses: component.uses.clone(),
                generator: component
                    .generator
                    .clone()
                    .or_else(|| self.project.generator.clone()),
                defines: component.defines.clone(),
                cflags: component.cflags.clone(),
                cxxflags: component.cxxflags.clone(),
                include_defaults: component.include_defaults,
            });
        }

        registry
    }
}
