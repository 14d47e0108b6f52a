//! Project fixtures backed by fake toolchain scripts.
//!
//! Every fixture owns a temporary directory with two children: `project/`
//! holding `Keel.toml` and the sources, and `bin/` holding the fake
//! generator, compiler, linker and symbol lister.

use std::path::{Path, PathBuf};

use tempfile::TempDir;

use crate::builder::BuildContext;
use crate::core::profile::HOSTED_PLATFORM;
use crate::core::workspace::{Workspace, MANIFEST_NAME};
use crate::ops::keel_build::{build_context, BuildOptions};
use crate::util::config::{Config, ToolchainSettings};

use super::{install_script, FAKE_CC, FAKE_GENERATOR, FAKE_LD, FAKE_NM};

/// Name of the generator tool every fixture declares.
pub const GENERATOR: &str = "meddler";

/// A throwaway project wired to the fake tools.
#[derive(Debug)]
pub struct ProjectFixture {
    tmp: TempDir,
    root: PathBuf,
    bin: PathBuf,
    platform: String,
    buildable_generator: bool,
    components: Vec<(String, String)>,
}

impl ProjectFixture {
    /// Empty hosted project with a prebuilt generator.
    pub fn new() -> Self {
        let tmp = TempDir::new().unwrap();
        let base = tmp.path().canonicalize().unwrap();
        let root = base.join("project");
        let bin = base.join("bin");
        std::fs::create_dir_all(&root).unwrap();
        std::fs::create_dir_all(&bin).unwrap();

        install_script(&bin.join(GENERATOR), FAKE_GENERATOR);
        install_script(&bin.join("cc"), FAKE_CC);
        install_script(&bin.join("cxx"), FAKE_CC);
        install_script(&bin.join("ld"), FAKE_LD);
        install_script(&bin.join("nm"), FAKE_NM);

        ProjectFixture {
            tmp,
            root,
            bin,
            platform: HOSTED_PLATFORM.to_string(),
            buildable_generator: false,
            components: Vec::new(),
        }
    }

    /// Select the profile platform. Non-hosted platforms also get a
    /// `component.lds` at the project root.
    pub fn with_platform(mut self, platform: &str) -> Self {
        self.platform = platform.to_string();
        if platform != HOSTED_PLATFORM {
            self = self.file("component.lds", "SECTIONS { .text : { *(.text*) } }\n");
        }
        self
    }

    /// Build the generator from `tools/meddler` instead of using the
    /// prebuilt one.
    pub fn with_buildable_generator(mut self) -> Self {
        self.buildable_generator = true;
        self.file("tools/meddler/main.cpp", FAKE_GENERATOR)
    }

    /// Declare `[components.<name>]` with `body` as the table contents.
    pub fn component(mut self, name: &str, body: &str) -> Self {
        self.components.push((name.to_string(), body.to_string()));
        self
    }

    /// Write a file relative to the project root.
    pub fn file(self, rel: &str, content: &str) -> Self {
        let path = self.root.join(rel);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(&path, content).unwrap();
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn bin_dir(&self) -> &Path {
        &self.bin
    }

    /// Path of the prebuilt fake generator.
    pub fn generator_path(&self) -> PathBuf {
        self.bin.join(GENERATOR)
    }

    pub fn manifest_path(&self) -> PathBuf {
        self.root.join(MANIFEST_NAME)
    }

    /// The manifest text for the current declarations.
    pub fn manifest(&self) -> String {
        let mut manifest = format!(
            r#"[project]
name = "fixture"
default_profile = "default"
generator = "{generator}"

[profiles.default]
platform = "{platform}"
cc = "{bin}/cc"
cxx = "{bin}/cxx"
ld = "{bin}/ld"
nm = "{bin}/nm"

"#,
            generator = GENERATOR,
            platform = self.platform,
            bin = self.bin.display(),
        );

        if self.buildable_generator {
            manifest.push_str(&format!(
                "[tools.{}]\ndir = \"tools/{}\"\nsources = [\"*.cpp\"]\n\n",
                GENERATOR, GENERATOR
            ));
        } else {
            manifest.push_str(&format!(
                "[tools.{}]\nprogram = \"{}\"\n\n",
                GENERATOR,
                self.generator_path().display()
            ));
        }

        for (name, body) in &self.components {
            manifest.push_str(&format!("[components.{}]\n{}\n\n", name, body));
        }

        manifest
    }

    /// Write `Keel.toml` and load the workspace.
    pub fn workspace(&self) -> Workspace {
        std::fs::write(self.manifest_path(), self.manifest()).unwrap();
        Workspace::new(&self.manifest_path()).unwrap()
    }

    /// Config pointing the host toolchain at the fake compilers.
    pub fn config(&self) -> Config {
        Config {
            toolchain: ToolchainSettings {
                cc: Some(self.bin.join("cc")),
                cxx: Some(self.bin.join("cxx")),
            },
            ..Default::default()
        }
    }

    /// Build context for the default profile.
    pub fn context(&self) -> BuildContext {
        build_context(&self.workspace(), &self.config(), &BuildOptions::default()).unwrap()
    }

    /// Temporary directory holding the project and the fake tools.
    pub fn base(&self) -> &Path {
        self.tmp.path()
    }
}

impl Default for ProjectFixture {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::manifest::Manifest;

    #[test]
    fn test_manifest_parses() {
        let fixture = ProjectFixture::new()
            .with_platform("embedded-target")
            .component("net", "sources = [\"*.cpp\"]");

        let manifest = Manifest::parse(&fixture.manifest()).unwrap();
        let profile = manifest.profile(None).unwrap();
        assert_eq!(profile.platform, "embedded-target");
        assert_eq!(profile.nm, fixture.bin_dir().join("nm"));
        assert!(fixture.root().join("component.lds").is_file());
        assert!(manifest.components.contains_key("net"));
    }
}
