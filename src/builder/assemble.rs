//! Component assembly.
//!
//! Compiles every source of a unit (in parallel) and links the objects into
//! one relocatable component object.

use std::path::{Path, PathBuf};

use rayon::prelude::*;

use crate::builder::context::BuildContext;
use crate::builder::events::BuildEvent;
use crate::builder::toolchain::{CommandFailure, CompileInput, Language, RelocatableLinkInput};
use crate::core::component::Component;
use crate::core::error::BuildError;
use crate::core::profile::ComponentProfile;
use crate::core::unit::CompilationUnit;
use crate::util::fs::{ensure_parent, normalize_lexically};
use crate::util::hash::sha256_bytes;

/// Object file for `source`.
///
/// Sources under `base` mirror their relative path below `obj_dir`. Anything
/// else (generated or shared sources) goes under `obj_dir/ext/<digest>`,
/// where the digest is taken from the source's directory. The source
/// extension is kept so `a.c` and `a.cpp` do not collide.
pub fn object_path(obj_dir: &Path, base: &Path, source: &Path, ext: &str) -> PathBuf {
    let source = normalize_lexically(source);
    let rel = match source.strip_prefix(normalize_lexically(base)) {
        Ok(rel) => rel.to_path_buf(),
        Err(_) => {
            let dir = source.parent().unwrap_or(Path::new(""));
            let digest = sha256_bytes(dir.to_string_lossy().as_bytes());
            Path::new("ext")
                .join(&digest[..16])
                .join(source.file_name().unwrap_or(source.as_os_str()))
        }
    };
    obj_dir.join(format!("{}.{}", rel.display(), ext))
}

/// Compiler flags for `lang`: the profile's, then the unit's.
fn language_flags(profile: &ComponentProfile, unit: &CompilationUnit, lang: Language) -> Vec<String> {
    match lang {
        Language::C | Language::Asm => profile.cflags.iter().chain(unit.cflags()).cloned().collect(),
        Language::Cxx => profile.cxxflags.iter().chain(unit.cxxflags()).cloned().collect(),
    }
}

/// Compiles and links components.
pub struct ComponentAssembler<'a> {
    ctx: &'a BuildContext,
}

impl<'a> ComponentAssembler<'a> {
    pub fn new(ctx: &'a BuildContext) -> Self {
        ComponentAssembler { ctx }
    }

    /// The link step for `name`.
    ///
    /// Always relocatable. Non-hosted platforms add the component linker
    /// script and a link map.
    pub fn link_input(&self, name: &str, objects: Vec<PathBuf>) -> RelocatableLinkInput {
        let profile = self.ctx.profile();
        let hosted = profile.is_hosted();

        RelocatableLinkInput {
            objects,
            output: self.ctx.component_output(name),
            script: (!hosted).then(|| self.ctx.root().join(profile.component_script())),
            map: (!hosted).then(|| self.ctx.map_output(name)),
            ldflags: profile.ldflags.clone(),
        }
    }

    /// Compile and link `unit` into a component and register it.
    pub fn assemble(&self, name: &str, unit: &CompilationUnit) -> Result<Component, BuildError> {
        let profile = self.ctx.profile();
        let toolchain = self.ctx.toolchain();
        let obj_dir = self.ctx.object_dir(name);

        let failure = |f: CommandFailure| BuildError::CompileOrLinkFailure {
            component: name.to_string(),
            command: f.command,
            output: f.output,
        };

        let mut defines = profile.parsed_defines();
        defines.extend(
            unit.defines()
                .iter()
                .map(|d| match d.split_once('=') {
                    Some((n, v)) => (n.to_string(), Some(v.to_string())),
                    None => (d.clone(), None),
                }),
        );

        let mut inputs = Vec::with_capacity(unit.sources().len());
        for source in unit.sources() {
            let lang = Language::from_path(source).ok_or_else(|| {
                BuildError::CompileOrLinkFailure {
                    component: name.to_string(),
                    command: String::new(),
                    output: format!("unsupported source file {}", source.display()),
                }
            })?;
            let output = object_path(&obj_dir, unit.dir(), source, toolchain.object_extension());
            let input = CompileInput {
                source: source.clone(),
                output,
                include_dirs: unit.include_dirs().to_vec(),
                defines: defines.clone(),
                cflags: language_flags(profile, unit, lang),
            };
            inputs.push((input, lang));
        }

        tracing::debug!("compiling {} source(s) for `{}`", inputs.len(), name);

        let results: Vec<Result<PathBuf, BuildError>> = inputs
            .par_iter()
            .map(|(input, lang)| -> Result<PathBuf, BuildError> {
                ensure_parent(&input.output).map_err(|e| BuildError::CompileOrLinkFailure {
                    component: name.to_string(),
                    command: String::new(),
                    output: format!("{:#}", e),
                })?;
                toolchain
                    .compile_command(input, *lang)
                    .run()
                    .map_err(failure)?;
                Ok(input.output.clone())
            })
            .collect();

        let objects = results.into_iter().collect::<Result<Vec<_>, _>>()?;

        let link = self.link_input(name, objects);
        ensure_parent(&link.output).map_err(|e| BuildError::CompileOrLinkFailure {
            component: name.to_string(),
            command: String::new(),
            output: format!("{:#}", e),
        })?;
        toolchain
            .link_relocatable_command(&link)
            .run()
            .map_err(failure)?;

        let component = Component {
            name: name.to_string(),
            objects: link.objects,
            include_dirs: unit.include_dirs().to_vec(),
            profile: profile.name.clone(),
            output: link.output,
            map: link.map,
        };

        self.ctx.register_component(component.clone());
        self.ctx.emit(BuildEvent::ComponentArtifact {
            component: component.name.clone(),
            object: component.output.clone(),
            map: component.map.clone(),
        });

        Ok(component)
    }
}
