//! Interface generation.
//!
//! Declaring a task fixes the artifact set of an interface and splices its
//! compilable outputs into the consuming unit before anything runs. Running
//! the task invokes the bootstrapped generator:
//!
//! ```text
//! <tool> [-v] <input> -o<output-dir> -I<dir>...
//! ```

use std::path::{Path, PathBuf};

use crate::builder::bootstrap::ToolHandle;
use crate::builder::context::BuildContext;
use crate::builder::events::BuildEvent;
use crate::builder::toolchain::CommandSpec;
use crate::core::artifact::GeneratedArtifactSet;
use crate::core::error::BuildError;
use crate::core::interface::InterfaceDefinition;
use crate::core::registry::ToolDep;
use crate::core::unit::{CompilationUnit, OrderedSet};
use crate::util::fs::ensure_dir;

/// Generator include path for `def`: the interface's own directory, then
/// `unit_includes`, then the directories of the interfaces the unit depends
/// on. First occurrence wins.
pub fn generator_includes(
    def: &InterfaceDefinition,
    unit_includes: &[PathBuf],
    interface_dirs: &[PathBuf],
) -> Vec<PathBuf> {
    let mut dirs = OrderedSet::new();
    dirs.insert(def.dir().to_path_buf());
    dirs.extend(unit_includes.iter().cloned());
    dirs.extend(interface_dirs.iter().cloned());
    dirs.as_slice().to_vec()
}

/// One generator invocation for one interface definition.
#[derive(Debug, Clone)]
pub struct ArtifactGenerationTask {
    unit: String,
    def: InterfaceDefinition,
    tool: ToolDep,
    artifacts: GeneratedArtifactSet,
    includes: Vec<PathBuf>,
}

impl ArtifactGenerationTask {
    /// Declare generation of `def` into `output_dir` for `unit`.
    ///
    /// Registers the compilable outputs and the output directory with the
    /// unit. Declaring the same interface again leaves the unit unchanged.
    pub fn declare(
        unit: &mut CompilationUnit,
        def: InterfaceDefinition,
        tool: ToolDep,
        output_dir: &Path,
        includes: Vec<PathBuf>,
    ) -> Self {
        let artifacts = GeneratedArtifactSet::for_interface(&def, output_dir);
        unit.register_generated(&artifacts);

        ArtifactGenerationTask {
            unit: unit.name().to_string(),
            def,
            tool,
            artifacts,
            includes,
        }
    }

    pub fn unit(&self) -> &str {
        &self.unit
    }

    pub fn interface(&self) -> &InterfaceDefinition {
        &self.def
    }

    pub fn tool(&self) -> ToolDep {
        self.tool
    }

    pub fn artifacts(&self) -> &GeneratedArtifactSet {
        &self.artifacts
    }

    pub fn includes(&self) -> &[PathBuf] {
        &self.includes
    }

    /// The generator command line.
    pub fn command(&self, tool: &ToolHandle, verbose: bool) -> CommandSpec {
        let mut cmd = CommandSpec::new(tool.path());
        if verbose {
            cmd = cmd.arg("-v");
        }
        cmd = cmd
            .arg(self.def.path().display().to_string())
            .arg(format!("-o{}", self.artifacts.output_dir().display()));
        for dir in &self.includes {
            cmd = cmd.arg(format!("-I{}", dir.display()));
        }
        cmd
    }

    /// Resolve the tool and run the generator.
    pub fn run(&self, ctx: &BuildContext) -> Result<GeneratedArtifactSet, BuildError> {
        let tool = ctx.resolve_tool(self.tool)?;
        let artifacts = generate(self, &tool, ctx.verbose_generator())?;

        ctx.emit(BuildEvent::Generated {
            unit: self.unit.clone(),
            interface: self.def.path().to_path_buf(),
            outputs: artifacts.all().iter().map(|p| p.to_path_buf()).collect(),
        });

        Ok(artifacts)
    }
}

/// Run `tool` for `task` and check that every expected artifact exists.
pub fn generate(
    task: &ArtifactGenerationTask,
    tool: &ToolHandle,
    verbose: bool,
) -> Result<GeneratedArtifactSet, BuildError> {
    let failure = |output: String| BuildError::GenerationFailure {
        unit: task.unit.clone(),
        interface: task.def.path().to_path_buf(),
        output,
    };

    ensure_dir(task.artifacts.output_dir()).map_err(|e| failure(format!("{:#}", e)))?;

    tracing::debug!(
        "generating {} for `{}`",
        task.def.path().display(),
        task.unit
    );

    let output = task
        .command(tool, verbose)
        .run()
        .map_err(|f| failure(f.output))?;

    let missing = task.artifacts.missing();
    if !missing.is_empty() {
        let names: Vec<String> = missing.iter().map(|p| p.display().to_string()).collect();
        let mut message = format!("generator did not produce {}", names.join(", "));
        if !output.is_empty() {
            message.push('\n');
            message.push_str(&output);
        }
        return Err(failure(message));
    }

    Ok(task.artifacts.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::fixtures::ProjectFixture;

    fn task(fixture: &ProjectFixture, ctx: &BuildContext, file: &str) -> (CompilationUnit, ArtifactGenerationTask) {
        let dir = fixture.root().join("modules/net");
        let mut unit = CompilationUnit::new("net", &dir);
        unit.add_source(dir.join("net.cpp"));

        let def = InterfaceDefinition::new(dir.join(file)).unwrap();
        let includes = generator_includes(&def, &[], &[]);
        let tool = ctx.targets().tool_dep("meddler", "net").unwrap();
        let out = ctx.mirror_dir(&dir);
        let task = ArtifactGenerationTask::declare(&mut unit, def, tool, &out, includes);
        (unit, task)
    }

    #[test]
    fn test_generator_includes_order() {
        let def = InterfaceDefinition::new("/src/modules/net/net_v1.if").unwrap();
        let includes = generator_includes(
            &def,
            &[PathBuf::from("/src/interfaces"), PathBuf::from("/src/modules/net")],
            &[PathBuf::from("/src/modules/hal"), PathBuf::from("/src/interfaces")],
        );

        assert_eq!(
            includes,
            vec![
                PathBuf::from("/src/modules/net"),
                PathBuf::from("/src/interfaces"),
                PathBuf::from("/src/modules/hal"),
            ]
        );
    }

    #[test]
    fn test_command_line() {
        let fixture = ProjectFixture::new().file("modules/net/net_v1.if", "interface net_v1;\n");
        let ctx = fixture.context();
        let (_, task) = task(&fixture, &ctx, "net_v1.if");
        let tool = ctx.resolve_tool(task.tool()).unwrap();

        let cmd = task.command(&tool, true);
        let dir = fixture.root().join("modules/net");
        assert_eq!(cmd.program, tool.path());
        assert_eq!(
            cmd.args,
            vec![
                "-v".to_string(),
                dir.join("net_v1.if").display().to_string(),
                format!("-o{}", ctx.mirror_dir(&dir).display()),
                format!("-I{}", dir.display()),
            ]
        );
        assert!(!task.command(&tool, false).has_arg("-v"));
    }

    #[test]
    fn test_generated_sources_spliced_into_unit() {
        let fixture = ProjectFixture::new()
            .file("modules/net/net.cpp", "int main() {}\n")
            .file("modules/net/foo_v1.if", "interface foo_v1;\n");
        let ctx = fixture.context();
        let (unit, task) = task(&fixture, &ctx, "foo_v1.if");

        let artifacts = task.run(&ctx).unwrap();
        let out = ctx.mirror_dir(&fixture.root().join("modules/net"));

        for name in ["foo_v1_interface.h", "foo_v1_interface.cpp", "foo_v1_impl.h", "foo_v1_typedefs.cpp"] {
            assert!(out.join(name).is_file(), "{} missing", name);
        }
        assert_eq!(
            unit.sources()[1..],
            [out.join("foo_v1_interface.cpp"), out.join("foo_v1_typedefs.cpp")]
        );
        assert!(unit.include_dirs().contains(&out));
        assert_eq!(artifacts, *task.artifacts());
    }

    #[test]
    fn test_regeneration_is_byte_identical() {
        let fixture = ProjectFixture::new().file("modules/net/net_v1.if", "interface net_v1;\n");
        let ctx = fixture.context();
        let (_, task) = task(&fixture, &ctx, "net_v1.if");

        let artifacts = task.run(&ctx).unwrap();
        let first: Vec<Vec<u8>> = artifacts.all().iter().map(|p| std::fs::read(p).unwrap()).collect();
        task.run(&ctx).unwrap();
        let second: Vec<Vec<u8>> = artifacts.all().iter().map(|p| std::fs::read(p).unwrap()).collect();

        assert_eq!(first, second);
    }

    #[test]
    fn test_nonzero_exit_is_generation_failure() {
        let fixture = ProjectFixture::new()
            .file("modules/net/net_v1.if", "//SYNTAX net_v1.if:3: expected `;`\n");
        let ctx = fixture.context();
        let (_, task) = task(&fixture, &ctx, "net_v1.if");

        match task.run(&ctx).unwrap_err() {
            BuildError::GenerationFailure { unit, interface, output } => {
                assert_eq!(unit, "net");
                assert!(interface.ends_with("net_v1.if"));
                assert!(output.contains("net_v1.if:3: expected `;`"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_missing_artifact_is_generation_failure() {
        let fixture = ProjectFixture::new()
            .file("modules/net/net_v1.if", "//PARTIAL\n");
        let ctx = fixture.context();
        let (_, task) = task(&fixture, &ctx, "net_v1.if");

        match task.run(&ctx).unwrap_err() {
            BuildError::GenerationFailure { output, .. } => {
                assert!(output.contains("net_v1_typedefs.cpp"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
