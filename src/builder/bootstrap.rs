//! Generator tool bootstrap.
//!
//! Interface generators are targets of the same build: a tool declared with
//! sources is compiled and linked with the host toolchain the first time a
//! generation step needs it, and its path only becomes observable once that
//! sub-build has finished.
//!
//! Each tool has one `OnceLock` cell. Concurrent callers block on the single
//! in-flight sub-build and share its result; failures are memoized as well,
//! so every dependent sees the same `ToolBuildFailed`.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock};

use rayon::prelude::*;

use crate::builder::assemble::object_path;
use crate::builder::context::BuildContext;
use crate::builder::events::BuildEvent;
use crate::builder::include::IncludeSetResolver;
use crate::builder::toolchain::{CompileInput, ExeLinkInput, Language, Toolchain};
use crate::core::error::BuildError;
use crate::core::registry::{ToolDep, ToolSource, ToolTarget};
use crate::util::fs::{ensure_parent, glob_files};
use crate::util::process::find_executable;

/// Resolved generator executable.
///
/// Only [`ToolBootstrap`] creates handles, and only after the tool exists.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolHandle {
    tool: String,
    path: PathBuf,
}

impl ToolHandle {
    pub fn tool(&self) -> &str {
        &self.tool
    }

    /// Absolute path of the executable.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Locate a prebuilt tool. Paths with more than one component are relative
/// to the project root; bare names are searched in PATH.
pub fn locate_program(root: &Path, program: &Path) -> Option<PathBuf> {
    if program.components().count() > 1 {
        find_executable(root.join(program))
    } else {
        find_executable(program)
    }
}

/// Memoized tool resolution.
pub struct ToolBootstrap {
    cells: Vec<OnceLock<Result<ToolHandle, BuildError>>>,
    host_toolchain: Option<Arc<dyn Toolchain>>,
    builds: AtomicUsize,
}

impl ToolBootstrap {
    pub fn new(tool_count: usize, host_toolchain: Option<Arc<dyn Toolchain>>) -> Self {
        ToolBootstrap {
            cells: (0..tool_count).map(|_| OnceLock::new()).collect(),
            host_toolchain,
            builds: AtomicUsize::new(0),
        }
    }

    /// Resolve `dep`, running its sub-build if this is the first request.
    pub fn resolve(&self, ctx: &BuildContext, dep: ToolDep) -> Result<ToolHandle, BuildError> {
        let tool = ctx.targets().tool(dep);
        let Some(cell) = self.cells.get(dep.index()) else {
            return Err(BuildError::ToolNotFound {
                tool: tool.name.clone(),
                requested_by: "bootstrap".to_string(),
            });
        };

        cell.get_or_init(|| {
            let result = self.obtain(ctx, tool);
            if let Ok(ref handle) = result {
                ctx.emit(BuildEvent::ToolReady {
                    tool: handle.tool.clone(),
                    path: handle.path.clone(),
                });
            }
            result
        })
        .clone()
    }

    /// Number of sub-builds that ran.
    pub fn builds(&self) -> usize {
        self.builds.load(Ordering::SeqCst)
    }

    fn obtain(&self, ctx: &BuildContext, tool: &ToolTarget) -> Result<ToolHandle, BuildError> {
        let path = match &tool.source {
            ToolSource::Program(program) => {
                locate_program(ctx.root(), program).ok_or_else(|| BuildError::ToolNotFound {
                    tool: tool.name.clone(),
                    requested_by: "bootstrap".to_string(),
                })?
            }
            ToolSource::Build { .. } => {
                self.builds.fetch_add(1, Ordering::SeqCst);
                self.build(ctx, tool)
                    .map_err(|output| BuildError::ToolBuildFailed {
                        tool: tool.name.clone(),
                        output,
                    })?
            }
        };

        Ok(ToolHandle {
            tool: tool.name.clone(),
            path,
        })
    }

    /// Compile and link a tool from source with the host toolchain.
    fn build(&self, ctx: &BuildContext, tool: &ToolTarget) -> Result<PathBuf, String> {
        let ToolSource::Build {
            dir,
            sources,
            includes,
            cflags,
            cxxflags,
            ldflags,
            libs,
        } = &tool.source
        else {
            return Err(format!("tool `{}` is not built from source", tool.name));
        };

        let host = self
            .host_toolchain
            .as_deref()
            .ok_or_else(|| "no host C/C++ compiler available".to_string())?;

        tracing::info!("building tool `{}`", tool.name);

        let src_dir = ctx.root().join(dir);
        let sources = glob_files(&src_dir, sources).map_err(|e| format!("{:#}", e))?;
        if sources.is_empty() {
            return Err(format!("no sources found in {}", src_dir.display()));
        }

        let include_dirs = IncludeSetResolver::new(ctx.root(), ctx.profile())
            .resolve(&tool.name, &src_dir, includes, Path::new(""), false)
            .map_err(|e| e.to_string())?;

        let tool_dir = ctx.tool_dir(&tool.name);
        let obj_dir = tool_dir.join("obj");

        let objects = sources
            .par_iter()
            .map(|source| -> Result<PathBuf, String> {
                let lang = Language::from_path(source)
                    .ok_or_else(|| format!("unsupported source file {}", source.display()))?;
                let input = CompileInput {
                    source: source.clone(),
                    output: object_path(&obj_dir, &src_dir, source, host.object_extension()),
                    include_dirs: include_dirs.clone(),
                    defines: Vec::new(),
                    cflags: match lang {
                        Language::Cxx => cxxflags.clone(),
                        Language::C | Language::Asm => cflags.clone(),
                    },
                };
                ensure_parent(&input.output).map_err(|e| format!("{:#}", e))?;
                host.compile_command(&input, lang)
                    .run()
                    .map_err(|f| format!("{}\n{}", f.command, f.output))?;
                Ok(input.output)
            })
            .collect::<Result<Vec<_>, String>>()?;

        let output = tool_dir.join(&tool.name);
        let link = ExeLinkInput {
            objects,
            output: output.clone(),
            libs: libs.clone(),
            ldflags: ldflags.clone(),
        };
        host.link_exe_command(&link)
            .run()
            .map_err(|f| format!("{}\n{}", f.command, f.output))?;

        if !output.is_file() {
            return Err(format!("linker did not produce {}", output.display()));
        }

        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::registry::TargetRegistry;
    use crate::test_support::fixtures::ProjectFixture;

    #[test]
    fn test_built_tool_resolves_once() {
        let fixture = ProjectFixture::new().with_buildable_generator();
        let ctx = fixture.context();
        let dep = ctx.targets().tool_dep("meddler", "test").unwrap();

        let first = ctx.resolve_tool(dep).unwrap();
        let second = ctx.resolve_tool(dep).unwrap();

        assert_eq!(first, second);
        assert!(first.path().is_file());
        assert_eq!(first.path(), ctx.tool_dir("meddler").join("meddler"));
        assert_eq!(ctx.tool_builds(), 1);
    }

    #[test]
    fn test_concurrent_resolution_shares_one_build() {
        let fixture = ProjectFixture::new().with_buildable_generator();
        let ctx = fixture.context();
        let dep = ctx.targets().tool_dep("meddler", "test").unwrap();

        let handles: Vec<_> = (0..8)
            .into_par_iter()
            .map(|_| ctx.resolve_tool(dep))
            .collect();

        assert!(handles.iter().all(|h| h.is_ok()));
        assert_eq!(ctx.tool_builds(), 1);
    }

    #[test]
    fn test_failed_build_is_memoized() {
        let fixture = ProjectFixture::new()
            .with_buildable_generator()
            .file("tools/meddler/broken.cpp", "//FAIL parse.y: internal error\n");
        let ctx = fixture.context();
        let dep = ctx.targets().tool_dep("meddler", "test").unwrap();

        for _ in 0..3 {
            match ctx.resolve_tool(dep).unwrap_err() {
                BuildError::ToolBuildFailed { tool, output } => {
                    assert_eq!(tool, "meddler");
                    assert!(output.contains("internal error"));
                }
                other => panic!("unexpected error: {other}"),
            }
        }
        assert_eq!(ctx.tool_builds(), 1);
    }

    #[test]
    fn test_prebuilt_program() {
        let fixture = ProjectFixture::new();
        let ctx = fixture.context();
        let dep = ctx.targets().tool_dep("meddler", "test").unwrap();

        let handle = ctx.resolve_tool(dep).unwrap();
        assert_eq!(handle.tool(), "meddler");
        assert_eq!(handle.path(), fixture.generator_path());
        assert_eq!(ctx.tool_builds(), 0);
    }

    #[test]
    fn test_cells_sized_from_registry() {
        let registry = TargetRegistry::new();
        let bootstrap = ToolBootstrap::new(registry.tools().count(), None);
        assert_eq!(bootstrap.cells.len(), 0);
        assert_eq!(bootstrap.builds(), 0);
    }
}
