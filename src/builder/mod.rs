//! Component build pipeline.
//!
//! Declares the build graph (tool bootstrap, interface generation, assembly,
//! verification) and executes it against a bound toolchain.

pub mod assemble;
pub mod bootstrap;
pub mod context;
pub mod events;
pub mod executor;
pub mod generate;
pub mod include;
pub mod plan;
pub mod registry;
pub mod toolchain;
pub mod verify;

pub use assemble::ComponentAssembler;
pub use bootstrap::{ToolBootstrap, ToolHandle};
pub use context::BuildContext;
pub use events::{BuildEvent, MessageFormat};
pub use executor::{BuildExecutor, BuildReport, NodeFailure};
pub use generate::ArtifactGenerationTask;
pub use include::IncludeSetResolver;
pub use plan::{BuildNode, BuildPlan};
pub use registry::ComponentRegistry;
pub use toolchain::{detect_host_toolchain, CommandSpec, GccToolchain, Toolchain};
pub use verify::UndefinedSymbolVerifier;
