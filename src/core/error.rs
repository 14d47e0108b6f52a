//! Build error taxonomy.
//!
//! Configuration errors ([`BuildError::is_configuration`]) abort the whole
//! invocation before any node runs. A `ToolBuildFailed` stops the build
//! before any generation or assembly starts. Every other variant is a node
//! failure: it fails the owning target and everything downstream of it,
//! while unrelated targets keep building.

use std::path::PathBuf;

use miette::Diagnostic as MietteDiagnostic;
use thiserror::Error;

use crate::util::diagnostic::{suggestions, Diagnostic};

/// Error raised while declaring or executing the build graph.
#[derive(Debug, Clone, Error, MietteDiagnostic)]
pub enum BuildError {
    #[error("tool `{tool}` required by `{requested_by}` could not be found")]
    #[diagnostic(
        code(keel::config::tool_not_found),
        help("Declare it under [tools] in Keel.toml or put it on PATH")
    )]
    ToolNotFound { tool: String, requested_by: String },

    #[error("component `{component}` used by `{requested_by}` is not declared")]
    #[diagnostic(code(keel::config::unknown_component))]
    UnknownComponent {
        component: String,
        requested_by: String,
    },

    #[error("include directory `{entry}` of `{unit}` does not exist")]
    #[diagnostic(code(keel::config::unresolved_include_dir))]
    UnresolvedIncludeDir {
        unit: String,
        entry: String,
        path: PathBuf,
    },

    #[error("failed to build tool `{tool}`")]
    #[diagnostic(code(keel::build::tool_build_failed))]
    ToolBuildFailed { tool: String, output: String },

    #[error("interface generation failed for `{unit}`")]
    #[diagnostic(code(keel::build::generation_failure))]
    GenerationFailure {
        unit: String,
        interface: PathBuf,
        output: String,
    },

    #[error("compiling or linking component `{component}` failed")]
    #[diagnostic(code(keel::build::compile_or_link_failure))]
    CompileOrLinkFailure {
        component: String,
        command: String,
        output: String,
    },

    #[error("component `{component}` has undefined symbols: {}", .symbols.join(", "))]
    #[diagnostic(
        code(keel::verify::undefined_symbols),
        help("Define the symbols, link the providing objects, or allow them in the profile")
    )]
    UndefinedSymbolError {
        component: String,
        symbols: Vec<String>,
    },

    #[error("could not inspect symbols of component `{component}`")]
    #[diagnostic(code(keel::verify::inspection_failed))]
    SymbolInspectionFailed {
        component: String,
        command: String,
        output: String,
    },

    #[error("component `{component}` has no passing verification record")]
    #[diagnostic(code(keel::image::unverified_component))]
    UnverifiedComponent { component: String, reason: String },
}

impl BuildError {
    /// Whether this error is raised at configuration time.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            BuildError::ToolNotFound { .. }
                | BuildError::UnknownComponent { .. }
                | BuildError::UnresolvedIncludeDir { .. }
        )
    }

    /// The target this error belongs to.
    pub fn target(&self) -> &str {
        match self {
            BuildError::ToolNotFound { requested_by, .. }
            | BuildError::UnknownComponent { requested_by, .. } => requested_by,
            BuildError::UnresolvedIncludeDir { unit, .. }
            | BuildError::GenerationFailure { unit, .. } => unit,
            BuildError::ToolBuildFailed { tool, .. } => tool,
            BuildError::CompileOrLinkFailure { component, .. }
            | BuildError::UndefinedSymbolError { component, .. }
            | BuildError::SymbolInspectionFailed { component, .. }
            | BuildError::UnverifiedComponent { component, .. } => component,
        }
    }

    /// Convert to a user-friendly diagnostic.
    pub fn to_diagnostic(&self) -> Diagnostic {
        let diag = Diagnostic::error(self.to_string());
        match self {
            BuildError::ToolNotFound { tool, .. } => diag
                .with_suggestion(format!("Declare the tool under [tools.{}] in Keel.toml", tool))
                .with_suggestion("Or install it and make sure it is on PATH"),

            BuildError::UnknownComponent { component, .. } => diag.with_suggestion(format!(
                "Add [components.{}] to Keel.toml or remove it from `uses`",
                component
            )),

            BuildError::UnresolvedIncludeDir { path, .. } => diag
                .with_context(format!("resolved to {}", path.display()))
                .with_suggestion(suggestions::INCLUDE_DIR),

            BuildError::ToolBuildFailed { output, .. } => diag.with_output(output.clone()),

            BuildError::GenerationFailure {
                interface, output, ..
            } => diag
                .with_location(interface.clone())
                .with_output(output.clone()),

            BuildError::CompileOrLinkFailure {
                command, output, ..
            }
            | BuildError::SymbolInspectionFailed {
                command, output, ..
            } => diag
                .with_context(format!("command: {}", command))
                .with_output(output.clone()),

            BuildError::UndefinedSymbolError { symbols, .. } => {
                let mut diag = diag;
                for symbol in symbols {
                    diag = diag.with_context(format!("undefined: {}", symbol));
                }
                diag.with_suggestion(
                    "Resolve the symbols or add them to `allowed_undefined` in the profile",
                )
            }

            BuildError::UnverifiedComponent { reason, .. } => diag
                .with_context(reason.clone())
                .with_suggestion(suggestions::BUILD_FAILED),
        }
    }
}
