//! Core data structures for keel.
//!
//! This module contains the foundational types used throughout keel:
//! - Interface definitions and the artifacts generated from them
//! - Compilation units, profiles and assembled components
//! - The manifest and the typed target registry built from it
//! - The build error taxonomy

pub mod artifact;
pub mod component;
pub mod error;
pub mod interface;
pub mod manifest;
pub mod profile;
pub mod registry;
pub mod unit;
pub mod workspace;

pub use artifact::GeneratedArtifactSet;
pub use component::{Component, Verdict};
pub use error::BuildError;
pub use interface::InterfaceDefinition;
pub use manifest::Manifest;
pub use profile::ComponentProfile;
pub use registry::{ComponentDep, TargetId, TargetRegistry, ToolDep};
pub use unit::CompilationUnit;
pub use workspace::{find_manifest_in, Workspace, MANIFEST_NAME};
