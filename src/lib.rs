//! keel - interface code generation and relocatable component assembly
//!
//! This crate provides the library side of keel: generating sources from
//! interface definitions with a self-bootstrapped generator, assembling
//! components into relocatable objects, and verifying that no disallowed
//! undefined symbols remain after the link.

pub mod builder;
pub mod core;
pub mod ops;
pub mod util;

/// Project fixtures and fake toolchain scripts for unit tests.
#[cfg(test)]
pub mod test_support;

pub use crate::core::{
    component::Component, manifest::Manifest, profile::ComponentProfile, workspace::Workspace,
};

pub use util::context::GlobalContext;
