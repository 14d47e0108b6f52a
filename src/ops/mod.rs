//! High-level operations.
//!
//! This module contains the implementation of keel commands.

pub mod image;
pub mod keel_build;
pub mod keel_clean;

pub use image::{collect_image, write_image_manifest, ImageEntry, ImageManifest};
pub use keel_build::{build, build_context, build_plan, plan, BuildOptions, BuildResult};
pub use keel_clean::clean;
