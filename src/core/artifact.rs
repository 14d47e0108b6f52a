//! Generated artifact naming.
//!
//! For an interface with base name `X` the generator writes exactly:
//!
//! - `X_interface.h`   interface header
//! - `X_interface.cpp` interface implementation
//! - `X_impl.h`        implementation header
//! - `X_typedefs.cpp`  type definitions
//!
//! Only the two `.cpp` files are compiled; the headers are consumed through
//! the include path.

use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::core::interface::InterfaceDefinition;

pub const INTERFACE_HEADER_SUFFIX: &str = "_interface.h";
pub const INTERFACE_SOURCE_SUFFIX: &str = "_interface.cpp";
pub const IMPL_HEADER_SUFFIX: &str = "_impl.h";
pub const TYPEDEFS_SOURCE_SUFFIX: &str = "_typedefs.cpp";

/// The four outputs of one generator run.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct GeneratedArtifactSet {
    output_dir: PathBuf,
    interface_header: PathBuf,
    interface_source: PathBuf,
    impl_header: PathBuf,
    typedefs_source: PathBuf,
}

impl GeneratedArtifactSet {
    /// Derive the artifact paths from a base name and an output directory.
    pub fn for_base_name(base_name: &str, output_dir: &Path) -> Self {
        let file = |suffix: &str| output_dir.join(format!("{}{}", base_name, suffix));

        GeneratedArtifactSet {
            output_dir: output_dir.to_path_buf(),
            interface_header: file(INTERFACE_HEADER_SUFFIX),
            interface_source: file(INTERFACE_SOURCE_SUFFIX),
            impl_header: file(IMPL_HEADER_SUFFIX),
            typedefs_source: file(TYPEDEFS_SOURCE_SUFFIX),
        }
    }

    /// Derive the artifact paths for an interface definition.
    pub fn for_interface(def: &InterfaceDefinition, output_dir: &Path) -> Self {
        Self::for_base_name(def.base_name(), output_dir)
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    pub fn interface_header(&self) -> &Path {
        &self.interface_header
    }

    pub fn interface_source(&self) -> &Path {
        &self.interface_source
    }

    pub fn impl_header(&self) -> &Path {
        &self.impl_header
    }

    pub fn typedefs_source(&self) -> &Path {
        &self.typedefs_source
    }

    /// All four outputs, headers first.
    pub fn all(&self) -> [&Path; 4] {
        [
            &self.interface_header,
            &self.interface_source,
            &self.impl_header,
            &self.typedefs_source,
        ]
    }

    /// Outputs that are compiled into the consuming unit.
    pub fn compilable(&self) -> [&Path; 2] {
        [&self.interface_source, &self.typedefs_source]
    }

    /// Outputs the generator was expected to write but did not.
    pub fn missing(&self) -> Vec<PathBuf> {
        self.all()
            .into_iter()
            .filter(|p| !p.is_file())
            .map(Path::to_path_buf)
            .collect()
    }
}
