//! Test utilities for keel unit tests.
//!
//! The build pipeline shells out to a generator, a compiler driver, `ld`
//! and `nm`. Tests replace all four with small POSIX shell scripts (kept in
//! `tests/fixtures/tools` and shared with the CLI tests) so the complete
//! pipeline runs without a cross toolchain.
//!
//! # Example
//!
//! ```rust,ignore
//! let fixture = ProjectFixture::new()
//!     .component("disk", r#"sources = ["*.cpp"]"#)
//!     .file("disk/disk.cpp", "int disk() { return 0; }\n");
//! let ctx = fixture.context();
//! ```

pub mod fixtures;

use std::os::unix::fs::PermissionsExt;
use std::path::Path;

pub use fixtures::ProjectFixture;

/// Fake interface generator.
pub const FAKE_GENERATOR: &str = include_str!("../../tests/fixtures/tools/meddler.sh");

/// Fake compiler driver, used for both C and C++.
pub const FAKE_CC: &str = include_str!("../../tests/fixtures/tools/cc.sh");

/// Fake relocatable linker.
pub const FAKE_LD: &str = include_str!("../../tests/fixtures/tools/ld.sh");

/// Fake `nm -u`.
pub const FAKE_NM: &str = include_str!("../../tests/fixtures/tools/nm.sh");

/// Write an executable script.
pub fn install_script(path: &Path, contents: &str) {
    std::fs::write(path, contents).unwrap();
    let mut permissions = std::fs::metadata(path).unwrap().permissions();
    permissions.set_mode(0o755);
    std::fs::set_permissions(path, permissions).unwrap();
}
