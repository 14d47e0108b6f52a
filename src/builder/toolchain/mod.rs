//! Toolchain abstraction for compiling and linking components.
//!
//! Only GCC/Clang-style drivers with a GNU-style `ld` and `nm` are
//! supported. Component builds take their bindings from the selected
//! [`ComponentProfile`](crate::core::ComponentProfile); generator tools are
//! built with the host toolchain found by [`detect_host_toolchain`].
//!
//! Host toolchain detection priority:
//! 1. `[toolchain]` in keel config (`.keel/config.toml` or the global file)
//! 2. Environment variables (CC, CXX, LD, NM)
//! 3. Auto-detection (searching PATH for common compilers)

use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::util::process::{output_text, ProcessBuilder};

mod detect;
mod gcc;

pub use detect::detect_host_toolchain;
pub use gcc::GccToolchain;

/// Source language, selected by file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    C,
    Cxx,
    /// Assembly, compiled by the C driver
    Asm,
}

impl Language {
    /// Determine the language of a source file.
    ///
    /// `.c` is C, `.cpp`/`.cc`/`.cxx` is C++, `.S`/`.s` is assembly.
    pub fn from_path(path: &Path) -> Option<Language> {
        match path.extension()?.to_str()? {
            "c" => Some(Language::C),
            "cpp" | "cc" | "cxx" | "C" => Some(Language::Cxx),
            "S" | "s" => Some(Language::Asm),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Language::C => "c",
            Language::Cxx => "c++",
            Language::Asm => "asm",
        }
    }
}

/// A command to execute, with program, arguments, and environment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommandSpec {
    /// The program to run (e.g., "gcc", "ld")
    pub program: PathBuf,
    /// Command arguments
    pub args: Vec<String>,
    /// Environment variables to set
    pub env: Vec<(String, String)>,
}

impl CommandSpec {
    /// Create a new command.
    pub fn new(program: impl Into<PathBuf>) -> Self {
        CommandSpec {
            program: program.into(),
            args: Vec::new(),
            env: Vec::new(),
        }
    }

    /// Add an argument.
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Add multiple arguments.
    pub fn args(mut self, args: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.args.extend(args.into_iter().map(|a| a.into()));
        self
    }

    /// Add an environment variable.
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    /// Whether `arg` appears verbatim in the argument list.
    #[cfg(test)]
    pub fn has_arg(&self, arg: &str) -> bool {
        self.args.iter().any(|a| a == arg)
    }

    /// Turn the command into a runnable process.
    pub fn to_process(&self) -> ProcessBuilder {
        let mut pb = ProcessBuilder::new(&self.program).args(&self.args);
        for (key, value) in &self.env {
            pb = pb.env(key, value);
        }
        pb
    }

    /// Run the command to completion.
    ///
    /// Returns the captured output on success. A spawn failure or a nonzero
    /// exit is reported with the command line and the raw output.
    pub fn run(&self) -> Result<String, CommandFailure> {
        let process = self.to_process();
        let command = process.display_command();

        let output = process.exec().map_err(|e| CommandFailure {
            command: command.clone(),
            output: format!("{:#}", e),
        })?;

        let text = output_text(&output);
        if output.status.success() {
            Ok(text)
        } else {
            let status = match output.status.code() {
                Some(code) => format!("exit status {}", code),
                None => "terminated by signal".to_string(),
            };
            Err(CommandFailure {
                command,
                output: if text.is_empty() { status } else { text },
            })
        }
    }
}

/// A command that could not be run or exited unsuccessfully.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandFailure {
    pub command: String,
    pub output: String,
}

/// Input for a compile step.
#[derive(Debug, Clone)]
pub struct CompileInput {
    /// Source file to compile
    pub source: PathBuf,
    /// Output object file
    pub output: PathBuf,
    /// Include directories
    pub include_dirs: Vec<PathBuf>,
    /// Preprocessor defines (name, optional value)
    pub defines: Vec<(String, Option<String>)>,
    /// Additional compiler flags
    pub cflags: Vec<String>,
}

/// Input for a relocatable (`-r`) component link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelocatableLinkInput {
    /// Object files to link
    pub objects: Vec<PathBuf>,
    /// Output component object
    pub output: PathBuf,
    /// Component linker script (non-hosted only)
    pub script: Option<PathBuf>,
    /// Link map output (non-hosted only)
    pub map: Option<PathBuf>,
    /// Additional linker flags
    pub ldflags: Vec<String>,
}

/// Input for an executable link.
#[derive(Debug, Clone)]
pub struct ExeLinkInput {
    /// Object files to link
    pub objects: Vec<PathBuf>,
    /// Output executable
    pub output: PathBuf,
    /// Libraries to link (without -l prefix)
    pub libs: Vec<String>,
    /// Additional linker flags
    pub ldflags: Vec<String>,
}

/// Trait for toolchain implementations.
///
/// Each toolchain knows how to generate commands for its specific tools.
pub trait Toolchain: Send + Sync + std::fmt::Debug {
    /// Generate a compile command.
    fn compile_command(&self, input: &CompileInput, lang: Language) -> CommandSpec;

    /// Generate a relocatable link command for a component.
    fn link_relocatable_command(&self, input: &RelocatableLinkInput) -> CommandSpec;

    /// Generate an executable link command (C++ driver).
    fn link_exe_command(&self, input: &ExeLinkInput) -> CommandSpec;

    /// Generate the command listing undefined symbols of an object.
    fn undefined_symbols_command(&self, object: &Path) -> CommandSpec;

    /// Get the object file extension.
    fn object_extension(&self) -> &str {
        "o"
    }
}
