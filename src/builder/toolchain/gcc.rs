//! GCC/Clang toolchain implementation.

use std::path::{Path, PathBuf};

use crate::core::profile::ComponentProfile;

use super::{CommandSpec, CompileInput, ExeLinkInput, Language, RelocatableLinkInput, Toolchain};

/// GCC/Clang driver plus GNU `ld` and `nm`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GccToolchain {
    /// Path to the C compiler (also compiles assembly)
    pub cc: PathBuf,
    /// Path to the C++ compiler
    pub cxx: PathBuf,
    /// Path to the linker used for relocatable links
    pub ld: PathBuf,
    /// Path to the symbol lister
    pub nm: PathBuf,
}

impl GccToolchain {
    /// Create a new GCC-style toolchain.
    pub fn new(cc: PathBuf, cxx: PathBuf, ld: PathBuf, nm: PathBuf) -> Self {
        GccToolchain { cc, cxx, ld, nm }
    }

    /// Take the tool bindings of a component profile.
    pub fn from_profile(profile: &ComponentProfile) -> Self {
        GccToolchain {
            cc: profile.cc.clone(),
            cxx: profile.cxx.clone(),
            ld: profile.ld.clone(),
            nm: profile.nm.clone(),
        }
    }

    /// Infer C++ compiler path from C compiler path.
    ///
    /// Handles common patterns:
    /// - gcc, i686-elf-gcc -> g++, i686-elf-g++
    /// - clang -> clang++
    /// - cc, /usr/bin/cc -> c++, /usr/bin/c++
    pub fn infer_cxx(cc: &Path) -> PathBuf {
        let cc_str = cc.to_string_lossy();

        if cc_str.ends_with("gcc") {
            return PathBuf::from(format!("{}++", &cc_str[..cc_str.len() - 2]));
        }

        if cc_str.ends_with("clang") {
            return PathBuf::from(format!("{}++", cc_str));
        }

        // Only a complete basename "cc", not "mycc"
        let is_standalone_cc =
            cc_str == "cc" || cc_str.ends_with("/cc") || cc_str.ends_with("-cc");

        if is_standalone_cc {
            return PathBuf::from(format!("{}++", &cc_str[..cc_str.len() - 1]));
        }

        PathBuf::from(format!("{}++", cc_str))
    }
}

impl Toolchain for GccToolchain {
    fn compile_command(&self, input: &CompileInput, lang: Language) -> CommandSpec {
        let compiler = match lang {
            Language::C | Language::Asm => &self.cc,
            Language::Cxx => &self.cxx,
        };

        let mut cmd = CommandSpec::new(compiler).arg("-c");

        for dir in &input.include_dirs {
            cmd = cmd.arg(format!("-I{}", dir.display()));
        }

        for (name, value) in &input.defines {
            match value {
                Some(v) => cmd = cmd.arg(format!("-D{}={}", name, v)),
                None => cmd = cmd.arg(format!("-D{}", name)),
            }
        }

        cmd = cmd.args(input.cflags.iter().cloned());

        cmd.arg(input.source.display().to_string())
            .arg("-o")
            .arg(input.output.display().to_string())
    }

    fn link_relocatable_command(&self, input: &RelocatableLinkInput) -> CommandSpec {
        let mut cmd = CommandSpec::new(&self.ld).arg("-r");

        if let Some(ref script) = input.script {
            cmd = cmd.arg("-T").arg(script.display().to_string());
        }

        if let Some(ref map) = input.map {
            cmd = cmd.arg(format!("-Map={}", map.display()));
        }

        cmd = cmd.args(input.ldflags.iter().cloned());

        cmd = cmd.arg("-o").arg(input.output.display().to_string());

        for obj in &input.objects {
            cmd = cmd.arg(obj.display().to_string());
        }

        cmd
    }

    fn link_exe_command(&self, input: &ExeLinkInput) -> CommandSpec {
        let mut cmd = CommandSpec::new(&self.cxx)
            .arg("-o")
            .arg(input.output.display().to_string());

        for obj in &input.objects {
            cmd = cmd.arg(obj.display().to_string());
        }

        for lib in &input.libs {
            cmd = cmd.arg(format!("-l{}", lib));
        }

        cmd.args(input.ldflags.iter().cloned())
    }

    fn undefined_symbols_command(&self, object: &Path) -> CommandSpec {
        CommandSpec::new(&self.nm)
            .arg("-u")
            .arg(object.display().to_string())
    }
}
