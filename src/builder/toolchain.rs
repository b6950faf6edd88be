//! Tool paths, compiler identity and command rendering.
//!
//! Compiler-specific behavior is a table lookup on [`CompilerKind`], resolved
//! once from the C++ compiler's file name when an environment is built.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::builder::environment::Environment;
use crate::core::language::Language;
use crate::core::platform::{Platform, PlatformKind};

/// A command to execute, with program, arguments, and environment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandSpec {
    /// The program to run (e.g., "g++")
    pub program: PathBuf,
    /// Command arguments
    pub args: Vec<String>,
    /// Environment variables to set
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub env: Vec<(String, String)>,
}

impl CommandSpec {
    /// Create a new command spec.
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

    /// The command line as a single string.
    pub fn display(&self) -> String {
        let mut parts = vec![self.program.display().to_string()];
        parts.extend(self.args.iter().cloned());
        parts.join(" ")
    }
}

/// Compiler family, keyed by the compiler's file name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompilerKind {
    Clang,
    Gcc,
    Other,
}

impl CompilerKind {
    /// Identify a compiler from its path.
    ///
    /// `clang++` must match exactly; anything whose name starts with `g++`
    /// (`g++`, `g++-13`) is GCC.
    pub fn detect(compiler: &Path) -> Self {
        let name = compiler
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let name = name.strip_suffix(".exe").unwrap_or(&name);

        if name == "clang++" {
            CompilerKind::Clang
        } else if name.starts_with("g++") {
            CompilerKind::Gcc
        } else {
            CompilerKind::Other
        }
    }

    /// Get the family name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            CompilerKind::Clang => "clang",
            CompilerKind::Gcc => "gcc",
            CompilerKind::Other => "other",
        }
    }

    /// Extra compile flags this compiler family gets.
    pub fn extra_flags(&self) -> &'static [&'static str] {
        match self {
            CompilerKind::Clang => &["-Qunused-arguments", "-fcolor-diagnostics"],
            CompilerKind::Gcc => &["-Wno-missing-field-initializers"],
            CompilerKind::Other => &[],
        }
    }
}

impl fmt::Display for CompilerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Tool paths used by an environment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolSet {
    /// C compiler
    pub cc: PathBuf,
    /// C++ compiler
    pub cxx: PathBuf,
    /// Archiver
    pub ar: PathBuf,
    /// Linker driver
    pub link: PathBuf,
}

impl ToolSet {
    /// Platform default tools, before any override.
    pub fn defaults(platform: &Platform) -> Self {
        let (cc, cxx) = match platform.kind {
            PlatformKind::MacOs => ("clang", "clang++"),
            PlatformKind::Linux | PlatformKind::Other => ("gcc", "g++"),
        };
        ToolSet {
            cc: PathBuf::from(cc),
            cxx: PathBuf::from(cxx),
            ar: PathBuf::from("ar"),
            link: PathBuf::from(cxx),
        }
    }
}

/// Input for a compile step.
#[derive(Debug, Clone)]
pub struct CompileInput<'a> {
    pub source: &'a Path,
    pub output: &'a Path,
    pub include_dirs: &'a [PathBuf],
}

/// Input for a link step.
#[derive(Debug, Clone)]
pub struct LinkInput<'a> {
    pub objects: &'a [PathBuf],
    pub output: &'a Path,
    pub lib_dirs: &'a [PathBuf],
    /// Libraries to link (without -l prefix)
    pub libs: &'a [String],
}

/// Render a compile command.
pub fn compile_command(env: &Environment, lang: Language, input: &CompileInput<'_>) -> CommandSpec {
    let flags = env.flags();
    let (compiler, lang_flags) = match lang {
        Language::C => (&env.tools().cc, &flags.cflags),
        Language::Cxx => (&env.tools().cxx, &flags.cxxflags),
    };

    CommandSpec::new(compiler)
        .arg("-c")
        .args(lang_flags.iter().cloned())
        .args(flags.cppflags.iter().cloned())
        .args(flags.cppdefines.iter().map(|d| d.to_arg()))
        .args(input.include_dirs.iter().map(|d| format!("-I{}", d.display())))
        .arg(input.source.display().to_string())
        .arg("-o")
        .arg(input.output.display().to_string())
}

/// Render an archive (static library) command.
pub fn archive_command(env: &Environment, objects: &[PathBuf], output: &Path) -> CommandSpec {
    CommandSpec::new(&env.tools().ar)
        .args(env.flags().arflags.iter().cloned())
        .arg(output.display().to_string())
        .args(objects.iter().map(|o| o.display().to_string()))
}

/// Render an executable link command.
pub fn link_command(env: &Environment, input: &LinkInput<'_>) -> CommandSpec {
    let flags = env.flags();
    CommandSpec::new(&env.tools().link)
        .args(flags.linkflags.iter().cloned())
        .arg("-o")
        .arg(input.output.display().to_string())
        .args(input.objects.iter().map(|o| o.display().to_string()))
        .args(input.lib_dirs.iter().map(|d| format!("-L{}", d.display())))
        .args(input.libs.iter().map(|l| format!("-l{}", l)))
        .args(flags.libs.iter().map(|l| format!("-l{}", l)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::environment::EnvironmentBuilder;
    use crate::core::mode::BuildMode;
    use crate::core::platform::Arch;

    #[test]
    fn test_detect_compiler_kind() {
        assert_eq!(CompilerKind::detect(Path::new("clang++")), CompilerKind::Clang);
        assert_eq!(
            CompilerKind::detect(Path::new("/usr/bin/clang++")),
            CompilerKind::Clang
        );
        assert_eq!(CompilerKind::detect(Path::new("g++")), CompilerKind::Gcc);
        assert_eq!(
            CompilerKind::detect(Path::new("/opt/gcc/bin/g++-13")),
            CompilerKind::Gcc
        );
        assert_eq!(CompilerKind::detect(Path::new("clang++-15")), CompilerKind::Other);
        assert_eq!(CompilerKind::detect(Path::new("c++")), CompilerKind::Other);
        assert_eq!(CompilerKind::detect(Path::new("icpc")), CompilerKind::Other);
    }

    #[test]
    fn test_extra_flags_are_disjoint() {
        let clang = CompilerKind::Clang.extra_flags();
        let gcc = CompilerKind::Gcc.extra_flags();
        assert!(clang.iter().all(|f| !gcc.contains(f)));
        assert!(CompilerKind::Other.extra_flags().is_empty());
    }

    #[test]
    fn test_toolset_defaults() {
        let linux = ToolSet::defaults(&Platform::new(PlatformKind::Linux, Arch::X86_64));
        assert_eq!(linux.cxx, PathBuf::from("g++"));
        assert_eq!(linux.link, PathBuf::from("g++"));

        let mac = ToolSet::defaults(&Platform::new(PlatformKind::MacOs, Arch::Aarch64));
        assert_eq!(mac.cxx, PathBuf::from("clang++"));
    }

    #[test]
    fn test_render_commands() {
        let env = EnvironmentBuilder::new(BuildMode::Release, "/usr/local")
            .platform(Platform::new(PlatformKind::Linux, Arch::X86_64))
            .build();

        let include = vec![PathBuf::from("include")];
        let compile = compile_command(
            &env,
            Language::Cxx,
            &CompileInput {
                source: Path::new("src/a.cpp"),
                output: Path::new("build/release/a.o"),
                include_dirs: &include,
            },
        );
        assert_eq!(compile.program, PathBuf::from("g++"));
        assert_eq!(compile.args[0], "-c");
        assert!(compile.args.contains(&"-O3".to_string()));
        assert!(compile.args.contains(&"-Iinclude".to_string()));
        assert!(compile.args.ends_with(&[
            "src/a.cpp".to_string(),
            "-o".to_string(),
            "build/release/a.o".to_string()
        ]));

        let objects = vec![PathBuf::from("a.o"), PathBuf::from("b.o")];
        let archive = archive_command(&env, &objects, Path::new("libcore.a"));
        assert_eq!(archive.display(), "ar rcs libcore.a a.o b.o");

        let libs = vec!["core".to_string()];
        let lib_dirs = vec![PathBuf::from("build/release/lib")];
        let link = link_command(
            &env,
            &LinkInput {
                objects: &objects,
                output: Path::new("app"),
                lib_dirs: &lib_dirs,
                libs: &libs,
            },
        );
        assert!(link.display().ends_with("-o app a.o b.o -Lbuild/release/lib -lcore"));
    }
}
