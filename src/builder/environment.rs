//! Build environment construction.
//!
//! An [`Environment`] is a fully parameterized build configuration for one
//! mode: tools, flag lists and install prefixes. It is assembled by
//! [`EnvironmentBuilder`] in a fixed order:
//!
//! 1. the flag registry is registered into the preprocessor defines
//! 2. process-environment overrides are merged onto the platform defaults
//! 3. `DESTDIR` is folded into the install prefixes
//! 4. compiler, language, platform and mode deltas are appended
//! 5. `INSTALL_PREFIX` is defined
//!
//! Flag lists only grow during construction, and a finished environment
//! exposes them read-only.

use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::builder::overrides::{BaseConfig, EnvOverrides};
use crate::builder::toolchain::{CompilerKind, ToolSet};
use crate::core::defines::{Define, Defines};
use crate::core::language::CppStandard;
use crate::core::mode::BuildMode;
use crate::core::platform::Platform;
use crate::util::fs::{absolute_from, reroot};
use crate::util::hash::Fingerprint;

/// Warning flags every environment compiles and links with.
pub const WARNING_FLAGS: &[&str] = &["-Wall", "-Wextra", "-Werror", "-pedantic", "-Wshadow"];

/// Debug symbols flag.
pub const DEBUG_FLAG: &str = "-g";

/// Define present in debug environments.
pub const DEBUG_DEFINE: &str = "DEBUG";

/// Optimization flag for every non-debug mode.
pub const OPTIMIZE_FLAG: &str = "-O3";

/// Define carrying the install prefix as a string literal.
pub const INSTALL_PREFIX_DEFINE: &str = "INSTALL_PREFIX";

/// Accumulated flag lists.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FlagSet {
    /// C compile flags
    pub cflags: Vec<String>,
    /// C++ compile flags
    pub cxxflags: Vec<String>,
    /// Preprocessor flags shared by C and C++
    pub cppflags: Vec<String>,
    /// Preprocessor definitions
    pub cppdefines: Vec<Define>,
    /// Link flags
    pub linkflags: Vec<String>,
    /// Archiver flags
    pub arflags: Vec<String>,
    /// Libraries linked into every executable (without -l)
    pub libs: Vec<String>,
}

impl FlagSet {
    /// Flag lists before any registry, override or delta.
    pub fn with_defaults() -> Self {
        FlagSet {
            arflags: vec!["rcs".to_string()],
            ..FlagSet::default()
        }
    }

    fn append_compile<S: AsRef<str>>(&mut self, flags: &[S]) {
        self.cxxflags
            .extend(flags.iter().map(|f| f.as_ref().to_string()));
    }

    fn append_compile_and_link<S: AsRef<str>>(&mut self, flags: &[S]) {
        self.append_compile(flags);
        self.linkflags
            .extend(flags.iter().map(|f| f.as_ref().to_string()));
    }

    fn append_codegen(&mut self, flag: &str) {
        self.cflags.push(flag.to_string());
        self.cxxflags.push(flag.to_string());
    }

    /// Whether `flag` appears in the C++ compile flags.
    pub fn has_compile_flag(&self, flag: &str) -> bool {
        self.cxxflags.iter().any(|f| f == flag)
    }

    /// Whether `flag` appears in the link flags.
    pub fn has_link_flag(&self, flag: &str) -> bool {
        self.linkflags.iter().any(|f| f == flag)
    }

    /// Whether a define with this name is present.
    pub fn has_define(&self, name: &str) -> bool {
        self.cppdefines.iter().any(|d| d.name == name)
    }
}

/// A build environment for one mode.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Environment {
    mode: BuildMode,
    platform: Platform,
    compiler: CompilerKind,
    cxx_std: CppStandard,
    tools: ToolSet,
    flags: FlagSet,
    defines: Defines,
    prefix: PathBuf,
    bin_prefix: PathBuf,
    destdir: Option<PathBuf>,
    install_prefix: PathBuf,
    bin_install_prefix: PathBuf,
    variant_dir: PathBuf,
}

impl Environment {
    /// The mode this environment was built for.
    pub fn mode(&self) -> BuildMode {
        self.mode
    }

    /// Environment name (the mode name).
    pub fn name(&self) -> &'static str {
        self.mode.as_str()
    }

    pub fn platform(&self) -> Platform {
        self.platform
    }

    /// Compiler family resolved from the C++ compiler.
    pub fn compiler(&self) -> CompilerKind {
        self.compiler
    }

    pub fn cxx_std(&self) -> CppStandard {
        self.cxx_std
    }

    pub fn tools(&self) -> &ToolSet {
        &self.tools
    }

    pub fn flags(&self) -> &FlagSet {
        &self.flags
    }

    /// The flag registry this environment was seeded with.
    pub fn defines(&self) -> &Defines {
        &self.defines
    }

    /// Install prefix as given, made absolute. Compiled into the binaries.
    pub fn prefix(&self) -> &Path {
        &self.prefix
    }

    /// Binary install prefix as given (defaults to the prefix).
    pub fn bin_prefix(&self) -> &Path {
        &self.bin_prefix
    }

    /// Staged-install root, if `DESTDIR` was set.
    pub fn destdir(&self) -> Option<&Path> {
        self.destdir.as_deref()
    }

    /// Where files are actually installed: `DESTDIR` + prefix.
    pub fn install_prefix(&self) -> &Path {
        &self.install_prefix
    }

    /// Where binaries are actually installed: `DESTDIR` + bin prefix.
    pub fn bin_install_prefix(&self) -> &Path {
        &self.bin_install_prefix
    }

    /// Per-mode build staging directory (`build/<mode>`).
    pub fn variant_dir(&self) -> &Path {
        &self.variant_dir
    }

    /// Stable hash over everything that affects the build.
    pub fn fingerprint(&self) -> String {
        let flags = &self.flags;
        let defines: Vec<String> = flags.cppdefines.iter().map(Define::to_arg).collect();
        let path = |p: &Path| p.display().to_string();

        let mut fp = Fingerprint::new();
        fp.field("mode", self.mode.as_str())
            .field("platform", &self.platform.to_string())
            .field("compiler", self.compiler.as_str())
            .field("cc", &path(&self.tools.cc))
            .field("cxx", &path(&self.tools.cxx))
            .field("ar", &path(&self.tools.ar))
            .field("link", &path(&self.tools.link))
            .list("cflags", flags.cflags.iter().map(String::as_str))
            .list("cxxflags", flags.cxxflags.iter().map(String::as_str))
            .list("cppflags", flags.cppflags.iter().map(String::as_str))
            .list("cppdefines", defines.iter().map(String::as_str))
            .list("linkflags", flags.linkflags.iter().map(String::as_str))
            .list("arflags", flags.arflags.iter().map(String::as_str))
            .list("libs", flags.libs.iter().map(String::as_str))
            .field("install_prefix", &path(&self.install_prefix))
            .field("bin_install_prefix", &path(&self.bin_install_prefix));
        fp.finish_short()
    }
}

/// Builder for [`Environment`].
#[derive(Debug, Clone)]
pub struct EnvironmentBuilder {
    mode: BuildMode,
    prefix: PathBuf,
    bin_prefix: Option<PathBuf>,
    overrides: EnvOverrides,
    platform: Platform,
    defines: Defines,
    cxx_std: CppStandard,
    base_dir: PathBuf,
    build_root: PathBuf,
}

impl EnvironmentBuilder {
    /// Start an environment for `mode` installing under `prefix`.
    ///
    /// Defaults: host platform, no overrides, empty registry, C++14,
    /// relative paths resolved against the current directory, staging
    /// under `build/`.
    pub fn new(mode: BuildMode, prefix: impl Into<PathBuf>) -> Self {
        EnvironmentBuilder {
            mode,
            prefix: prefix.into(),
            bin_prefix: None,
            overrides: EnvOverrides::none(),
            platform: Platform::host(),
            defines: Defines::new(),
            cxx_std: CppStandard::default(),
            base_dir: std::env::current_dir().unwrap_or_default(),
            build_root: PathBuf::from("build"),
        }
    }

    /// Binary install prefix; `None` means "same as prefix".
    pub fn bin_prefix(mut self, bin_prefix: Option<PathBuf>) -> Self {
        self.bin_prefix = bin_prefix;
        self
    }

    pub fn overrides(mut self, overrides: EnvOverrides) -> Self {
        self.overrides = overrides;
        self
    }

    pub fn platform(mut self, platform: Platform) -> Self {
        self.platform = platform;
        self
    }

    /// Flag registry registered before anything else.
    pub fn defines(mut self, defines: Defines) -> Self {
        self.defines = defines;
        self
    }

    pub fn cxx_std(mut self, cxx_std: CppStandard) -> Self {
        self.cxx_std = cxx_std;
        self
    }

    /// Directory relative prefixes and `DESTDIR` are resolved against.
    pub fn base_dir(mut self, base_dir: impl Into<PathBuf>) -> Self {
        self.base_dir = base_dir.into();
        self
    }

    /// Parent of the per-mode variant directories.
    pub fn build_root(mut self, build_root: impl Into<PathBuf>) -> Self {
        self.build_root = build_root.into();
        self
    }

    /// Construct the environment.
    pub fn build(self) -> Environment {
        let prefix = absolute_from(&self.base_dir, &self.prefix);
        let bin_prefix = self
            .bin_prefix
            .as_deref()
            .map(|b| absolute_from(&self.base_dir, b))
            .unwrap_or_else(|| prefix.clone());

        let mut flags = FlagSet::with_defaults();
        self.defines.register_into(&mut flags.cppdefines);

        let base = BaseConfig {
            tools: ToolSet::defaults(&self.platform),
            flags,
        };
        let BaseConfig { tools, mut flags } = self.overrides.apply(&base);

        let destdir = self
            .overrides
            .destdir()
            .map(|d| absolute_from(&self.base_dir, &d));
        let (install_prefix, bin_install_prefix) = match &destdir {
            Some(root) => (reroot(root, &prefix), reroot(root, &bin_prefix)),
            None => (prefix.clone(), bin_prefix.clone()),
        };

        let compiler = CompilerKind::detect(&tools.cxx);
        flags.append_compile(compiler.extra_flags());

        flags.append_compile_and_link(&[self.cxx_std.as_flag()]);
        flags.append_compile_and_link(WARNING_FLAGS);

        flags.append_compile_and_link(&self.platform.flags());
        flags.cflags.extend(self.platform.arch_flags());
        flags
            .cppdefines
            .extend(self.platform.defines().iter().map(|d| Define::flag(*d)));

        if self.mode.is_debug() {
            flags.append_codegen(DEBUG_FLAG);
            flags.cppdefines.push(Define::flag(DEBUG_DEFINE));
        } else {
            flags.append_codegen(OPTIMIZE_FLAG);
        }

        flags.cppdefines.push(Define::valued(
            INSTALL_PREFIX_DEFINE,
            format!("\"{}\"", prefix.display()),
        ));

        let env = Environment {
            mode: self.mode,
            platform: self.platform,
            compiler,
            cxx_std: self.cxx_std,
            tools,
            flags,
            defines: self.defines,
            prefix,
            bin_prefix,
            destdir,
            install_prefix,
            bin_install_prefix,
            variant_dir: self.build_root.join(self.mode.as_str()),
        };

        tracing::info!(
            "{} environment: {} ({}) -> {}",
            env.mode,
            env.tools.cxx.display(),
            env.compiler,
            env.install_prefix.display()
        );
        tracing::debug!("{} fingerprint {}", env.mode, env.fingerprint());

        env
    }
}

/// Construct an environment from its inputs.
pub fn build_environment(
    mode: BuildMode,
    prefix: &Path,
    bin_prefix: Option<&Path>,
    overrides: &EnvOverrides,
    platform: Platform,
) -> Environment {
    EnvironmentBuilder::new(mode, prefix)
        .bin_prefix(bin_prefix.map(Path::to_path_buf))
        .overrides(overrides.clone())
        .platform(platform)
        .build()
}
