//! Host platform detection and the per-platform capability table.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Operating system family the environment targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlatformKind {
    Linux,
    #[serde(alias = "darwin")]
    MacOs,
    Other,
}

impl PlatformKind {
    /// Detect the current operating system at compile time.
    pub const fn current() -> Self {
        if cfg!(target_os = "macos") {
            PlatformKind::MacOs
        } else if cfg!(target_os = "linux") {
            PlatformKind::Linux
        } else {
            PlatformKind::Other
        }
    }

    /// Get the platform name as a string.
    pub const fn as_str(&self) -> &'static str {
        match self {
            PlatformKind::Linux => "linux",
            PlatformKind::MacOs => "macos",
            PlatformKind::Other => "other",
        }
    }

    /// Flags and capabilities this platform contributes.
    pub fn capabilities(&self) -> &'static PlatformCapabilities {
        match self {
            PlatformKind::MacOs => &MACOS,
            PlatformKind::Linux | PlatformKind::Other => &GENERIC,
        }
    }
}

impl fmt::Display for PlatformKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PlatformKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "linux" => Ok(PlatformKind::Linux),
            "macos" | "darwin" | "osx" => Ok(PlatformKind::MacOs),
            "other" => Ok(PlatformKind::Other),
            _ => Err(format!(
                "unknown platform '{}'; expected 'linux', 'macos' or 'other'",
                s
            )),
        }
    }
}

/// CPU architecture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Arch {
    X86_64,
    Aarch64,
    Other,
}

impl Arch {
    /// Detect the current architecture at compile time.
    pub const fn current() -> Self {
        if cfg!(target_arch = "x86_64") {
            Arch::X86_64
        } else if cfg!(target_arch = "aarch64") {
            Arch::Aarch64
        } else {
            Arch::Other
        }
    }

    /// Name used by Apple's `-arch` flag.
    pub const fn apple_name(&self) -> &'static str {
        match self {
            Arch::X86_64 => "x86_64",
            Arch::Aarch64 => "arm64",
            Arch::Other => "x86_64",
        }
    }
}

/// The platform an environment is built for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Platform {
    pub kind: PlatformKind,
    pub arch: Arch,
}

impl Platform {
    /// Create a platform description.
    pub const fn new(kind: PlatformKind, arch: Arch) -> Self {
        Platform { kind, arch }
    }

    /// The platform kiln is running on.
    pub const fn host() -> Self {
        Platform::new(PlatformKind::current(), Arch::current())
    }

    /// Whether retail packages are produced on this platform.
    pub fn supports_packaging(&self) -> bool {
        self.kind.capabilities().packaging
    }

    /// Architecture selection, shared by C, C++ and link lines.
    pub fn arch_flags(&self) -> Vec<String> {
        if self.kind.capabilities().arch_flag {
            vec!["-arch".to_string(), self.arch.apple_name().to_string()]
        } else {
            Vec::new()
        }
    }

    /// C++ compile and link flags this platform contributes, in append order.
    pub fn flags(&self) -> Vec<String> {
        let mut flags = self.arch_flags();
        if let Some(stdlib) = self.kind.capabilities().stdlib {
            flags.push(format!("-stdlib={}", stdlib));
        }
        flags
    }

    /// Preprocessor toggles this platform defines.
    pub fn defines(&self) -> &'static [&'static str] {
        self.kind.capabilities().defines
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.kind, self.arch.apple_name())
    }
}

/// Capability table entry for a platform.
#[derive(Debug, PartialEq, Eq)]
pub struct PlatformCapabilities {
    /// Emit `-arch <name>`
    pub arch_flag: bool,
    /// Preprocessor defines (no `-D`)
    pub defines: &'static [&'static str],
    /// C++ standard library passed as `-stdlib=`
    pub stdlib: Option<&'static str>,
    /// Retail packaging runs here
    pub packaging: bool,
}

// kqueue is used on macOS; the epoll backend must stay out of the build.
static MACOS: PlatformCapabilities = PlatformCapabilities {
    arch_flag: true,
    defines: &["NO_EPOLL"],
    stdlib: Some("libc++"),
    packaging: true,
};

static GENERIC: PlatformCapabilities = PlatformCapabilities {
    arch_flag: false,
    defines: &[],
    stdlib: None,
    packaging: false,
};
