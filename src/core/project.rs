//! Kiln.toml project manifest.
//!
//! The manifest names the project and describes the sub-build: which
//! directories hold libraries, apps, samples and configuration files.
//!
//! ```toml
//! [project]
//! name = "ledger"
//! version = "1.2.0"
//!
//! [build]
//! cxx-std = "17"
//!
//! [defines]
//! USE_SSL = true
//!
//! [[library]]
//! name = "core"
//! sources = "src/core"
//! includes = "include"
//!
//! [[app]]
//! name = "ledgerd"
//! sources = "src/apps/ledgerd"
//!
//! [configs]
//! dir = "conf"
//! ```

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::core::defines::{DefineValue, Defines};
use crate::core::errors::BuildError;
use crate::core::language::CppStandard;

/// Manifest file name.
pub const MANIFEST_NAME: &str = "Kiln.toml";

/// Default source patterns for compilation units.
pub const DEFAULT_SOURCE_PATTERNS: &[&str] = &["*.c", "*.cc", "*.cpp", "*.cxx"];

/// Default header patterns for include directories.
pub const DEFAULT_HEADER_PATTERNS: &[&str] = &["*.h", "*.hh", "*.hpp", "*.hxx"];

/// `[project]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectMeta {
    pub name: String,
    #[serde(default = "default_version")]
    pub version: String,
}

fn default_version() -> String {
    "0.1.0".to_string()
}

/// `[build]` section.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct BuildSection {
    /// C++ standard for every environment
    #[serde(default)]
    pub cxx_std: CppStandard,

    /// Extra libraries every app links against (without `-l`)
    #[serde(default)]
    pub libs: Vec<String>,
}

/// A library, app or sample described in the manifest.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TargetSpec {
    pub name: String,

    /// Source directory, relative to the manifest
    pub sources: PathBuf,

    /// Source patterns (defaults to C and C++ sources)
    #[serde(default)]
    pub patterns: Vec<String>,

    /// Public header directory
    #[serde(default)]
    pub includes: Option<PathBuf>,
}

impl TargetSpec {
    /// Source patterns with defaults applied.
    pub fn source_patterns(&self) -> Vec<String> {
        if self.patterns.is_empty() {
            DEFAULT_SOURCE_PATTERNS.iter().map(|s| s.to_string()).collect()
        } else {
            self.patterns.clone()
        }
    }
}

/// `[configs]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigsSpec {
    pub dir: PathBuf,
    /// Empty means every file in `dir`
    #[serde(default)]
    pub patterns: Vec<String>,
}

/// `[package]` section, used by the retail packager.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PackageSpec {
    /// Archive base name (defaults to `<name>-<version>`)
    #[serde(default)]
    pub name: Option<String>,
}

/// The parsed Kiln.toml.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectManifest {
    pub project: ProjectMeta,

    #[serde(default)]
    pub build: BuildSection,

    #[serde(default)]
    pub defines: BTreeMap<String, DefineValue>,

    #[serde(default, rename = "library")]
    pub libraries: Vec<TargetSpec>,

    #[serde(default, rename = "app")]
    pub apps: Vec<TargetSpec>,

    #[serde(default, rename = "sample")]
    pub samples: Vec<TargetSpec>,

    #[serde(default)]
    pub configs: Option<ConfigsSpec>,

    #[serde(default)]
    pub package: PackageSpec,

    /// Directory containing the manifest
    #[serde(skip)]
    root: PathBuf,
}

impl ProjectManifest {
    /// Load a manifest from disk.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read manifest: {}", path.display()))?;

        Ok(Self::parse(&content, path)?)
    }

    /// Parse manifest content. `path` is used for the root and error messages.
    pub fn parse(content: &str, path: &Path) -> Result<Self, BuildError> {
        let mut manifest: ProjectManifest =
            toml::from_str(content).map_err(|e| BuildError::Manifest {
                path: path.to_path_buf(),
                message: e.message().to_string(),
            })?;

        manifest.root = path.parent().unwrap_or(Path::new(".")).to_path_buf();
        manifest.validate(path)?;
        Ok(manifest)
    }

    fn validate(&self, path: &Path) -> Result<(), BuildError> {
        let invalid = |message: String| BuildError::Manifest {
            path: path.to_path_buf(),
            message,
        };

        if self.project.name.trim().is_empty() {
            return Err(invalid("project name must not be empty".to_string()));
        }

        let mut seen = BTreeSet::new();
        for target in self.libraries.iter().chain(&self.apps).chain(&self.samples) {
            if target.name.is_empty() || target.name.contains(['/', '\\']) {
                return Err(invalid(format!("invalid target name `{}`", target.name)));
            }
            if !seen.insert(target.name.as_str()) {
                return Err(invalid(format!("duplicate target name `{}`", target.name)));
            }
        }

        Ok(())
    }

    /// Directory containing the manifest.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Project name.
    pub fn name(&self) -> &str {
        &self.project.name
    }

    /// Flag registry from `[defines]`.
    pub fn defines(&self) -> Defines {
        Defines::from_manifest(&self.defines)
    }

    /// Archive base name for retail packages.
    pub fn package_name(&self) -> String {
        self.package
            .name
            .clone()
            .unwrap_or_else(|| format!("{}-{}", self.project.name, self.project.version))
    }

    /// Resolve a manifest-relative path.
    pub fn resolve(&self, relative: &Path) -> PathBuf {
        self.root.join(relative)
    }
}

/// Walk up from `start` looking for Kiln.toml.
pub fn find_manifest(start: &Path) -> Option<PathBuf> {
    start
        .ancestors()
        .map(|dir| dir.join(MANIFEST_NAME))
        .find(|candidate| candidate.is_file())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const SAMPLE: &str = r#"
        [project]
        name = "ledger"
        version = "1.2.0"

        [build]
        cxx-std = "17"
        libs = ["pthread"]

        [defines]
        USE_SSL = true

        [[library]]
        name = "core"
        sources = "src/core"
        includes = "include"

        [[app]]
        name = "ledgerd"
        sources = "src/apps/ledgerd"

        [[sample]]
        name = "hello"
        sources = "samples/hello"
        patterns = ["*.cpp"]

        [configs]
        dir = "conf"
    "#;

    #[test]
    fn test_parse_full_manifest() {
        let manifest = ProjectManifest::parse(SAMPLE, Path::new("/proj/Kiln.toml")).unwrap();

        assert_eq!(manifest.name(), "ledger");
        assert_eq!(manifest.root(), Path::new("/proj"));
        assert_eq!(manifest.build.cxx_std, CppStandard::Cpp17);
        assert_eq!(manifest.libraries.len(), 1);
        assert_eq!(manifest.apps[0].name, "ledgerd");
        assert_eq!(manifest.samples[0].source_patterns(), vec!["*.cpp"]);
        assert_eq!(manifest.apps[0].source_patterns().len(), 4);
        assert_eq!(manifest.defines().get("USE_SSL"), Some(None));
        assert_eq!(manifest.package_name(), "ledger-1.2.0");
        assert_eq!(
            manifest.resolve(Path::new("conf")),
            PathBuf::from("/proj/conf")
        );
    }

    #[test]
    fn test_duplicate_target_rejected() {
        let content = r#"
            [project]
            name = "dup"

            [[library]]
            name = "core"
            sources = "a"

            [[app]]
            name = "core"
            sources = "b"
        "#;

        let err = ProjectManifest::parse(content, Path::new("Kiln.toml")).unwrap_err();
        assert!(err.to_string().contains("duplicate target name `core`"));
    }

    #[test]
    fn test_missing_project_section_is_manifest_error() {
        let err = ProjectManifest::parse("[build]\n", Path::new("Kiln.toml")).unwrap_err();
        assert!(matches!(err, BuildError::Manifest { .. }));
    }

    #[test]
    fn test_find_manifest_walks_up() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(tmp.path().join(MANIFEST_NAME), "[project]\nname = \"x\"\n").unwrap();
        let nested = tmp.path().join("src").join("deep");
        std::fs::create_dir_all(&nested).unwrap();

        assert_eq!(
            find_manifest(&nested),
            Some(tmp.path().join(MANIFEST_NAME))
        );
    }
}
