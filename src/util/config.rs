//! Configuration file support for kiln.
//!
//! Two locations are read, project taking precedence over global:
//! - Global: `~/.kiln/config.toml` - user-wide defaults
//! - Project: `.kiln/config.toml` next to Kiln.toml
//!
//! Command-line options override both.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::core::mode::ModeSelection;

/// Default install prefix when nothing else is configured.
pub const DEFAULT_PREFIX: &str = "./install";

/// kiln configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Build settings
    pub build: BuildConfig,
}

/// `[build]` settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct BuildConfig {
    /// Default `--mode`
    pub mode: Option<ModeSelection>,

    /// Default install prefix
    pub prefix: Option<PathBuf>,

    /// Default binary install prefix
    pub bin_prefix: Option<PathBuf>,

    /// Default number of parallel jobs
    pub jobs: Option<usize>,
}

impl Config {
    /// Load configuration from a file.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config: {}", path.display()))?;

        toml::from_str(&contents)
            .with_context(|| format!("failed to parse config: {}", path.display()))
    }

    /// Load configuration, falling back to defaults if the file is missing or broken.
    pub fn load_or_default(path: &Path) -> Self {
        if !path.exists() {
            return Self::default();
        }
        Self::load(path).unwrap_or_else(|e| {
            tracing::warn!("ignoring config {}: {:#}", path.display(), e);
            Self::default()
        })
    }

    /// Merge another config into this one (other takes precedence).
    pub fn merge(&mut self, other: Config) {
        let build = other.build;
        if build.mode.is_some() {
            self.build.mode = build.mode;
        }
        if build.prefix.is_some() {
            self.build.prefix = build.prefix;
        }
        if build.bin_prefix.is_some() {
            self.build.bin_prefix = build.bin_prefix;
        }
        if build.jobs.is_some() {
            self.build.jobs = build.jobs;
        }
    }

    /// Effective install prefix.
    pub fn prefix(&self) -> PathBuf {
        self.build
            .prefix
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_PREFIX))
    }
}

/// Load merged configuration from global and project locations.
pub fn load_config(global_path: Option<&Path>, project_path: &Path) -> Config {
    let mut config = Config::default();

    if let Some(global) = global_path {
        config.merge(Config::load_or_default(global));
    }
    config.merge(Config::load_or_default(project_path));

    config
}

/// Get the global kiln config directory (`~/.kiln`).
pub fn global_config_dir() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|b| b.home_dir().join(".kiln"))
}

/// Get the global config path (`~/.kiln/config.toml`).
pub fn global_config_path() -> Option<PathBuf> {
    global_config_dir().map(|dir| dir.join("config.toml"))
}

/// Get the project config path (`.kiln/config.toml`).
pub fn project_config_path(project_root: &Path) -> PathBuf {
    project_root.join(".kiln").join("config.toml")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert!(config.build.mode.is_none());
        assert_eq!(config.prefix(), PathBuf::from("./install"));
    }

    #[test]
    fn test_project_overrides_global() {
        let tmp = TempDir::new().unwrap();
        let global = tmp.path().join("global.toml");
        let project = tmp.path().join("project.toml");

        std::fs::write(
            &global,
            "[build]\nmode = \"release\"\nprefix = \"/opt/global\"\njobs = 2\n",
        )
        .unwrap();
        std::fs::write(&project, "[build]\nprefix = \"/opt/project\"\n").unwrap();

        let config = load_config(Some(&global), &project);
        assert_eq!(config.build.mode, Some(ModeSelection::Release));
        assert_eq!(config.prefix(), PathBuf::from("/opt/project"));
        assert_eq!(config.build.jobs, Some(2));
    }

    #[test]
    fn test_broken_config_falls_back() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("config.toml");
        std::fs::write(&path, "[build\nmode = ").unwrap();

        assert_eq!(Config::load_or_default(&path), Config::default());
    }

    #[test]
    fn test_bin_prefix_key() {
        let config: Config = toml::from_str("[build]\nbin-prefix = \"/usr\"\n").unwrap();
        assert_eq!(config.build.bin_prefix, Some(PathBuf::from("/usr")));
    }
}
