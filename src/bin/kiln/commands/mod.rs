//! Command implementations

pub mod build;
pub mod completions;
pub mod flags;
pub mod plan;
pub mod toolchain;

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};

use crate::cli::{GraphArgs, ProjectArgs};
use kiln::builder::overrides::EnvOverrides;
use kiln::core::project::{find_manifest, ProjectManifest};
use kiln::ops::OrchestratorConfig;
use kiln::util::config::{global_config_path, load_config, project_config_path, Config};
use kiln::util::diagnostic::suggestions;
use kiln::util::fs::absolute_from;

/// A loaded project with its merged settings.
pub struct Project {
    pub manifest: ProjectManifest,
    pub config: Config,
}

impl Project {
    /// Find and load Kiln.toml plus the config files that apply to it.
    pub fn load(args: &ProjectArgs) -> Result<Self> {
        let cwd = std::env::current_dir().context("failed to read the current directory")?;
        let manifest_path = match &args.manifest_path {
            Some(path) => absolute_from(&cwd, path),
            None => match find_manifest(&cwd) {
                Some(path) => path,
                None => bail!(
                    "could not find Kiln.toml in {} or any parent directory\n{}",
                    cwd.display(),
                    suggestions::NO_MANIFEST
                ),
            },
        };
        Self::load_from(&manifest_path)
    }

    /// Load like [`Project::load`], but an absent manifest is not an error.
    pub fn load_optional(args: &ProjectArgs) -> Result<Option<Self>> {
        if args.manifest_path.is_some() {
            return Self::load(args).map(Some);
        }
        let cwd = std::env::current_dir().context("failed to read the current directory")?;
        find_manifest(&cwd).map(|p| Self::load_from(&p)).transpose()
    }

    fn load_from(manifest_path: &Path) -> Result<Self> {
        let manifest = ProjectManifest::load(manifest_path)?;
        tracing::debug!("using manifest {}", manifest_path.display());

        let global = global_config_path();
        let config = load_config(global.as_deref(), &project_config_path(manifest.root()));
        Ok(Project { manifest, config })
    }

    /// Orchestrator settings: command line > project config > global config.
    pub fn orchestrator_config(&self, args: &GraphArgs) -> Result<OrchestratorConfig> {
        let mut cfg =
            OrchestratorConfig::for_project(&self.manifest, &self.config, EnvOverrides::from_env());
        if let Some(mode) = args.mode {
            cfg.selection = mode;
        }
        apply_project_args(&mut cfg, &args.project)?;
        Ok(cfg)
    }
}

/// Apply the command-line prefix, define and standard options.
/// Command-line paths are relative to the current directory.
pub fn apply_project_args(cfg: &mut OrchestratorConfig, args: &ProjectArgs) -> Result<()> {
    let cwd = std::env::current_dir().context("failed to read the current directory")?;
    let resolve = |p: &PathBuf| absolute_from(&cwd, p);

    if let Some(prefix) = &args.prefix {
        cfg.prefix = resolve(prefix);
    }
    if let Some(bin_prefix) = &args.bin_prefix {
        cfg.bin_prefix = Some(resolve(bin_prefix));
    }
    for define in &args.defines {
        cfg.defines.set(define.clone());
    }
    if let Some(std) = args.std {
        cfg.cxx_std = std;
    }
    Ok(())
}
