//! Implementation of `kiln build` and `kiln plan`.
//!
//! [`construct_graph`] turns an [`OrchestratorConfig`] into a [`BuildGraph`]:
//! one environment per applicable mode, sub-build actions for each, and the
//! install/package aliases wired on top. Nothing is executed here.

use std::path::{Path, PathBuf};

use anyhow::{bail, Result};
use tempfile::NamedTempFile;

use crate::builder::environment::{Environment, EnvironmentBuilder};
use crate::builder::executor::{ExecutionReport, GraphExecutor};
use crate::builder::graph::{Action, BuildGraph, NodeId};
use crate::builder::install::{plan_install_tree, InstallTree};
use crate::builder::overrides::EnvOverrides;
use crate::builder::package::Packager;
use crate::builder::subbuild::{ArtifactHandle, BuildArtifacts, SubBuild};
use crate::core::defines::Defines;
use crate::core::errors::BuildError;
use crate::core::language::CppStandard;
use crate::core::mode::{BuildMode, ModeSelection};
use crate::core::platform::Platform;
use crate::core::project::ProjectManifest;
use crate::util::config::Config;
use crate::util::diagnostic::{suggestions, Diagnostic};

/// Install prefix of the retail environment.
pub const RETAIL_PREFIX: &str = "/usr/local";

/// Target built when none is named.
pub const DEFAULT_TARGET: &str = "install";

/// Alias names registered by the orchestrator.
pub mod aliases {
    pub const INSTALL: &str = "install";
    pub const APPS: &str = "apps";
    pub const SAMPLES: &str = "samples";
    pub const ALL: &str = "all";
    pub const PACKAGE: &str = "package";
}

/// Everything graph construction depends on.
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    pub selection: ModeSelection,
    pub prefix: PathBuf,
    pub bin_prefix: Option<PathBuf>,
    pub overrides: EnvOverrides,
    pub platform: Platform,
    /// Project name, used for `etc/<project>`
    pub project: String,
    pub defines: Defines,
    pub cxx_std: CppStandard,
    /// Directory relative paths are resolved against
    pub base_dir: PathBuf,
    /// Parent of the `build/<mode>` directories
    pub build_root: PathBuf,
    pub retail_prefix: PathBuf,
    /// Where the retail package is installed
    pub package_dir: PathBuf,
}

impl OrchestratorConfig {
    /// Defaults for everything but the project name and prefix.
    pub fn new(project: impl Into<String>, prefix: impl Into<PathBuf>) -> Self {
        let base_dir = std::env::current_dir().unwrap_or_default();
        OrchestratorConfig {
            selection: ModeSelection::default(),
            prefix: prefix.into(),
            bin_prefix: None,
            overrides: EnvOverrides::none(),
            platform: Platform::host(),
            project: project.into(),
            defines: Defines::new(),
            cxx_std: CppStandard::default(),
            build_root: base_dir.join("build"),
            package_dir: base_dir.clone(),
            base_dir,
            retail_prefix: PathBuf::from(RETAIL_PREFIX),
        }
    }

    /// Configuration for a manifest, with settings from config files.
    /// Relative paths resolve against the manifest's directory.
    pub fn for_project(manifest: &ProjectManifest, config: &Config, overrides: EnvOverrides) -> Self {
        let root = manifest.root().to_path_buf();
        let mut cfg = OrchestratorConfig::new(manifest.name(), config.prefix());
        cfg.selection = config.build.mode.unwrap_or_default();
        cfg.bin_prefix = config.build.bin_prefix.clone();
        cfg.overrides = overrides;
        cfg.defines = manifest.defines();
        cfg.cxx_std = manifest.build.cxx_std;
        cfg.build_root = root.join("build");
        cfg.package_dir = root.clone();
        cfg.base_dir = root;
        cfg
    }

    fn environment(&self, mode: BuildMode, prefix: &Path, bin_prefix: Option<&Path>) -> Environment {
        EnvironmentBuilder::new(mode, prefix)
            .bin_prefix(bin_prefix.map(Path::to_path_buf))
            .overrides(self.overrides.clone())
            .platform(self.platform)
            .defines(self.defines.clone())
            .cxx_std(self.cxx_std)
            .base_dir(&self.base_dir)
            .build_root(&self.build_root)
            .build()
    }
}

/// Build the graph for every applicable mode.
///
/// `all` covers release and debug. Retail runs whenever the platform
/// supports packaging. Collaborator errors are returned unchanged and abort
/// construction; no action has run at that point.
pub fn construct_graph(
    cfg: &OrchestratorConfig,
    sub_build: &dyn SubBuild,
    packager: &dyn Packager,
) -> Result<BuildGraph, BuildError> {
    let mut graph = BuildGraph::new();

    for &mode in cfg.selection.modes() {
        match mode {
            BuildMode::Release => release(cfg, sub_build, &mut graph)?,
            BuildMode::Debug => debug(cfg, sub_build, &mut graph)?,
            BuildMode::Retail => {}
        }
    }

    if cfg.platform.supports_packaging() {
        retail(cfg, sub_build, packager, &mut graph)?;
    } else {
        tracing::debug!("{} does not package; skipping retail", cfg.platform);
    }

    let default = if graph.get_alias(DEFAULT_TARGET).is_some() {
        DEFAULT_TARGET
    } else {
        aliases::ALL
    };
    graph.set_default_target(default);

    Ok(graph)
}

fn release(
    cfg: &OrchestratorConfig,
    sub_build: &dyn SubBuild,
    graph: &mut BuildGraph,
) -> Result<(), BuildError> {
    let bin_prefix = cfg.bin_prefix.as_deref().unwrap_or(&cfg.prefix);
    let env = cfg.environment(BuildMode::Release, &cfg.prefix, Some(bin_prefix));
    let artifacts = sub_build.build(&env, graph)?;

    let bin_dir = env.bin_install_prefix().join("bin");
    let etc_dir = env.install_prefix().join("etc").join(&cfg.project);

    let mut installs = install_artifacts(graph, BuildMode::Release, &bin_dir, &artifacts.apps);
    installs.extend(install_trees(
        graph,
        BuildMode::Release,
        &etc_dir,
        &artifacts.configurations,
    )?);

    graph.alias(aliases::INSTALL, BuildMode::Release, installs);
    register_build_aliases(graph, BuildMode::Release, &artifacts);
    graph.alias_includes(
        aliases::ALL,
        BuildMode::Release,
        &[aliases::INSTALL, aliases::APPS, aliases::SAMPLES],
    );

    graph.add_environment(env);
    Ok(())
}

fn debug(
    cfg: &OrchestratorConfig,
    sub_build: &dyn SubBuild,
    graph: &mut BuildGraph,
) -> Result<(), BuildError> {
    // debug builds never install, so no binary prefix is passed
    let env = cfg.environment(BuildMode::Debug, &cfg.prefix, None);
    let artifacts = sub_build.build(&env, graph)?;

    register_build_aliases(graph, BuildMode::Debug, &artifacts);
    graph.alias_includes(
        aliases::ALL,
        BuildMode::Debug,
        &[aliases::APPS, aliases::SAMPLES],
    );

    graph.add_environment(env);
    Ok(())
}

fn retail(
    cfg: &OrchestratorConfig,
    sub_build: &dyn SubBuild,
    packager: &dyn Packager,
    graph: &mut BuildGraph,
) -> Result<(), BuildError> {
    let env = cfg.environment(BuildMode::Retail, &cfg.retail_prefix, None);
    let artifacts = sub_build.build(&env, graph)?;
    let package = packager.package(
        &env,
        graph,
        &artifacts.apps,
        &artifacts.configurations,
        &cfg.retail_prefix,
    )?;

    let installed = install_artifacts(
        graph,
        BuildMode::Retail,
        &cfg.package_dir,
        std::slice::from_ref(&package),
    );
    graph.alias(aliases::PACKAGE, BuildMode::Retail, installed);

    graph.add_environment(env);
    Ok(())
}

fn register_build_aliases(graph: &mut BuildGraph, mode: BuildMode, artifacts: &BuildArtifacts) {
    graph.alias(aliases::APPS, mode, BuildArtifacts::nodes(&artifacts.apps));
    graph.alias(aliases::SAMPLES, mode, BuildArtifacts::nodes(&artifacts.samples));
}

/// One copy action per handle into `dir`, each waiting on the handle's
/// producer.
fn install_artifacts(
    graph: &mut BuildGraph,
    mode: BuildMode,
    dir: &Path,
    handles: &[ArtifactHandle],
) -> Vec<NodeId> {
    handles
        .iter()
        .map(|handle| {
            let node = copy_action(graph, mode, handle.path.clone(), dir.join(handle.file_name()));
            if let Some(producer) = handle.node {
                graph.add_dependency(producer, node);
            }
            node
        })
        .collect()
}

/// One copy action per file of each tree, keeping its layout under `dir`.
fn install_trees(
    graph: &mut BuildGraph,
    mode: BuildMode,
    dir: &Path,
    trees: &[InstallTree],
) -> Result<Vec<NodeId>, BuildError> {
    let mut nodes = Vec::new();
    for tree in trees {
        for mapping in plan_install_tree(dir, &tree.root, &tree.patterns)? {
            nodes.push(copy_action(graph, mode, mapping.source, mapping.destination));
        }
    }
    Ok(nodes)
}

fn copy_action(graph: &mut BuildGraph, mode: BuildMode, from: PathBuf, to: PathBuf) -> NodeId {
    graph.add_action(
        mode,
        format!("install {}", to.display()),
        Action::Copy { from, to },
    )
}

/// Warnings for release install prefixes the current user cannot write to.
/// Staged installs (`DESTDIR`) are never checked.
pub fn install_warnings(graph: &BuildGraph) -> Vec<Diagnostic> {
    let Some(env) = graph.environment(BuildMode::Release) else {
        return Vec::new();
    };
    if env.destdir().is_some() {
        return Vec::new();
    }

    let mut dirs = vec![env.install_prefix(), env.bin_install_prefix()];
    dirs.dedup();
    dirs.into_iter()
        .filter(|dir| !is_writable(dir))
        .map(|dir| {
            Diagnostic::warning(format!("install prefix `{}` is not writable", dir.display()))
                .with_location(dir)
                .with_suggestion(suggestions::STAGE_WITH_DESTDIR)
        })
        .collect()
}

/// Whether files can be created in `dir`, or in its closest existing
/// ancestor when it does not exist yet.
fn is_writable(dir: &Path) -> bool {
    match dir.ancestors().find(|a| a.exists()) {
        Some(existing) if existing.is_dir() => NamedTempFile::new_in(existing).is_ok(),
        _ => false,
    }
}

/// Options for executing a constructed graph.
#[derive(Debug, Clone, Default)]
pub struct BuildOptions {
    /// Aliases to build (empty = the graph's default target)
    pub targets: Vec<String>,

    /// Number of parallel jobs
    pub jobs: Option<usize>,

    /// Print actions without running them
    pub dry_run: bool,

    /// Write compile_commands.json into the project root
    pub emit_compile_commands: bool,

    /// Verbose output
    pub verbose: bool,
}

/// Execute `graph` for the requested targets.
pub fn build(graph: &BuildGraph, opts: &BuildOptions, project_root: &Path) -> Result<ExecutionReport> {
    if opts.emit_compile_commands {
        let path = project_root.join("compile_commands.json");
        graph.emit_compile_commands(project_root, &path)?;
        tracing::info!("wrote {}", path.display());
    }

    let targets = if opts.targets.is_empty() {
        vec![graph.default_target().unwrap_or(DEFAULT_TARGET).to_string()]
    } else {
        opts.targets.clone()
    };
    tracing::info!("building {}", targets.join(", "));

    let report = GraphExecutor::new(graph)
        .jobs(opts.jobs)
        .dry_run(opts.dry_run)
        .verbose(opts.verbose)
        .execute(&targets)?;

    if !report.is_success() {
        bail!(
            "build failed: {} action(s) failed, {} skipped",
            report.failed.len(),
            report.skipped.len()
        );
    }
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::package::TarballPackager;
    use crate::builder::subbuild::ManifestSubBuild;
    use crate::core::platform::{Arch, PlatformKind};
    use crate::test_support::{MockPackager, MockSubBuild, ProjectFixture};
    use tempfile::TempDir;

    /// `etc/greeter.conf`, `etc/locales/en.conf` and an uninstalled README.
    fn config_dir() -> TempDir {
        let tmp = TempDir::new().unwrap();
        let etc = tmp.path().join("etc");
        std::fs::create_dir_all(etc.join("locales")).unwrap();
        std::fs::write(etc.join("greeter.conf"), "greeting = hi\n").unwrap();
        std::fs::write(etc.join("locales/en.conf"), "lang = en\n").unwrap();
        std::fs::write(etc.join("README"), "docs\n").unwrap();
        tmp
    }

    fn linux_config(selection: ModeSelection) -> OrchestratorConfig {
        let mut cfg = OrchestratorConfig::new("greeter", "/opt/greeter");
        cfg.selection = selection;
        cfg.platform = Platform::new(PlatformKind::Linux, Arch::X86_64);
        cfg.base_dir = PathBuf::from("/work");
        cfg.build_root = PathBuf::from("/work/build");
        cfg.package_dir = PathBuf::from("/work");
        cfg
    }

    fn mac_config(selection: ModeSelection) -> OrchestratorConfig {
        let mut cfg = linux_config(selection);
        cfg.platform = Platform::new(PlatformKind::MacOs, Arch::Aarch64);
        cfg
    }

    fn copy_targets(graph: &BuildGraph, alias: &str) -> Vec<PathBuf> {
        graph
            .get_alias(alias)
            .unwrap()
            .nodes()
            .iter()
            .map(|id| graph.node(*id).unwrap().action.output().to_path_buf())
            .collect()
    }

    // ========================================================================
    // Mode selection
    // ========================================================================

    #[test]
    fn test_all_builds_release_and_debug() {
        let sub = MockSubBuild::new().app("greeter").sample("hello");
        let graph = construct_graph(&linux_config(ModeSelection::All), &sub, &MockPackager::new()).unwrap();

        assert_eq!(sub.seen_modes(), vec![BuildMode::Release, BuildMode::Debug]);
        assert_eq!(graph.environments().len(), 2);
        assert_eq!(
            graph.alias_modes(aliases::APPS),
            vec![BuildMode::Debug, BuildMode::Release]
        );
        assert_eq!(graph.alias_modes(aliases::INSTALL), vec![BuildMode::Release]);
        assert_eq!(graph.default_target(), Some(DEFAULT_TARGET));
        assert!(graph.get_alias(aliases::PACKAGE).is_none());
    }

    #[test]
    fn test_release_only() {
        let sub = MockSubBuild::new().app("greeter");
        let graph =
            construct_graph(&linux_config(ModeSelection::Release), &sub, &MockPackager::new()).unwrap();

        assert_eq!(sub.seen_modes(), vec![BuildMode::Release]);
        assert!(graph.environment(BuildMode::Debug).is_none());
        assert_eq!(graph.alias_names(), vec!["all", "apps", "install", "samples"]);
    }

    #[test]
    fn test_debug_only_has_no_install() {
        let sub = MockSubBuild::new().app("greeter");
        let graph =
            construct_graph(&linux_config(ModeSelection::Debug), &sub, &MockPackager::new()).unwrap();

        assert!(graph.get_alias(aliases::INSTALL).is_none());
        assert_eq!(graph.default_target(), Some(aliases::ALL));
        let all = graph.resolve_targets(&[aliases::ALL]).unwrap();
        assert_eq!(all.len(), 1);
    }

    #[test]
    fn test_environments_are_distinct_per_mode() {
        let sub = MockSubBuild::new();
        construct_graph(&linux_config(ModeSelection::All), &sub, &MockPackager::new()).unwrap();

        let seen = sub.seen();
        assert_ne!(seen[0].1, seen[1].1);
    }

    // ========================================================================
    // Install wiring
    // ========================================================================

    #[test]
    fn test_release_install_destinations() {
        let mut cfg = linux_config(ModeSelection::Release);
        cfg.bin_prefix = Some(PathBuf::from("/usr"));
        let configs = config_dir();
        let sub = MockSubBuild::new()
            .app("greeter")
            .configs(configs.path().join("etc"), &["*.conf"]);

        let graph = construct_graph(&cfg, &sub, &MockPackager::new()).unwrap();

        assert_eq!(
            copy_targets(&graph, aliases::INSTALL),
            vec![
                PathBuf::from("/usr/bin/greeter"),
                PathBuf::from("/opt/greeter/etc/greeter/greeter.conf"),
                PathBuf::from("/opt/greeter/etc/greeter/locales/en.conf"),
            ]
        );

        // installing an app waits for the app itself
        let install = graph.get_alias(aliases::INSTALL).unwrap().nodes()[0];
        let app = graph.get_alias(aliases::APPS).unwrap().nodes()[0];
        assert_eq!(graph.dependencies(install), vec![app]);
    }

    #[test]
    fn test_config_install_matches_install_tree_plan() {
        let configs = config_dir();
        let etc = configs.path().join("etc");
        let sub = MockSubBuild::new().configs(&etc, &["*.conf"]);

        let graph =
            construct_graph(&linux_config(ModeSelection::Release), &sub, &MockPackager::new()).unwrap();

        let copies: Vec<(PathBuf, PathBuf)> = graph
            .get_alias(aliases::INSTALL)
            .unwrap()
            .nodes()
            .iter()
            .map(|id| match &graph.node(*id).unwrap().action {
                Action::Copy { from, to } => (from.clone(), to.clone()),
                other => panic!("unexpected action: {:?}", other),
            })
            .collect();
        let planned: Vec<(PathBuf, PathBuf)> =
            plan_install_tree(Path::new("/opt/greeter/etc/greeter"), &etc, &["*.conf"])
                .unwrap()
                .into_iter()
                .map(|m| (m.source, m.destination))
                .collect();

        assert_eq!(copies, planned);
    }

    #[test]
    fn test_missing_config_dir_aborts_construction() {
        let tmp = TempDir::new().unwrap();
        let sub = MockSubBuild::new()
            .app("greeter")
            .configs(tmp.path().join("nope"), &["*.conf"]);

        let err = construct_graph(&linux_config(ModeSelection::Release), &sub, &MockPackager::new())
            .unwrap_err();

        assert!(matches!(err, BuildError::Discovery { .. }));
    }

    #[test]
    fn test_destdir_stages_install() {
        let mut cfg = linux_config(ModeSelection::Release);
        cfg.overrides = EnvOverrides::none().with("DESTDIR", "/stage");
        let sub = MockSubBuild::new().app("greeter");

        let graph = construct_graph(&cfg, &sub, &MockPackager::new()).unwrap();

        assert_eq!(
            copy_targets(&graph, aliases::INSTALL),
            vec![PathBuf::from("/stage/opt/greeter/bin/greeter")]
        );
        let env = graph.environment(BuildMode::Release).unwrap();
        assert_eq!(env.prefix(), Path::new("/opt/greeter"));
    }

    #[test]
    fn test_debug_ignores_bin_prefix() {
        let mut cfg = linux_config(ModeSelection::All);
        cfg.bin_prefix = Some(PathBuf::from("/usr"));
        let graph = construct_graph(&cfg, &MockSubBuild::new(), &MockPackager::new()).unwrap();

        let release = graph.environment(BuildMode::Release).unwrap();
        let debug = graph.environment(BuildMode::Debug).unwrap();
        assert_eq!(release.bin_install_prefix(), Path::new("/usr"));
        assert_eq!(debug.bin_install_prefix(), Path::new("/opt/greeter"));
    }

    // ========================================================================
    // Retail packaging
    // ========================================================================

    #[test]
    fn test_retail_runs_on_packaging_platform() {
        let configs = config_dir();
        let sub = MockSubBuild::new()
            .app("greeter")
            .configs(configs.path().join("etc"), &["*.conf"]);
        let packager = MockPackager::new();

        let graph = construct_graph(&mac_config(ModeSelection::Debug), &sub, &packager).unwrap();

        assert_eq!(sub.seen_modes(), vec![BuildMode::Debug, BuildMode::Retail]);
        let calls = packager.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].mode, BuildMode::Retail);
        assert_eq!(calls[0].apps, 1);
        assert_eq!(calls[0].configs, 1);
        assert_eq!(calls[0].retail_prefix, PathBuf::from(RETAIL_PREFIX));

        assert_eq!(
            copy_targets(&graph, aliases::PACKAGE),
            vec![PathBuf::from("/work/mock.tar.gz")]
        );
        let retail = graph.environment(BuildMode::Retail).unwrap();
        assert_eq!(retail.install_prefix(), Path::new(RETAIL_PREFIX));
    }

    #[test]
    fn test_no_packaging_on_linux() {
        let packager = MockPackager::new();
        construct_graph(&linux_config(ModeSelection::All), &MockSubBuild::new(), &packager).unwrap();
        assert!(packager.calls().is_empty());
    }

    // ========================================================================
    // Errors
    // ========================================================================

    #[test]
    fn test_sub_build_error_propagates_unchanged() {
        let sub = MockSubBuild::new().fail_on(BuildMode::Debug);
        let err = construct_graph(&linux_config(ModeSelection::All), &sub, &MockPackager::new())
            .unwrap_err();

        match &err {
            BuildError::SubBuild {
                collaborator, mode, ..
            } => {
                assert_eq!(collaborator, "mock sub-build");
                assert_eq!(mode, "debug");
            }
            other => panic!("unexpected error: {}", other),
        }
        assert_eq!(
            std::error::Error::source(&err).unwrap().to_string(),
            "descriptor exploded"
        );
    }

    // ========================================================================
    // End to end
    // ========================================================================

    #[test]
    fn test_manifest_project_installs_configs() {
        let fixture = ProjectFixture::standard();
        let manifest = fixture.manifest();
        let mut cfg = OrchestratorConfig::for_project(&manifest, &Config::default(), EnvOverrides::none());
        cfg.selection = ModeSelection::Release;
        cfg.platform = Platform::new(PlatformKind::Linux, Arch::X86_64);

        let sub = ManifestSubBuild::new(manifest.clone());
        let packager = TarballPackager::new(manifest.name(), manifest.package_name());
        let graph = construct_graph(&cfg, &sub, &packager).unwrap();

        // only the config part of install; the app copy needs a compiler
        let etc = fixture.root().join("install/etc/greeter");
        let config_targets: Vec<String> = copy_targets(&graph, aliases::INSTALL)
            .into_iter()
            .filter(|p| p.starts_with(&etc))
            .map(|p| p.display().to_string())
            .collect();
        assert_eq!(config_targets.len(), 2);

        let plan = serde_json::to_value(graph.plan()).unwrap();
        assert_eq!(plan["default_target"], "install");
        assert_eq!(plan["environments"][0]["mode"], "release");
    }

    #[test]
    fn test_install_warnings_for_unwritable_prefix() {
        let tmp = TempDir::new().unwrap();
        let blocker = tmp.path().join("not-a-dir");
        std::fs::write(&blocker, "").unwrap();

        let mut cfg = linux_config(ModeSelection::Release);
        cfg.prefix = blocker.join("opt");
        let graph = construct_graph(&cfg, &MockSubBuild::new(), &MockPackager::new()).unwrap();

        let warnings = install_warnings(&graph);
        assert_eq!(warnings.len(), 1);
        let text = warnings[0].format(false);
        assert!(text.starts_with("warning: install prefix"), "{}", text);
        assert!(text.contains("DESTDIR"), "{}", text);
    }

    #[test]
    fn test_install_warnings_skip_writable_and_staged() {
        let tmp = TempDir::new().unwrap();

        let mut cfg = linux_config(ModeSelection::Release);
        cfg.prefix = tmp.path().join("prefix/not/yet/created");
        let graph = construct_graph(&cfg, &MockSubBuild::new(), &MockPackager::new()).unwrap();
        assert!(install_warnings(&graph).is_empty());

        let blocker = tmp.path().join("file");
        std::fs::write(&blocker, "").unwrap();
        cfg.prefix = blocker.join("opt");
        cfg.overrides = EnvOverrides::none().with("DESTDIR", tmp.path().join("stage").display().to_string());
        let graph = construct_graph(&cfg, &MockSubBuild::new(), &MockPackager::new()).unwrap();
        assert!(install_warnings(&graph).is_empty());
    }

    #[test]
    fn test_build_dry_run() {
        let sub = MockSubBuild::new().app("greeter");
        let graph =
            construct_graph(&linux_config(ModeSelection::Release), &sub, &MockPackager::new()).unwrap();
        let opts = BuildOptions {
            dry_run: true,
            ..BuildOptions::default()
        };

        let report = build(&graph, &opts, Path::new("/work")).unwrap();
        assert_eq!(report.completed.len(), 2);
    }
}
