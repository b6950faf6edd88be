//! `kiln build` command

use anyhow::Result;

use super::Project;
use crate::cli::BuildArgs;
use kiln::builder::package::TarballPackager;
use kiln::builder::subbuild::ManifestSubBuild;
use kiln::ops::kiln_build::{build, construct_graph, install_warnings, BuildOptions};
use kiln::util::diagnostic::{emit, suggestions};

pub fn execute(args: BuildArgs, verbose: bool, color: bool) -> Result<()> {
    let project = Project::load(&args.graph.project)?;
    let cfg = project.orchestrator_config(&args.graph)?;

    let manifest = &project.manifest;
    let packager = TarballPackager::new(manifest.name(), manifest.package_name());
    let sub_build = ManifestSubBuild::new(manifest.clone());
    let graph = construct_graph(&cfg, &sub_build, &packager)?;

    for env in graph.environments() {
        eprintln!(
            "  Configured {} ({}, {}) -> {}",
            env.mode(),
            env.compiler(),
            env.fingerprint(),
            env.install_prefix().display()
        );
    }

    if !args.dry_run {
        for warning in install_warnings(&graph) {
            emit(&warning, color);
        }
    }

    // Jobs: CLI > config > None (all cores)
    let opts = BuildOptions {
        targets: args.targets,
        jobs: args.jobs.or(project.config.build.jobs),
        dry_run: args.dry_run,
        emit_compile_commands: args.emit_compile_commands,
        verbose,
    };

    if let Err(e) = build(&graph, &opts, manifest.root()) {
        if !verbose {
            eprintln!("{}", suggestions::BUILD_FAILED);
        }
        return Err(e);
    }

    Ok(())
}
