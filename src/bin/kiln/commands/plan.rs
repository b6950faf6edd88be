//! `kiln plan` command

use anyhow::Result;

use super::Project;
use crate::cli::PlanArgs;
use kiln::builder::package::TarballPackager;
use kiln::builder::subbuild::ManifestSubBuild;
use kiln::ops::construct_graph;
use kiln::util::fs::write_string;

pub fn execute(args: PlanArgs) -> Result<()> {
    let project = Project::load(&args.graph.project)?;
    let cfg = project.orchestrator_config(&args.graph)?;

    let manifest = &project.manifest;
    let packager = TarballPackager::new(manifest.name(), manifest.package_name());
    let sub_build = ManifestSubBuild::new(manifest.clone());
    let graph = construct_graph(&cfg, &sub_build, &packager)?;

    let json = serde_json::to_string_pretty(&graph.plan())?;
    match args.output {
        Some(path) => {
            write_string(&path, &json)?;
            eprintln!("Wrote plan to {}", path.display());
        }
        None => println!("{}", json),
    }

    Ok(())
}
