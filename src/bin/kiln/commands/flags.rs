//! `kiln flags` command

use std::path::{Path, PathBuf};

use anyhow::Result;

use super::{apply_project_args, Project};
use crate::cli::FlagsArgs;
use kiln::builder::environment::{Environment, EnvironmentBuilder};
use kiln::builder::overrides::EnvOverrides;
use kiln::core::mode::BuildMode;
use kiln::ops::kiln_build::RETAIL_PREFIX;
use kiln::ops::OrchestratorConfig;
use kiln::util::config::{global_config_path, load_config, project_config_path};

pub fn execute(args: FlagsArgs) -> Result<()> {
    let project = Project::load_optional(&args.project)?;

    let mut cfg = match &project {
        Some(p) => OrchestratorConfig::for_project(&p.manifest, &p.config, EnvOverrides::from_env()),
        None => {
            tracing::debug!("no Kiln.toml found; using defaults");
            let global = global_config_path();
            let config = load_config(global.as_deref(), &project_config_path(Path::new(".")));
            let mut cfg = OrchestratorConfig::new("project", config.prefix());
            cfg.bin_prefix = config.build.bin_prefix;
            cfg.overrides = EnvOverrides::from_env();
            cfg
        }
    };
    apply_project_args(&mut cfg, &args.project)?;

    let (prefix, bin_prefix) = match args.mode {
        BuildMode::Release => (cfg.prefix.clone(), cfg.bin_prefix.clone()),
        BuildMode::Debug => (cfg.prefix.clone(), None),
        BuildMode::Retail => (PathBuf::from(RETAIL_PREFIX), None),
    };
    let env = EnvironmentBuilder::new(args.mode, prefix)
        .bin_prefix(bin_prefix)
        .overrides(cfg.overrides.clone())
        .platform(cfg.platform)
        .defines(cfg.defines.clone())
        .cxx_std(cfg.cxx_std)
        .base_dir(&cfg.base_dir)
        .build_root(&cfg.build_root)
        .build();

    if args.json {
        println!("{}", serde_json::to_string_pretty(&env)?);
    } else {
        print_environment(&env);
    }

    Ok(())
}

fn print_environment(env: &Environment) {
    let tools = env.tools();
    let flags = env.flags();
    let join = |list: &[String]| list.join(" ");
    let defines: Vec<String> = flags.cppdefines.iter().map(|d| d.to_arg()).collect();

    println!("Environment: {} ({})", env.mode(), env.platform());
    println!("Fingerprint: {}", env.fingerprint());
    println!("Compiler:    {} ({})", tools.cxx.display(), env.compiler());
    println!();
    println!("  CC:        {}", tools.cc.display());
    println!("  CXX:       {}", tools.cxx.display());
    println!("  AR:        {}", tools.ar.display());
    println!("  LINK:      {}", tools.link.display());
    println!();
    println!("  CFLAGS:    {}", join(&flags.cflags));
    println!("  CXXFLAGS:  {}", join(&flags.cxxflags));
    println!("  CPPFLAGS:  {}", join(&flags.cppflags));
    println!("  DEFINES:   {}", defines.join(" "));
    println!("  LINKFLAGS: {}", join(&flags.linkflags));
    println!("  ARFLAGS:   {}", join(&flags.arflags));
    println!("  LIBS:      {}", join(&flags.libs));
    println!();
    println!("  Prefix:             {}", env.prefix().display());
    println!("  Install prefix:     {}", env.install_prefix().display());
    println!("  Bin install prefix: {}", env.bin_install_prefix().display());
    println!("  Variant dir:        {}", env.variant_dir().display());
}
