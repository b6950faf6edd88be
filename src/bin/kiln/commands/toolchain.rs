//! `kiln toolchain` command

use std::path::Path;

use anyhow::Result;

use crate::cli::ToolchainArgs;
use kiln::builder::overrides::{BaseConfig, EnvOverrides};
use kiln::builder::environment::FlagSet;
use kiln::builder::toolchain::{CompilerKind, ToolSet};
use kiln::core::platform::Platform;
use kiln::util::process::{find_executable, ProcessBuilder};

pub fn execute(args: ToolchainArgs) -> Result<()> {
    let platform = Platform::host();
    let overrides = EnvOverrides::from_env();
    let base = BaseConfig {
        tools: ToolSet::defaults(&platform),
        flags: FlagSet::with_defaults(),
    };
    let tools = overrides.apply(&base).tools;

    println!("Toolchain:");
    println!();
    show_tool("CC", &tools.cc, args.versions);
    show_tool("CXX", &tools.cxx, args.versions);
    show_tool("AR", &tools.ar, false);
    show_tool("LINK", &tools.link, false);
    println!();
    println!("  Compiler kind: {}", CompilerKind::detect(&tools.cxx));
    println!("  Platform:      {}", platform);
    println!(
        "  Packaging:     {}",
        if platform.supports_packaging() { "yes" } else { "no" }
    );

    let overridden: Vec<String> = overrides.iter().map(|(k, v)| format!("{}={}", k, v)).collect();
    if !overridden.is_empty() {
        println!();
        println!("  Overrides:     {}", overridden.join(" "));
    }

    Ok(())
}

fn show_tool(label: &str, tool: &Path, version: bool) {
    let Some(resolved) = find_executable(tool) else {
        println!("  {:<5} {} (not found)", format!("{}:", label), tool.display());
        return;
    };
    println!("  {:<5} {}", format!("{}:", label), resolved.display());

    if version {
        let first_line = ProcessBuilder::new(&resolved)
            .arg("--version")
            .exec()
            .ok()
            .and_then(|out| {
                String::from_utf8_lossy(&out.stdout)
                    .lines()
                    .next()
                    .map(|l| l.trim().to_string())
            });
        if let Some(line) = first_line {
            println!("        {}", line);
        }
    }
}
