//! CLI definitions using clap.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use clap_complete::Shell;

use kiln::core::defines::Define;
use kiln::core::language::CppStandard;
use kiln::core::mode::{BuildMode, ModeSelection};

/// kiln - build environments, install staging and packaging for C/C++ projects
#[derive(Parser)]
#[command(name = "kiln")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Build targets (default: install)
    Build(BuildArgs),

    /// Print the build graph as JSON
    Plan(PlanArgs),

    /// Show the tools and flags of one environment
    Flags(FlagsArgs),

    /// Show resolved tools and compiler kind
    Toolchain(ToolchainArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

/// Options shared by every command that reads the project.
#[derive(Args, Clone, Default)]
pub struct ProjectArgs {
    /// Path to Kiln.toml (defaults to searching upwards from the current directory)
    #[arg(long, value_name = "PATH")]
    pub manifest_path: Option<PathBuf>,

    /// Install prefix [default: ./install]
    #[arg(long, value_name = "DIR")]
    pub prefix: Option<PathBuf>,

    /// Binary install prefix [default: the install prefix]
    #[arg(long, value_name = "DIR")]
    pub bin_prefix: Option<PathBuf>,

    /// Add a preprocessor definition
    #[arg(short = 'D', long = "define", value_name = "NAME[=VALUE]")]
    pub defines: Vec<Define>,

    /// C++ standard (11, 14, 17, 20)
    #[arg(long, value_name = "STD")]
    pub std: Option<CppStandard>,
}

/// Options that shape the build graph.
#[derive(Args, Clone, Default)]
pub struct GraphArgs {
    /// Modes to build: all, debug or release [default: all]
    #[arg(long, value_name = "MODE")]
    pub mode: Option<ModeSelection>,

    #[command(flatten)]
    pub project: ProjectArgs,
}

#[derive(Args)]
pub struct BuildArgs {
    /// Aliases to build (install, apps, samples, all, package)
    pub targets: Vec<String>,

    #[command(flatten)]
    pub graph: GraphArgs,

    /// Number of parallel jobs
    #[arg(short, long)]
    pub jobs: Option<usize>,

    /// Print the actions without running them
    #[arg(long)]
    pub dry_run: bool,

    /// Write compile_commands.json next to Kiln.toml
    #[arg(long)]
    pub emit_compile_commands: bool,
}

#[derive(Args)]
pub struct PlanArgs {
    #[command(flatten)]
    pub graph: GraphArgs,

    /// Write the plan to a file instead of stdout
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,
}

#[derive(Args)]
pub struct FlagsArgs {
    /// Environment to show: debug, release or retail
    #[arg(long, default_value = "release")]
    pub mode: BuildMode,

    #[command(flatten)]
    pub project: ProjectArgs,

    /// Print the environment as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Args)]
pub struct ToolchainArgs {
    /// Print compiler version lines
    #[arg(long)]
    pub versions: bool,
}

#[derive(Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    pub shell: Shell,
}
