//! Build environments and the build graph.
//!
//! This module turns a mode and a prefix into a fully configured
//! [`Environment`], and environments into a [`BuildGraph`] of compile,
//! archive, link, install and package actions.

pub mod environment;
pub mod executor;
pub mod graph;
pub mod install;
pub mod overrides;
pub mod package;
pub mod subbuild;
pub mod toolchain;

pub use environment::{build_environment, Environment, EnvironmentBuilder, FlagSet};
pub use executor::{ExecutionReport, GraphExecutor};
pub use graph::{Action, BuildGraph, NodeId};
pub use install::{install_tree, plan_install_tree, symlink, InstallMapping};
pub use overrides::EnvOverrides;
pub use package::{Packager, TarballPackager};
pub use subbuild::{ArtifactHandle, BuildArtifacts, ManifestSubBuild, SubBuild};
pub use toolchain::{CommandSpec, CompilerKind, ToolSet};
