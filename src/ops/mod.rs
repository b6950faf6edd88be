//! High-level operations.
//!
//! This module contains the implementation of kiln commands.

pub mod kiln_build;

pub use kiln_build::{build, construct_graph, BuildOptions, OrchestratorConfig};
