//! kiln - build-environment construction for native C/C++ projects
//!
//! This crate builds per-mode compiler environments (debug, release,
//! retail), discovers sources, stages installs and wires everything into
//! a build graph that the executor runs.

pub mod builder;
pub mod core;
pub mod ops;
pub mod util;

/// Project fixtures and recording collaborators for unit tests.
#[cfg(test)]
pub mod test_support;

pub use builder::{BuildGraph, Environment, EnvironmentBuilder};
pub use core::{BuildError, BuildMode, ModeSelection};
