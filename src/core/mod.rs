//! Core data structures for kiln.
//!
//! - Build modes and mode selection
//! - Platforms and their capability tables
//! - The flag registry (preprocessor defines)
//! - The project manifest

pub mod defines;
pub mod errors;
pub mod language;
pub mod mode;
pub mod platform;
pub mod project;

pub use defines::{Define, Defines};
pub use errors::BuildError;
pub use language::{CppStandard, Language};
pub use mode::{BuildMode, ModeSelection};
pub use platform::{Arch, Platform, PlatformKind};
pub use project::{find_manifest, ProjectManifest, MANIFEST_NAME};
