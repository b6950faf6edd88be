//! Error types for environment construction, discovery and installation.

use std::path::PathBuf;

use miette::Diagnostic as MietteDiagnostic;
use thiserror::Error;

use crate::util::diagnostic::{suggestions, Diagnostic};

/// Opaque error raised by a sub-build or packaging collaborator.
pub type CollaboratorError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Error raised while constructing or executing a build graph.
#[derive(Debug, Error, MietteDiagnostic)]
pub enum BuildError {
    #[error("invalid build mode `{value}`")]
    #[diagnostic(code(kiln::mode::invalid), help("pass all, debug or release to `--mode`"))]
    InvalidMode { value: String, expected: String },

    #[error("cannot discover files under `{}`: {reason}", root.display())]
    #[diagnostic(code(kiln::discovery))]
    Discovery { root: PathBuf, reason: String },

    #[error("cannot link `{}` -> `{}`: {reason}", target.display(), source_path.display())]
    #[diagnostic(code(kiln::install::link))]
    Link {
        target: PathBuf,
        source_path: PathBuf,
        reason: String,
    },

    #[error("failed to install `{}` to `{}`", from.display(), to.display())]
    #[diagnostic(code(kiln::install::copy))]
    Install {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{collaborator} failed for the {mode} environment")]
    #[diagnostic(code(kiln::subbuild))]
    SubBuild {
        collaborator: String,
        mode: String,
        #[source]
        source: CollaboratorError,
    },

    #[error("unknown alias `{name}`")]
    #[diagnostic(code(kiln::alias::unknown))]
    UnknownAlias { name: String, available: Vec<String> },

    #[error("invalid manifest `{}`: {message}", path.display())]
    #[diagnostic(code(kiln::manifest))]
    Manifest { path: PathBuf, message: String },
}

impl BuildError {
    /// Shorthand for a discovery failure.
    pub fn discovery(root: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        BuildError::Discovery {
            root: root.into(),
            reason: reason.into(),
        }
    }

    /// Shorthand for a symlink failure.
    pub fn link(
        target: impl Into<PathBuf>,
        source: impl Into<PathBuf>,
        reason: impl Into<String>,
    ) -> Self {
        BuildError::Link {
            target: target.into(),
            source_path: source.into(),
            reason: reason.into(),
        }
    }

    /// Wrap a collaborator failure without altering it.
    pub fn sub_build(
        collaborator: impl Into<String>,
        mode: impl Into<String>,
        source: impl Into<CollaboratorError>,
    ) -> Self {
        BuildError::SubBuild {
            collaborator: collaborator.into(),
            mode: mode.into(),
            source: source.into(),
        }
    }

    /// Convert to a user-friendly diagnostic.
    pub fn to_diagnostic(&self) -> Diagnostic {
        match self {
            BuildError::InvalidMode { value, expected } => {
                Diagnostic::error(format!("invalid build mode `{}`", value))
                    .with_context(format!("accepted modes: {}", expected))
                    .with_suggestion("Pass one of the accepted values to `--mode`")
            }

            BuildError::Discovery { root, reason } => {
                Diagnostic::error(format!("cannot discover files: {}", reason))
                    .with_location(root)
                    .with_suggestion("Check that the directory exists and is readable")
            }

            BuildError::Link {
                target,
                source_path,
                reason,
            } => Diagnostic::error(format!("cannot create symlink: {}", reason))
                .with_location(target)
                .with_context(format!("link would point to {}", source_path.display()))
                .with_suggestion("Remove the existing path or pick another link location"),

            BuildError::Install { from, to, source } => {
                Diagnostic::error(format!("failed to install `{}`", from.display()))
                    .with_location(to)
                    .with_context(source.to_string())
                    .with_suggestion(suggestions::STAGE_WITH_DESTDIR)
            }

            BuildError::SubBuild {
                collaborator,
                mode,
                source,
            } => Diagnostic::error(format!(
                "{} failed for the {} environment",
                collaborator, mode
            ))
            .with_context(source.to_string()),

            BuildError::UnknownAlias { name, available } => {
                let mut diag = Diagnostic::error(format!("unknown alias `{}`", name));
                if !available.is_empty() {
                    diag = diag.with_context(format!("available aliases: {}", available.join(", ")));
                }
                diag.with_suggestion("Run `kiln plan` to list the aliases of the current graph")
            }

            BuildError::Manifest { path, message } => Diagnostic::error(message.clone())
                .with_location(path)
                .with_suggestion("Fix the manifest and re-run the command"),
        }
    }
}
