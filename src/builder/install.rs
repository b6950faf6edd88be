//! Structured installation: copy trees preserving layout, create links.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::core::errors::BuildError;
use crate::util::fs::{absolute_from, discover, symlink as fs_symlink, FileSet};

/// A file to install and where it lands.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InstallMapping {
    pub source: PathBuf,
    pub destination: PathBuf,
}

/// Files under `root` whose names match `patterns`, installed with their
/// layout below `root` preserved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InstallTree {
    pub root: PathBuf,
    pub patterns: Vec<String>,
}

impl InstallTree {
    pub fn new<S: AsRef<str>>(root: impl Into<PathBuf>, patterns: &[S]) -> Self {
        InstallTree {
            root: root.into(),
            patterns: patterns.iter().map(|p| p.as_ref().to_string()).collect(),
        }
    }

    /// The files this tree currently holds.
    pub fn files(&self) -> Result<FileSet, BuildError> {
        discover(&self.root, &self.patterns)
    }

    /// Where each file lands under `target`.
    pub fn plan(&self, target: &Path) -> Result<Vec<InstallMapping>, BuildError> {
        plan_install_tree(target, &self.root, &self.patterns)
    }
}

/// Map every file under `source` matching `patterns` to the same relative
/// path under `target`. Nothing is written.
pub fn plan_install_tree<S: AsRef<str>>(
    target: &Path,
    source: &Path,
    patterns: &[S],
) -> Result<Vec<InstallMapping>, BuildError> {
    let files = discover(source, patterns)?;
    Ok(files
        .relative()
        .map(|rel| InstallMapping {
            source: source.join(rel),
            destination: target.join(rel),
        })
        .collect())
}

/// Copy every file under `source` matching `patterns` into `target`,
/// recreating intermediate directories. Running it twice yields the same tree.
pub fn install_tree<S: AsRef<str>>(
    target: &Path,
    source: &Path,
    patterns: &[S],
) -> Result<Vec<InstallMapping>, BuildError> {
    let mappings = plan_install_tree(target, source, patterns)?;
    for mapping in &mappings {
        install_file(&mapping.source, &mapping.destination)?;
    }
    tracing::debug!(
        "installed {} file(s) from {} into {}",
        mappings.len(),
        source.display(),
        target.display()
    );
    Ok(mappings)
}

/// Copy one file, creating the destination directory.
///
/// An existing destination is replaced rather than written through, so a
/// read-only copy left by an earlier install does not block the next one.
pub fn install_file(from: &Path, to: &Path) -> Result<(), BuildError> {
    let wrap = |source| BuildError::Install {
        from: from.to_path_buf(),
        to: to.to_path_buf(),
        source,
    };

    if fs::symlink_metadata(to).is_ok() {
        if is_same_file(from, to) {
            tracing::debug!("{} is already in place", to.display());
            return Ok(());
        }
        fs::remove_file(to).map_err(wrap)?;
    } else if let Some(parent) = to.parent() {
        fs::create_dir_all(parent).map_err(wrap)?;
    }
    fs::copy(from, to).map_err(wrap)?;
    Ok(())
}

fn is_same_file(a: &Path, b: &Path) -> bool {
    match (fs::canonicalize(a), fs::canonicalize(b)) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

/// Create a symlink at `target` pointing to the absolute path of `source`.
///
/// An existing link to the same place is left alone. Anything else already
/// at `target` is an error.
pub fn symlink(target: &Path, source: &Path) -> Result<(), BuildError> {
    let cwd = std::env::current_dir()
        .map_err(|e| BuildError::link(target, source, format!("no working directory: {}", e)))?;
    let source = absolute_from(&cwd, source);

    match fs::symlink_metadata(target) {
        Ok(meta) if meta.file_type().is_symlink() => {
            let existing = fs::read_link(target)
                .map_err(|e| BuildError::link(target, &source, e.to_string()))?;
            if existing == source {
                tracing::debug!("{} already links to {}", target.display(), source.display());
                return Ok(());
            }
            return Err(BuildError::link(
                target,
                &source,
                format!("already links to {}", existing.display()),
            ));
        }
        Ok(_) => {
            return Err(BuildError::link(
                target,
                &source,
                "path exists and is not a symlink",
            ))
        }
        Err(_) => {}
    }

    if let Some(parent) = target.parent() {
        fs::create_dir_all(parent).map_err(|e| BuildError::link(target, &source, e.to_string()))?;
    }
    fs_symlink(&source, target).map_err(|e| BuildError::link(target, &source, e.to_string()))
}
