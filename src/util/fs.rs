//! Filesystem utilities: discovery, path normalization and links.

use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};

use anyhow::{Context, Result};
use glob::{MatchOptions, Pattern};
use serde::Serialize;
use walkdir::WalkDir;

use crate::core::errors::BuildError;

/// Files discovered under a root directory, sorted by relative path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileSet {
    root: PathBuf,
    files: Vec<PathBuf>,
}

impl FileSet {
    /// The directory discovery started from.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Discovered files as `root/<relative>`.
    pub fn files(&self) -> &[PathBuf] {
        &self.files
    }

    /// Discovered files relative to the root.
    pub fn relative(&self) -> impl Iterator<Item = &Path> + '_ {
        self.files
            .iter()
            .map(|f| f.strip_prefix(&self.root).unwrap_or(f))
    }

    /// Number of files.
    pub fn len(&self) -> usize {
        self.files.len()
    }

    /// Whether nothing matched.
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Iterate over the discovered files.
    pub fn iter(&self) -> std::slice::Iter<'_, PathBuf> {
        self.files.iter()
    }
}

impl IntoIterator for FileSet {
    type Item = PathBuf;
    type IntoIter = std::vec::IntoIter<PathBuf>;

    fn into_iter(self) -> Self::IntoIter {
        self.files.into_iter()
    }
}

const MATCH_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: true,
    require_literal_separator: false,
    require_literal_leading_dot: false,
};

/// Recursively find regular files under `root` whose file name matches any of
/// `patterns` (shell glob: `*`, `?`, `[...]`). No patterns matches everything.
///
/// The result is sorted by path relative to `root`, so repeated calls on an
/// unchanged tree return identical lists.
pub fn discover<S: AsRef<str>>(root: &Path, patterns: &[S]) -> Result<FileSet, BuildError> {
    if !root.exists() {
        return Err(BuildError::discovery(root, "directory does not exist"));
    }
    if !root.is_dir() {
        return Err(BuildError::discovery(root, "not a directory"));
    }

    let compiled = patterns
        .iter()
        .map(|p| {
            Pattern::new(p.as_ref()).map_err(|e| {
                BuildError::discovery(root, format!("invalid pattern `{}`: {}", p.as_ref(), e))
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    let mut relative = Vec::new();
    for entry in WalkDir::new(root).follow_links(false) {
        let entry = entry.map_err(|e| BuildError::discovery(root, e.to_string()))?;
        if !entry.file_type().is_file() {
            continue;
        }

        let name = entry.file_name().to_string_lossy();
        let matched = compiled.is_empty()
            || compiled
                .iter()
                .any(|p| p.matches_with(&name, MATCH_OPTIONS));
        if !matched {
            continue;
        }

        let rel = entry
            .path()
            .strip_prefix(root)
            .unwrap_or(entry.path())
            .to_path_buf();
        relative.push(rel);
    }

    relative.sort();
    tracing::debug!("discovered {} file(s) under {}", relative.len(), root.display());

    Ok(FileSet {
        root: root.to_path_buf(),
        files: relative.into_iter().map(|r| root.join(r)).collect(),
    })
}

/// Lexically normalize a path: drop `.` and resolve `..` without touching disk.
pub fn normalize_lexically(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                let popped = matches!(out.components().next_back(), Some(Component::Normal(_)))
                    && out.pop();
                if !popped && !out.has_root() {
                    out.push("..");
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    if out.as_os_str().is_empty() {
        out.push(".");
    }
    out
}

/// Make `path` absolute against `base`, then normalize it.
pub fn absolute_from(base: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        normalize_lexically(path)
    } else {
        normalize_lexically(&base.join(path))
    }
}

/// Re-root an absolute `path` under `root`: `/stage` + `/usr/local` is
/// `/stage/usr/local`.
pub fn reroot(root: &Path, path: &Path) -> PathBuf {
    let tail: PathBuf = path
        .components()
        .filter(|c| matches!(c, Component::Normal(_) | Component::ParentDir))
        .collect();
    normalize_lexically(&root.join(tail))
}

/// Ensure a directory exists, creating it if necessary.
pub fn ensure_dir(path: &Path) -> Result<()> {
    if !path.exists() {
        fs::create_dir_all(path)
            .with_context(|| format!("failed to create directory: {}", path.display()))?;
    }
    Ok(())
}

/// Write a string to a file, creating parent directories if needed.
pub fn write_string(path: &Path, contents: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        ensure_dir(parent)?;
    }
    fs::write(path, contents)
        .with_context(|| format!("failed to write file: {}", path.display()))
}

/// Create a symlink (platform-aware).
#[cfg(unix)]
pub fn symlink(src: &Path, dst: &Path) -> io::Result<()> {
    std::os::unix::fs::symlink(src, dst)
}

#[cfg(windows)]
pub fn symlink(src: &Path, dst: &Path) -> io::Result<()> {
    if src.is_dir() {
        std::os::windows::fs::symlink_dir(src, dst)
    } else {
        std::os::windows::fs::symlink_file(src, dst)
    }
}

#[cfg(not(any(unix, windows)))]
pub fn symlink(_src: &Path, _dst: &Path) -> io::Result<()> {
    Err(io::Error::new(
        io::ErrorKind::Unsupported,
        "symbolic links are not supported on this platform",
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn touch(path: &Path) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, "x").unwrap();
    }

    #[test]
    fn test_discover_respects_patterns() {
        let tmp = TempDir::new().unwrap();
        touch(&tmp.path().join("a.cpp"));
        touch(&tmp.path().join("a.h"));
        touch(&tmp.path().join("b.txt"));

        let set = discover(tmp.path(), &["*.cpp"]).unwrap();
        let names: Vec<_> = set.relative().collect();
        assert_eq!(names, vec![Path::new("a.cpp")]);
        assert_eq!(set.files()[0], tmp.path().join("a.cpp"));
    }

    #[test]
    fn test_discover_recurses_and_sorts() {
        let tmp = TempDir::new().unwrap();
        touch(&tmp.path().join("z.cpp"));
        touch(&tmp.path().join("net/b.cpp"));
        touch(&tmp.path().join("net/a.cpp"));
        touch(&tmp.path().join("core/x/y.cpp"));

        let first = discover(tmp.path(), &["*.cpp"]).unwrap();
        let second = discover(tmp.path(), &["*.cpp"]).unwrap();
        assert_eq!(first, second);

        let names: Vec<_> = first.relative().map(Path::to_path_buf).collect();
        assert_eq!(
            names,
            vec![
                PathBuf::from("core/x/y.cpp"),
                PathBuf::from("net/a.cpp"),
                PathBuf::from("net/b.cpp"),
                PathBuf::from("z.cpp"),
            ]
        );
    }

    #[test]
    fn test_discover_empty_patterns_match_all() {
        let tmp = TempDir::new().unwrap();
        touch(&tmp.path().join("one.conf"));
        touch(&tmp.path().join("sub/two.ini"));

        let none: &[&str] = &[];
        assert_eq!(discover(tmp.path(), none).unwrap().len(), 2);
    }

    #[test]
    fn test_discover_is_case_sensitive_with_classes() {
        let tmp = TempDir::new().unwrap();
        touch(&tmp.path().join("a.CPP"));
        touch(&tmp.path().join("b.cpp"));
        touch(&tmp.path().join("c1.h"));
        touch(&tmp.path().join("c2.h"));

        assert_eq!(discover(tmp.path(), &["*.cpp"]).unwrap().len(), 1);
        assert_eq!(discover(tmp.path(), &["c[1].?"]).unwrap().len(), 1);
    }

    #[test]
    fn test_discover_missing_root() {
        let tmp = TempDir::new().unwrap();
        let err = discover(&tmp.path().join("nope"), &["*"]).unwrap_err();
        assert!(matches!(err, BuildError::Discovery { .. }));

        let file = tmp.path().join("file.txt");
        touch(&file);
        let err = discover(&file, &["*"]).unwrap_err();
        assert!(err.to_string().contains("not a directory"));
    }

    #[test]
    fn test_discover_invalid_pattern() {
        let tmp = TempDir::new().unwrap();
        let err = discover(tmp.path(), &["[unclosed"]).unwrap_err();
        assert!(err.to_string().contains("invalid pattern"));
    }

    #[test]
    fn test_normalize_lexically() {
        assert_eq!(
            normalize_lexically(Path::new("/a/./b/../c")),
            PathBuf::from("/a/c")
        );
        assert_eq!(normalize_lexically(Path::new("/..")), PathBuf::from("/"));
        assert_eq!(normalize_lexically(Path::new("../x")), PathBuf::from("../x"));
        assert_eq!(normalize_lexically(Path::new("./")), PathBuf::from("."));
    }

    #[test]
    fn test_absolute_from() {
        assert_eq!(
            absolute_from(Path::new("/work"), Path::new("./install")),
            PathBuf::from("/work/install")
        );
        assert_eq!(
            absolute_from(Path::new("/work"), Path::new("/usr/local/")),
            PathBuf::from("/usr/local")
        );
    }

    #[test]
    fn test_reroot() {
        assert_eq!(
            reroot(Path::new("/stage"), Path::new("/usr/local")),
            PathBuf::from("/stage/usr/local")
        );
    }
}
