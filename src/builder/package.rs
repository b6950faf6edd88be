//! Retail packaging.
//!
//! A [`Packager`] turns the apps and configuration files of the retail
//! environment into one distributable artifact. [`TarballPackager`] lays them
//! out under the retail prefix inside a `.tar.gz`.

use std::fs::File;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use flate2::write::GzEncoder;
use flate2::Compression;
use tar::Builder;
use tempfile::NamedTempFile;

use crate::builder::environment::Environment;
use crate::builder::graph::{Action, BuildGraph};
use crate::builder::install::{InstallMapping, InstallTree};
use crate::builder::subbuild::{ArtifactHandle, BuildArtifacts};
use crate::core::errors::BuildError;
use crate::util::fs::{ensure_dir, reroot};
use crate::util::hash::sha256_file;

/// Produces a package from retail artifacts.
pub trait Packager {
    /// Add packaging actions to `graph` and return the package handle.
    fn package(
        &self,
        env: &Environment,
        graph: &mut BuildGraph,
        apps: &[ArtifactHandle],
        configs: &[InstallTree],
        retail_prefix: &Path,
    ) -> Result<ArtifactHandle, BuildError>;
}

/// Packs apps into `<prefix>/bin` and configs into `<prefix>/etc/<project>`.
#[derive(Debug, Clone)]
pub struct TarballPackager {
    project: String,
    package_name: String,
}

impl TarballPackager {
    /// `package_name` is the archive's base name and top-level directory.
    pub fn new(project: impl Into<String>, package_name: impl Into<String>) -> Self {
        TarballPackager {
            project: project.into(),
            package_name: package_name.into(),
        }
    }

    /// Archive file name.
    pub fn file_name(&self) -> String {
        format!("{}.tar.gz", self.package_name)
    }

    /// Archive layout for the given artifacts, relative to the package root.
    pub fn entries(
        &self,
        apps: &[ArtifactHandle],
        configs: &[InstallTree],
        retail_prefix: &Path,
    ) -> Result<Vec<InstallMapping>, BuildError> {
        let prefix = reroot(Path::new(""), retail_prefix);
        let bin = prefix.join("bin");
        let etc = prefix.join("etc").join(&self.project);

        let mut entries: Vec<InstallMapping> = apps
            .iter()
            .map(|app| InstallMapping {
                source: app.path.clone(),
                destination: bin.join(app.file_name()),
            })
            .collect();
        for tree in configs {
            entries.extend(tree.plan(&etc)?);
        }
        Ok(entries)
    }
}

impl Packager for TarballPackager {
    fn package(
        &self,
        env: &Environment,
        graph: &mut BuildGraph,
        apps: &[ArtifactHandle],
        configs: &[InstallTree],
        retail_prefix: &Path,
    ) -> Result<ArtifactHandle, BuildError> {
        let output = env.variant_dir().join(self.file_name());
        let entries = self.entries(apps, configs, retail_prefix)?;
        tracing::info!("packaging {} file(s) into {}", entries.len(), output.display());

        let node = graph.add_action(
            env.mode(),
            format!("package {}", self.file_name()),
            Action::Package {
                output: output.clone(),
                root: PathBuf::from(&self.package_name),
                entries,
            },
        );
        for dep in BuildArtifacts::nodes(apps) {
            graph.add_dependency(dep, node);
        }

        Ok(ArtifactHandle::built(node, output))
    }
}

/// Write a gzip-compressed tarball of `entries` under `root/` and return its
/// SHA256. The archive is written to a temporary file and renamed into place.
pub fn write_tarball(output: &Path, root: &Path, entries: &[InstallMapping]) -> Result<String> {
    let dir = output.parent().unwrap_or(Path::new("."));
    ensure_dir(dir)?;

    let tmp = NamedTempFile::new_in(dir)
        .with_context(|| format!("failed to create temporary file in {}", dir.display()))?;
    {
        let encoder = GzEncoder::new(tmp.as_file(), Compression::default());
        let mut builder = Builder::new(encoder);
        builder.follow_symlinks(true);

        for entry in entries {
            let name = root.join(&entry.destination);
            let mut file = File::open(&entry.source)
                .with_context(|| format!("failed to open {}", entry.source.display()))?;
            builder
                .append_file(&name, &mut file)
                .with_context(|| format!("failed to add {} to package", name.display()))?;
        }

        builder
            .into_inner()
            .and_then(|encoder| encoder.finish())
            .with_context(|| format!("failed to finish {}", output.display()))?;
    }

    tmp.persist(output)
        .with_context(|| format!("failed to write {}", output.display()))?;

    let checksum = sha256_file(output)?;
    tracing::debug!("{} sha256 {}", output.display(), checksum);
    Ok(checksum)
}
