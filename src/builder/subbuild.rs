//! Sub-build descriptors: turn an environment into library, app and sample
//! actions.
//!
//! The orchestrator only talks to the [`SubBuild`] trait. [`ManifestSubBuild`]
//! is the implementation driven by `Kiln.toml`.

use std::path::PathBuf;

use crate::builder::environment::Environment;
use crate::builder::graph::{Action, BuildGraph, CommandKind, NodeId};
use crate::builder::install::InstallTree;
use crate::builder::toolchain::{
    archive_command, compile_command, link_command, CompileInput, LinkInput,
};
use crate::core::errors::BuildError;
use crate::core::language::Language;
use crate::core::project::{ProjectManifest, TargetSpec, DEFAULT_HEADER_PATTERNS};
use crate::util::fs::discover;

/// A file the graph produces.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactHandle {
    /// Node producing the file; `None` for files already on disk
    pub node: Option<NodeId>,
    pub path: PathBuf,
}

impl ArtifactHandle {
    /// A file produced by `node`.
    pub fn built(node: NodeId, path: impl Into<PathBuf>) -> Self {
        ArtifactHandle {
            node: Some(node),
            path: path.into(),
        }
    }

    /// Name the file is installed under.
    pub fn file_name(&self) -> PathBuf {
        self.path
            .file_name()
            .map(PathBuf::from)
            .unwrap_or_else(|| self.path.clone())
    }
}

/// Everything a sub-build produced for one environment.
///
/// Headers and configuration files are reported as trees so installs keep
/// their layout below the tree root.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildArtifacts {
    pub libraries: Vec<ArtifactHandle>,
    pub includes: Vec<InstallTree>,
    pub apps: Vec<ArtifactHandle>,
    pub samples: Vec<ArtifactHandle>,
    pub configurations: Vec<InstallTree>,
}

impl BuildArtifacts {
/// Producing nodes of a handle list.
    pub fn nodes(handles: &[ArtifactHandle]) -> Vec<NodeId> {
        handles.iter().filter_map(|h| h.node).collect()
    }
}

/// Produces build actions for one environment.
pub trait SubBuild {
    /// Name used in error messages.
    fn name(&self) -> &str;

    /// Add this sub-build's actions to `graph` and report what they produce.
    fn build(&self, env: &Environment, graph: &mut BuildGraph)
        -> Result<BuildArtifacts, BuildError>;
}

/// Sub-build described by a `Kiln.toml`.
#[derive(Debug, Clone)]
pub struct ManifestSubBuild {
    manifest: ProjectManifest,
}

impl ManifestSubBuild {
    pub fn new(manifest: ProjectManifest) -> Self {
        ManifestSubBuild { manifest }
    }

    pub fn manifest(&self) -> &ProjectManifest {
        &self.manifest
    }

    fn include_dirs(&self) -> Vec<PathBuf> {
        self.manifest
            .libraries
            .iter()
            .filter_map(|lib| lib.includes.as_deref())
            .map(|dir| self.manifest.resolve(dir))
            .collect()
    }

    /// Add compile actions for every source of `target`.
    fn compile_target(
        &self,
        env: &Environment,
        graph: &mut BuildGraph,
        target: &TargetSpec,
        include_dirs: &[PathBuf],
    ) -> Result<Vec<(NodeId, PathBuf)>, BuildError> {
        let root = self.manifest.resolve(&target.sources);
        let sources = discover(&root, &target.source_patterns())?;
        let obj_dir = env.variant_dir().join("obj").join(&target.name);

        let mut objects = Vec::new();
        for rel in sources.relative() {
            let Some(lang) = Language::from_path(rel) else {
                tracing::debug!("skipping non-source {}", rel.display());
                continue;
            };
            let source = root.join(rel);
            let output = obj_dir.join(format!("{}.o", rel.display()));
            let command = compile_command(
                env,
                lang,
                &CompileInput {
                    source: &source,
                    output: &output,
                    include_dirs,
                },
            );
            let node = graph.add_action(
                env.mode(),
                format!("compile {}/{}", target.name, rel.display()),
                Action::Command {
                    kind: CommandKind::Compile,
                    command,
                    output: output.clone(),
                    source: Some(source),
                },
            );
            objects.push((node, output));
        }

        if objects.is_empty() {
            return Err(BuildError::sub_build(
                self.name(),
                env.name(),
                format!("target `{}` has no sources under {}", target.name, root.display()),
            ));
        }
        Ok(objects)
    }

    /// Compile and link one executable against every library.
    fn link_target(
        &self,
        env: &Environment,
        graph: &mut BuildGraph,
        target: &TargetSpec,
        include_dirs: &[PathBuf],
        libraries: &[ArtifactHandle],
    ) -> Result<ArtifactHandle, BuildError> {
        let compiled = self.compile_target(env, graph, target, include_dirs)?;
        let objects: Vec<PathBuf> = compiled.iter().map(|(_, o)| o.clone()).collect();

        // dependents before dependencies for static archives
        let libs: Vec<String> = self
            .manifest
            .libraries
            .iter()
            .rev()
            .map(|lib| lib.name.clone())
            .chain(self.manifest.build.libs.iter().cloned())
            .collect();
        let lib_dirs = if libraries.is_empty() {
            Vec::new()
        } else {
            vec![env.variant_dir().join("lib")]
        };

        let output = env.variant_dir().join("bin").join(&target.name);
        let command = link_command(
            env,
            &LinkInput {
                objects: &objects,
                output: &output,
                lib_dirs: &lib_dirs,
                libs: &libs,
            },
        );
        let node = graph.add_action(
            env.mode(),
            format!("link {}", target.name),
            Action::Command {
                kind: CommandKind::Link,
                command,
                output: output.clone(),
                source: None,
            },
        );
        for dep in compiled
            .iter()
            .map(|(n, _)| *n)
            .chain(BuildArtifacts::nodes(libraries))
        {
            graph.add_dependency(dep, node);
        }

        Ok(ArtifactHandle::built(node, output))
    }
}

impl SubBuild for ManifestSubBuild {
    fn name(&self) -> &str {
        "manifest sub-build"
    }

    fn build(
        &self,
        env: &Environment,
        graph: &mut BuildGraph,
    ) -> Result<BuildArtifacts, BuildError> {
        let mut artifacts = BuildArtifacts::default();
        let include_dirs = self.include_dirs();

        for lib in &self.manifest.libraries {
            let compiled = self.compile_target(env, graph, lib, &include_dirs)?;
            let objects: Vec<PathBuf> = compiled.iter().map(|(_, o)| o.clone()).collect();
            let output = env
                .variant_dir()
                .join("lib")
                .join(format!("lib{}.a", lib.name));

            let node = graph.add_action(
                env.mode(),
                format!("archive lib{}.a", lib.name),
                Action::Command {
                    kind: CommandKind::Archive,
                    command: archive_command(env, &objects, &output),
                    output: output.clone(),
                    source: None,
                },
            );
            for (dep, _) in &compiled {
                graph.add_dependency(*dep, node);
            }
            artifacts.libraries.push(ArtifactHandle::built(node, output));

            if let Some(dir) = &lib.includes {
                let headers = InstallTree::new(self.manifest.resolve(dir), DEFAULT_HEADER_PATTERNS);
                headers.files()?;
                artifacts.includes.push(headers);
            }
        }

        for app in &self.manifest.apps {
            let handle = self.link_target(env, graph, app, &include_dirs, &artifacts.libraries)?;
            artifacts.apps.push(handle);
        }
        for sample in &self.manifest.samples {
            let handle =
                self.link_target(env, graph, sample, &include_dirs, &artifacts.libraries)?;
            artifacts.samples.push(handle);
        }

        if let Some(configs) = &self.manifest.configs {
            let tree = InstallTree::new(self.manifest.resolve(&configs.dir), &configs.patterns);
            artifacts.configurations.push(tree);
        }

        tracing::info!(
            "{}: {} librar{}, {} app(s), {} sample(s), {} config tree(s)",
            env.mode(),
            artifacts.libraries.len(),
            if artifacts.libraries.len() == 1 { "y" } else { "ies" },
            artifacts.apps.len(),
            artifacts.samples.len(),
            artifacts.configurations.len()
        );

        Ok(artifacts)
    }
}
