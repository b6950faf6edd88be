//! Test utilities: project fixtures and recording collaborators.

pub mod fixtures;

use std::cell::RefCell;
use std::path::{Path, PathBuf};

pub use fixtures::*;

use crate::builder::environment::Environment;
use crate::builder::graph::{Action, BuildGraph};
use crate::builder::install::InstallTree;
use crate::builder::package::Packager;
use crate::builder::subbuild::{ArtifactHandle, BuildArtifacts, SubBuild};
use crate::core::errors::BuildError;
use crate::core::mode::BuildMode;

/// Sub-build that adds one copy action per app/sample and records the
/// environments it saw.
#[derive(Debug, Default)]
pub struct MockSubBuild {
    apps: Vec<String>,
    samples: Vec<String>,
    configs: Vec<InstallTree>,
    fail_on: Option<BuildMode>,
    seen: RefCell<Vec<(BuildMode, String)>>,
}

impl MockSubBuild {
    pub fn new() -> Self {
        MockSubBuild::default()
    }

    pub fn app(mut self, name: &str) -> Self {
        self.apps.push(name.to_string());
        self
    }

    pub fn sample(mut self, name: &str) -> Self {
        self.samples.push(name.to_string());
        self
    }

    /// Report the files under `root` matching `patterns` as configuration.
    pub fn configs(mut self, root: impl Into<PathBuf>, patterns: &[&str]) -> Self {
        self.configs.push(InstallTree::new(root, patterns));
        self
    }

    /// Fail when asked to build `mode`.
    pub fn fail_on(mut self, mode: BuildMode) -> Self {
        self.fail_on = Some(mode);
        self
    }

    /// (mode, environment fingerprint) per call.
    pub fn seen(&self) -> Vec<(BuildMode, String)> {
        self.seen.borrow().clone()
    }

    pub fn seen_modes(&self) -> Vec<BuildMode> {
        self.seen.borrow().iter().map(|(m, _)| *m).collect()
    }

    fn produce(
        env: &Environment,
        graph: &mut BuildGraph,
        names: &[String],
    ) -> Vec<ArtifactHandle> {
        names
            .iter()
            .map(|name| {
                let output = env.variant_dir().join("bin").join(name);
                let node = graph.add_action(
                    env.mode(),
                    format!("link {}", name),
                    Action::Copy {
                        from: PathBuf::from("/src").join(name),
                        to: output.clone(),
                    },
                );
                ArtifactHandle::built(node, output)
            })
            .collect()
    }
}

impl SubBuild for MockSubBuild {
    fn name(&self) -> &str {
        "mock sub-build"
    }

    fn build(
        &self,
        env: &Environment,
        graph: &mut BuildGraph,
    ) -> Result<BuildArtifacts, BuildError> {
        self.seen
            .borrow_mut()
            .push((env.mode(), env.fingerprint()));

        if self.fail_on == Some(env.mode()) {
            return Err(BuildError::sub_build(
                self.name(),
                env.name(),
                "descriptor exploded",
            ));
        }

        Ok(BuildArtifacts {
            apps: Self::produce(env, graph, &self.apps),
            samples: Self::produce(env, graph, &self.samples),
            configurations: self.configs.clone(),
            ..BuildArtifacts::default()
        })
    }
}

/// Packager that adds a single package action and records its inputs.
#[derive(Debug, Default)]
pub struct MockPackager {
    calls: RefCell<Vec<PackagerCall>>,
}

/// Inputs of one packaging request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackagerCall {
    pub mode: BuildMode,
    pub apps: usize,
    pub configs: usize,
    pub retail_prefix: PathBuf,
}

impl MockPackager {
    pub fn new() -> Self {
        MockPackager::default()
    }

    pub fn calls(&self) -> Vec<PackagerCall> {
        self.calls.borrow().clone()
    }
}

impl Packager for MockPackager {
    fn package(
        &self,
        env: &Environment,
        graph: &mut BuildGraph,
        apps: &[ArtifactHandle],
        configs: &[InstallTree],
        retail_prefix: &Path,
    ) -> Result<ArtifactHandle, BuildError> {
        self.calls.borrow_mut().push(PackagerCall {
            mode: env.mode(),
            apps: apps.len(),
            configs: configs.len(),
            retail_prefix: retail_prefix.to_path_buf(),
        });

        let output = env.variant_dir().join("mock.tar.gz");
        let node = graph.add_action(
            env.mode(),
            "package mock",
            Action::Package {
                output: output.clone(),
                root: PathBuf::from("mock"),
                entries: Vec::new(),
            },
        );
        for dep in BuildArtifacts::nodes(apps) {
            graph.add_dependency(dep, node);
        }
        Ok(ArtifactHandle::built(node, output))
    }
}
