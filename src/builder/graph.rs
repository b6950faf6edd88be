//! The build graph: actions, dependencies and named aliases.
//!
//! Nodes are actions owned by one environment. An edge `a -> b` means `a`
//! must finish before `b` starts. Aliases name sets of nodes (and other
//! aliases) and remember which modes contributed to them.

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::path::{Path, PathBuf};

use anyhow::Result;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::Topo;
use petgraph::Direction;
use serde::Serialize;

use crate::builder::environment::Environment;
use crate::builder::install::InstallMapping;
use crate::builder::toolchain::CommandSpec;
use crate::core::errors::BuildError;
use crate::core::mode::BuildMode;
use crate::util::fs::write_string;

/// Handle of a node in a [`BuildGraph`].
pub type NodeId = NodeIndex;

/// Kind of a tool invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CommandKind {
    Compile,
    Archive,
    Link,
}

/// Something the executor does.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Action {
    /// Run a tool
    Command {
        kind: CommandKind,
        command: CommandSpec,
        output: PathBuf,
        /// Compiled source, for compile_commands.json
        #[serde(skip_serializing_if = "Option::is_none")]
        source: Option<PathBuf>,
    },
    /// Copy a file into the install tree
    Copy { from: PathBuf, to: PathBuf },
    /// Create a symlink at `target` pointing to `source`
    Symlink { target: PathBuf, source: PathBuf },
    /// Write a distributable archive
    Package {
        output: PathBuf,
        /// Path prefix every entry is stored under
        root: PathBuf,
        /// Destinations are relative to `root`
        entries: Vec<InstallMapping>,
    },
}

impl Action {
    /// The file this action produces.
    pub fn output(&self) -> &Path {
        match self {
            Action::Command { output, .. } => output,
            Action::Copy { to, .. } => to,
            Action::Symlink { target, .. } => target,
            Action::Package { output, .. } => output,
        }
    }

    /// Short verb for progress output.
    pub fn verb(&self) -> &'static str {
        match self {
            Action::Command { kind: CommandKind::Compile, .. } => "Compiling",
            Action::Command { kind: CommandKind::Archive, .. } => "Archiving",
            Action::Command { kind: CommandKind::Link, .. } => "Linking",
            Action::Copy { .. } => "Installing",
            Action::Symlink { .. } => "Linking",
            Action::Package { .. } => "Packaging",
        }
    }

    /// Human-readable description, used by dry runs.
    pub fn describe(&self) -> String {
        match self {
            Action::Command { command, .. } => command.display(),
            Action::Copy { from, to } => format!("copy {} -> {}", from.display(), to.display()),
            Action::Symlink { target, source } => {
                format!("ln -s {} {}", source.display(), target.display())
            }
            Action::Package { output, entries, .. } => {
                format!("package {} ({} file(s))", output.display(), entries.len())
            }
        }
    }
}

/// A node: an action owned by one environment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Node {
    pub mode: BuildMode,
    pub label: String,
    pub action: Action,
}

/// A named set of nodes and aliases.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Alias {
    /// Modes that added something to this alias
    pub modes: BTreeSet<BuildMode>,
    #[serde(skip)]
    nodes: Vec<NodeId>,
    /// Other aliases this one pulls in
    pub includes: BTreeSet<String>,
}

impl Alias {
    pub fn nodes(&self) -> &[NodeId] {
        &self.nodes
    }
}

/// The whole build graph for one invocation.
#[derive(Debug, Default)]
pub struct BuildGraph {
    graph: DiGraph<Node, ()>,
    aliases: BTreeMap<String, Alias>,
    environments: Vec<Environment>,
    default_target: Option<String>,
}

impl BuildGraph {
    pub fn new() -> Self {
        BuildGraph::default()
    }

    /// Add an action and return its handle.
    pub fn add_action(
        &mut self,
        mode: BuildMode,
        label: impl Into<String>,
        action: Action,
    ) -> NodeId {
        let label = label.into();
        tracing::debug!("[{}] node {}", mode, label);
        self.graph.add_node(Node {
            mode,
            label,
            action,
        })
    }

    /// Make `after` wait for `before`.
    pub fn add_dependency(&mut self, before: NodeId, after: NodeId) {
        if !self.graph.contains_edge(before, after) {
            self.graph.add_edge(before, after, ());
        }
    }

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.graph.node_weight(id)
    }

    /// All nodes in insertion order.
    pub fn nodes(&self) -> impl Iterator<Item = (NodeId, &Node)> + '_ {
        self.graph
            .node_indices()
            .map(move |id| (id, &self.graph[id]))
    }

    /// Nodes `id` waits for.
    pub fn dependencies(&self, id: NodeId) -> Vec<NodeId> {
        let mut deps: Vec<_> = self
            .graph
            .neighbors_directed(id, Direction::Incoming)
            .collect();
        deps.sort();
        deps
    }

    pub fn len(&self) -> usize {
        self.graph.node_count()
    }

    pub fn is_empty(&self) -> bool {
        self.graph.node_count() == 0
    }

    /// Record an environment taking part in this graph.
    pub fn add_environment(&mut self, env: Environment) -> &Environment {
        self.environments.push(env);
        &self.environments[self.environments.len() - 1]
    }

    pub fn environments(&self) -> &[Environment] {
        &self.environments
    }

    pub fn environment(&self, mode: BuildMode) -> Option<&Environment> {
        self.environments.iter().find(|e| e.mode() == mode)
    }

    /// Add nodes to an alias on behalf of `mode`, creating it if needed.
    pub fn alias(&mut self, name: &str, mode: BuildMode, nodes: impl IntoIterator<Item = NodeId>) {
        let alias = self.aliases.entry(name.to_string()).or_default();
        alias.modes.insert(mode);
        for node in nodes {
            if !alias.nodes.contains(&node) {
                alias.nodes.push(node);
            }
        }
    }

    /// Make alias `name` pull in the aliases `others`.
    pub fn alias_includes<S: AsRef<str>>(&mut self, name: &str, mode: BuildMode, others: &[S]) {
        let alias = self.aliases.entry(name.to_string()).or_default();
        alias.modes.insert(mode);
        alias
            .includes
            .extend(others.iter().map(|o| o.as_ref().to_string()));
    }

    pub fn get_alias(&self, name: &str) -> Option<&Alias> {
        self.aliases.get(name)
    }

    /// Alias names in sorted order.
    pub fn alias_names(&self) -> Vec<String> {
        self.aliases.keys().cloned().collect()
    }

    /// Modes that contributed to an alias.
    pub fn alias_modes(&self, name: &str) -> Vec<BuildMode> {
        self.aliases
            .get(name)
            .map(|a| a.modes.iter().copied().collect())
            .unwrap_or_default()
    }

    pub fn set_default_target(&mut self, name: impl Into<String>) {
        self.default_target = Some(name.into());
    }

    pub fn default_target(&self) -> Option<&str> {
        self.default_target.as_deref()
    }

    /// Nodes named by `targets` (aliases), expanded through included aliases.
    pub fn resolve_targets<S: AsRef<str>>(&self, targets: &[S]) -> Result<Vec<NodeId>, BuildError> {
        let mut seen_aliases = HashSet::new();
        let mut pending: Vec<String> = targets.iter().map(|t| t.as_ref().to_string()).collect();
        let mut nodes = BTreeSet::new();

        while let Some(name) = pending.pop() {
            if !seen_aliases.insert(name.clone()) {
                continue;
            }
            let alias = self
                .aliases
                .get(&name)
                .ok_or_else(|| BuildError::UnknownAlias {
                    name: name.clone(),
                    available: self.alias_names(),
                })?;
            nodes.extend(alias.nodes.iter().copied());
            pending.extend(alias.includes.iter().cloned());
        }

        Ok(nodes.into_iter().collect())
    }

    /// `roots` plus everything they transitively wait for.
    pub fn closure(&self, roots: &[NodeId]) -> BTreeSet<NodeId> {
        let mut closure = BTreeSet::new();
        let mut stack: Vec<NodeId> = roots.to_vec();
        while let Some(id) = stack.pop() {
            if closure.insert(id) {
                stack.extend(self.graph.neighbors_directed(id, Direction::Incoming));
            }
        }
        closure
    }

    /// Split `nodes` into levels: every node's dependencies within the set
    /// sit in earlier levels. Levels keep topological order.
    pub fn levels(&self, nodes: &BTreeSet<NodeId>) -> Vec<Vec<NodeId>> {
        let mut depth: BTreeMap<NodeId, usize> = BTreeMap::new();
        let mut topo = Topo::new(&self.graph);

        while let Some(id) = topo.next(&self.graph) {
            if !nodes.contains(&id) {
                continue;
            }
            let level = self
                .graph
                .neighbors_directed(id, Direction::Incoming)
                .filter_map(|dep| depth.get(&dep))
                .map(|d| d + 1)
                .max()
                .unwrap_or(0);
            depth.insert(id, level);
        }

        let mut levels: Vec<Vec<NodeId>> = Vec::new();
        for (id, level) in depth {
            if levels.len() <= level {
                levels.resize_with(level + 1, Vec::new);
            }
            levels[level].push(id);
        }
        levels
    }

    /// Serializable view of the graph.
    pub fn plan(&self) -> Plan {
        Plan {
            default_target: self.default_target.clone(),
            environments: self
                .environments
                .iter()
                .map(|env| PlanEnvironment {
                    mode: env.mode(),
                    fingerprint: env.fingerprint(),
                    install_prefix: env.install_prefix().to_path_buf(),
                    bin_install_prefix: env.bin_install_prefix().to_path_buf(),
                    variant_dir: env.variant_dir().to_path_buf(),
                })
                .collect(),
            aliases: self
                .aliases
                .iter()
                .map(|(name, alias)| {
                    let plan_alias = PlanAlias {
                        modes: alias.modes.iter().copied().collect(),
                        includes: alias.includes.iter().cloned().collect(),
                        nodes: alias.nodes.iter().map(|n| n.index()).collect(),
                    };
                    (name.clone(), plan_alias)
                })
                .collect(),
            nodes: self
                .nodes()
                .map(|(id, node)| PlanNode {
                    id: id.index(),
                    mode: node.mode,
                    label: node.label.clone(),
                    deps: self.dependencies(id).iter().map(|d| d.index()).collect(),
                    action: node.action.clone(),
                })
                .collect(),
        }
    }

    /// Mode whose compile actions go into the compile database: release if
    /// it compiles anything, otherwise the first mode that does.
    fn compile_database_mode(&self) -> Option<BuildMode> {
        let mut modes = self.graph.node_weights().filter_map(|node| match node.action {
            Action::Command {
                kind: CommandKind::Compile,
                ..
            } => Some(node.mode),
            _ => None,
        });
        let first = modes.next()?;
        if first == BuildMode::Release || modes.any(|m| m == BuildMode::Release) {
            Some(BuildMode::Release)
        } else {
            Some(first)
        }
    }

    /// Compile database entries, one per source, taken from a single mode.
    pub fn compile_commands(&self, directory: &Path) -> Vec<CompileCommand> {
        let Some(mode) = self.compile_database_mode() else {
            return Vec::new();
        };
        self.graph
            .node_weights()
            .filter(|node| node.mode == mode)
            .filter_map(|node| match &node.action {
                Action::Command {
                    kind: CommandKind::Compile,
                    command,
                    output,
                    source: Some(source),
                } => {
                    let mut arguments = Vec::with_capacity(command.args.len() + 1);
                    arguments.push(command.program.display().to_string());
                    arguments.extend(command.args.iter().cloned());
                    Some(CompileCommand {
                        directory: directory.display().to_string(),
                        file: source.display().to_string(),
                        arguments,
                        output: Some(output.display().to_string()),
                    })
                }
                _ => None,
            })
            .collect()
    }

    /// Write `compile_commands.json`.
    pub fn emit_compile_commands(&self, directory: &Path, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(&self.compile_commands(directory))?;
        write_string(path, &json)
    }
}

/// JSON form of a [`BuildGraph`].
#[derive(Debug, Clone, Serialize)]
pub struct Plan {
    pub default_target: Option<String>,
    pub environments: Vec<PlanEnvironment>,
    pub aliases: BTreeMap<String, PlanAlias>,
    pub nodes: Vec<PlanNode>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PlanEnvironment {
    pub mode: BuildMode,
    pub fingerprint: String,
    pub install_prefix: PathBuf,
    pub bin_install_prefix: PathBuf,
    pub variant_dir: PathBuf,
}

#[derive(Debug, Clone, Serialize)]
pub struct PlanAlias {
    pub modes: Vec<BuildMode>,
    pub includes: Vec<String>,
    pub nodes: Vec<usize>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PlanNode {
    pub id: usize,
    pub mode: BuildMode,
    pub label: String,
    pub deps: Vec<usize>,
    pub action: Action,
}

/// Entry of compile_commands.json.
#[derive(Debug, Clone, Serialize)]
pub struct CompileCommand {
    pub directory: String,
    pub file: String,
    pub arguments: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
}
