//! Graph executor with progress reporting.
//!
//! Runs the dependency closure of the requested aliases level by level.
//! Actions within a level are independent and run in parallel. A failed
//! action is reported, never retried; everything waiting on it is skipped
//! while unrelated branches still finish.

use std::collections::BTreeSet;
use std::time::Instant;

use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use rayon::prelude::*;

use crate::builder::graph::{Action, BuildGraph, NodeId};
use crate::builder::install::{install_file, symlink};
use crate::builder::package::write_tarball;
use crate::util::fs::ensure_dir;
use crate::util::process::ProcessBuilder;

/// Outcome of one execution.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecutionReport {
    pub completed: Vec<NodeId>,
    /// Failed nodes and their error messages
    pub failed: Vec<(NodeId, String)>,
    /// Nodes not run because a dependency failed
    pub skipped: Vec<NodeId>,
}

impl ExecutionReport {
    pub fn is_success(&self) -> bool {
        self.failed.is_empty() && self.skipped.is_empty()
    }
}

/// Executes a [`BuildGraph`].
pub struct GraphExecutor<'a> {
    graph: &'a BuildGraph,
    jobs: Option<usize>,
    dry_run: bool,
    verbose: bool,
}

enum Outcome {
    Done,
    Failed(String),
    Skipped,
}

impl<'a> GraphExecutor<'a> {
    pub fn new(graph: &'a BuildGraph) -> Self {
        GraphExecutor {
            graph,
            jobs: None,
            dry_run: false,
            verbose: false,
        }
    }

    /// Maximum number of parallel actions (defaults to the CPU count).
    pub fn jobs(mut self, jobs: Option<usize>) -> Self {
        self.jobs = jobs;
        self
    }

    /// Print actions instead of running them.
    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// Run everything `targets` needs.
    pub fn execute<S: AsRef<str>>(&self, targets: &[S]) -> Result<ExecutionReport> {
        let start = Instant::now();
        let roots = self.graph.resolve_targets(targets)?;
        let closure = self.graph.closure(&roots);
        let levels = self.graph.levels(&closure);

        let mut pool = rayon::ThreadPoolBuilder::new();
        if let Some(jobs) = self.jobs {
            pool = pool.num_threads(jobs);
        }
        let pool = pool.build().context("failed to start worker pool")?;

        let pb = self.progress_bar(closure.len());
        let mut report = ExecutionReport::default();
        let mut blocked: BTreeSet<NodeId> = BTreeSet::new();

        for level in levels {
            let outcomes: Vec<(NodeId, Outcome)> = pool.install(|| {
                level
                    .par_iter()
                    .map(|&id| {
                        let outcome = if self
                            .graph
                            .dependencies(id)
                            .iter()
                            .any(|dep| blocked.contains(dep))
                        {
                            Outcome::Skipped
                        } else {
                            match self.run(id) {
                                Ok(()) => Outcome::Done,
                                Err(e) => Outcome::Failed(format!("{:#}", e)),
                            }
                        };
                        if let Some(pb) = &pb {
                            pb.inc(1);
                        }
                        (id, outcome)
                    })
                    .collect()
            });

            for (id, outcome) in outcomes {
                match outcome {
                    Outcome::Done => report.completed.push(id),
                    Outcome::Failed(message) => {
                        let label = self.label(id);
                        tracing::error!("{} failed: {}", label, message);
                        blocked.insert(id);
                        report.failed.push((id, message));
                    }
                    Outcome::Skipped => {
                        tracing::debug!("skipping {}", self.label(id));
                        blocked.insert(id);
                        report.skipped.push(id);
                    }
                }
            }
        }

        if let Some(pb) = pb {
            pb.finish_and_clear();
        }

        eprintln!(
            "    Finished {} action(s) in {:.2}s{}",
            report.completed.len(),
            start.elapsed().as_secs_f64(),
            if report.is_success() {
                String::new()
            } else {
                format!(
                    " ({} failed, {} skipped)",
                    report.failed.len(),
                    report.skipped.len()
                )
            }
        );

        Ok(report)
    }

    fn label(&self, id: NodeId) -> String {
        self.graph
            .node(id)
            .map(|n| format!("[{}] {}", n.mode, n.label))
            .unwrap_or_else(|| format!("node {}", id.index()))
    }

    fn progress_bar(&self, total: usize) -> Option<ProgressBar> {
        if self.verbose || self.dry_run || total <= 1 {
            return None;
        }
        let style = ProgressStyle::default_bar()
            .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
            .map(|s| s.progress_chars("#>-"))
            .unwrap_or_else(|_| ProgressStyle::default_bar());
        let pb = ProgressBar::new(total as u64);
        pb.set_style(style);
        Some(pb)
    }

    fn run(&self, id: NodeId) -> Result<()> {
        let node = self
            .graph
            .node(id)
            .with_context(|| format!("node {} is not in the graph", id.index()))?;

        if self.dry_run {
            println!("[{}] {}", node.mode, node.action.describe());
            return Ok(());
        }
        if self.verbose {
            eprintln!("{:>12} {}", node.action.verb(), node.action.describe());
        }

        match &node.action {
            Action::Command {
                command, output, ..
            } => {
                if let Some(parent) = output.parent() {
                    ensure_dir(parent)?;
                }
                ProcessBuilder::from_spec(command).exec_and_check()?;
            }
            Action::Copy { from, to } => install_file(from, to)?,
            Action::Symlink { target, source } => symlink(target, source)?,
            Action::Package {
                output,
                root,
                entries,
            } => {
                write_tarball(output, root, entries)?;
            }
        }
        Ok(())
    }
}
