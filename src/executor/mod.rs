//! Playbook execution.
//!
//! The executor walks plays and tasks in order, runs each task on every
//! active host (at most `forks` at a time) and reports every result to an
//! [`EventSink`]. A host with an unignored failure is dropped from the rest
//! of its play. After the last play the sink receives the run recap.

pub mod task;

use std::sync::Arc;

use futures::stream::{self, StreamExt};
use tracing::{debug, info, instrument, warn};

use crate::callback::types::{Outcome, RunStats};
use crate::modules::assert::InvocationStats;
use crate::modules::ModuleRegistry;
use crate::parser::{Play, Playbook};
use crate::template::TemplateEngine;
use crate::traits::{ConditionEvaluator, EventSink, Variables};

use self::task::HostOutcome;

/// Executor configuration
#[derive(Debug, Clone)]
pub struct ExecutorConfig {
    /// Maximum number of hosts running a task at once
    pub forks: usize,
    /// Dry-run mode
    pub check_mode: bool,
    /// Verbosity level
    pub verbosity: u8,
    /// Extra variables, highest precedence
    pub extra_vars: Variables,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            forks: 5,
            check_mode: false,
            verbosity: 0,
            extra_vars: Variables::new(),
        }
    }
}

/// What a finished run leaves behind.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunSummary {
    /// Per-host recap
    pub stats: RunStats,
    /// Condition-check invocations, summed from every result's side channel
    pub invocations: InvocationStats,
}

impl RunSummary {
    /// Returns true if no host has an unignored failure.
    pub fn success(&self) -> bool {
        !self.stats.has_failures()
    }

    /// Process exit code for this run.
    pub fn exit_code(&self) -> i32 {
        if self.success() {
            0
        } else {
            2
        }
    }
}

/// Per-host state kept across the tasks of one play.
#[derive(Debug, Clone)]
pub(crate) struct HostState {
    pub name: String,
    pub facts: Variables,
    pub failed: bool,
}

impl HostState {
    fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            facts: Variables::new(),
            failed: false,
        }
    }
}

/// Runs playbooks and reports to an event sink.
pub struct Executor {
    config: ExecutorConfig,
    registry: Arc<ModuleRegistry>,
    engine: Arc<TemplateEngine>,
    sink: Arc<dyn EventSink>,
}

impl Executor {
    /// Create an executor with the built-in modules.
    pub fn new(config: ExecutorConfig, sink: Arc<dyn EventSink>) -> Self {
        let engine = Arc::new(TemplateEngine::new());
        let registry = Self::builtin_registry(&engine, false);
        Self {
            config,
            registry,
            engine,
            sink,
        }
    }

    /// Always render failed assertions verbosely, even for `quiet` tasks.
    pub fn with_fail_verbose(mut self, fail_verbose: bool) -> Self {
        self.registry = Self::builtin_registry(&self.engine, fail_verbose);
        self
    }

    /// Replace the module registry.
    pub fn with_registry(mut self, registry: ModuleRegistry) -> Self {
        self.registry = Arc::new(registry);
        self
    }

    pub fn config(&self) -> &ExecutorConfig {
        &self.config
    }

    fn builtin_registry(engine: &Arc<TemplateEngine>, fail_verbose: bool) -> Arc<ModuleRegistry> {
        let evaluator: Arc<dyn ConditionEvaluator> = engine.clone();
        Arc::new(ModuleRegistry::with_builtins(evaluator, fail_verbose))
    }

    /// Run every play of a playbook, then deliver the recap.
    #[instrument(skip(self, playbook), fields(plays = playbook.plays.len()))]
    pub async fn run(&self, playbook: &Playbook) -> RunSummary {
        info!(
            tasks = playbook.task_count(),
            forks = self.config.forks,
            check_mode = self.config.check_mode,
            "Starting playbook"
        );

        let mut summary = RunSummary::default();
        for play in &playbook.plays {
            self.run_play(play, &mut summary).await;
        }

        self.sink.on_run_end(&summary.stats).await;

        info!(
            success = summary.success(),
            invocations = summary.invocations.assertions,
            "Playbook finished"
        );
        summary
    }

    async fn run_play(&self, play: &Play, summary: &mut RunSummary) {
        let name = play.display_name();
        info!(play = %name, hosts = play.hosts.len(), "Starting play");
        self.sink.on_group_start(&name).await;

        let mut hosts: Vec<HostState> = Vec::with_capacity(play.hosts.len());
        for host in &play.hosts {
            if hosts.iter().any(|h| &h.name == host) {
                continue;
            }
            summary.stats.touch(host);
            hosts.push(HostState::new(host));
        }

        for task in &play.tasks {
            let active: Vec<&HostState> = hosts.iter().filter(|h| !h.failed).collect();
            if active.is_empty() {
                warn!(play = %name, "No hosts remaining in play");
                break;
            }

            self.sink.on_task_start(&task.display_name()).await;
            debug!(task = %task.display_name(), hosts = active.len(), "Running task");

            let outcomes: Vec<(String, HostOutcome)> = stream::iter(active)
                .map(|host| async move {
                    let outcome = self.run_task_on_host(play, task, host).await;
                    (host.name.clone(), outcome)
                })
                .buffer_unordered(self.config.forks.max(1))
                .collect()
                .await;

            for (host_name, outcome) in outcomes {
                summary.stats.record(&host_name, outcome.outcome);
                summary.invocations = summary.invocations + outcome.invocations;

                let Some(host) = hosts.iter_mut().find(|h| h.name == host_name) else {
                    continue;
                };
                host.facts.extend(outcome.facts);
                if outcome.outcome == Outcome::Failed {
                    warn!(host = %host_name, task = %task.display_name(), "Host failed, removing from play");
                    host.failed = true;
                }
            }
        }
    }
}

impl std::fmt::Debug for Executor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Executor")
            .field("config", &self.config)
            .field("modules", &self.registry.names())
            .finish()
    }
}
