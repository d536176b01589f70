//! Running one task on one host.
//!
//! Builds the host's variable environment, evaluates `when`, expands loops,
//! renders arguments and calls the module. Every result is turned into a
//! [`TaskEvent`] and delivered to the sink before the next host result
//! for the same host is produced.

use serde_json::{json, Map, Value as JsonValue};
use tracing::{debug, trace, warn};

use super::{Executor, HostState};
use crate::callback::types::{Outcome, TaskEvent, LOOP_RESULTS_KEY};
use crate::modules::assert::{AssertArgs, InvocationStats, STATS_KEY};
use crate::modules::set_fact::FACTS_KEY;
use crate::modules::{ModuleContext, ModuleParams};
use crate::parser::{LoopSpec, Play, Task};
use crate::traits::Variables;

type ResultMap = Map<String, JsonValue>;

/// What one host's run of one task feeds back into the play.
#[derive(Debug, Clone, PartialEq)]
pub struct HostOutcome {
    /// Recap category
    pub outcome: Outcome,
    /// Facts to merge into the host's variables
    pub facts: ResultMap,
    /// Condition-check invocations reported by the task
    pub invocations: InvocationStats,
}

impl HostOutcome {
    fn new(outcome: Outcome) -> Self {
        Self {
            outcome,
            facts: ResultMap::new(),
            invocations: InvocationStats::default(),
        }
    }

    /// Pick up side-channel data from one raw result.
    fn absorb(&mut self, task: &Task, result: &ResultMap) {
        if task.module_name() == "set_fact" {
            if let Some(JsonValue::Object(facts)) = result.get(FACTS_KEY) {
                self.facts
                    .extend(facts.iter().map(|(k, v)| (k.clone(), v.clone())));
            }
        }
        if let Some(data) = result.get(STATS_KEY).and_then(|block| block.get("data")) {
            match serde_json::from_value::<InvocationStats>(data.clone()) {
                Ok(stats) => self.invocations = self.invocations + stats,
                Err(e) => warn!(error = %e, "Ignoring malformed {} block", STATS_KEY),
            }
        }
    }
}

fn failed_result(msg: impl Into<String>) -> ResultMap {
    let mut result = ResultMap::new();
    result.insert("changed".to_string(), false.into());
    result.insert("failed".to_string(), true.into());
    result.insert("msg".to_string(), JsonValue::String(msg.into()));
    result
}

/// Result of a task whose `when` evaluated false.
///
/// Skipped condition checks still carry their expressions so reporting can
/// list what was not evaluated.
fn skipped_result(task: &Task) -> ResultMap {
    let mut result = ResultMap::new();
    result.insert("changed".to_string(), false.into());
    result.insert("skipped".to_string(), true.into());
    result.insert(
        "skip_reason".to_string(),
        "Conditional result was False".into(),
    );

    if task.module_name() == "assert" {
        let mut params = ModuleParams::new();
        if let Some(that) = task.args.get("that") {
            params.insert("that".to_string(), that.clone());
        }
        if let Ok(args) = AssertArgs::from_params(&params) {
            result.insert("assertions".to_string(), json!(args.unevaluated()));
        }
    }
    result
}

/// Aggregate record emitted after the per-item results of a loop.
fn loop_container(results: Vec<JsonValue>) -> ResultMap {
    let flag = |result: &JsonValue, key: &str| {
        result.get(key).and_then(JsonValue::as_bool).unwrap_or(false)
    };
    let changed = results.iter().any(|r| flag(r, "changed"));
    let failed = results.iter().any(|r| flag(r, "failed"));
    let skipped = results.iter().all(|r| flag(r, "skipped"));

    let mut container = ResultMap::new();
    container.insert("changed".to_string(), changed.into());
    container.insert("failed".to_string(), failed.into());
    if skipped {
        container.insert("skipped".to_string(), true.into());
    }
    let msg = if results.is_empty() {
        "No items in the list"
    } else if failed {
        "One or more items failed"
    } else if skipped {
        "All items skipped"
    } else {
        "All items completed"
    };
    container.insert("msg".to_string(), msg.into());
    container.insert(LOOP_RESULTS_KEY.to_string(), JsonValue::Array(results));
    container
}

impl Executor {
    /// Run `task` on one host and deliver every resulting event.
    pub(super) async fn run_task_on_host(
        &self,
        play: &Play,
        task: &Task,
        host: &HostState,
    ) -> HostOutcome {
        let mut vars = match self.host_vars(play, task, host) {
            Ok(vars) => vars,
            Err(msg) => {
                let event = self.event(task, &host.name, failed_result(msg));
                return HostOutcome::new(self.deliver(task, &event).await);
            }
        };

        let Some(spec) = &task.loop_over else {
            let result = self.run_once(task, &vars);
            let mut outcome = HostOutcome::new(Outcome::Ok);
            outcome.absorb(task, &result);
            let event = self.event(task, &host.name, result);
            outcome.outcome = self.deliver(task, &event).await;
            return outcome;
        };

        let items = match self.loop_items(spec, &vars) {
            Ok(items) => items,
            Err(msg) => {
                let event = self.event(task, &host.name, failed_result(msg));
                return HostOutcome::new(self.deliver(task, &event).await);
            }
        };
        debug!(host = %host.name, items = items.len(), "Expanding loop");

        let mut outcome = HostOutcome::new(Outcome::Ok);
        let mut results = Vec::with_capacity(items.len());
        for item in items {
            vars.insert("item".to_string(), item.clone());
            let mut result = self.run_once(task, &vars);
            result.insert("item".to_string(), item);

            outcome.absorb(task, &result);
            vars.extend(outcome.facts.iter().map(|(k, v)| (k.clone(), v.clone())));

            let event = self.event(task, &host.name, result.clone());
            self.deliver_item(&event).await;
            results.push(JsonValue::Object(result));
        }

        let event = self.event(task, &host.name, loop_container(results));
        outcome.outcome = self.deliver(task, &event).await;
        outcome
    }

    /// Layer variables, lowest precedence first: play vars, host vars,
    /// facts, task vars, extra vars.
    fn host_vars(&self, play: &Play, task: &Task, host: &HostState) -> Result<Variables, String> {
        let mut vars = Variables::new();
        vars.insert("inventory_hostname".to_string(), json!(host.name));

        let host_layer = play.host_vars.get(&host.name).into_iter().flatten();
        for (key, value) in play.vars.iter().chain(host_layer) {
            let rendered = self
                .engine
                .render_value(value, &vars)
                .map_err(|e| e.to_string())?;
            vars.insert(key.clone(), rendered);
        }

        vars.extend(host.facts.iter().map(|(k, v)| (k.clone(), v.clone())));

        for (key, value) in &task.vars {
            let rendered = self
                .engine
                .render_value(value, &vars)
                .map_err(|e| e.to_string())?;
            vars.insert(key.clone(), rendered);
        }

        vars.extend(self.config.extra_vars.iter().map(|(k, v)| (k.clone(), v.clone())));
        Ok(vars)
    }

    fn loop_items(&self, spec: &LoopSpec, vars: &Variables) -> Result<Vec<JsonValue>, String> {
        match spec {
            LoopSpec::List(items) => items
                .iter()
                .map(|item| self.engine.render_value(item, vars).map_err(|e| e.to_string()))
                .collect(),
            LoopSpec::Expression(expression) => {
                match self.engine.evaluate_value(expression, vars) {
                    Ok(JsonValue::Array(items)) => Ok(items),
                    Ok(other) => Err(format!(
                        "Invalid data passed to 'loop', it requires a list, got this instead: {}",
                        other
                    )),
                    Err(e) => Err(e.to_string()),
                }
            }
        }
    }

    /// Evaluate `when`, then call the module.
    fn run_once(&self, task: &Task, vars: &Variables) -> ResultMap {
        for condition in &task.when {
            match self.engine.evaluate_condition(condition, vars) {
                Ok(true) => {}
                Ok(false) => {
                    trace!(condition = %condition, "Condition false, skipping");
                    return skipped_result(task);
                }
                Err(e) => {
                    return failed_result(format!(
                        "The conditional check '{}' failed: {}",
                        condition, e
                    ))
                }
            }
        }
        self.run_module(task, vars)
    }

    fn run_module(&self, task: &Task, vars: &Variables) -> ResultMap {
        let name = task.module_name();
        let Some(module) = self.registry.get(name) else {
            return failed_result(format!("Module '{}' not found", name));
        };

        let raw = module.raw_params();
        let mut params = ModuleParams::with_capacity(task.args.len());
        for (key, value) in &task.args {
            let value = if raw.iter().any(|r| *r == key.as_str()) {
                value.clone()
            } else {
                match self.engine.render_value(value, vars) {
                    Ok(rendered) => rendered,
                    Err(e) => return failed_result(e.to_string()),
                }
            };
            params.insert(key.clone(), value);
        }

        let context = ModuleContext::new()
            .with_check_mode(self.config.check_mode)
            .with_verbosity(self.config.verbosity)
            .with_vars(vars.clone());

        match self.registry.execute(name, &params, &context) {
            Ok(output) => output.to_result(),
            Err(e) => {
                warn!(module = %name, error = %e, "Module execution failed");
                failed_result(e.to_string())
            }
        }
    }

    fn event(&self, task: &Task, host: &str, result: ResultMap) -> TaskEvent {
        let event = TaskEvent::new(host, task.action.clone()).with_result(result);
        match &task.name {
            Some(name) => event.with_task_name(name.clone()),
            None => event,
        }
    }

    /// Deliver a per-host (or loop container) event and classify it.
    async fn deliver(&self, task: &Task, event: &TaskEvent) -> Outcome {
        if event.is_failed() {
            self.sink.on_failed(event, task.ignore_errors).await;
            if task.ignore_errors {
                Outcome::Ignored
            } else {
                Outcome::Failed
            }
        } else if event.is_skipped() {
            self.sink.on_skipped(event).await;
            Outcome::Skipped
        } else {
            self.sink.on_ok(event).await;
            if event.is_changed() {
                Outcome::Changed
            } else {
                Outcome::Ok
            }
        }
    }

    async fn deliver_item(&self, event: &TaskEvent) {
        if event.is_failed() {
            self.sink.on_item_failed(event).await;
        } else if event.is_skipped() {
            self.sink.on_item_skipped(event).await;
        } else {
            self.sink.on_item_ok(event).await;
        }
    }
}
