//! Core traits defining the seams between the runtime and its plugins.
//!
//! Three interfaces are composed explicitly by the embedding executor:
//!
//! - [`ConditionEvaluator`]: resolves a boolean expression against variables
//! - [`ConditionCheckHandler`]: the typed entry point of the `assert` task
//! - [`EventSink`]: receives the run's event stream

use async_trait::async_trait;
use std::collections::HashMap;

use crate::callback::types::{RunStats, TaskEvent};
use crate::error::Result;
use crate::modules::assert::{AssertArgs, AssertResult};
use crate::modules::ModuleResult;

/// Variable environment visible to a task.
pub type Variables = HashMap<String, serde_json::Value>;

// ============================================================================
// Evaluation Traits
// ============================================================================

/// External condition-evaluation service.
///
/// Implementations must return an error, not `false`, when the expression
/// cannot be evaluated (syntax errors, undefined variables).
pub trait ConditionEvaluator: Send + Sync + std::fmt::Debug {
    /// Evaluates `expression` against `vars`.
    fn evaluate(&self, expression: &str, vars: &Variables) -> Result<bool>;
}

/// Typed entry point of the condition-check task.
///
/// Invoked by the embedding task loop, usually through the module registry.
pub trait ConditionCheckHandler: Send + Sync {
    /// Evaluates every expression in `args` and builds the task result.
    fn check_conditions(&self, args: &AssertArgs, vars: &Variables) -> ModuleResult<AssertResult>;
}

// ============================================================================
// Callback Traits
// ============================================================================

/// Receiver for run events.
///
/// The runtime may execute hosts concurrently, so events for different hosts
/// interleave arbitrarily. Implementations keep all per-host filing keyed on
/// the event itself and must tolerate any interleaving.
#[async_trait]
pub trait EventSink: Send + Sync {
    /// Called when a group (play) boundary is reached.
    async fn on_group_start(&self, name: &str) {
        let _ = name;
    }

    /// Called before a task is dispatched to the active hosts.
    async fn on_task_start(&self, name: &str) {
        let _ = name;
    }

    /// Called when a task succeeded on a host.
    async fn on_ok(&self, event: &TaskEvent) {
        let _ = event;
    }

    /// Called when a single loop item succeeded.
    async fn on_item_ok(&self, event: &TaskEvent) {
        let _ = event;
    }

    /// Called when a task raised an error or reported failure.
    async fn on_failed(&self, event: &TaskEvent, ignore_errors: bool) {
        let _ = (event, ignore_errors);
    }

    /// Called when a single loop item failed.
    async fn on_item_failed(&self, event: &TaskEvent) {
        let _ = event;
    }

    /// Called when a task was skipped on a host.
    async fn on_skipped(&self, event: &TaskEvent) {
        let _ = event;
    }

    /// Called when a single loop item was skipped.
    async fn on_item_skipped(&self, event: &TaskEvent) {
        let _ = event;
    }

    /// Called once when the run completes.
    async fn on_run_end(&self, stats: &RunStats) {
        let _ = stats;
    }
}
