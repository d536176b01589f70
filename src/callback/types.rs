//! Event and statistics types delivered to callbacks.
//!
//! A [`TaskEvent`] is one per-host (and, for loops, per-item) notification
//! carrying the raw result mapping produced by the task. [`RunStats`] is the
//! final per-host recap handed to `on_run_end`.

use std::fmt;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};

/// Action names that identify a condition-check task.
pub const ASSERT_ACTIONS: &[&str] = &["assert", "ansible.builtin.assert"];

/// Result key marking a loop container record.
pub const LOOP_RESULTS_KEY: &str = "results";

/// One task notification for one host.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskEvent {
    /// Host the task ran on
    pub host: String,
    /// Task name, if the task has one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_name: Option<String>,
    /// Action (module) name
    pub action: String,
    /// Raw result mapping
    #[serde(default)]
    pub result: Map<String, JsonValue>,
}

impl TaskEvent {
    /// Create an event with an empty result mapping.
    pub fn new(host: impl Into<String>, action: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            task_name: None,
            action: action.into(),
            result: Map::new(),
        }
    }

    pub fn with_task_name(mut self, name: impl Into<String>) -> Self {
        self.task_name = Some(name.into());
        self
    }

    pub fn with_result(mut self, result: Map<String, JsonValue>) -> Self {
        self.result = result;
        self
    }

    /// Insert a single key into the result mapping.
    pub fn with_field(mut self, key: impl Into<String>, value: JsonValue) -> Self {
        self.result.insert(key.into(), value);
        self
    }

    /// Returns true for the aggregate record emitted after a loop.
    pub fn is_loop_container(&self) -> bool {
        self.result.contains_key(LOOP_RESULTS_KEY)
    }

    /// Returns true if the event comes from a condition-check task.
    pub fn is_assert(&self) -> bool {
        ASSERT_ACTIONS.contains(&self.action.as_str())
    }

    /// The loop item this event belongs to, if any.
    pub fn item(&self) -> Option<&JsonValue> {
        self.result.get("item")
    }

    /// The result message, if any.
    pub fn msg(&self) -> Option<&JsonValue> {
        self.result.get("msg").filter(|msg| !msg.is_null())
    }

    /// The result message flattened to one line.
    pub fn msg_text(&self) -> Option<String> {
        self.msg().map(|msg| match msg {
            JsonValue::String(s) => s.clone(),
            JsonValue::Array(lines) => lines
                .iter()
                .map(|line| match line {
                    JsonValue::String(s) => s.clone(),
                    other => other.to_string(),
                })
                .collect::<Vec<_>>()
                .join(", "),
            other => other.to_string(),
        })
    }

    pub fn is_changed(&self) -> bool {
        self.flag("changed")
    }

    pub fn is_failed(&self) -> bool {
        self.flag("failed")
    }

    pub fn is_skipped(&self) -> bool {
        self.flag("skipped")
    }

    fn flag(&self, key: &str) -> bool {
        self.result
            .get(key)
            .and_then(JsonValue::as_bool)
            .unwrap_or(false)
    }
}

/// Outcome category used for recap counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    Ok,
    Changed,
    Failed,
    Skipped,
    Ignored,
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Outcome::Ok => "ok",
            Outcome::Changed => "changed",
            Outcome::Failed => "failed",
            Outcome::Skipped => "skipped",
            Outcome::Ignored => "ignored",
        };
        f.write_str(text)
    }
}

/// Per-host task counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostStats {
    /// Tasks that succeeded without changes
    pub ok: u32,
    /// Tasks that reported changes
    pub changed: u32,
    /// Tasks that failed
    pub failed: u32,
    /// Tasks that were skipped
    pub skipped: u32,
    /// Tasks whose failures were ignored
    pub ignored: u32,
}

impl HostStats {
    /// Check if there were any failures
    pub fn has_failures(&self) -> bool {
        self.failed > 0
    }

    /// Check if there were any changes
    pub fn has_changes(&self) -> bool {
        self.changed > 0
    }

    fn bump(&mut self, outcome: Outcome) {
        match outcome {
            Outcome::Ok => self.ok += 1,
            Outcome::Changed => self.changed += 1,
            Outcome::Failed => self.failed += 1,
            Outcome::Skipped => self.skipped += 1,
            Outcome::Ignored => self.ignored += 1,
        }
    }
}

/// Final per-host recap of a run, in first-seen host order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunStats {
    hosts: IndexMap<String, HostStats>,
}

impl RunStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make sure `host` appears in the recap even if it ran nothing.
    pub fn touch(&mut self, host: &str) {
        self.hosts.entry(host.to_string()).or_default();
    }

    /// Count one task outcome for `host`.
    pub fn record(&mut self, host: &str, outcome: Outcome) {
        self.hosts.entry(host.to_string()).or_default().bump(outcome);
    }

    pub fn host(&self, host: &str) -> Option<&HostStats> {
        self.hosts.get(host)
    }

    pub fn hosts(&self) -> impl Iterator<Item = (&str, &HostStats)> {
        self.hosts.iter().map(|(name, stats)| (name.as_str(), stats))
    }

    pub fn is_empty(&self) -> bool {
        self.hosts.is_empty()
    }

    /// Returns true if any host has an unignored failure.
    pub fn has_failures(&self) -> bool {
        self.hosts.values().any(HostStats::has_failures)
    }
}
