//! Playbook structure definitions.
//!
//! A playbook is an ordered list of plays; each play targets a set of hosts
//! and runs its tasks in order. Every task names exactly one action.

use indexmap::IndexMap;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value as JsonValue;
use std::path::PathBuf;

/// Prefix accepted in front of built-in action names.
pub const BUILTIN_PREFIX: &str = "ansible.builtin.";

/// A complete playbook containing multiple plays
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Playbook {
    /// Ordered list of plays
    pub plays: Vec<Play>,

    /// Source file path
    #[serde(skip)]
    pub source_path: Option<PathBuf>,
}

impl Playbook {
    /// Create a new empty playbook
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a play to the playbook
    pub fn add_play(&mut self, play: Play) {
        self.plays.push(play);
    }

    /// Get total number of tasks across all plays
    pub fn task_count(&self) -> usize {
        self.plays.iter().map(|p| p.tasks.len()).sum()
    }
}

/// A play targeting a set of hosts with a list of tasks
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Play {
    /// Play name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Hosts to run on, in order
    #[serde(deserialize_with = "deserialize_hosts")]
    pub hosts: Vec<String>,

    /// Play-level variables
    #[serde(default)]
    pub vars: IndexMap<String, JsonValue>,

    /// Per-host variables, keyed by host name
    #[serde(default)]
    pub host_vars: IndexMap<String, IndexMap<String, JsonValue>>,

    /// Tasks
    #[serde(default)]
    pub tasks: Vec<Task>,

    /// Keys this runtime does not interpret
    #[serde(flatten, skip_serializing)]
    pub extra: IndexMap<String, JsonValue>,
}

impl Play {
    /// Create a new play targeting the specified hosts
    pub fn new<I, S>(hosts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            hosts: hosts.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_var(mut self, key: impl Into<String>, value: JsonValue) -> Self {
        self.vars.insert(key.into(), value);
        self
    }

    pub fn with_task(mut self, task: Task) -> Self {
        self.tasks.push(task);
        self
    }

    /// Name shown in headers and used as the report group name.
    pub fn display_name(&self) -> String {
        self.name
            .clone()
            .unwrap_or_else(|| self.hosts.join(","))
    }
}

/// Host list given as a list, a single name, or a comma-separated string.
fn deserialize_hosts<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Hosts {
        List(Vec<String>),
        Pattern(String),
    }

    let hosts = match Hosts::deserialize(deserializer)? {
        Hosts::List(hosts) => hosts,
        Hosts::Pattern(pattern) => pattern
            .split(',')
            .map(str::trim)
            .filter(|h| !h.is_empty())
            .map(String::from)
            .collect(),
    };
    Ok(hosts)
}

/// Loop specification
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LoopSpec {
    /// Literal list of items
    List(Vec<JsonValue>),
    /// Expression evaluating to a list
    Expression(String),
}

/// Actions a task may name, without the built-in prefix.
pub const KNOWN_ACTIONS: &[&str] = &["assert", "debug", "set_fact"];

/// A task definition
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawTask")]
pub struct Task {
    /// Task name
    pub name: Option<String>,

    /// Action as written (e.g. `assert` or `ansible.builtin.assert`)
    pub action: String,

    /// Module arguments
    pub args: IndexMap<String, JsonValue>,

    /// Conditions that must all hold for the task to run
    pub when: Vec<String>,

    /// Loop over items
    pub loop_over: Option<LoopSpec>,

    /// Task-level variables
    pub vars: IndexMap<String, JsonValue>,

    /// Continue after a failure
    pub ignore_errors: bool,
}

impl Task {
    /// Create a task calling `action` with no arguments.
    pub fn new(action: impl Into<String>) -> Self {
        Self {
            action: action.into(),
            ..Self::default()
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_arg(mut self, key: impl Into<String>, value: JsonValue) -> Self {
        self.args.insert(key.into(), value);
        self
    }

    pub fn with_when(mut self, condition: impl Into<String>) -> Self {
        self.when.push(condition.into());
        self
    }

    pub fn with_loop(mut self, spec: LoopSpec) -> Self {
        self.loop_over = Some(spec);
        self
    }

    pub fn with_var(mut self, key: impl Into<String>, value: JsonValue) -> Self {
        self.vars.insert(key.into(), value);
        self
    }

    pub fn with_ignore_errors(mut self, ignore: bool) -> Self {
        self.ignore_errors = ignore;
        self
    }

    /// Registry name of the action, without the built-in prefix.
    pub fn module_name(&self) -> &str {
        self.action
            .strip_prefix(BUILTIN_PREFIX)
            .unwrap_or(&self.action)
    }

    /// Name shown in headers.
    pub fn display_name(&self) -> String {
        self.name.clone().unwrap_or_else(|| self.action.clone())
    }
}

/// `when` given as a single condition, a list, or a literal boolean.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum WhenSpec {
    Bool(bool),
    Single(String),
    List(Vec<String>),
}

impl From<WhenSpec> for Vec<String> {
    fn from(spec: WhenSpec) -> Self {
        match spec {
            WhenSpec::Bool(b) => vec![b.to_string()],
            WhenSpec::Single(s) => vec![s],
            WhenSpec::List(list) => list,
        }
    }
}

/// Task as written, before the action key is identified.
#[derive(Debug, Deserialize)]
struct RawTask {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    when: Option<WhenSpec>,
    #[serde(default, rename = "loop")]
    loop_over: Option<LoopSpec>,
    #[serde(default)]
    vars: IndexMap<String, JsonValue>,
    #[serde(default)]
    ignore_errors: bool,
    #[serde(flatten)]
    rest: IndexMap<String, JsonValue>,
}

impl TryFrom<RawTask> for Task {
    type Error = String;

    fn try_from(raw: RawTask) -> Result<Self, Self::Error> {
        let label = raw.name.clone().unwrap_or_else(|| "<unnamed>".to_string());
        let mut rest = raw.rest.into_iter();
        let (action, args) = match (rest.next(), rest.next()) {
            (Some(action), None) => action,
            (None, _) => return Err(format!("task '{}' has no action", label)),
            (Some((first, _)), Some((second, _))) => {
                return Err(format!(
                    "task '{}' has more than one action or unknown keyword: '{}', '{}'",
                    label, first, second
                ))
            }
        };

        let module = action.strip_prefix(BUILTIN_PREFIX).unwrap_or(&action);
        if !KNOWN_ACTIONS.contains(&module) {
            return Err(format!("task '{}' uses unknown action '{}'", label, action));
        }

        let args = match args {
            JsonValue::Null => IndexMap::new(),
            JsonValue::Object(map) => map.into_iter().collect(),
            JsonValue::String(free_form) => parse_free_form(&free_form)
                .map_err(|e| format!("task '{}': {}", label, e))?,
            other => {
                return Err(format!(
                    "task '{}': arguments of '{}' must be a mapping, got {}",
                    label, action, other
                ))
            }
        };

        Ok(Task {
            name: raw.name,
            action,
            args,
            when: raw.when.map(Vec::from).unwrap_or_default(),
            loop_over: raw.loop_over,
            vars: raw.vars,
            ignore_errors: raw.ignore_errors,
        })
    }
}

/// Parse `key=value key2="quoted value"` argument strings.
pub fn parse_free_form(input: &str) -> Result<IndexMap<String, JsonValue>, String> {
    let words = shell_words::split(input).map_err(|e| e.to_string())?;
    words
        .into_iter()
        .map(|word| match word.split_once('=') {
            Some((key, value)) if !key.is_empty() => {
                Ok((key.to_string(), JsonValue::String(value.to_string())))
            }
            _ => Err(format!("expected key=value, got '{}'", word)),
        })
        .collect()
}
