//! Assert module - Evaluate conditions and record each outcome
//!
//! Every expression in `that` is evaluated, even after an earlier one
//! failed, so the result always carries the complete list of assertions.
//! A failed assertion marks the task changed by default; with `fatal: true`
//! it fails the task instead. Unlike most modules, it runs entirely on the
//! control node.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::{Module, ModuleContext, ModuleError, ModuleOutput, ModuleParams, ModuleResult, ParamExt};
use crate::traits::{ConditionCheckHandler, ConditionEvaluator, Variables};

/// Message used when a failing assertion has no `fail_msg`/`msg`.
pub const DEFAULT_FAIL_MSG: &str = "Assertion failed";
/// Message used when every assertion passed and no `success_msg` is set.
pub const DEFAULT_SUCCESS_MSG: &str = "All assertions passed";

/// Argument keys accepted by the module.
const VALID_ARGS: &[&str] = &[
    "that",
    "msg",
    "fail_msg",
    "success_msg",
    "quiet",
    "fatal",
    "nonfatal",
];

/// A `fail_msg`/`msg`/`success_msg` argument.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageSpec {
    /// A single message string.
    Single(String),
    /// An ordered list of message lines.
    Lines(Vec<String>),
}

impl MessageSpec {
    /// Parses a message argument, accepting only a string or a list of strings.
    pub fn parse(key: &str, value: &Value) -> ModuleResult<Self> {
        match value {
            Value::String(s) => Ok(MessageSpec::Single(s.clone())),
            Value::Array(items) => items
                .iter()
                .map(|item| match item {
                    Value::String(s) => Ok(s.clone()),
                    other => Err(ModuleError::InvalidParameter(format!(
                        "Type of one of the elements in {} list is not string type (got {})",
                        key,
                        json_type_name(other)
                    ))),
                })
                .collect::<ModuleResult<Vec<_>>>()
                .map(MessageSpec::Lines),
            other => Err(ModuleError::InvalidParameter(format!(
                "Incorrect type for {}, expected a string or list and got {}",
                key,
                json_type_name(other)
            ))),
        }
    }
}

impl fmt::Display for MessageSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MessageSpec::Single(s) => f.write_str(s),
            MessageSpec::Lines(lines) => f.write_str(&lines.join(", ")),
        }
    }
}

impl From<&str> for MessageSpec {
    fn from(s: &str) -> Self {
        MessageSpec::Single(s.to_string())
    }
}

/// Validated arguments of one `assert` invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssertArgs {
    /// Expressions to evaluate, in order.
    pub that: Vec<String>,
    /// Message reported when any assertion fails.
    pub fail_msg: Option<MessageSpec>,
    /// Message reported when every assertion passes.
    pub success_msg: Option<MessageSpec>,
    /// Suppress forced verbose rendering of the result.
    pub quiet: bool,
    /// Fail the task instead of marking it changed.
    pub fatal: bool,
}

impl AssertArgs {
    /// Builds arguments for the given expressions with every option at its default.
    pub fn new<I, S>(that: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            that: that.into_iter().map(Into::into).collect(),
            fail_msg: None,
            success_msg: None,
            quiet: false,
            fatal: false,
        }
    }

    pub fn with_fatal(mut self, fatal: bool) -> Self {
        self.fatal = fatal;
        self
    }

    pub fn with_quiet(mut self, quiet: bool) -> Self {
        self.quiet = quiet;
        self
    }

    pub fn with_fail_msg(mut self, msg: MessageSpec) -> Self {
        self.fail_msg = Some(msg);
        self
    }

    pub fn with_success_msg(mut self, msg: MessageSpec) -> Self {
        self.success_msg = Some(msg);
        self
    }

    /// Parses and validates raw task parameters.
    pub fn from_params(params: &ModuleParams) -> ModuleResult<Self> {
        let mut unknown: Vec<&str> = params
            .keys()
            .map(String::as_str)
            .filter(|key| !VALID_ARGS.contains(key))
            .collect();
        if !unknown.is_empty() {
            unknown.sort_unstable();
            return Err(ModuleError::InvalidParameter(format!(
                "Unsupported parameters for assert: {}",
                unknown.join(", ")
            )));
        }

        let that = match params.get("that") {
            None | Some(Value::Null) => {
                return Err(ModuleError::MissingParameter(
                    "conditional required in \"that\" string".to_string(),
                ))
            }
            Some(Value::Array(items)) => items
                .iter()
                .map(|item| {
                    condition_text(item).ok_or_else(|| {
                        ModuleError::InvalidParameter(format!(
                            "'that' entries must be expressions, got {}",
                            json_type_name(item)
                        ))
                    })
                })
                .collect::<ModuleResult<Vec<_>>>()?,
            Some(other) => match condition_text(other) {
                Some(expression) => vec![expression],
                None => {
                    return Err(ModuleError::InvalidParameter(format!(
                        "'that' must be an expression or list of expressions, got {}",
                        json_type_name(other)
                    )))
                }
            },
        };

        let fail_msg = match params.get("fail_msg").or_else(|| params.get("msg")) {
            Some(value) => {
                let key = if params.contains_key("fail_msg") {
                    "fail_msg"
                } else {
                    "msg"
                };
                Some(MessageSpec::parse(key, value)?)
            }
            None => None,
        };
        let success_msg = params
            .get("success_msg")
            .map(|value| MessageSpec::parse("success_msg", value))
            .transpose()?;

        let quiet = params.get_bool("quiet")?.unwrap_or(false);
        let fatal = match (params.get_bool("fatal")?, params.get_bool("nonfatal")?) {
            (Some(fatal), Some(nonfatal)) if fatal == nonfatal => {
                return Err(ModuleError::InvalidParameter(
                    "'fatal' and 'nonfatal' contradict each other".to_string(),
                ))
            }
            (Some(fatal), _) => fatal,
            (None, Some(nonfatal)) => !nonfatal,
            (None, None) => false,
        };

        Ok(Self {
            that,
            fail_msg,
            success_msg,
            quiet,
            fatal,
        })
    }

    /// The assertions a skipped invocation would have evaluated.
    pub fn unevaluated(&self) -> Vec<Assertion> {
        self.that
            .iter()
            .map(|expression| Assertion {
                assertion: expression.clone(),
                evaluated_to: None,
            })
            .collect()
    }
}

/// One expression and, once evaluated, its outcome.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Assertion {
    /// Expression text.
    pub assertion: String,
    /// Evaluated outcome; absent when the expression never ran.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub evaluated_to: Option<bool>,
}

impl Assertion {
    /// Returns true if the expression evaluated to false.
    pub fn is_failed(&self) -> bool {
        self.evaluated_to == Some(false)
    }
}

/// Per-invocation counters carried in the result's side channel.
///
/// These count task invocations, not expressions: a multi-expression
/// `that` list contributes exactly one to `assertions`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvocationStats {
    pub assertions: u64,
    pub assertions_passed: u64,
    pub assertions_failed: u64,
}

impl InvocationStats {
    fn for_outcome(failed: bool) -> Self {
        Self {
            assertions: 1,
            assertions_passed: u64::from(!failed),
            assertions_failed: u64::from(failed),
        }
    }
}

impl std::ops::Add for InvocationStats {
    type Output = Self;

    fn add(self, other: Self) -> Self {
        Self {
            assertions: self.assertions + other.assertions,
            assertions_passed: self.assertions_passed + other.assertions_passed,
            assertions_failed: self.assertions_failed + other.assertions_failed,
        }
    }
}

/// Key of the side-channel counter block in the result record.
pub const STATS_KEY: &str = "assertive_stats";

/// Result of one `assert` invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssertResult {
    /// Assertions in evaluation order.
    pub assertions: Vec<Assertion>,
    /// Selected failure or success message.
    pub msg: MessageSpec,
    /// A non-fatal failure.
    pub changed: bool,
    /// A fatal failure.
    pub failed: bool,
    /// Render this result verbosely regardless of global verbosity.
    pub verbose_always: bool,
    /// Per-invocation counters.
    pub stats: InvocationStats,
}

impl AssertResult {
    /// Returns true if any assertion failed, fatal or not.
    pub fn failed_overall(&self) -> bool {
        self.assertions.iter().any(Assertion::is_failed)
    }

    /// Converts the result into the module output handed to the runtime.
    pub fn into_output(self) -> ModuleOutput {
        let message = self.msg.to_string();
        let base = if self.failed {
            ModuleOutput::failed(message)
        } else if self.changed {
            ModuleOutput::changed(message)
        } else {
            ModuleOutput::ok(message)
        };

        base.with_data("assertions", json!(self.assertions))
            .with_data("msg", json!(self.msg))
            .with_data("verbose_always", Value::Bool(self.verbose_always))
            .with_data(
                STATS_KEY,
                json!({
                    "data": self.stats,
                    "aggregate": true,
                    "per_host": true,
                }),
            )
    }
}

/// Module for asserting conditions
#[derive(Debug)]
pub struct AssertModule {
    evaluator: Arc<dyn ConditionEvaluator>,
    fail_verbose: bool,
}

impl AssertModule {
    /// Creates the module around a condition evaluator.
    pub fn new(evaluator: Arc<dyn ConditionEvaluator>) -> Self {
        Self {
            evaluator,
            fail_verbose: false,
        }
    }

    /// Force verbose rendering of failed results even when `quiet` is set.
    pub fn with_fail_verbose(mut self, fail_verbose: bool) -> Self {
        self.fail_verbose = fail_verbose;
        self
    }
}

impl ConditionCheckHandler for AssertModule {
    fn check_conditions(&self, args: &AssertArgs, vars: &Variables) -> ModuleResult<AssertResult> {
        let mut assertions = Vec::with_capacity(args.that.len());
        for expression in &args.that {
            let outcome = self
                .evaluator
                .evaluate(expression, vars)
                .map_err(|e| ModuleError::TemplateError(e.to_string()))?;
            assertions.push(Assertion {
                assertion: expression.clone(),
                evaluated_to: Some(outcome),
            });
        }

        let failed = assertions.iter().any(Assertion::is_failed);
        let msg = if failed {
            args.fail_msg
                .clone()
                .unwrap_or_else(|| MessageSpec::from(DEFAULT_FAIL_MSG))
        } else {
            args.success_msg
                .clone()
                .unwrap_or_else(|| MessageSpec::from(DEFAULT_SUCCESS_MSG))
        };

        Ok(AssertResult {
            assertions,
            msg,
            changed: failed && !args.fatal,
            failed: failed && args.fatal,
            verbose_always: !args.quiet || (failed && self.fail_verbose),
            stats: InvocationStats::for_outcome(failed),
        })
    }
}

impl Module for AssertModule {
    fn name(&self) -> &'static str {
        "assert"
    }

    fn description(&self) -> &'static str {
        "Assert that given expressions are true"
    }

    fn required_params(&self) -> &[&'static str] {
        &["that"]
    }

    fn raw_params(&self) -> &[&'static str] {
        &["that"]
    }

    fn validate_params(&self, params: &ModuleParams) -> ModuleResult<()> {
        AssertArgs::from_params(params).map(|_| ())
    }

    fn execute(
        &self,
        params: &ModuleParams,
        context: &ModuleContext,
    ) -> ModuleResult<ModuleOutput> {
        let args = AssertArgs::from_params(params)?;
        self.check_conditions(&args, &context.vars)
            .map(AssertResult::into_output)
    }

    fn check(&self, params: &ModuleParams, context: &ModuleContext) -> ModuleResult<ModuleOutput> {
        // Conditions are evaluated in check mode as well
        self.execute(params, context)
    }
}

/// Expression text of a `that` scalar. YAML booleans and numbers are
/// kept as their literal spelling.
fn condition_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "list",
        Value::Object(_) => "dict",
    }
}
