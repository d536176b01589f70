//! Jinja2-compatible expression and template evaluation.
//!
//! [`TemplateEngine`] wraps a minijinja environment configured with strict
//! undefined handling: referencing a variable that does not exist is an
//! error, not a silently false condition. `x is defined` style tests keep
//! working because they never dereference the missing value.

use minijinja::{Environment, UndefinedBehavior};
use serde_json::Value as JsonValue;

use crate::error::{Error, Result};
use crate::traits::{ConditionEvaluator, Variables};

/// Strings that count as false once a `{{ }}` template has been rendered.
const FALSY_RENDERED: &[&str] = &["", "false", "no", "off", "0", "none"];

/// Template engine used for conditions, loop expressions and argument rendering.
#[derive(Debug)]
pub struct TemplateEngine {
    env: Environment<'static>,
}

impl Default for TemplateEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl TemplateEngine {
    /// Create an engine with strict undefined handling.
    pub fn new() -> Self {
        let mut env = Environment::new();
        env.set_undefined_behavior(UndefinedBehavior::Strict);
        env.set_trim_blocks(true);
        env.set_lstrip_blocks(true);
        Self { env }
    }

    /// Returns true if the string contains template markup.
    pub fn is_template(source: &str) -> bool {
        source.contains("{{") || source.contains("{%")
    }

    /// Render a template string against the given variables.
    pub fn render(&self, source: &str, vars: &Variables) -> Result<String> {
        self.env
            .render_str(source, vars)
            .map_err(|e| Error::evaluation(source, e.to_string()))
    }

    /// Render every string inside a JSON value, leaving other scalars untouched.
    pub fn render_value(&self, value: &JsonValue, vars: &Variables) -> Result<JsonValue> {
        match value {
            JsonValue::String(s) if Self::is_template(s) => {
                Ok(JsonValue::String(self.render(s, vars)?))
            }
            JsonValue::Array(items) => items
                .iter()
                .map(|item| self.render_value(item, vars))
                .collect::<Result<Vec<_>>>()
                .map(JsonValue::Array),
            JsonValue::Object(map) => {
                let mut rendered = serde_json::Map::with_capacity(map.len());
                for (key, item) in map {
                    rendered.insert(key.clone(), self.render_value(item, vars)?);
                }
                Ok(JsonValue::Object(rendered))
            }
            other => Ok(other.clone()),
        }
    }

    /// Evaluate a bare expression (`foo == 'bar'`) and return its value.
    ///
    /// A source wrapped in `{{ }}` is unwrapped first, so `"{{ items }}"`
    /// yields the list itself rather than its string rendering.
    pub fn evaluate_value(&self, expression: &str, vars: &Variables) -> Result<JsonValue> {
        let source = unwrap_braces(expression).unwrap_or(expression);
        let compiled = self
            .env
            .compile_expression(source)
            .map_err(|e| Error::evaluation(expression, e.to_string()))?;
        let value = compiled
            .eval(vars)
            .map_err(|e| Error::evaluation(expression, e.to_string()))?;
        serde_json::to_value(&value).map_err(|e| Error::evaluation(expression, e.to_string()))
    }

    /// Evaluate a condition using Jinja2 truthiness.
    ///
    /// Bare expressions are compiled directly. Sources that embed templates
    /// are rendered and the resulting text is interpreted, with the usual
    /// spellings of false (`false`, `no`, `0`, empty) counting as false.
    pub fn evaluate_condition(&self, condition: &str, vars: &Variables) -> Result<bool> {
        let trimmed = condition.trim();
        if let Some(inner) = unwrap_braces(trimmed) {
            return self.evaluate_expression(inner, condition, vars);
        }
        if Self::is_template(trimmed) {
            let rendered = self.render(trimmed, vars)?;
            let lowered = rendered.trim().to_lowercase();
            return Ok(!FALSY_RENDERED.contains(&lowered.as_str()));
        }
        self.evaluate_expression(trimmed, condition, vars)
    }

    fn evaluate_expression(&self, source: &str, original: &str, vars: &Variables) -> Result<bool> {
        let compiled = self
            .env
            .compile_expression(source)
            .map_err(|e| Error::evaluation(original, e.to_string()))?;
        let value = compiled
            .eval(vars)
            .map_err(|e| Error::evaluation(original, e.to_string()))?;
        Ok(value.is_true())
    }
}

impl ConditionEvaluator for TemplateEngine {
    fn evaluate(&self, expression: &str, vars: &Variables) -> Result<bool> {
        self.evaluate_condition(expression, vars)
    }
}

/// Returns the inner expression when the whole source is a single `{{ ... }}` block.
fn unwrap_braces(source: &str) -> Option<&str> {
    let trimmed = source.trim();
    let inner = trimmed.strip_prefix("{{")?.strip_suffix("}}")?;
    if inner.contains("{{") || inner.contains("}}") {
        return None;
    }
    Some(inner.trim())
}
