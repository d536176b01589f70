//! Module system for assertive
//!
//! This module provides the core traits, types, and registry for the task
//! modules the executor can dispatch. All built-in modules run on the
//! control node.

pub mod assert;
pub mod debug;
pub mod set_fact;

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

use crate::traits::{ConditionEvaluator, Variables};

/// Errors that can occur during module execution
#[derive(Error, Debug)]
pub enum ModuleError {
    #[error("Module not found: {0}")]
    NotFound(String),

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Missing required parameter: {0}")]
    MissingParameter(String),

    #[error("Template error: {0}")]
    TemplateError(String),
}

impl ModuleError {
    /// Returns true for errors caused by the task's own arguments.
    pub fn is_configuration_error(&self) -> bool {
        matches!(
            self,
            ModuleError::InvalidParameter(_) | ModuleError::MissingParameter(_)
        )
    }
}

/// Result type for module operations
pub type ModuleResult<T> = Result<T, ModuleError>;

/// Status of a module execution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModuleStatus {
    /// Module executed successfully and made changes
    Changed,
    /// Module executed successfully but no changes were needed
    Ok,
    /// Module execution failed
    Failed,
    /// Module was skipped (e.g., condition not met)
    Skipped,
}

impl fmt::Display for ModuleStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModuleStatus::Changed => write!(f, "changed"),
            ModuleStatus::Ok => write!(f, "ok"),
            ModuleStatus::Failed => write!(f, "failed"),
            ModuleStatus::Skipped => write!(f, "skipped"),
        }
    }
}

/// Result of a module execution
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModuleOutput {
    /// Whether the module changed anything
    pub changed: bool,
    /// Human-readable message about what happened
    pub msg: String,
    /// Status of the execution
    pub status: ModuleStatus,
    /// Additional data returned by the module
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub data: HashMap<String, serde_json::Value>,
}

impl ModuleOutput {
    fn with_status(msg: impl Into<String>, status: ModuleStatus) -> Self {
        Self {
            changed: status == ModuleStatus::Changed,
            msg: msg.into(),
            status,
            data: HashMap::new(),
        }
    }

    /// Create a new successful output with no changes
    pub fn ok(msg: impl Into<String>) -> Self {
        Self::with_status(msg, ModuleStatus::Ok)
    }

    /// Create a new successful output with changes
    pub fn changed(msg: impl Into<String>) -> Self {
        Self::with_status(msg, ModuleStatus::Changed)
    }

    /// Create a failed output
    pub fn failed(msg: impl Into<String>) -> Self {
        Self::with_status(msg, ModuleStatus::Failed)
    }

    /// Create a skipped output
    pub fn skipped(msg: impl Into<String>) -> Self {
        Self::with_status(msg, ModuleStatus::Skipped)
    }

    /// Add data to the output
    pub fn with_data(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.data.insert(key.into(), value);
        self
    }

    /// Returns true if the module reported failure.
    pub fn is_failed(&self) -> bool {
        self.status == ModuleStatus::Failed
    }

    /// Flattens the output into the raw result mapping delivered to callbacks.
    ///
    /// Module data is merged last, so a module may override `msg` with a
    /// structured value.
    pub fn to_result(&self) -> serde_json::Map<String, serde_json::Value> {
        let mut result = serde_json::Map::new();
        result.insert("changed".to_string(), self.changed.into());
        result.insert("failed".to_string(), self.is_failed().into());
        if self.status == ModuleStatus::Skipped {
            result.insert("skipped".to_string(), true.into());
        }
        result.insert("msg".to_string(), self.msg.clone().into());
        for (key, value) in &self.data {
            result.insert(key.clone(), value.clone());
        }
        result
    }
}

/// Parameters passed to a module
pub type ModuleParams = HashMap<String, serde_json::Value>;

/// Context for module execution
#[derive(Debug, Clone, Default)]
pub struct ModuleContext {
    /// Whether to run in check mode (dry run)
    pub check_mode: bool,
    /// Verbosity level requested on the command line
    pub verbosity: u8,
    /// Variables available to the module
    pub vars: Variables,
}

impl ModuleContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_check_mode(mut self, check_mode: bool) -> Self {
        self.check_mode = check_mode;
        self
    }

    pub fn with_verbosity(mut self, verbosity: u8) -> Self {
        self.verbosity = verbosity;
        self
    }

    pub fn with_vars(mut self, vars: Variables) -> Self {
        self.vars = vars;
        self
    }
}

/// Trait that all modules must implement
pub trait Module: Send + Sync {
    /// Returns the name of the module
    fn name(&self) -> &'static str;

    /// Returns a description of what the module does
    fn description(&self) -> &'static str;

    /// Execute the module with the given parameters
    fn execute(&self, params: &ModuleParams, context: &ModuleContext)
        -> ModuleResult<ModuleOutput>;

    /// Check what would change without making changes (for check mode)
    fn check(&self, params: &ModuleParams, context: &ModuleContext) -> ModuleResult<ModuleOutput> {
        let check_context = ModuleContext {
            check_mode: true,
            ..context.clone()
        };
        self.execute(params, &check_context)
    }

    /// Validate the parameters before execution
    fn validate_params(&self, params: &ModuleParams) -> ModuleResult<()> {
        let _ = params;
        Ok(())
    }

    /// Returns the list of required parameters
    fn required_params(&self) -> &[&'static str] {
        &[]
    }

    /// Returns the parameter keys that must not be templated before execution.
    fn raw_params(&self) -> &[&'static str] {
        &[]
    }
}

/// Helper trait for extracting parameters
pub trait ParamExt {
    fn get_bool(&self, key: &str) -> ModuleResult<Option<bool>>;
    fn get_i64(&self, key: &str) -> ModuleResult<Option<i64>>;
}

impl ParamExt for ModuleParams {
    fn get_bool(&self, key: &str) -> ModuleResult<Option<bool>> {
        match self.get(key) {
            Some(serde_json::Value::Bool(b)) => Ok(Some(*b)),
            Some(serde_json::Value::String(s)) => match s.to_lowercase().as_str() {
                "true" | "yes" | "1" | "on" => Ok(Some(true)),
                "false" | "no" | "0" | "off" => Ok(Some(false)),
                _ => Err(ModuleError::InvalidParameter(format!(
                    "{} must be a boolean",
                    key
                ))),
            },
            Some(_) => Err(ModuleError::InvalidParameter(format!(
                "{} must be a boolean",
                key
            ))),
            None => Ok(None),
        }
    }

    fn get_i64(&self, key: &str) -> ModuleResult<Option<i64>> {
        match self.get(key) {
            Some(serde_json::Value::Number(n)) => n.as_i64().map(Some).ok_or_else(|| {
                ModuleError::InvalidParameter(format!("{} must be an integer", key))
            }),
            Some(serde_json::Value::String(s)) => s
                .parse()
                .map(Some)
                .map_err(|_| ModuleError::InvalidParameter(format!("{} must be an integer", key))),
            Some(_) => Err(ModuleError::InvalidParameter(format!(
                "{} must be an integer",
                key
            ))),
            None => Ok(None),
        }
    }
}

/// Registry for looking up modules by name
pub struct ModuleRegistry {
    modules: HashMap<String, Arc<dyn Module>>,
}

impl ModuleRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self {
            modules: HashMap::new(),
        }
    }

    /// Create a registry with all built-in modules.
    ///
    /// The `assert` module evaluates its conditions through `evaluator`.
    pub fn with_builtins(evaluator: Arc<dyn ConditionEvaluator>, fail_verbose: bool) -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(
            assert::AssertModule::new(evaluator).with_fail_verbose(fail_verbose),
        ));
        registry.register(Arc::new(debug::DebugModule));
        registry.register(Arc::new(set_fact::SetFactModule));
        registry
    }

    /// Register a module
    pub fn register(&mut self, module: Arc<dyn Module>) {
        self.modules.insert(module.name().to_string(), module);
    }

    /// Get a module by name
    pub fn get(&self, name: &str) -> Option<Arc<dyn Module>> {
        self.modules.get(name).cloned()
    }

    /// Check if a module exists
    pub fn contains(&self, name: &str) -> bool {
        self.modules.contains_key(name)
    }

    /// Get all module names, sorted
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.modules.keys().map(|s| s.as_str()).collect();
        names.sort_unstable();
        names
    }

    /// Execute a module by name
    pub fn execute(
        &self,
        name: &str,
        params: &ModuleParams,
        context: &ModuleContext,
    ) -> ModuleResult<ModuleOutput> {
        let module = self
            .get(name)
            .ok_or_else(|| ModuleError::NotFound(name.to_string()))?;

        for param in module.required_params() {
            if !params.contains_key(*param) {
                return Err(ModuleError::MissingParameter((*param).to_string()));
            }
        }

        module.validate_params(params)?;

        if context.check_mode {
            module.check(params, context)
        } else {
            module.execute(params, context)
        }
    }
}

impl Default for ModuleRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::template::TemplateEngine;

    struct TestModule;

    impl Module for TestModule {
        fn name(&self) -> &'static str {
            "test"
        }

        fn description(&self) -> &'static str {
            "A test module"
        }

        fn execute(
            &self,
            params: &ModuleParams,
            context: &ModuleContext,
        ) -> ModuleResult<ModuleOutput> {
            if context.check_mode {
                return Ok(ModuleOutput::ok("Would do something"));
            }

            let msg = params
                .get("msg")
                .and_then(serde_json::Value::as_str)
                .unwrap_or("Hello");
            Ok(ModuleOutput::changed(msg))
        }

        fn required_params(&self) -> &[&'static str] {
            &["msg"]
        }
    }

    #[test]
    fn test_module_registry() {
        let mut registry = ModuleRegistry::new();
        registry.register(Arc::new(TestModule));

        assert!(registry.contains("test"));
        assert!(!registry.contains("nonexistent"));

        let module = registry.get("test").unwrap();
        assert_eq!(module.name(), "test");
    }

    #[test]
    fn test_registry_checks_required_params() {
        let mut registry = ModuleRegistry::new();
        registry.register(Arc::new(TestModule));

        let err = registry
            .execute("test", &ModuleParams::new(), &ModuleContext::default())
            .unwrap_err();
        assert!(matches!(err, ModuleError::MissingParameter(ref p) if p == "msg"));
        assert!(err.is_configuration_error());
    }

    #[test]
    fn test_registry_unknown_module() {
        let registry = ModuleRegistry::new();
        let err = registry
            .execute("nope", &ModuleParams::new(), &ModuleContext::default())
            .unwrap_err();
        assert!(matches!(err, ModuleError::NotFound(_)));
    }

    #[test]
    fn test_builtins() {
        let registry = ModuleRegistry::with_builtins(Arc::new(TemplateEngine::new()), false);
        assert_eq!(registry.names(), vec!["assert", "debug", "set_fact"]);
    }

    #[test]
    fn test_module_output_to_result() {
        let output = ModuleOutput::changed("Something changed")
            .with_data("msg", serde_json::json!(["a", "b"]))
            .with_data("key", serde_json::json!("value"));

        let result = output.to_result();
        assert_eq!(result["changed"], serde_json::json!(true));
        assert_eq!(result["failed"], serde_json::json!(false));
        assert_eq!(result["msg"], serde_json::json!(["a", "b"]));
        assert!(!result.contains_key("skipped"));
    }

    #[test]
    fn test_param_ext() {
        let mut params: ModuleParams = HashMap::new();
        params.insert("bool_true".to_string(), serde_json::json!(true));
        params.insert("bool_str".to_string(), serde_json::json!("yes"));
        params.insert("bool_bad".to_string(), serde_json::json!([1]));
        params.insert("number".to_string(), serde_json::json!(42));

        assert_eq!(params.get_bool("bool_true").unwrap(), Some(true));
        assert_eq!(params.get_bool("bool_str").unwrap(), Some(true));
        assert!(params.get_bool("bool_bad").is_err());
        assert_eq!(params.get_bool("missing").unwrap(), None);
        assert_eq!(params.get_i64("number").unwrap(), Some(42));
    }
}
