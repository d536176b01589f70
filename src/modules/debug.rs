//! Debug module - Print a message or the value of a variable
//!
//! The rendered message travels in the result's `msg`; the default callback
//! prints it. `verbosity` hides the message unless the run was started with
//! at least that many `-v` flags.

use super::{Module, ModuleContext, ModuleError, ModuleOutput, ModuleParams, ModuleResult, ParamExt};
use serde_json::Value;

/// Module for printing debug messages and variable values
#[derive(Debug, Default)]
pub struct DebugModule;

impl DebugModule {
    fn format_value(value: &Value) -> String {
        match value {
            Value::String(s) => s.clone(),
            Value::Null => "(undefined)".to_string(),
            _ => serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string()),
        }
    }

    /// Resolve a dotted variable path such as `server.port`.
    fn lookup<'a>(path: &str, context: &'a ModuleContext) -> Option<&'a Value> {
        let mut parts = path.split('.');
        let root = context.vars.get(parts.next()?)?;
        parts.try_fold(root, |current, part| match current {
            Value::Object(obj) => obj.get(part),
            Value::Array(items) => part.parse::<usize>().ok().and_then(|i| items.get(i)),
            _ => None,
        })
    }
}

impl Module for DebugModule {
    fn name(&self) -> &'static str {
        "debug"
    }

    fn description(&self) -> &'static str {
        "Print debug messages or variable values"
    }

    fn validate_params(&self, params: &ModuleParams) -> ModuleResult<()> {
        match (params.contains_key("msg"), params.contains_key("var")) {
            (true, true) => Err(ModuleError::InvalidParameter(
                "Cannot specify both 'msg' and 'var' parameters".to_string(),
            )),
            (false, false) => Err(ModuleError::InvalidParameter(
                "Either 'msg' or 'var' must be provided".to_string(),
            )),
            _ => Ok(()),
        }
    }

    fn execute(
        &self,
        params: &ModuleParams,
        context: &ModuleContext,
    ) -> ModuleResult<ModuleOutput> {
        let required = params.get_i64("verbosity")?.unwrap_or(0);
        if i64::from(context.verbosity) < required {
            return Ok(ModuleOutput::skipped("Skipped due to verbosity level"));
        }

        if let Some(msg) = params.get("msg") {
            let message = Self::format_value(msg);
            return Ok(ModuleOutput::ok(message.clone()).with_data("msg", Value::String(message)));
        }

        let var_name = match params.get("var") {
            Some(Value::String(s)) => s.as_str(),
            _ => {
                return Err(ModuleError::InvalidParameter(
                    "'var' parameter must be a string".to_string(),
                ))
            }
        };

        let output = match Self::lookup(var_name, context) {
            Some(value) => ModuleOutput::ok(format!("{}: {}", var_name, Self::format_value(value)))
                .with_data(var_name, value.clone()),
            None => ModuleOutput::ok(format!("{}: VARIABLE IS NOT DEFINED!", var_name))
                .with_data(var_name, Value::Null),
        };
        Ok(output)
    }

    fn check(&self, params: &ModuleParams, context: &ModuleContext) -> ModuleResult<ModuleOutput> {
        self.execute(params, context)
    }
}
