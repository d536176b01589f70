//! Set_fact module - Set host variables during a run
//!
//! The module only validates and echoes the facts; the executor merges the
//! `facts` block of the result into the host's variables so later tasks on
//! the same host can see them.

use super::{Module, ModuleContext, ModuleError, ModuleOutput, ModuleParams, ModuleResult};
use serde_json::{Map, Value};

/// Result key holding the facts to merge into host variables.
pub const FACTS_KEY: &str = "facts";

/// Module for setting host facts
#[derive(Debug, Default)]
pub struct SetFactModule;

impl Module for SetFactModule {
    fn name(&self) -> &'static str {
        "set_fact"
    }

    fn description(&self) -> &'static str {
        "Set host variables that persist for the rest of the run"
    }

    fn validate_params(&self, params: &ModuleParams) -> ModuleResult<()> {
        if params.is_empty() {
            return Err(ModuleError::InvalidParameter(
                "set_fact requires at least one key=value pair to set".to_string(),
            ));
        }
        Ok(())
    }

    fn execute(
        &self,
        params: &ModuleParams,
        _context: &ModuleContext,
    ) -> ModuleResult<ModuleOutput> {
        let mut names: Vec<&str> = params.keys().map(String::as_str).collect();
        names.sort_unstable();

        let message = match names.as_slice() {
            [single] => format!("Set fact: {}", single),
            many => format!("Set {} facts: {}", many.len(), many.join(", ")),
        };

        let facts: Map<String, Value> = params
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();

        Ok(ModuleOutput::ok(message).with_data(FACTS_KEY, Value::Object(facts)))
    }

    fn check(&self, params: &ModuleParams, context: &ModuleContext) -> ModuleResult<ModuleOutput> {
        // Later tasks may depend on these facts even in check mode
        self.execute(params, context)
    }
}
