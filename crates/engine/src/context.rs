//! Run-time context consulted by deferred references.

use std::collections::HashMap;

use serde_json::{Map as JsonMap, Value};

/// Values available while a workflow run executes.
///
/// The context is populated by the execution layer; references only read from it.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct RunContext {
    /// Run configuration supplied when the run was triggered, if any.
    ///
    /// This is the highest-precedence source for deferred parameter references.
    pub run_configuration: Option<JsonMap<String, Value>>,

    /// Workflow-level parameter values in effect for the run.
    pub parameters: JsonMap<String, Value>,

    /// Output values recorded by completed steps, keyed by step id.
    pub step_outputs: HashMap<String, Value>,
}

impl RunContext {
    /// Creates a context with the given run configuration and parameter values.
    pub fn new(run_configuration: Option<JsonMap<String, Value>>, parameters: JsonMap<String, Value>) -> Self {
        Self {
            run_configuration,
            parameters,
            step_outputs: HashMap::new(),
        }
    }

    /// Looks up `name` in the run configuration.
    pub fn run_configuration_value(&self, name: &str) -> Option<&Value> {
        self.run_configuration.as_ref().and_then(|configuration| configuration.get(name))
    }

    /// Records the output of a completed step.
    pub fn record_step_output(&mut self, step_id: impl Into<String>, output: Value) {
        self.step_outputs.insert(step_id.into(), output);
    }
}
