//! Precedence merge of workflow, step, and run-level parameters.
//!
//! Sources are merged lowest precedence first: workflow parameters, then step parameters, then (when enabled)
//! the run configuration. The merged collection is validated once and returned as a plain mapping.

use flowparams_util::EngineSettings;
use serde_json::{Map as JsonMap, Value};
use tracing::debug;

use crate::{
    collection::{ParameterCollection, ParameterSource},
    error::ParamError,
    reference::ParameterOwner,
    workflow::WorkflowParameters,
};

/// Builds the final parameter mapping for one step invocation.
///
/// `apply_run_override` gates the run configuration entirely; when it is false, `run_configuration` is ignored.
/// With `lenient` set, per-key missing values and schema failures resolve to `null` instead of failing the call.
///
/// # Errors
/// In strict mode, [`ParamError::SchemaValidation`] naming the first key whose merged value is rejected.
pub fn merge_parameters(
    workflow_params: Option<&ParameterCollection>,
    step_params: Option<ParameterSource<'_>>,
    run_configuration: Option<&JsonMap<String, Value>>,
    apply_run_override: bool,
    lenient: bool,
) -> Result<JsonMap<String, Value>, ParamError> {
    let mut merged = ParameterCollection::with_suppress_errors(lenient);

    if let Some(workflow_params) = workflow_params {
        merged.merge(workflow_params)?;
    }
    if let Some(step_params) = step_params {
        merged.merge(step_params)?;
    }

    match run_configuration {
        Some(configuration) if apply_run_override && !configuration.is_empty() => {
            debug!(keys = ?configuration.keys().collect::<Vec<_>>(), "overriding parameters with run configuration");
            merged.merge(configuration)?;
        }
        Some(configuration) if !configuration.is_empty() => {
            debug!("run configuration present but overrides are disabled");
        }
        _ => {}
    }

    merged.validate_all()
}

/// Merges the parameters in effect for `step_id` of `workflow`, taking the override switch from `settings`.
///
/// A step that declares no parameters contributes nothing.
///
/// # Errors
/// As [`merge_parameters`].
pub fn merge_for_step(
    workflow: &WorkflowParameters,
    step_id: Option<&str>,
    run_configuration: Option<&JsonMap<String, Value>>,
    settings: &EngineSettings,
    lenient: bool,
) -> Result<JsonMap<String, Value>, ParamError> {
    let step_params = step_id
        .and_then(|step_id| workflow.step_parameters(step_id))
        .map(ParameterSource::from);
    debug!(workflow = %workflow.workflow_id(), step = ?step_id, lenient, "merging parameters");
    merge_parameters(
        Some(workflow.parameters()),
        step_params,
        run_configuration,
        settings.run_configuration_overrides_parameters,
        lenient,
    )
}
