//! Values that resolve lazily against a [`RunContext`].
//!
//! The execution layer treats every reference-like construct through the [`Resolvable`] trait: it can be resolved
//! against the live run context and it can list the upstream step outputs it reads. Two implementations live
//! here:
//!
//! - [`DeferredParameterReference`] binds a parameter name to the workflow that declared it and resolves it with a
//!   fixed three-tier precedence (run configuration, then its own default, then workflow parameters).
//! - [`StepOutputReference`] reads the recorded output of an upstream step.
//!
//! References never own their workflow. They keep its identifier and, when restored from a serialized form, look
//! it up through a [`WorkflowRegistry`].

use std::{
    collections::HashMap,
    hash::BuildHasher,
};

use flowparams_types::SerializedParameterReference;
use indexmap::IndexMap;
use serde_json::{Map as JsonMap, Value};
use tracing::debug;

use crate::{collection::ParameterCollection, context::RunContext, error::ParamError};

/// Capability shared by values that are resolved at run time.
pub trait Resolvable {
    /// Produces the value for the current run.
    fn resolve(&self, context: &RunContext) -> Result<Value, ParamError>;

    /// Lists the upstream step outputs this value depends on.
    fn iter_references(&self) -> Vec<StepReference>;
}

/// Pointer to the output of an upstream step.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StepReference {
    /// Identifier of the producing step.
    pub step_id: String,
    /// Key within the step's output object, or `None` for the whole output.
    pub key: Option<String>,
}

/// Workflow-side collaborator that owns a parameter collection.
pub trait ParameterOwner {
    /// Stable identifier used in serialized references.
    fn workflow_id(&self) -> &str;

    fn parameters(&self) -> &ParameterCollection;

    fn parameters_mut(&mut self) -> &mut ParameterCollection;
}

/// Lookup of workflows by identifier, used when restoring serialized references.
pub trait WorkflowRegistry {
    type Workflow: ParameterOwner;

    fn workflow_mut(&mut self, workflow_id: &str) -> Option<&mut Self::Workflow>;
}

impl<W, S> WorkflowRegistry for HashMap<String, W, S>
where
    W: ParameterOwner,
    S: BuildHasher,
{
    type Workflow = W;

    fn workflow_mut(&mut self, workflow_id: &str) -> Option<&mut W> {
        self.get_mut(workflow_id)
    }
}

impl<W, S> WorkflowRegistry for IndexMap<String, W, S>
where
    W: ParameterOwner,
    S: BuildHasher,
{
    type Workflow = W;

    fn workflow_mut(&mut self, workflow_id: &str) -> Option<&mut W> {
        self.get_mut(workflow_id)
    }
}

/// Named parameter reference bound to the workflow that declared it.
///
/// Declaring a reference with a default registers that default in the owning workflow's collection right away,
/// so declaration order is registration order.
#[derive(Debug, Clone, PartialEq)]
pub struct DeferredParameterReference {
    workflow_id: String,
    name: String,
    default: Option<Value>,
}

impl DeferredParameterReference {
    /// Declares a reference to `name` on `workflow`.
    ///
    /// # Errors
    /// When `default` is set and the workflow already holds a constrained parameter under `name`, a default that
    /// fails its schema is rejected with [`ParamError::SchemaValidation`].
    pub fn new<W>(workflow: &mut W, name: impl Into<String>, default: Option<Value>) -> Result<Self, ParamError>
    where
        W: ParameterOwner + ?Sized,
    {
        let name = name.into();
        if let Some(default) = &default {
            workflow.parameters_mut().set_item(&name, default.clone())?;
        }
        Ok(Self {
            workflow_id: workflow.workflow_id().to_string(),
            name,
            default,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Default supplied at declaration, `None` when unset.
    pub fn default_value(&self) -> Option<&Value> {
        self.default.as_ref()
    }

    pub fn workflow_id(&self) -> &str {
        &self.workflow_id
    }

    /// Serializes `{workflow_id, name, default}`; `default` is omitted while unset.
    pub fn serialize(&self) -> JsonMap<String, Value> {
        let mut fields = JsonMap::new();
        fields.insert("workflow_id".to_string(), Value::String(self.workflow_id.clone()));
        fields.insert("name".to_string(), Value::String(self.name.clone()));
        if let Some(default) = &self.default {
            fields.insert("default".to_string(), default.clone());
        }
        fields
    }

    /// Restores a reference, re-declaring it on the registered workflow.
    ///
    /// # Errors
    /// [`ParamError::UnknownWorkflow`] when the registry has no workflow with the recorded id, and
    /// [`ParamError::MalformedPayload`] when the fields do not decode.
    pub fn deserialize<R>(data: &JsonMap<String, Value>, registry: &mut R) -> Result<Self, ParamError>
    where
        R: WorkflowRegistry + ?Sized,
    {
        let fields: SerializedParameterReference = serde_json::from_value(Value::Object(data.clone()))?;
        let workflow = registry
            .workflow_mut(&fields.workflow_id)
            .ok_or_else(|| ParamError::UnknownWorkflow {
                workflow_id: fields.workflow_id.clone(),
            })?;
        Self::new(workflow, fields.name, fields.default)
    }
}

impl Resolvable for DeferredParameterReference {
    /// Resolves in order: run configuration, the reference's own default, then workflow parameters.
    fn resolve(&self, context: &RunContext) -> Result<Value, ParamError> {
        if let Some(value) = context.run_configuration_value(&self.name) {
            debug!(parameter = %self.name, source = "run_configuration", "resolved deferred parameter");
            return Ok(value.clone());
        }
        if let Some(default) = &self.default {
            debug!(parameter = %self.name, source = "default", "resolved deferred parameter");
            return Ok(default.clone());
        }
        if let Some(value) = context.parameters.get(&self.name) {
            debug!(parameter = %self.name, source = "parameters", "resolved deferred parameter");
            return Ok(value.clone());
        }
        Err(ParamError::Resolution { name: self.name.clone() })
    }

    fn iter_references(&self) -> Vec<StepReference> {
        Vec::new()
    }
}

/// Reference to the recorded output of an upstream step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepOutputReference {
    step_id: String,
    key: Option<String>,
}

impl StepOutputReference {
    /// References the whole output of `step_id`.
    pub fn new(step_id: impl Into<String>) -> Self {
        Self {
            step_id: step_id.into(),
            key: None,
        }
    }

    /// References a single key of an object output.
    pub fn with_key(step_id: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            step_id: step_id.into(),
            key: Some(key.into()),
        }
    }

    pub fn step_id(&self) -> &str {
        &self.step_id
    }
}

impl Resolvable for StepOutputReference {
    fn resolve(&self, context: &RunContext) -> Result<Value, ParamError> {
        let missing = || ParamError::MissingStepOutput {
            step_id: self.step_id.clone(),
            key: self.key.clone(),
        };
        let output = context.step_outputs.get(&self.step_id).ok_or_else(missing)?;
        match &self.key {
            Some(key) => output.get(key).cloned().ok_or_else(missing),
            None => Ok(output.clone()),
        }
    }

    fn iter_references(&self) -> Vec<StepReference> {
        vec![StepReference {
            step_id: self.step_id.clone(),
            key: self.key.clone(),
        }]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parameter::Parameter;
    use serde_json::json;

    struct DemoWorkflow {
        id: String,
        parameters: ParameterCollection,
    }

    impl DemoWorkflow {
        fn new(id: &str) -> Self {
            Self {
                id: id.to_string(),
                parameters: ParameterCollection::new(),
            }
        }
    }

    impl ParameterOwner for DemoWorkflow {
        fn workflow_id(&self) -> &str {
            &self.id
        }

        fn parameters(&self) -> &ParameterCollection {
            &self.parameters
        }

        fn parameters_mut(&mut self) -> &mut ParameterCollection {
            &mut self.parameters
        }
    }

    fn object(value: Value) -> JsonMap<String, Value> {
        value.as_object().cloned().expect("object")
    }

    #[test]
    fn declaring_with_default_registers_it() {
        let mut workflow = DemoWorkflow::new("etl");

        let reference = DeferredParameterReference::new(&mut workflow, "subject", Some(json!("Hi"))).expect("declare");

        assert_eq!(reference.workflow_id(), "etl");
        assert_eq!(workflow.parameters().get_item("subject"), Ok(json!("Hi")));
    }

    #[test]
    fn declaring_without_default_leaves_workflow_untouched() {
        let mut workflow = DemoWorkflow::new("etl");

        DeferredParameterReference::new(&mut workflow, "subject", None).expect("declare");

        assert!(workflow.parameters().is_empty());
    }

    #[test]
    fn declaring_with_invalid_default_fails() {
        let mut workflow = DemoWorkflow::new("etl");
        workflow.parameters_mut().insert_parameter(
            "count",
            Parameter::new(Some(json!(1))).with_schema(object(json!({"type": "integer"}))),
        );

        let error = DeferredParameterReference::new(&mut workflow, "count", Some(json!("one"))).expect_err("schema rejects");
        assert_eq!(error.param(), Some("count"));
    }

    #[test]
    fn precedence_is_run_configuration_then_default_then_parameters() {
        let mut workflow = DemoWorkflow::new("etl");
        let reference = DeferredParameterReference::new(&mut workflow, "p", Some(json!("B"))).expect("declare");
        let mut context = RunContext::new(Some(object(json!({"p": "A"}))), object(json!({"p": "C"})));

        assert_eq!(reference.resolve(&context), Ok(json!("A")));

        context.run_configuration = Some(JsonMap::new());
        assert_eq!(reference.resolve(&context), Ok(json!("B")));

        let without_default = DeferredParameterReference::new(&mut workflow, "p", None).expect("declare");
        assert_eq!(without_default.resolve(&context), Ok(json!("C")));

        context.parameters.clear();
        context.run_configuration = None;
        assert_eq!(
            without_default.resolve(&context),
            Err(ParamError::Resolution { name: "p".into() })
        );
    }

    #[test]
    fn null_default_still_wins_over_parameters() {
        let mut workflow = DemoWorkflow::new("etl");
        let reference = DeferredParameterReference::new(&mut workflow, "p", Some(Value::Null)).expect("declare");
        let context = RunContext::new(None, object(json!({"p": "C"})));

        assert_eq!(reference.resolve(&context), Ok(Value::Null));
    }

    #[test]
    fn deferred_references_have_no_upstream_steps() {
        let mut workflow = DemoWorkflow::new("etl");
        let reference = DeferredParameterReference::new(&mut workflow, "p", None).expect("declare");
        assert!(reference.iter_references().is_empty());
    }

    #[test]
    fn serialize_and_deserialize_through_registry() {
        let mut registry: HashMap<String, DemoWorkflow> = HashMap::new();
        registry.insert("etl".into(), DemoWorkflow::new("etl"));

        let reference = {
            let workflow = registry.get_mut("etl").expect("registered");
            DeferredParameterReference::new(workflow, "subject", Some(json!("Hi"))).expect("declare")
        };
        let serialized = reference.serialize();
        assert_eq!(serialized, object(json!({"workflow_id": "etl", "name": "subject", "default": "Hi"})));

        registry.get_mut("etl").expect("registered").parameters_mut().remove("subject");
        let restored = DeferredParameterReference::deserialize(&serialized, &mut registry).expect("restore");

        assert_eq!(restored, reference);
        assert_eq!(registry["etl"].parameters().get_item("subject"), Ok(json!("Hi")));
    }

    #[test]
    fn unset_default_is_omitted_and_restored_as_unset() {
        let mut registry: IndexMap<String, DemoWorkflow> = IndexMap::new();
        registry.insert("etl".into(), DemoWorkflow::new("etl"));
        let reference = DeferredParameterReference::new(&mut registry["etl"], "subject", None).expect("declare");

        let serialized = reference.serialize();
        assert!(!serialized.contains_key("default"));

        let restored = DeferredParameterReference::deserialize(&serialized, &mut registry).expect("restore");
        assert_eq!(restored.default_value(), None);
    }

    #[test]
    fn null_default_is_serialized_explicitly() {
        let mut workflow = DemoWorkflow::new("etl");
        let reference = DeferredParameterReference::new(&mut workflow, "subject", Some(Value::Null)).expect("declare");

        assert_eq!(
            reference.serialize(),
            object(json!({"workflow_id": "etl", "name": "subject", "default": null}))
        );
    }

    #[test]
    fn deserialize_fails_for_unknown_workflow() {
        let mut registry: HashMap<String, DemoWorkflow> = HashMap::new();
        let data = object(json!({"workflow_id": "ghost", "name": "p"}));

        assert_eq!(
            DeferredParameterReference::deserialize(&data, &mut registry),
            Err(ParamError::UnknownWorkflow {
                workflow_id: "ghost".into()
            })
        );
    }

    #[test]
    fn step_output_reference_reads_recorded_output() {
        let mut context = RunContext::default();
        context.record_step_output("extract", json!({"rows": 120, "table": "events"}));

        assert_eq!(StepOutputReference::with_key("extract", "rows").resolve(&context), Ok(json!(120)));
        assert_eq!(
            StepOutputReference::new("extract").resolve(&context),
            Ok(json!({"rows": 120, "table": "events"}))
        );
        assert!(matches!(
            StepOutputReference::with_key("extract", "bytes").resolve(&context),
            Err(ParamError::MissingStepOutput { .. })
        ));
        assert!(StepOutputReference::new("load").resolve(&context).is_err());
    }

    #[test]
    fn resolvables_are_interchangeable() {
        let mut workflow = DemoWorkflow::new("etl");
        let mut context = RunContext::new(None, JsonMap::new());
        context.record_step_output("extract", json!({"rows": 7}));

        let values: Vec<Box<dyn Resolvable>> = vec![
            Box::new(DeferredParameterReference::new(&mut workflow, "limit", Some(json!(10))).expect("declare")),
            Box::new(StepOutputReference::with_key("extract", "rows")),
        ];

        let resolved: Vec<Value> = values.iter().map(|value| value.resolve(&context).expect("resolves")).collect();
        let upstream: Vec<StepReference> = values.iter().flat_map(|value| value.iter_references()).collect();

        assert_eq!(resolved, vec![json!(10), json!(7)]);
        assert_eq!(
            upstream,
            vec![StepReference {
                step_id: "extract".into(),
                key: Some("rows".into())
            }]
        );
    }
}
