//! Workflow-scoped parameter owner built from parameter documents.

use flowparams_types::{ParameterDeclaration, ParameterDocument};
use indexmap::IndexMap;

use crate::{collection::ParameterCollection, parameter::Parameter, reference::ParameterOwner};

/// Parameters declared by a single workflow: one workflow-level collection plus one collection per step.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WorkflowParameters {
    workflow_id: String,
    parameters: ParameterCollection,
    steps: IndexMap<String, ParameterCollection>,
}

impl WorkflowParameters {
    pub fn new(workflow_id: impl Into<String>) -> Self {
        Self {
            workflow_id: workflow_id.into(),
            ..Self::default()
        }
    }

    /// Builds the owner from a parsed document.
    ///
    /// Declaration defaults are not checked here; a default that violates its schema surfaces when the
    /// parameter is first resolved.
    pub fn from_document(document: &ParameterDocument) -> Self {
        let steps = document
            .steps
            .iter()
            .map(|(step_id, declarations)| (step_id.clone(), collection_from_declarations(declarations)))
            .collect();
        Self {
            workflow_id: document.workflow.clone(),
            parameters: collection_from_declarations(&document.params),
            steps,
        }
    }

    /// Parameters declared for `step_id`, if the step declares any.
    pub fn step_parameters(&self, step_id: &str) -> Option<&ParameterCollection> {
        self.steps.get(step_id)
    }

    /// Mutable step collection, created empty on first access.
    pub fn step_parameters_mut(&mut self, step_id: &str) -> &mut ParameterCollection {
        self.steps.entry(step_id.to_string()).or_default()
    }

    pub fn step_ids(&self) -> impl Iterator<Item = &str> {
        self.steps.keys().map(String::as_str)
    }
}

impl ParameterOwner for WorkflowParameters {
    fn workflow_id(&self) -> &str {
        &self.workflow_id
    }

    fn parameters(&self) -> &ParameterCollection {
        &self.parameters
    }

    fn parameters_mut(&mut self) -> &mut ParameterCollection {
        &mut self.parameters
    }
}

fn collection_from_declarations(declarations: &IndexMap<String, ParameterDeclaration>) -> ParameterCollection {
    ParameterCollection::from_parameters(
        declarations
            .iter()
            .map(|(name, declaration)| (name.clone(), parameter_from_declaration(declaration))),
    )
}

fn parameter_from_declaration(declaration: &ParameterDeclaration) -> Parameter {
    match declaration {
        ParameterDeclaration::Declared(declared) => {
            Parameter::from_parts(declared.default.clone(), declared.description.clone(), declared.schema.clone())
        }
        ParameterDeclaration::Literal(value) => Parameter::new(Some(value.clone())),
    }
}
