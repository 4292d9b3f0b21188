//! Errors raised while validating, merging, and resolving parameters.

use thiserror::Error;

/// Error surfaced by parameter operations.
///
/// Only [`ParamError::MissingValue`] and [`ParamError::SchemaValidation`] are affected by lenient mode; every
/// other variant is raised regardless of the caller's policy.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ParamError {
    /// A proposed or default value cannot be represented as JSON.
    #[error("All provided parameters must be json-serializable. The value of type '{type_name}' is not serializable: {reason}")]
    Serialization { type_name: String, reason: String },

    /// No candidate was supplied and the parameter has no stored default.
    #[error("No value passed and Param has no default value")]
    MissingValue,

    /// The value failed schema validation. `param` is set when raised from a collection context.
    #[error("{message}")]
    SchemaValidation { param: Option<String>, message: String },

    /// Deserialization was handed a payload newer than this build understands.
    #[error("serialized version {found} > class version {supported}")]
    UnsupportedVersion { found: u32, supported: u32 },

    /// A serialized reference points at a workflow that is not registered.
    #[error("Workflow with id {workflow_id} not found.")]
    UnknownWorkflow { workflow_id: String },

    /// None of the precedence tiers produced a value for a deferred reference.
    #[error("No value could be resolved for parameter {name}")]
    Resolution { name: String },

    /// Item access on a name the collection does not hold.
    #[error("Unknown parameter: {name}")]
    UnknownParameter { name: String },

    /// A step-output reference points at output that was never recorded.
    #[error("No output recorded for step {step_id}{}", .key.as_deref().map(|output_key| format!(" (key {output_key})")).unwrap_or_default())]
    MissingStepOutput { step_id: String, key: Option<String> },

    /// A serialized envelope carries another entity's class tag.
    #[error("expected serialized class {expected}, found {found}")]
    UnexpectedClass { expected: String, found: String },

    /// A serialized payload does not have the expected shape.
    #[error("malformed serialized payload: {reason}")]
    MalformedPayload { reason: String },
}

impl ParamError {
    /// Builds a schema validation error that is not tied to a collection key.
    pub fn schema(message: impl Into<String>) -> Self {
        Self::SchemaValidation {
            param: None,
            message: message.into(),
        }
    }

    /// Re-raises this error as a schema validation failure attributed to `name`.
    ///
    /// The resulting message reads `Invalid input for param NAME: <original message>`.
    pub fn for_param(self, name: &str) -> Self {
        Self::SchemaValidation {
            param: Some(name.to_string()),
            message: format!("Invalid input for param {name}: {self}"),
        }
    }

    /// Returns true when lenient mode may convert this error into a `null` result.
    pub fn is_suppressible(&self) -> bool {
        matches!(self, Self::MissingValue | Self::SchemaValidation { .. })
    }

    /// Name of the parameter this error is attributed to, when known.
    pub fn param(&self) -> Option<&str> {
        match self {
            Self::SchemaValidation { param, .. } => param.as_deref(),
            Self::Resolution { name } | Self::UnknownParameter { name } => Some(name.as_str()),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for ParamError {
    fn from(error: serde_json::Error) -> Self {
        Self::MalformedPayload { reason: error.to_string() }
    }
}
