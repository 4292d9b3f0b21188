//! A single schema-constrained parameter value.
//!
//! A [`Parameter`] holds an optional default, a description, and a JSON-Schema mapping. Resolution validates a
//! candidate (or the stored value) and, on success, stores the result through [`Parameter::apply_resolved`] so the
//! parameter always remembers the last value that passed validation. Validation runs on every resolution, even
//! when nothing changed since the previous read.
//!
//! The stored value is `Option<Value>`: `None` is "unset" and is never confused with `Some(Value::Null)`.

use flowparams_types::{SerializedEnvelope, SerializedParameter};
use serde::Serialize;
use serde_json::{Map as JsonMap, Value};

use crate::{
    error::ParamError,
    serialization::{self, CLASS_IDENTIFIER},
    validation::{ensure_json, validate_candidate_value},
};

/// Current serialized schema version of [`Parameter`].
pub const PARAMETER_VERSION: u32 = 1;
/// Class-identity tag written by [`Parameter::dump`] and [`Parameter::to_envelope`].
pub const PARAMETER_CLASS: &str = "flowparams.Parameter";

/// Holds the default value of a parameter and the rule set used to validate it.
///
/// Without a schema it accepts and returns any JSON value.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Parameter {
    value: Option<Value>,
    description: Option<String>,
    schema: JsonMap<String, Value>,
}

impl Parameter {
    /// Creates a schemaless parameter from an already-JSON default (`None` leaves it unset).
    pub fn new(default: Option<Value>) -> Self {
        Self {
            value: default,
            description: None,
            schema: JsonMap::new(),
        }
    }

    /// Creates a parameter with no default.
    pub fn unset() -> Self {
        Self::default()
    }

    /// Creates a parameter from any serializable default.
    ///
    /// # Errors
    /// Returns [`ParamError::Serialization`] when `default` has no JSON form. No schema check happens here.
    pub fn with_default<T>(default: &T) -> Result<Self, ParamError>
    where
        T: Serialize + ?Sized,
    {
        Ok(Self::new(Some(ensure_json(default)?)))
    }

    /// Creates a parameter from all three parts.
    pub fn from_parts(default: Option<Value>, description: Option<String>, schema: JsonMap<String, Value>) -> Self {
        Self {
            value: default,
            description,
            schema,
        }
    }

    /// Sets the help text.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Sets the JSON-Schema mapping.
    pub fn with_schema(mut self, schema: JsonMap<String, Value>) -> Self {
        self.schema = schema;
        self
    }

    /// Stored value, `None` when unset.
    pub fn value(&self) -> Option<&Value> {
        self.value.as_ref()
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn schema(&self) -> &JsonMap<String, Value> {
        &self.schema
    }

    /// True when a value is stored and it is not JSON `null`.
    pub fn has_value(&self) -> bool {
        !matches!(self.value, None | Some(Value::Null))
    }

    /// Validates and returns the parameter's final value, storing it on success.
    ///
    /// The final value is `candidate` when supplied, otherwise the stored value. When `lenient` is true, a missing
    /// value or a schema failure yields `Value::Null` and leaves the stored value untouched.
    ///
    /// # Errors
    /// - [`ParamError::MissingValue`] when neither a candidate nor a stored value exists (strict only).
    /// - [`ParamError::SchemaValidation`] when the final value fails the schema (strict only).
    pub fn resolve(&mut self, candidate: Option<Value>, lenient: bool) -> Result<Value, ParamError> {
        let outcome = match candidate {
            Some(candidate) => validate_candidate_value(&candidate, &self.schema).map(|()| candidate),
            None => self.evaluate_stored(),
        };

        match outcome {
            Ok(resolved) => {
                self.apply_resolved(resolved.clone());
                Ok(resolved)
            }
            Err(error) => degrade(error, lenient),
        }
    }

    /// Like [`Parameter::resolve`], but accepts any serializable candidate.
    ///
    /// # Errors
    /// [`ParamError::Serialization`] is raised before validation, even when `lenient` is true.
    pub fn resolve_with<T>(&mut self, candidate: &T, lenient: bool) -> Result<Value, ParamError>
    where
        T: Serialize + ?Sized,
    {
        let candidate = ensure_json(candidate)?;
        self.resolve(Some(candidate), lenient)
    }

    /// Re-validates the stored value and returns it without taking `&mut self`.
    ///
    /// Equivalent to `resolve(None, lenient)`: a successful resolution of the stored value writes back the value
    /// that is already there.
    pub fn current(&self, lenient: bool) -> Result<Value, ParamError> {
        self.evaluate_stored().or_else(|error| degrade(error, lenient))
    }

    /// Stores a value that has already passed validation.
    pub fn apply_resolved(&mut self, value: Value) {
        self.value = Some(value);
    }

    /// Self-describing view with a class tag and every field; an unset value renders as `null`.
    pub fn dump(&self) -> JsonMap<String, Value> {
        let mut dumped = JsonMap::new();
        dumped.insert(CLASS_IDENTIFIER.to_string(), Value::String(PARAMETER_CLASS.to_string()));
        dumped.insert("value".to_string(), self.value.clone().unwrap_or(Value::Null));
        dumped.insert(
            "description".to_string(),
            self.description.clone().map(Value::String).unwrap_or(Value::Null),
        );
        dumped.insert("schema".to_string(), Value::Object(self.schema.clone()));
        dumped
    }

    /// Serializes `{value, description, schema}`; `value` is omitted while unset.
    pub fn serialize(&self) -> JsonMap<String, Value> {
        let mut fields = JsonMap::new();
        if let Some(value) = &self.value {
            fields.insert("value".to_string(), value.clone());
        }
        fields.insert(
            "description".to_string(),
            self.description.clone().map(Value::String).unwrap_or(Value::Null),
        );
        fields.insert("schema".to_string(), Value::Object(self.schema.clone()));
        fields
    }

    /// Restores a parameter serialized at `version`.
    ///
    /// # Errors
    /// [`ParamError::UnsupportedVersion`] when `version` is newer than [`PARAMETER_VERSION`], and
    /// [`ParamError::MalformedPayload`] when the fields do not decode.
    pub fn deserialize(data: &JsonMap<String, Value>, version: u32) -> Result<Self, ParamError> {
        serialization::ensure_supported_version(version, PARAMETER_VERSION)?;
        let fields: SerializedParameter = serde_json::from_value(Value::Object(data.clone()))?;
        Ok(Self::from_parts(fields.value, fields.description, fields.schema))
    }

    /// Wraps [`Parameter::serialize`] in a versioned envelope.
    pub fn to_envelope(&self) -> SerializedEnvelope {
        serialization::wrap(PARAMETER_CLASS, PARAMETER_VERSION, self.serialize())
    }

    /// Restores a parameter from a versioned envelope.
    pub fn from_envelope(envelope: &SerializedEnvelope) -> Result<Self, ParamError> {
        let (fields, version) = serialization::unwrap(envelope, PARAMETER_CLASS)?;
        Self::deserialize(fields, version)
    }

    fn evaluate_stored(&self) -> Result<Value, ParamError> {
        let stored = self.value.as_ref().ok_or(ParamError::MissingValue)?;
        validate_candidate_value(stored, &self.schema)?;
        Ok(stored.clone())
    }
}

impl From<Value> for Parameter {
    fn from(value: Value) -> Self {
        Self::new(Some(value))
    }
}

fn degrade(error: ParamError, lenient: bool) -> Result<Value, ParamError> {
    if lenient && error.is_suppressible() {
        return Ok(Value::Null);
    }
    Err(error)
}
