//! Ordered parameter collections with merge-on-write and resolve-on-read semantics.
//!
//! Every entry of a [`ParameterCollection`] is a [`Parameter`]; plain values are wrapped on insertion. Writes to
//! an existing name validate the new value against that parameter's schema before storing it, and reads always
//! re-validate before returning a plain value.
//!
//! ```rust
//! use flowparams_engine::ParameterCollection;
//! use serde_json::json;
//!
//! let mut collection = ParameterCollection::from_values(json!({"a": 1}).as_object().cloned().unwrap_or_default());
//! assert_eq!(collection.get_item("a")?, json!(1));
//!
//! collection.set_item("a", json!("x"))?;
//! assert_eq!(collection.get_item("a")?, json!("x"));
//! # Ok::<(), flowparams_engine::ParamError>(())
//! ```

use std::fmt;

use flowparams_types::SerializedEnvelope;
use indexmap::IndexMap;
use serde::Serialize;
use serde_json::{Map as JsonMap, Value};
use tracing::debug;

use crate::{error::ParamError, parameter::Parameter, serialization, validation::ensure_json};

/// Current serialized schema version of [`ParameterCollection`].
pub const COLLECTION_VERSION: u32 = 1;
/// Class-identity tag written by [`ParameterCollection::to_envelope`].
pub const COLLECTION_CLASS: &str = "flowparams.ParameterCollection";

/// Holds all parameters of a workflow or step, keyed by name in insertion order.
#[derive(Clone, Default)]
pub struct ParameterCollection {
    entries: IndexMap<String, Parameter>,
    suppress_errors: bool,
}

/// Something that can be merged into a [`ParameterCollection`].
#[derive(Debug, Clone, Copy)]
pub enum ParameterSource<'a> {
    /// Parameters are adopted wholesale, schema and description included, without re-validation.
    Collection(&'a ParameterCollection),
    /// Values are written key by key through [`ParameterCollection::set_item`], re-validating each.
    Values(&'a JsonMap<String, Value>),
}

impl<'a> From<&'a ParameterCollection> for ParameterSource<'a> {
    fn from(collection: &'a ParameterCollection) -> Self {
        Self::Collection(collection)
    }
}

impl<'a> From<&'a JsonMap<String, Value>> for ParameterSource<'a> {
    fn from(values: &'a JsonMap<String, Value>) -> Self {
        Self::Values(values)
    }
}

impl ParameterSource<'_> {
    /// True when the source carries no entries.
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Collection(collection) => collection.is_empty(),
            Self::Values(values) => values.is_empty(),
        }
    }
}

impl ParameterCollection {
    /// Creates an empty strict collection.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty collection; `suppress_errors` turns per-key failures into `null` results.
    pub fn with_suppress_errors(suppress_errors: bool) -> Self {
        Self {
            entries: IndexMap::new(),
            suppress_errors,
        }
    }

    /// Wraps every value in a schemaless parameter. Nothing is validated.
    pub fn from_values(values: JsonMap<String, Value>) -> Self {
        Self {
            entries: values.into_iter().map(|(name, value)| (name, Parameter::from(value))).collect(),
            suppress_errors: false,
        }
    }

    /// Builds a collection from named parameters, keeping each one as given.
    pub fn from_parameters<I, K>(parameters: I) -> Self
    where
        I: IntoIterator<Item = (K, Parameter)>,
        K: Into<String>,
    {
        Self {
            entries: parameters.into_iter().map(|(name, parameter)| (name.into(), parameter)).collect(),
            suppress_errors: false,
        }
    }

    pub fn suppress_errors(&self) -> bool {
        self.suppress_errors
    }

    pub fn set_suppress_errors(&mut self, suppress_errors: bool) {
        self.suppress_errors = suppress_errors;
    }

    /// Writes a plain value under `name`.
    ///
    /// An existing parameter validates `value` against its schema and stores it on success. An unknown name is
    /// wrapped in a new schemaless parameter. When the collection suppresses errors, a rejected value is dropped
    /// and the stored value is kept.
    ///
    /// # Errors
    /// [`ParamError::SchemaValidation`] naming `name` when the value is rejected in strict mode.
    pub fn set_item(&mut self, name: &str, value: Value) -> Result<(), ParamError> {
        let Some(parameter) = self.entries.get_mut(name) else {
            self.entries.insert(name.to_string(), Parameter::from(value));
            return Ok(());
        };

        match parameter.resolve(Some(value), false) {
            Ok(_) => Ok(()),
            Err(error) if self.suppress_errors && error.is_suppressible() => {
                debug!(parameter = %name, error = %error, "ignoring rejected parameter update");
                Ok(())
            }
            Err(error) => Err(error.for_param(name)),
        }
    }

    /// Writes any serializable value under `name`.
    ///
    /// # Errors
    /// [`ParamError::Serialization`] when `value` has no JSON form, otherwise as [`ParameterCollection::set_item`].
    pub fn set_serializable<T>(&mut self, name: &str, value: &T) -> Result<(), ParamError>
    where
        T: Serialize + ?Sized,
    {
        let value = ensure_json(value)?;
        self.set_item(name, value)
    }

    /// Replaces the entry under `name` wholesale, schema and description included.
    pub fn insert_parameter(&mut self, name: impl Into<String>, parameter: Parameter) -> Option<Parameter> {
        self.entries.insert(name.into(), parameter)
    }

    /// Reads the validated value of `name`.
    ///
    /// # Errors
    /// - [`ParamError::UnknownParameter`] when `name` is not in the collection.
    /// - [`ParamError::SchemaValidation`] naming `name` when the stored value is missing or invalid (strict only).
    pub fn get_item(&self, name: &str) -> Result<Value, ParamError> {
        let parameter = self
            .entries
            .get(name)
            .ok_or_else(|| ParamError::UnknownParameter { name: name.to_string() })?;
        parameter
            .current(self.suppress_errors)
            .map_err(|error| error.for_param(name))
    }

    /// Underlying parameter object for callers that need its schema or description.
    pub fn get_parameter(&self, name: &str) -> Option<&Parameter> {
        self.entries.get(name)
    }

    pub fn get_parameter_mut(&mut self, name: &str) -> Option<&mut Parameter> {
        self.entries.get_mut(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Removes `name`, keeping the order of the remaining entries.
    pub fn remove(&mut self, name: &str) -> Option<Parameter> {
        self.entries.shift_remove(name)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Parameter)> {
        self.entries.iter().map(|(name, parameter)| (name.as_str(), parameter))
    }

    /// Merges another collection or a plain mapping into this one; later entries win.
    ///
    /// # Errors
    /// Plain mappings go through [`ParameterCollection::set_item`] and stop at the first rejected value.
    pub fn merge<'a>(&mut self, source: impl Into<ParameterSource<'a>>) -> Result<(), ParamError> {
        match source.into() {
            ParameterSource::Collection(other) => {
                for (name, parameter) in &other.entries {
                    self.entries.insert(name.clone(), parameter.clone());
                }
                Ok(())
            }
            ParameterSource::Values(values) => {
                for (name, value) in values {
                    self.set_item(name, value.clone())?;
                }
                Ok(())
            }
        }
    }

    /// Best-effort plain view: every entry resolved leniently. Never fails.
    pub fn dump_all(&self) -> JsonMap<String, Value> {
        self.entries
            .iter()
            .map(|(name, parameter)| (name.clone(), parameter.current(true).unwrap_or(Value::Null)))
            .collect()
    }

    /// Resolves every entry, stopping at the first failure unless the collection suppresses errors.
    ///
    /// # Errors
    /// [`ParamError::SchemaValidation`] naming the first failing key.
    pub fn validate_all(&self) -> Result<JsonMap<String, Value>, ParamError> {
        let mut resolved = JsonMap::new();
        for (name, parameter) in &self.entries {
            let value = match parameter.current(false) {
                Ok(value) => value,
                Err(error) if self.suppress_errors && error.is_suppressible() => {
                    debug!(parameter = %name, error = %error, "suppressed invalid parameter");
                    Value::Null
                }
                Err(error) => return Err(error.for_param(name)),
            };
            resolved.insert(name.clone(), value);
        }
        Ok(resolved)
    }

    /// Serializes the dumped values. Schemas and descriptions are not part of this form.
    pub fn serialize(&self) -> JsonMap<String, Value> {
        self.dump_all()
    }

    /// Rebuilds a collection of schemaless parameters from serialized values.
    ///
    /// # Errors
    /// [`ParamError::UnsupportedVersion`] when `version` is newer than [`COLLECTION_VERSION`].
    pub fn deserialize(data: &JsonMap<String, Value>, version: u32) -> Result<Self, ParamError> {
        serialization::ensure_supported_version(version, COLLECTION_VERSION)?;
        Ok(Self::from_values(data.clone()))
    }

    pub fn to_envelope(&self) -> SerializedEnvelope {
        serialization::wrap(COLLECTION_CLASS, COLLECTION_VERSION, self.serialize())
    }

    pub fn from_envelope(envelope: &SerializedEnvelope) -> Result<Self, ParamError> {
        let (fields, version) = serialization::unwrap(envelope, COLLECTION_CLASS)?;
        Self::deserialize(fields, version)
    }
}

impl PartialEq for ParameterCollection {
    fn eq(&self, other: &Self) -> bool {
        self.dump_all() == other.dump_all()
    }
}

impl PartialEq<JsonMap<String, Value>> for ParameterCollection {
    fn eq(&self, other: &JsonMap<String, Value>) -> bool {
        self.dump_all() == *other
    }
}

impl fmt::Debug for ParameterCollection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ParameterCollection")
            .field("values", &self.dump_all())
            .field("suppress_errors", &self.suppress_errors)
            .finish()
    }
}
