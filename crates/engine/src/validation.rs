//! JSON interchange and schema validation helpers.
//!
//! Every value that enters a parameter passes through [`ensure_json`] first, and every resolution runs
//! [`validate_candidate_value`]. Schemas are compiled on each call; nothing is cached between reads.

use serde::Serialize;
use serde_json::{Map as JsonMap, Value};

use crate::error::ParamError;

/// Converts `value` into a JSON value, failing with [`ParamError::Serialization`] when it has no JSON form.
pub fn ensure_json<T>(value: &T) -> Result<Value, ParamError>
where
    T: Serialize + ?Sized,
{
    serde_json::to_value(value).map_err(|error| ParamError::Serialization {
        type_name: std::any::type_name::<T>().to_string(),
        reason: error.to_string(),
    })
}

/// Validates a JSON candidate against a JSON-Schema mapping with format assertions enabled.
///
/// An empty schema accepts any value. Both schema compilation failures and instance failures are reported as
/// [`ParamError::SchemaValidation`] carrying the validator's message. The validator is built without HTTP or file
/// retrieval, so a `$ref` outside the schema document fails to compile instead of being fetched.
pub fn validate_candidate_value(candidate: &Value, schema: &JsonMap<String, Value>) -> Result<(), ParamError> {
    if schema.is_empty() {
        return Ok(());
    }

    let schema_document = Value::Object(schema.clone());
    let validator = jsonschema::options()
        .should_validate_formats(true)
        .build(&schema_document)
        .map_err(|error| ParamError::schema(format!("invalid schema: {error}")))?;

    validator
        .validate(candidate)
        .map_err(|error| ParamError::schema(error.to_string()))
}
