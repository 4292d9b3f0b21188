//! Versioned envelope helpers shared by the serializable parameter types.

use flowparams_types::SerializedEnvelope;
use serde_json::{Map as JsonMap, Value};

use crate::error::ParamError;

/// Key carrying the class-identity tag in dumped and enveloped forms.
pub const CLASS_IDENTIFIER: &str = "__class";

/// Rejects payloads written by a newer schema version.
pub(crate) fn ensure_supported_version(found: u32, supported: u32) -> Result<(), ParamError> {
    if found > supported {
        return Err(ParamError::UnsupportedVersion { found, supported });
    }
    Ok(())
}

pub(crate) fn wrap(class: &str, version: u32, data: JsonMap<String, Value>) -> SerializedEnvelope {
    SerializedEnvelope {
        class: class.to_string(),
        version,
        data: Value::Object(data),
    }
}

/// Checks the class tag and returns the payload fields together with the recorded version.
pub(crate) fn unwrap<'a>(envelope: &'a SerializedEnvelope, expected_class: &str) -> Result<(&'a JsonMap<String, Value>, u32), ParamError> {
    if envelope.class != expected_class {
        return Err(ParamError::UnexpectedClass {
            expected: expected_class.to_string(),
            found: envelope.class.clone(),
        });
    }
    let fields = envelope.data.as_object().ok_or_else(|| ParamError::MalformedPayload {
        reason: format!("{expected_class} payload must be an object"),
    })?;
    Ok((fields, envelope.version))
}
