//! Serde-facing parameter shapes shared across the engine and CLI.
//!
//! Two families live here: the authoring document that declares workflow and step parameters, and the
//! versioned serialized forms produced by the engine. Both preserve authoring order (via `IndexMap` and the
//! `preserve_order` feature of `serde_json`) so dumps read back in the order parameters were declared.
//!
//! Throughout this module an absent `Option<JsonValue>` means "unset" while `Some(JsonValue::Null)` is an
//! explicit JSON `null`. Fields carrying that distinction use [`deserialize_present`] so that a `null` written
//! in the source survives the round trip.

use indexmap::IndexMap;
use serde::{Deserialize, Deserializer, Serialize, de::Error as _};
use serde_json::{Map as JsonMap, Value as JsonValue};

const DECLARATION_KEYS: [&str; 3] = ["default", "description", "schema"];

/// Parameter declarations authored for a workflow and its steps.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct ParameterDocument {
    /// Workflow identifier the declarations belong to.
    #[serde(default)]
    pub workflow: String,
    /// Workflow-level declarations keyed by parameter name, preserving author order.
    #[serde(default)]
    pub params: IndexMap<String, ParameterDeclaration>,
    /// Step-level declarations keyed by step identifier, then parameter name.
    #[serde(default)]
    pub steps: IndexMap<String, IndexMap<String, ParameterDeclaration>>,
}

/// A single parameter entry in a document.
///
/// Non-empty objects made only of `default`, `description`, and `schema` keys are read as declarations. Anything
/// else is a literal value wrapped in a schemaless parameter. An object literal that happens to use only those keys
/// must be written as `{ default: { ... } }`.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(untagged)]
pub enum ParameterDeclaration {
    /// Structured declaration with optional default, description, and schema.
    Declared(DeclaredParameter),
    /// Plain JSON value.
    Literal(JsonValue),
}

impl<'de> Deserialize<'de> for ParameterDeclaration {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = JsonValue::deserialize(deserializer)?;
        match &value {
            JsonValue::Object(map) if !map.is_empty() && map.keys().all(|key| DECLARATION_KEYS.contains(&key.as_str())) => {
                serde_json::from_value(value).map(Self::Declared).map_err(D::Error::custom)
            }
            _ => Ok(Self::Literal(value)),
        }
    }
}

/// Structured parameter declaration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(deny_unknown_fields)]
pub struct DeclaredParameter {
    /// Default value; absent means the parameter starts unset.
    #[serde(default, deserialize_with = "deserialize_present", skip_serializing_if = "Option::is_none")]
    pub default: Option<JsonValue>,
    /// Help text surfaced alongside the parameter.
    #[serde(default)]
    pub description: Option<String>,
    /// JSON-Schema constraints; empty accepts any value.
    #[serde(default)]
    pub schema: JsonMap<String, JsonValue>,
}

/// Versioned envelope wrapping a serialized entity.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SerializedEnvelope {
    /// Class-identity tag of the wrapped entity.
    #[serde(rename = "__class")]
    pub class: String,
    /// Schema version the payload was written with.
    #[serde(rename = "__version")]
    pub version: u32,
    /// Entity fields.
    #[serde(rename = "__var")]
    pub data: JsonValue,
}

/// Serialized fields of a single parameter.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct SerializedParameter {
    /// Stored value; omitted when unset.
    #[serde(default, deserialize_with = "deserialize_present", skip_serializing_if = "Option::is_none")]
    pub value: Option<JsonValue>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub schema: JsonMap<String, JsonValue>,
}

/// Serialized fields of a deferred parameter reference.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SerializedParameterReference {
    /// Identifier of the workflow that declared the reference.
    pub workflow_id: String,
    /// Parameter name inside the workflow's collection.
    pub name: String,
    /// Default value; omitted when unset.
    #[serde(default, deserialize_with = "deserialize_present", skip_serializing_if = "Option::is_none")]
    pub default: Option<JsonValue>,
}

/// Deserializes a field that is present in the payload, keeping an explicit `null` as `Some(Null)`.
///
/// Pair with `#[serde(default)]` so a missing key still yields `None`.
pub fn deserialize_present<'de, D>(deserializer: D) -> Result<Option<JsonValue>, D::Error>
where
    D: Deserializer<'de>,
{
    JsonValue::deserialize(deserializer).map(Some)
}
