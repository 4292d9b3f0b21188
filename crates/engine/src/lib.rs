//! # Flowparams Engine
//!
//! The Flowparams Engine holds the parameter layer of a workflow orchestrator: typed, schema-validated
//! parameters, the collections that group them per workflow and per step, deferred references resolved at run
//! time, and the precedence merge that produces the final parameter mapping for a step invocation.
//!
//! ## Key Features
//!
//! - **Validated Parameters**: JSON values checked against an optional JSON Schema on every resolution
//! - **Strict and Lenient Modes**: failures either propagate or degrade to `null`, chosen per collection
//! - **Deferred References**: run configuration, then declared default, then workflow parameters
//! - **Precedence Merge**: workflow < step < run configuration, gated by [`EngineSettings`]
//! - **Versioned Serialization**: class-tagged envelopes that reject payloads from newer versions
//!
//! ## Usage
//!
//! ```rust
//! use flowparams_engine::{merge_for_step, parse_parameter_file, EngineSettings, WorkflowParameters};
//!
//! let temp_dir = tempfile::tempdir()?;
//! let document_path = temp_dir.path().join("params.yaml");
//! std::fs::write(&document_path, r#"
//! workflow: nightly_etl
//! params:
//!   retries: { default: 3, schema: { type: integer, minimum: 0 } }
//! steps:
//!   load:
//!     retries: 5
//! "#)?;
//!
//! let document = parse_parameter_file(&document_path)?;
//! let workflow = WorkflowParameters::from_document(&document);
//! let merged = merge_for_step(&workflow, Some("load"), None, &EngineSettings::default(), false)?;
//! assert_eq!(merged["retries"], 5);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ## Architecture
//!
//! - **`parameter`**: a single validated parameter and its serialized forms
//! - **`collection`**: named parameters with merge-on-write and resolve-on-read semantics
//! - **`reference`**: the [`Resolvable`] trait and its deferred and step-output implementations
//! - **`merge`**: the precedence-merge pipeline
//! - **`workflow`**: the workflow-scoped owner built from parameter documents

use std::{fs, path::Path};

use anyhow::{Context, Result};
use serde_json::{Map as JsonMap, Value};

pub mod collection;
pub mod context;
pub mod error;
pub mod merge;
pub mod parameter;
pub mod reference;
pub mod serialization;
pub mod validation;
pub mod workflow;

// Re-export commonly used types for convenience
pub use collection::{COLLECTION_CLASS, COLLECTION_VERSION, ParameterCollection, ParameterSource};
pub use context::RunContext;
pub use error::ParamError;
pub use flowparams_types::ParameterDocument;
pub use flowparams_util::EngineSettings;
pub use merge::{merge_for_step, merge_parameters};
pub use parameter::{PARAMETER_CLASS, PARAMETER_VERSION, Parameter};
pub use reference::{DeferredParameterReference, ParameterOwner, Resolvable, StepOutputReference, StepReference, WorkflowRegistry};
pub use validation::{ensure_json, validate_candidate_value};
pub use workflow::WorkflowParameters;

/// Loads a parameter document from YAML or JSON.
///
/// # Errors
///
/// This function will return an error if:
/// - The file cannot be read from the filesystem
/// - The content is not valid YAML or JSON
/// - An entry looks like a declaration but carries malformed fields
pub fn parse_parameter_file(file_path: impl AsRef<Path>) -> Result<ParameterDocument> {
    let file_path = file_path.as_ref();
    let content = fs::read_to_string(file_path).with_context(|| format!("Failed to read parameter file: {}", file_path.display()))?;

    serde_yaml::from_str(&content).with_context(|| format!("Failed to parse parameter file: {}", file_path.display()))
}

/// Loads a run configuration mapping from a YAML or JSON file.
///
/// # Errors
///
/// Fails when the file cannot be read, does not parse, or its top level is not an object.
pub fn load_run_configuration(file_path: impl AsRef<Path>) -> Result<JsonMap<String, Value>> {
    let file_path = file_path.as_ref();
    let content =
        fs::read_to_string(file_path).with_context(|| format!("Failed to read run configuration: {}", file_path.display()))?;

    let value: Value =
        serde_yaml::from_str(&content).with_context(|| format!("Failed to parse run configuration: {}", file_path.display()))?;
    match value {
        Value::Object(map) => Ok(map),
        Value::Null => Ok(JsonMap::new()),
        other => anyhow::bail!(
            "Run configuration {} must be a mapping, found {}",
            file_path.display(),
            json_kind(&other)
        ),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
