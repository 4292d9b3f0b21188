//! Shared type definitions for the flowparams workspace.
//!
//! These shapes carry no behavior; validation, merging, and resolution live in `flowparams-engine`.

pub mod params;

pub use params::{
    DeclaredParameter, ParameterDeclaration, ParameterDocument, SerializedEnvelope, SerializedParameter, SerializedParameterReference,
    deserialize_present,
};
