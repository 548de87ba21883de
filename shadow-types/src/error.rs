//! Error types for the config codec.

use thiserror::Error;

/// Errors produced while decoding a shadow delta.
///
/// All variants are recoverable: the caller drops the delta and skips the
/// current poll cycle.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// The document is not valid JSON, or its top level is not an object.
    #[error("malformed shadow document: {0}")]
    MalformedDocument(String),

    /// A required field is absent.
    #[error("missing field: {0}")]
    MissingField(&'static str),

    /// A field is present but has the wrong JSON type.
    #[error("wrong type for field {field}: expected {expected}")]
    WrongType {
        /// Name of the offending field.
        field: &'static str,
        /// The JSON type the field must have.
        expected: &'static str,
    },
}

/// Errors produced while encoding a reported document.
#[derive(Debug, Error)]
pub enum EncodeError {
    /// JSON serialization failed.
    #[error("serialization failed: {0}")]
    Serialization(#[source] serde_json::Error),
}
