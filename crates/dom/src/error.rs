//! Error types for node tree operations
//!
//! Simple, flat error hierarchy. Every error is reported synchronously
//! and leaves the tree in a valid state.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, DomError>;

#[derive(Debug, Error)]
pub enum DomError {
    #[error("Type mismatch for {field}: expected {expected}, got {actual}")]
    TypeMismatch {
        field: String,
        expected: String,
        actual: String,
    },

    #[error("Cannot delete the {0} attribute")]
    CannotDelete(String),

    #[error("Attribute {0} is read-only")]
    ReadOnly(String),

    #[error("{kind} has no attribute {field}")]
    UnknownField { kind: String, field: String },

    #[error("{kind} got an unexpected keyword argument {keyword}")]
    UnexpectedKeyword { kind: String, keyword: String },

    #[error("Invalid node type: expected {expected}, got {actual}")]
    InvalidNodeType { expected: String, actual: String },

    #[error("Maximum tree depth exceeded: {current} > {max}")]
    MaxDepthExceeded { current: usize, max: usize },

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

impl DomError {
    pub(crate) fn type_mismatch(field: &str, expected: &str, actual: &str) -> Self {
        DomError::TypeMismatch {
            field: field.to_string(),
            expected: expected.to_string(),
            actual: actual.to_string(),
        }
    }
}
