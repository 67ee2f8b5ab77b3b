//! Error types for schema compilation and pipelines

use thiserror::Error;

/// Result type for schema operations
pub type Result<T> = std::result::Result<T, SchemaError>;

/// Schema compilation and pipeline errors
#[derive(Error, Debug)]
pub enum SchemaError {
    #[error("A schema requires a name")]
    MissingName,

    #[error("A schema requires a version")]
    MissingVersion,

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("Index backend not supported: {backend}")]
    UnsupportedIndexBackend { backend: String },

    #[error("Invalid schema definition at {path}: {reason}")]
    InvalidDefinition { path: String, reason: String },

    #[error("{0}")]
    Pipeline(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Aggregate validation failure carrying one entry per failed property,
/// in check order (required checks first).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("record not valid")]
pub struct ValidationError {
    /// Ordered per-property failures
    pub properties: Vec<PropertyError>,
}

impl ValidationError {
    /// Wrap a single property failure
    pub fn single(property: PropertyError) -> Self {
        Self {
            properties: vec![property],
        }
    }
}

/// A single per-property validation failure
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct PropertyError {
    /// Dotted path of the offending property (e.g. "name.first")
    pub path: String,
    /// Generated or caller-supplied message
    pub message: String,
}

impl PropertyError {
    /// Failure for an absent required property
    pub fn missing(path: &str) -> Self {
        Self {
            path: path.to_string(),
            message: format!("Missing required property: {}", path),
        }
    }

    /// Generated failure for a named validator
    pub fn failed(path: &str, validator: &str) -> Self {
        Self {
            path: path.to_string(),
            message: format!("Validator {} failed for property {}", validator, path),
        }
    }

    /// Failure with a caller-supplied message
    pub fn custom(path: &str, message: &str) -> Self {
        Self {
            path: path.to_string(),
            message: message.to_string(),
        }
    }
}
