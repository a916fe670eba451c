use std::path::PathBuf;
use thiserror::Error;

/// The main error type for annopack operations.
#[derive(Debug, Error)]
pub enum AnnopackError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse annotation JSON from {path}: {source}")]
    JsonParse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to write annotation JSON to {path}: {source}")]
    JsonWrite {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Invalid JSON for annotation record: {0}")]
    JsonRecord(#[source] serde_json::Error),

    #[error("{field} has {actual} component(s), expected rank {expected}")]
    InvalidVectorLength {
        field: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("{field} contains a non-finite component")]
    NonFiniteComponent { field: &'static str },

    #[error("ellipsoid radii must be non-negative")]
    NegativeRadius,

    #[error("annotation id must be non-empty")]
    EmptyAnnotationId,

    #[error("annotation id '{0}' already exists in the store")]
    DuplicateAnnotationId(String),

    #[error("duplicate property identifier '{0}' in schema")]
    DuplicatePropertyIdentifier(String),

    #[error("annotation has {actual} property value(s), schema defines {expected}")]
    PropertyCountMismatch { expected: usize, actual: usize },

    #[error("annotation has {actual} segment list(s), schema defines {expected} relationship(s)")]
    SegmentArityMismatch { expected: usize, actual: usize },

    #[error("invalid segment id '{0}' (expected a decimal 64-bit unsigned integer)")]
    InvalidSegmentId(String),

    #[error("{kind} annotation is missing required field '{field}'")]
    MissingGeometryField {
        kind: &'static str,
        field: &'static str,
    },

    #[error("reference '{0}' points at a deleted annotation")]
    ReferenceDeleted(String),

    #[error("annotation id '{annotation}' does not match reference id '{reference}'")]
    IdMismatch {
        reference: String,
        annotation: String,
    },

    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),
}
