//! Error kinds for the analytics engine.
//!
//! Element-level errors (schema apply failure, missing state, insufficient
//! history) are recovered locally: the caller logs them with the offending
//! stream name and match key, then drops the element. Configuration errors
//! are fatal — the worker refuses to start rather than run with
//! inconsistent configuration. See the crate's top-level error-handling
//! design for the full policy.

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum AnalyticsError {
    #[error("schema `{schema}` does not apply to stream `{stream}`")]
    SchemaNotApplicable { schema: String, stream: String },

    #[error("field `{name}` missing on stream `{stream}`")]
    FieldMissing { name: String, stream: String },

    #[error("field `{name}` on stream `{stream}` has the wrong type")]
    FieldTypeMismatch { name: String, stream: String },

    #[error("array `{name}` index {index} out of bounds (len {len})")]
    ArrayIndexOutOfBounds { name: String, index: usize, len: usize },

    #[error("position index {index} out of bounds (len {len})")]
    PositionIndexOutOfBounds { index: usize, len: usize },

    #[error("element is atomic; no non-atomic phase is defined")]
    NotNonAtomic,

    #[error("required state `{store}` not yet populated for key `{key}`")]
    StateNotPopulated { store: String, key: String },

    #[error("insufficient history in `{store}` for key `{key}`: need {need}, have {have}")]
    InsufficientHistory { store: String, key: String, need: usize, have: usize },

    #[error("stored value under `{store}` for key `{key}` has the wrong type")]
    StoredValueTypeMismatch { store: String, key: String },

    #[error("malformed rename map entry: `{entry}`")]
    MalformedRenameMap { entry: String },

    #[error("malformed area spec entry: `{entry}`")]
    MalformedAreaSpec { entry: String },

    #[error("serialization failed: {0}")]
    Serialization(String),
}

/// Fatal at startup: the worker refuses to run on inconsistent configuration.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ConfigError {
    #[error("missing required configuration key `{0}`")]
    MissingKey(String),

    #[error("configuration key `{key}` has an invalid value `{value}`: {reason}")]
    InvalidValue { key: String, value: String, reason: String },

    #[error("inconsistent configuration: {0}")]
    Inconsistent(String),
}

pub type Result<T> = std::result::Result<T, AnalyticsError>;
