//! Domain-level error taxonomy for Reforge.

use crate::llm::GenerationError;

/// Reforge domain errors.
///
/// Input and configuration errors surface to the caller. Upstream and parse
/// failures inside the validator runner are turned into fail results instead
/// of being returned.
#[derive(Debug, thiserror::Error)]
pub enum ReforgeError {
    #[error("artifact must not be empty")]
    EmptyArtifact,

    #[error("unknown validator: {0}")]
    UnknownValidator(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("invalid validation result: {0}")]
    InvalidResult(String),

    #[error("invalid finding: {0}")]
    InvalidFinding(String),

    #[error("generation failed: {0}")]
    Generation(#[from] GenerationError),

    #[error("could not parse verdict: {0}")]
    Parse(String),

    #[error("template error: {0}")]
    Template(String),

    #[error("digest mismatch: expected {expected}, got {actual}")]
    DigestMismatch { expected: String, actual: String },

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("config decode error: {0}")]
    ConfigDecode(#[from] toml::de::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for Reforge domain operations.
pub type Result<T> = std::result::Result<T, ReforgeError>;
