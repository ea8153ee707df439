//! Domain-level error taxonomy for covforge.

use std::path::PathBuf;

/// Errors raised while turning raw source text into a structural model.
#[derive(Debug, thiserror::Error)]
pub enum ExtractionError {
    #[error("cannot read {path}: {source}")]
    Unreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("unbalanced braces in {path} near class {class_name}")]
    UnbalancedBraces { path: PathBuf, class_name: String },

    #[error("scan root does not exist: {0}")]
    MissingRoot(PathBuf),
}

/// covforge domain errors.
#[derive(Debug, thiserror::Error)]
pub enum CovforgeError {
    #[error("extraction error: {0}")]
    Extraction(#[from] ExtractionError),

    #[error("collaborator unavailable: {name} ({detail})")]
    CollaboratorUnavailable { name: String, detail: String },

    #[error("completion error: {0}")]
    Completion(String),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("build harness error: {0}")]
    Harness(String),

    #[error("digest mismatch: expected {expected}, got {actual}")]
    DigestMismatch { expected: String, actual: String },

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for covforge domain operations.
pub type Result<T> = std::result::Result<T, CovforgeError>;

impl From<reqwest::Error> for CovforgeError {
    fn from(err: reqwest::Error) -> Self {
        CovforgeError::Completion(err.to_string())
    }
}
