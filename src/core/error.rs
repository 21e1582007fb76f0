//! Error types for SVM implementation

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SVMError {
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("Invalid dataset: {0}")]
    InvalidDataset(String),

    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Model not trained")]
    Untrained,

    #[error("Unsupported operation: {0}")]
    UnsupportedOperation(String),

    #[error("Solver failed: {0}")]
    SolverFailure(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Background task failed: {0}")]
    TaskFailed(String),
}

pub type Result<T> = std::result::Result<T, SVMError>;

impl From<tokio::task::JoinError> for SVMError {
    fn from(err: tokio::task::JoinError) -> Self {
        SVMError::TaskFailed(err.to_string())
    }
}
