//! Shared error types for the completions job

use thiserror::Error;

#[derive(Error, Debug)]
pub enum SharedError {
    #[error("Serialization failed: {message}")]
    SerializationError { message: String },

    #[error("Invalid configuration: {field} = {value}")]
    InvalidConfig { field: String, value: String },

    #[error("Column '{column}' has {actual} values, expected {expected}")]
    ColumnLengthMismatch {
        column: String,
        expected: usize,
        actual: usize,
    },

    #[error("Invalid dataset destination '{repo_id}': {reason}")]
    InvalidDestination { repo_id: String, reason: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<serde_json::Error> for SharedError {
    fn from(e: serde_json::Error) -> Self {
        SharedError::SerializationError { message: e.to_string() }
    }
}

pub type SharedResult<T> = Result<T, SharedError>;
