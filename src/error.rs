// file: src/error.rs
// description: Custom error types and result type aliases
// reference: https://docs.rs/thiserror

use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, PipelineError>;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Settings error: {0}")]
    Settings(String),

    #[error("File operation failed for {path}: {source}")]
    FileOperation {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Document text could not be decoded: {0}")]
    Encoding(String),

    #[error("Malformed XML: {0}")]
    XmlParse(String),

    #[error("Malformed JSON: {0}")]
    JsonParse(#[from] serde_json::Error),

    #[error("Payload conversion failed: {0}")]
    Conversion(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Object store error: {0}")]
    ObjectStore(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Timed out: {0}")]
    Timeout(String),

    #[error("Operation was cancelled")]
    Cancelled,
}
