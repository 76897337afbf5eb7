//! Error types for the RFM segment engine

use thiserror::Error;

use crate::schema::SchemaError;

/// Errors that can occur while computing RFM segments
#[derive(Debug, Error)]
pub enum RfmError {
    #[error("No transactions remain after filtering")]
    EmptyDataset,

    #[error("Invalid filter: {0}")]
    InvalidFilter(String),

    #[error("Invalid bin configuration: {0}")]
    InvalidBinConfig(String),

    #[error("Schema error: {0}")]
    Schema(#[from] SchemaError),

    #[error("Invalid JSON: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Failed to parse input: {0}")]
    ParseError(String),
}
