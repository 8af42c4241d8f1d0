//! Error types for the biomtable library.

use std::path::PathBuf;
use thiserror::Error;

use crate::axis::AxisKind;

/// Main error type for table operations.
#[derive(Debug, Error)]
pub enum BiomError {
    /// A filter would leave no elements on an axis.
    #[error("Empty selection: no {axis}s would remain")]
    EmptySelection { axis: AxisKind },

    /// Not enough data to carry out the operation (e.g. rarefaction depth
    /// exceeds every element's total).
    #[error("Insufficient data: {0}")]
    InsufficientData(String),

    /// An argument is out of range for the current table.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// A required metadata field is absent.
    #[error("Missing metadata: {0}")]
    MissingMetadata(String),

    /// Samples do not share a common total.
    #[error("Samples are not rarefied")]
    NotRarefied,

    /// The decode collaborator produced inconsistent data.
    #[error("Decode error: {0}")]
    Decode(String),

    /// Error reading or accessing a file.
    #[error("IO error for '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Error from the CSV library.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Failure while rendering text output.
    #[error("Render error: {0}")]
    Render(String),
}

/// Result type alias for biomtable operations.
pub type Result<T> = std::result::Result<T, BiomError>;
