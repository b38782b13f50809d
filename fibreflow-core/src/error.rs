/// Structured error types for fibreflow-core.
///
/// Uses `thiserror` so the server and CLI can match on failure kinds.
/// The CLI wraps these in `anyhow` with context.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Main error type for fibreflow-core operations
#[derive(Error, Debug)]
pub enum FibreError {
    /// I/O operation failed
    #[error("I/O error: {source}")]
    Io {
        #[from]
        source: io::Error,
    },

    /// CSV input could not be read
    #[error("CSV error: {source}")]
    Csv {
        #[from]
        source: csv::Error,
    },

    /// JSON parsing or serialization failed
    #[error("JSON error at {context}: {source}")]
    Json {
        context: String,
        source: serde_json::Error,
    },

    /// Input file has no header row or no data
    #[error("Empty input: {source_name}")]
    EmptyInput { source_name: String },

    /// A single record failed validation
    #[error("Invalid record at row {row}: {reason}")]
    InvalidRecord { row: usize, reason: String },

    /// Required column missing from a header row
    #[error("Missing required column '{column}'")]
    MissingColumn { column: String },

    /// File or directory not found
    #[error("Path not found: {path:?}")]
    PathNotFound { path: PathBuf },

    /// Configuration error
    #[error("Configuration error: {reason}")]
    Config { reason: String },
}

/// Result type alias for fibreflow-core operations
pub type Result<T> = std::result::Result<T, FibreError>;

impl FibreError {
    /// Create a JSON error with context
    pub fn json(context: impl Into<String>, source: serde_json::Error) -> Self {
        Self::Json {
            context: context.into(),
            source,
        }
    }

    /// Create an invalid record error
    pub fn invalid_record(row: usize, reason: impl Into<String>) -> Self {
        Self::InvalidRecord {
            row,
            reason: reason.into(),
        }
    }

    pub fn missing_column(column: impl Into<String>) -> Self {
        Self::MissingColumn {
            column: column.into(),
        }
    }

    pub fn empty_input(source_name: impl Into<String>) -> Self {
        Self::EmptyInput {
            source_name: source_name.into(),
        }
    }

    /// Create a config error
    pub fn config(reason: impl Into<String>) -> Self {
        Self::Config {
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = FibreError::invalid_record(7, "segment_id is required");
        assert_eq!(
            err.to_string(),
            "Invalid record at row 7: segment_id is required"
        );

        let err = FibreError::missing_column("Property ID");
        assert!(err.to_string().contains("Property ID"));
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = io::Error::new(io::ErrorKind::NotFound, "file not found");
        let fibre_err: FibreError = io_err.into();

        assert!(matches!(fibre_err, FibreError::Io { .. }));
    }
}
