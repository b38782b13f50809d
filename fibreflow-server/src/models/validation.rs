//! Validation error types

use std::fmt;

/// Validation error for request input
#[derive(Debug, Clone, PartialEq)]
pub enum ValidationError {
    /// Field is empty when it shouldn't be
    Empty { field: &'static str },

    /// Required field absent from the request
    Missing { field: &'static str },

    /// Field exceeds maximum length
    TooLong { field: &'static str, max: usize },

    /// String doesn't match required format (e.g., email, UUID)
    InvalidFormat { field: &'static str, reason: &'static str },

    /// Value not in the allowed set
    InvalidVariant { field: &'static str, value: String },

    /// Numeric value outside its bounds
    OutOfRange { field: &'static str, min: f64, max: f64 },
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty { field } => write!(f, "{} cannot be empty", field),
            Self::Missing { field } => write!(f, "{} is required", field),
            Self::TooLong { field, max } => {
                write!(f, "{} exceeds maximum length of {} characters", field, max)
            }
            Self::InvalidFormat { field, reason } => {
                write!(f, "{}: {}", field, reason)
            }
            Self::InvalidVariant { field, value } => {
                write!(f, "invalid {} value: '{}'", field, value)
            }
            Self::OutOfRange { field, min, max } => {
                write!(f, "{} must be between {} and {}", field, min, max)
            }
        }
    }
}

impl std::error::Error for ValidationError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = ValidationError::TooLong {
            field: "name",
            max: 256,
        };
        assert_eq!(
            err.to_string(),
            "name exceeds maximum length of 256 characters"
        );
    }

    #[test]
    fn range_and_missing_display() {
        let err = ValidationError::OutOfRange {
            field: "progress",
            min: 0.0,
            max: 100.0,
        };
        assert_eq!(err.to_string(), "progress must be between 0 and 100");
        assert_eq!(
            ValidationError::Missing { field: "email" }.to_string(),
            "email is required"
        );
    }
}
