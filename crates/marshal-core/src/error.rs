//! # Error Types — Coercion Failures
//!
//! Defines the error produced when a raw value cannot become a typed value.
//! All errors use `thiserror` for derive-based `Display` and `Error`
//! implementations.
//!
//! ## Design
//!
//! - A coercion error knows the expected type and, where relevant, the JSON
//!   type that was actually supplied. It does not know the field: the
//!   validation pipeline attaches the field path when it records the error.
//! - Every variant maps to a stable machine code (`type_error.<expected>`)
//!   so callers can branch on the kind of failure without parsing messages.

use thiserror::Error;

/// Error raised when a raw value cannot be coerced to a declared type.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CoercionError {
    /// The raw value has a JSON type the target type cannot be built from.
    #[error("value is not a valid {expected}")]
    TypeMismatch {
        /// Name of the expected type (e.g. `integer`).
        expected: String,
        /// JSON type name of the value that was supplied.
        actual: &'static str,
    },

    /// The raw value has an acceptable JSON type but its content does not parse.
    #[error("value is not a valid {expected}: {reason}")]
    Malformed {
        /// Name of the expected type.
        expected: String,
        /// Why the content was rejected.
        reason: String,
    },

    /// A float with a fractional part was offered to an integer field whose
    /// policy does not truncate.
    #[error("value is not a valid integer: {value} has a fractional part")]
    FractionalInteger {
        /// The rejected float.
        value: f64,
    },

    /// A numeric value does not fit the target representation.
    #[error("value is out of range for {expected}: {value}")]
    OutOfRange {
        /// Name of the expected type.
        expected: String,
        /// Textual form of the rejected value.
        value: String,
    },
}

impl CoercionError {
    /// Build a [`CoercionError::TypeMismatch`].
    pub fn mismatch(expected: impl Into<String>, actual: &'static str) -> Self {
        Self::TypeMismatch {
            expected: expected.into(),
            actual,
        }
    }

    /// Build a [`CoercionError::Malformed`].
    pub fn malformed(expected: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Malformed {
            expected: expected.into(),
            reason: reason.into(),
        }
    }

    /// Name of the type the value was expected to have.
    pub fn expected(&self) -> &str {
        match self {
            Self::TypeMismatch { expected, .. }
            | Self::Malformed { expected, .. }
            | Self::OutOfRange { expected, .. } => expected,
            Self::FractionalInteger { .. } => "integer",
        }
    }

    /// Machine-readable error code, e.g. `type_error.integer`.
    pub fn code(&self) -> String {
        format!("type_error.{}", self.expected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mismatch_display_and_code() {
        let err = CoercionError::mismatch("integer", "string");
        assert_eq!(err.to_string(), "value is not a valid integer");
        assert_eq!(err.code(), "type_error.integer");
        assert_eq!(err.expected(), "integer");
    }

    #[test]
    fn test_malformed_includes_reason() {
        let err = CoercionError::malformed("uuid", "invalid length");
        assert!(err.to_string().contains("invalid length"));
        assert_eq!(err.code(), "type_error.uuid");
    }

    #[test]
    fn test_fractional_integer_expected_type() {
        let err = CoercionError::FractionalInteger { value: 1.5 };
        assert_eq!(err.expected(), "integer");
        assert!(err.to_string().contains("1.5"));
    }
}
