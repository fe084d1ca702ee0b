//! # Schema Options
//!
//! Per-schema configuration. Options are plain serde types so they can be
//! embedded in descriptors (`options:` block) as well as set through the
//! builder. Every field has a default, and an omitted block means defaults
//! throughout.

use serde::{Deserialize, Serialize};

/// What to do with input keys no field declares.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnknownPolicy {
    /// Drop unknown keys silently.
    #[default]
    Exclude,
    /// Record an `extra fields not permitted` error under each unknown key.
    Raise,
    /// Keep unknown keys on the loaded record as untyped JSON.
    Include,
}

/// How an integer field treats a JSON float.
///
/// Truncation is never implicit: it happens only under
/// [`FloatToInt::Truncate`], which is the default and is stated here so
/// that a schema reading `124.45` as `124` does so by configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FloatToInt {
    /// Drop the fractional part (`124.45` → `124`).
    #[default]
    Truncate,
    /// Accept integral floats (`124.0`), reject anything with a fraction.
    RejectFractional,
    /// Reject every float.
    Reject,
}

/// Coercion knobs shared by all fields of a schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CoercionOptions {
    /// Float handling for integer fields.
    pub float_to_int: FloatToInt,
    /// Trim leading/trailing whitespace from string fields.
    pub strip_whitespace: bool,
}

/// Configuration attached to a schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SchemaOptions {
    /// Unknown-key handling on load.
    pub unknown: UnknownPolicy,
    /// Coercion policy.
    pub coercion: CoercionOptions,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let opts = SchemaOptions::default();
        assert_eq!(opts.unknown, UnknownPolicy::Exclude);
        assert_eq!(opts.coercion.float_to_int, FloatToInt::Truncate);
        assert!(!opts.coercion.strip_whitespace);
    }

    #[test]
    fn test_partial_deserialize_fills_defaults() {
        let opts: SchemaOptions =
            serde_json::from_str(r#"{"coercion": {"float_to_int": "reject"}}"#).unwrap();
        assert_eq!(opts.unknown, UnknownPolicy::Exclude);
        assert_eq!(opts.coercion.float_to_int, FloatToInt::Reject);
    }

    #[test]
    fn test_yaml_options() {
        let opts: SchemaOptions = serde_yaml::from_str("unknown: raise\n").unwrap();
        assert_eq!(opts.unknown, UnknownPolicy::Raise);
    }
}
