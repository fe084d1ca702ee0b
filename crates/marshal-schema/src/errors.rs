//! # Validation and Definition Errors
//!
//! Two families of error live here:
//!
//! - **Data errors** ([`ValidationErrors`]): what is wrong with a record.
//!   These are field-keyed collections, not single failures. Every invalid
//!   field gets its own entry and callers inspect the whole set.
//! - **Definition errors** ([`SchemaDefinitionError`], [`RegistryError`]):
//!   what is wrong with a schema or descriptor. These are ordinary
//!   `thiserror` enums and surface at build time, never during a load.
//!
//! ## Keys
//!
//! Error keys are field paths. A top-level field uses its input key
//! (`name`); nested failures are dotted (`foo.count`, `bars.1.apple`).
//! Whole-record failures use [`ROOT_KEY`], prefixed with the nested path
//! when they come from a nested schema (`address.__root__`).

use std::collections::BTreeMap;
use std::fmt;

use marshal_core::CoercionError;
use serde_json::Value;
use thiserror::Error;

/// Reserved key for errors that concern the whole record.
pub const ROOT_KEY: &str = "__root__";

/// Join a path prefix and a key segment with a dot.
pub(crate) fn join_path(prefix: &str, key: &str) -> String {
    if prefix.is_empty() {
        key.to_string()
    } else {
        format!("{prefix}.{key}")
    }
}

// ─── Field Errors ────────────────────────────────────────────────────

/// A single failure recorded against one key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    /// Machine-readable code, e.g. `value_error.missing`.
    pub code: String,
    /// Human-readable message.
    pub message: String,
}

impl FieldError {
    /// Create a field error from a code and message.
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }

    /// A required field was absent.
    pub fn missing() -> Self {
        Self::new("value_error.missing", "field required")
    }

    /// A field that does not allow none received null.
    pub fn none_not_allowed() -> Self {
        Self::new("type_error.none.not_allowed", "none is not an allowed value")
    }

    /// An undeclared key was present under `UnknownPolicy::Raise`.
    pub fn extra() -> Self {
        Self::new("value_error.extra", "extra fields not permitted")
    }
}

impl From<&CoercionError> for FieldError {
    fn from(err: &CoercionError) -> Self {
        Self::new(err.code(), err.to_string())
    }
}

impl From<ValidatorError> for FieldError {
    fn from(err: ValidatorError) -> Self {
        Self {
            code: err.code,
            message: err.message,
        }
    }
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (type={})", self.message, self.code)
    }
}

/// Error returned by a validator or an object mapper.
///
/// The default code is `value_error`; [`ValidatorError::with_code`] refines
/// it to `value_error.<suffix>` so custom rules stay distinguishable.
/// A field validator can point below its field with [`ValidatorError::at`];
/// the pipeline then keys the error at `field.<location>`.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct ValidatorError {
    code: String,
    message: String,
    location: Option<String>,
}

impl ValidatorError {
    /// A `value_error` with the given message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            code: "value_error".into(),
            message: message.into(),
            location: None,
        }
    }

    /// An `assertion_error`, for checks phrased as assertions.
    pub fn assertion(message: impl Into<String>) -> Self {
        Self {
            code: "assertion_error".into(),
            message: message.into(),
            location: None,
        }
    }

    /// Replace the code with `value_error.<suffix>`.
    pub fn with_code(mut self, suffix: &str) -> Self {
        self.code = format!("value_error.{suffix}");
        self
    }

    /// Use `code` verbatim.
    pub fn with_raw_code(mut self, code: impl Into<String>) -> Self {
        self.code = code.into();
        self
    }

    /// Prefix the location with `segment`, e.g. a list index. Nested calls
    /// build a dotted path from the outside in.
    pub fn at(mut self, segment: impl Into<String>) -> Self {
        let segment = segment.into();
        self.location = Some(match self.location.take() {
            Some(inner) => format!("{segment}.{inner}"),
            None => segment,
        });
        self
    }

    /// Path below the validated field, if the validator set one.
    pub fn location(&self) -> Option<&str> {
        self.location.as_deref()
    }

    /// Machine-readable code.
    pub fn code(&self) -> &str {
        &self.code
    }

    /// Human-readable message.
    pub fn message(&self) -> &str {
        &self.message
    }
}

/// A coercion failure attributed to a named field.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("{field}: {source}")]
pub struct TypeCoercionError {
    /// Field (or path) whose value failed to coerce.
    pub field: String,
    /// The underlying coercion failure.
    #[source]
    pub source: CoercionError,
}

impl TypeCoercionError {
    /// Name of the type the field expected.
    pub fn expected(&self) -> &str {
        self.source.expected()
    }
}

// ─── Error Collection ────────────────────────────────────────────────

/// One flattened error entry, as yielded by [`ValidationErrors::iter`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ErrorDetail<'a> {
    /// Field path the error is keyed under.
    pub loc: &'a str,
    /// Machine-readable code.
    pub code: &'a str,
    /// Human-readable message.
    pub message: &'a str,
}

/// Field-keyed collection of validation failures.
///
/// A failed load returns this with at least one entry. Keys are sorted,
/// messages under one key keep the order they were recorded in.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationErrors {
    schema: String,
    entries: BTreeMap<String, Vec<FieldError>>,
}

impl ValidationErrors {
    /// Create an empty collection for the named schema.
    pub fn new(schema: impl Into<String>) -> Self {
        Self {
            schema: schema.into(),
            entries: BTreeMap::new(),
        }
    }

    /// Name of the schema the errors were produced by.
    pub fn schema(&self) -> &str {
        &self.schema
    }

    /// Record an error under `loc`.
    pub fn push(&mut self, loc: impl Into<String>, error: FieldError) {
        self.entries.entry(loc.into()).or_default().push(error);
    }

    /// Record a whole-record error.
    pub fn push_root(&mut self, error: FieldError) {
        self.push(ROOT_KEY, error);
    }

    /// Record a coercion failure attributed to a field.
    pub fn push_coercion(&mut self, err: &TypeCoercionError) {
        self.push(err.field.clone(), FieldError::from(&err.source));
    }

    /// Move every entry of `other` into this collection.
    pub fn merge(&mut self, other: ValidationErrors) {
        for (loc, errors) in other.entries {
            self.entries.entry(loc).or_default().extend(errors);
        }
    }

    /// Total number of recorded messages across all keys.
    pub fn len(&self) -> usize {
        self.entries.values().map(Vec::len).sum()
    }

    /// Returns true if nothing was recorded.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Errors recorded under exactly `loc`.
    pub fn get(&self, loc: &str) -> Option<&[FieldError]> {
        self.entries.get(loc).map(Vec::as_slice)
    }

    /// Messages recorded under exactly `loc`, in order.
    pub fn messages(&self, loc: &str) -> Vec<&str> {
        self.get(loc)
            .map(|errs| errs.iter().map(|e| e.message.as_str()).collect())
            .unwrap_or_default()
    }

    /// Returns true if `field` has an error, either directly or in a
    /// nested path below it.
    pub fn contains_field(&self, field: &str) -> bool {
        let nested = format!("{field}.");
        self.entries
            .keys()
            .any(|k| k == field || k.starts_with(&nested))
    }

    /// Keys that have errors, sorted.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// Every error as a flat [`ErrorDetail`], ordered by key.
    pub fn iter(&self) -> impl Iterator<Item = ErrorDetail<'_>> {
        self.entries.iter().flat_map(|(loc, errs)| {
            errs.iter().map(move |e| ErrorDetail {
                loc,
                code: &e.code,
                message: &e.message,
            })
        })
    }

    /// `{key: [message, ...]}` as JSON.
    pub fn to_json(&self) -> Value {
        let map: serde_json::Map<String, Value> = self
            .entries
            .iter()
            .map(|(loc, errs)| {
                let messages = errs.iter().map(|e| Value::String(e.message.clone()));
                (loc.clone(), Value::Array(messages.collect()))
            })
            .collect();
        Value::Object(map)
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let n = self.len();
        let plural = if n == 1 { "" } else { "s" };
        write!(f, "{n} validation error{plural} for {}", self.schema)?;
        for (loc, errs) in &self.entries {
            write!(f, "\n{loc}")?;
            for e in errs {
                write!(f, "\n  {e}")?;
            }
        }
        Ok(())
    }
}

impl std::error::Error for ValidationErrors {}

// ─── Definition Errors ───────────────────────────────────────────────

/// A schema could not be built from its declaration.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SchemaDefinitionError {
    /// Two fields share a name.
    #[error("schema '{schema}' declares field '{field}' more than once")]
    DuplicateField {
        /// Schema name.
        schema: String,
        /// Repeated field name.
        field: String,
    },

    /// Two fields map to the same input/output key.
    #[error("schema '{schema}' maps more than one field to key '{key}'")]
    DuplicateKey {
        /// Schema name.
        schema: String,
        /// Repeated key.
        key: String,
    },

    /// A pluck field names a field the nested schema does not declare.
    #[error("field '{field}' plucks '{target}', which schema '{schema}' does not declare")]
    UnknownPluckField {
        /// Nested schema name.
        schema: String,
        /// Declaring field.
        field: String,
        /// The missing plucked field.
        target: String,
    },

    /// A tagged-union variant schema lacks the discriminator field.
    #[error("variant schema '{variant}' of field '{field}' does not declare discriminator '{discriminator}'")]
    MissingDiscriminator {
        /// Declaring field.
        field: String,
        /// Variant schema name.
        variant: String,
        /// Discriminator field name.
        discriminator: String,
    },

    /// A regex constraint failed to compile.
    #[error("field '{field}' has an invalid pattern: {reason}")]
    InvalidPattern {
        /// Declaring field.
        field: String,
        /// Compiler message.
        reason: String,
    },

    /// A declared default does not coerce to the field type.
    #[error("field '{field}' has an invalid default: {reason}")]
    InvalidDefault {
        /// Declaring field.
        field: String,
        /// Coercion failure.
        reason: String,
    },
}

/// Registry and descriptor failures.
#[derive(Error, Debug)]
pub enum RegistryError {
    /// A schema with this name is already registered.
    #[error("schema '{0}' is already registered")]
    Duplicate(String),

    /// A descriptor references a schema that is neither registered nor
    /// part of the same batch.
    #[error("schema '{schema}' references unknown schema '{reference}'")]
    UnknownReference {
        /// Referencing schema.
        schema: String,
        /// Missing schema name.
        reference: String,
    },

    /// Descriptors reference each other in a cycle.
    #[error("schema references form a cycle among: {}", .0.join(", "))]
    Cycle(Vec<String>),

    /// A descriptor produced an invalid schema.
    #[error(transparent)]
    Definition(#[from] SchemaDefinitionError),

    /// Descriptor text could not be parsed.
    #[error("descriptor parse error ({format}): {reason}")]
    Parse {
        /// `json` or `yaml`.
        format: &'static str,
        /// Parser message.
        reason: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_len_counts_messages_not_keys() {
        let mut errs = ValidationErrors::new("Model");
        errs.push("a", FieldError::missing());
        errs.push("a", FieldError::new("value_error", "second"));
        errs.push("b", FieldError::missing());
        assert_eq!(errs.len(), 3);
        assert_eq!(errs.keys().count(), 2);
    }

    #[test]
    fn test_contains_field_matches_nested_paths() {
        let mut errs = ValidationErrors::new("Spam");
        errs.push("bars.1.apple", FieldError::missing());
        assert!(errs.contains_field("bars"));
        assert!(errs.contains_field("bars.1"));
        assert!(!errs.contains_field("bar"));
    }

    #[test]
    fn test_display_format() {
        let mut errs = ValidationErrors::new("UserModel");
        errs.push("name", FieldError::from(ValidatorError::new("must contain a space")));
        errs.push(
            "password2",
            FieldError::from(ValidatorError::new("passwords do not match")),
        );
        let expected = "2 validation errors for UserModel\n\
                        name\n  must contain a space (type=value_error)\n\
                        password2\n  passwords do not match (type=value_error)";
        assert_eq!(errs.to_string(), expected);
    }

    #[test]
    fn test_single_error_display_is_singular() {
        let mut errs = ValidationErrors::new("Pie");
        errs.push_root(FieldError::missing());
        assert!(errs.to_string().starts_with("1 validation error for Pie"));
    }

    #[test]
    fn test_to_json() {
        let mut errs = ValidationErrors::new("M");
        errs.push("x", FieldError::missing());
        assert_eq!(errs.to_json(), json!({"x": ["field required"]}));
    }

    #[test]
    fn test_validator_error_codes() {
        let err = ValidatorError::new("value is not \"bar\"").with_code("not_a_bar");
        assert_eq!(err.code(), "value_error.not_a_bar");
        assert_eq!(ValidatorError::assertion("x").code(), "assertion_error");
    }

    #[test]
    fn test_validator_error_location_nests_outward() {
        let err = ValidatorError::new("too long").at("2").at("0");
        assert_eq!(err.location(), Some("0.2"));
        assert_eq!(ValidatorError::new("x").location(), None);
        assert_eq!(FieldError::from(err).message, "too long");
    }

    #[test]
    fn test_type_coercion_error_names_field_and_type() {
        let err = TypeCoercionError {
            field: "id".into(),
            source: CoercionError::mismatch("integer", "string"),
        };
        assert_eq!(err.expected(), "integer");
        assert_eq!(err.to_string(), "id: value is not a valid integer");

        let mut errs = ValidationErrors::new("User");
        errs.push_coercion(&err);
        assert_eq!(errs.get("id").unwrap()[0].code, "type_error.integer");
    }

    #[test]
    fn test_merge() {
        let mut a = ValidationErrors::new("A");
        a.push("x", FieldError::missing());
        let mut b = ValidationErrors::new("B");
        b.push("x", FieldError::extra());
        b.push("y", FieldError::missing());
        a.merge(b);
        assert_eq!(a.len(), 3);
        assert_eq!(a.messages("x"), vec!["field required", "extra fields not permitted"]);
    }
}
