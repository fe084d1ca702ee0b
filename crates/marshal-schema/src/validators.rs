//! # Validators
//!
//! Three validator seams, one per stage of the load pipeline:
//!
//! | Trait | Sees | Runs |
//! |-------|------|------|
//! | [`RawValidator`] | the raw input object | before any field is coerced |
//! | [`FieldValidator`] | one coerced value plus the fields validated so far | after that field coerces |
//! | [`RecordValidator`] | the fully typed record | only when every field passed |
//!
//! Field validators may transform the value they are given (returning a
//! different `TypedValue`), which is how normalisers such as [`Transform`]
//! are expressed. Validators of one field run in order and stop at the
//! first failure; failures of different fields are all collected. An
//! error can name a location below its field ([`ValidatorError::at`]), which
//! is how [`Each`] reports the failing item index.
//!
//! All validator traits require `Send + Sync` so that a built schema can be
//! shared across threads.

use std::fmt;
use std::sync::Arc;

use marshal_core::{Record, TypedValue};
use regex::Regex;
use serde_json::{Map, Value};

use crate::errors::ValidatorError;

// ─── Seams ───────────────────────────────────────────────────────────

/// Context handed to field validators.
#[derive(Debug, Clone, Copy)]
pub struct ValidationContext<'a> {
    field: &'a str,
    record: &'a Record,
}

impl<'a> ValidationContext<'a> {
    pub(crate) fn new(field: &'a str, record: &'a Record) -> Self {
        Self { field, record }
    }

    /// Name of the field being validated.
    pub fn field(&self) -> &str {
        self.field
    }

    /// Fields of the same record that have already been validated.
    pub fn record(&self) -> &Record {
        self.record
    }

    /// Shortcut for `record().get(name)`.
    pub fn get(&self, name: &str) -> Option<&TypedValue> {
        self.record.get(name)
    }
}

/// Validates (and optionally transforms) one field value.
pub trait FieldValidator: fmt::Debug + Send + Sync {
    /// Return the value to store, or an error for this field.
    fn validate(
        &self,
        value: TypedValue,
        ctx: &ValidationContext<'_>,
    ) -> Result<TypedValue, ValidatorError>;
}

/// Validates a complete, typed record.
pub trait RecordValidator: fmt::Debug + Send + Sync {
    /// Check a whole-record rule.
    fn validate(&self, record: &Record) -> Result<(), ValidatorError>;
}

/// Validates the raw input object before coercion.
pub trait RawValidator: fmt::Debug + Send + Sync {
    /// Check a rule over raw keys and values.
    fn validate(&self, raw: &Map<String, Value>) -> Result<(), ValidatorError>;
}

// ─── Closure Adapters ────────────────────────────────────────────────

/// Field validator backed by a closure. Built with [`field_fn`].
pub struct FnFieldValidator<F> {
    name: &'static str,
    f: F,
}

impl<F> fmt::Debug for FnFieldValidator<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("FnFieldValidator").field(&self.name).finish()
    }
}

impl<F> FieldValidator for FnFieldValidator<F>
where
    F: Fn(TypedValue, &ValidationContext<'_>) -> Result<TypedValue, ValidatorError> + Send + Sync,
{
    fn validate(
        &self,
        value: TypedValue,
        ctx: &ValidationContext<'_>,
    ) -> Result<TypedValue, ValidatorError> {
        (self.f)(value, ctx)
    }
}

/// Wrap a closure as a [`FieldValidator`]. `name` shows up in `Debug` output.
pub fn field_fn<F>(name: &'static str, f: F) -> FnFieldValidator<F>
where
    F: Fn(TypedValue, &ValidationContext<'_>) -> Result<TypedValue, ValidatorError> + Send + Sync,
{
    FnFieldValidator { name, f }
}

/// Record validator backed by a closure. Built with [`record_fn`].
pub struct FnRecordValidator<F> {
    name: &'static str,
    f: F,
}

impl<F> fmt::Debug for FnRecordValidator<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("FnRecordValidator").field(&self.name).finish()
    }
}

impl<F> RecordValidator for FnRecordValidator<F>
where
    F: Fn(&Record) -> Result<(), ValidatorError> + Send + Sync,
{
    fn validate(&self, record: &Record) -> Result<(), ValidatorError> {
        (self.f)(record)
    }
}

/// Wrap a closure as a [`RecordValidator`].
pub fn record_fn<F>(name: &'static str, f: F) -> FnRecordValidator<F>
where
    F: Fn(&Record) -> Result<(), ValidatorError> + Send + Sync,
{
    FnRecordValidator { name, f }
}

/// Raw validator backed by a closure. Built with [`raw_fn`].
pub struct FnRawValidator<F> {
    name: &'static str,
    f: F,
}

impl<F> fmt::Debug for FnRawValidator<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("FnRawValidator").field(&self.name).finish()
    }
}

impl<F> RawValidator for FnRawValidator<F>
where
    F: Fn(&Map<String, Value>) -> Result<(), ValidatorError> + Send + Sync,
{
    fn validate(&self, raw: &Map<String, Value>) -> Result<(), ValidatorError> {
        (self.f)(raw)
    }
}

/// Wrap a closure as a [`RawValidator`].
pub fn raw_fn<F>(name: &'static str, f: F) -> FnRawValidator<F>
where
    F: Fn(&Map<String, Value>) -> Result<(), ValidatorError> + Send + Sync,
{
    FnRawValidator { name, f }
}

// ─── Built-in Field Validators ───────────────────────────────────────

/// Numeric bounds. Applies to integer and float values.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Range {
    /// Exclusive lower bound.
    pub gt: Option<f64>,
    /// Inclusive lower bound.
    pub ge: Option<f64>,
    /// Exclusive upper bound.
    pub lt: Option<f64>,
    /// Inclusive upper bound.
    pub le: Option<f64>,
}

impl Range {
    /// Unbounded range; chain the setters below.
    pub fn new() -> Self {
        Self::default()
    }

    /// Require `value > bound`.
    pub fn gt(mut self, bound: f64) -> Self {
        self.gt = Some(bound);
        self
    }

    /// Require `value >= bound`.
    pub fn ge(mut self, bound: f64) -> Self {
        self.ge = Some(bound);
        self
    }

    /// Require `value < bound`.
    pub fn lt(mut self, bound: f64) -> Self {
        self.lt = Some(bound);
        self
    }

    /// Require `value <= bound`.
    pub fn le(mut self, bound: f64) -> Self {
        self.le = Some(bound);
        self
    }
}

impl FieldValidator for Range {
    fn validate(
        &self,
        value: TypedValue,
        _ctx: &ValidationContext<'_>,
    ) -> Result<TypedValue, ValidatorError> {
        let n = value.as_f64().ok_or_else(|| {
            ValidatorError::new("value is not a number").with_raw_code("type_error.number")
        })?;
        let fail = |what: &str, bound: f64, code: &str| {
            Err(ValidatorError::new(format!("ensure this value is {what} {bound}"))
                .with_code(&format!("number.{code}")))
        };
        if let Some(b) = self.gt.filter(|b| n <= *b) {
            return fail("greater than", b, "not_gt");
        }
        if let Some(b) = self.ge.filter(|b| n < *b) {
            return fail("greater than or equal to", b, "not_ge");
        }
        if let Some(b) = self.lt.filter(|b| n >= *b) {
            return fail("less than", b, "not_lt");
        }
        if let Some(b) = self.le.filter(|b| n > *b) {
            return fail("less than or equal to", b, "not_le");
        }
        Ok(value)
    }
}

/// Length bounds: characters for strings, items for lists.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Length {
    /// Minimum length, inclusive.
    pub min: Option<usize>,
    /// Maximum length, inclusive.
    pub max: Option<usize>,
}

impl Length {
    /// Length between `min` and `max`, either optional.
    pub fn new(min: Option<usize>, max: Option<usize>) -> Self {
        Self { min, max }
    }
}

impl FieldValidator for Length {
    fn validate(
        &self,
        value: TypedValue,
        _ctx: &ValidationContext<'_>,
    ) -> Result<TypedValue, ValidatorError> {
        let (len, unit, family) = match &value {
            TypedValue::Str(s) => (s.chars().count(), "characters", "any_str"),
            TypedValue::List(items) => (items.len(), "items", "list"),
            other => {
                return Err(ValidatorError::new(format!(
                    "length constraint does not apply to {}",
                    other.type_name()
                ))
                .with_raw_code("type_error.sized"))
            }
        };
        if let Some(min) = self.min.filter(|m| len < *m) {
            return Err(
                ValidatorError::new(format!("ensure this value has at least {min} {unit}"))
                    .with_code(&format!("{family}.min_length")),
            );
        }
        if let Some(max) = self.max.filter(|m| len > *m) {
            return Err(
                ValidatorError::new(format!("ensure this value has at most {max} {unit}"))
                    .with_code(&format!("{family}.max_length")),
            );
        }
        Ok(value)
    }
}

/// Restrict a value to a fixed set of choices.
#[derive(Debug, Clone, PartialEq)]
pub struct OneOf {
    choices: Vec<TypedValue>,
}

impl OneOf {
    /// Allow exactly `choices`.
    pub fn new(choices: impl IntoIterator<Item = TypedValue>) -> Self {
        Self {
            choices: choices.into_iter().collect(),
        }
    }
}

impl FieldValidator for OneOf {
    fn validate(
        &self,
        value: TypedValue,
        _ctx: &ValidationContext<'_>,
    ) -> Result<TypedValue, ValidatorError> {
        if self.choices.contains(&value) {
            return Ok(value);
        }
        let allowed: Vec<String> = self.choices.iter().map(|c| c.to_json().to_string()).collect();
        Err(
            ValidatorError::new(format!("must be one of: {}", allowed.join(", ")))
                .with_code("one_of"),
        )
    }
}

/// Require a string to match a regular expression.
#[derive(Debug, Clone)]
pub struct Pattern {
    regex: Regex,
}

impl Pattern {
    /// Compile `pattern`.
    ///
    /// # Errors
    ///
    /// Returns the regex compiler error for invalid patterns.
    pub fn new(pattern: &str) -> Result<Self, regex::Error> {
        Ok(Self {
            regex: Regex::new(pattern)?,
        })
    }
}

impl FieldValidator for Pattern {
    fn validate(
        &self,
        value: TypedValue,
        _ctx: &ValidationContext<'_>,
    ) -> Result<TypedValue, ValidatorError> {
        match value.as_str() {
            Some(s) if self.regex.is_match(s) => Ok(value),
            _ => Err(ValidatorError::new(format!(
                "string does not match regex \"{}\"",
                self.regex.as_str()
            ))
            .with_code("str.regex")),
        }
    }
}

/// String normalisers. Non-string values pass through unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transform {
    /// Uppercase.
    ToUpper,
    /// Lowercase.
    ToLower,
    /// Trim surrounding whitespace.
    Strip,
    /// Capitalise each word, lowercase the rest.
    Title,
}

impl Transform {
    /// Apply the transform outside a schema.
    pub fn apply(&self, value: TypedValue) -> TypedValue {
        let TypedValue::Str(s) = value else {
            return value;
        };
        TypedValue::Str(match self {
            Self::ToUpper => s.to_uppercase(),
            Self::ToLower => s.to_lowercase(),
            Self::Strip => s.trim().to_string(),
            Self::Title => title_case(&s),
        })
    }
}

impl FieldValidator for Transform {
    fn validate(
        &self,
        value: TypedValue,
        _ctx: &ValidationContext<'_>,
    ) -> Result<TypedValue, ValidatorError> {
        Ok(self.apply(value))
    }
}

/// Apply a validator to every item of a list value.
#[derive(Debug, Clone)]
pub struct Each {
    inner: Arc<dyn FieldValidator>,
}

impl Each {
    /// Validate each list item with `inner`.
    pub fn new(inner: impl FieldValidator + 'static) -> Self {
        Self {
            inner: Arc::new(inner),
        }
    }
}

impl FieldValidator for Each {
    fn validate(
        &self,
        value: TypedValue,
        ctx: &ValidationContext<'_>,
    ) -> Result<TypedValue, ValidatorError> {
        let TypedValue::List(items) = value else {
            return Err(
                ValidatorError::new("value is not a valid list").with_raw_code("type_error.list")
            );
        };
        let items = items
            .into_iter()
            .enumerate()
            .map(|(i, item)| self.inner.validate(item, ctx).map_err(|e| e.at(i.to_string())))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(TypedValue::List(items))
    }
}

fn title_case(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut prev_alpha = false;
    for c in s.chars() {
        if prev_alpha {
            out.extend(c.to_lowercase());
        } else {
            out.extend(c.to_uppercase());
        }
        prev_alpha = c.is_alphabetic();
    }
    out
}
