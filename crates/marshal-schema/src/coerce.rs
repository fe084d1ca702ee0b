//! # Field Coercer
//!
//! Converts raw JSON values into [`TypedValue`]s according to a declared
//! [`FieldType`] and the schema's [`CoercionOptions`].
//!
//! ## Policy
//!
//! | Type | Accepts |
//! |------|---------|
//! | `Bool` | bools, integers `0`/`1`, `true/false/yes/no/on/off/1/0` strings |
//! | `Int` | integers, numeric strings, floats per [`FloatToInt`] |
//! | `Float` | numbers, finite numeric strings |
//! | `Str` | strings only |
//! | `Email` | strings of the form `local@domain.tld` |
//! | `Uuid` | hyphenated or simple hex strings |
//! | temporal | see `marshal_core::temporal` |
//!
//! Compound types recurse: list items are keyed `field.<index>`, nested
//! schemas push their own field errors below the field path.
//!
//! A value of the wrong JSON type is always an error. Nothing is coerced
//! from a type the table does not list.

use std::sync::Arc;

use marshal_core::{json_type_name, temporal, CoercionError, TypedValue};
use serde_json::{Map, Value};

use crate::errors::{join_path, FieldError, TypeCoercionError, ValidationErrors};
use crate::field::FieldType;
use crate::options::{CoercionOptions, FloatToInt};
use crate::schema::Schema;

const TRUE_STRINGS: &[&str] = &["true", "1", "yes", "on"];
const FALSE_STRINGS: &[&str] = &["false", "0", "no", "off"];

/// Applies a coercion policy to raw values.
#[derive(Debug, Clone, Copy, Default)]
pub struct Coercer {
    options: CoercionOptions,
}

impl Coercer {
    /// A coercer using `options`.
    pub fn new(options: CoercionOptions) -> Self {
        Self { options }
    }

    /// Coerce `raw` to `ty` on behalf of `field`.
    ///
    /// For compound types the first failure found is reported; use a
    /// schema load to see every failure.
    ///
    /// # Errors
    ///
    /// Returns a [`TypeCoercionError`] naming the field (or the nested
    /// path that failed) and the expected type.
    pub fn coerce(
        &self,
        field: &str,
        raw: &Value,
        ty: &FieldType,
    ) -> Result<TypedValue, TypeCoercionError> {
        if is_scalar(ty) {
            return self.scalar(raw, ty).map_err(|source| TypeCoercionError {
                field: field.to_string(),
                source,
            });
        }
        let mut scratch = ValidationErrors::new(field);
        match self.coerce_into(raw, ty, field, &mut scratch) {
            Some(value) if scratch.is_empty() => Ok(value),
            _ => {
                let (loc, message) = scratch
                    .iter()
                    .next()
                    .map(|d| (d.loc.to_string(), d.message.to_string()))
                    .unwrap_or_else(|| (field.to_string(), String::from("invalid value")));
                Err(TypeCoercionError {
                    field: loc,
                    source: CoercionError::malformed(ty.type_name(), message),
                })
            }
        }
    }

    /// Coerce `raw` to `ty`, recording failures under `path`.
    ///
    /// Returns `None` iff at least one error was pushed.
    pub(crate) fn coerce_into(
        &self,
        raw: &Value,
        ty: &FieldType,
        path: &str,
        errors: &mut ValidationErrors,
    ) -> Option<TypedValue> {
        match ty {
            FieldType::Any => Some(TypedValue::Json(raw.clone())),
            FieldType::List(inner) => self.list(raw, inner, path, errors),
            FieldType::Nested(schema) => schema.load_at(raw, path, errors).map(TypedValue::Record),
            FieldType::Pluck { schema, field } => {
                let key = schema.field(field).map_or(field.as_str(), |f| f.key());
                let mut wrapped = Map::new();
                wrapped.insert(key.to_string(), raw.clone());
                schema
                    .load_at(&Value::Object(wrapped), path, errors)
                    .map(TypedValue::Record)
            }
            FieldType::Literal(values) => {
                if values.contains(raw) {
                    return Some(TypedValue::from_json(raw));
                }
                let permitted: Vec<String> = values.iter().map(Value::to_string).collect();
                errors.push(
                    path,
                    FieldError::new(
                        "value_error.const",
                        format!("unexpected value; permitted: {}", permitted.join(", ")),
                    ),
                );
                None
            }
            FieldType::Union(members) => {
                for member in members {
                    let mut scratch = ValidationErrors::new(errors.schema());
                    if let Some(value) = self.coerce_into(raw, member, path, &mut scratch) {
                        return Some(value);
                    }
                }
                let names: Vec<&str> = members.iter().map(FieldType::type_name).collect();
                errors.push(
                    path,
                    FieldError::new(
                        "type_error.union",
                        format!("value does not match any of: {}", names.join(", ")),
                    ),
                );
                None
            }
            FieldType::Tagged {
                discriminator,
                variants,
            } => self.tagged(raw, discriminator, variants, path, errors),
            scalar => match self.scalar(raw, scalar) {
                Ok(value) => Some(value),
                Err(err) => {
                    errors.push(path, FieldError::from(&err));
                    None
                }
            },
        }
    }

    fn list(
        &self,
        raw: &Value,
        inner: &FieldType,
        path: &str,
        errors: &mut ValidationErrors,
    ) -> Option<TypedValue> {
        let Value::Array(items) = raw else {
            errors.push(
                path,
                FieldError::from(&CoercionError::mismatch("list", json_type_name(raw))),
            );
            return None;
        };
        let mut out = Vec::with_capacity(items.len());
        let mut ok = true;
        for (i, item) in items.iter().enumerate() {
            let item_path = join_path(path, &i.to_string());
            if item.is_null() {
                errors.push(item_path, FieldError::none_not_allowed());
                ok = false;
                continue;
            }
            match self.coerce_into(item, inner, &item_path, errors) {
                Some(value) => out.push(value),
                None => ok = false,
            }
        }
        ok.then_some(TypedValue::List(out))
    }

    fn tagged(
        &self,
        raw: &Value,
        discriminator: &str,
        variants: &[(String, Arc<Schema>)],
        path: &str,
        errors: &mut ValidationErrors,
    ) -> Option<TypedValue> {
        let Value::Object(map) = raw else {
            errors.push(
                path,
                FieldError::from(&CoercionError::mismatch("object", json_type_name(raw))),
            );
            return None;
        };
        let allowed = || {
            variants
                .iter()
                .map(|(tag, _)| format!("'{tag}'"))
                .collect::<Vec<_>>()
                .join(", ")
        };
        let Some(tag) = map.get(discriminator) else {
            errors.push(
                join_path(path, discriminator),
                FieldError::new(
                    "value_error.discriminated_union.missing_discriminator",
                    format!("discriminator '{discriminator}' is missing in value"),
                ),
            );
            return None;
        };
        let selected = tag
            .as_str()
            .and_then(|t| variants.iter().find(|(name, _)| name == t));
        match selected {
            Some((_, schema)) => schema.load_at(raw, path, errors).map(TypedValue::Record),
            None => {
                errors.push(
                    join_path(path, discriminator),
                    FieldError::new(
                        "value_error.discriminated_union.invalid_discriminator",
                        format!(
                            "no match for discriminator '{discriminator}' and value {tag} (allowed values: {})",
                            allowed()
                        ),
                    ),
                );
                None
            }
        }
    }

    /// Coerce a raw value to a scalar type.
    fn scalar(&self, raw: &Value, ty: &FieldType) -> Result<TypedValue, CoercionError> {
        let expected = ty.type_name();
        let mismatch = || CoercionError::mismatch(expected, json_type_name(raw));
        match ty {
            FieldType::Bool => match raw {
                Value::Bool(b) => Ok(TypedValue::Bool(*b)),
                Value::Number(n) => match n.as_i64() {
                    Some(0) => Ok(TypedValue::Bool(false)),
                    Some(1) => Ok(TypedValue::Bool(true)),
                    _ => Err(mismatch()),
                },
                Value::String(s) => {
                    let lowered = s.trim().to_ascii_lowercase();
                    if TRUE_STRINGS.contains(&lowered.as_str()) {
                        Ok(TypedValue::Bool(true))
                    } else if FALSE_STRINGS.contains(&lowered.as_str()) {
                        Ok(TypedValue::Bool(false))
                    } else {
                        Err(mismatch())
                    }
                }
                _ => Err(mismatch()),
            },
            FieldType::Int => match raw {
                Value::Number(n) => {
                    if let Some(i) = n.as_i64() {
                        return Ok(TypedValue::Int(i));
                    }
                    if n.is_u64() {
                        return Err(CoercionError::OutOfRange {
                            expected: expected.into(),
                            value: n.to_string(),
                        });
                    }
                    let f = n.as_f64().ok_or_else(mismatch)?;
                    self.float_to_int(f)
                }
                Value::String(s) => s
                    .trim()
                    .parse::<i64>()
                    .map(TypedValue::Int)
                    .map_err(|_| mismatch()),
                _ => Err(mismatch()),
            },
            FieldType::Float => match raw {
                Value::Number(n) => n.as_f64().map(TypedValue::Float).ok_or_else(mismatch),
                Value::String(s) => s
                    .trim()
                    .parse::<f64>()
                    .ok()
                    .filter(|f| f.is_finite())
                    .map(TypedValue::Float)
                    .ok_or_else(mismatch),
                _ => Err(mismatch()),
            },
            FieldType::Str => match raw {
                Value::String(s) if self.options.strip_whitespace => {
                    Ok(TypedValue::Str(s.trim().to_string()))
                }
                Value::String(s) => Ok(TypedValue::Str(s.clone())),
                _ => Err(mismatch()),
            },
            FieldType::Email => match raw {
                Value::String(s) if is_email(s.trim()) => Ok(TypedValue::Str(s.trim().to_string())),
                _ => Err(mismatch()),
            },
            FieldType::Uuid => match raw {
                Value::String(s) => uuid::Uuid::parse_str(s.trim())
                    .map(TypedValue::Uuid)
                    .map_err(|e| CoercionError::malformed(expected, e.to_string())),
                _ => Err(mismatch()),
            },
            FieldType::DateTime => match raw {
                Value::String(s) => temporal::parse_datetime(s).map(TypedValue::DateTime),
                Value::Number(n) => {
                    temporal::datetime_from_unix(number(n)).map(TypedValue::DateTime)
                }
                _ => Err(mismatch()),
            },
            FieldType::Date => match raw {
                Value::String(s) => temporal::parse_date(s).map(TypedValue::Date),
                Value::Number(n) => temporal::date_from_unix(number(n)).map(TypedValue::Date),
                _ => Err(mismatch()),
            },
            FieldType::Time => match raw {
                Value::String(s) => temporal::parse_time(s).map(TypedValue::Time),
                _ => Err(mismatch()),
            },
            FieldType::Duration => match raw {
                Value::String(s) => temporal::parse_duration(s).map(TypedValue::Duration),
                Value::Number(n) => {
                    temporal::duration_from_secs(number(n)).map(TypedValue::Duration)
                }
                _ => Err(mismatch()),
            },
            _ => Err(mismatch()),
        }
    }

    fn float_to_int(&self, f: f64) -> Result<TypedValue, CoercionError> {
        match self.options.float_to_int {
            FloatToInt::Reject => Err(CoercionError::mismatch("integer", "float")),
            FloatToInt::RejectFractional if f.fract() != 0.0 => {
                Err(CoercionError::FractionalInteger { value: f })
            }
            FloatToInt::Truncate | FloatToInt::RejectFractional => {
                let t = f.trunc();
                if !t.is_finite() || t < i64::MIN as f64 || t >= i64::MAX as f64 {
                    return Err(CoercionError::OutOfRange {
                        expected: "integer".into(),
                        value: f.to_string(),
                    });
                }
                Ok(TypedValue::Int(t as i64))
            }
        }
    }
}

fn is_scalar(ty: &FieldType) -> bool {
    !matches!(
        ty,
        FieldType::Any
            | FieldType::List(_)
            | FieldType::Nested(_)
            | FieldType::Pluck { .. }
            | FieldType::Literal(_)
            | FieldType::Union(_)
            | FieldType::Tagged { .. }
    )
}

fn number(n: &serde_json::Number) -> f64 {
    n.as_f64().unwrap_or(f64::NAN)
}

/// `local@domain.tld`: one `@`, no whitespace, a dotted domain whose labels
/// are non-empty and whose last label is at least two letters.
fn is_email(s: &str) -> bool {
    let Some((local, domain)) = s.split_once('@') else {
        return false;
    };
    if local.is_empty() || domain.contains('@') || s.chars().any(char::is_whitespace) {
        return false;
    }
    let labels: Vec<&str> = domain.split('.').collect();
    let Some(tld) = labels.last() else {
        return false;
    };
    labels.len() >= 2
        && labels.iter().all(|l| !l.is_empty())
        && tld.len() >= 2
        && tld.chars().all(|c| c.is_ascii_alphabetic())
}
