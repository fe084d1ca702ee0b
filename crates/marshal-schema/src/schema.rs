//! # Schemas and the Load Pipeline
//!
//! A [`Schema`] is a named, ordered set of [`Field`]s plus record-level
//! validators and [`SchemaOptions`]. It is immutable once built and can be
//! shared across threads behind an `Arc`.
//!
//! ## Load Order
//!
//! 1. The input must be an object, otherwise a `__root__` error.
//! 2. Pre-record validators see the raw object. Any failure is reported
//!    under `__root__` and loading stops there.
//! 3. Fields load in declaration order. An absent field takes its default
//!    or fails as `field required`, and a null needs `allow_none`. Other
//!    values are coerced and then passed through the field's validators.
//!    Every field is attempted, so one bad field never hides another.
//! 4. Unknown keys are excluded, rejected, or kept per [`UnknownPolicy`].
//! 5. Record validators run only when the earlier steps produced no
//!    errors. All of them run and failures are collected under `__root__`.
//!
//! A load either returns a fully typed [`Record`] or a non-empty
//! [`ValidationErrors`]. There is no partially typed result.

use std::collections::HashSet;
use std::sync::Arc;

use marshal_core::{Record, TypedValue};
use serde_json::Value;

use crate::coerce::Coercer;
use crate::errors::{join_path, FieldError, SchemaDefinitionError, ValidationErrors, ROOT_KEY};
use crate::field::{Field, FieldType};
use crate::options::{SchemaOptions, UnknownPolicy};
use crate::validators::{RawValidator, RecordValidator, ValidationContext};

// ─── Schema ──────────────────────────────────────────────────────────

/// A built schema.
#[derive(Debug)]
pub struct Schema {
    name: String,
    fields: Vec<Field>,
    pre_validators: Vec<Arc<dyn RawValidator>>,
    record_validators: Vec<Arc<dyn RecordValidator>>,
    options: SchemaOptions,
}

impl Schema {
    /// Start declaring a schema called `name`.
    pub fn builder(name: impl Into<String>) -> SchemaBuilder {
        SchemaBuilder {
            name: name.into(),
            fields: Vec::new(),
            pre_validators: Vec::new(),
            record_validators: Vec::new(),
            options: SchemaOptions::default(),
        }
    }

    /// Schema name, used in error display.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Fields in declaration order.
    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    /// Look up a field by name.
    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.name() == name)
    }

    /// Options this schema was built with.
    pub fn options(&self) -> &SchemaOptions {
        &self.options
    }

    /// Load one raw object into a typed record.
    ///
    /// # Errors
    ///
    /// Returns every field failure found, keyed by field path, plus any
    /// whole-record failures under `__root__`.
    pub fn load(&self, raw: &Value) -> Result<Record, ValidationErrors> {
        let mut errors = ValidationErrors::new(&self.name);
        let loaded = self.load_at(raw, "", &mut errors);
        self.finish(loaded, errors)
    }

    /// Validate without keeping the typed record.
    ///
    /// # Errors
    ///
    /// Same as [`Schema::load`].
    pub fn validate(&self, raw: &Value) -> Result<(), ValidationErrors> {
        self.load(raw).map(|_| ())
    }

    /// Load a JSON array of objects. Item errors are keyed `index.field`.
    ///
    /// # Errors
    ///
    /// Returns a `__root__` error if `raw` is not an array, otherwise the
    /// errors of every failing item.
    pub fn load_many(&self, raw: &Value) -> Result<Vec<Record>, ValidationErrors> {
        let mut errors = ValidationErrors::new(&self.name);
        let Value::Array(items) = raw else {
            errors.push_root(FieldError::new("type_error.list", "value is not a valid list"));
            return Err(errors);
        };
        let mut records = Vec::with_capacity(items.len());
        for (i, item) in items.iter().enumerate() {
            if let Some(record) = self.load_at(item, &i.to_string(), &mut errors) {
                records.push(record);
            }
        }
        if errors.is_empty() {
            tracing::debug!(schema = %self.name, records = records.len(), "records loaded");
            Ok(records)
        } else {
            tracing::debug!(schema = %self.name, errors = errors.len(), "records rejected");
            Err(errors)
        }
    }

    /// Parse a JSON document and load it.
    ///
    /// # Errors
    ///
    /// Malformed JSON is reported under `__root__`; otherwise as
    /// [`Schema::load`].
    pub fn loads(&self, text: &str) -> Result<Record, ValidationErrors> {
        match serde_json::from_str::<Value>(text) {
            Ok(raw) => self.load(&raw),
            Err(e) => {
                let mut errors = ValidationErrors::new(&self.name);
                errors.push_root(FieldError::new(
                    "value_error.jsondecode",
                    format!("invalid JSON: {e}"),
                ));
                Err(errors)
            }
        }
    }

    fn finish(
        &self,
        loaded: Option<Record>,
        errors: ValidationErrors,
    ) -> Result<Record, ValidationErrors> {
        match loaded {
            Some(record) if errors.is_empty() => {
                tracing::debug!(schema = %self.name, fields = record.len(), "record loaded");
                Ok(record)
            }
            _ => {
                tracing::debug!(schema = %self.name, errors = errors.len(), "record rejected");
                Err(errors)
            }
        }
    }

    /// Load `raw` with errors keyed below `prefix`.
    ///
    /// Returns `None` iff this call pushed at least one error.
    pub(crate) fn load_at(
        &self,
        raw: &Value,
        prefix: &str,
        errors: &mut ValidationErrors,
    ) -> Option<Record> {
        let root = join_path(prefix, ROOT_KEY);
        let Value::Object(map) = raw else {
            errors.push(root, FieldError::new("type_error.dict", "value is not a valid dict"));
            return None;
        };

        let mut pre_failed = false;
        for validator in &self.pre_validators {
            if let Err(e) = validator.validate(map) {
                errors.push(root.clone(), FieldError::from(e));
                pre_failed = true;
            }
        }
        if pre_failed {
            return None;
        }

        let start = errors.len();
        let coercer = Coercer::new(self.options.coercion);
        let mut record = Record::with_capacity(self.fields.len());

        for field in self.fields.iter().filter(|f| !f.is_dump_only()) {
            let path = join_path(prefix, field.key());
            let value = match map.get(field.key()) {
                None => match field.default_value() {
                    Some(default) if field.validates_always() => {
                        self.run_validators(field, default.produce(), &record, &path, errors)
                    }
                    Some(default) => Some(default.produce()),
                    None if field.is_required() => {
                        errors.push(path, FieldError::missing());
                        None
                    }
                    None if field.validates_always() => {
                        self.run_validators(field, TypedValue::Null, &record, &path, errors)
                            .filter(|v| !v.is_null())
                    }
                    None => None,
                },
                Some(Value::Null) if field.allows_none() => {
                    if field.validates_always() {
                        self.run_validators(field, TypedValue::Null, &record, &path, errors)
                    } else {
                        Some(TypedValue::Null)
                    }
                }
                Some(Value::Null) => {
                    errors.push(path, FieldError::none_not_allowed());
                    None
                }
                Some(raw_value) => coercer
                    .coerce_into(raw_value, field.ty(), &path, errors)
                    .and_then(|v| self.run_validators(field, v, &record, &path, errors)),
            };
            if let Some(value) = value {
                record.insert(field.name(), value);
            }
        }

        self.handle_unknown(map, prefix, &mut record, errors);

        if errors.len() > start {
            return None;
        }

        let mut record_failed = false;
        for validator in &self.record_validators {
            if let Err(e) = validator.validate(&record) {
                errors.push(root.clone(), FieldError::from(e));
                record_failed = true;
            }
        }
        (!record_failed).then_some(record)
    }

    fn run_validators(
        &self,
        field: &Field,
        mut value: TypedValue,
        record: &Record,
        path: &str,
        errors: &mut ValidationErrors,
    ) -> Option<TypedValue> {
        let ctx = ValidationContext::new(field.name(), record);
        for validator in field.validators() {
            match validator.validate(value, &ctx) {
                Ok(next) => value = next,
                Err(e) => {
                    let loc = e
                        .location()
                        .map_or_else(|| path.to_string(), |sub| join_path(path, sub));
                    errors.push(loc, FieldError::from(e));
                    return None;
                }
            }
        }
        Some(value)
    }

    fn handle_unknown(
        &self,
        map: &serde_json::Map<String, Value>,
        prefix: &str,
        record: &mut Record,
        errors: &mut ValidationErrors,
    ) {
        let unknown = map
            .iter()
            .filter(|(k, _)| !self.fields.iter().any(|f| f.key() == k.as_str()));
        match self.options.unknown {
            UnknownPolicy::Exclude => {
                let dropped = unknown.count();
                if dropped > 0 {
                    tracing::debug!(schema = %self.name, dropped, "unknown keys excluded");
                }
            }
            UnknownPolicy::Raise => {
                for (key, _) in unknown {
                    errors.push(join_path(prefix, key), FieldError::extra());
                }
            }
            UnknownPolicy::Include => {
                for (key, value) in unknown {
                    // Records are keyed by field name; an aliased field's name
                    // arriving as raw input must not shadow its typed value.
                    if self.field(key).is_some() {
                        tracing::debug!(
                            schema = %self.name,
                            key = %key,
                            "key shadows field name"
                        );
                        continue;
                    }
                    record.insert(key.clone(), TypedValue::Json(value.clone()));
                }
            }
        }
    }
}

// ─── Builder ─────────────────────────────────────────────────────────

/// Declares a [`Schema`]. Checks run in [`SchemaBuilder::build`].
#[derive(Debug)]
pub struct SchemaBuilder {
    name: String,
    fields: Vec<Field>,
    pre_validators: Vec<Arc<dyn RawValidator>>,
    record_validators: Vec<Arc<dyn RecordValidator>>,
    options: SchemaOptions,
}

impl SchemaBuilder {
    /// Append a field.
    pub fn field(mut self, field: Field) -> Self {
        self.fields.push(field);
        self
    }

    /// Append a validator over the raw input object.
    pub fn pre_validator(mut self, validator: impl RawValidator + 'static) -> Self {
        self.pre_validators.push(Arc::new(validator));
        self
    }

    /// Append a whole-record validator.
    pub fn record_validator(mut self, validator: impl RecordValidator + 'static) -> Self {
        self.record_validators.push(Arc::new(validator));
        self
    }

    /// Replace all options.
    pub fn options(mut self, options: SchemaOptions) -> Self {
        self.options = options;
        self
    }

    /// Set the unknown-key policy.
    pub fn unknown(mut self, policy: UnknownPolicy) -> Self {
        self.options.unknown = policy;
        self
    }

    /// Check the declaration and produce the schema.
    ///
    /// # Errors
    ///
    /// - [`SchemaDefinitionError::DuplicateField`] for a repeated name.
    /// - [`SchemaDefinitionError::DuplicateKey`] when two fields share an
    ///   input/output key.
    /// - [`SchemaDefinitionError::UnknownPluckField`] for a pluck of a
    ///   field the nested schema does not declare.
    /// - [`SchemaDefinitionError::MissingDiscriminator`] for a tagged
    ///   variant schema without the discriminator field.
    pub fn build(self) -> Result<Schema, SchemaDefinitionError> {
        let mut names = HashSet::new();
        let mut keys = HashSet::new();
        for field in &self.fields {
            if !names.insert(field.name()) {
                return Err(SchemaDefinitionError::DuplicateField {
                    schema: self.name.clone(),
                    field: field.name().to_string(),
                });
            }
            if !keys.insert(field.key()) {
                return Err(SchemaDefinitionError::DuplicateKey {
                    schema: self.name.clone(),
                    key: field.key().to_string(),
                });
            }
            check_type(field.name(), field.ty())?;
        }
        Ok(Schema {
            name: self.name,
            fields: self.fields,
            pre_validators: self.pre_validators,
            record_validators: self.record_validators,
            options: self.options,
        })
    }
}

fn check_type(field: &str, ty: &FieldType) -> Result<(), SchemaDefinitionError> {
    match ty {
        FieldType::List(inner) => check_type(field, inner),
        FieldType::Union(members) => members.iter().try_for_each(|m| check_type(field, m)),
        FieldType::Pluck { schema, field: target } if schema.field(target).is_none() => {
            Err(SchemaDefinitionError::UnknownPluckField {
                schema: schema.name().to_string(),
                field: field.to_string(),
                target: target.clone(),
            })
        }
        FieldType::Tagged {
            discriminator,
            variants,
        } => variants.iter().try_for_each(|(_, schema)| {
            if schema.fields().iter().any(|f| f.key() == discriminator.as_str()) {
                Ok(())
            } else {
                Err(SchemaDefinitionError::MissingDiscriminator {
                    field: field.to_string(),
                    variant: schema.name().to_string(),
                    discriminator: discriminator.clone(),
                })
            }
        }),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ValidatorError;
    use crate::validators::{field_fn, raw_fn, record_fn, Each, Length, Range};
    use serde_json::json;

    fn user() -> Schema {
        Schema::builder("User")
            .field(Field::new("name", FieldType::Str).required())
            .field(Field::new("age", FieldType::Int).validator(Range::new().ge(0.0)))
            .field(Field::new("nick", FieldType::Str).allow_none())
            .build()
            .unwrap()
    }

    #[test]
    fn test_load_valid_record() {
        let record = user().load(&json!({"name": "Ken", "age": "30"})).unwrap();
        assert_eq!(record.get_str("name"), Some("Ken"));
        assert_eq!(record.get_i64("age"), Some(30));
        assert!(!record.contains_key("nick"));
    }

    #[test]
    fn test_load_collects_every_field_error() {
        let errs = user().load(&json!({"age": -1, "nick": 5})).unwrap_err();
        assert_eq!(errs.messages("name"), vec!["field required"]);
        assert!(errs.get("age").is_some());
        assert!(errs.get("nick").is_some());
        assert_eq!(errs.len(), 3);
    }

    #[test]
    fn test_non_object_input() {
        let errs = user().load(&json!([1, 2])).unwrap_err();
        assert_eq!(errs.get(ROOT_KEY).unwrap()[0].code, "type_error.dict");
    }

    #[test]
    fn test_null_handling() {
        assert_eq!(
            user().load(&json!({"name": "a", "nick": null})).unwrap().get("nick"),
            Some(&TypedValue::Null)
        );
        let errs = user().load(&json!({"name": null})).unwrap_err();
        assert_eq!(errs.get("name").unwrap()[0].code, "type_error.none.not_allowed");
    }

    #[test]
    fn test_unknown_policies() {
        let raw = json!({"name": "a", "extra": 1});
        assert!(!user().load(&raw).unwrap().contains_key("extra"));

        let strict = Schema::builder("Strict")
            .field(Field::new("name", FieldType::Str))
            .unknown(UnknownPolicy::Raise)
            .build()
            .unwrap();
        let errs = strict.load(&raw).unwrap_err();
        assert_eq!(errs.messages("extra"), vec!["extra fields not permitted"]);

        let open = Schema::builder("Open")
            .field(Field::new("name", FieldType::Str))
            .unknown(UnknownPolicy::Include)
            .build()
            .unwrap();
        assert_eq!(
            open.load(&raw).unwrap().get("extra"),
            Some(&TypedValue::Json(json!(1)))
        );
    }

    #[test]
    fn test_included_key_never_shadows_aliased_field() {
        let schema = Schema::builder("Counter")
            .field(Field::new("count", FieldType::Int).data_key("n"))
            .unknown(UnknownPolicy::Include)
            .build()
            .unwrap();
        let record = schema.load(&json!({"n": 5, "count": "junk", "note": "x"})).unwrap();
        assert_eq!(record.get("count"), Some(&TypedValue::Int(5)));
        assert_eq!(record.get("note"), Some(&TypedValue::Json(json!("x"))));
        assert_eq!(record.len(), 2);
    }

    #[test]
    fn test_each_errors_are_keyed_by_item() {
        let schema = Schema::builder("Company")
            .field(
                Field::new("domains", FieldType::list(FieldType::Str))
                    .validator(Each::new(Length::new(None, Some(8)))),
            )
            .build()
            .unwrap();
        let errs = schema
            .load(&json!({"domains": ["a.com", "example.com", "b.io"]}))
            .unwrap_err();
        assert_eq!(errs.keys().collect::<Vec<_>>(), vec!["domains.1"]);
        assert!(errs.contains_field("domains"));
    }

    #[test]
    fn test_record_validators_skip_on_field_failure() {
        let schema = Schema::builder("Pair")
            .field(Field::new("a", FieldType::Int).required())
            .record_validator(record_fn("never", |_| Err(ValidatorError::new("root"))))
            .build()
            .unwrap();
        let errs = schema.load(&json!({})).unwrap_err();
        assert!(errs.get(ROOT_KEY).is_none());
        let errs = schema.load(&json!({"a": 1})).unwrap_err();
        assert_eq!(errs.messages(ROOT_KEY), vec!["root"]);
    }

    #[test]
    fn test_pre_validator_stops_load() {
        let schema = Schema::builder("Pre")
            .field(Field::new("a", FieldType::Int).required())
            .pre_validator(raw_fn("has_b", |raw| {
                if raw.contains_key("b") {
                    Ok(())
                } else {
                    Err(ValidatorError::new("b is required up front"))
                }
            }))
            .build()
            .unwrap();
        let errs = schema.load(&json!({})).unwrap_err();
        assert_eq!(errs.len(), 1);
        assert_eq!(errs.messages(ROOT_KEY), vec!["b is required up front"]);
    }

    #[test]
    fn test_validate_always_runs_on_missing_field() {
        let schema = Schema::builder("Always")
            .field(
                Field::new("flag", FieldType::Bool)
                    .validate_always()
                    .validator(field_fn("fill", |v, _| {
                        Ok(if v.is_null() { TypedValue::Bool(true) } else { v })
                    })),
            )
            .build()
            .unwrap();
        assert_eq!(
            schema.load(&json!({})).unwrap().get("flag"),
            Some(&TypedValue::Bool(true))
        );
    }

    #[test]
    fn test_build_rejects_duplicates() {
        let err = Schema::builder("Dup")
            .field(Field::new("a", FieldType::Int))
            .field(Field::new("a", FieldType::Str))
            .build()
            .unwrap_err();
        assert!(matches!(err, SchemaDefinitionError::DuplicateField { .. }));

        let err = Schema::builder("DupKey")
            .field(Field::new("a", FieldType::Int).data_key("x"))
            .field(Field::new("b", FieldType::Int).data_key("x"))
            .build()
            .unwrap_err();
        assert!(matches!(err, SchemaDefinitionError::DuplicateKey { .. }));
    }

    #[test]
    fn test_build_rejects_unknown_pluck() {
        let task = Arc::new(user());
        let err = Schema::builder("Owner")
            .field(Field::new("t", FieldType::list(FieldType::pluck(task, "title"))))
            .build()
            .unwrap_err();
        assert!(matches!(err, SchemaDefinitionError::UnknownPluckField { .. }));
    }

    #[test]
    fn test_load_many_prefixes_index() {
        let errs = user()
            .load_many(&json!([{"name": "ok"}, {"age": 1}]))
            .unwrap_err();
        assert_eq!(errs.messages("1.name"), vec!["field required"]);
    }

    #[test]
    fn test_loads_malformed_json() {
        let errs = user().loads("{not json").unwrap_err();
        assert_eq!(errs.get(ROOT_KEY).unwrap()[0].code, "value_error.jsondecode");
    }
}
