//! # Object Mapper
//!
//! Post-load hooks that turn a validated [`Record`] into a domain value.
//!
//! - [`FromRecord`] is the explicit route: the type reads the fields it
//!   needs and may reject the record with a [`ValidatorError`], which is
//!   reported under `__root__`.
//! - [`Schema::load_as`] is the serde route: the record is encoded under
//!   field names and deserialized into any `DeserializeOwned` type.
//! - [`Schema::load_from`] goes the other way: a `Serialize` domain object
//!   is encoded with serde and then loaded like raw input.

use marshal_core::Record;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::errors::{FieldError, ValidationErrors, ValidatorError, ROOT_KEY};
use crate::schema::Schema;

/// Build a domain value from a validated record.
pub trait FromRecord: Sized {
    /// Consume the record.
    ///
    /// # Errors
    ///
    /// Returns a [`ValidatorError`] when the record cannot form a value.
    fn from_record(record: Record) -> Result<Self, ValidatorError>;
}

impl FromRecord for Record {
    fn from_record(record: Record) -> Result<Self, ValidatorError> {
        Ok(record)
    }
}

impl Schema {
    /// Load and map to `T`.
    ///
    /// # Errors
    ///
    /// Load errors as [`Schema::load`]; a mapping failure is reported
    /// under `__root__`.
    pub fn load_into<T: FromRecord>(&self, raw: &Value) -> Result<T, ValidationErrors> {
        let record = self.load(raw)?;
        T::from_record(record).map_err(|e| self.root_error(FieldError::from(e)))
    }

    /// Load an array and map each item to `T`. Mapping failures are keyed
    /// `index.__root__`.
    ///
    /// # Errors
    ///
    /// Returns the errors of every failing item.
    pub fn load_many_into<T: FromRecord>(&self, raw: &Value) -> Result<Vec<T>, ValidationErrors> {
        let records = self.load_many(raw)?;
        let mut errors = ValidationErrors::new(self.name());
        let mut out = Vec::with_capacity(records.len());
        for (i, record) in records.into_iter().enumerate() {
            match T::from_record(record) {
                Ok(value) => out.push(value),
                Err(e) => errors.push(format!("{i}.{ROOT_KEY}"), e.into()),
            }
        }
        if errors.is_empty() {
            Ok(out)
        } else {
            Err(errors)
        }
    }

    /// Load and deserialize into `T` with serde.
    ///
    /// # Errors
    ///
    /// Load errors as [`Schema::load`]; a deserialization failure is
    /// reported under `__root__` with code `type_error.deserialize`.
    pub fn load_as<T: DeserializeOwned>(&self, raw: &Value) -> Result<T, ValidationErrors> {
        let record = self.load(raw)?;
        serde_json::from_value(record.to_json()).map_err(|e| {
            self.root_error(FieldError::new("type_error.deserialize", e.to_string()))
        })
    }

    /// Serialize `object` with serde and load the result.
    ///
    /// # Errors
    ///
    /// A serialization failure is reported under `__root__`; otherwise as
    /// [`Schema::load`].
    pub fn load_from<T: Serialize + ?Sized>(&self, object: &T) -> Result<Record, ValidationErrors> {
        let raw = serde_json::to_value(object).map_err(|e| {
            self.root_error(FieldError::new("type_error.serialize", e.to_string()))
        })?;
        self.load(&raw)
    }

    fn root_error(&self, error: FieldError) -> ValidationErrors {
        tracing::debug!(schema = %self.name(), code = %error.code, "object mapping failed");
        let mut errors = ValidationErrors::new(self.name());
        errors.push_root(error);
        errors
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::{Field, FieldType};
    use serde::Deserialize;
    use serde_json::json;

    #[derive(Debug, PartialEq, Deserialize, Serialize)]
    struct User {
        name: String,
        age: i64,
    }

    impl FromRecord for User {
        fn from_record(record: Record) -> Result<Self, ValidatorError> {
            let name = record
                .get_str("name")
                .ok_or_else(|| ValidatorError::new("name missing"))?
                .to_string();
            let age = record.get_i64("age").unwrap_or_default();
            if name == "root" {
                return Err(ValidatorError::new("reserved name"));
            }
            Ok(User { name, age })
        }
    }

    fn schema() -> Schema {
        Schema::builder("User")
            .field(Field::new("name", FieldType::Str).required())
            .field(Field::new("age", FieldType::Int).default(marshal_core::TypedValue::Int(0)))
            .build()
            .unwrap()
    }

    #[test]
    fn test_load_into() {
        let user: User = schema().load_into(&json!({"name": "Ken", "age": "42"})).unwrap();
        assert_eq!(user, User { name: "Ken".into(), age: 42 });
    }

    #[test]
    fn test_mapper_failure_is_root_error() {
        let errs = schema().load_into::<User>(&json!({"name": "root"})).unwrap_err();
        assert_eq!(errs.messages(ROOT_KEY), vec!["reserved name"]);
    }

    #[test]
    fn test_load_many_into_keys_by_index() {
        let errs = schema()
            .load_many_into::<User>(&json!([{"name": "a"}, {"name": "root"}]))
            .unwrap_err();
        assert_eq!(errs.messages("1.__root__"), vec!["reserved name"]);
    }

    #[test]
    fn test_load_as_serde() {
        let user: User = schema().load_as(&json!({"name": "Ken"})).unwrap();
        assert_eq!(user.age, 0);
    }

    #[test]
    fn test_load_from_domain_object() {
        let record = schema()
            .load_from(&User { name: "Ken".into(), age: 7 })
            .unwrap();
        assert_eq!(record.get_i64("age"), Some(7));
    }
}
