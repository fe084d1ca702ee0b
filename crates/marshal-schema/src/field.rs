//! # Field Declarations
//!
//! A [`Field`] is one entry of a schema: a name, a declared [`FieldType`],
//! presence rules, an optional alias, and a validator chain. Fields are
//! built with consuming setters and handed to [`SchemaBuilder::field`].
//!
//! ## Keys
//!
//! The *name* is what the loaded [`Record`] is keyed by. The *key* is what
//! raw input and dumped output use: the `data_key` when one is set, the
//! name otherwise. Error paths use the key, so messages point at what the
//! caller actually sent.
//!
//! [`SchemaBuilder::field`]: crate::schema::SchemaBuilder::field
//! [`Record`]: marshal_core::Record

use std::fmt;
use std::sync::Arc;

use chrono::Utc;
use marshal_core::TypedValue;
use serde_json::Value;
use uuid::Uuid;

use crate::schema::Schema;
use crate::validators::FieldValidator;

// ─── Field Types ─────────────────────────────────────────────────────

/// The declared type of a field.
#[derive(Debug, Clone)]
pub enum FieldType {
    /// Raw JSON passthrough.
    Any,
    /// Boolean.
    Bool,
    /// 64-bit integer.
    Int,
    /// 64-bit float.
    Float,
    /// String.
    Str,
    /// String shaped like an email address.
    Email,
    /// UUID.
    Uuid,
    /// Datetime with offset.
    DateTime,
    /// Calendar date.
    Date,
    /// Wall-clock time.
    Time,
    /// ISO 8601 duration.
    Duration,
    /// Homogeneous list.
    List(Box<FieldType>),
    /// Sub-record loaded by another schema.
    Nested(Arc<Schema>),
    /// Sub-record represented by a single one of its fields.
    Pluck {
        /// Schema of the sub-record.
        schema: Arc<Schema>,
        /// Field of `schema` that stands in for the whole record.
        field: String,
    },
    /// One of a fixed set of raw values.
    Literal(Vec<Value>),
    /// First member type that accepts the value, left to right.
    Union(Vec<FieldType>),
    /// Object whose discriminator field selects the schema that loads it.
    Tagged {
        /// Discriminator field name.
        discriminator: String,
        /// `(discriminator value, schema)` pairs.
        variants: Vec<(String, Arc<Schema>)>,
    },
}

impl FieldType {
    /// `List` of `inner`.
    pub fn list(inner: FieldType) -> Self {
        Self::List(Box::new(inner))
    }

    /// `Nested` under `schema`.
    pub fn nested(schema: impl Into<Arc<Schema>>) -> Self {
        Self::Nested(schema.into())
    }

    /// `Pluck` of `field` from `schema`.
    pub fn pluck(schema: impl Into<Arc<Schema>>, field: impl Into<String>) -> Self {
        Self::Pluck {
            schema: schema.into(),
            field: field.into(),
        }
    }

    /// `Literal` over `values`.
    pub fn literal(values: impl IntoIterator<Item = Value>) -> Self {
        Self::Literal(values.into_iter().collect())
    }

    /// `Union` of `members`.
    pub fn union(members: impl IntoIterator<Item = FieldType>) -> Self {
        Self::Union(members.into_iter().collect())
    }

    /// `Tagged` union selected by `discriminator`.
    pub fn tagged<K, S>(
        discriminator: impl Into<String>,
        variants: impl IntoIterator<Item = (K, S)>,
    ) -> Self
    where
        K: Into<String>,
        S: Into<Arc<Schema>>,
    {
        Self::Tagged {
            discriminator: discriminator.into(),
            variants: variants
                .into_iter()
                .map(|(k, s)| (k.into(), s.into()))
                .collect(),
        }
    }

    /// Type name used in error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Any => "any",
            Self::Bool => "boolean",
            Self::Int => "integer",
            Self::Float => "float",
            Self::Str => "string",
            Self::Email => "email",
            Self::Uuid => "uuid",
            Self::DateTime => "datetime",
            Self::Date => "date",
            Self::Time => "time",
            Self::Duration => "duration",
            Self::List(_) => "list",
            Self::Nested(_) | Self::Tagged { .. } => "object",
            Self::Pluck { .. } => "pluck",
            Self::Literal(_) => "literal",
            Self::Union(_) => "union",
        }
    }
}

// ─── Defaults ────────────────────────────────────────────────────────

/// Value used when a field is absent from the input.
#[derive(Clone)]
pub enum DefaultValue {
    /// The same value every time.
    Value(TypedValue),
    /// A fresh value from a factory on every load.
    Factory {
        /// Label shown in `Debug` output.
        name: &'static str,
        /// Produces the value.
        produce: Arc<dyn Fn() -> TypedValue + Send + Sync>,
    },
}

impl DefaultValue {
    /// Wrap a closure as a default factory.
    pub fn factory<F>(name: &'static str, produce: F) -> Self
    where
        F: Fn() -> TypedValue + Send + Sync + 'static,
    {
        Self::Factory {
            name,
            produce: Arc::new(produce),
        }
    }

    /// A new random (v4) UUID per load.
    pub fn uuid4() -> Self {
        Self::factory("uuid4", || TypedValue::Uuid(Uuid::new_v4()))
    }

    /// The current UTC time per load.
    pub fn now_utc() -> Self {
        Self::factory("now_utc", || TypedValue::DateTime(Utc::now().fixed_offset()))
    }

    /// Produce the default.
    pub fn produce(&self) -> TypedValue {
        match self {
            Self::Value(v) => v.clone(),
            Self::Factory { produce, .. } => produce(),
        }
    }
}

impl fmt::Debug for DefaultValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Value(v) => f.debug_tuple("Value").field(v).finish(),
            Self::Factory { name, .. } => f.debug_tuple("Factory").field(name).finish(),
        }
    }
}

impl From<TypedValue> for DefaultValue {
    fn from(value: TypedValue) -> Self {
        Self::Value(value)
    }
}

// ─── Field ───────────────────────────────────────────────────────────

/// One field declaration.
#[derive(Debug, Clone)]
pub struct Field {
    name: String,
    ty: FieldType,
    required: bool,
    default: Option<DefaultValue>,
    data_key: Option<String>,
    allow_none: bool,
    load_only: bool,
    dump_only: bool,
    validate_always: bool,
    validators: Vec<Arc<dyn FieldValidator>>,
}

impl Field {
    /// Optional field of type `ty` with no default and no validators.
    pub fn new(name: impl Into<String>, ty: FieldType) -> Self {
        Self {
            name: name.into(),
            ty,
            required: false,
            default: None,
            data_key: None,
            allow_none: false,
            load_only: false,
            dump_only: false,
            validate_always: false,
            validators: Vec::new(),
        }
    }

    /// Absence is an error unless a default is set.
    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// Value to use when the field is absent.
    pub fn default(mut self, default: impl Into<DefaultValue>) -> Self {
        self.default = Some(default.into());
        self
    }

    /// Read and write the field under `key` instead of its name.
    pub fn data_key(mut self, key: impl Into<String>) -> Self {
        self.data_key = Some(key.into());
        self
    }

    /// Accept an explicit `null`.
    pub fn allow_none(mut self) -> Self {
        self.allow_none = true;
        self
    }

    /// Accept on load, never dump.
    pub fn load_only(mut self) -> Self {
        self.load_only = true;
        self
    }

    /// Dump, ignore on load.
    pub fn dump_only(mut self) -> Self {
        self.dump_only = true;
        self
    }

    /// Run validators even when the field is absent or null.
    pub fn validate_always(mut self) -> Self {
        self.validate_always = true;
        self
    }

    /// Append a validator. Validators run in the order they were added.
    pub fn validator(mut self, validator: impl FieldValidator + 'static) -> Self {
        self.validators.push(Arc::new(validator));
        self
    }

    /// Append an already shared validator.
    pub fn validator_arc(mut self, validator: Arc<dyn FieldValidator>) -> Self {
        self.validators.push(validator);
        self
    }

    /// Field name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Declared type.
    pub fn ty(&self) -> &FieldType {
        &self.ty
    }

    /// Input/output key: the data key if set, else the name.
    pub fn key(&self) -> &str {
        self.data_key.as_deref().unwrap_or(&self.name)
    }

    /// Alias, if one was set.
    pub fn alias(&self) -> Option<&str> {
        self.data_key.as_deref()
    }

    /// Default, if one was set.
    pub fn default_value(&self) -> Option<&DefaultValue> {
        self.default.as_ref()
    }

    pub fn is_required(&self) -> bool {
        self.required
    }

    pub fn allows_none(&self) -> bool {
        self.allow_none
    }

    pub fn is_load_only(&self) -> bool {
        self.load_only
    }

    pub fn is_dump_only(&self) -> bool {
        self.dump_only
    }

    pub fn validates_always(&self) -> bool {
        self.validate_always
    }

    /// Validator chain.
    pub fn validators(&self) -> &[Arc<dyn FieldValidator>] {
        &self.validators
    }
}
