//! # Schema Descriptors
//!
//! Serde data types that declare schemas as data, so they can be written
//! in JSON or YAML and compiled by the [`SchemaRegistry`].
//!
//! ```yaml
//! - name: Task
//!   fields:
//!     - name: title
//!       type: { kind: str }
//!       required: true
//!       constraints: { max_length: 255 }
//! - name: User
//!   options: { unknown: raise }
//!   fields:
//!     - name: tasks
//!       type: { kind: list, items: { kind: pluck, schema: Task, field: title } }
//! ```
//!
//! Field types are tagged by `kind`. Nested, pluck, and tagged types name
//! other schemas; the registry resolves those names in dependency order.
//!
//! [`SchemaRegistry`]: crate::registry::SchemaRegistry

use std::collections::BTreeMap;
use std::sync::Arc;

use marshal_core::TypedValue;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::coerce::Coercer;
use crate::errors::{RegistryError, SchemaDefinitionError};
use crate::field::{DefaultValue, Field, FieldType};
use crate::options::SchemaOptions;
use crate::schema::Schema;
use crate::validators::{Length, OneOf, Pattern, Range, Transform};

/// A schema declared as data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemaDescriptor {
    /// Schema name, unique within a registry.
    pub name: String,
    /// Fields in declaration order.
    pub fields: Vec<FieldDescriptor>,
    /// Schema options; defaults throughout when omitted.
    #[serde(default)]
    pub options: SchemaOptions,
}

/// A field declared as data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldDescriptor {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: TypeDescriptor,
    #[serde(default)]
    pub required: bool,
    /// Constant default, coerced to the field type at compile time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
    /// Built-in default factory. Ignored when `default` is set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_factory: Option<DefaultFactory>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_key: Option<String>,
    #[serde(default)]
    pub allow_none: bool,
    #[serde(default)]
    pub load_only: bool,
    #[serde(default)]
    pub dump_only: bool,
    #[serde(default)]
    pub constraints: Constraints,
}

/// Named default factories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DefaultFactory {
    /// A fresh v4 UUID.
    Uuid4,
    /// The current UTC time.
    NowUtc,
}

/// A field type declared as data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TypeDescriptor {
    Any,
    Bool,
    Int,
    Float,
    Str,
    Email,
    Uuid,
    #[serde(rename = "datetime")]
    DateTime,
    Date,
    Time,
    Duration,
    List {
        items: Box<TypeDescriptor>,
    },
    Nested {
        schema: String,
    },
    Pluck {
        schema: String,
        field: String,
    },
    Literal {
        values: Vec<Value>,
    },
    Union {
        members: Vec<TypeDescriptor>,
    },
    Tagged {
        discriminator: String,
        /// Discriminator value to schema name.
        variants: BTreeMap<String, String>,
    },
}

/// Declarative constraints, compiled to built-in validators.
///
/// Transforms run first, then length, range, pattern, and choice checks.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Constraints {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_length: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_length: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gt: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ge: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lt: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub le: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub one_of: Option<Vec<Value>>,
    pub to_upper: bool,
    pub to_lower: bool,
    pub title: bool,
}

impl TypeDescriptor {
    /// Schema names this type refers to.
    pub fn references(&self) -> Vec<&str> {
        let mut out = Vec::new();
        self.collect_references(&mut out);
        out
    }

    fn collect_references<'a>(&'a self, out: &mut Vec<&'a str>) {
        match self {
            Self::List { items } => items.collect_references(out),
            Self::Union { members } => members.iter().for_each(|m| m.collect_references(out)),
            Self::Nested { schema } | Self::Pluck { schema, .. } => out.push(schema),
            Self::Tagged { variants, .. } => out.extend(variants.values().map(String::as_str)),
            _ => {}
        }
    }

    fn compile<F>(&self, owner: &str, resolve: &F) -> Result<FieldType, RegistryError>
    where
        F: Fn(&str) -> Option<Arc<Schema>>,
    {
        let lookup = |name: &str| {
            resolve(name).ok_or_else(|| RegistryError::UnknownReference {
                schema: owner.to_string(),
                reference: name.to_string(),
            })
        };
        Ok(match self {
            Self::Any => FieldType::Any,
            Self::Bool => FieldType::Bool,
            Self::Int => FieldType::Int,
            Self::Float => FieldType::Float,
            Self::Str => FieldType::Str,
            Self::Email => FieldType::Email,
            Self::Uuid => FieldType::Uuid,
            Self::DateTime => FieldType::DateTime,
            Self::Date => FieldType::Date,
            Self::Time => FieldType::Time,
            Self::Duration => FieldType::Duration,
            Self::List { items } => FieldType::list(items.compile(owner, resolve)?),
            Self::Nested { schema } => FieldType::Nested(lookup(schema.as_str())?),
            Self::Pluck { schema, field } => {
                FieldType::pluck(lookup(schema.as_str())?, field.clone())
            }
            Self::Literal { values } => FieldType::Literal(values.clone()),
            Self::Union { members } => FieldType::Union(
                members
                    .iter()
                    .map(|m| m.compile(owner, resolve))
                    .collect::<Result<_, _>>()?,
            ),
            Self::Tagged {
                discriminator,
                variants,
            } => FieldType::Tagged {
                discriminator: discriminator.clone(),
                variants: variants
                    .iter()
                    .map(|(tag, schema)| lookup(schema.as_str()).map(|s| (tag.clone(), s)))
                    .collect::<Result<_, RegistryError>>()?,
            },
        })
    }
}

impl SchemaDescriptor {
    /// Names of the schemas this descriptor depends on, deduplicated.
    pub fn dependencies(&self) -> Vec<&str> {
        let mut deps: Vec<&str> = self
            .fields
            .iter()
            .flat_map(|f| f.ty.references())
            .collect();
        deps.sort_unstable();
        deps.dedup();
        deps
    }

    /// Compile into a [`Schema`], resolving references through `resolve`.
    ///
    /// # Errors
    ///
    /// - [`RegistryError::UnknownReference`] when `resolve` cannot find a
    ///   referenced schema.
    /// - [`RegistryError::Definition`] for invalid patterns, defaults that
    ///   do not coerce, and every check of [`SchemaBuilder::build`].
    ///
    /// [`SchemaBuilder::build`]: crate::schema::SchemaBuilder::build
    pub fn compile<F>(&self, resolve: F) -> Result<Schema, RegistryError>
    where
        F: Fn(&str) -> Option<Arc<Schema>>,
    {
        let coercer = Coercer::new(self.options.coercion);
        let mut builder = Schema::builder(&self.name).options(self.options);
        for fd in &self.fields {
            let ty = fd.ty.compile(&self.name, &resolve)?;
            builder = builder.field(fd.compile(ty, &coercer)?);
        }
        Ok(builder.build()?)
    }
}

impl FieldDescriptor {
    fn compile(&self, ty: FieldType, coercer: &Coercer) -> Result<Field, SchemaDefinitionError> {
        let default = match (&self.default, self.default_factory) {
            (Some(Value::Null), _) => Some(DefaultValue::Value(TypedValue::Null)),
            (Some(raw), _) => {
                let value = coercer.coerce(&self.name, raw, &ty).map_err(|e| {
                    SchemaDefinitionError::InvalidDefault {
                        field: self.name.clone(),
                        reason: e.source.to_string(),
                    }
                })?;
                Some(DefaultValue::Value(value))
            }
            (None, Some(DefaultFactory::Uuid4)) => Some(DefaultValue::uuid4()),
            (None, Some(DefaultFactory::NowUtc)) => Some(DefaultValue::now_utc()),
            (None, None) => None,
        };

        let mut field = Field::new(&self.name, ty);
        if self.required {
            field = field.required();
        }
        if let Some(default) = default {
            field = field.default(default);
        }
        if let Some(key) = &self.data_key {
            field = field.data_key(key);
        }
        if self.allow_none {
            field = field.allow_none();
        }
        if self.load_only {
            field = field.load_only();
        }
        if self.dump_only {
            field = field.dump_only();
        }
        self.constraints.apply(&self.name, field)
    }
}

impl Constraints {
    fn apply(&self, name: &str, mut field: Field) -> Result<Field, SchemaDefinitionError> {
        let transforms = [
            (self.to_upper, Transform::ToUpper),
            (self.to_lower, Transform::ToLower),
            (self.title, Transform::Title),
        ];
        for (_, t) in transforms.into_iter().filter(|(on, _)| *on) {
            field = field.validator(t);
        }
        if self.min_length.is_some() || self.max_length.is_some() {
            field = field.validator(Length::new(self.min_length, self.max_length));
        }
        let range = Range {
            gt: self.gt,
            ge: self.ge,
            lt: self.lt,
            le: self.le,
        };
        if range != Range::default() {
            field = field.validator(range);
        }
        if let Some(pattern) = &self.pattern {
            let compiled =
                Pattern::new(pattern).map_err(|e| SchemaDefinitionError::InvalidPattern {
                    field: name.to_string(),
                    reason: e.to_string(),
                })?;
            field = field.validator(compiled);
        }
        if let Some(choices) = &self.one_of {
            field = field.validator(OneOf::new(choices.iter().map(TypedValue::from_json)));
        }
        Ok(field)
    }
}
