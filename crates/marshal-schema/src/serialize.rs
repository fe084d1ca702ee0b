//! # Serializer
//!
//! Turns typed data back into plain JSON output under a schema. The source
//! can be a loaded [`Record`] or any domain type that implements
//! [`FieldSource`].
//!
//! Output honours each field's key (its data key when set), skips
//! `load_only` fields and absent fields, and recurses into nested schemas.
//! A pluck field dumps only the plucked sub-field; a list of plucks dumps a
//! list of those values.
//!
//! [`DumpOptions`] narrows the output with dotted paths: `only` keeps the
//! named fields (and, for `tasks.title`, only `title` inside `tasks`), and
//! `exclude` then removes fields from what is left.

use std::borrow::Cow;
use std::sync::Arc;

use marshal_core::{Record, TypedValue};
use serde_json::{Map, Value};

use crate::field::FieldType;
use crate::schema::Schema;

/// Anything that can hand a schema its field values by field name.
pub trait FieldSource {
    /// Value of the field called `name`, or `None` if absent.
    fn field(&self, name: &str) -> Option<Cow<'_, TypedValue>>;
}

impl FieldSource for Record {
    fn field(&self, name: &str) -> Option<Cow<'_, TypedValue>> {
        self.get(name).map(Cow::Borrowed)
    }
}

impl<T: FieldSource + ?Sized> FieldSource for &T {
    fn field(&self, name: &str) -> Option<Cow<'_, TypedValue>> {
        (**self).field(name)
    }
}

/// Field projection for a dump.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DumpOptions {
    only: Option<Vec<String>>,
    exclude: Vec<String>,
}

impl DumpOptions {
    /// Dump everything.
    pub fn new() -> Self {
        Self::default()
    }

    /// Keep only these (dotted) field paths.
    pub fn only<I, S>(mut self, paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.only = Some(paths.into_iter().map(Into::into).collect());
        self
    }

    /// Drop these (dotted) field paths.
    pub fn exclude<I, S>(mut self, paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.exclude.extend(paths.into_iter().map(Into::into));
        self
    }

    fn admits(&self, name: &str) -> bool {
        let nested = format!("{name}.");
        let kept = match &self.only {
            None => true,
            Some(paths) => paths.iter().any(|p| p == name || p.starts_with(&nested)),
        };
        kept && !self.exclude.iter().any(|p| p == name)
    }

    /// Projection for the sub-schema under `name`.
    fn descend(&self, name: &str) -> DumpOptions {
        let nested = format!("{name}.");
        let strip = |paths: &[String]| -> Vec<String> {
            paths
                .iter()
                .filter_map(|p| p.strip_prefix(&nested).map(str::to_string))
                .collect()
        };
        let only = match &self.only {
            Some(paths) if !paths.iter().any(|p| p == name) => Some(strip(paths)),
            _ => None,
        };
        DumpOptions {
            only,
            exclude: strip(&self.exclude),
        }
    }
}

impl Schema {
    /// Dump `source` with every dumpable field.
    pub fn dump<S: FieldSource + ?Sized>(&self, source: &S) -> Value {
        self.dump_with(source, &DumpOptions::default())
    }

    /// Dump `source` through a projection.
    pub fn dump_with<S: FieldSource + ?Sized>(&self, source: &S, opts: &DumpOptions) -> Value {
        let mut out = Map::new();
        for field in self.fields() {
            if field.is_load_only() || !opts.admits(field.name()) {
                continue;
            }
            let Some(value) = source.field(field.name()) else {
                continue;
            };
            let sub = opts.descend(field.name());
            out.insert(field.key().to_string(), dump_value(&value, field.ty(), &sub));
        }
        Value::Object(out)
    }

    /// Dump each source into a JSON array.
    pub fn dump_many<'a, S, I>(&self, sources: I) -> Value
    where
        S: FieldSource + 'a,
        I: IntoIterator<Item = &'a S>,
    {
        Value::Array(sources.into_iter().map(|s| self.dump(s)).collect())
    }

    /// Dump `source` to a JSON string.
    pub fn dumps<S: FieldSource + ?Sized>(&self, source: &S) -> String {
        self.dump(source).to_string()
    }
}

fn dump_value(value: &TypedValue, ty: &FieldType, opts: &DumpOptions) -> Value {
    match (ty, value) {
        (FieldType::Nested(schema), TypedValue::Record(record)) => schema.dump_with(record, opts),
        (FieldType::Pluck { field, .. }, TypedValue::Record(record)) => {
            record.get(field).map_or(Value::Null, TypedValue::to_json)
        }
        (FieldType::List(inner), TypedValue::List(items)) => Value::Array(
            items
                .iter()
                .map(|item| dump_value(item, inner, opts))
                .collect(),
        ),
        (
            FieldType::Tagged {
                discriminator,
                variants,
            },
            TypedValue::Record(record),
        ) => match tagged_variant(record, discriminator, variants) {
            Some(schema) => schema.dump_with(record, opts),
            None => record.to_json(),
        },
        (FieldType::Union(members), TypedValue::Record(record)) => {
            match union_member(record, members) {
                Some(schema) => schema.dump_with(record, opts),
                None => record.to_json(),
            }
        }
        _ => value.to_json(),
    }
}

/// The variant whose discriminator field holds its own tag.
///
/// The discriminator is an input key, so each variant maps it back to the
/// field name the record is keyed by.
fn tagged_variant<'a>(
    record: &Record,
    discriminator: &str,
    variants: &'a [(String, Arc<Schema>)],
) -> Option<&'a Arc<Schema>> {
    variants
        .iter()
        .find(|(tag, schema)| {
            schema
                .fields()
                .iter()
                .find(|f| f.key() == discriminator)
                .and_then(|f| record.get(f.name()))
                .and_then(TypedValue::as_str)
                == Some(tag.as_str())
        })
        .map(|(_, schema)| schema)
}

/// The nested member a union record was loaded through.
///
/// Members are tried in declaration order, as on load. A member qualifies
/// when it declares every field the record holds and its own dump of the
/// record loads back to the same record. Without such a member, the first
/// one declaring every field is used, then the first nested member.
fn union_member<'a>(record: &Record, members: &'a [FieldType]) -> Option<&'a Arc<Schema>> {
    let nested = move || {
        members.iter().filter_map(|m| match m {
            FieldType::Nested(schema) => Some(schema),
            _ => None,
        })
    };
    let declares_all = |schema: &Arc<Schema>| record.keys().all(|k| schema.field(k).is_some());
    nested()
        .find(|&s| declares_all(s) && s.load(&s.dump(record)).ok().as_ref() == Some(record))
        .or_else(|| nested().find(|&s| declares_all(s)))
        .or_else(|| nested().next())
}
