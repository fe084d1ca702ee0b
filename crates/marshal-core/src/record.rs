//! # Ordered Records
//!
//! A `Record` is the typed result of loading a raw object: a mapping from
//! field name to [`TypedValue`] that iterates in insertion order. Schemas
//! insert fields in declaration order, so a loaded record reads the same
//! way its schema does.
//!
//! Records are small (one entry per declared field), so lookups scan a
//! vector rather than maintaining a hash index.

use serde::{Serialize, Serializer};
use serde_json::Value;

use crate::value::TypedValue;

/// Ordered mapping from field name to typed value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Record {
    entries: Vec<(String, TypedValue)>,
}

impl Record {
    /// Create an empty record.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty record with room for `capacity` fields.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: Vec::with_capacity(capacity),
        }
    }

    /// Insert a value, replacing any existing value for `name` in place.
    ///
    /// Returns the previous value when one was replaced. Replacement keeps
    /// the original position so field order stays stable.
    pub fn insert(&mut self, name: impl Into<String>, value: TypedValue) -> Option<TypedValue> {
        let name = name.into();
        match self.entries.iter_mut().find(|(k, _)| *k == name) {
            Some((_, slot)) => Some(std::mem::replace(slot, value)),
            None => {
                self.entries.push((name, value));
                None
            }
        }
    }

    /// Look up a field by name.
    pub fn get(&self, name: &str) -> Option<&TypedValue> {
        self.entries.iter().find(|(k, _)| k == name).map(|(_, v)| v)
    }

    /// Mutable lookup by name.
    pub fn get_mut(&mut self, name: &str) -> Option<&mut TypedValue> {
        self.entries
            .iter_mut()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v)
    }

    /// Remove a field, returning its value.
    pub fn remove(&mut self, name: &str) -> Option<TypedValue> {
        let idx = self.entries.iter().position(|(k, _)| k == name)?;
        Some(self.entries.remove(idx).1)
    }

    /// Returns true if the record holds a value for `name`.
    pub fn contains_key(&self, name: &str) -> bool {
        self.entries.iter().any(|(k, _)| k == name)
    }

    /// Field names in insertion order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    /// `(name, value)` pairs in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &TypedValue)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Number of fields present.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if no fields are present.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// String field shortcut.
    pub fn get_str(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(TypedValue::as_str)
    }

    /// Integer field shortcut.
    pub fn get_i64(&self, name: &str) -> Option<i64> {
        self.get(name).and_then(TypedValue::as_i64)
    }

    /// Encode the record as a JSON object using the canonical value encodings.
    ///
    /// This is a plain encoding under field names. Schema-aware output
    /// (aliases, projections, plucking) is the serializer's job.
    pub fn to_json(&self) -> Value {
        let map: serde_json::Map<String, Value> = self
            .entries
            .iter()
            .map(|(k, v)| (k.clone(), v.to_json()))
            .collect();
        Value::Object(map)
    }
}

impl FromIterator<(String, TypedValue)> for Record {
    fn from_iter<I: IntoIterator<Item = (String, TypedValue)>>(iter: I) -> Self {
        let mut record = Record::new();
        for (k, v) in iter {
            record.insert(k, v);
        }
        record
    }
}

impl IntoIterator for Record {
    type Item = (String, TypedValue);
    type IntoIter = std::vec::IntoIter<(String, TypedValue)>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

impl Serialize for Record {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}
