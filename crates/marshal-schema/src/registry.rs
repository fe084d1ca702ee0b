//! # Schema Registry
//!
//! Named store of built schemas. Schemas can be registered directly or
//! compiled from [`SchemaDescriptor`]s parsed out of JSON or YAML text.
//!
//! ## Descriptor Batches
//!
//! A batch of descriptors may reference each other and anything already
//! registered. The batch is compiled in dependency order and registered
//! all-or-nothing: if any descriptor fails, the registry is left as it was.
//! References to names outside the batch and the registry are rejected,
//! as are reference cycles (a schema cannot nest itself).

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::Deserialize;

use crate::descriptor::SchemaDescriptor;
use crate::errors::RegistryError;
use crate::schema::Schema;

/// Descriptor text may hold a single descriptor or a list of them.
#[derive(Deserialize)]
#[serde(untagged)]
enum DescriptorDocument {
    Many(Vec<SchemaDescriptor>),
    One(SchemaDescriptor),
}

impl DescriptorDocument {
    fn into_vec(self) -> Vec<SchemaDescriptor> {
        match self {
            Self::Many(descriptors) => descriptors,
            Self::One(descriptor) => vec![descriptor],
        }
    }
}

/// Named collection of schemas.
#[derive(Debug, Default)]
pub struct SchemaRegistry {
    schemas: BTreeMap<String, Arc<Schema>>,
}

impl SchemaRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a built schema under its own name.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::Duplicate`] if the name is taken.
    pub fn register(
        &mut self,
        schema: impl Into<Arc<Schema>>,
    ) -> Result<Arc<Schema>, RegistryError> {
        let schema = schema.into();
        if self.schemas.contains_key(schema.name()) {
            return Err(RegistryError::Duplicate(schema.name().to_string()));
        }
        tracing::debug!(
            schema = %schema.name(),
            fields = schema.fields().len(),
            "schema registered"
        );
        self.schemas
            .insert(schema.name().to_string(), Arc::clone(&schema));
        Ok(schema)
    }

    /// Look up a schema by name.
    pub fn get(&self, name: &str) -> Option<Arc<Schema>> {
        self.schemas.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.schemas.contains_key(name)
    }

    /// Registered names, sorted.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.schemas.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.schemas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.schemas.is_empty()
    }

    /// Compile and register a batch of descriptors.
    ///
    /// Returns the new schemas in the order they were compiled, which is a
    /// dependency order.
    ///
    /// # Errors
    ///
    /// - [`RegistryError::Duplicate`] for a name already registered or
    ///   repeated within the batch.
    /// - [`RegistryError::UnknownReference`] for a reference that neither
    ///   the batch nor the registry can satisfy.
    /// - [`RegistryError::Cycle`] when the remaining descriptors only
    ///   reference each other.
    /// - [`RegistryError::Definition`] when a descriptor compiles to an
    ///   invalid schema.
    pub fn load_descriptors(
        &mut self,
        descriptors: Vec<SchemaDescriptor>,
    ) -> Result<Vec<Arc<Schema>>, RegistryError> {
        let mut pending: BTreeMap<String, SchemaDescriptor> = BTreeMap::new();
        for desc in descriptors {
            if self.contains(&desc.name) || pending.contains_key(&desc.name) {
                return Err(RegistryError::Duplicate(desc.name));
            }
            pending.insert(desc.name.clone(), desc);
        }

        for desc in pending.values() {
            if let Some(missing) = desc
                .dependencies()
                .into_iter()
                .find(|dep| !self.contains(dep) && !pending.contains_key(*dep))
            {
                return Err(RegistryError::UnknownReference {
                    schema: desc.name.clone(),
                    reference: missing.to_string(),
                });
            }
        }

        let mut staged: BTreeMap<String, Arc<Schema>> = BTreeMap::new();
        let mut order: Vec<Arc<Schema>> = Vec::with_capacity(pending.len());
        while !pending.is_empty() {
            let ready: Vec<String> = pending
                .values()
                .filter(|d| {
                    d.dependencies()
                        .iter()
                        .all(|dep| self.contains(dep) || staged.contains_key(*dep))
                })
                .map(|d| d.name.clone())
                .collect();
            if ready.is_empty() {
                let cycle: Vec<String> = pending.into_keys().collect();
                tracing::warn!(schemas = ?cycle, "descriptor reference cycle");
                return Err(RegistryError::Cycle(cycle));
            }
            for name in ready {
                let Some(desc) = pending.remove(&name) else {
                    continue;
                };
                let schema = Arc::new(desc.compile(|r| {
                    staged.get(r).cloned().or_else(|| self.get(r))
                })?);
                tracing::debug!(schema = %name, "descriptor compiled");
                staged.insert(name, Arc::clone(&schema));
                order.push(schema);
            }
        }

        for schema in &order {
            self.register(Arc::clone(schema))?;
        }
        Ok(order)
    }

    /// Parse JSON descriptor text (one descriptor or a list) and load it.
    ///
    /// # Errors
    ///
    /// [`RegistryError::Parse`] for malformed text, otherwise as
    /// [`SchemaRegistry::load_descriptors`].
    pub fn load_json_str(&mut self, text: &str) -> Result<Vec<Arc<Schema>>, RegistryError> {
        let doc: DescriptorDocument =
            serde_json::from_str(text).map_err(|e| RegistryError::Parse {
                format: "json",
                reason: e.to_string(),
            })?;
        self.load_descriptors(doc.into_vec())
    }

    /// Parse YAML descriptor text (one descriptor or a list) and load it.
    ///
    /// # Errors
    ///
    /// [`RegistryError::Parse`] for malformed text, otherwise as
    /// [`SchemaRegistry::load_descriptors`].
    pub fn load_yaml_str(&mut self, text: &str) -> Result<Vec<Arc<Schema>>, RegistryError> {
        let doc: DescriptorDocument =
            serde_yaml::from_str(text).map_err(|e| RegistryError::Parse {
                format: "yaml",
                reason: e.to_string(),
            })?;
        self.load_descriptors(doc.into_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::{Field, FieldType};
    use serde_json::json;

    fn simple(name: &str) -> Schema {
        Schema::builder(name)
            .field(Field::new("id", FieldType::Int))
            .build()
            .unwrap()
    }

    #[test]
    fn test_register_and_get() {
        let mut reg = SchemaRegistry::new();
        reg.register(simple("A")).unwrap();
        assert!(reg.contains("A"));
        assert_eq!(reg.get("A").unwrap().name(), "A");
        assert!(matches!(reg.register(simple("A")), Err(RegistryError::Duplicate(_))));
        assert_eq!(reg.len(), 1);
    }

    #[test]
    fn test_descriptors_resolve_out_of_order() {
        let mut reg = SchemaRegistry::new();
        let loaded = reg
            .load_json_str(
                &json!([
                    {"name": "User", "fields": [
                        {"name": "tasks", "type": {"kind": "list", "items": {"kind": "nested", "schema": "Task"}}}
                    ]},
                    {"name": "Task", "fields": [{"name": "title", "type": {"kind": "str"}}]}
                ])
                .to_string(),
            )
            .unwrap();
        let order: Vec<&str> = loaded.iter().map(|s| s.name()).collect();
        assert_eq!(order, vec!["Task", "User"]);
        assert_eq!(reg.names().collect::<Vec<_>>(), vec!["Task", "User"]);
    }

    #[test]
    fn test_cycle_is_rejected_and_registry_untouched() {
        let mut reg = SchemaRegistry::new();
        let err = reg
            .load_json_str(
                &json!([
                    {"name": "A", "fields": [{"name": "b", "type": {"kind": "nested", "schema": "B"}}]},
                    {"name": "B", "fields": [{"name": "a", "type": {"kind": "nested", "schema": "A"}}]}
                ])
                .to_string(),
            )
            .unwrap_err();
        assert!(matches!(err, RegistryError::Cycle(ref names) if names == &["A", "B"]));
        assert!(reg.is_empty());
    }

    #[test]
    fn test_unknown_reference() {
        let mut reg = SchemaRegistry::new();
        let err = reg
            .load_json_str(
                r#"{"name": "A", "fields": [{"name": "b", "type": {"kind": "nested", "schema": "Nope"}}]}"#,
            )
            .unwrap_err();
        assert!(matches!(
            err,
            RegistryError::UnknownReference { ref reference, .. } if reference == "Nope"
        ));
    }

    #[test]
    fn test_reference_to_registered_schema() {
        let mut reg = SchemaRegistry::new();
        reg.register(simple("Base")).unwrap();
        reg.load_yaml_str(
            "name: Wrapper\nfields:\n  - name: base\n    type: { kind: nested, schema: Base }\n",
        )
        .unwrap();
        let wrapper = reg.get("Wrapper").unwrap();
        let record = wrapper.load(&json!({"base": {"id": "7"}})).unwrap();
        assert_eq!(
            record.get("base").and_then(|b| b.as_record()).and_then(|r| r.get_i64("id")),
            Some(7)
        );
    }

    #[test]
    fn test_parse_error() {
        let mut reg = SchemaRegistry::new();
        assert!(matches!(
            reg.load_yaml_str("name: ["),
            Err(RegistryError::Parse { format: "yaml", .. })
        ));
    }
}
