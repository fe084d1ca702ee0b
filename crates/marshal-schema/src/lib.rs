//! # marshal-schema — Validation, Coercion & Serialization
//!
//! Declares schemas over raw JSON records and runs them in both
//! directions: **load** (raw → typed [`Record`], or a field-keyed
//! [`ValidationErrors`]) and **dump** (typed → plain JSON).
//!
//! ## Components
//!
//! - [`field`]: field declarations, types, defaults.
//! - [`coerce`]: per-type coercion policy from raw values.
//! - [`validators`]: field, record, and pre-record validator seams plus
//!   the built-in constraints.
//! - [`schema`]: the schema type, its builder, and the load pipeline.
//! - [`serialize`]: dumping with keys, projections, nesting, and plucking.
//! - [`mapper`]: post-load mapping into domain types.
//! - [`descriptor`] / [`registry`]: schemas declared as JSON/YAML data and
//!   a named store that resolves references between them.
//!
//! ## Example
//!
//! ```
//! use marshal_schema::{Field, FieldType, Schema};
//! use marshal_schema::validators::Range;
//! use serde_json::json;
//!
//! let schema = Schema::builder("Model")
//!     .field(Field::new("name", FieldType::Str).required())
//!     .field(Field::new("count", FieldType::Int).validator(Range::new().gt(42.0)))
//!     .build()
//!     .unwrap();
//!
//! let errors = schema.load(&json!({"count": 21})).unwrap_err();
//! assert_eq!(errors.len(), 2);
//! assert!(errors.contains_field("name"));
//! assert!(errors.contains_field("count"));
//! ```
//!
//! ## Crate Policy
//!
//! - Depends only on `marshal-core` internally.
//! - A load never returns a partially typed record.
//! - Schema definition problems surface from `build()` or the registry,
//!   never during a load.
//! - Logging goes through `tracing`; the crate never installs a subscriber.

pub mod coerce;
pub mod descriptor;
pub mod errors;
pub mod field;
pub mod mapper;
pub mod options;
pub mod registry;
pub mod schema;
pub mod serialize;
pub mod validators;

pub use marshal_core::{Record, TypedValue};

pub use coerce::Coercer;
pub use descriptor::{
    Constraints, DefaultFactory, FieldDescriptor, SchemaDescriptor, TypeDescriptor,
};
pub use errors::{
    ErrorDetail, FieldError, RegistryError, SchemaDefinitionError, TypeCoercionError,
    ValidationErrors, ValidatorError, ROOT_KEY,
};
pub use field::{DefaultValue, Field, FieldType};
pub use mapper::FromRecord;
pub use options::{CoercionOptions, FloatToInt, SchemaOptions, UnknownPolicy};
pub use registry::SchemaRegistry;
pub use schema::{Schema, SchemaBuilder};
pub use serialize::{DumpOptions, FieldSource};
pub use validators::{FieldValidator, RawValidator, RecordValidator, ValidationContext};
