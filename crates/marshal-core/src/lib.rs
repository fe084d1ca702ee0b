//! # marshal-core — Foundational Types for the marshal Stack
//!
//! This crate defines the value model shared by every other crate in the
//! workspace. It depends on nothing internal.
//!
//! ## Key Design Principles
//!
//! 1. **Raw input is `serde_json::Value`.** Untyped records arrive as JSON
//!    objects. Nothing in this crate guesses at a target type; that is the
//!    job of the coercer in `marshal-schema`.
//!
//! 2. **Typed output is `TypedValue`.** Once a value has been coerced it is
//!    carried as a closed enum with one variant per supported type, so
//!    every consumer matches exhaustively.
//!
//! 3. **`Record` preserves declaration order.** Loaded records iterate in
//!    schema field order, which keeps dumps stable and readable.
//!
//! 4. **Temporal parsing lives here.** Datetimes, dates, times, and ISO 8601
//!    durations share one parser set, used both for loading and for the
//!    canonical output encoding.
//!
//! ## Crate Policy
//!
//! - No dependencies on other `marshal-*` crates (this is the leaf of the DAG).
//! - No `unsafe` code.
//! - No `panic!()` or `.unwrap()` outside tests.

pub mod error;
pub mod record;
pub mod temporal;
pub mod value;

// Re-export primary types for ergonomic imports.
pub use error::CoercionError;
pub use record::Record;
pub use value::{json_type_name, TypedValue};
