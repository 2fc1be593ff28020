//! # folio-core
//!
//! Core types, traits, and abstractions for folio weighted full-text search.
//!
//! This crate provides the entity schema (which fields feed the search vector
//! and with which weight), the request/augmentation types exchanged between
//! the read path and the query rewriter, and the collaborator traits the
//! database and search crates implement.

pub mod error;
pub mod logging;
pub mod models;
pub mod schema;
pub mod search;
pub mod traits;

// Re-export commonly used types at crate root
pub use error::{Error, Result};
pub use models::*;
pub use schema::{
    quote_ident, validate_identifier, EntitySchema, EntitySchemaBuilder, FieldDefinition,
    FieldKind, FieldSpec, SchemaDefinition, Weight,
};
pub use search::*;
pub use traits::*;
