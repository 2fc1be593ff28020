//! # folio-search
//!
//! Text search for folio entities.
//!
//! This crate provides:
//! - Free-text to `to_tsquery` conversion ([`TsQueryConverter`])
//! - Read augmentation with a text predicate, rank column and rank ordering
//!   ([`QueryRewriter`])
//! - Environment-driven search settings
//! - A service that keeps search vectors current on every write
//!
//! ## Example
//!
//! ```ignore
//! use folio_search::{SearchableService, SearchRequest, SearchSettings};
//! use folio_db::{Database, test_fixtures::books_schema};
//!
//! let db = Database::connect("postgres://...").await?;
//! let books = SearchableService::new(books_schema(), db.shared_executor(), &SearchSettings::from_env()?);
//!
//! let hits = books
//!     .find(&SearchRequest::new().with_term("dune -messiah").with_limit(10))
//!     .await?;
//! ```

pub mod rewriter;
pub mod service;
pub mod settings;
pub mod tsquery;

// Re-export core types
pub use folio_core::*;

pub use rewriter::QueryRewriter;
pub use service::{ReindexReport, SearchableService};
pub use settings::{validate_rank_normalization, SearchSettings, MAX_RANK_NORMALIZATION};
pub use tsquery::{ConversionOptions, TsQueryConverter, MAX_GROUP_DEPTH};
