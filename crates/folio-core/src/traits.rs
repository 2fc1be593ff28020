//! Core traits for folio abstractions.
//!
//! These are the seams to the collaborators the search core relies on but
//! does not implement: statement execution, free-text parsing and generic
//! filter extraction.

use async_trait::async_trait;

use crate::error::Result;
use crate::models::Statement;
use crate::search::{ResolvedFilters, SearchRequest};

/// Executes parameterized statements against storage.
///
/// Implementations must pass `statement.bindings` out-of-band and never
/// interpolate them into the SQL text.
#[async_trait]
pub trait QueryExecutor: Send + Sync {
    /// Execute `statement` and return `column` from every returned row, as text.
    async fn fetch_column(&self, statement: &Statement, column: &str)
        -> Result<Vec<Option<String>>>;
}

/// Translates raw user input into a `to_tsquery` expression.
///
/// Pure and deterministic for a given input and configuration.
pub trait TermParser: Send + Sync {
    fn parse(&self, raw: &str) -> String;
}

/// Generic filter/sort/paging extraction, unrelated to text search.
pub trait FilterResolver: Send + Sync {
    /// Compute the base WHERE clause, numbering placeholders from `$1`.
    fn resolve(&self, request: &SearchRequest) -> Result<ResolvedFilters>;
}
