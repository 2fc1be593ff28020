//! Search request and query augmentation types.

use std::collections::BTreeMap;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::error::{Error, Result};
use crate::models::QueryParam;

/// Name of the synthesized relevance column. Not a stored field.
pub const RANK_ALIAS: &str = "rank";

/// Sort direction for ORDER BY terms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    Asc,
    Desc,
}

impl SortDirection {
    pub fn as_sql(&self) -> &'static str {
        match self {
            SortDirection::Asc => "ASC",
            SortDirection::Desc => "DESC",
        }
    }
}

impl FromStr for SortDirection {
    type Err = Error;

    /// Accepts `asc`/`desc` (any case) and the numeric `1`/`-1` forms.
    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "asc" | "1" => Ok(SortDirection::Asc),
            "desc" | "-1" => Ok(SortDirection::Desc),
            other => Err(Error::InvalidInput(format!(
                "Invalid sort direction '{}'",
                other
            ))),
        }
    }
}

/// One caller-specified sort entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortKey {
    pub field: String,
    pub direction: SortDirection,
}

impl SortKey {
    pub fn new(field: impl Into<String>, direction: SortDirection) -> Self {
        Self {
            field: field.into(),
            direction,
        }
    }

    pub fn asc(field: impl Into<String>) -> Self {
        Self::new(field, SortDirection::Asc)
    }

    pub fn desc(field: impl Into<String>) -> Self {
        Self::new(field, SortDirection::Desc)
    }
}

impl FromStr for SortKey {
    type Err = Error;

    /// Parses `field` or `field:direction`, e.g. `published:asc`.
    fn from_str(s: &str) -> Result<Self> {
        match s.split_once(':') {
            Some((field, direction)) => Ok(SortKey::new(field.trim(), direction.trim().parse()?)),
            None => Ok(SortKey::asc(s.trim())),
        }
    }
}

/// An incoming read: optional free-text term plus the caller's ordinary
/// filter, sort, selection and paging state.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchRequest {
    /// Free-text search term.
    pub term: Option<String>,
    /// Field filters, keyed by column name.
    #[serde(default)]
    pub filters: BTreeMap<String, JsonValue>,
    /// Explicit sort; `None` means the caller did not ask for one.
    pub sort: Option<Vec<SortKey>>,
    /// Explicit output columns; `None` means all columns.
    pub selection: Option<Vec<String>>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

impl SearchRequest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_term(mut self, term: impl Into<String>) -> Self {
        self.term = Some(term.into());
        self
    }

    pub fn with_filter(mut self, field: impl Into<String>, value: JsonValue) -> Self {
        self.filters.insert(field.into(), value);
        self
    }

    pub fn with_sort(mut self, sort: Vec<SortKey>) -> Self {
        self.sort = Some(sort);
        self
    }

    pub fn with_selection<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.selection = Some(columns.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_limit(mut self, limit: i64) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn with_offset(mut self, offset: i64) -> Self {
        self.offset = Some(offset);
        self
    }

    /// The trimmed term, or `None` when absent or blank.
    pub fn search_term(&self) -> Option<&str> {
        self.term
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
    }

    /// Copy of this request without the free-text term, so it can be handed
    /// to ordinary filter handling.
    pub fn without_term(&self) -> Self {
        Self {
            term: None,
            ..self.clone()
        }
    }
}

/// Output of the existing-filter collaborator: the caller's base WHERE clause
/// plus sort/selection/paging metadata, untouched by text search.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedFilters {
    /// WHERE fragment without the keyword; `TRUE` when there are no filters.
    pub where_clause: String,
    /// Bindings for `$1..$n` in `where_clause`.
    pub params: Vec<QueryParam>,
    pub sort: Option<Vec<SortKey>>,
    pub selection: Option<Vec<String>>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

impl Default for ResolvedFilters {
    fn default() -> Self {
        Self {
            where_clause: "TRUE".to_string(),
            params: Vec::new(),
            sort: None,
            selection: None,
            limit: None,
            offset: None,
        }
    }
}

impl ResolvedFilters {
    pub fn has_base_filter(&self) -> bool {
        self.where_clause != "TRUE"
    }
}

/// Computed relevance column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RankColumn {
    /// Full SQL expression, e.g. `ts_rank("books"."search_vector", to_tsquery($1))`.
    pub expression: String,
    /// Output alias, always [`RANK_ALIAS`].
    pub alias: String,
}

/// Entry of an augmented select list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SelectItem {
    Column(String),
    Computed(RankColumn),
}

/// Effective selection after augmentation.
///
/// The two shapes mirror the two caller forms: an explicit column list keeps
/// a list (with the rank entry appended), an absent selection becomes
/// "all columns, plus these".
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AugmentedSelection {
    Fields(Vec<SelectItem>),
    IncludeAll { include: Vec<SelectItem> },
}

/// One ORDER BY term.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OrderTerm {
    /// A stored column, rendered table-qualified.
    Column {
        field: String,
        direction: SortDirection,
    },
    /// Literal SQL rendered as-is (the rank alias, which is not a table column).
    Expression { sql: String, direction: SortDirection },
}

impl OrderTerm {
    pub fn rank(direction: SortDirection) -> Self {
        OrderTerm::Expression {
            sql: RANK_ALIAS.to_string(),
            direction,
        }
    }
}

/// Everything a read path needs to merge a text search into its query.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryAugmentation {
    /// Text-match predicate over the vector column alone.
    pub predicate: String,
    /// Caller's base filter AND `predicate`.
    pub where_clause: String,
    /// Base filter params followed by the parsed query.
    pub bindings: Vec<QueryParam>,
    /// Computed rank column, when ranking applies.
    pub rank: Option<RankColumn>,
    pub sort: Vec<OrderTerm>,
    pub selection: AugmentedSelection,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

impl QueryAugmentation {
    pub fn is_ranked(&self) -> bool {
        self.rank.is_some()
    }
}
