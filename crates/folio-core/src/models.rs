//! Statement, bind parameter, and vector outcome types shared by all crates.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use uuid::Uuid;

/// Type-safe positional bind value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum QueryParam {
    /// SQL NULL (bound as nullable text).
    Null,
    /// Text parameter.
    Text(String),
    /// Array of strings (for `= ANY($n)` filters).
    TextArray(Vec<String>),
    /// Integer parameter.
    Int(i64),
    /// Floating point parameter.
    Float(f64),
    /// Boolean parameter.
    Bool(bool),
    /// UUID parameter.
    Uuid(Uuid),
}

/// A parameterized SQL statement and its bindings, in placeholder order.
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub sql: String,
    pub bindings: Vec<QueryParam>,
}

impl Statement {
    pub fn new(sql: impl Into<String>, bindings: Vec<QueryParam>) -> Self {
        Self {
            sql: sql.into(),
            bindings,
        }
    }

    /// Highest `$n` placeholder referenced by the SQL text.
    ///
    /// Placeholders may repeat (`$3` in both predicate and rank), so this is
    /// the number of distinct positions, which must equal `bindings.len()`.
    pub fn placeholder_count(&self) -> usize {
        let bytes = self.sql.as_bytes();
        let mut max = 0;
        let mut i = 0;
        while i < bytes.len() {
            if bytes[i] == b'$' {
                let start = i + 1;
                let mut end = start;
                while end < bytes.len() && bytes[end].is_ascii_digit() {
                    end += 1;
                }
                if end > start {
                    if let Ok(n) = self.sql[start..end].parse::<usize>() {
                        max = max.max(n);
                    }
                }
                i = end.max(start);
            } else {
                i += 1;
            }
        }
        max
    }

    /// True when every placeholder has exactly one binding.
    pub fn bindings_match(&self) -> bool {
        self.placeholder_count() == self.bindings.len()
    }
}

/// Storage-generated record identifier.
///
/// These are the only values ever written into statement text; both forms
/// render from parsed values, never from caller-supplied strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RecordId {
    Int(i64),
    Uuid(Uuid),
}

impl RecordId {
    /// Extract an identifier from a record's primary key value.
    ///
    /// Accepts JSON integers, UUID strings and strings holding an integer.
    pub fn from_value(value: &JsonValue) -> Option<Self> {
        match value {
            JsonValue::Number(n) => n.as_i64().map(RecordId::Int),
            JsonValue::String(s) => s
                .parse::<i64>()
                .map(RecordId::Int)
                .ok()
                .or_else(|| Uuid::parse_str(s).ok().map(RecordId::Uuid)),
            _ => None,
        }
    }

    /// SQL literal form, e.g. `42` or `'…'::uuid`.
    pub fn sql_literal(&self) -> String {
        match self {
            RecordId::Int(id) => id.to_string(),
            RecordId::Uuid(id) => format!("'{}'::uuid", id),
        }
    }

    /// The identifier as a bind parameter.
    pub fn to_param(&self) -> QueryParam {
        match self {
            RecordId::Int(id) => QueryParam::Int(*id),
            RecordId::Uuid(id) => QueryParam::Uuid(*id),
        }
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordId::Int(id) => write!(f, "{}", id),
            RecordId::Uuid(id) => write!(f, "{}", id),
        }
    }
}

impl From<i64> for RecordId {
    fn from(id: i64) -> Self {
        RecordId::Int(id)
    }
}

impl From<Uuid> for RecordId {
    fn from(id: Uuid) -> Self {
        RecordId::Uuid(id)
    }
}

/// Stored text-search vector, in PostgreSQL's `tsvector` text form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SearchVector(pub String);

impl SearchVector {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Why a vector update did not happen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// The schema declares no weighted fields; nothing to build.
    NoWeightedFields,
    /// The record has no integer or UUID primary key.
    MissingRecordId,
    /// The update matched no row (record deleted in between).
    NoRowReturned,
    /// Storage rejected or timed out the statement; detail is logged.
    ExecutionFailed(String),
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::NoWeightedFields => f.write_str("no weighted fields"),
            SkipReason::MissingRecordId => f.write_str("missing record id"),
            SkipReason::NoRowReturned => f.write_str("no row returned"),
            SkipReason::ExecutionFailed(e) => write!(f, "execution failed: {}", e),
        }
    }
}

/// Result of a best-effort vector build. Never an error: the triggering
/// write has already committed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VectorOutcome {
    Updated(SearchVector),
    Skipped(SkipReason),
}

impl VectorOutcome {
    pub fn is_updated(&self) -> bool {
        matches!(self, VectorOutcome::Updated(_))
    }

    pub fn vector(&self) -> Option<&SearchVector> {
        match self {
            VectorOutcome::Updated(v) => Some(v),
            VectorOutcome::Skipped(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_placeholder_count_simple() {
        let stmt = Statement::new(
            "UPDATE t SET v = (f($1) || f($2)) WHERE id = 7",
            vec![QueryParam::Text("a".into()), QueryParam::Text("b".into())],
        );
        assert_eq!(stmt.placeholder_count(), 2);
        assert!(stmt.bindings_match());
    }

    #[test]
    fn test_placeholder_count_repeated_and_multi_digit() {
        let stmt = Statement::new("a = $10 AND b @@ $12 AND c = $12", vec![]);
        assert_eq!(stmt.placeholder_count(), 12);
        assert!(!stmt.bindings_match());
    }

    #[test]
    fn test_placeholder_count_ignores_bare_dollar() {
        let stmt = Statement::new("SELECT '$' || $1", vec![QueryParam::Int(1)]);
        assert_eq!(stmt.placeholder_count(), 1);
    }

    #[test]
    fn test_record_id_from_value() {
        assert_eq!(RecordId::from_value(&json!(42)), Some(RecordId::Int(42)));
        assert_eq!(RecordId::from_value(&json!("17")), Some(RecordId::Int(17)));

        let id = Uuid::new_v4();
        assert_eq!(
            RecordId::from_value(&json!(id.to_string())),
            Some(RecordId::Uuid(id))
        );
    }

    #[test]
    fn test_record_id_rejects_free_text() {
        assert_eq!(RecordId::from_value(&json!("1; DROP TABLE books")), None);
        assert_eq!(RecordId::from_value(&json!(1.5)), None);
        assert_eq!(RecordId::from_value(&json!(null)), None);
    }

    #[test]
    fn test_record_id_sql_literal() {
        assert_eq!(RecordId::Int(42).sql_literal(), "42");
        let id = Uuid::nil();
        assert_eq!(
            RecordId::Uuid(id).sql_literal(),
            "'00000000-0000-0000-0000-000000000000'::uuid"
        );
    }

    #[test]
    fn test_vector_outcome_accessors() {
        let updated = VectorOutcome::Updated(SearchVector("'rust':1A".into()));
        assert!(updated.is_updated());
        assert_eq!(updated.vector().unwrap().as_str(), "'rust':1A");

        let skipped = VectorOutcome::Skipped(SkipReason::NoWeightedFields);
        assert!(!skipped.is_updated());
        assert!(skipped.vector().is_none());
    }
}
