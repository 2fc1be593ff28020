//! Structured logging schema and field name constants for folio.
//!
//! All crates use these constants for consistent structured logging fields,
//! so log aggregation can query by the same names across every subsystem.
//!
//! ## Log Level Contract
//!
//! | Level | Usage |
//! |-------|-------|
//! | ERROR | Degraded service, requires operator attention (vector write failed) |
//! | WARN  | Recoverable issue, automatic fallback applied |
//! | INFO  | Lifecycle events (startup, migrations, reindex completion) |
//! | DEBUG | Decision points (rewrite applied or skipped, vector skipped) |
//! | TRACE | Statement text, per-row iteration |

// ─── Identity fields ───────────────────────────────────────────────────────

/// Subsystem originating the log event.
/// Values: "db", "search", "cli"
pub const SUBSYSTEM: &str = "subsystem";

/// Component within a subsystem.
/// Examples: "vector_builder", "query_rewriter", "pool", "record_store"
pub const COMPONENT: &str = "component";

/// Logical operation name.
/// Examples: "persist", "augment", "find", "reindex"
pub const OPERATION: &str = "op";

// ─── Entity fields ─────────────────────────────────────────────────────────

/// Primary key of the record being written.
pub const RECORD_ID: &str = "record_id";

/// Table the statement targets.
pub const TABLE: &str = "table";

/// Raw search term as received.
pub const QUERY: &str = "query";

// ─── Measurement fields ────────────────────────────────────────────────────

/// Wall-clock duration in milliseconds.
pub const DURATION_MS: &str = "duration_ms";

/// Number of rows returned by a query.
pub const RESULT_COUNT: &str = "result_count";

/// Number of weighted fields merged into a vector.
pub const FIELD_COUNT: &str = "field_count";

/// Number of positional bind parameters in a statement.
pub const BIND_COUNT: &str = "bind_count";
