//! Weighted search vector maintenance.
//!
//! After every successful write the record's vector is recomputed from the
//! weighted fields of its schema and stored with a single statement:
//!
//! ```sql
//! UPDATE "books" SET "search_vector" = (
//!     setweight(COALESCE(to_tsvector($1::text), ''::tsvector), 'A') ||
//!     setweight(COALESCE(to_tsvector($2::text), ''::tsvector), 'C')
//! ) WHERE "id" = 42 RETURNING "search_vector"::text AS "search_vector"
//! ```
//!
//! Field values are always bound. Only schema identifiers and the
//! storage-generated [`RecordId`] appear in the SQL text.
//!
//! Vector maintenance is best effort: the primary write has already
//! committed, so a failure here is logged and reported as
//! [`VectorOutcome::Skipped`], never as an error.

use std::sync::Arc;
use std::time::Instant;

use serde_json::{Map, Value as JsonValue};
use tracing::{debug, error};

use folio_core::{
    quote_ident, EntitySchema, QueryExecutor, QueryParam, RecordId, SearchVector, SkipReason,
    Statement, VectorOutcome,
};

/// Builds and persists the weighted search vector for one entity type.
#[derive(Debug, Clone)]
pub struct VectorBuilder {
    schema: Arc<EntitySchema>,
}

impl VectorBuilder {
    pub fn new(schema: Arc<EntitySchema>) -> Self {
        Self { schema }
    }

    pub fn schema(&self) -> &EntitySchema {
        &self.schema
    }

    /// Weighted field names in declaration order.
    pub fn field_list(&self) -> Vec<&str> {
        self.schema.weighted_fields().map(|(name, _)| name).collect()
    }

    /// The merged `setweight(...) || ...` expression, `None` without weighted fields.
    pub fn merged_expression(&self) -> Option<String> {
        let parts: Vec<String> = self
            .schema
            .weighted_fields()
            .enumerate()
            .map(|(idx, (_, weight))| {
                let vectorized = self
                    .schema
                    .ts_call("to_tsvector", &format!("${}::text", idx + 1));
                format!(
                    "setweight(COALESCE({}, ''::tsvector), '{}')",
                    vectorized, weight
                )
            })
            .collect();

        if parts.is_empty() {
            None
        } else {
            Some(parts.join(" || "))
        }
    }

    /// The update statement for `record_id` with values bound in field-list order.
    pub fn statement(
        &self,
        record_id: RecordId,
        values: &Map<String, JsonValue>,
    ) -> Option<Statement> {
        let expression = self.merged_expression()?;
        let column = quote_ident(self.schema.search_column());
        let sql = format!(
            "UPDATE {} SET {} = ({}) WHERE {} = {} RETURNING {}::text AS {}",
            self.schema.quoted_table(),
            column,
            expression,
            quote_ident(self.schema.primary_key()),
            record_id.sql_literal(),
            column,
            column,
        );
        let bindings = self
            .field_list()
            .into_iter()
            .map(|field| text_param(values.get(field)))
            .collect();

        let statement = Statement::new(sql, bindings);
        debug_assert!(
            statement.bindings_match(),
            "vector statement binds {} values for {} placeholders",
            statement.bindings.len(),
            statement.placeholder_count()
        );
        Some(statement)
    }

    /// Recompute and store the vector for `record_id` from `values`.
    pub async fn build_and_persist(
        &self,
        record_id: RecordId,
        values: &Map<String, JsonValue>,
        executor: &dyn QueryExecutor,
    ) -> VectorOutcome {
        let Some(statement) = self.statement(record_id, values) else {
            debug!(
                subsystem = "db",
                component = "vector_builder",
                table = self.schema.table(),
                "No weighted fields, vector update skipped"
            );
            return VectorOutcome::Skipped(SkipReason::NoWeightedFields);
        };

        let start = Instant::now();
        let field_count = statement.bindings.len();
        match executor
            .fetch_column(&statement, self.schema.search_column())
            .await
        {
            Ok(rows) => match rows.into_iter().next() {
                Some(value) => {
                    debug!(
                        subsystem = "db",
                        component = "vector_builder",
                        op = "persist",
                        table = self.schema.table(),
                        record_id = %record_id,
                        field_count,
                        duration_ms = start.elapsed().as_millis() as u64,
                        "Search vector updated"
                    );
                    VectorOutcome::Updated(SearchVector(value.unwrap_or_default()))
                }
                None => {
                    debug!(
                        subsystem = "db",
                        component = "vector_builder",
                        op = "persist",
                        table = self.schema.table(),
                        record_id = %record_id,
                        "Vector update matched no row"
                    );
                    VectorOutcome::Skipped(SkipReason::NoRowReturned)
                }
            },
            Err(e) => {
                error!(
                    subsystem = "db",
                    component = "vector_builder",
                    op = "persist",
                    table = self.schema.table(),
                    record_id = %record_id,
                    field_count,
                    sql = %statement.sql,
                    error = %e,
                    "Search vector update failed; write left in place"
                );
                VectorOutcome::Skipped(SkipReason::ExecutionFailed(e.to_string()))
            }
        }
    }

    /// Run [`build_and_persist`](Self::build_and_persist) for a written record
    /// and attach the stored vector to it under the search column name.
    ///
    /// The record is left unchanged unless the vector was updated.
    pub async fn apply(
        &self,
        record: &mut Map<String, JsonValue>,
        executor: &dyn QueryExecutor,
    ) -> VectorOutcome {
        let Some(record_id) = record
            .get(self.schema.primary_key())
            .and_then(RecordId::from_value)
        else {
            debug!(
                subsystem = "db",
                component = "vector_builder",
                table = self.schema.table(),
                "Record has no usable primary key, vector update skipped"
            );
            return VectorOutcome::Skipped(SkipReason::MissingRecordId);
        };

        let outcome = self.build_and_persist(record_id, record, executor).await;
        if let VectorOutcome::Updated(vector) = &outcome {
            record.insert(
                self.schema.search_column().to_string(),
                JsonValue::String(vector.as_str().to_string()),
            );
        }
        outcome
    }
}

/// Text form of a field value for `to_tsvector`.
fn text_param(value: Option<&JsonValue>) -> QueryParam {
    match value {
        None | Some(JsonValue::Null) => QueryParam::Null,
        Some(JsonValue::String(s)) => QueryParam::Text(s.clone()),
        Some(JsonValue::Array(items)) => QueryParam::Text(
            items
                .iter()
                .filter_map(|item| match item {
                    JsonValue::String(s) => Some(s.clone()),
                    JsonValue::Null => None,
                    other => Some(other.to_string()),
                })
                .collect::<Vec<_>>()
                .join(" "),
        ),
        Some(other) => QueryParam::Text(other.to_string()),
    }
}
