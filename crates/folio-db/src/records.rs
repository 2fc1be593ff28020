//! Record persistence for schema-described entities.
//!
//! Thin CRUD over a [`QueryExecutor`]: every write returns the stored row as
//! a JSON object, which is what the vector builder consumes afterwards. Only
//! declared schema fields are written; other keys in the input are ignored.

use std::sync::Arc;

use serde_json::{Map, Value as JsonValue};
use tracing::debug;

use folio_core::{
    quote_ident, EntitySchema, Error, QueryExecutor, QueryParam, RecordId, Result, Statement,
};

use crate::filter::value_to_param;
use crate::select::RECORD_COLUMN;

/// A JSON object representing one stored row.
pub type Record = Map<String, JsonValue>;

/// CRUD for one entity type.
#[derive(Clone)]
pub struct PgRecordStore {
    schema: Arc<EntitySchema>,
    executor: Arc<dyn QueryExecutor>,
}

impl PgRecordStore {
    pub fn new(schema: Arc<EntitySchema>, executor: Arc<dyn QueryExecutor>) -> Self {
        Self { schema, executor }
    }

    pub fn schema(&self) -> &EntitySchema {
        &self.schema
    }

    pub fn executor(&self) -> &dyn QueryExecutor {
        self.executor.as_ref()
    }

    fn returning(&self) -> String {
        format!(
            "RETURNING (to_jsonb({}))::text AS \"{}\"",
            self.schema.quoted_table(),
            RECORD_COLUMN
        )
    }

    /// Declared fields present in `values`, with their typed params.
    fn assignments(&self, values: &Record, all_fields: bool) -> Result<Vec<(String, String, QueryParam)>> {
        let mut out = Vec::new();
        for field in self.schema.fields() {
            let value = match values.get(&field.name) {
                Some(v) => v,
                None if all_fields => &JsonValue::Null,
                None => continue,
            };
            let position = out.len() + 1;
            out.push((
                quote_ident(&field.name),
                field.kind.placeholder(position),
                value_to_param(&field.name, field.kind, value)?,
            ));
        }
        Ok(out)
    }

    fn id_placeholder(&self, position: usize) -> String {
        self.schema.primary_key_kind().placeholder(position)
    }

    /// Insert a record and return the stored row.
    pub async fn insert(&self, values: &Record) -> Result<Record> {
        let assignments = self.assignments(values, false)?;
        let sql = if assignments.is_empty() {
            format!(
                "INSERT INTO {} DEFAULT VALUES {}",
                self.schema.quoted_table(),
                self.returning()
            )
        } else {
            let columns: Vec<&str> = assignments.iter().map(|(c, _, _)| c.as_str()).collect();
            let placeholders: Vec<&str> = assignments.iter().map(|(_, p, _)| p.as_str()).collect();
            format!(
                "INSERT INTO {} ({}) VALUES ({}) {}",
                self.schema.quoted_table(),
                columns.join(", "),
                placeholders.join(", "),
                self.returning()
            )
        };
        let bindings = assignments.into_iter().map(|(_, _, p)| p).collect();

        self.fetch_one(Statement::new(sql, bindings), None).await
    }

    /// Replace every declared field; fields missing from `values` become NULL.
    pub async fn update(&self, id: RecordId, values: &Record) -> Result<Record> {
        self.write(id, values, true).await
    }

    /// Change only the declared fields present in `values`.
    pub async fn patch(&self, id: RecordId, values: &Record) -> Result<Record> {
        self.write(id, values, false).await
    }

    async fn write(&self, id: RecordId, values: &Record, all_fields: bool) -> Result<Record> {
        let assignments = self.assignments(values, all_fields)?;
        if assignments.is_empty() {
            return self.get(id).await;
        }

        let sets: Vec<String> = assignments
            .iter()
            .map(|(c, p, _)| format!("{} = {}", c, p))
            .collect();
        let mut bindings: Vec<QueryParam> = assignments.into_iter().map(|(_, _, p)| p).collect();
        bindings.push(id.to_param());
        let sql = format!(
            "UPDATE {} SET {} WHERE {} = {} {}",
            self.schema.quoted_table(),
            sets.join(", "),
            quote_ident(self.schema.primary_key()),
            self.id_placeholder(bindings.len()),
            self.returning()
        );

        self.fetch_one(Statement::new(sql, bindings), Some(id)).await
    }

    /// Fetch one record by primary key.
    pub async fn get(&self, id: RecordId) -> Result<Record> {
        let sql = format!(
            "SELECT (to_jsonb({}))::text AS \"{}\" FROM {} WHERE {} = {}",
            self.schema.quoted_table(),
            RECORD_COLUMN,
            self.schema.quoted_table(),
            quote_ident(self.schema.primary_key()),
            self.id_placeholder(1)
        );
        self.fetch_one(Statement::new(sql, vec![id.to_param()]), Some(id))
            .await
    }

    /// Delete one record and return it.
    pub async fn remove(&self, id: RecordId) -> Result<Record> {
        let sql = format!(
            "DELETE FROM {} WHERE {} = {} {}",
            self.schema.quoted_table(),
            quote_ident(self.schema.primary_key()),
            self.id_placeholder(1),
            self.returning()
        );
        self.fetch_one(Statement::new(sql, vec![id.to_param()]), Some(id))
            .await
    }

    /// Every record, in primary key order.
    pub async fn list_all(&self) -> Result<Vec<Record>> {
        let sql = format!(
            "SELECT (to_jsonb({}))::text AS \"{}\" FROM {} ORDER BY {} ASC",
            self.schema.quoted_table(),
            RECORD_COLUMN,
            self.schema.quoted_table(),
            self.schema.qualify(self.schema.primary_key())
        );
        self.fetch_records(&Statement::new(sql, Vec::new())).await
    }

    /// Execute a read rendered by [`crate::select`] and decode its rows.
    pub async fn fetch_records(&self, statement: &Statement) -> Result<Vec<Record>> {
        let rows = self.executor.fetch_column(statement, RECORD_COLUMN).await?;
        debug!(
            subsystem = "db",
            component = "record_store",
            table = self.schema.table(),
            result_count = rows.len(),
            "Records fetched"
        );
        rows.into_iter().flatten().map(|text| decode_record(&text)).collect()
    }

    async fn fetch_one(&self, statement: Statement, id: Option<RecordId>) -> Result<Record> {
        self.fetch_records(&statement)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| {
                Error::NotFound(match id {
                    Some(id) => format!("{}/{}", self.schema.table(), id),
                    None => self.schema.table().to_string(),
                })
            })
    }
}

fn decode_record(text: &str) -> Result<Record> {
    match serde_json::from_str::<JsonValue>(text)? {
        JsonValue::Object(map) => Ok(map),
        other => Err(Error::Serialization(format!(
            "Expected a JSON object row, got {}",
            other
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_fixtures::{books_schema, RecordingExecutor};
    use serde_json::json;

    fn store(executor: Arc<RecordingExecutor>) -> PgRecordStore {
        PgRecordStore::new(books_schema(), executor)
    }

    fn values(v: JsonValue) -> Record {
        v.as_object().cloned().unwrap()
    }

    #[tokio::test]
    async fn test_insert_binds_declared_fields() {
        let executor = Arc::new(
            RecordingExecutor::new().respond([r#"{"id": 1, "title": "Dune", "published": "1965-08-01"}"#]),
        );
        let store = store(executor.clone());

        let record = store
            .insert(&values(json!({
                "title": "Dune",
                "published": "1965-08-01",
                "search_vector": "ignored",
                "unknown": "ignored"
            })))
            .await
            .unwrap();

        assert_eq!(record["id"], json!(1));
        let stmt = &executor.statements()[0];
        assert_eq!(
            stmt.sql,
            "INSERT INTO \"books\" (\"title\", \"published\") VALUES ($1::text, $2::date) RETURNING (to_jsonb(\"books\"))::text AS \"record\""
        );
        assert_eq!(
            stmt.bindings,
            vec![
                QueryParam::Text("Dune".into()),
                QueryParam::Text("1965-08-01".into())
            ]
        );
    }

    #[tokio::test]
    async fn test_update_nulls_missing_fields() {
        let executor = Arc::new(RecordingExecutor::new().respond([r#"{"id": 4}"#]));
        let store = store(executor.clone());

        store
            .update(RecordId::Int(4), &values(json!({ "title": "Emma" })))
            .await
            .unwrap();

        let stmt = &executor.statements()[0];
        assert!(stmt.sql.starts_with("UPDATE \"books\" SET \"title\" = $1::text, \"author\" = $2::text"));
        assert!(stmt.sql.contains("WHERE \"id\" = $6::bigint"));
        assert_eq!(stmt.bindings.len(), 6);
        assert_eq!(stmt.bindings[1], QueryParam::Null);
        assert_eq!(stmt.bindings[5], QueryParam::Int(4));
    }

    #[tokio::test]
    async fn test_patch_only_given_fields() {
        let executor = Arc::new(RecordingExecutor::new().respond([r#"{"id": 4}"#]));
        let store = store(executor.clone());

        store
            .patch(RecordId::Int(4), &values(json!({ "author": "Austen" })))
            .await
            .unwrap();

        let stmt = &executor.statements()[0];
        assert!(stmt.sql.starts_with(
            "UPDATE \"books\" SET \"author\" = $1::text WHERE \"id\" = $2::bigint RETURNING"
        ));
    }

    #[tokio::test]
    async fn test_patch_without_fields_reads_record() {
        let executor = Arc::new(RecordingExecutor::new().respond([r#"{"id": 4}"#]));
        let store = store(executor.clone());

        store.patch(RecordId::Int(4), &Record::new()).await.unwrap();

        assert!(executor.statements()[0].sql.starts_with("SELECT"));
    }

    #[tokio::test]
    async fn test_missing_record_is_not_found() {
        let executor = Arc::new(RecordingExecutor::new());
        let store = store(executor);

        match store.get(RecordId::Int(99)).await {
            Err(Error::NotFound(msg)) => assert_eq!(msg, "books/99"),
            other => panic!("expected not found, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_storage_error_propagates_from_writes() {
        let executor = Arc::new(RecordingExecutor::new().fail("duplicate key"));
        let store = store(executor);

        let result = store.insert(&values(json!({ "title": "Dune" }))).await;
        assert!(matches!(result, Err(Error::Database(_))));
    }

    #[tokio::test]
    async fn test_invalid_row_json() {
        let executor = Arc::new(RecordingExecutor::new().respond(["[1, 2]"]));
        let store = store(executor);

        let result = store.list_all().await;
        assert!(matches!(result, Err(Error::Serialization(_))));
    }
}
