//! Searchable service against a live PostgreSQL.
//!
//! Run with `cargo test -p folio-search -- --ignored`.

use std::sync::Arc;

use serde_json::{json, Map, Value as JsonValue};
use sqlx::PgPool;
use uuid::Uuid;

use folio_db::test_fixtures::test_database_url;
use folio_db::{create_pool, FieldKind, PgQueryExecutor};
use folio_search::{
    EntitySchema, RecordId, SearchRequest, SearchSettings, SearchableService, SortKey, Weight,
};

async fn setup() -> (PgPool, SearchableService, String) {
    let _ = dotenvy::dotenv();
    let pool = create_pool(&test_database_url())
        .await
        .expect("Failed to create test pool");
    let table = format!("books_svc_{}", Uuid::new_v4().simple());
    sqlx::query(&format!(
        "CREATE TABLE {table} (id BIGSERIAL PRIMARY KEY, title TEXT, author TEXT, \
         description TEXT, published DATE, search_vector TSVECTOR)"
    ))
    .execute(&pool)
    .await
    .expect("Failed to create scratch table");

    let schema = EntitySchema::builder(table.clone())
        .search_column("search_vector")
        .text_search_config("english")
        .weighted("title", Weight::A)
        .weighted("author", Weight::C)
        .weighted("description", Weight::B)
        .plain("published", FieldKind::Date)
        .build()
        .expect("valid schema");
    let service = SearchableService::new(
        Arc::new(schema),
        Arc::new(PgQueryExecutor::new(pool.clone())),
        &SearchSettings::default(),
    );
    (pool, service, table)
}

async fn teardown(pool: &PgPool, table: &str) {
    sqlx::query(&format!("DROP TABLE IF EXISTS {table}"))
        .execute(pool)
        .await
        .expect("Failed to drop scratch table");
}

fn values(v: JsonValue) -> Map<String, JsonValue> {
    v.as_object().cloned().expect("object")
}

#[tokio::test]
#[ignore]
async fn test_write_then_search_ranks_by_weight() {
    let (pool, service, table) = setup().await;

    let created = service
        .create(&values(json!({
            "title": "Whales of the Pacific",
            "author": "Melville Society",
            "published": "2001-05-01"
        })))
        .await
        .expect("create");
    assert!(created.contains_key("search_vector"));

    service
        .create(&values(json!({
            "title": "Moby Dick",
            "author": "Herman Melville",
            "description": "The hunt for the white whale"
        })))
        .await
        .expect("create");

    let hits = service
        .find(&SearchRequest::new().with_term("whale"))
        .await
        .expect("find");
    assert_eq!(hits.len(), 2);
    assert_eq!(hits[0]["title"], json!("Whales of the Pacific"));
    assert!(hits[0]["rank"].as_f64() >= hits[1]["rank"].as_f64());

    let by_date = service
        .find(
            &SearchRequest::new()
                .with_term("melville")
                .with_sort(vec![SortKey::asc("published")])
                .with_selection(["title", "rank"]),
        )
        .await
        .expect("find");
    assert_eq!(by_date.len(), 2);
    assert!(by_date[0].contains_key("rank"));
    assert!(!by_date[0].contains_key("author"));

    teardown(&pool, &table).await;
}

#[tokio::test]
#[ignore]
async fn test_patch_refreshes_vector_and_reindex_counts() {
    let (pool, service, table) = setup().await;

    let created = service
        .create(&values(json!({"title": "Draft"})))
        .await
        .expect("create");
    let id = RecordId::from_value(&created["id"]).expect("id");

    let patched = service
        .patch(id, &values(json!({"title": "Solaris"})))
        .await
        .expect("patch");
    let vector = patched["search_vector"].as_str().expect("vector");
    assert!(vector.contains("solari"));
    assert!(!vector.contains("draft"));

    let hits = service
        .find(&SearchRequest::new().with_term("draft"))
        .await
        .expect("find");
    assert!(hits.is_empty());

    let report = service.reindex().await.expect("reindex");
    assert_eq!(report.total, 1);
    assert_eq!(report.updated, 1);

    teardown(&pool, &table).await;
}
