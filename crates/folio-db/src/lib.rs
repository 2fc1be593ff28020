//! # folio-db
//!
//! PostgreSQL layer for folio.
//!
//! This crate provides:
//! - Connection pool management
//! - Weighted search vector maintenance ([`VectorBuilder`])
//! - Equality filter resolution for the read path
//! - Read statement rendering for plain and search-augmented reads
//! - Record storage for schema-described entities
//!
//! ## Example
//!
//! ```rust,ignore
//! use folio_db::{Database, VectorBuilder, test_fixtures::books_schema};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let db = Database::connect("postgres://localhost/folio").await?;
//!     let schema = books_schema();
//!     let store = db.store(schema.clone());
//!
//!     let mut book = store.insert(&serde_json::json!({"title": "Dune"})
//!         .as_object().cloned().unwrap()).await?;
//!     VectorBuilder::new(schema).apply(&mut book, db.executor()).await;
//!     Ok(())
//! }
//! ```
pub mod executor;
pub mod filter;
pub mod pool;
pub mod records;
pub mod select;
pub mod vector;

// Test fixtures are always compiled so integration tests and downstream
// crates can share them.
pub mod test_fixtures;

pub use folio_core::*;

pub use executor::{bind_params, PgQueryExecutor};
pub use filter::{value_to_param, EqualityFilterResolver};
pub use pool::{create_pool, create_pool_with_config, log_pool_metrics, PoolConfig};
pub use records::{PgRecordStore, Record};
pub use select::{render_augmented, render_plain, RECORD_COLUMN};
pub use vector::VectorBuilder;

use std::sync::Arc;

/// Combined database handle.
#[derive(Clone)]
pub struct Database {
    /// The underlying connection pool.
    pub pool: sqlx::Pool<sqlx::Postgres>,
    executor: Arc<PgQueryExecutor>,
}

impl Database {
    /// Create a new Database instance from a connection pool.
    pub fn new(pool: sqlx::Pool<sqlx::Postgres>) -> Self {
        Self {
            executor: Arc::new(PgQueryExecutor::new(pool.clone())),
            pool,
        }
    }

    /// Connect to database with default pool configuration.
    pub async fn connect(url: &str) -> Result<Self> {
        let pool = create_pool(url).await?;
        Ok(Self::new(pool))
    }

    /// Create with custom pool configuration.
    pub async fn connect_with_config(url: &str, config: PoolConfig) -> Result<Self> {
        let pool = create_pool_with_config(url, config).await?;
        Ok(Self::new(pool))
    }

    /// Run pending migrations.
    #[cfg(feature = "migrations")]
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("../../migrations")
            .run(&self.pool)
            .await
            .map_err(|e| Error::Database(sqlx::Error::Migrate(Box::new(e))))?;
        Ok(())
    }

    /// Get the underlying connection pool.
    pub fn pool(&self) -> &sqlx::Pool<sqlx::Postgres> {
        &self.pool
    }

    /// The pool-backed statement executor.
    pub fn executor(&self) -> &PgQueryExecutor {
        &self.executor
    }

    /// Shared handle to the executor, for services that own one.
    pub fn shared_executor(&self) -> Arc<dyn QueryExecutor> {
        self.executor.clone()
    }

    /// Record storage for one entity.
    pub fn store(&self, schema: Arc<EntitySchema>) -> PgRecordStore {
        PgRecordStore::new(schema, self.shared_executor())
    }
}
