//! sqlx-backed [`QueryExecutor`].

use std::time::Instant;

use async_trait::async_trait;
use sqlx::postgres::PgArguments;
use sqlx::query::Query;
use sqlx::{PgPool, Postgres, Row};
use tracing::trace;

use folio_core::{Error, QueryExecutor, QueryParam, Result, Statement};

/// Executes statements on a PostgreSQL pool with positional binds.
#[derive(Clone)]
pub struct PgQueryExecutor {
    pool: PgPool,
}

impl PgQueryExecutor {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

/// Bind every parameter in order. Values never touch the SQL text.
pub fn bind_params<'q>(
    mut query: Query<'q, Postgres, PgArguments>,
    params: &'q [QueryParam],
) -> Query<'q, Postgres, PgArguments> {
    for param in params {
        query = match param {
            QueryParam::Null => query.bind(None::<String>),
            QueryParam::Text(s) => query.bind(s),
            QueryParam::TextArray(values) => query.bind(values),
            QueryParam::Int(v) => query.bind(*v),
            QueryParam::Float(v) => query.bind(*v),
            QueryParam::Bool(v) => query.bind(*v),
            QueryParam::Uuid(id) => query.bind(*id),
        };
    }
    query
}

#[async_trait]
impl QueryExecutor for PgQueryExecutor {
    async fn fetch_column(
        &self,
        statement: &Statement,
        column: &str,
    ) -> Result<Vec<Option<String>>> {
        let start = Instant::now();
        trace!(
            subsystem = "db",
            component = "executor",
            sql = %statement.sql,
            bind_count = statement.bindings.len(),
            "Executing statement"
        );

        let rows = bind_params(sqlx::query(&statement.sql), &statement.bindings)
            .fetch_all(&self.pool)
            .await
            .map_err(Error::Database)?;

        trace!(
            subsystem = "db",
            component = "executor",
            result_count = rows.len(),
            duration_ms = start.elapsed().as_millis() as u64,
            "Statement complete"
        );

        rows.iter()
            .map(|row| {
                row.try_get::<Option<String>, _>(column)
                    .map_err(Error::Database)
            })
            .collect()
    }
}
