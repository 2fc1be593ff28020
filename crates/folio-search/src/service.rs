//! Searchable entity service.
//!
//! Wires record storage to search: every create/update/patch is followed by a
//! vector rebuild from the stored row, and every find passes through the
//! query rewriter before it is rendered.

use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, info, warn};

use folio_core::{
    EntitySchema, FilterResolver, QueryExecutor, RecordId, Result, SearchRequest, VectorOutcome,
};
use folio_db::{
    render_augmented, render_plain, EqualityFilterResolver, PgRecordStore, Record, VectorBuilder,
};

use crate::rewriter::QueryRewriter;
use crate::settings::SearchSettings;

/// Counts from a full vector rebuild.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReindexReport {
    pub total: usize,
    pub updated: usize,
    pub skipped: usize,
}

#[derive(Clone)]
pub struct SearchableService {
    store: PgRecordStore,
    vectors: VectorBuilder,
    rewriter: QueryRewriter,
    filters: Arc<dyn FilterResolver>,
}

impl SearchableService {
    /// Service over `executor` with equality filters and settings-driven search.
    pub fn new(
        schema: Arc<EntitySchema>,
        executor: Arc<dyn QueryExecutor>,
        settings: &SearchSettings,
    ) -> Self {
        Self {
            store: PgRecordStore::new(schema.clone(), executor),
            vectors: VectorBuilder::new(schema.clone()),
            rewriter: QueryRewriter::new(schema.clone(), settings),
            filters: Arc::new(EqualityFilterResolver::new(schema)),
        }
    }

    pub fn with_filter_resolver(mut self, filters: Arc<dyn FilterResolver>) -> Self {
        self.filters = filters;
        self
    }

    pub fn with_rewriter(mut self, rewriter: QueryRewriter) -> Self {
        self.rewriter = rewriter;
        self
    }

    pub fn schema(&self) -> &EntitySchema {
        self.store.schema()
    }

    pub async fn create(&self, values: &Record) -> Result<Record> {
        let record = self.store.insert(values).await?;
        Ok(self.index(record).await)
    }

    pub async fn update(&self, id: RecordId, values: &Record) -> Result<Record> {
        let record = self.store.update(id, values).await?;
        Ok(self.index(record).await)
    }

    pub async fn patch(&self, id: RecordId, values: &Record) -> Result<Record> {
        let record = self.store.patch(id, values).await?;
        Ok(self.index(record).await)
    }

    pub async fn get(&self, id: RecordId) -> Result<Record> {
        self.store.get(id).await
    }

    pub async fn remove(&self, id: RecordId) -> Result<Record> {
        self.store.remove(id).await
    }

    /// Run a read, ranked by relevance when the request carries a term.
    pub async fn find(&self, request: &SearchRequest) -> Result<Vec<Record>> {
        let start = Instant::now();
        let schema = self.store.schema();
        let statement = match self.rewriter.augment(request, self.filters.as_ref())? {
            Some(augmentation) => render_augmented(schema, &augmentation)?,
            None => render_plain(schema, &self.filters.resolve(&request.without_term())?)?,
        };

        let records = self.store.fetch_records(&statement).await?;
        debug!(
            subsystem = "search",
            component = "service",
            op = "find",
            table = schema.table(),
            result_count = records.len(),
            duration_ms = start.elapsed().as_millis() as u64,
            "Find complete"
        );
        Ok(records)
    }

    /// Recompute the vector of every stored record.
    ///
    /// Individual failures are counted, not returned; only failing to list
    /// the records is an error.
    pub async fn reindex(&self) -> Result<ReindexReport> {
        let start = Instant::now();
        let records = self.store.list_all().await?;
        let mut report = ReindexReport {
            total: records.len(),
            ..Default::default()
        };

        for mut record in records {
            match self.vectors.apply(&mut record, self.store.executor()).await {
                VectorOutcome::Updated(_) => report.updated += 1,
                VectorOutcome::Skipped(_) => report.skipped += 1,
            }
        }

        if report.skipped > 0 {
            warn!(
                subsystem = "search",
                component = "service",
                op = "reindex",
                table = self.schema().table(),
                skipped = report.skipped,
                "Some search vectors were not rebuilt"
            );
        }
        info!(
            subsystem = "search",
            component = "service",
            op = "reindex",
            table = self.schema().table(),
            result_count = report.total,
            updated = report.updated,
            duration_ms = start.elapsed().as_millis() as u64,
            "Reindex complete"
        );
        Ok(report)
    }

    async fn index(&self, mut record: Record) -> Record {
        self.vectors.apply(&mut record, self.store.executor()).await;
        record
    }
}
