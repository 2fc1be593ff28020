//! Search-aware read augmentation.
//!
//! Before a read is dispatched, [`QueryRewriter::augment`] turns a request
//! carrying a free-text term into a [`QueryAugmentation`]: the text-match
//! predicate ANDed onto the caller's own filters, a computed `rank` column
//! and a default `rank DESC` order when the caller asked for neither.
//!
//! Requests without a term are left entirely to ordinary filter handling.

use std::sync::Arc;

use tracing::debug;

use folio_core::{
    AugmentedSelection, EntitySchema, FilterResolver, OrderTerm, QueryAugmentation, QueryParam,
    RankColumn, Result, SearchRequest, SelectItem, SortDirection, SortKey, TermParser,
    RANK_ALIAS,
};

use crate::settings::{validate_rank_normalization, SearchSettings};
use crate::tsquery::TsQueryConverter;

/// Rewrites reads of one entity type. Holds no per-request state.
#[derive(Clone)]
pub struct QueryRewriter {
    schema: Arc<EntitySchema>,
    parser: Arc<dyn TermParser>,
    rank_normalization: Option<u32>,
}

impl QueryRewriter {
    /// Rewriter using [`TsQueryConverter`] configured from `settings`.
    pub fn new(schema: Arc<EntitySchema>, settings: &SearchSettings) -> Self {
        Self {
            schema,
            parser: Arc::new(TsQueryConverter::new(settings.conversion)),
            rank_normalization: settings.rank_normalization,
        }
    }

    /// Rewriter with a custom term parser.
    pub fn with_parser(schema: Arc<EntitySchema>, parser: Arc<dyn TermParser>) -> Self {
        Self {
            schema,
            parser,
            rank_normalization: None,
        }
    }

    /// Set the `ts_rank` normalization mask; masks above 63 are rejected.
    pub fn rank_normalization(mut self, mask: Option<u32>) -> Result<Self> {
        self.rank_normalization = mask.map(validate_rank_normalization).transpose()?;
        Ok(self)
    }

    pub fn schema(&self) -> &EntitySchema {
        &self.schema
    }

    /// Augment `request` with text search, or `None` when it has no term.
    ///
    /// `request` is not modified; the resolver sees a copy without the term.
    pub fn augment(
        &self,
        request: &SearchRequest,
        resolver: &dyn FilterResolver,
    ) -> Result<Option<QueryAugmentation>> {
        let Some(term) = request.search_term() else {
            debug!(
                subsystem = "search",
                component = "query_rewriter",
                table = self.schema.table(),
                "No search term, read left unaugmented"
            );
            return Ok(None);
        };

        let base = resolver.resolve(&request.without_term())?;
        let parsed = self.parser.parse(term);

        let position = base.params.len() + 1;
        let tsquery = self
            .schema
            .ts_call("to_tsquery", &format!("${}", position));
        let vector_column = self.schema.qualify(self.schema.search_column());
        let predicate = format!("{} @@ {}", vector_column, tsquery);
        let where_clause = if base.has_base_filter() {
            format!("({}) AND {}", base.where_clause, predicate)
        } else {
            predicate.clone()
        };

        let mut bindings = base.params;
        bindings.push(QueryParam::Text(parsed.clone()));

        // An empty list means "no explicit selection", same as absent.
        let explicit = base.selection.filter(|cols| !cols.is_empty());
        let ranked = explicit
            .as_ref()
            .map_or(true, |cols| cols.iter().any(|c| c == RANK_ALIAS));
        let caller_sort = base.sort.filter(|keys| !keys.is_empty());

        let (rank, sort, selection) = if ranked {
            let rank = RankColumn {
                expression: self.rank_expression(&vector_column, &tsquery),
                alias: RANK_ALIAS.to_string(),
            };
            let sort = match caller_sort {
                None => vec![OrderTerm::rank(SortDirection::Desc)],
                Some(keys) => keys.into_iter().map(rank_aware_order).collect(),
            };
            let selection = match explicit {
                Some(cols) => AugmentedSelection::Fields(
                    cols.into_iter()
                        .filter(|c| c != RANK_ALIAS)
                        .map(SelectItem::Column)
                        .chain(std::iter::once(SelectItem::Computed(rank.clone())))
                        .collect(),
                ),
                None => AugmentedSelection::IncludeAll {
                    include: vec![SelectItem::Computed(rank.clone())],
                },
            };
            (Some(rank), sort, selection)
        } else {
            let sort = caller_sort
                .unwrap_or_default()
                .into_iter()
                .map(|key| OrderTerm::Column {
                    field: key.field,
                    direction: key.direction,
                })
                .collect();
            let selection = AugmentedSelection::Fields(
                explicit
                    .unwrap_or_default()
                    .into_iter()
                    .map(SelectItem::Column)
                    .collect(),
            );
            (None, sort, selection)
        };

        debug!(
            subsystem = "search",
            component = "query_rewriter",
            table = self.schema.table(),
            query = %parsed,
            ranked = rank.is_some(),
            bind_count = bindings.len(),
            "Read augmented with text search"
        );

        Ok(Some(QueryAugmentation {
            predicate,
            where_clause,
            bindings,
            rank,
            sort,
            selection,
            limit: base.limit,
            offset: base.offset,
        }))
    }

    fn rank_expression(&self, vector_column: &str, tsquery: &str) -> String {
        match self.rank_normalization {
            Some(mask) => format!("ts_rank({}, {}, {})", vector_column, tsquery, mask),
            None => format!("ts_rank({}, {})", vector_column, tsquery),
        }
    }
}

/// `rank` is an output alias, not a table column, so it sorts as a literal.
fn rank_aware_order(key: SortKey) -> OrderTerm {
    if key.field == RANK_ALIAS {
        OrderTerm::rank(key.direction)
    } else {
        OrderTerm::Column {
            field: key.field,
            direction: key.direction,
        }
    }
}
