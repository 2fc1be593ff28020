//! Read statement rendering.
//!
//! A read is either plain (resolved filters only) or augmented by the query
//! rewriter. Both render to one statement returning each row as JSON text in
//! a `record` column, plus a `rank` column when results are ranked:
//!
//! ```sql
//! SELECT (to_jsonb("books") || jsonb_build_object('rank', ts_rank(...)))::text AS "record",
//!        ts_rank(...) AS rank
//! FROM "books"
//! WHERE ("books"."author" = $1::text) AND "books"."search_vector" @@ to_tsquery($2)
//! ORDER BY rank DESC
//! LIMIT $3::bigint
//! ```
//!
//! The `rank` output column exists so that ORDER BY can name the alias; the
//! same value is embedded in the record JSON for callers.

use folio_core::{
    AugmentedSelection, EntitySchema, Error, OrderTerm, QueryAugmentation, QueryParam,
    RankColumn, ResolvedFilters, Result, SelectItem, SortKey, Statement, RANK_ALIAS,
};

/// Column carrying each row's JSON text.
pub const RECORD_COLUMN: &str = "record";

/// Render a read without text search.
///
/// Without a term there is no relevance, so `rank` is dropped from the
/// selection and the sort.
pub fn render_plain(schema: &EntitySchema, resolved: &ResolvedFilters) -> Result<Statement> {
    let columns: Option<Vec<&str>> = resolved.selection.as_ref().map(|cols| {
        cols.iter()
            .map(String::as_str)
            .filter(|c| *c != RANK_ALIAS)
            .collect()
    });
    let record = match columns {
        Some(cols) if !cols.is_empty() => {
            let items: Vec<SelectItem> = cols
                .into_iter()
                .map(|c| SelectItem::Column(c.to_string()))
                .collect();
            build_object(schema, &items)?
        }
        _ => whole_row(schema),
    };

    let order = resolved
        .sort
        .iter()
        .flatten()
        .filter(|key| key.field != RANK_ALIAS)
        .map(|key| column_order(schema, key))
        .collect::<Result<Vec<_>>>()?;

    Ok(assemble(
        schema,
        &record,
        None,
        &resolved.where_clause,
        resolved.params.clone(),
        &order,
        resolved.limit,
        resolved.offset,
    ))
}

/// Render a read augmented with a text-search predicate and optional rank.
pub fn render_augmented(
    schema: &EntitySchema,
    augmentation: &QueryAugmentation,
) -> Result<Statement> {
    let record = match &augmentation.selection {
        AugmentedSelection::IncludeAll { include } if include.is_empty() => whole_row(schema),
        AugmentedSelection::IncludeAll { include } => {
            format!("{} || {}", whole_row(schema), build_object(schema, include)?)
        }
        AugmentedSelection::Fields(items) if items.is_empty() => whole_row(schema),
        AugmentedSelection::Fields(items) => build_object(schema, items)?,
    };

    let order = augmentation
        .sort
        .iter()
        .map(|term| match term {
            OrderTerm::Column { field, direction } => {
                column_order(schema, &SortKey::new(field.clone(), *direction))
            }
            OrderTerm::Expression { sql, direction } => {
                Ok(format!("{} {}", sql, direction.as_sql()))
            }
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(assemble(
        schema,
        &record,
        augmentation.rank.as_ref(),
        &augmentation.where_clause,
        augmentation.bindings.clone(),
        &order,
        augmentation.limit,
        augmentation.offset,
    ))
}

#[allow(clippy::too_many_arguments)]
fn assemble(
    schema: &EntitySchema,
    record: &str,
    rank: Option<&RankColumn>,
    where_clause: &str,
    mut bindings: Vec<QueryParam>,
    order: &[String],
    limit: Option<i64>,
    offset: Option<i64>,
) -> Statement {
    let mut sql = format!("SELECT ({})::text AS \"{}\"", record, RECORD_COLUMN);
    if let Some(rank) = rank {
        sql.push_str(&format!(", {} AS {}", rank.expression, rank.alias));
    }
    sql.push_str(&format!(
        " FROM {} WHERE {}",
        schema.quoted_table(),
        where_clause
    ));
    if !order.is_empty() {
        sql.push_str(&format!(" ORDER BY {}", order.join(", ")));
    }
    if let Some(limit) = limit {
        bindings.push(QueryParam::Int(limit));
        sql.push_str(&format!(" LIMIT ${}::bigint", bindings.len()));
    }
    if let Some(offset) = offset {
        bindings.push(QueryParam::Int(offset));
        sql.push_str(&format!(" OFFSET ${}::bigint", bindings.len()));
    }

    let statement = Statement::new(sql, bindings);
    debug_assert!(
        statement.bindings_match(),
        "read statement binds {} values for {} placeholders",
        statement.bindings.len(),
        statement.placeholder_count()
    );
    statement
}

fn whole_row(schema: &EntitySchema) -> String {
    format!("to_jsonb({})", schema.quoted_table())
}

fn build_object(schema: &EntitySchema, items: &[SelectItem]) -> Result<String> {
    let pairs = items
        .iter()
        .map(|item| match item {
            SelectItem::Column(name) => {
                ensure_selectable(schema, name)?;
                Ok(format!("'{}', {}", name, schema.qualify(name)))
            }
            SelectItem::Computed(rank) => Ok(format!("'{}', {}", rank.alias, rank.expression)),
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(format!("jsonb_build_object({})", pairs.join(", ")))
}

fn column_order(schema: &EntitySchema, key: &SortKey) -> Result<String> {
    ensure_selectable(schema, &key.field)?;
    Ok(format!(
        "{} {}",
        schema.qualify(&key.field),
        key.direction.as_sql()
    ))
}

fn ensure_selectable(schema: &EntitySchema, column: &str) -> Result<()> {
    if schema.is_selectable(column) {
        Ok(())
    } else {
        Err(Error::InvalidInput(format!(
            "Unknown column '{}' for '{}'",
            column,
            schema.table()
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_fixtures::books_schema;
    use folio_core::SortDirection;

    fn rank_column() -> RankColumn {
        RankColumn {
            expression: "ts_rank(\"books\".\"search_vector\", to_tsquery($1))".to_string(),
            alias: RANK_ALIAS.to_string(),
        }
    }

    fn augmentation(selection: AugmentedSelection, sort: Vec<OrderTerm>) -> QueryAugmentation {
        QueryAugmentation {
            predicate: "\"books\".\"search_vector\" @@ to_tsquery($1)".to_string(),
            where_clause: "\"books\".\"search_vector\" @@ to_tsquery($1)".to_string(),
            bindings: vec![QueryParam::Text("rust".into())],
            rank: Some(rank_column()),
            sort,
            selection,
            limit: Some(10),
            offset: None,
        }
    }

    #[test]
    fn test_plain_select_all() {
        let schema = books_schema();
        let stmt = render_plain(&schema, &ResolvedFilters::default()).unwrap();
        assert_eq!(
            stmt.sql,
            "SELECT (to_jsonb(\"books\"))::text AS \"record\" FROM \"books\" WHERE TRUE"
        );
        assert!(stmt.bindings.is_empty());
    }

    #[test]
    fn test_plain_select_with_fields_sort_and_paging() {
        let schema = books_schema();
        let resolved = ResolvedFilters {
            where_clause: "\"books\".\"author\" = $1::text".to_string(),
            params: vec![QueryParam::Text("X".into())],
            sort: Some(vec![SortKey::desc("published")]),
            selection: Some(vec!["title".into(), "rank".into()]),
            limit: Some(5),
            offset: Some(10),
        };
        let stmt = render_plain(&schema, &resolved).unwrap();
        assert_eq!(
            stmt.sql,
            "SELECT (jsonb_build_object('title', \"books\".\"title\"))::text AS \"record\" FROM \"books\" WHERE \"books\".\"author\" = $1::text ORDER BY \"books\".\"published\" DESC LIMIT $2::bigint OFFSET $3::bigint"
        );
        assert_eq!(
            stmt.bindings,
            vec![
                QueryParam::Text("X".into()),
                QueryParam::Int(5),
                QueryParam::Int(10)
            ]
        );
    }

    #[test]
    fn test_plain_unknown_sort_column_rejected() {
        let schema = books_schema();
        let resolved = ResolvedFilters {
            sort: Some(vec![SortKey::asc("title; DROP TABLE books")]),
            ..Default::default()
        };
        assert!(matches!(
            render_plain(&schema, &resolved),
            Err(Error::InvalidInput(_))
        ));
    }

    #[test]
    fn test_augmented_include_all_with_rank() {
        let schema = books_schema();
        let aug = augmentation(
            AugmentedSelection::IncludeAll {
                include: vec![SelectItem::Computed(rank_column())],
            },
            vec![OrderTerm::rank(SortDirection::Desc)],
        );
        let stmt = render_augmented(&schema, &aug).unwrap();
        assert!(stmt.sql.starts_with(
            "SELECT (to_jsonb(\"books\") || jsonb_build_object('rank', ts_rank(\"books\".\"search_vector\", to_tsquery($1))))::text AS \"record\", ts_rank(\"books\".\"search_vector\", to_tsquery($1)) AS rank FROM \"books\""
        ));
        assert!(stmt.sql.contains("ORDER BY rank DESC LIMIT $2::bigint"));
        assert_eq!(stmt.bindings.len(), 2);
    }

    #[test]
    fn test_augmented_fields_and_mixed_order() {
        let schema = books_schema();
        let aug = augmentation(
            AugmentedSelection::Fields(vec![
                SelectItem::Column("title".into()),
                SelectItem::Computed(rank_column()),
            ]),
            vec![
                OrderTerm::Column {
                    field: "published".into(),
                    direction: SortDirection::Asc,
                },
                OrderTerm::rank(SortDirection::Desc),
            ],
        );
        let stmt = render_augmented(&schema, &aug).unwrap();
        assert!(stmt.sql.contains(
            "jsonb_build_object('title', \"books\".\"title\", 'rank', ts_rank("
        ));
        assert!(stmt
            .sql
            .contains("ORDER BY \"books\".\"published\" ASC, rank DESC"));
    }

    #[test]
    fn test_augmented_unknown_selection_rejected() {
        let schema = books_schema();
        let aug = augmentation(
            AugmentedSelection::Fields(vec![SelectItem::Column("password".into())]),
            vec![],
        );
        assert!(render_augmented(&schema, &aug).is_err());
    }
}
