//! Generic field filters for reads.
//!
//! Converts a request's `filters` map into a parameterized WHERE fragment.
//! Text search is not handled here; the query rewriter adds to whatever this
//! produces.
//!
//! Supported forms, per field:
//!
//! | Filter | SQL |
//! |--------|-----|
//! | `"author": "X"` | `"books"."author" = $1::text` |
//! | `"author": null` | `"books"."author" IS NULL` |
//! | `"author": ["X", "Y"]` | `"books"."author" = ANY($1::text[])` |
//! | `"published": {"$gte": "2020-01-01"}` | `"books"."published" >= $1::date` |
//!
//! Operators: `$ne`, `$lt`, `$lte`, `$gt`, `$gte`, `$in`, `$nin`.

use std::sync::Arc;

use serde_json::Value as JsonValue;
use uuid::Uuid;

use folio_core::{
    EntitySchema, Error, FieldKind, FilterResolver, QueryParam, ResolvedFilters, Result,
    SearchRequest,
};

/// Feathers-style equality/comparison filter resolver bound to one schema.
#[derive(Debug, Clone)]
pub struct EqualityFilterResolver {
    schema: Arc<EntitySchema>,
}

impl EqualityFilterResolver {
    pub fn new(schema: Arc<EntitySchema>) -> Self {
        Self { schema }
    }
}

struct ClauseBuilder<'a> {
    schema: &'a EntitySchema,
    clauses: Vec<String>,
    params: Vec<QueryParam>,
}

impl<'a> ClauseBuilder<'a> {
    fn next_position(&self) -> usize {
        self.params.len() + 1
    }

    fn compare(&mut self, field: &str, kind: FieldKind, op: &str, value: &JsonValue) -> Result<()> {
        let column = self.schema.qualify(field);
        if value.is_null() {
            let clause = match op {
                "=" => format!("{} IS NULL", column),
                "<>" => format!("{} IS NOT NULL", column),
                _ => {
                    return Err(Error::InvalidInput(format!(
                        "Filter on '{}' cannot compare {} NULL",
                        field, op
                    )))
                }
            };
            self.clauses.push(clause);
            return Ok(());
        }

        let placeholder = kind.placeholder(self.next_position());
        self.params.push(value_to_param(field, kind, value)?);
        self.clauses
            .push(format!("{} {} {}", column, op, placeholder));
        Ok(())
    }

    fn membership(&mut self, field: &str, kind: FieldKind, negate: bool, value: &JsonValue) -> Result<()> {
        let JsonValue::Array(items) = value else {
            return Err(Error::InvalidInput(format!(
                "Filter on '{}' expects a list",
                field
            )));
        };
        let column = self.schema.qualify(field);

        if items.is_empty() {
            // Nothing is in the empty set.
            self.clauses
                .push(if negate { "TRUE" } else { "FALSE" }.to_string());
            return Ok(());
        }

        let values = items
            .iter()
            .map(|item| value_to_param(field, kind, item).map(|p| param_text(&p)))
            .collect::<Result<Vec<_>>>()?;

        let placeholder = kind.array_placeholder(self.next_position());
        self.params.push(QueryParam::TextArray(values));
        self.clauses.push(if negate {
            format!("NOT ({} = ANY({}))", column, placeholder)
        } else {
            format!("{} = ANY({})", column, placeholder)
        });
        Ok(())
    }
}

impl FilterResolver for EqualityFilterResolver {
    fn resolve(&self, request: &SearchRequest) -> Result<ResolvedFilters> {
        let mut builder = ClauseBuilder {
            schema: &self.schema,
            clauses: Vec::new(),
            params: Vec::new(),
        };

        for (field, value) in &request.filters {
            let kind = self.schema.column_kind(field).ok_or_else(|| {
                Error::InvalidInput(format!(
                    "Unknown filter field '{}' for '{}'",
                    field,
                    self.schema.table()
                ))
            })?;

            match value {
                JsonValue::Array(_) => builder.membership(field, kind, false, value)?,
                JsonValue::Object(ops) => {
                    for (op, operand) in ops {
                        match op.as_str() {
                            "$ne" => builder.compare(field, kind, "<>", operand)?,
                            "$lt" => builder.compare(field, kind, "<", operand)?,
                            "$lte" => builder.compare(field, kind, "<=", operand)?,
                            "$gt" => builder.compare(field, kind, ">", operand)?,
                            "$gte" => builder.compare(field, kind, ">=", operand)?,
                            "$in" => builder.membership(field, kind, false, operand)?,
                            "$nin" => builder.membership(field, kind, true, operand)?,
                            other => {
                                return Err(Error::InvalidInput(format!(
                                    "Unsupported filter operator '{}' on '{}'",
                                    other, field
                                )))
                            }
                        }
                    }
                }
                scalar => builder.compare(field, kind, "=", scalar)?,
            }
        }

        let where_clause = if builder.clauses.is_empty() {
            "TRUE".to_string()
        } else {
            builder.clauses.join(" AND ")
        };

        Ok(ResolvedFilters {
            where_clause,
            params: builder.params,
            sort: request.sort.clone(),
            selection: request.selection.clone(),
            limit: request.limit,
            offset: request.offset,
        })
    }
}

/// Convert a JSON value into a bind parameter for a column of `kind`.
///
/// Dates and timestamps stay text and are cast in SQL; numbers and booleans
/// given as strings are parsed.
pub fn value_to_param(field: &str, kind: FieldKind, value: &JsonValue) -> Result<QueryParam> {
    let invalid = || {
        Error::InvalidInput(format!(
            "Value {} is not a valid {} for '{}'",
            value,
            kind.sql_type(),
            field
        ))
    };

    if value.is_null() {
        return Ok(QueryParam::Null);
    }

    match kind {
        FieldKind::Text | FieldKind::Date | FieldKind::Timestamp => match value {
            JsonValue::String(s) => Ok(QueryParam::Text(s.clone())),
            JsonValue::Number(_) | JsonValue::Bool(_) => Ok(QueryParam::Text(value.to_string())),
            _ => Err(invalid()),
        },
        FieldKind::Integer => match value {
            JsonValue::Number(n) => n.as_i64().map(QueryParam::Int).ok_or_else(invalid),
            JsonValue::String(s) => s.trim().parse().map(QueryParam::Int).map_err(|_| invalid()),
            _ => Err(invalid()),
        },
        FieldKind::Float => match value {
            JsonValue::Number(n) => n.as_f64().map(QueryParam::Float).ok_or_else(invalid),
            JsonValue::String(s) => s.trim().parse().map(QueryParam::Float).map_err(|_| invalid()),
            _ => Err(invalid()),
        },
        FieldKind::Boolean => match value {
            JsonValue::Bool(b) => Ok(QueryParam::Bool(*b)),
            JsonValue::String(s) => s.trim().parse().map(QueryParam::Bool).map_err(|_| invalid()),
            _ => Err(invalid()),
        },
        FieldKind::Uuid => match value {
            JsonValue::String(s) => Uuid::parse_str(s.trim())
                .map(QueryParam::Uuid)
                .map_err(|_| invalid()),
            _ => Err(invalid()),
        },
    }
}

/// Text form of a scalar parameter, for array binds cast in SQL.
fn param_text(param: &QueryParam) -> String {
    match param {
        QueryParam::Null => String::new(),
        QueryParam::Text(s) => s.clone(),
        QueryParam::TextArray(values) => values.join(","),
        QueryParam::Int(v) => v.to_string(),
        QueryParam::Float(v) => v.to_string(),
        QueryParam::Bool(v) => v.to_string(),
        QueryParam::Uuid(id) => id.to_string(),
    }
}
