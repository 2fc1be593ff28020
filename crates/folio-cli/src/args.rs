//! Argument parsing helpers for the folio CLI.

use std::path::Path;
use std::sync::Arc;

use anyhow::{bail, Context};
use serde_json::{Map, Value as JsonValue};

use folio_core::{EntitySchema, SchemaDefinition};

const BUILTIN_BOOKS_SCHEMA: &str = include_str!("../schemas/books.yaml");

/// Load the entity schema from a YAML file, or the built-in books schema.
pub fn load_schema(path: Option<&Path>) -> anyhow::Result<Arc<EntitySchema>> {
    let source = match path {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read schema {}", path.display()))?,
        None => BUILTIN_BOOKS_SCHEMA.to_string(),
    };
    let definition = SchemaDefinition::from_yaml(&source)?;
    Ok(Arc::new(EntitySchema::try_from(definition)?))
}

/// Parse `field=value` for clap.
pub fn parse_assignment(raw: &str) -> Result<(String, JsonValue), String> {
    let (field, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected FIELD=VALUE, got '{}'", raw))?;
    let field = field.trim();
    if field.is_empty() {
        return Err(format!("missing field name in '{}'", raw));
    }
    Ok((field.to_string(), parse_value(value)))
}

/// `null`, JSON arrays and JSON objects are taken literally; anything else is text.
pub fn parse_value(raw: &str) -> JsonValue {
    let trimmed = raw.trim();
    if trimmed == "null" {
        return JsonValue::Null;
    }
    if trimmed.starts_with('[') || trimmed.starts_with('{') {
        if let Ok(value) = serde_json::from_str::<JsonValue>(trimmed) {
            return value;
        }
    }
    JsonValue::String(raw.to_string())
}

/// Merge a `--json` object with individual assignments; assignments win.
pub fn record_values(
    json: Option<&str>,
    assignments: Vec<(String, JsonValue)>,
) -> anyhow::Result<Map<String, JsonValue>> {
    let mut values = match json {
        Some(raw) => match serde_json::from_str::<JsonValue>(raw).context("Invalid --json")? {
            JsonValue::Object(map) => map,
            _ => bail!("--json must be a JSON object"),
        },
        None => Map::new(),
    };
    values.extend(assignments);
    Ok(values)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_builtin_schema_is_books() {
        let schema = load_schema(None).unwrap();
        assert_eq!(schema.table(), "books");
        assert_eq!(schema.search_column(), "search_vector");
        let weights: Vec<String> = schema
            .weighted_fields()
            .map(|(name, weight)| format!("{}:{}", name, weight))
            .collect();
        assert_eq!(weights, vec!["title:A", "author:C", "description:B"]);
    }

    #[test]
    fn test_missing_schema_file() {
        assert!(load_schema(Some(Path::new("/nonexistent/schema.yaml"))).is_err());
    }

    #[test]
    fn test_parse_assignment() {
        assert_eq!(
            parse_assignment("title=Dune").unwrap(),
            ("title".to_string(), json!("Dune"))
        );
        assert_eq!(
            parse_assignment("description=a=b").unwrap(),
            ("description".to_string(), json!("a=b"))
        );
        assert_eq!(
            parse_assignment("author=null").unwrap(),
            ("author".to_string(), JsonValue::Null)
        );
        assert_eq!(
            parse_assignment("author=[\"A\",\"B\"]").unwrap(),
            ("author".to_string(), json!(["A", "B"]))
        );
        assert!(parse_assignment("title").is_err());
        assert!(parse_assignment("=x").is_err());
    }

    #[test]
    fn test_numbers_stay_text() {
        assert_eq!(parse_value("1984"), json!("1984"));
        assert_eq!(parse_value("[not json"), json!("[not json"));
    }

    #[test]
    fn test_record_values_merge() {
        let values = record_values(
            Some(r#"{"title": "Dune", "author": "Herbert"}"#),
            vec![("title".to_string(), json!("Dune Messiah"))],
        )
        .unwrap();
        assert_eq!(values["title"], json!("Dune Messiah"));
        assert_eq!(values["author"], json!("Herbert"));

        assert!(record_values(Some("[1]"), Vec::new()).is_err());
    }
}
