//! Entity schemas: which columns exist, which of them feed the search vector,
//! and with what weight.
//!
//! A schema is static configuration. It is built once (in code or from a
//! [`SchemaDefinition`] loaded from YAML/JSON), validated eagerly, and then
//! shared read-only by the vector builder and the query rewriter. It is the
//! single source of field/weight truth; table metadata is never introspected.
//!
//! Every identifier accepted here is later interpolated into SQL, so
//! validation is strict: ASCII letters, digits and underscores only.

use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// PostgreSQL identifier length limit.
const MAX_IDENTIFIER_LEN: usize = 63;

/// Default primary key column.
pub const DEFAULT_PRIMARY_KEY: &str = "id";

/// Importance tier of a field inside the weighted vector (A highest, D lowest).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Weight {
    A,
    B,
    C,
    D,
}

impl Weight {
    /// All levels, highest first.
    pub const ALL: [Weight; 4] = [Weight::A, Weight::B, Weight::C, Weight::D];

    /// Label passed to `setweight()`.
    pub fn as_str(&self) -> &'static str {
        match self {
            Weight::A => "A",
            Weight::B => "B",
            Weight::C => "C",
            Weight::D => "D",
        }
    }
}

impl fmt::Display for Weight {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Weight {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "A" => Ok(Weight::A),
            "B" => Ok(Weight::B),
            "C" => Ok(Weight::C),
            "D" => Ok(Weight::D),
            other => Err(Error::Config(format!(
                "Invalid weight '{}': expected one of A, B, C, D",
                other
            ))),
        }
    }
}

/// Storage type of a column.
///
/// Determines how request values are converted into bind parameters and
/// which cast, if any, is applied to the placeholder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldKind {
    #[default]
    Text,
    Integer,
    Float,
    Boolean,
    Date,
    Timestamp,
    Uuid,
}

impl FieldKind {
    /// PostgreSQL type name used in placeholder casts.
    pub fn sql_type(&self) -> &'static str {
        match self {
            FieldKind::Text => "text",
            FieldKind::Integer => "bigint",
            FieldKind::Float => "float8",
            FieldKind::Boolean => "boolean",
            FieldKind::Date => "date",
            FieldKind::Timestamp => "timestamptz",
            FieldKind::Uuid => "uuid",
        }
    }

    /// Typed placeholder, e.g. `$2::date`. NULLs and text-bound dates need
    /// the cast to reach the column's type.
    pub fn placeholder(&self, position: usize) -> String {
        format!("${}::{}", position, self.sql_type())
    }

    /// Typed array placeholder for `= ANY(...)`, e.g. `$3::bigint[]`.
    pub fn array_placeholder(&self, position: usize) -> String {
        format!("${}::{}[]", position, self.sql_type())
    }
}

/// One column of an entity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldSpec {
    pub name: String,
    /// Absent weight keeps the field out of the search vector.
    pub weight: Option<Weight>,
    pub kind: FieldKind,
}

impl FieldSpec {
    /// A text field contributing to the vector with the given weight.
    pub fn weighted(name: impl Into<String>, weight: Weight) -> Self {
        Self {
            name: name.into(),
            weight: Some(weight),
            kind: FieldKind::Text,
        }
    }

    /// A field that is stored and filterable but never searched.
    pub fn plain(name: impl Into<String>, kind: FieldKind) -> Self {
        Self {
            name: name.into(),
            weight: None,
            kind,
        }
    }
}

/// Validated, immutable description of a searchable entity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntitySchema {
    table: String,
    primary_key: String,
    primary_key_kind: FieldKind,
    search_column: String,
    text_search_config: Option<String>,
    fields: Vec<FieldSpec>,
}

impl EntitySchema {
    /// Start building a schema for `table`.
    pub fn builder(table: impl Into<String>) -> EntitySchemaBuilder {
        EntitySchemaBuilder::new(table)
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn primary_key(&self) -> &str {
        &self.primary_key
    }

    pub fn primary_key_kind(&self) -> FieldKind {
        self.primary_key_kind
    }

    pub fn search_column(&self) -> &str {
        &self.search_column
    }

    pub fn text_search_config(&self) -> Option<&str> {
        self.text_search_config.as_deref()
    }

    /// All declared fields in declaration order.
    pub fn fields(&self) -> &[FieldSpec] {
        &self.fields
    }

    pub fn field(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Fields that carry a weight, in declaration order.
    ///
    /// This order fixes placeholder positions in the vector statement.
    pub fn weighted_fields(&self) -> impl Iterator<Item = (&str, Weight)> {
        self.fields
            .iter()
            .filter_map(|f| f.weight.map(|w| (f.name.as_str(), w)))
    }

    /// Kind of a filterable column (declared fields and the primary key).
    pub fn column_kind(&self, name: &str) -> Option<FieldKind> {
        if name == self.primary_key {
            return Some(self.primary_key_kind);
        }
        self.field(name).map(|f| f.kind)
    }

    /// True for any column that may appear in a select list or ORDER BY.
    pub fn is_selectable(&self, name: &str) -> bool {
        name == self.search_column || self.column_kind(name).is_some()
    }

    /// Quoted table name, e.g. `"books"`.
    pub fn quoted_table(&self) -> String {
        quote_ident(&self.table)
    }

    /// Table-qualified quoted column, e.g. `"books"."title"`.
    pub fn qualify(&self, column: &str) -> String {
        format!("{}.{}", quote_ident(&self.table), quote_ident(column))
    }

    /// Call a text-search function with the schema's configuration, if any.
    ///
    /// `ts_call("to_tsquery", "$3")` yields `to_tsquery('english'::regconfig, $3)`
    /// with a configuration and `to_tsquery($3)` without one.
    pub fn ts_call(&self, function: &str, argument: &str) -> String {
        match &self.text_search_config {
            Some(config) => format!("{}('{}'::regconfig, {})", function, config, argument),
            None => format!("{}({})", function, argument),
        }
    }
}

/// Builder for [`EntitySchema`]; all validation happens in [`build`](Self::build).
#[derive(Debug, Clone)]
pub struct EntitySchemaBuilder {
    table: String,
    primary_key: String,
    primary_key_kind: FieldKind,
    search_column: Option<String>,
    text_search_config: Option<String>,
    fields: Vec<FieldSpec>,
}

impl EntitySchemaBuilder {
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            primary_key: DEFAULT_PRIMARY_KEY.to_string(),
            primary_key_kind: FieldKind::Integer,
            search_column: None,
            text_search_config: None,
            fields: Vec::new(),
        }
    }

    /// Set the primary key column and its kind (default `id`, integer).
    pub fn primary_key(mut self, name: impl Into<String>, kind: FieldKind) -> Self {
        self.primary_key = name.into();
        self.primary_key_kind = kind;
        self
    }

    /// Set the `tsvector` column the vector is persisted to. Required.
    pub fn search_column(mut self, name: impl Into<String>) -> Self {
        self.search_column = Some(name.into());
        self
    }

    /// Set the text search configuration (regconfig) used for both
    /// vectorizing and query parsing, e.g. `english` or `public.my_config`.
    pub fn text_search_config(mut self, name: impl Into<String>) -> Self {
        self.text_search_config = Some(name.into());
        self
    }

    pub fn field(mut self, spec: FieldSpec) -> Self {
        self.fields.push(spec);
        self
    }

    pub fn weighted(self, name: impl Into<String>, weight: Weight) -> Self {
        self.field(FieldSpec::weighted(name, weight))
    }

    pub fn plain(self, name: impl Into<String>, kind: FieldKind) -> Self {
        self.field(FieldSpec::plain(name, kind))
    }

    /// Validate and freeze the schema.
    pub fn build(self) -> Result<EntitySchema> {
        validate_identifier("table", &self.table)?;
        validate_identifier("primary key", &self.primary_key)?;

        let search_column = self.search_column.ok_or_else(|| {
            Error::Config(format!(
                "Schema for '{}' cannot function without a search column",
                self.table
            ))
        })?;
        validate_identifier("search column", &search_column)?;

        if let Some(config) = &self.text_search_config {
            validate_text_search_config(config)?;
        }

        let mut seen = HashSet::new();
        for field in &self.fields {
            validate_identifier("field", &field.name)?;
            if !seen.insert(field.name.as_str()) {
                return Err(Error::Config(format!(
                    "Duplicate field '{}' in schema for '{}'",
                    field.name, self.table
                )));
            }
            if field.name == search_column {
                return Err(Error::Config(format!(
                    "Search column '{}' cannot also be a declared field",
                    search_column
                )));
            }
            if field.name == self.primary_key {
                return Err(Error::Config(format!(
                    "Primary key '{}' cannot also be a declared field",
                    field.name
                )));
            }
        }

        Ok(EntitySchema {
            table: self.table,
            primary_key: self.primary_key,
            primary_key_kind: self.primary_key_kind,
            search_column,
            text_search_config: self.text_search_config,
            fields: self.fields,
        })
    }
}

/// Serializable schema definition, as written in configuration files.
///
/// ```yaml
/// table: books
/// search_column: search_vector
/// text_search_config: english
/// fields:
///   - { name: title, weight: A }
///   - { name: author, weight: C }
///   - { name: published, kind: date }
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SchemaDefinition {
    pub table: String,
    #[serde(default)]
    pub primary_key: Option<String>,
    #[serde(default)]
    pub primary_key_kind: Option<FieldKind>,
    #[serde(default)]
    pub search_column: Option<String>,
    #[serde(default)]
    pub text_search_config: Option<String>,
    #[serde(default)]
    pub fields: Vec<FieldDefinition>,
}

/// One field of a [`SchemaDefinition`]. Weights stay strings here so that an
/// invalid level surfaces as a configuration error rather than a parse error.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldDefinition {
    pub name: String,
    #[serde(default)]
    pub weight: Option<String>,
    #[serde(default)]
    pub kind: FieldKind,
}

impl SchemaDefinition {
    /// Parse a YAML document into a definition (not yet validated).
    pub fn from_yaml(source: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(source)?)
    }
}

impl TryFrom<SchemaDefinition> for EntitySchema {
    type Error = Error;

    fn try_from(def: SchemaDefinition) -> Result<Self> {
        let mut builder = EntitySchema::builder(def.table).primary_key(
            def.primary_key
                .unwrap_or_else(|| DEFAULT_PRIMARY_KEY.to_string()),
            def.primary_key_kind.unwrap_or(FieldKind::Integer),
        );
        if let Some(column) = def.search_column {
            builder = builder.search_column(column);
        }
        if let Some(config) = def.text_search_config {
            builder = builder.text_search_config(config);
        }
        for field in def.fields {
            let weight = field.weight.as_deref().map(Weight::from_str).transpose()?;
            builder = builder.field(FieldSpec {
                name: field.name,
                weight,
                kind: field.kind,
            });
        }
        builder.build()
    }
}

/// Quote an already validated identifier.
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name)
}

/// Validate a SQL identifier that will be interpolated into statements.
///
/// Identifiers must:
/// - Not be empty
/// - Not exceed 63 characters (PostgreSQL identifier limit)
/// - Start with an ASCII letter or underscore
/// - Contain only ASCII alphanumerics and underscores
pub fn validate_identifier(kind: &str, name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(Error::Config(format!("{} name cannot be empty", kind)));
    }

    if name.len() > MAX_IDENTIFIER_LEN {
        return Err(Error::Config(format!(
            "{} name exceeds {} character limit: {} characters",
            kind,
            MAX_IDENTIFIER_LEN,
            name.len()
        )));
    }

    if let Some(first) = name.chars().next() {
        if !first.is_ascii_alphabetic() && first != '_' {
            return Err(Error::Config(format!(
                "{} name must start with a letter or underscore, found: '{}'",
                kind, first
            )));
        }
    }

    if let Some(ch) = name
        .chars()
        .find(|ch| !ch.is_ascii_alphanumeric() && *ch != '_')
    {
        return Err(Error::Config(format!(
            "{} name '{}' contains invalid character: '{}'",
            kind, name, ch
        )));
    }

    Ok(())
}

/// A regconfig name is one identifier, optionally schema-qualified.
fn validate_text_search_config(name: &str) -> Result<()> {
    let parts: Vec<&str> = name.split('.').collect();
    if parts.len() > 2 {
        return Err(Error::Config(format!(
            "Text search config '{}' has too many qualifiers",
            name
        )));
    }
    parts
        .iter()
        .try_for_each(|part| validate_identifier("text search config", part))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn books() -> EntitySchema {
        EntitySchema::builder("books")
            .search_column("search_vector")
            .weighted("title", Weight::A)
            .weighted("author", Weight::C)
            .weighted("description", Weight::B)
            .plain("isbn", FieldKind::Text)
            .plain("published", FieldKind::Date)
            .build()
            .unwrap()
    }

    #[test]
    fn test_weight_parse_valid_levels() {
        for weight in Weight::ALL {
            assert_eq!(weight.as_str().parse::<Weight>().unwrap(), weight);
        }
    }

    #[test]
    fn test_weight_parse_rejects_other_values() {
        for bad in ["E", "a", "", "AA", " A"] {
            match bad.parse::<Weight>() {
                Err(Error::Config(msg)) => assert!(msg.contains("Invalid weight")),
                other => panic!("expected config error for {:?}, got {:?}", bad, other),
            }
        }
    }

    #[test]
    fn test_weighted_fields_preserve_declaration_order() {
        let schema = books();
        let fields: Vec<_> = schema.weighted_fields().collect();
        assert_eq!(
            fields,
            vec![
                ("title", Weight::A),
                ("author", Weight::C),
                ("description", Weight::B)
            ]
        );
    }

    #[test]
    fn test_unweighted_fields_excluded_from_field_list() {
        let schema = books();
        assert!(schema.weighted_fields().all(|(name, _)| name != "isbn"));
        assert!(schema.weighted_fields().all(|(name, _)| name != "published"));
    }

    #[test]
    fn test_missing_search_column_is_config_error() {
        let result = EntitySchema::builder("books")
            .weighted("title", Weight::A)
            .build();
        match result {
            Err(Error::Config(msg)) => assert!(msg.contains("search column")),
            other => panic!("expected config error, got {:?}", other),
        }
    }

    #[test]
    fn test_duplicate_field_rejected() {
        let result = EntitySchema::builder("books")
            .search_column("search_vector")
            .weighted("title", Weight::A)
            .plain("title", FieldKind::Text)
            .build();
        match result {
            Err(Error::Config(msg)) => assert!(msg.contains("Duplicate field 'title'")),
            other => panic!("expected config error, got {:?}", other),
        }
    }

    #[test]
    fn test_search_column_cannot_be_field() {
        let result = EntitySchema::builder("books")
            .search_column("title")
            .weighted("title", Weight::A)
            .build();
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_invalid_identifiers_rejected() {
        assert!(EntitySchema::builder("books; DROP TABLE x")
            .search_column("search_vector")
            .build()
            .is_err());
        assert!(EntitySchema::builder("books")
            .search_column("search\"vector")
            .build()
            .is_err());
        assert!(EntitySchema::builder("books")
            .search_column("search_vector")
            .weighted("1title", Weight::A)
            .build()
            .is_err());
    }

    #[test]
    fn test_validate_identifier_length_limit() {
        let long = "a".repeat(64);
        assert!(validate_identifier("field", &long).is_err());
        assert!(validate_identifier("field", &long[..63]).is_ok());
    }

    #[test]
    fn test_text_search_config_validation() {
        let ok = EntitySchema::builder("books")
            .search_column("search_vector")
            .text_search_config("public.folio_english")
            .build();
        assert!(ok.is_ok());

        let bad = EntitySchema::builder("books")
            .search_column("search_vector")
            .text_search_config("english'); DROP TABLE books; --")
            .build();
        assert!(matches!(bad, Err(Error::Config(_))));
    }

    #[test]
    fn test_qualify_and_ts_call() {
        let schema = books();
        assert_eq!(schema.qualify("title"), "\"books\".\"title\"");
        assert_eq!(schema.ts_call("to_tsquery", "$1"), "to_tsquery($1)");

        let configured = EntitySchema::builder("books")
            .search_column("search_vector")
            .text_search_config("english")
            .build()
            .unwrap();
        assert_eq!(
            configured.ts_call("to_tsquery", "$2"),
            "to_tsquery('english'::regconfig, $2)"
        );
    }

    #[test]
    fn test_field_kind_placeholders() {
        assert_eq!(FieldKind::Date.placeholder(2), "$2::date");
        assert_eq!(FieldKind::Integer.array_placeholder(3), "$3::bigint[]");
        assert_eq!(FieldKind::default(), FieldKind::Text);
    }

    #[test]
    fn test_column_kind_and_selectable() {
        let schema = books();
        assert_eq!(schema.column_kind("id"), Some(FieldKind::Integer));
        assert_eq!(schema.column_kind("published"), Some(FieldKind::Date));
        assert_eq!(schema.column_kind("search_vector"), None);
        assert!(schema.is_selectable("search_vector"));
        assert!(!schema.is_selectable("rank"));
    }

    #[test]
    fn test_schema_definition_from_yaml() {
        let yaml = r#"
table: books
search_column: search_vector
fields:
  - { name: title, weight: A }
  - { name: author, weight: C }
  - { name: published, kind: date }
"#;
        let schema = EntitySchema::try_from(SchemaDefinition::from_yaml(yaml).unwrap()).unwrap();
        assert_eq!(schema.table(), "books");
        assert_eq!(schema.primary_key(), "id");
        assert_eq!(schema.weighted_fields().count(), 2);
        assert_eq!(schema.column_kind("published"), Some(FieldKind::Date));
    }

    #[test]
    fn test_schema_definition_invalid_weight_is_config_error() {
        let yaml = r#"
table: books
search_column: search_vector
fields:
  - { name: title, weight: Z }
"#;
        let result = EntitySchema::try_from(SchemaDefinition::from_yaml(yaml).unwrap());
        assert!(matches!(result, Err(Error::Config(_))));
    }
}
