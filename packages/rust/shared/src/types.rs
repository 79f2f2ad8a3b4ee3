//! Core domain types: the tabular catalog, feed offers, and extracted property pairs.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::classify::is_present;

// ---------------------------------------------------------------------------
// Field
// ---------------------------------------------------------------------------

/// Fixed (non-property) columns of the catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Field {
    ArticleCode,
    Name,
    CategoryPath,
    Price,
    PhotoRefs,
    Description,
    SeoTitle,
    MetaDescription,
    MetaKeywords,
    ShortDescription,
    TechSpecs,
}

impl Field {
    /// Every fixed field, in store column order.
    pub const ALL: [Field; 11] = [
        Field::ArticleCode,
        Field::Name,
        Field::CategoryPath,
        Field::Price,
        Field::PhotoRefs,
        Field::Description,
        Field::SeoTitle,
        Field::MetaDescription,
        Field::MetaKeywords,
        Field::ShortDescription,
        Field::TechSpecs,
    ];

    /// Default column header, also the name used in config and logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ArticleCode => "article_code",
            Self::Name => "name",
            Self::CategoryPath => "category_path",
            Self::Price => "price",
            Self::PhotoRefs => "photo_refs",
            Self::Description => "description",
            Self::SeoTitle => "seo_title",
            Self::MetaDescription => "meta_description",
            Self::MetaKeywords => "meta_keywords",
            Self::ShortDescription => "short_description",
            Self::TechSpecs => "tech_specs",
        }
    }
}

impl std::fmt::Display for Field {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Field {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Field::ALL
            .into_iter()
            .find(|f| f.as_str() == s.trim())
            .ok_or_else(|| format!("unknown field '{s}'"))
    }
}

// ---------------------------------------------------------------------------
// ColumnMap
// ---------------------------------------------------------------------------

/// Maps logical fields and property names to the headers used by the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnMap {
    headers: HashMap<Field, String>,
    property_prefix: String,
    property_suffix: String,
}

impl Default for ColumnMap {
    fn default() -> Self {
        Self {
            headers: Field::ALL
                .into_iter()
                .map(|f| (f, f.as_str().to_string()))
                .collect(),
            property_prefix: "property:".into(),
            property_suffix: String::new(),
        }
    }
}

impl ColumnMap {
    /// Build a map with explicit headers; fields not listed keep their default header.
    pub fn new(
        headers: impl IntoIterator<Item = (Field, String)>,
        property_prefix: impl Into<String>,
        property_suffix: impl Into<String>,
    ) -> Self {
        let mut map = Self::default();
        for (field, header) in headers {
            map.headers.insert(field, header);
        }
        map.property_prefix = property_prefix.into();
        map.property_suffix = property_suffix.into();
        map
    }

    /// Header used for a fixed field.
    pub fn header(&self, field: Field) -> &str {
        self.headers
            .get(&field)
            .map(String::as_str)
            .unwrap_or_else(|| field.as_str())
    }

    /// Column header for a dynamic property (`property:<name>` by default).
    pub fn property_column(&self, name: &str) -> String {
        format!("{}{}{}", self.property_prefix, name.trim(), self.property_suffix)
    }

    /// Inverse of [`ColumnMap::property_column`].
    pub fn property_name<'a>(&self, column: &'a str) -> Option<&'a str> {
        column
            .strip_prefix(self.property_prefix.as_str())?
            .strip_suffix(self.property_suffix.as_str())
    }
}

// ---------------------------------------------------------------------------
// Schema
// ---------------------------------------------------------------------------

/// Ordered set of column headers. Growth is additive only.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Schema {
    columns: Vec<String>,
    known: HashSet<String>,
}

impl Schema {
    /// Build a schema from headers, dropping duplicates but keeping first-seen order.
    pub fn new(columns: impl IntoIterator<Item = String>) -> Self {
        let mut schema = Self::default();
        for column in columns {
            schema.add(column);
        }
        schema
    }

    /// Headers in store order.
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn contains(&self, column: &str) -> bool {
        self.known.contains(column)
    }

    /// Append a header. Returns `false` if it was already known.
    pub fn add(&mut self, column: impl Into<String>) -> bool {
        let column = column.into();
        if self.known.contains(&column) {
            return false;
        }
        self.known.insert(column.clone());
        self.columns.push(column);
        true
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

// ---------------------------------------------------------------------------
// CatalogRecord / Catalog
// ---------------------------------------------------------------------------

/// One row of the tabular store, keyed by column header.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CatalogRecord {
    values: HashMap<String, String>,
}

impl CatalogRecord {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a record from `(header, value)` pairs.
    pub fn from_pairs<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            values: pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    pub fn get(&self, column: &str) -> Option<&str> {
        self.values.get(column).map(String::as_str)
    }

    /// `true` when the cell is absent, empty, or whitespace only.
    pub fn is_missing(&self, column: &str) -> bool {
        !is_present(self.get(column))
    }

    /// Unconditionally write a cell.
    pub fn set(&mut self, column: impl Into<String>, value: impl Into<String>) {
        self.values.insert(column.into(), value.into());
    }

    /// Write `value` only if the cell is missing and `value` itself is present.
    ///
    /// Returns whether the cell changed.
    pub fn fill_missing(&mut self, column: &str, value: &str) -> bool {
        if !self.is_missing(column) || !is_present(Some(value)) {
            return false;
        }
        self.values.insert(column.to_string(), value.to_string());
        true
    }

    /// Insert an empty cell if the column has no entry yet.
    fn ensure_blank(&mut self, column: &str) {
        self.values
            .entry(column.to_string())
            .or_insert_with(String::new);
    }
}

/// The tabular product store: an ordered schema plus its rows.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Catalog {
    pub schema: Schema,
    pub records: Vec<CatalogRecord>,
}

impl Catalog {
    pub fn new(schema: Schema) -> Self {
        Self {
            schema,
            records: Vec::new(),
        }
    }

    /// Add a column, initialized blank for every existing record.
    ///
    /// Returns `false` if the column already existed.
    pub fn ensure_column(&mut self, column: &str) -> bool {
        if !self.schema.add(column) {
            return false;
        }
        for record in &mut self.records {
            record.ensure_blank(column);
        }
        true
    }

    /// Append a record, registering any headers the schema does not know yet.
    pub fn push(&mut self, mut record: CatalogRecord) {
        let mut unknown: Vec<String> = record
            .values
            .keys()
            .filter(|k| !self.schema.contains(k))
            .cloned()
            .collect();
        unknown.sort();
        for column in unknown {
            self.ensure_column(&column);
        }
        for column in self.schema.columns() {
            record.ensure_blank(column);
        }
        self.records.push(record);
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Map of trimmed article code to record index. The first occurrence wins.
    pub fn article_index(&self, article_column: &str) -> HashMap<String, usize> {
        let mut index = HashMap::with_capacity(self.records.len());
        for (i, record) in self.records.iter().enumerate() {
            if let Some(code) = record.get(article_column).map(str::trim) {
                if !code.is_empty() {
                    index.entry(code.to_string()).or_insert(i);
                }
            }
        }
        index
    }
}

// ---------------------------------------------------------------------------
// Feed types
// ---------------------------------------------------------------------------

/// One `offer` entry of the feed document. Read-only input for reconciliation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedOffer {
    /// Join key against the catalog's article code. Offers without it are never joined.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vendor_code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Free text, possibly containing markup.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Embedded table of technical properties.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tech: Option<String>,
    /// Embedded table of accessory/quantity pairs.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub equipment: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub pictures: Vec<String>,
}

/// A `(name, value)` row extracted from an embedded table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropertyPair {
    pub name: String,
    pub value: String,
}

impl PropertyPair {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

impl std::fmt::Display for PropertyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.name, self.value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn field_roundtrips_through_str() {
        for field in Field::ALL {
            let parsed: Field = field.as_str().parse().expect("parse field");
            assert_eq!(parsed, field);
        }
        assert!("bogus".parse::<Field>().is_err());
    }

    #[test]
    fn column_map_property_naming() {
        let map = ColumnMap::default();
        assert_eq!(map.property_column(" Power "), "property:Power");
        assert_eq!(map.property_name("property:Power"), Some("Power"));
        assert_eq!(map.property_name("name"), None);

        let ru = ColumnMap::new(
            [(Field::ArticleCode, "Артикул".to_string())],
            "Свойство: ",
            ":",
        );
        assert_eq!(ru.header(Field::ArticleCode), "Артикул");
        assert_eq!(ru.header(Field::Name), "name");
        assert_eq!(ru.property_column("Мощность"), "Свойство: Мощность:");
        assert_eq!(ru.property_name("Свойство: Мощность:"), Some("Мощность"));
    }

    #[test]
    fn schema_is_ordered_and_additive() {
        let mut schema = Schema::new(["a".to_string(), "b".to_string(), "a".to_string()]);
        assert_eq!(schema.columns(), ["a", "b"]);
        assert!(schema.add("c"));
        assert!(!schema.add("b"));
        assert_eq!(schema.columns(), ["a", "b", "c"]);
    }

    #[test]
    fn fill_missing_never_overwrites() {
        let mut record = CatalogRecord::from_pairs([("name", "Drill"), ("description", "  ")]);
        assert!(!record.fill_missing("name", "Other"));
        assert_eq!(record.get("name"), Some("Drill"));

        assert!(record.fill_missing("description", "Fresh"));
        assert_eq!(record.get("description"), Some("Fresh"));

        assert!(!record.fill_missing("photo_refs", "   "));
        assert!(record.is_missing("photo_refs"));
    }

    #[test]
    fn ensure_column_blanks_existing_records() {
        let mut catalog = Catalog::new(Schema::new(["article_code".to_string()]));
        catalog.push(CatalogRecord::from_pairs([("article_code", "1")]));
        assert!(catalog.ensure_column("property:Power"));
        assert!(!catalog.ensure_column("property:Power"));
        assert_eq!(catalog.records[0].get("property:Power"), Some(""));
    }

    #[test]
    fn push_registers_unknown_columns() {
        let mut catalog = Catalog::new(Schema::new(["article_code".to_string()]));
        catalog.push(CatalogRecord::from_pairs([("article_code", "1"), ("price", "10")]));
        assert!(catalog.schema.contains("price"));
        catalog.push(CatalogRecord::from_pairs([("article_code", "2")]));
        assert_eq!(catalog.records[1].get("price"), Some(""));
    }

    #[test]
    fn article_index_trims_and_keeps_first() {
        let mut catalog = Catalog::default();
        catalog.push(CatalogRecord::from_pairs([("article_code", " 123 ")]));
        catalog.push(CatalogRecord::from_pairs([("article_code", "123")]));
        catalog.push(CatalogRecord::from_pairs([("article_code", "")]));
        let index = catalog.article_index("article_code");
        assert_eq!(index.len(), 1);
        assert_eq!(index["123"], 0);
    }

    #[test]
    fn feed_offer_serialization_skips_empty() {
        let offer = FeedOffer {
            vendor_code: Some("123".into()),
            ..Default::default()
        };
        let json = serde_json::to_string(&offer).expect("serialize");
        assert_eq!(json, r#"{"vendor_code":"123"}"#);
    }

    #[test]
    fn property_pair_display() {
        assert_eq!(PropertyPair::new("Power", "500W").to_string(), "Power: 500W");
    }
}
