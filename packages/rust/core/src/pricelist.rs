//! Supplier price-list import.
//!
//! A price list interleaves category headings with product rows. A heading has
//! no article and no price; it applies to every product row below it until the
//! next heading. Product rows become new catalog records. Rows whose article is
//! already in the catalog are skipped, so existing records are never touched.

use std::collections::BTreeMap;

use serde::Serialize;
use tracing::{debug, info};

use catalogsync_shared::{Catalog, CatalogRecord, ColumnMap, Field, ImportConfig};
use catalogsync_storage::PriceRow;

/// How imported rows are shaped into records.
#[derive(Debug, Clone, Default)]
pub struct ImportOptions {
    pub category_prefix: String,
    pub name_prefix: String,
    pub price_suffix: String,
    /// Constant cells written into every new record.
    pub extra_columns: BTreeMap<String, String>,
}

impl From<&ImportConfig> for ImportOptions {
    fn from(config: &ImportConfig) -> Self {
        Self {
            category_prefix: config.category_prefix.clone(),
            name_prefix: config.name_prefix.clone(),
            price_suffix: config.price_suffix.clone(),
            extra_columns: config.extra_columns.clone(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ImportReport {
    pub rows: usize,
    pub categories: usize,
    pub added: usize,
    pub skipped_existing: usize,
    /// Product rows with no price, or seen before any category heading.
    pub skipped_invalid: usize,
}

/// Append new records for the products in `rows`.
pub fn import_price_list(
    catalog: &mut Catalog,
    rows: &[PriceRow],
    columns: &ColumnMap,
    options: &ImportOptions,
) -> ImportReport {
    let mut report = ImportReport {
        rows: rows.len(),
        ..ImportReport::default()
    };
    let article_column = columns.header(Field::ArticleCode);
    let mut known = catalog.article_index(article_column);
    let mut category: Option<&str> = None;

    for row in rows {
        if row.article.is_empty() {
            if !row.name.is_empty() && !has_price(&row.price) {
                category = Some(row.name.as_str());
                report.categories += 1;
            }
            continue;
        }

        let Some(current) = category.filter(|_| has_price(&row.price)) else {
            debug!(article = %row.article, "skipping row without price or category");
            report.skipped_invalid += 1;
            continue;
        };
        if known.contains_key(&row.article) {
            report.skipped_existing += 1;
            continue;
        }

        let mut record = CatalogRecord::new();
        record.set(article_column, row.article.as_str());
        record.set(
            columns.header(Field::Name),
            format!("{}{}", options.name_prefix, row.name),
        );
        record.set(
            columns.header(Field::Price),
            format!("{}{}", row.price, options.price_suffix),
        );
        record.set(
            columns.header(Field::CategoryPath),
            format!("{}{current}", options.category_prefix),
        );
        for (column, value) in &options.extra_columns {
            record.set(column.as_str(), value.as_str());
        }

        known.insert(row.article.clone(), catalog.len());
        catalog.push(record);
        report.added += 1;
    }

    info!(
        added = report.added,
        skipped_existing = report.skipped_existing,
        categories = report.categories,
        "imported price list"
    );
    report
}

/// A price is usable when it is present and not zero.
fn has_price(price: &str) -> bool {
    !price
        .trim()
        .trim_start_matches(['0', '.', ','])
        .is_empty()
}

#[cfg(test)]
mod tests {
    use super::*;
    use catalogsync_shared::Schema;

    fn row(article: &str, name: &str, price: &str) -> PriceRow {
        PriceRow {
            article: article.into(),
            name: name.into(),
            price: price.into(),
        }
    }

    fn options() -> ImportOptions {
        ImportOptions {
            category_prefix: "Catalog >> Woodworking >> ".into(),
            name_prefix: "Proma ".into(),
            price_suffix: ",00".into(),
            extra_columns: BTreeMap::from([("currency".to_string(), "RUB".to_string())]),
        }
    }

    fn catalog() -> Catalog {
        let mut catalog = Catalog::new(Schema::new(["article_code", "name"].map(String::from)));
        catalog.push(CatalogRecord::from_pairs([("article_code", "J-200"), ("name", "Old")]));
        catalog
    }

    #[test]
    fn imports_products_under_headings() {
        let rows = vec![
            row("", "Jointers", ""),
            row("J-150", "Jointer 150", "15900"),
            row("J-200", "Jointer 200", "19900"),
            row("", "Saws", "0"),
            row("S-1", "Saw", "0"),
            row("S-2", "Band saw", "32000"),
        ];
        let mut catalog = catalog();
        let report = import_price_list(&mut catalog, &rows, &ColumnMap::default(), &options());

        assert_eq!(report.added, 2);
        assert_eq!(report.categories, 2);
        assert_eq!(report.skipped_existing, 1);
        assert_eq!(report.skipped_invalid, 1);

        let jointer = &catalog.records[1];
        assert_eq!(jointer.get("article_code"), Some("J-150"));
        assert_eq!(jointer.get("name"), Some("Proma Jointer 150"));
        assert_eq!(jointer.get("price"), Some("15900,00"));
        assert_eq!(jointer.get("category_path"), Some("Catalog >> Woodworking >> Jointers"));
        assert_eq!(jointer.get("currency"), Some("RUB"));
        assert_eq!(catalog.records[2].get("category_path"), Some("Catalog >> Woodworking >> Saws"));

        // Existing record untouched.
        assert_eq!(catalog.records[0].get("name"), Some("Old"));
        assert_eq!(catalog.records[0].get("currency"), Some(""));
    }

    #[test]
    fn products_before_any_heading_are_skipped() {
        let mut catalog = Catalog::default();
        let report = import_price_list(
            &mut catalog,
            &[row("X-1", "Orphan", "100")],
            &ColumnMap::default(),
            &ImportOptions::default(),
        );
        assert_eq!(report.added, 0);
        assert_eq!(report.skipped_invalid, 1);
    }

    #[test]
    fn duplicate_articles_within_list_import_once() {
        let mut catalog = Catalog::default();
        let rows = [row("", "Cat", ""), row("A", "One", "1"), row("A", "Again", "2")];
        let report = import_price_list(&mut catalog, &rows, &ColumnMap::default(), &options());
        assert_eq!(report.added, 1);
        assert_eq!(report.skipped_existing, 1);
    }

    #[test]
    fn zero_prices() {
        assert!(!has_price(""));
        assert!(!has_price("0"));
        assert!(!has_price("0,00"));
        assert!(has_price("10"));
        assert!(has_price("0,50"));
    }
}
