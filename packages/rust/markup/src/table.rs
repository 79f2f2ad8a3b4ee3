//! Structured-table extraction.
//!
//! Feeds embed technical properties and accessory lists as HTML tables. Only the
//! first table is read; each row contributes its first two cells as a pair.

use scraper::{ElementRef, Html, Selector};
use tracing::debug;

use catalogsync_shared::{PropertyPair, is_present};

use crate::cleanup::{collapse_whitespace, strip_cdata};

/// First-cell labels that mark a header row when no configuration is given.
const DEFAULT_HEADER_LABELS: &[&str] = &["Name", "Characteristic", "Value"];

/// Extracts ordered [`PropertyPair`]s from the first table in a markup fragment.
#[derive(Debug, Clone)]
pub struct TableParser {
    header_labels: Vec<String>,
}

impl Default for TableParser {
    fn default() -> Self {
        Self::new(DEFAULT_HEADER_LABELS.iter().copied())
    }
}

impl TableParser {
    pub fn new<'a>(header_labels: impl IntoIterator<Item = &'a str>) -> Self {
        Self {
            header_labels: header_labels
                .into_iter()
                .map(normalize_label)
                .filter(|l| !l.is_empty())
                .collect(),
        }
    }

    /// Parse the first table of `markup` into pairs, in row order.
    ///
    /// Never fails: markup without a table, or one that cannot be read, yields
    /// an empty vector.
    pub fn parse(&self, markup: &str) -> Vec<PropertyPair> {
        let cleaned = strip_cdata(markup);
        if !is_present(Some(&cleaned)) {
            return Vec::new();
        }

        let doc = Html::parse_fragment(&cleaned);
        let table_sel = Selector::parse("table").expect("valid selector");
        let tr_sel = Selector::parse("tr").expect("valid selector");

        let Some(table) = doc.select(&table_sel).next() else {
            debug!(len = cleaned.len(), "no table in markup");
            return Vec::new();
        };

        let mut pairs = Vec::new();
        for row in table.select(&tr_sel) {
            let cells: Vec<String> = row
                .children()
                .filter_map(ElementRef::wrap)
                .filter(|cell| matches!(cell.value().name(), "td" | "th"))
                .map(|cell| cell_text(&cell))
                .collect();

            let [name, value, ..] = cells.as_slice() else {
                continue;
            };
            if name.is_empty() || value.is_empty() || self.is_header_label(name) {
                continue;
            }
            pairs.push(PropertyPair::new(name.clone(), value.clone()));
        }

        pairs
    }

    fn is_header_label(&self, cell: &str) -> bool {
        let cell = normalize_label(cell);
        self.header_labels.iter().any(|l| *l == cell)
    }
}

/// Parse with the default header labels.
pub fn parse_table(markup: &str) -> Vec<PropertyPair> {
    TableParser::default().parse(markup)
}

fn cell_text(cell: &ElementRef) -> String {
    collapse_whitespace(&cell.text().collect::<Vec<_>>().join(" "))
}

fn normalize_label(label: &str) -> String {
    label.trim().trim_end_matches(':').trim().to_lowercase()
}
