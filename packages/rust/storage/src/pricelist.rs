//! Supplier price-list reader.
//!
//! Price lists are positional: the first three columns are article, name and
//! price, everything after is ignored. The first line is a header row.

use std::path::Path;

use catalogsync_shared::{CatalogSyncError, Result};

/// One positional row of a price list. Category headings have a blank article.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PriceRow {
    pub article: String,
    pub name: String,
    pub price: String,
}

/// Read the price list at `path`.
pub fn load_price_list(path: &Path, delimiter: u8) -> Result<Vec<PriceRow>> {
    if !path.exists() {
        return Err(CatalogSyncError::missing_source("price list", path));
    }
    let bytes = std::fs::read(path).map_err(|e| CatalogSyncError::io(path, e))?;
    parse_price_list(&bytes, delimiter)
}

pub(crate) fn parse_price_list(bytes: &[u8], delimiter: u8) -> Result<Vec<PriceRow>> {
    let bytes = bytes.strip_prefix(crate::BOM).unwrap_or(bytes);
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .flexible(true)
        .has_headers(true)
        .from_reader(bytes);

    let mut rows = Vec::new();
    for (line, record) in reader.records().enumerate() {
        let record = record.map_err(|e| {
            CatalogSyncError::parse(format!("price list row {}: {e}", line + 2))
        })?;
        let cell = |i: usize| trim_cell(record.get(i));
        rows.push(PriceRow {
            article: cell(0),
            name: cell(1),
            price: cell(2),
        });
    }
    Ok(rows)
}

/// Spreadsheet exports write `nan` for empty cells.
fn trim_cell(cell: Option<&str>) -> String {
    match cell.map(str::trim) {
        Some(v) if !v.eq_ignore_ascii_case("nan") => v.to_string(),
        _ => String::new(),
    }
}
