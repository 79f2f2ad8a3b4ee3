//! Cleanup pass over generated short-copy fields.

use tracing::info;

use catalogsync_markup::clean_generated_text;
use catalogsync_shared::{Catalog, ColumnMap, Field};

/// Fields cleaned when none are given.
pub const DEFAULT_CLEAN_FIELDS: &[Field] = &[
    Field::SeoTitle,
    Field::MetaKeywords,
    Field::MetaDescription,
    Field::ShortDescription,
];

/// Strip markdown emphasis and quotes from every present value in `fields`.
///
/// Returns the number of cells that changed.
pub fn clean_generated_fields(catalog: &mut Catalog, columns: &ColumnMap, fields: &[Field]) -> usize {
    let mut changed = 0;
    for field in fields {
        let column = columns.header(*field);
        if !catalog.schema.contains(column) {
            continue;
        }
        for record in &mut catalog.records {
            let Some(value) = record.get(column).filter(|v| !v.trim().is_empty()) else {
                continue;
            };
            let cleaned = clean_generated_text(value);
            if cleaned != value {
                record.set(column, cleaned);
                changed += 1;
            }
        }
    }
    info!(changed, fields = fields.len(), "cleaned generated fields");
    changed
}

#[cfg(test)]
mod tests {
    use super::*;
    use catalogsync_shared::CatalogRecord;

    #[test]
    fn cleans_only_listed_present_fields() {
        let mut catalog = Catalog::default();
        catalog.push(CatalogRecord::from_pairs([
            ("seo_title", "**\"Bench drill\"**  DM-13"),
            ("meta_keywords", "drill, 'bench'"),
            ("description", "<p class=\"x\">Keep \"quotes\"</p>"),
            ("short_description", ""),
        ]));

        let changed = clean_generated_fields(&mut catalog, &ColumnMap::default(), DEFAULT_CLEAN_FIELDS);

        let r = &catalog.records[0];
        assert_eq!(changed, 2);
        assert_eq!(r.get("seo_title"), Some("Bench drill DM-13"));
        assert_eq!(r.get("meta_keywords"), Some("drill, bench"));
        assert_eq!(r.get("description"), Some("<p class=\"x\">Keep \"quotes\"</p>"));
        assert_eq!(r.get("short_description"), Some(""));
    }

    #[test]
    fn already_clean_is_unchanged() {
        let mut catalog = Catalog::default();
        catalog.push(CatalogRecord::from_pairs([("seo_title", "Clean title")]));
        assert_eq!(clean_generated_fields(&mut catalog, &ColumnMap::default(), &[Field::SeoTitle]), 0);
    }
}
