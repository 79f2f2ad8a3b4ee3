//! Catalog/feed reconciliation.
//!
//! Joins catalog records to feed offers on `article_code == vendor_code` and fills
//! photo, description and property cells that are still missing. Property names
//! seen anywhere in the feed become catalog columns first, so the schema is
//! complete before any record is touched. Present values are never changed,
//! which makes a second run over the same inputs a no-op.

use std::collections::{HashMap, HashSet};

use serde::Serialize;
use tracing::{debug, info};

use catalogsync_feed::Feed;
use catalogsync_markup::DescriptionAssembler;
use catalogsync_shared::{
    AppConfig, Catalog, ColumnMap, FeedOffer, Field, PropertyPair, Result, is_present,
};

/// What one offer contributes to its catalog record.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DerivedOffer {
    pub photos: Option<String>,
    pub description_html: Option<String>,
    pub properties: Vec<PropertyPair>,
}

/// Counts from one reconciliation run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReconcileReport {
    pub offers: usize,
    pub offers_without_code: usize,
    pub matched_records: usize,
    pub unmatched_offers: usize,
    pub new_columns: Vec<String>,
    pub photos_filled: usize,
    pub descriptions_filled: usize,
    pub properties_filled: usize,
}

#[derive(Debug)]
pub struct Reconciler {
    columns: ColumnMap,
    assembler: DescriptionAssembler,
    photo_delimiter: String,
}

impl Reconciler {
    pub fn new(columns: ColumnMap, assembler: DescriptionAssembler, photo_delimiter: impl Into<String>) -> Self {
        Self {
            columns,
            assembler,
            photo_delimiter: photo_delimiter.into(),
        }
    }

    pub fn from_config(config: &AppConfig) -> Result<Self> {
        Ok(Self::new(
            config.catalog.column_map()?,
            DescriptionAssembler::from_config(&config.description),
            config.catalog.photo_delimiter.clone(),
        ))
    }

    pub fn columns(&self) -> &ColumnMap {
        &self.columns
    }

    /// Photos, rendered description and tech pairs for one offer.
    pub fn derive(&self, offer: &FeedOffer) -> DerivedOffer {
        let photos = offer
            .pictures
            .iter()
            .map(|p| p.trim())
            .filter(|p| !p.is_empty())
            .collect::<Vec<_>>()
            .join(self.photo_delimiter.as_str());

        let document = self.assembler.assemble(
            offer.description.as_deref(),
            offer.tech.as_deref(),
            offer.equipment.as_deref(),
        );

        DerivedOffer {
            photos: is_present(Some(photos.as_str())).then_some(photos),
            description_html: (!document.is_empty()).then(|| document.to_html()),
            properties: self.tech_pairs(offer),
        }
    }

    /// Accessory lists per vendor code, as `name: qty` pairs joined with `; `.
    pub fn accessory_lists(&self, feed: &Feed) -> HashMap<String, String> {
        feed.by_vendor_code()
            .into_iter()
            .filter_map(|(code, offer)| {
                let pairs = self.assembler.tables().parse(offer.equipment.as_deref()?);
                let list = pairs.iter().map(ToString::to_string).collect::<Vec<_>>().join("; ");
                (!list.is_empty()).then(|| (code.to_string(), list))
            })
            .collect()
    }

    fn tech_pairs(&self, offer: &FeedOffer) -> Vec<PropertyPair> {
        offer
            .tech
            .as_deref()
            .map(|tech| self.assembler.tables().parse(tech))
            .unwrap_or_default()
    }

    /// Merge `feed` into `catalog` in place.
    pub fn reconcile(&self, catalog: &mut Catalog, feed: &Feed) -> ReconcileReport {
        let mut report = ReconcileReport {
            offers: feed.len(),
            ..ReconcileReport::default()
        };

        // Property names come from every offer, coded or not, in feed order.
        let mut property_names: Vec<String> = Vec::new();
        let mut seen_names: HashSet<String> = HashSet::new();
        for offer in &feed.offers {
            for pair in self.tech_pairs(offer) {
                if seen_names.insert(pair.name.clone()) {
                    property_names.push(pair.name);
                }
            }
            if !is_present(offer.vendor_code.as_deref()) {
                report.offers_without_code += 1;
            }
        }

        let derived: HashMap<&str, DerivedOffer> = feed
            .by_vendor_code()
            .into_iter()
            .map(|(code, offer)| (code, self.derive(offer)))
            .collect();

        // Schema first: every column exists before any row is written.
        let photo_column = self.columns.header(Field::PhotoRefs).to_string();
        let description_column = self.columns.header(Field::Description).to_string();
        for column in [&photo_column, &description_column] {
            if catalog.ensure_column(column) {
                report.new_columns.push(column.clone());
            }
        }
        for name in &property_names {
            let column = self.columns.property_column(name);
            if catalog.ensure_column(&column) {
                debug!(%column, "added property column");
                report.new_columns.push(column);
            }
        }

        let article_column = self.columns.header(Field::ArticleCode);
        let mut matched_codes: HashSet<&str> = HashSet::new();
        for record in &mut catalog.records {
            let Some(code) = record.get(article_column).map(str::trim) else {
                continue;
            };
            let Some((&key, offer)) = derived.get_key_value(code) else {
                continue;
            };
            matched_codes.insert(key);
            report.matched_records += 1;

            if let Some(photos) = &offer.photos {
                report.photos_filled += usize::from(record.fill_missing(&photo_column, photos));
            }
            if let Some(html) = &offer.description_html {
                report.descriptions_filled +=
                    usize::from(record.fill_missing(&description_column, html));
            }
            for pair in &offer.properties {
                let column = self.columns.property_column(&pair.name);
                report.properties_filled += usize::from(record.fill_missing(&column, &pair.value));
            }
        }
        report.unmatched_offers = derived.len() - matched_codes.len();

        info!(
            offers = report.offers,
            matched = report.matched_records,
            new_columns = report.new_columns.len(),
            descriptions = report.descriptions_filled,
            properties = report.properties_filled,
            "reconciled catalog with feed"
        );
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use catalogsync_feed::parse_feed;
    use catalogsync_shared::{CatalogRecord, Schema};

    fn reconciler() -> Reconciler {
        Reconciler::new(ColumnMap::default(), DescriptionAssembler::default(), ";")
    }

    fn catalog() -> Catalog {
        let mut catalog = Catalog::new(Schema::new(
            ["article_code", "name", "photo_refs", "description"].map(String::from),
        ));
        catalog.push(CatalogRecord::from_pairs([
            ("article_code", "123"),
            ("name", "Drill"),
            ("photo_refs", ""),
            ("description", "  "),
        ]));
        catalog.push(CatalogRecord::from_pairs([
            ("article_code", "456"),
            ("name", "Gloves"),
            ("photo_refs", "old.jpg"),
            ("description", "<p>Existing</p>"),
        ]));
        catalog
    }

    fn feed() -> Feed {
        parse_feed(
            r#"<offers>
              <offer>
                <vendorCode>123</vendorCode>
                <picture>a.jpg</picture><picture>b.jpg</picture>
                <description><![CDATA[<p>Good tool</p>]]></description>
                <tech><![CDATA[<table><tr><td>Power</td><td>500W</td></tr></table>]]></tech>
              </offer>
              <offer>
                <vendorCode>456</vendorCode>
                <picture>new.jpg</picture>
                <description>New text</description>
              </offer>
              <offer>
                <tech><![CDATA[<table><tr><td>Weight</td><td>2 kg</td></tr></table>]]></tech>
              </offer>
              <offer><vendorCode>999</vendorCode></offer>
            </offers>"#,
        )
        .unwrap()
    }

    #[test]
    fn end_to_end_good_tool() {
        let mut catalog = catalog();
        let report = reconciler().reconcile(&mut catalog, &feed());

        let record = &catalog.records[0];
        let description = record.get("description").unwrap();
        assert!(description.contains(">Good tool</p>"));
        assert!(description.contains(">Technical characteristics:</p>"));
        assert!(description.contains(">Power: 500W</div>"));
        assert_eq!(record.get("photo_refs"), Some("a.jpg;b.jpg"));
        assert_eq!(record.get("property:Power"), Some("500W"));

        assert_eq!(report.matched_records, 2);
        assert_eq!(report.offers_without_code, 1);
        assert_eq!(report.unmatched_offers, 1);
    }

    #[test]
    fn schema_covers_every_feed_property() {
        let mut catalog = catalog();
        let report = reconciler().reconcile(&mut catalog, &feed());

        assert!(catalog.schema.contains("property:Power"));
        // Seen only on an offer without a vendor code.
        assert!(catalog.schema.contains("property:Weight"));
        assert_eq!(report.new_columns, vec!["property:Power", "property:Weight"]);
        assert_eq!(catalog.records[1].get("property:Power"), Some(""));
    }

    #[test]
    fn present_values_are_never_overwritten() {
        let mut catalog = catalog();
        reconciler().reconcile(&mut catalog, &feed());

        let gloves = &catalog.records[1];
        assert_eq!(gloves.get("photo_refs"), Some("old.jpg"));
        assert_eq!(gloves.get("description"), Some("<p>Existing</p>"));
    }

    #[test]
    fn second_run_is_a_no_op() {
        let mut once = catalog();
        reconciler().reconcile(&mut once, &feed());

        let mut twice = once.clone();
        let report = reconciler().reconcile(&mut twice, &feed());

        assert_eq!(once, twice);
        assert!(report.new_columns.is_empty());
        assert_eq!(report.descriptions_filled + report.photos_filled + report.properties_filled, 0);
    }

    #[test]
    fn article_code_is_matched_trimmed_and_never_written() {
        let mut catalog = catalog();
        catalog.records[0].set("article_code", " 123 ");
        reconciler().reconcile(&mut catalog, &feed());
        assert_eq!(catalog.records[0].get("article_code"), Some(" 123 "));
        assert_eq!(catalog.records[0].get("property:Power"), Some("500W"));
    }

    #[test]
    fn missing_fixed_columns_are_added() {
        let mut catalog = Catalog::new(Schema::new(["article_code".to_string()]));
        catalog.push(CatalogRecord::from_pairs([("article_code", "123")]));
        let report = reconciler().reconcile(&mut catalog, &feed());

        assert!(report.new_columns.contains(&"photo_refs".to_string()));
        assert_eq!(catalog.records[0].get("photo_refs"), Some("a.jpg;b.jpg"));
    }

    #[test]
    fn duplicate_vendor_codes_keep_last_offer() {
        let feed = parse_feed(
            r#"<offers>
              <offer><vendorCode>123</vendorCode><picture>first.jpg</picture></offer>
              <offer><vendorCode> 123 </vendorCode><picture>second.jpg</picture></offer>
            </offers>"#,
        )
        .unwrap();
        let mut catalog = catalog();
        let report = reconciler().reconcile(&mut catalog, &feed);

        assert_eq!(catalog.records[0].get("photo_refs"), Some("second.jpg"));
        assert_eq!(report.matched_records, 1);
        assert_eq!(report.unmatched_offers, 0);
    }

    #[test]
    fn accessory_lists_by_vendor_code() {
        let feed = parse_feed(
            r#"<offers>
              <offer>
                <vendorCode>123</vendorCode>
                <equipment><![CDATA[<table><tr><th>Name</th><th>Qty</th></tr><tr><td>Chuck key</td><td>1</td></tr><tr><td>Manual</td><td>1</td></tr></table>]]></equipment>
              </offer>
              <offer><vendorCode>456</vendorCode></offer>
            </offers>"#,
        )
        .unwrap();
        let lists = reconciler().accessory_lists(&feed);

        assert_eq!(lists.len(), 1);
        assert_eq!(lists["123"], "Chuck key: 1; Manual: 1");
    }
}
