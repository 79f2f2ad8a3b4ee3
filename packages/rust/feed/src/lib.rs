//! Feed-document reader.
//!
//! The feed is a YML-style XML document with repeated `offer` elements. Each
//! offer carries a `vendorCode`, optional `name`, rich-text children
//! (`description`, `tech`, `equipment`) and any number of `picture` references.
//! The feed is only ever read.

use std::borrow::Cow;
use std::collections::HashMap;
use std::path::Path;

use quick_xml::Reader;
use quick_xml::escape::unescape;
use quick_xml::events::Event;
use tracing::{debug, info, instrument};

use catalogsync_shared::{CatalogSyncError, FeedOffer, Result, is_present};

const CDATA_OPEN: &str = "<![CDATA[";
const CDATA_CLOSE: &str = "]]>";

// ---------------------------------------------------------------------------
// Feed
// ---------------------------------------------------------------------------

/// All offers of one feed document, in document order.
#[derive(Debug, Clone, Default)]
pub struct Feed {
    pub offers: Vec<FeedOffer>,
}

impl Feed {
    pub fn len(&self) -> usize {
        self.offers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.offers.is_empty()
    }

    /// Offers keyed by trimmed vendor code. Offers without one are left out.
    ///
    /// When several offers share a code the last one wins.
    pub fn by_vendor_code(&self) -> HashMap<&str, &FeedOffer> {
        let mut index = HashMap::with_capacity(self.offers.len());
        for offer in &self.offers {
            if let Some(code) = offer.vendor_code.as_deref().filter(|c| is_present(Some(*c))) {
                if index.insert(code.trim(), offer).is_some() {
                    debug!(vendor_code = code.trim(), "duplicate vendor code in feed, keeping last");
                }
            }
        }
        index
    }
}

// ---------------------------------------------------------------------------
// Loading
// ---------------------------------------------------------------------------

/// Read and parse the feed document at `path`.
#[instrument(skip_all, fields(path = %path.display()))]
pub fn load_feed(path: &Path) -> Result<Feed> {
    if !path.exists() {
        return Err(CatalogSyncError::missing_source("feed document", path));
    }
    let content =
        std::fs::read_to_string(path).map_err(|e| CatalogSyncError::io(path, e))?;
    let feed = parse_feed(&content)?;
    info!(offers = feed.len(), "loaded feed");
    Ok(feed)
}

/// Parse feed XML into offers.
pub fn parse_feed(xml: &str) -> Result<Feed> {
    let xml = xml.strip_prefix('\u{feff}').unwrap_or(xml);
    let mut reader = Reader::from_str(xml);
    let mut offers = Vec::new();
    let mut current: Option<FeedOffer> = None;

    loop {
        let event = reader
            .read_event()
            .map_err(|e| parse_error(&reader, e))?;
        match event {
            Event::Start(e) => {
                let tag = e.name().as_ref().to_vec();
                if tag == b"offer" {
                    current = Some(FeedOffer::default());
                    continue;
                }
                let Some(offer) = current.as_mut() else {
                    continue;
                };
                if !matches!(
                    tag.as_slice(),
                    b"vendorCode" | b"name" | b"picture" | b"description" | b"tech" | b"equipment"
                ) {
                    continue;
                }

                let end = e.to_end().into_owned();
                let raw = reader
                    .read_text(end.name())
                    .map_err(|e| parse_error(&reader, e))?;
                let text = decode_markup(&raw);

                match tag.as_slice() {
                    b"vendorCode" => offer.vendor_code = scalar(&text),
                    b"name" => offer.name = scalar(&text),
                    b"picture" => offer.pictures.extend(scalar(&text)),
                    b"description" => offer.description = markup(text),
                    b"tech" => offer.tech = markup(text),
                    b"equipment" => offer.equipment = markup(text),
                    _ => {}
                }
            }
            Event::End(e) if e.name().as_ref() == b"offer" => {
                if let Some(offer) = current.take() {
                    offers.push(offer);
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if current.is_some() {
        return Err(CatalogSyncError::parse("feed ended inside an <offer> element"));
    }

    Ok(Feed { offers })
}

fn parse_error(reader: &Reader<&[u8]>, err: quick_xml::Error) -> CatalogSyncError {
    CatalogSyncError::parse(format!(
        "feed XML error at byte {}: {err}",
        reader.error_position()
    ))
}

// ---------------------------------------------------------------------------
// Text decoding
// ---------------------------------------------------------------------------

/// CDATA sections are taken literally; everything around them is entity-unescaped.
fn decode_markup(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut rest = raw;

    while let Some(open) = rest.find(CDATA_OPEN) {
        out.push_str(&unescape_lossy(&rest[..open]));
        let inner = &rest[open + CDATA_OPEN.len()..];
        match inner.find(CDATA_CLOSE) {
            Some(close) => {
                out.push_str(&inner[..close]);
                rest = &inner[close + CDATA_CLOSE.len()..];
            }
            None => {
                out.push_str(inner);
                rest = "";
            }
        }
    }
    out.push_str(&unescape_lossy(rest));
    out
}

/// Unknown entities (`&nbsp;` and friends) leave the text untouched.
fn unescape_lossy(text: &str) -> Cow<'_, str> {
    unescape(text).unwrap_or(Cow::Borrowed(text))
}

fn scalar(text: &str) -> Option<String> {
    let trimmed = text.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

fn markup(text: String) -> Option<String> {
    is_present(Some(text.as_str())).then_some(text)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixture() -> Feed {
        let content = std::fs::read_to_string("../../../fixtures/feed/sample_feed.xml")
            .expect("read fixture");
        parse_feed(&content).expect("parse fixture")
    }

    #[test]
    fn parses_fixture_offers() {
        let feed = fixture();
        assert_eq!(feed.len(), 3);

        let first = &feed.offers[0];
        assert_eq!(first.vendor_code.as_deref(), Some("123"));
        assert_eq!(first.name.as_deref(), Some("Bench drill DM-13"));
        assert_eq!(first.pictures.len(), 2);
        assert_eq!(first.description.as_deref(), Some("<p>Good tool</p>"));
        assert!(first.tech.as_deref().unwrap().starts_with("<table>"));
        assert!(first.equipment.is_some());
    }

    #[test]
    fn escaped_markup_is_unescaped() {
        let feed = fixture();
        let second = &feed.offers[1];
        assert_eq!(second.vendor_code.as_deref(), Some("456"));
        assert_eq!(second.name.as_deref(), Some("Gloves & mitts"));
        assert_eq!(second.description.as_deref(), Some("<p>Warm &amp; soft</p>"));
        assert_eq!(
            second.tech.as_deref(),
            Some("<table><tr><td>Size</td><td>XL</td></tr></table>")
        );
        assert!(second.equipment.is_none());
    }

    #[test]
    fn offers_without_code_are_kept_but_not_indexed() {
        let feed = fixture();
        assert!(feed.offers[2].vendor_code.is_none());

        let index = feed.by_vendor_code();
        assert_eq!(index.len(), 2);
        assert!(index.contains_key("123"));
        assert!(index.contains_key("456"));
    }

    #[test]
    fn duplicate_codes_keep_last() {
        let feed = parse_feed(
            "<offers><offer><vendorCode>1</vendorCode><name>A</name></offer>\
             <offer><vendorCode>1</vendorCode><name>B</name></offer></offers>",
        )
        .unwrap();
        assert_eq!(feed.by_vendor_code()["1"].name.as_deref(), Some("B"));
    }

    #[test]
    fn nested_raw_tags_are_preserved() {
        let feed = parse_feed(
            "<offer><vendorCode>9</vendorCode><description><p>Raw <b>bold</b></p></description></offer>",
        )
        .unwrap();
        assert_eq!(
            feed.offers[0].description.as_deref(),
            Some("<p>Raw <b>bold</b></p>")
        );
    }

    #[test]
    fn blank_children_become_none() {
        let feed = parse_feed(
            "<offer><vendorCode>  </vendorCode><tech><![CDATA[  ]]></tech><picture/></offer>",
        )
        .unwrap();
        let offer = &feed.offers[0];
        assert!(offer.vendor_code.is_none());
        assert!(offer.tech.is_none());
        assert!(offer.pictures.is_empty());
    }

    #[test]
    fn malformed_xml_is_parse_error() {
        let err = parse_feed("<offers><offer><name>x</offer>").unwrap_err();
        assert!(matches!(err, CatalogSyncError::Parse { .. }));
    }

    #[test]
    fn missing_file_is_missing_source() {
        let err = load_feed(Path::new("/definitely/not/here/feed.xml")).unwrap_err();
        assert!(matches!(err, CatalogSyncError::MissingSource { .. }));
    }
}
