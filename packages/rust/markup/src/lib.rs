//! Rich-text handling for feed content.
//!
//! Feed offers carry HTML fragments, often wrapped in CDATA: a free-text
//! description plus embedded tables for technical properties and accessories.
//! This crate cleans those fragments, extracts ordered name/value pairs from the
//! tables, and assembles the structured description document stored in the catalog.

mod cleanup;
mod description;
mod table;

pub use cleanup::{
    clean_generated_text, collapse_whitespace, paragraph_fragments, strip_cdata,
    strip_reasoning_markers, strip_tags,
};
pub use description::{
    AssembleOptions, Block, BlockKind, DescriptionAssembler, DescriptionDocument,
    LegacyEditorOffsets, ListItem, OffsetPolicy, PlainTextOffsets, Section, Span,
};
pub use table::{TableParser, parse_table};
