//! Description assembly.
//!
//! Composes one rich-text document out of three independent feed blocks:
//! free-form text, a technical-specification table, and an accessory table.
//! Every emitted node carries a `[start, end]` span produced by a single running
//! counter shared across the whole document. The counter is a synthetic position
//! metric for the storefront's rich-text editor, not a substring index; how much
//! each node advances it is decided by an [`OffsetPolicy`].

use std::fmt::Write as _;

use quick_xml::escape::escape;
use serde::Serialize;

use catalogsync_shared::{DescriptionConfig, OffsetPolicyKind, is_present};

use crate::cleanup::{paragraph_fragments, strip_cdata};
use crate::table::TableParser;

// ---------------------------------------------------------------------------
// Document model
// ---------------------------------------------------------------------------

/// A `[start, end]` position pair. `end >= start` always holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        Self {
            start,
            end: end.max(start),
        }
    }
}

/// Which table-backed section a header or list belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Section {
    Tech,
    Equipment,
}

/// One `name: value` entry of a section list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ListItem {
    pub text: String,
    pub span: Span,
    /// Span of the wrapper nested inside the item.
    pub inner: Span,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BlockKind {
    Paragraph { text: String },
    SectionHeader { section: Section, label: String },
    List { section: Section, items: Vec<ListItem> },
}

/// A top-level node of the document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Block {
    #[serde(flatten)]
    pub kind: BlockKind,
    pub span: Span,
}

/// The assembled description: ordered blocks plus the final counter value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DescriptionDocument {
    pub blocks: Vec<Block>,
    pub length: usize,
}

impl DescriptionDocument {
    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// Render to the HTML stored in the catalog's description column.
    ///
    /// Paragraph text is inline markup from the feed and is emitted as is;
    /// labels and list items are escaped.
    pub fn to_html(&self) -> String {
        let mut html = String::new();
        for block in &self.blocks {
            let Span { start, end } = block.span;
            match &block.kind {
                BlockKind::Paragraph { text } => {
                    let _ = write!(html, "<p data-end=\"{end}\" data-start=\"{start}\">{text}</p>\n\n");
                }
                BlockKind::SectionHeader { label, .. } => {
                    let _ = write!(
                        html,
                        "<p data-end=\"{end}\" data-start=\"{start}\" style=\"font-weight: bold; font-size: 18px;\">{}:</p>\n\n",
                        escape(label.as_str())
                    );
                }
                BlockKind::List { items, .. } => {
                    let _ = writeln!(html, "<ul data-end=\"{end}\" data-start=\"{start}\">");
                    for item in items {
                        let _ = writeln!(
                            html,
                            "<li data-end=\"{}\" data-start=\"{}\">",
                            item.span.end, item.span.start
                        );
                        let _ = writeln!(
                            html,
                            "<div data-end=\"{}\" data-start=\"{}\" style=\"line-height:2;\">{}</div>",
                            item.inner.end,
                            item.inner.start,
                            escape(item.text.as_str())
                        );
                        html.push_str("</li>\n");
                    }
                    html.push_str("</ul>\n");
                }
            }
        }
        html
    }
}

// ---------------------------------------------------------------------------
// Offset policies
// ---------------------------------------------------------------------------

/// How far each node advances the running counter.
pub trait OffsetPolicy: std::fmt::Debug + Send + Sync {
    fn paragraph(&self, text: &str) -> usize;
    fn header(&self, section: Section, label: &str) -> usize;
    fn list_item(&self, item: &str) -> usize;
    /// Span of the wrapper nested inside an item occupying `item_span`.
    fn item_inner(&self, item: &str, item_span: Span) -> Span;
    /// Added after the last item, before the list closes.
    fn list_tail(&self) -> usize;
}

/// The padding constants the storefront editor has always been fed.
///
/// Paragraph `len + 20`, tech header `29`, equipment header `15`, item `len + 5`
/// with its inner wrapper spanning `[item_start, item_end - 2]`, list tail `10`.
#[derive(Debug, Clone, Copy, Default)]
pub struct LegacyEditorOffsets;

impl OffsetPolicy for LegacyEditorOffsets {
    fn paragraph(&self, text: &str) -> usize {
        char_len(text) + 20
    }

    fn header(&self, section: Section, _label: &str) -> usize {
        match section {
            Section::Tech => 29,
            Section::Equipment => 15,
        }
    }

    fn list_item(&self, item: &str) -> usize {
        char_len(item) + 5
    }

    fn item_inner(&self, _item: &str, item_span: Span) -> Span {
        Span::new(item_span.start, item_span.end.saturating_sub(2))
    }

    fn list_tail(&self) -> usize {
        10
    }
}

/// Visible characters only, one separator per node.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlainTextOffsets;

impl OffsetPolicy for PlainTextOffsets {
    fn paragraph(&self, text: &str) -> usize {
        char_len(text) + 1
    }

    fn header(&self, _section: Section, label: &str) -> usize {
        char_len(label) + 2
    }

    fn list_item(&self, item: &str) -> usize {
        char_len(item) + 1
    }

    fn item_inner(&self, item: &str, item_span: Span) -> Span {
        Span::new(item_span.start, item_span.start + char_len(item))
    }

    fn list_tail(&self) -> usize {
        0
    }
}

fn char_len(text: &str) -> usize {
    text.chars().count()
}

// ---------------------------------------------------------------------------
// Assembler
// ---------------------------------------------------------------------------

/// Which blocks to include and how to label them.
#[derive(Debug, Clone)]
pub struct AssembleOptions {
    pub include_tech: bool,
    pub include_equipment: bool,
    pub tech_heading: String,
    pub equipment_heading: String,
}

impl Default for AssembleOptions {
    fn default() -> Self {
        Self::from(&DescriptionConfig::default())
    }
}

impl From<&DescriptionConfig> for AssembleOptions {
    fn from(config: &DescriptionConfig) -> Self {
        Self {
            include_tech: config.include_tech,
            include_equipment: config.include_equipment,
            tech_heading: config.tech_heading.clone(),
            equipment_heading: config.equipment_heading.clone(),
        }
    }
}

impl AssembleOptions {
    fn heading(&self, section: Section) -> &str {
        match section {
            Section::Tech => &self.tech_heading,
            Section::Equipment => &self.equipment_heading,
        }
    }
}

/// Builds [`DescriptionDocument`]s from feed content.
#[derive(Debug)]
pub struct DescriptionAssembler {
    options: AssembleOptions,
    tables: TableParser,
    policy: Box<dyn OffsetPolicy>,
}

impl Default for DescriptionAssembler {
    fn default() -> Self {
        Self::new(
            AssembleOptions::default(),
            TableParser::default(),
            Box::new(LegacyEditorOffsets),
        )
    }
}

impl DescriptionAssembler {
    pub fn new(options: AssembleOptions, tables: TableParser, policy: Box<dyn OffsetPolicy>) -> Self {
        Self {
            options,
            tables,
            policy,
        }
    }

    /// Assembler configured from the `[description]` section.
    pub fn from_config(config: &DescriptionConfig) -> Self {
        let policy: Box<dyn OffsetPolicy> = match config.offset_policy {
            OffsetPolicyKind::Legacy => Box::new(LegacyEditorOffsets),
            OffsetPolicyKind::Plain => Box::new(PlainTextOffsets),
        };
        Self::new(
            AssembleOptions::from(config),
            TableParser::new(config.header_labels.iter().map(String::as_str)),
            policy,
        )
    }

    /// The table parser this assembler uses, shared with property extraction.
    pub fn tables(&self) -> &TableParser {
        &self.tables
    }

    /// Compose paragraphs, then the tech block, then the equipment block.
    pub fn assemble(
        &self,
        description: Option<&str>,
        tech: Option<&str>,
        equipment: Option<&str>,
    ) -> DescriptionDocument {
        let mut cursor = 0usize;
        let mut blocks = Vec::new();

        if let Some(text) = description {
            for fragment in paragraph_fragments(&strip_cdata(text)) {
                let start = cursor;
                cursor += self.policy.paragraph(&fragment);
                blocks.push(Block {
                    kind: BlockKind::Paragraph { text: fragment },
                    span: Span::new(start, cursor),
                });
            }
        }

        if self.options.include_tech {
            self.push_table_section(&mut blocks, &mut cursor, Section::Tech, tech);
        }
        if self.options.include_equipment {
            self.push_table_section(&mut blocks, &mut cursor, Section::Equipment, equipment);
        }

        DescriptionDocument {
            blocks,
            length: cursor,
        }
    }

    fn push_table_section(
        &self,
        blocks: &mut Vec<Block>,
        cursor: &mut usize,
        section: Section,
        markup: Option<&str>,
    ) {
        let Some(markup) = markup.map(strip_cdata).filter(|m| is_present(Some(m.as_str()))) else {
            return;
        };

        let label = self.options.heading(section).to_string();
        let start = *cursor;
        *cursor += self.policy.header(section, &label);
        blocks.push(Block {
            kind: BlockKind::SectionHeader { section, label },
            span: Span::new(start, *cursor),
        });

        let pairs = self.tables.parse(&markup);
        if pairs.is_empty() {
            return;
        }

        // The list's end is only known once every item has advanced the cursor.
        let list_start = *cursor;
        let mut items = Vec::with_capacity(pairs.len());
        for pair in &pairs {
            let text = pair.to_string();
            let item_start = *cursor;
            *cursor += self.policy.list_item(&text);
            let span = Span::new(item_start, *cursor);
            let inner = self.policy.item_inner(&text, span);
            items.push(ListItem { text, span, inner });
        }
        *cursor += self.policy.list_tail();

        blocks.push(Block {
            kind: BlockKind::List { section, items },
            span: Span::new(list_start, *cursor),
        });
    }
}
