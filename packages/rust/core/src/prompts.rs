//! Field-specific prompt catalogue.

use catalogsync_markup::strip_tags;
use catalogsync_shared::{CatalogRecord, ColumnMap, Field, GenerationConfig, Schema};

use crate::generator::GenerationRequest;

/// Characters of existing description quoted in the meta-description prompt.
const DESCRIPTION_EXCERPT_CHARS: usize = 100;
/// Characters of technical context quoted in the long-description prompt.
const TECH_EXCERPT_CHARS: usize = 300;
/// Characters of the accessory list quoted in the long-description prompt.
const ACCESSORY_EXCERPT_CHARS: usize = 200;

/// What a prompt may say about one record.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PromptContext {
    pub name: String,
    pub category: String,
    pub price: String,
    /// Existing description as plain text.
    pub description: String,
    /// Known technical data: property columns and the tech-spec field, tags stripped.
    pub technical: String,
    /// Accessory list from the feed, `name: qty` pairs. Not stored in the catalog.
    pub accessories: String,
}

impl PromptContext {
    pub fn from_record(record: &CatalogRecord, schema: &Schema, columns: &ColumnMap) -> Self {
        let cell = |field: Field| record.get(columns.header(field)).unwrap_or("").trim().to_string();

        let mut technical: Vec<String> = schema
            .columns()
            .iter()
            .filter_map(|column| {
                let name = columns.property_name(column)?;
                let value = record.get(column)?.trim();
                (!value.is_empty()).then(|| format!("{name}: {value}"))
            })
            .collect();
        let specs = strip_tags(record.get(columns.header(Field::TechSpecs)).unwrap_or(""));
        if !specs.is_empty() {
            technical.push(specs);
        }

        Self {
            name: cell(Field::Name),
            category: cell(Field::CategoryPath),
            price: cell(Field::Price),
            description: strip_tags(record.get(columns.header(Field::Description)).unwrap_or("")),
            technical: technical.join("; "),
            accessories: String::new(),
        }
    }
}

/// Builds a [`GenerationRequest`] per enrichable field.
#[derive(Debug, Clone)]
pub struct PromptBuilder {
    language: String,
    max_tokens: u32,
    long_max_tokens: u32,
}

impl Default for PromptBuilder {
    fn default() -> Self {
        Self::from(&GenerationConfig::default())
    }
}

impl From<&GenerationConfig> for PromptBuilder {
    fn from(config: &GenerationConfig) -> Self {
        Self {
            language: config.language.clone(),
            max_tokens: config.max_tokens,
            long_max_tokens: config.long_max_tokens,
        }
    }
}

impl PromptBuilder {
    /// `None` for fields that are never generated (article code, price, ...).
    pub fn request(&self, field: Field, ctx: &PromptContext) -> Option<GenerationRequest> {
        let lang = &self.language;
        let PromptContext {
            name,
            category,
            price,
            ..
        } = ctx;

        let (prompt, max_tokens) = match field {
            Field::SeoTitle => (
                format!(
                    "Create an SEO title for the product:\n\
                     Name: {name}\nCategory: {category}\nPrice: {price}\n\n\
                     Requirements:\n\
                     - Up to 60 characters\n\
                     - Include the main keywords\n\
                     - Attractive for search engines\n\
                     - Written in {lang}\n\n\
                     Return only the title without any additional text."
                ),
                self.max_tokens,
            ),
            Field::MetaDescription => (
                format!(
                    "Create a META description for the product:\n\
                     Name: {name}\nCategory: {category}\nPrice: {price}\nDescription: {}\n\n\
                     Requirements:\n\
                     - 150-160 characters\n\
                     - Attractive for shoppers\n\
                     - Mention the price and the main characteristics\n\
                     - Written in {lang}\n\n\
                     Return only the description without any additional text.",
                    excerpt(&ctx.description, DESCRIPTION_EXCERPT_CHARS)
                ),
                self.max_tokens,
            ),
            Field::MetaKeywords => (
                format!(
                    "Create META keywords for the product:\n\
                     Name: {name}\nCategory: {category}\n\n\
                     Requirements:\n\
                     - 5-10 keywords separated by commas\n\
                     - Relevant to the product\n\
                     - Written in {lang}\n\
                     - No repetitions\n\n\
                     Return only the comma-separated keywords."
                ),
                self.max_tokens,
            ),
            Field::ShortDescription => (
                format!(
                    "Create a short description for the product:\n\
                     Name: {name}\nCategory: {category}\nPrice: {price}\n\n\
                     Requirements:\n\
                     - 1-2 sentences\n\
                     - Up to 200 characters\n\
                     - The main benefits of the product\n\
                     - Attractive for shoppers\n\
                     - Written in {lang}\n\n\
                     Return only the short description without any additional text."
                ),
                self.max_tokens,
            ),
            Field::Description => (
                format!(
                    "Create a product description based on the technical data:\n\
                     Name: {name}\nCategory: {category}\nTechnical data: {}\n{}\n\
                     Requirements:\n\
                     - 2-3 paragraphs\n\
                     - Purpose and benefits of the product\n\
                     - Its main technical features\n\
                     - Attractive for shoppers\n\
                     - Written in {lang}\n\n\
                     Return only the description without any additional text.",
                    excerpt(&ctx.technical, TECH_EXCERPT_CHARS),
                    accessories_line(&ctx.accessories)
                ),
                self.long_max_tokens,
            ),
            Field::TechSpecs => (
                format!(
                    "Create a list of technical specifications for the product:\n\
                     Name: {name}\nCategory: {category}\nKnown data: {}\n\n\
                     Requirements:\n\
                     - 5-8 lines in the form \"Characteristic: value\"\n\
                     - Only characteristics typical for this kind of product\n\
                     - Written in {lang}\n\n\
                     Return only the list without any additional text.",
                    excerpt(&ctx.technical, TECH_EXCERPT_CHARS)
                ),
                self.long_max_tokens,
            ),
            Field::ArticleCode | Field::Name | Field::CategoryPath | Field::Price | Field::PhotoRefs => {
                return None;
            }
        };

        Some(GenerationRequest { prompt, max_tokens })
    }
}

fn accessories_line(accessories: &str) -> String {
    if accessories.trim().is_empty() {
        String::new()
    } else {
        format!("Accessories: {}\n", excerpt(accessories, ACCESSORY_EXCERPT_CHARS))
    }
}

/// First `max_chars` characters, with an ellipsis when cut.
fn excerpt(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}
