//! Application configuration for catalogsync.
//!
//! User config lives at `~/.catalogsync/catalogsync.toml`.
//! CLI flags override config file values, which override defaults.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::classify::{CATEGORY_KEYWORDS, NAME_KEYWORDS};
use crate::error::{CatalogSyncError, Result};
use crate::types::{ColumnMap, Field};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "catalogsync.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".catalogsync";

// ---------------------------------------------------------------------------
// Config structs (matching catalogsync.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// OpenRouter settings.
    #[serde(default)]
    pub openrouter: OpenRouterConfig,

    /// Enrichment loop pacing and prompt settings.
    #[serde(default)]
    pub generation: GenerationConfig,

    /// Tabular store layout.
    #[serde(default)]
    pub catalog: CatalogConfig,

    /// Description assembly.
    #[serde(default)]
    pub description: DescriptionConfig,

    /// Technical-product detection keywords.
    #[serde(default)]
    pub classifier: ClassifierConfig,

    /// Price-list import.
    #[serde(default)]
    pub import: ImportConfig,
}

/// `[openrouter]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenRouterConfig {
    /// Name of the env var holding the API key (never store the key itself).
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,

    /// Default model to use for enrichment.
    #[serde(default = "default_model")]
    pub default_model: String,

    /// API base URL; `/chat/completions` is appended.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Per-request timeout.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for OpenRouterConfig {
    fn default() -> Self {
        Self {
            api_key_env: default_api_key_env(),
            default_model: default_model(),
            base_url: default_base_url(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_api_key_env() -> String {
    "OPENROUTER_API_KEY".into()
}
fn default_model() -> String {
    "deepseek/deepseek-chat".into()
}
fn default_base_url() -> String {
    "https://openrouter.ai/api/v1".into()
}
fn default_timeout_secs() -> u64 {
    120
}

/// `[generation]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationConfig {
    /// Minimum pause after every generation call.
    #[serde(default = "default_request_delay_ms")]
    pub request_delay_ms: u64,

    /// Records between checkpoint snapshots.
    #[serde(default = "default_checkpoint_every")]
    pub checkpoint_every: usize,

    /// Output budget for short fields (titles, keywords, meta, short description).
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// Output budget for long description and tech specs.
    #[serde(default = "default_long_max_tokens")]
    pub long_max_tokens: u32,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Language the generated copy should be written in.
    #[serde(default = "default_language")]
    pub language: String,

    #[serde(default = "default_system_prompt")]
    pub system_prompt: String,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            request_delay_ms: default_request_delay_ms(),
            checkpoint_every: default_checkpoint_every(),
            max_tokens: default_max_tokens(),
            long_max_tokens: default_long_max_tokens(),
            temperature: default_temperature(),
            language: default_language(),
            system_prompt: default_system_prompt(),
        }
    }
}

fn default_request_delay_ms() -> u64 {
    1000
}
fn default_checkpoint_every() -> usize {
    10
}
fn default_max_tokens() -> u32 {
    150
}
fn default_long_max_tokens() -> u32 {
    300
}
fn default_temperature() -> f32 {
    0.7
}
fn default_language() -> String {
    "English".into()
}
fn default_system_prompt() -> String {
    "You are an expert in SEO and product copywriting for online stores.".into()
}

/// `[catalog]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogConfig {
    /// Single-byte field delimiter of the store.
    #[serde(default = "default_delimiter")]
    pub delimiter: String,

    /// Separator used when joining picture references into the photo column.
    #[serde(default = "default_photo_delimiter")]
    pub photo_delimiter: String,

    #[serde(default = "default_property_prefix")]
    pub property_prefix: String,

    #[serde(default)]
    pub property_suffix: String,

    /// Header overrides for the fixed fields, keyed by field name (`article_code`, ...).
    #[serde(default)]
    pub columns: BTreeMap<String, String>,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            delimiter: default_delimiter(),
            photo_delimiter: default_photo_delimiter(),
            property_prefix: default_property_prefix(),
            property_suffix: String::new(),
            columns: BTreeMap::new(),
        }
    }
}

fn default_delimiter() -> String {
    ";".into()
}
fn default_photo_delimiter() -> String {
    ";".into()
}
fn default_property_prefix() -> String {
    "property:".into()
}

impl CatalogConfig {
    /// The delimiter as the single ASCII byte the store reader expects.
    pub fn delimiter_byte(&self) -> Result<u8> {
        single_byte("catalog.delimiter", &self.delimiter)
    }

    /// Resolve the runtime column map.
    pub fn column_map(&self) -> Result<ColumnMap> {
        let mut overrides = Vec::with_capacity(self.columns.len());
        for (key, header) in &self.columns {
            let field: Field = key.parse().map_err(|e| {
                CatalogSyncError::config(format!("[catalog.columns]: {e}"))
            })?;
            if !header.trim().is_empty() {
                overrides.push((field, header.clone()));
            }
        }
        Ok(ColumnMap::new(
            overrides,
            self.property_prefix.clone(),
            self.property_suffix.clone(),
        ))
    }
}

/// How synthetic node offsets are computed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OffsetPolicyKind {
    /// Fixed padding constants expected by the storefront's rich-text editor.
    #[default]
    Legacy,
    /// Visible character counts only.
    Plain,
}

/// `[description]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DescriptionConfig {
    #[serde(default = "default_true")]
    pub include_tech: bool,

    #[serde(default = "default_true")]
    pub include_equipment: bool,

    #[serde(default = "default_tech_heading")]
    pub tech_heading: String,

    #[serde(default = "default_equipment_heading")]
    pub equipment_heading: String,

    #[serde(default)]
    pub offset_policy: OffsetPolicyKind,

    /// First-cell labels marking a table header row.
    #[serde(default = "default_header_labels")]
    pub header_labels: Vec<String>,
}

impl Default for DescriptionConfig {
    fn default() -> Self {
        Self {
            include_tech: true,
            include_equipment: true,
            tech_heading: default_tech_heading(),
            equipment_heading: default_equipment_heading(),
            offset_policy: OffsetPolicyKind::default(),
            header_labels: default_header_labels(),
        }
    }
}

fn default_true() -> bool {
    true
}
fn default_tech_heading() -> String {
    "Technical characteristics".into()
}
fn default_equipment_heading() -> String {
    "Accessories".into()
}
fn default_header_labels() -> Vec<String> {
    ["Name", "Characteristic", "Value", "Наименование", "Характеристика", "Значение"]
        .into_iter()
        .map(String::from)
        .collect()
}

/// `[classifier]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassifierConfig {
    #[serde(default = "default_name_keywords")]
    pub name_keywords: Vec<String>,

    #[serde(default = "default_category_keywords")]
    pub category_keywords: Vec<String>,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            name_keywords: default_name_keywords(),
            category_keywords: default_category_keywords(),
        }
    }
}

fn default_name_keywords() -> Vec<String> {
    NAME_KEYWORDS.iter().map(|k| (*k).to_string()).collect()
}
fn default_category_keywords() -> Vec<String> {
    CATEGORY_KEYWORDS.iter().map(|k| (*k).to_string()).collect()
}

/// `[import]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportConfig {
    /// Field delimiter of the price list.
    #[serde(default = "default_price_delimiter")]
    pub delimiter: String,

    /// Prepended to the price-list category heading to form the category path.
    #[serde(default)]
    pub category_prefix: String,

    /// Prepended to every imported product name (e.g. a brand).
    #[serde(default)]
    pub name_prefix: String,

    /// Appended to every imported price (e.g. `,00`).
    #[serde(default)]
    pub price_suffix: String,

    /// Constant values written into new records, keyed by column header.
    #[serde(default)]
    pub extra_columns: BTreeMap<String, String>,
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self {
            delimiter: default_price_delimiter(),
            category_prefix: String::new(),
            name_prefix: String::new(),
            price_suffix: String::new(),
            extra_columns: BTreeMap::new(),
        }
    }
}

fn default_price_delimiter() -> String {
    ",".into()
}

impl ImportConfig {
    pub fn delimiter_byte(&self) -> Result<u8> {
        single_byte("import.delimiter", &self.delimiter)
    }
}

fn single_byte(key: &str, value: &str) -> Result<u8> {
    match value.as_bytes() {
        [b] if b.is_ascii() => Ok(*b),
        _ => Err(CatalogSyncError::config(format!(
            "{key} must be a single ASCII character, got {value:?}"
        ))),
    }
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.catalogsync/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| CatalogSyncError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.catalogsync/catalogsync.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| CatalogSyncError::io(path, e))?;

    let config: AppConfig = toml::from_str(&content).map_err(|e| {
        CatalogSyncError::config(format!("failed to parse {}: {e}", path.display()))
    })?;
    config.catalog.delimiter_byte()?;
    config.import.delimiter_byte()?;
    config.catalog.column_map()?;
    Ok(config)
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| CatalogSyncError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| CatalogSyncError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| CatalogSyncError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}

/// Read the OpenRouter API key from the env var named in the config.
///
/// Only enrichment needs the key; reconciliation runs without it.
pub fn resolve_api_key(config: &AppConfig) -> Result<String> {
    let var_name = &config.openrouter.api_key_env;
    match std::env::var(var_name) {
        Ok(val) if !val.trim().is_empty() => Ok(val.trim().to_string()),
        _ => Err(CatalogSyncError::config(format!(
            "OpenRouter API key not found. Set the {var_name} environment variable.\n\
             Get a key at https://openrouter.ai/keys"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_serializes() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize default config");
        assert!(toml_str.contains("checkpoint_every"));
        assert!(toml_str.contains("OPENROUTER_API_KEY"));
    }

    #[test]
    fn config_roundtrip() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize");
        let parsed: AppConfig = toml::from_str(&toml_str).expect("deserialize");
        assert_eq!(parsed.generation.checkpoint_every, 10);
        assert_eq!(parsed.generation.request_delay_ms, 1000);
        assert_eq!(parsed.openrouter.api_key_env, "OPENROUTER_API_KEY");
        assert_eq!(parsed.description.offset_policy, OffsetPolicyKind::Legacy);
    }

    #[test]
    fn config_with_column_overrides() {
        let toml_str = r#"
[catalog]
delimiter = ","
property_prefix = "Свойство: "
property_suffix = ":"

[catalog.columns]
article_code = "Артикул"
name = "Наименование"

[description]
include_tech = false
offset_policy = "plain"

[import.extra_columns]
currency = "RUB"
"#;
        let config: AppConfig = toml::from_str(toml_str).expect("parse");
        assert_eq!(config.catalog.delimiter_byte().unwrap(), b',');

        let map = config.catalog.column_map().expect("column map");
        assert_eq!(map.header(Field::ArticleCode), "Артикул");
        assert_eq!(map.header(Field::Name), "Наименование");
        assert_eq!(map.header(Field::Price), "price");
        assert_eq!(map.property_column("Мощность"), "Свойство: Мощность:");

        assert!(!config.description.include_tech);
        assert!(config.description.include_equipment);
        assert_eq!(config.description.offset_policy, OffsetPolicyKind::Plain);
        assert_eq!(config.import.extra_columns["currency"], "RUB");
    }

    #[test]
    fn unknown_column_key_rejected() {
        let mut config = CatalogConfig::default();
        config.columns.insert("colour".into(), "Цвет".into());
        assert!(config.column_map().is_err());
    }

    #[test]
    fn bad_delimiter_rejected() {
        let mut config = CatalogConfig::default();
        config.delimiter = ";;".into();
        assert!(config.delimiter_byte().is_err());
    }

    #[test]
    fn api_key_resolution() {
        let mut config = AppConfig::default();
        // Use a unique env var name to avoid interfering with other tests
        config.openrouter.api_key_env = "CS_TEST_NONEXISTENT_KEY_12345".into();
        let result = resolve_api_key(&config);
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("API key not found"));
    }
}
