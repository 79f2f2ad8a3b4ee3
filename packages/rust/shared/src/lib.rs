//! Shared types, error model, and configuration for catalogsync.
//!
//! This crate is the foundation depended on by all other catalogsync crates.
//! It provides:
//! - [`CatalogSyncError`]: the unified error type
//! - Domain types ([`Catalog`], [`CatalogRecord`], [`FeedOffer`], [`PropertyPair`], [`Field`])
//! - The field-completeness classifier ([`is_present`], [`TechnicalClassifier`])
//! - Configuration ([`AppConfig`], config loading)

pub mod classify;
pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use classify::{CATEGORY_KEYWORDS, NAME_KEYWORDS, TechnicalClassifier, is_present};
pub use config::{
    AppConfig, CatalogConfig, ClassifierConfig, DescriptionConfig,
    GenerationConfig, ImportConfig, OffsetPolicyKind, OpenRouterConfig, config_dir,
    config_file_path, init_config, load_config, load_config_from, resolve_api_key,
};
pub use error::{CatalogSyncError, Result};
pub use types::{Catalog, CatalogRecord, ColumnMap, FeedOffer, Field, PropertyPair, Schema};
