//! Core domain logic for CatalogSync.
//!
//! This crate ties together feed parsing, description assembly, content
//! generation, and catalog persistence into end-to-end workflows
//! (e.g., `reconcile_files`, `enrich_catalog`).

pub mod clean;
pub mod enrichment;
pub mod generator;
pub mod pipeline;
pub mod pricelist;
pub mod prompts;
pub mod reconcile;
