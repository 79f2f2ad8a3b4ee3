//! File-level workflows: load inputs, run one operation, persist a snapshot.
//!
//! Every input is loaded before anything is written, so a missing source aborts
//! with nothing on disk.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Instant;

use tracing::{info, instrument, warn};

use catalogsync_feed::load_feed;
use catalogsync_shared::{AppConfig, Catalog, Field, Result};
use catalogsync_storage::{CatalogStore, SnapshotOutcome, load_price_list};

use crate::clean::clean_generated_fields;
use crate::enrichment::{CheckpointSink, EnrichmentProgress, EnrichmentReport, Enricher};
use crate::generator::ContentGenerator;
use crate::pricelist::{ImportOptions, ImportReport, import_price_list};
use crate::reconcile::{ReconcileReport, Reconciler};

// ---------------------------------------------------------------------------
// Progress
// ---------------------------------------------------------------------------

/// Progress callback for reporting pipeline status.
pub trait ProgressReporter: Send + Sync {
    /// Called when entering a new phase.
    fn phase(&self, name: &str);
    /// Called per generated field during enrichment.
    fn task_progress(&self, current: usize, total: usize, detail: &str);
    /// Called once the output snapshot is written.
    fn done(&self, snapshot: &SnapshotOutcome);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentProgress;

impl ProgressReporter for SilentProgress {
    fn phase(&self, _name: &str) {}
    fn task_progress(&self, _current: usize, _total: usize, _detail: &str) {}
    fn done(&self, _snapshot: &SnapshotOutcome) {}
}

/// Adapts a `ProgressReporter` to the `EnrichmentProgress` interface.
struct ProgressAdapter<'a> {
    inner: &'a dyn ProgressReporter,
}

impl EnrichmentProgress for ProgressAdapter<'_> {
    fn phase(&self, name: &str) {
        self.inner.phase(name);
    }

    fn task_progress(&self, current: usize, total: usize, detail: &str) {
        self.inner.task_progress(current, total, detail);
    }
}

// ---------------------------------------------------------------------------
// Checkpoint sink backed by the store
// ---------------------------------------------------------------------------

/// Writes checkpoints through [`CatalogStore::save_snapshot`].
pub struct SnapshotSink {
    store: CatalogStore,
    path: PathBuf,
}

impl SnapshotSink {
    pub fn new(store: CatalogStore, path: impl Into<PathBuf>) -> Self {
        Self {
            store,
            path: path.into(),
        }
    }
}

impl CheckpointSink for SnapshotSink {
    fn checkpoint(&mut self, catalog: &Catalog) -> Result<()> {
        let outcome = self.store.save_snapshot(catalog, &self.path)?;
        if outcome.is_backup() {
            warn!(backup = %outcome.path().display(), "checkpoint went to backup file");
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Operations
// ---------------------------------------------------------------------------

/// Result of a workflow that writes one snapshot.
#[derive(Debug)]
pub struct Outcome<R> {
    pub report: R,
    pub snapshot: SnapshotOutcome,
    pub elapsed: std::time::Duration,
}

/// Load the catalog at `path` with the configured delimiter.
pub fn open_catalog(path: &Path, config: &AppConfig) -> Result<Catalog> {
    store(config)?.load(path)
}

/// Reconcile `catalog_path` with `feed_path` and write the result to `output`.
#[instrument(skip_all, fields(catalog = %catalog_path.display(), feed = %feed_path.display()))]
pub fn reconcile_files(
    catalog_path: &Path,
    feed_path: &Path,
    output: &Path,
    config: &AppConfig,
    progress: &dyn ProgressReporter,
) -> Result<Outcome<ReconcileReport>> {
    let start = Instant::now();
    let store = store(config)?;
    let reconciler = Reconciler::from_config(config)?;

    progress.phase("Loading catalog");
    let mut catalog = store.load(catalog_path)?;
    progress.phase("Loading feed");
    let feed = load_feed(feed_path)?;

    progress.phase("Reconciling");
    let report = reconciler.reconcile(&mut catalog, &feed);

    progress.phase("Saving catalog");
    let snapshot = store.save_snapshot(&catalog, output)?;
    progress.done(&snapshot);

    info!(output = %snapshot.path().display(), "reconcile finished");
    Ok(Outcome {
        report,
        snapshot,
        elapsed: start.elapsed(),
    })
}

/// Enrich an already loaded catalog, checkpointing to and finally saving at `output`.
#[instrument(skip_all, fields(records = catalog.len(), output = %output.display()))]
pub async fn enrich_catalog<G: ContentGenerator>(
    catalog: &mut Catalog,
    enricher: &Enricher<G>,
    output: &Path,
    config: &AppConfig,
    progress: &dyn ProgressReporter,
) -> Result<Outcome<EnrichmentReport>> {
    let start = Instant::now();
    let store = store(config)?;
    let mut sink = SnapshotSink::new(store, output);

    let report = enricher
        .enrich(catalog, &mut sink, &ProgressAdapter { inner: progress })
        .await?;

    progress.phase("Saving catalog");
    let snapshot = store.save_snapshot(catalog, output)?;
    progress.done(&snapshot);

    Ok(Outcome {
        report,
        snapshot,
        elapsed: start.elapsed(),
    })
}

/// Append the products of a price list to the catalog.
#[instrument(skip_all, fields(catalog = %catalog_path.display(), prices = %prices_path.display()))]
pub fn import_prices_file(
    catalog_path: &Path,
    prices_path: &Path,
    output: &Path,
    config: &AppConfig,
    progress: &dyn ProgressReporter,
) -> Result<Outcome<ImportReport>> {
    let start = Instant::now();
    let store = store(config)?;
    let columns = config.catalog.column_map()?;

    progress.phase("Loading catalog");
    let mut catalog = store.load(catalog_path)?;
    progress.phase("Loading price list");
    let rows = load_price_list(prices_path, config.import.delimiter_byte()?)?;

    progress.phase("Importing");
    let report = import_price_list(
        &mut catalog,
        &rows,
        &columns,
        &ImportOptions::from(&config.import),
    );

    progress.phase("Saving catalog");
    let snapshot = store.save_snapshot(&catalog, output)?;
    progress.done(&snapshot);

    Ok(Outcome {
        report,
        snapshot,
        elapsed: start.elapsed(),
    })
}

/// Clean generated short-copy fields and save. Returns the number of changed cells.
#[instrument(skip_all, fields(catalog = %catalog_path.display()))]
pub fn clean_file(
    catalog_path: &Path,
    output: &Path,
    fields: &[Field],
    config: &AppConfig,
    progress: &dyn ProgressReporter,
) -> Result<Outcome<usize>> {
    let start = Instant::now();
    let store = store(config)?;
    let columns = config.catalog.column_map()?;

    progress.phase("Loading catalog");
    let mut catalog = store.load(catalog_path)?;

    progress.phase("Cleaning");
    let changed = clean_generated_fields(&mut catalog, &columns, fields);

    progress.phase("Saving catalog");
    let snapshot = store.save_snapshot(&catalog, output)?;
    progress.done(&snapshot);

    Ok(Outcome {
        report: changed,
        snapshot,
        elapsed: start.elapsed(),
    })
}

/// Accessory lists of the feed at `feed_path`, keyed by vendor code.
pub fn load_accessories(feed_path: &Path, config: &AppConfig) -> Result<HashMap<String, String>> {
    let feed = load_feed(feed_path)?;
    Ok(Reconciler::from_config(config)?.accessory_lists(&feed))
}

fn store(config: &AppConfig) -> Result<CatalogStore> {
    Ok(CatalogStore::new(config.catalog.delimiter_byte()?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generator::GenerationRequest;
    use catalogsync_shared::CatalogSyncError;
    use uuid::Uuid;

    fn temp_dir() -> PathBuf {
        let dir = std::env::temp_dir().join(format!("catalogsync_pipeline_{}", Uuid::now_v7()));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    const CATALOG: &str = "../../../fixtures/catalog/sample_catalog.csv";
    const FEED: &str = "../../../fixtures/feed/sample_feed.xml";

    #[test]
    fn reconcile_fixtures() {
        let dir = temp_dir();
        let output = dir.join("catalog_reconciled.csv");
        let config = AppConfig::default();

        let outcome = reconcile_files(
            Path::new(CATALOG),
            Path::new(FEED),
            &output,
            &config,
            &SilentProgress,
        )
        .unwrap();

        assert!(!outcome.snapshot.is_backup());
        assert_eq!(outcome.report.matched_records, 2);

        let catalog = open_catalog(&output, &config).unwrap();
        let drill = &catalog.records[0];
        assert_eq!(drill.get("property:Power"), Some("500W"));
        assert_eq!(drill.get("property:Chuck"), Some("13 mm"));
        assert_eq!(
            drill.get("photo_refs"),
            Some("https://cdn.example.com/123-1.jpg;https://cdn.example.com/123-2.jpg")
        );
        let description = drill.get("description").unwrap();
        assert!(description.contains("Good tool"));
        assert!(description.contains(">Chuck key: 1</div>"));

        let gloves = &catalog.records[1];
        assert_eq!(gloves.get("description"), Some("<p>Existing</p>"));
        assert_eq!(gloves.get("property:Size"), Some("XL"));
        assert!(catalog.schema.contains("property:Weight"));

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn missing_feed_writes_nothing() {
        let dir = temp_dir();
        let output = dir.join("out.csv");

        let err = reconcile_files(
            Path::new(CATALOG),
            &dir.join("missing.xml"),
            &output,
            &AppConfig::default(),
            &SilentProgress,
        )
        .unwrap_err();

        assert!(matches!(err, CatalogSyncError::MissingSource { .. }));
        assert!(!output.exists());

        std::fs::remove_dir_all(&dir).ok();
    }

    struct EchoGenerator;

    impl ContentGenerator for EchoGenerator {
        async fn generate(&self, request: &GenerationRequest) -> Result<String> {
            Ok(format!("generated {}", request.max_tokens))
        }
    }

    #[tokio::test]
    async fn enrich_saves_checkpoints_and_final_snapshot() {
        let dir = temp_dir();
        let output = dir.join("catalog_enriched.csv");
        let mut config = AppConfig::default();
        config.generation.request_delay_ms = 0;
        config.generation.checkpoint_every = 2;

        let mut catalog = open_catalog(Path::new(CATALOG), &config).unwrap();
        let enricher = Enricher::from_config(EchoGenerator, &config).unwrap();
        let outcome = enrich_catalog(&mut catalog, &enricher, &output, &config, &SilentProgress)
            .await
            .unwrap();

        assert_eq!(outcome.report.checkpoints, 1);
        assert!(outcome.report.fields_generated > 0);

        let saved = open_catalog(&output, &config).unwrap();
        assert_eq!(saved.records[0].get("seo_title"), Some("generated 150"));
        // Technical by category ("machines"), so tech specs are generated too.
        assert_eq!(saved.records[0].get("tech_specs"), Some("generated 300"));
        // Present values survive.
        assert_eq!(saved.records[1].get("seo_title"), Some("Gloves"));

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn accessories_from_feed_file() {
        let lists = load_accessories(Path::new(FEED), &AppConfig::default()).unwrap();
        assert!(lists["123"].contains("Chuck key: 1"), "{lists:?}");
    }

    #[test]
    fn import_and_clean_files() {
        let dir = temp_dir();
        let prices = dir.join("prices.csv");
        std::fs::write(&prices, "a,b,c\n,Grinders,\nG-1,Angle grinder 125,4500\n").unwrap();
        let imported = dir.join("imported.csv");
        let mut config = AppConfig::default();
        config.import.price_suffix = ",00".into();

        let outcome = import_prices_file(Path::new(CATALOG), &prices, &imported, &config, &SilentProgress)
            .unwrap();
        assert_eq!(outcome.report.added, 1);

        let cleaned = dir.join("cleaned.csv");
        let outcome = clean_file(&imported, &cleaned, &[Field::Price], &config, &SilentProgress).unwrap();
        assert_eq!(outcome.report, 0);

        let catalog = open_catalog(&cleaned, &config).unwrap();
        assert_eq!(catalog.len(), 4);
        assert_eq!(catalog.records[3].get("price"), Some("4500,00"));

        std::fs::remove_dir_all(&dir).ok();
    }
}
