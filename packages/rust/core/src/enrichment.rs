//! Checkpointed batch enrichment.
//!
//! Scans the catalog record by record, field by field. Every enrichable field
//! that is still missing gets one generation request; a successful non-empty
//! answer is written, a failure leaves the field absent and the loop moves on.
//! Every `checkpoint_every` records the whole catalog goes to a
//! [`CheckpointSink`]. A restarted run re-plans from the saved snapshot and
//! skips everything already filled.

use std::collections::HashMap;
use std::time::Duration;

use serde::Serialize;
use tracing::{info, instrument, warn};

use catalogsync_shared::{
    AppConfig, Catalog, CatalogRecord, CatalogSyncError, ColumnMap, Field, Result, Schema,
    TechnicalClassifier, is_present,
};

use crate::generator::{ContentGenerator, GenerationRequest};
use crate::prompts::{PromptBuilder, PromptContext};

/// Fields the loop may generate, in the order they are attempted.
pub const ENRICHABLE_FIELDS: [Field; 6] = [
    Field::SeoTitle,
    Field::MetaDescription,
    Field::MetaKeywords,
    Field::ShortDescription,
    Field::Description,
    Field::TechSpecs,
];

// ---------------------------------------------------------------------------
// Planning types
// ---------------------------------------------------------------------------

/// One (record, field) cell the loop looked at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EnrichmentTask {
    /// Index into `catalog.records`.
    pub record: usize,
    pub field: Field,
    /// The cell is missing and will be generated.
    pub needed: bool,
}

/// Missing-cell count for one enrichable field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FieldCount {
    pub field: Field,
    pub missing: usize,
}

/// A field the generator could not fill.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldFailure {
    pub article: String,
    pub field: Field,
    pub error: String,
}

/// Outcome of one enrichment pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct EnrichmentReport {
    pub records_scanned: usize,
    pub fields_generated: usize,
    pub fields_failed: usize,
    pub checkpoints: usize,
    pub failures: Vec<FieldFailure>,
}

// ---------------------------------------------------------------------------
// Checkpoints and progress
// ---------------------------------------------------------------------------

/// Receives the whole catalog at every checkpoint.
///
/// An error aborts the run; implementations are expected to have tried their
/// own fallback (a backup file) before returning one.
pub trait CheckpointSink {
    fn checkpoint(&mut self, catalog: &Catalog) -> Result<()>;
}

/// Discards checkpoints.
pub struct NoCheckpoints;

impl CheckpointSink for NoCheckpoints {
    fn checkpoint(&mut self, _catalog: &Catalog) -> Result<()> {
        Ok(())
    }
}

/// Progress callback for enrichment operations.
pub trait EnrichmentProgress: Send + Sync {
    /// Called when entering a new phase.
    fn phase(&self, name: &str);
    /// Task-level progress within the current phase.
    fn task_progress(&self, current: usize, total: usize, detail: &str);
}

/// No-op enrichment progress.
pub struct SilentEnrichmentProgress;

impl EnrichmentProgress for SilentEnrichmentProgress {
    fn phase(&self, _name: &str) {}
    fn task_progress(&self, _current: usize, _total: usize, _detail: &str) {}
}

// ---------------------------------------------------------------------------
// Enricher
// ---------------------------------------------------------------------------

/// Drives a [`ContentGenerator`] over a catalog.
#[derive(Debug)]
pub struct Enricher<G> {
    generator: G,
    columns: ColumnMap,
    prompts: PromptBuilder,
    classifier: TechnicalClassifier,
    request_delay: Duration,
    checkpoint_every: usize,
    /// Accessory lists keyed by trimmed article code.
    accessories: HashMap<String, String>,
}

impl<G: ContentGenerator> Enricher<G> {
    /// Defaults: 1 s pacing, checkpoint every 10 records.
    pub fn new(generator: G, columns: ColumnMap) -> Self {
        Self {
            generator,
            columns,
            prompts: PromptBuilder::default(),
            classifier: TechnicalClassifier::default(),
            request_delay: Duration::from_secs(1),
            checkpoint_every: 10,
            accessories: HashMap::new(),
        }
    }

    pub fn from_config(generator: G, config: &AppConfig) -> Result<Self> {
        Ok(Self::new(generator, config.catalog.column_map()?)
            .with_prompts(PromptBuilder::from(&config.generation))
            .with_classifier(TechnicalClassifier::from(&config.classifier))
            .with_request_delay(Duration::from_millis(config.generation.request_delay_ms))
            .with_checkpoint_every(config.generation.checkpoint_every))
    }

    pub fn with_prompts(mut self, prompts: PromptBuilder) -> Self {
        self.prompts = prompts;
        self
    }

    pub fn with_classifier(mut self, classifier: TechnicalClassifier) -> Self {
        self.classifier = classifier;
        self
    }

    /// Minimum pause after every generation call.
    pub fn with_request_delay(mut self, delay: Duration) -> Self {
        self.request_delay = delay;
        self
    }

    /// `0` is treated as `1`.
    pub fn with_checkpoint_every(mut self, records: usize) -> Self {
        self.checkpoint_every = records.max(1);
        self
    }

    /// Accessory lists quoted in prompts, keyed by article code.
    pub fn with_accessories(mut self, accessories: HashMap<String, String>) -> Self {
        self.accessories = accessories;
        self
    }

    pub fn columns(&self) -> &ColumnMap {
        &self.columns
    }

    /// Enrichable fields that apply to `record`. Tech specs only for technical products.
    pub fn fields_for(&self, record: &CatalogRecord) -> Vec<Field> {
        let technical = self.classifier.is_technical(
            record.get(self.columns.header(Field::Name)),
            record.get(self.columns.header(Field::CategoryPath)),
        );
        ENRICHABLE_FIELDS
            .into_iter()
            .filter(|f| *f != Field::TechSpecs || technical)
            .collect()
    }

    /// Classify every applicable (record, field) cell once.
    pub fn plan_tasks(&self, catalog: &Catalog) -> Vec<EnrichmentTask> {
        let mut tasks = Vec::new();
        for (index, record) in catalog.records.iter().enumerate() {
            for field in self.fields_for(record) {
                tasks.push(EnrichmentTask {
                    record: index,
                    field,
                    needed: record.is_missing(self.columns.header(field)),
                });
            }
        }
        tasks
    }

    /// Per enrichable field, how many records are missing it.
    pub fn missing_field_counts(&self, catalog: &Catalog) -> Vec<FieldCount> {
        let tasks = self.plan_tasks(catalog);
        ENRICHABLE_FIELDS
            .into_iter()
            .map(|field| FieldCount {
                field,
                missing: tasks.iter().filter(|t| t.needed && t.field == field).count(),
            })
            .collect()
    }

    /// Run one enrichment pass over `catalog`, mutating it in place.
    #[instrument(skip_all, fields(records = catalog.len()))]
    pub async fn enrich(
        &self,
        catalog: &mut Catalog,
        sink: &mut dyn CheckpointSink,
        progress: &dyn EnrichmentProgress,
    ) -> Result<EnrichmentReport> {
        for field in ENRICHABLE_FIELDS {
            catalog.ensure_column(self.columns.header(field));
        }

        let tasks = self.plan_tasks(catalog);
        let total = tasks.iter().filter(|t| t.needed).count();
        let mut report = EnrichmentReport::default();
        let mut done = 0;

        progress.phase("Generating content");
        info!(records = catalog.len(), tasks = total, "starting enrichment");

        let mut pending = tasks.into_iter().filter(|t| t.needed).peekable();
        for index in 0..catalog.records.len() {
            report.records_scanned += 1;

            while let Some(task) = pending.next_if(|t| t.record == index) {
                done += 1;
                let article = self.article(&catalog.records[index]);
                progress.task_progress(done, total, &format!("{article}: {}", task.field));

                let context = self.context(&catalog.records[index], &catalog.schema);
                let Some(request) = self.prompts.request(task.field, &context) else {
                    continue;
                };

                let outcome = self.generate(&request).await;

                match outcome {
                    Ok(text) => {
                        let column = self.columns.header(task.field);
                        if catalog.records[index].fill_missing(column, &text) {
                            report.fields_generated += 1;
                        }
                    }
                    Err(e) => {
                        warn!(%article, field = %task.field, error = %e, "generation failed, field left empty");
                        report.fields_failed += 1;
                        report.failures.push(FieldFailure {
                            article,
                            field: task.field,
                            error: e.to_string(),
                        });
                    }
                }
            }

            if (index + 1) % self.checkpoint_every == 0 {
                sink.checkpoint(catalog)?;
                report.checkpoints += 1;
                info!(records = index + 1, "checkpoint saved");
            }
        }

        info!(
            generated = report.fields_generated,
            failed = report.fields_failed,
            checkpoints = report.checkpoints,
            "enrichment complete"
        );
        Ok(report)
    }

    /// Generate every applicable field for one record without writing anything.
    pub async fn preview(
        &self,
        record: &CatalogRecord,
        schema: &Schema,
    ) -> Vec<(Field, Result<String>)> {
        let context = self.context(record, schema);
        let mut results = Vec::new();
        for field in self.fields_for(record) {
            let Some(request) = self.prompts.request(field, &context) else {
                continue;
            };
            results.push((field, self.generate(&request).await));
        }
        results
    }

    fn context(&self, record: &CatalogRecord, schema: &Schema) -> PromptContext {
        let mut context = PromptContext::from_record(record, schema, &self.columns);
        if let Some(list) = self.accessories.get(&self.article(record)) {
            context.accessories = list.clone();
        }
        context
    }

    /// One paced generator call. A blank answer counts as a failure.
    async fn generate(&self, request: &GenerationRequest) -> Result<String> {
        let outcome = self.generator.generate(request).await;
        self.pace().await;
        let text = outcome?;
        if !is_present(Some(text.as_str())) {
            return Err(CatalogSyncError::Generation("empty content".into()));
        }
        Ok(text)
    }

    fn article(&self, record: &CatalogRecord) -> String {
        record
            .get(self.columns.header(Field::ArticleCode))
            .unwrap_or("")
            .trim()
            .to_string()
    }

    async fn pace(&self) {
        if !self.request_delay.is_zero() {
            tokio::time::sleep(self.request_delay).await;
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
