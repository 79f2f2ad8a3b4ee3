//! CLI command definitions, routing, and tracing setup.

use std::io::Write;
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, eyre};
use catalogsync_core::clean::DEFAULT_CLEAN_FIELDS;
use catalogsync_core::enrichment::Enricher;
use catalogsync_core::generator::{ContentGenerator, OpenRouterGenerator};
use catalogsync_core::pipeline::{self, ProgressReporter};
use catalogsync_shared::{AppConfig, Field, init_config, load_config, load_config_from, resolve_api_key};
use catalogsync_storage::{SnapshotOutcome, sibling_path};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// CatalogSync: keep a product catalog in step with a supplier feed.
#[derive(Parser)]
#[command(
    name = "catalogsync",
    version,
    about = "Reconcile a product catalog with a supplier feed and fill missing copy.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Config file (defaults to ~/.catalogsync/catalogsync.toml).
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Fill photos, descriptions and properties from a supplier feed.
    Reconcile {
        /// Catalog file to read.
        #[arg(long)]
        catalog: PathBuf,

        /// Supplier XML feed.
        #[arg(long)]
        feed: PathBuf,

        /// Output file (defaults to <catalog>_reconciled.<ext>).
        #[arg(short, long)]
        out: Option<PathBuf>,
    },

    /// Generate missing SEO and description fields.
    Enrich {
        /// Catalog file to read.
        #[arg(long)]
        catalog: PathBuf,

        /// Output file (defaults to <catalog>_enriched.<ext>).
        #[arg(short, long)]
        out: Option<PathBuf>,

        /// Model id, overriding the configured default.
        #[arg(long, env = "CATALOGSYNC_MODEL")]
        model: Option<String>,

        /// Supplier XML feed to quote accessory lists from.
        #[arg(long)]
        feed: Option<PathBuf>,

        /// Skip the confirmation prompt.
        #[arg(short, long)]
        yes: bool,
    },

    /// Append new products from a supplier price list.
    ImportPrices {
        /// Catalog file to read.
        #[arg(long)]
        catalog: PathBuf,

        /// Price list (article, name, price).
        #[arg(long)]
        prices: PathBuf,

        /// Output file (defaults to <catalog>_imported.<ext>).
        #[arg(short, long)]
        out: Option<PathBuf>,

        /// Skip the confirmation prompt.
        #[arg(short, long)]
        yes: bool,
    },

    /// Strip markdown and quotes from generated fields.
    Clean {
        /// Catalog file to read.
        #[arg(long)]
        catalog: PathBuf,

        /// Output file (defaults to <catalog>_cleaned.<ext>).
        #[arg(short, long)]
        out: Option<PathBuf>,

        /// Fields to clean (comma-separated). Defaults to the short SEO fields.
        #[arg(long, value_delimiter = ',')]
        fields: Vec<Field>,
    },

    /// Generate every field for one product without saving anything.
    Preview {
        /// Catalog file to read.
        #[arg(long)]
        catalog: PathBuf,

        /// Article code of the product.
        #[arg(long)]
        article: String,

        /// Model id, overriding the configured default.
        #[arg(long, env = "CATALOGSYNC_MODEL")]
        model: Option<String>,

        /// Supplier XML feed to quote accessory lists from.
        #[arg(long)]
        feed: Option<PathBuf>,
    },

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init,
    /// Show resolved configuration.
    Show,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "catalogsync=info",
        1 => "catalogsync=debug",
        _ => "catalogsync=trace",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .with_writer(std::io::stderr)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    let config_path = cli.config.as_deref();
    match cli.command {
        Command::Reconcile { catalog, feed, out } => {
            cmd_reconcile(config_path, &catalog, &feed, out.as_deref())
        }
        Command::Enrich {
            catalog,
            out,
            model,
            feed,
            yes,
        } => cmd_enrich(config_path, &catalog, out.as_deref(), model, feed.as_deref(), yes).await,
        Command::ImportPrices {
            catalog,
            prices,
            out,
            yes,
        } => cmd_import_prices(config_path, &catalog, &prices, out.as_deref(), yes),
        Command::Clean {
            catalog,
            out,
            fields,
        } => cmd_clean(config_path, &catalog, out.as_deref(), &fields),
        Command::Preview {
            catalog,
            article,
            model,
            feed,
        } => cmd_preview(config_path, &catalog, &article, model, feed.as_deref()).await,
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init(),
            ConfigAction::Show => cmd_config_show(config_path),
        },
    }
}

fn with_feed<G: ContentGenerator>(
    enricher: Enricher<G>,
    feed: Option<&Path>,
    config: &AppConfig,
) -> Result<Enricher<G>> {
    let Some(feed) = feed else {
        return Ok(enricher);
    };
    let accessories = pipeline::load_accessories(feed, config)?;
    info!(feed = %feed.display(), products = accessories.len(), "loaded accessory lists");
    Ok(enricher.with_accessories(accessories))
}

fn resolve_config(path: Option<&Path>) -> Result<AppConfig> {
    Ok(match path {
        Some(path) => load_config_from(path)?,
        None => load_config()?,
    })
}

// ---------------------------------------------------------------------------
// Command handlers
// ---------------------------------------------------------------------------

fn cmd_reconcile(config_path: Option<&Path>, catalog: &Path, feed: &Path, out: Option<&Path>) -> Result<()> {
    let config = resolve_config(config_path)?;
    let output = out
        .map(Path::to_path_buf)
        .unwrap_or_else(|| sibling_path(catalog, "_reconciled"));

    info!(catalog = %catalog.display(), feed = %feed.display(), "reconciling catalog");

    let reporter = CliProgress::new();
    let outcome = pipeline::reconcile_files(catalog, feed, &output, &config, &reporter)?;
    let report = &outcome.report;

    println!();
    println!("  Catalog reconciled!");
    println!("  Offers:       {} ({} without vendor code)", report.offers, report.offers_without_code);
    println!("  Matched:      {}", report.matched_records);
    println!("  Unmatched:    {}", report.unmatched_offers);
    println!("  New columns:  {}", report.new_columns.len());
    println!("  Photos:       {}", report.photos_filled);
    println!("  Descriptions: {}", report.descriptions_filled);
    println!("  Properties:   {}", report.properties_filled);
    print_snapshot(&outcome.snapshot);
    println!("  Time:         {:.1}s", outcome.elapsed.as_secs_f64());
    println!();

    Ok(())
}

async fn cmd_enrich(
    config_path: Option<&Path>,
    catalog_path: &Path,
    out: Option<&Path>,
    model: Option<String>,
    feed: Option<&Path>,
    yes: bool,
) -> Result<()> {
    let config = resolve_config(config_path)?;
    let api_key = resolve_api_key(&config)?;
    let generator = OpenRouterGenerator::new(&config.openrouter, &config.generation, api_key, model)?;
    let output = out
        .map(Path::to_path_buf)
        .unwrap_or_else(|| sibling_path(catalog_path, "_enriched"));

    let mut catalog = pipeline::open_catalog(catalog_path, &config)?;
    let model_id = generator.model().to_string();
    let enricher = with_feed(Enricher::from_config(generator, &config)?, feed, &config)?;

    let counts = enricher.missing_field_counts(&catalog);
    let total: usize = counts.iter().map(|c| c.missing).sum();

    println!();
    println!("  Records: {}", catalog.len());
    println!("  Model:   {model_id}");
    println!("  Missing fields:");
    for count in &counts {
        println!("    {:<18} {}", count.field.to_string(), count.missing);
    }
    println!();

    if total == 0 {
        println!("  Nothing to generate.");
        return Ok(());
    }
    if !yes && !confirm(&format!("Generate {total} fields?"))? {
        println!("  Aborted.");
        return Ok(());
    }

    info!(catalog = %catalog_path.display(), model = %model_id, tasks = total, "enriching catalog");

    let reporter = CliProgress::new();
    let outcome = pipeline::enrich_catalog(&mut catalog, &enricher, &output, &config, &reporter).await?;
    let report = &outcome.report;

    println!();
    println!("  Enrichment complete!");
    println!("  Records:     {}", report.records_scanned);
    println!("  Generated:   {}", report.fields_generated);
    println!("  Failed:      {}", report.fields_failed);
    println!("  Checkpoints: {}", report.checkpoints);
    print_snapshot(&outcome.snapshot);
    println!("  Time:        {:.1}s", outcome.elapsed.as_secs_f64());
    for failure in &report.failures {
        println!("    ! {} {}: {}", failure.article, failure.field, failure.error);
    }
    println!();

    Ok(())
}

fn cmd_import_prices(
    config_path: Option<&Path>,
    catalog: &Path,
    prices: &Path,
    out: Option<&Path>,
    yes: bool,
) -> Result<()> {
    let config = resolve_config(config_path)?;
    let output = out
        .map(Path::to_path_buf)
        .unwrap_or_else(|| sibling_path(catalog, "_imported"));

    if !yes
        && !confirm(&format!(
            "Import products from {} into {}?",
            prices.display(),
            output.display()
        ))?
    {
        println!("  Aborted.");
        return Ok(());
    }

    let reporter = CliProgress::new();
    let outcome = pipeline::import_prices_file(catalog, prices, &output, &config, &reporter)?;
    let report = &outcome.report;

    println!();
    println!("  Price list imported!");
    println!("  Rows:       {}", report.rows);
    println!("  Categories: {}", report.categories);
    println!("  Added:      {}", report.added);
    println!("  Existing:   {}", report.skipped_existing);
    println!("  Invalid:    {}", report.skipped_invalid);
    print_snapshot(&outcome.snapshot);
    println!();

    Ok(())
}

fn cmd_clean(config_path: Option<&Path>, catalog: &Path, out: Option<&Path>, fields: &[Field]) -> Result<()> {
    let config = resolve_config(config_path)?;
    let output = out
        .map(Path::to_path_buf)
        .unwrap_or_else(|| sibling_path(catalog, "_cleaned"));
    let fields = if fields.is_empty() {
        DEFAULT_CLEAN_FIELDS
    } else {
        fields
    };

    let reporter = CliProgress::new();
    let outcome = pipeline::clean_file(catalog, &output, fields, &config, &reporter)?;

    println!();
    println!("  Cleaned {} cells", outcome.report);
    print_snapshot(&outcome.snapshot);
    println!();

    Ok(())
}

async fn cmd_preview(
    config_path: Option<&Path>,
    catalog_path: &Path,
    article: &str,
    model: Option<String>,
    feed: Option<&Path>,
) -> Result<()> {
    let config = resolve_config(config_path)?;
    let api_key = resolve_api_key(&config)?;
    let generator = OpenRouterGenerator::new(&config.openrouter, &config.generation, api_key, model)?;

    let catalog = pipeline::open_catalog(catalog_path, &config)?;
    let enricher = with_feed(Enricher::from_config(generator, &config)?, feed, &config)?;
    let article_column = enricher.columns().header(Field::ArticleCode);
    let record = catalog
        .records
        .iter()
        .find(|r| r.get(article_column).map(str::trim) == Some(article.trim()))
        .ok_or_else(|| eyre!("article '{article}' not found in {}", catalog_path.display()))?;

    let spinner = CliProgress::new();
    spinner.phase(&format!("Generating preview for {article}"));
    let results = enricher.preview(record, &catalog.schema).await;
    spinner.finish();

    for (field, result) in results {
        println!();
        println!("== {field} ==");
        match result {
            Ok(text) => println!("{text}"),
            Err(e) => println!("error: {e}"),
        }
    }
    println!();

    Ok(())
}

fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

fn cmd_config_show(config_path: Option<&Path>) -> Result<()> {
    let config = resolve_config(config_path)?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}

fn print_snapshot(snapshot: &SnapshotOutcome) {
    match snapshot {
        SnapshotOutcome::Primary(path) => println!("  Saved to:   {}", path.display()),
        SnapshotOutcome::Backup { path, primary_error } => {
            println!("  Saved to backup: {}", path.display());
            println!("  (primary write failed: {primary_error})");
        }
    }
}

fn confirm(question: &str) -> Result<bool> {
    print!("  {question} [y/N] ");
    std::io::stdout().flush()?;
    let mut answer = String::new();
    std::io::stdin().read_line(&mut answer)?;
    Ok(matches!(answer.trim().to_lowercase().as_str(), "y" | "yes"))
}

// ---------------------------------------------------------------------------
// CLI progress reporter
// ---------------------------------------------------------------------------

/// CLI progress reporter using indicatif spinners.
struct CliProgress {
    spinner: ProgressBar,
}

impl CliProgress {
    fn new() -> Self {
        let spinner = ProgressBar::new_spinner();
        spinner.set_style(
            ProgressStyle::with_template("{spinner:.cyan} {msg}")
                .expect("valid template")
                .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
        );
        spinner.enable_steady_tick(std::time::Duration::from_millis(80));
        Self { spinner }
    }

    fn finish(&self) {
        self.spinner.finish_and_clear();
    }
}

impl ProgressReporter for CliProgress {
    fn phase(&self, name: &str) {
        self.spinner.set_message(name.to_string());
    }

    fn task_progress(&self, current: usize, total: usize, detail: &str) {
        self.spinner
            .set_message(format!("Generating [{current}/{total}] {detail}"));
    }

    fn done(&self, _snapshot: &SnapshotOutcome) {
        self.finish();
    }
}
