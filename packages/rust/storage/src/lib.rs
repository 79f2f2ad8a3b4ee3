//! Delimiter-separated catalog store.
//!
//! The [`CatalogStore`] reads and writes the tabular catalog as UTF-8 text with a
//! leading byte-order mark, a header row and a configurable single-byte delimiter.
//!
//! **Write rules:**
//! - Snapshots go to a temporary sibling file first and are renamed into place.
//! - If that fails, [`CatalogStore::save_snapshot`] writes a timestamped backup
//!   (`{stem}_backup_{YYYYmmdd_HHMMSS}.{ext}`) next to the target instead.
//! - Only when the backup also fails is a `Persistence` error returned.

mod pricelist;

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use tracing::{debug, error, info, warn};

use catalogsync_shared::{Catalog, CatalogRecord, CatalogSyncError, Result, Schema};

pub use pricelist::{PriceRow, load_price_list};

const BOM: &[u8] = b"\xEF\xBB\xBF";

/// Where a snapshot actually landed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SnapshotOutcome {
    /// Written to the requested path.
    Primary(PathBuf),
    /// The requested path failed; the catalog was saved to a backup file.
    Backup {
        path: PathBuf,
        primary_error: String,
    },
}

impl SnapshotOutcome {
    pub fn path(&self) -> &Path {
        match self {
            Self::Primary(path) | Self::Backup { path, .. } => path,
        }
    }

    pub fn is_backup(&self) -> bool {
        matches!(self, Self::Backup { .. })
    }
}

/// Catalog file handle settings.
#[derive(Debug, Clone, Copy)]
pub struct CatalogStore {
    delimiter: u8,
}

impl CatalogStore {
    pub fn new(delimiter: u8) -> Self {
        Self { delimiter }
    }

    // -----------------------------------------------------------------------
    // Reading
    // -----------------------------------------------------------------------

    /// Load the catalog at `path`. Short rows are padded with blank cells;
    /// rows longer than the header are rejected.
    pub fn load(&self, path: &Path) -> Result<Catalog> {
        if !path.exists() {
            return Err(CatalogSyncError::missing_source("catalog", path));
        }
        let bytes = std::fs::read(path).map_err(|e| CatalogSyncError::io(path, e))?;
        let catalog = self.parse(&bytes)?;
        info!(
            path = %path.display(),
            records = catalog.len(),
            columns = catalog.schema.len(),
            "loaded catalog"
        );
        Ok(catalog)
    }

    /// Parse catalog text already in memory.
    pub fn parse(&self, bytes: &[u8]) -> Result<Catalog> {
        let bytes = bytes.strip_prefix(BOM).unwrap_or(bytes);
        let mut reader = csv::ReaderBuilder::new()
            .delimiter(self.delimiter)
            .flexible(true)
            .has_headers(true)
            .from_reader(bytes);

        let headers = unique_headers(
            reader
                .headers()
                .map_err(|e| CatalogSyncError::parse(format!("catalog header: {e}")))?
                .iter(),
        );

        let mut catalog = Catalog::new(Schema::new(headers.iter().cloned()));
        for (line, row) in reader.records().enumerate() {
            let row = row.map_err(|e| {
                CatalogSyncError::parse(format!("catalog row {}: {e}", line + 2))
            })?;
            if row.len() > headers.len() {
                return Err(CatalogSyncError::parse(format!(
                    "catalog row {}: {} cells but only {} headers",
                    line + 2,
                    row.len(),
                    headers.len()
                )));
            }
            let record = CatalogRecord::from_pairs(
                headers
                    .iter()
                    .zip(row.iter().chain(std::iter::repeat("")))
                    .map(|(h, v)| (h.as_str(), v)),
            );
            catalog.push(record);
        }
        Ok(catalog)
    }

    // -----------------------------------------------------------------------
    // Writing
    // -----------------------------------------------------------------------

    /// Serialize the catalog with BOM and header row, in schema order.
    pub fn render(&self, catalog: &Catalog) -> Result<Vec<u8>> {
        let mut writer = csv::WriterBuilder::new()
            .delimiter(self.delimiter)
            .from_writer(BOM.to_vec());

        let columns = catalog.schema.columns();
        writer
            .write_record(columns)
            .map_err(|e| CatalogSyncError::validation(format!("write header: {e}")))?;
        for record in &catalog.records {
            writer
                .write_record(columns.iter().map(|c| record.get(c).unwrap_or("")))
                .map_err(|e| CatalogSyncError::validation(format!("write row: {e}")))?;
        }
        writer
            .into_inner()
            .map_err(|e| CatalogSyncError::validation(format!("flush catalog: {e}")))
    }

    /// Write the catalog to `path` atomically (temp file, then rename).
    pub fn write(&self, catalog: &Catalog, path: &Path) -> Result<()> {
        let content = self.render(catalog)?;

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| CatalogSyncError::io(parent, e))?;
        }

        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| CatalogSyncError::validation(format!("not a file path: {}", path.display())))?;
        let temp = path.with_file_name(format!(".{file_name}.tmp"));

        std::fs::write(&temp, &content).map_err(|e| CatalogSyncError::io(&temp, e))?;
        if let Err(e) = std::fs::rename(&temp, path) {
            let _ = std::fs::remove_file(&temp);
            return Err(CatalogSyncError::io(path, e));
        }

        debug!(path = %path.display(), bytes = content.len(), "wrote catalog");
        Ok(())
    }

    /// Write a snapshot, falling back to a timestamped backup next to `path`.
    pub fn save_snapshot(&self, catalog: &Catalog, path: &Path) -> Result<SnapshotOutcome> {
        let primary_error = match self.write(catalog, path) {
            Ok(()) => return Ok(SnapshotOutcome::Primary(path.to_path_buf())),
            Err(e) => e.to_string(),
        };

        let backup = backup_path(path, Local::now());
        warn!(
            path = %path.display(),
            backup = %backup.display(),
            error = %primary_error,
            "snapshot write failed, trying backup"
        );

        match self.write(catalog, &backup) {
            Ok(()) => Ok(SnapshotOutcome::Backup {
                path: backup,
                primary_error,
            }),
            Err(backup_error) => {
                error!(
                    path = %path.display(),
                    error = %backup_error,
                    "backup write failed, in-memory changes are lost"
                );
                Err(CatalogSyncError::persistence(
                    path,
                    format!("{primary_error}; backup {}: {backup_error}", backup.display()),
                ))
            }
        }
    }
}

/// Trimmed headers, made unique so no cell is shadowed by another.
///
/// A blank header becomes `Unnamed: {index}`; a repeated one gets `.1`, `.2`, ...
fn unique_headers<'a>(raw: impl IntoIterator<Item = &'a str>) -> Vec<String> {
    let mut taken = HashSet::new();
    let mut headers = Vec::new();
    for (index, header) in raw.into_iter().enumerate() {
        let base = match header.trim() {
            "" => format!("Unnamed: {index}"),
            trimmed => trimmed.to_string(),
        };
        let mut name = base.clone();
        let mut suffix = 0;
        while !taken.insert(name.clone()) {
            suffix += 1;
            name = format!("{base}.{suffix}");
        }
        if name != header.trim() {
            warn!(header, renamed = %name, "catalog header renamed");
        }
        headers.push(name);
    }
    headers
}

/// `{stem}_backup_{YYYYmmdd_HHMMSS}.{ext}` in the directory of `path`.
pub fn backup_path(path: &Path, at: DateTime<Local>) -> PathBuf {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "catalog".to_string());
    let stamp = at.format("%Y%m%d_%H%M%S");
    let name = match path.extension() {
        Some(ext) => format!("{stem}_backup_{stamp}.{}", ext.to_string_lossy()),
        None => format!("{stem}_backup_{stamp}"),
    };
    path.with_file_name(name)
}

/// `{stem}{suffix}.{ext}` next to `path`, used for default output names.
pub fn sibling_path(path: &Path, suffix: &str) -> PathBuf {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "catalog".to_string());
    let name = match path.extension() {
        Some(ext) => format!("{stem}{suffix}.{}", ext.to_string_lossy()),
        None => format!("{stem}{suffix}"),
    };
    path.with_file_name(name)
}
