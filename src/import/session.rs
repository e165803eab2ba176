//! Import session
//!
//! Runs one import end to end: obtain the file bytes, parse them, write the
//! batch to the health store and record the attempt in the history log.

use std::borrow::Cow;
use std::path::{Path, PathBuf};

use serde::Serialize;
use thiserror::Error;

use super::csv::{parse_report, ParseError, SkippedRow};
use super::orchestrator::import_batch;
use crate::history::HistoryLog;
use crate::models::{date_range_label, Reading};
use crate::store::{HealthStore, StoreError};

/// Where the file content comes from
#[derive(Debug, Clone)]
pub enum ImportSource {
    /// Content already in memory, e.g. a file the user picked
    Bytes { file_name: String, bytes: Vec<u8> },
    /// A shared file copied to a local path; removed once parsed
    SharedFile { path: PathBuf },
}

impl ImportSource {
    /// Name recorded in the history log
    pub fn file_name(&self) -> String {
        match self {
            ImportSource::Bytes { file_name, .. } => file_name.clone(),
            ImportSource::SharedFile { path } => path
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_else(|| path.display().to_string()),
        }
    }
}

#[derive(Debug, Error)]
pub enum ImportError {
    #[error("Failed to read {}: {source}", .path.display())]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Result of a successful import
#[derive(Debug, Clone, Serialize)]
pub struct ImportSummary {
    pub file_name: String,
    pub total: usize,
    pub imported: usize,
    /// Readings already present in the health store
    pub skipped: usize,
    pub date_range: String,
    /// Rows the parser could not turn into readings
    pub invalid_rows: Vec<SkippedRow>,
}

/// Import `source` into `store`, recording the attempt in `history`.
///
/// Every outcome is appended to the history log. Failures keep the error
/// text but no readings snapshot.
pub async fn run_import<S, F>(
    source: ImportSource,
    store: &S,
    history: &mut HistoryLog,
    on_progress: F,
) -> Result<ImportSummary, ImportError>
where
    S: HealthStore + ?Sized,
    F: FnMut(f64),
{
    let file_name = source.file_name();
    tracing::info!(file_name = %file_name, "starting import");

    let bytes = match read_source(&source).await {
        Ok(bytes) => bytes,
        Err(e) => return Err(record_failure(history, &file_name, &[], e)),
    };

    let parsed = parse_report(&bytes);
    if let ImportSource::SharedFile { path } = &source {
        remove_shared_copy(path).await;
    }

    let parsed = match parsed {
        Ok(parsed) => parsed,
        Err(e) => return Err(record_failure(history, &file_name, &[], e.into())),
    };

    let tally = match import_batch(&parsed.readings, store, on_progress).await {
        Ok(tally) => tally,
        Err(e) => return Err(record_failure(history, &file_name, &parsed.readings, e.into())),
    };

    history.append(&file_name, &parsed.readings, true, None);

    Ok(ImportSummary {
        file_name,
        total: parsed.readings.len(),
        imported: tally.imported,
        skipped: tally.skipped,
        date_range: date_range_label(&parsed.readings),
        invalid_rows: parsed.skipped,
    })
}

async fn read_source(source: &ImportSource) -> Result<Cow<'_, [u8]>, ImportError> {
    match source {
        ImportSource::Bytes { bytes, .. } => Ok(Cow::Borrowed(bytes.as_slice())),
        ImportSource::SharedFile { path } => tokio::fs::read(path)
            .await
            .map(Cow::Owned)
            .map_err(|source| ImportError::ReadFile {
                path: path.clone(),
                source,
            }),
    }
}

async fn remove_shared_copy(path: &Path) {
    if let Err(e) = tokio::fs::remove_file(path).await {
        tracing::warn!("Failed to remove shared file {}: {}", path.display(), e);
    }
}

fn record_failure(
    history: &mut HistoryLog,
    file_name: &str,
    readings: &[Reading],
    error: ImportError,
) -> ImportError {
    tracing::warn!(file_name, "import failed: {}", error);
    history.append(file_name, readings, false, Some(error.to_string()));
    error
}
