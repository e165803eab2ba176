//! Import MCP Tools
//!
//! Previewing and importing blood pressure monitor exports.

use std::path::PathBuf;

use serde::Serialize;

use crate::history::HistoryLog;
use crate::import::{parse_report, run_import, ImportSource, ImportSummary, SkippedRow};
use crate::models::{date_range_label, Reading};
use crate::store::HealthStore;

/// Import instructions for AI assistants
pub const IMPORT_INSTRUCTIONS: &str = r#"
# Blood Pressure CSV Import

This guide explains how to import readings exported from a blood pressure monitor app.

## File Format

The first non-empty line is a header. Columns may appear in any order.

| Column | Required | Notes |
|--------|----------|-------|
| Date | yes | `YYYY-MM-DD` |
| Time | yes | `HH:MM`, 24-hour, local time |
| Sys | yes | systolic pressure, whole number |
| Dia | yes | diastolic pressure, whole number |
| Pulse | no | whole number; anything else is ignored |
| Irregular pulse | no | the exact value `detected` flags the reading |
| Source | no | device or app name; defaults to `Unknown` |

Fields may be wrapped in double quotes. Commas inside quotes are kept.

**Example:**
```
Date,Time,Sys,Dia,Pulse,Irregular pulse,Source
2025-07-28,08:15,125,80,66,,OxiPro BP2
2025-07-28,20:45,122,78,64,detected,OxiPro BP2
```

## Workflow

1. Call `preview_bp_csv` first. It parses the file without writing anything and
   lists rows that will be skipped (missing fields, bad dates, bad pressures).
2. Call `import_bp_csv` to write the readings.
   - Readings already stored with the same time and the same systolic/diastolic
     values are skipped, so importing the same file twice is safe.
   - Every reading is saved as a blood pressure vital plus a heart rate vital
     when a pulse is present, linked in one vital group.
3. Call `list_import_history` to review past imports (newest first, last 50 kept).

## Shared Files

Pass `remove_after_import: true` when the file is a temporary copy handed over
by another app. It is deleted once parsed, whether or not the import succeeds.

## Failures

A file-level problem (empty file, missing required columns, not UTF-8) rejects
the whole file. A storage failure stops the import; readings written before the
failure stay stored. Both cases are recorded in the import history.
"#;

/// One parsed reading, as shown in a preview
#[derive(Debug, Serialize)]
pub struct ReadingPreview {
    pub line: usize,
    pub timestamp: String,
    pub blood_pressure: String,
    pub pulse: Option<i32>,
    pub irregular_pulse: bool,
    pub source: String,
}

impl From<&Reading> for ReadingPreview {
    fn from(reading: &Reading) -> Self {
        Self {
            line: reading.id,
            timestamp: reading.timestamp.format("%Y-%m-%d %H:%M").to_string(),
            blood_pressure: reading.pressure_display(),
            pulse: reading.pulse,
            irregular_pulse: reading.irregular_pulse,
            source: reading.source.clone(),
        }
    }
}

/// Response for preview_bp_csv
#[derive(Debug, Serialize)]
pub struct PreviewResponse {
    pub file_name: String,
    pub total_readings: usize,
    pub date_range: String,
    /// Newest first, truncated to the requested limit
    pub readings: Vec<ReadingPreview>,
    pub invalid_rows: Vec<SkippedRow>,
}

/// Response for import_bp_csv
#[derive(Debug, Serialize)]
pub struct ImportResponse {
    pub success: bool,
    #[serde(flatten)]
    pub summary: ImportSummary,
    pub message: String,
}

/// Load file content from tool parameters.
///
/// Inline `content` wins over `file_path`.
pub async fn read_input(
    file_path: Option<&str>,
    content: Option<&str>,
    file_name: Option<&str>,
) -> Result<(String, Vec<u8>), String> {
    if let Some(content) = content {
        let name = file_name.unwrap_or("pasted.csv").to_string();
        return Ok((name, content.as_bytes().to_vec()));
    }

    let path = file_path
        .map(PathBuf::from)
        .ok_or_else(|| "Either file_path or content is required".to_string())?;

    let bytes = tokio::fs::read(&path)
        .await
        .map_err(|e| format!("Failed to read file '{}': {}", path.display(), e))?;
    let name = match file_name {
        Some(name) => name.to_string(),
        None => path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string()),
    };

    Ok((name, bytes))
}

/// Build an import source from tool parameters.
///
/// A shared copy is handed to the import session as a path so it can be
/// deleted once parsed; anything else is read here.
pub async fn resolve_source(
    file_path: Option<&str>,
    content: Option<&str>,
    file_name: Option<&str>,
    remove_after_import: bool,
) -> Result<ImportSource, String> {
    if let (Some(path), None, true) = (file_path, content, remove_after_import) {
        return Ok(ImportSource::SharedFile {
            path: PathBuf::from(path),
        });
    }

    let (file_name, bytes) = read_input(file_path, content, file_name).await?;
    Ok(ImportSource::Bytes { file_name, bytes })
}

/// Parse an export without writing anything
pub fn preview_bp_csv(file_name: &str, bytes: &[u8], limit: usize) -> Result<PreviewResponse, String> {
    let parsed = parse_report(bytes).map_err(|e| e.to_string())?;

    Ok(PreviewResponse {
        file_name: file_name.to_string(),
        total_readings: parsed.readings.len(),
        date_range: date_range_label(&parsed.readings),
        readings: parsed.readings.iter().take(limit).map(ReadingPreview::from).collect(),
        invalid_rows: parsed.skipped,
    })
}

/// Import an export into the health store and record it in the history
pub async fn import_bp_csv<S>(
    store: &S,
    history: &mut HistoryLog,
    source: ImportSource,
) -> Result<ImportResponse, String>
where
    S: HealthStore + ?Sized,
{
    let mut next_quarter = 0.25;
    let on_progress = |fraction: f64| {
        while fraction >= next_quarter {
            tracing::debug!("import {:.0}% complete", next_quarter * 100.0);
            next_quarter += 0.25;
        }
    };

    let summary = run_import(source, store, history, on_progress)
        .await
        .map_err(|e| e.to_string())?;

    let message = format!(
        "Imported {} of {} readings ({} already stored)",
        summary.imported, summary.total, summary.skipped
    );

    Ok(ImportResponse {
        success: true,
        summary,
        message,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::history::MemoryKeyValueStore;
    use crate::store::MemoryHealthStore;
    use std::sync::Arc;
    use tempfile::TempDir;

    const EXPORT: &str = "Date,Time,Sys,Dia,Pulse\n\
        2025-07-28,08:15,125,80,66\n\
        2025-07-28,12:00,,79,70\n\
        2025-07-28,20:45,122,78,64\n";

    #[test]
    fn test_preview_lists_readings_and_invalid_rows() {
        let preview = preview_bp_csv("export.csv", EXPORT.as_bytes(), 1).unwrap();

        assert_eq!(preview.total_readings, 2);
        assert_eq!(preview.readings.len(), 1);
        assert_eq!(preview.readings[0].timestamp, "2025-07-28 20:45");
        assert_eq!(preview.readings[0].blood_pressure, "122/78");
        assert_eq!(preview.invalid_rows.len(), 1);
        assert_eq!(preview.date_range, "2025-07-28 to 2025-07-28");
    }

    #[test]
    fn test_preview_reports_file_errors() {
        let err = preview_bp_csv("empty.csv", b"", 10).unwrap_err();
        assert_eq!(err, "CSV file is empty");
    }

    #[tokio::test]
    async fn test_resolve_source_prefers_content() {
        let source = resolve_source(Some("/nonexistent.csv"), Some(EXPORT), None, false)
            .await
            .unwrap();
        assert_eq!(source.file_name(), "pasted.csv");

        let err = resolve_source(None, None, None, false).await.unwrap_err();
        assert!(err.contains("required"));
    }

    #[tokio::test]
    async fn test_resolve_source_keeps_user_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("july.csv");
        std::fs::write(&path, EXPORT).unwrap();

        let source = resolve_source(path.to_str(), None, None, false).await.unwrap();
        assert!(matches!(&source, ImportSource::Bytes { file_name, .. } if file_name == "july.csv"));

        let shared = resolve_source(path.to_str(), None, None, true).await.unwrap();
        assert!(matches!(shared, ImportSource::SharedFile { .. }));
        assert!(path.exists());
    }

    #[tokio::test]
    async fn test_import_reports_message() {
        let store = MemoryHealthStore::new();
        let mut history = HistoryLog::load(Arc::new(MemoryKeyValueStore::new()));
        let source = ImportSource::Bytes {
            file_name: "export.csv".to_string(),
            bytes: EXPORT.as_bytes().to_vec(),
        };

        let response = import_bp_csv(&store, &mut history, source).await.unwrap();
        assert!(response.success);
        assert_eq!(response.message, "Imported 2 of 2 readings (0 already stored)");

        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["imported"], 2);
        assert_eq!(json["file_name"], "export.csv");
    }

    #[tokio::test]
    async fn test_import_failure_is_a_string_error() {
        let store = MemoryHealthStore::new().denying_access();
        let mut history = HistoryLog::load(Arc::new(MemoryKeyValueStore::new()));
        let source = ImportSource::Bytes {
            file_name: "export.csv".to_string(),
            bytes: EXPORT.as_bytes().to_vec(),
        };

        let err = import_bp_csv(&store, &mut history, source).await.unwrap_err();
        assert_eq!(err, "Health store authorization was denied");
        assert_eq!(history.len(), 1);
    }
}
