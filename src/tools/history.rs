//! Import History MCP Tools

use serde::Serialize;

use crate::history::HistoryLog;
use crate::models::ImportRecord;
use crate::tools::imports::ReadingPreview;

/// History entry summary for listing
#[derive(Debug, Serialize)]
pub struct ImportRecordSummary {
    pub index: usize,
    pub file_name: String,
    pub import_timestamp: String,
    pub reading_count: usize,
    pub date_range: String,
    pub success: bool,
    pub error_message: Option<String>,
}

impl ImportRecordSummary {
    fn new(index: usize, record: &ImportRecord) -> Self {
        Self {
            index,
            file_name: record.file_name.clone(),
            import_timestamp: record.import_timestamp.to_rfc3339(),
            reading_count: record.reading_count,
            date_range: record.date_range_label.clone(),
            success: record.success,
            error_message: record.error_message.clone(),
        }
    }
}

/// Response for list_import_history
#[derive(Debug, Serialize)]
pub struct ListHistoryResponse {
    pub records: Vec<ImportRecordSummary>,
    pub total: usize,
}

/// Full history entry including its readings snapshot
#[derive(Debug, Serialize)]
pub struct ImportRecordDetail {
    #[serde(flatten)]
    pub summary: ImportRecordSummary,
    pub readings: Option<Vec<ReadingPreview>>,
}

/// Response for clear_import_history
#[derive(Debug, Serialize)]
pub struct ClearHistoryResponse {
    pub success: bool,
    pub removed: usize,
}

/// Response for clear_import_history when blocked (no force flag)
#[derive(Debug, Serialize)]
pub struct ClearHistoryBlockedResponse {
    pub error: String,
    pub requires_force: bool,
}

/// List history entries, newest first
pub fn list_import_history(history: &HistoryLog, limit: Option<usize>) -> ListHistoryResponse {
    let records: Vec<ImportRecordSummary> = history
        .records()
        .iter()
        .take(limit.unwrap_or(usize::MAX))
        .enumerate()
        .map(|(index, record)| ImportRecordSummary::new(index, record))
        .collect();

    ListHistoryResponse {
        records,
        total: history.len(),
    }
}

/// Get one history entry by its position (0 = newest)
pub fn get_import_record(history: &HistoryLog, index: usize) -> Result<ImportRecordDetail, String> {
    let record = history
        .get(index)
        .ok_or_else(|| format!("Import record not found at index: {}", index))?;

    Ok(ImportRecordDetail {
        summary: ImportRecordSummary::new(index, record),
        readings: record
            .readings
            .as_ref()
            .map(|readings| readings.iter().map(ReadingPreview::from).collect()),
    })
}

/// Clear the whole history (requires force flag)
pub fn clear_import_history(
    history: &mut HistoryLog,
    force: bool,
) -> Result<ClearHistoryResponse, ClearHistoryBlockedResponse> {
    if !force {
        return Err(ClearHistoryBlockedResponse {
            error: "Clearing import history requires explicit confirmation (force=true)".to_string(),
            requires_force: true,
        });
    }

    let removed = history.len();
    history.clear();
    Ok(ClearHistoryResponse {
        success: true,
        removed,
    })
}
