//! MCP Server Implementation
//!
//! Exposes CSV preview/import, the import history and stored readings as MCP tools.

use std::path::PathBuf;
use std::sync::Arc;

use rmcp::handler::server::router::tool::ToolRouter;
use rmcp::handler::server::wrapper::Parameters;
use rmcp::model::{
    CallToolResult, Content, Implementation, ProtocolVersion, ServerCapabilities, ServerInfo,
};
use rmcp::{schemars, tool, tool_handler, tool_router, ErrorData as McpError, ServerHandler};
use serde::Deserialize;
use tokio::sync::Mutex;

use crate::db::Database;
use crate::history::HistoryLog;
use crate::store::SqliteHealthStore;
use crate::tools::status::StatusTracker;
use crate::tools::{history, imports, readings};

/// Blood pressure import MCP service
#[derive(Clone)]
pub struct BpImportService {
    status_tracker: Arc<Mutex<StatusTracker>>,
    database: Database,
    store: SqliteHealthStore,
    /// Held for the whole of an import, so imports never overlap
    history: Arc<Mutex<HistoryLog>>,
    tool_router: ToolRouter<BpImportService>,
}

impl BpImportService {
    pub fn new(database_path: PathBuf, store: SqliteHealthStore, history: HistoryLog) -> Self {
        Self {
            status_tracker: Arc::new(Mutex::new(StatusTracker::new(database_path))),
            database: store.database().clone(),
            store,
            history: Arc::new(Mutex::new(history)),
            tool_router: Self::tool_router(),
        }
    }
}

fn to_json<T: serde::Serialize>(value: &T) -> Result<CallToolResult, McpError> {
    let json = serde_json::to_string_pretty(value)
        .map_err(|e| McpError::internal_error(format!("Serialization error: {}", e), None))?;
    Ok(CallToolResult::success(vec![Content::text(json)]))
}

// ============================================================================
// Parameter Structs
// ============================================================================

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct PreviewBpCsvParams {
    /// Full path to the CSV export (e.g., "/home/name/Downloads/bp_export.csv")
    pub file_path: Option<String>,
    /// CSV content pasted inline; used instead of file_path when given
    pub content: Option<String>,
    /// Name to report for inline content
    pub file_name: Option<String>,
    /// Maximum readings to include in the preview (default 20)
    #[serde(default = "default_preview_limit")]
    pub limit: usize,
}

fn default_preview_limit() -> usize { 20 }

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct ImportBpCsvParams {
    /// Full path to the CSV export
    pub file_path: Option<String>,
    /// CSV content pasted inline; used instead of file_path when given
    pub content: Option<String>,
    /// Name recorded in the import history for inline content
    pub file_name: Option<String>,
    /// Delete file_path once it has been parsed (for temporary shared copies)
    #[serde(default)]
    pub remove_after_import: bool,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct ListImportHistoryParams {
    /// Maximum records to return (default all, at most 50 are kept)
    pub limit: Option<usize>,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct GetImportRecordParams {
    /// Position in the history, 0 = most recent import
    pub index: usize,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct ClearImportHistoryParams {
    /// Must be true to actually clear the history
    #[serde(default)]
    pub force: bool,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct ListStoredReadingsParams {
    /// Start date, YYYY-MM-DD (default 30 days before end_date)
    pub start_date: Option<String>,
    /// End date, YYYY-MM-DD, inclusive (default now)
    pub end_date: Option<String>,
    /// Maximum results (default 100)
    #[serde(default = "default_readings_limit")]
    pub limit: usize,
}

fn default_readings_limit() -> usize { 100 }

// ============================================================================
// Tool Implementations
// ============================================================================

#[tool_router]
impl BpImportService {
    // --- Status ---

    #[tool(description = "Get the current status of the import service including build info, database status and import history size")]
    async fn server_status(&self) -> Result<CallToolResult, McpError> {
        let history_records = self.history.lock().await.len();
        let tracker = self.status_tracker.lock().await;
        let status = tracker.get_status(&self.database, history_records);
        to_json(&status)
    }

    #[tool(description = "Get instructions for importing blood pressure CSV exports. Call this before the first import or when unsure about the file format.")]
    fn import_instructions(&self) -> Result<CallToolResult, McpError> {
        Ok(CallToolResult::success(vec![Content::text(imports::IMPORT_INSTRUCTIONS)]))
    }

    // --- Import ---

    #[tool(description = "Parse a blood pressure CSV export without storing anything. Lists parsed readings (newest first) and rows that would be skipped.")]
    async fn preview_bp_csv(&self, Parameters(p): Parameters<PreviewBpCsvParams>) -> Result<CallToolResult, McpError> {
        let (file_name, bytes) = imports::read_input(p.file_path.as_deref(), p.content.as_deref(), p.file_name.as_deref())
            .await
            .map_err(|e| McpError::internal_error(e, None))?;
        let result = imports::preview_bp_csv(&file_name, &bytes, p.limit)
            .map_err(|e| McpError::internal_error(e, None))?;
        to_json(&result)
    }

    #[tool(description = "Import a blood pressure CSV export (columns Date,Time,Sys,Dia and optional Pulse,Irregular pulse,Source). Readings already stored with the same time and pressures are skipped. Every attempt is recorded in the import history.")]
    async fn import_bp_csv(&self, Parameters(p): Parameters<ImportBpCsvParams>) -> Result<CallToolResult, McpError> {
        let source = imports::resolve_source(
            p.file_path.as_deref(),
            p.content.as_deref(),
            p.file_name.as_deref(),
            p.remove_after_import,
        )
        .await
        .map_err(|e| McpError::internal_error(e, None))?;

        let mut history = self.history.lock().await;
        let result = imports::import_bp_csv(&self.store, &mut history, source)
            .await
            .map_err(|e| McpError::internal_error(e, None))?;
        to_json(&result)
    }

    // --- History ---

    #[tool(description = "List recent import attempts, newest first. Failed attempts include their error message.")]
    async fn list_import_history(&self, Parameters(p): Parameters<ListImportHistoryParams>) -> Result<CallToolResult, McpError> {
        let history = self.history.lock().await;
        to_json(&history::list_import_history(&history, p.limit))
    }

    #[tool(description = "Get one import attempt by position (0 = most recent), including the imported readings for successful imports")]
    async fn get_import_record(&self, Parameters(p): Parameters<GetImportRecordParams>) -> Result<CallToolResult, McpError> {
        let history = self.history.lock().await;
        let result = history::get_import_record(&history, p.index)
            .map_err(|e| McpError::internal_error(e, None))?;
        to_json(&result)
    }

    #[tool(description = "Clear the import history. Requires force=true. Stored readings are not affected.")]
    async fn clear_import_history(&self, Parameters(p): Parameters<ClearImportHistoryParams>) -> Result<CallToolResult, McpError> {
        let mut history = self.history.lock().await;
        match history::clear_import_history(&mut history, p.force) {
            Ok(cleared) => to_json(&cleared),
            Err(blocked) => to_json(&blocked),
        }
    }

    // --- Stored readings ---

    #[tool(description = "List stored blood pressure readings with their pulse between two dates (inclusive), newest first")]
    fn list_stored_readings(&self, Parameters(p): Parameters<ListStoredReadingsParams>) -> Result<CallToolResult, McpError> {
        let result = readings::list_stored_readings(
            &self.database,
            p.start_date.as_deref(),
            p.end_date.as_deref(),
            p.limit,
        )
        .map_err(|e| McpError::internal_error(e, None))?;
        to_json(&result)
    }
}

// ============================================================================
// Server Handler
// ============================================================================

#[tool_handler]
impl ServerHandler for BpImportService {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: ProtocolVersion::LATEST,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation {
                name: "bpimport".into(),
                version: crate::build_info::VERSION.into(),
                title: Some("Blood Pressure Import".into()),
                icons: None,
                website_url: None,
            },
            instructions: Some(
                "Blood Pressure Import - imports readings exported from blood pressure monitor apps. \
                 IMPORTANT: Call import_instructions before the first import. \
                 Import: preview_bp_csv (dry run), import_bp_csv (duplicates already stored are skipped). \
                 History: list_import_history, get_import_record, clear_import_history (requires force=true). \
                 Readings: list_stored_readings. \
                 Status: server_status."
                    .into(),
            ),
        }
    }
}
