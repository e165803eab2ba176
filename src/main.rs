//! Blood Pressure Import
//!
//! An MCP server for importing blood pressure monitor CSV exports.

use std::sync::Arc;

use rmcp::ServiceExt;
use tokio::io::{stdin, stdout};
use tracing_subscriber::EnvFilter;

use bpimport::build_info;
use bpimport::config::{get_database_path, DEFAULT_LOG_DIRECTIVE};
use bpimport::db::{self, Database};
use bpimport::history::{HistoryLog, SqliteKeyValueStore};
use bpimport::mcp::BpImportService;
use bpimport::models::ImportRecord;
use bpimport::store::SqliteHealthStore;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging (output to stderr to not interfere with MCP stdio)
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(DEFAULT_LOG_DIRECTIVE.parse()?))
        .with_writer(std::io::stderr)
        .init();

    build_info::print_startup_banner();
    eprintln!("Starting MCP server on stdio...");

    let db_path = get_database_path();
    eprintln!("Database path: {}", db_path.display());

    // Ensure data directory exists
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    eprintln!("Initializing database...");
    let database = Database::new(&db_path)?;

    database.with_conn(|conn| {
        db::migrations::run_migrations(conn)?;
        let version = db::migrations::get_schema_version(conn)?;
        eprintln!("Database schema version: {}", version);
        Ok(())
    })?;

    let store = SqliteHealthStore::connect(database.clone())?;

    let mut history = HistoryLog::load(Arc::new(SqliteKeyValueStore::new(database)));
    eprintln!("Import history: {} records", history.len());
    history.subscribe(Box::new(|records: &[ImportRecord]| match records.first() {
        Some(latest) => tracing::info!(
            file_name = %latest.file_name,
            success = latest.success,
            reading_count = latest.reading_count,
            "import history updated ({} records)",
            records.len()
        ),
        None => tracing::info!("import history cleared"),
    }));

    let service = BpImportService::new(db_path, store, history);

    // Start the MCP server
    let server = service.serve((stdin(), stdout())).await?;
    server.waiting().await?;

    Ok(())
}
