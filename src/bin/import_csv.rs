//! Import a blood pressure CSV export from the command line
//! Usage: cargo run --bin import_csv -- <file.csv> [--shared]
//!
//! `--shared` treats the file as a temporary shared copy and deletes it once parsed.

use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use tracing_subscriber::EnvFilter;

use bpimport::config::{get_database_path, DEFAULT_LOG_DIRECTIVE};
use bpimport::db::{migrations, Database};
use bpimport::history::{HistoryLog, SqliteKeyValueStore};
use bpimport::import::{run_import, ImportSource};
use bpimport::store::SqliteHealthStore;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(DEFAULT_LOG_DIRECTIVE.parse()?))
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let shared = args.iter().any(|a| a == "--shared");
    let Some(file) = args.iter().find(|a| !a.starts_with("--")) else {
        eprintln!("Usage: import_csv <file.csv> [--shared]");
        std::process::exit(2);
    };
    let path = PathBuf::from(file);

    let db_path = get_database_path();
    println!("Database: {}", db_path.display());
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let database = Database::new(&db_path)?;
    database.with_conn(migrations::run_migrations)?;

    let store = SqliteHealthStore::connect(database.clone())?;
    let mut history = HistoryLog::load(Arc::new(SqliteKeyValueStore::new(database)));

    let source = if shared {
        ImportSource::SharedFile { path }
    } else {
        let bytes = std::fs::read(&path)?;
        ImportSource::Bytes {
            file_name: source_name(&path),
            bytes,
        }
    };

    let on_progress = |fraction: f64| {
        eprint!("\rImporting... {:>3.0}%", fraction * 100.0);
        let _ = std::io::stderr().flush();
    };

    let result = run_import(source, &store, &mut history, on_progress).await;
    eprintln!();

    let summary = result?;
    println!("File: {}", summary.file_name);
    println!("Date range: {}", summary.date_range);
    println!("Readings: {}", summary.total);
    println!("  Imported: {}", summary.imported);
    println!("  Already stored: {}", summary.skipped);
    if !summary.invalid_rows.is_empty() {
        println!("Skipped rows: {}", summary.invalid_rows.len());
        for row in &summary.invalid_rows {
            println!("  line {}: {}", row.line, serde_json::to_string(&row.reason)?);
        }
    }

    Ok(())
}

fn source_name(path: &std::path::Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}
