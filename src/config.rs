//! Runtime configuration
//!
//! Everything is taken from the environment.

use std::path::PathBuf;

/// Overrides the database location
pub const DATABASE_PATH_ENV: &str = "BPIMPORT_DATABASE_PATH";

/// File name of the default database under `data/`
pub const DEFAULT_DATABASE_FILE: &str = "bpimport.db";

/// Default log filter directive, combined with `RUST_LOG`
pub const DEFAULT_LOG_DIRECTIVE: &str = "bpimport=info";

/// Get the database path from environment or use default
pub fn get_database_path() -> PathBuf {
    std::env::var(DATABASE_PATH_ENV)
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            let exe_dir = std::env::current_exe()
                .ok()
                .and_then(|p| p.parent().map(|p| p.to_path_buf()))
                .unwrap_or_else(|| PathBuf::from("."));
            default_database_path(exe_dir)
        })
}

/// `data/bpimport.db` under the project root, found from the executable's directory
fn default_database_path(exe_dir: PathBuf) -> PathBuf {
    let mut path = exe_dir;

    // Go up from target/release or target/debug to project root
    if path.ends_with("release") || path.ends_with("debug") {
        if let Some(root) = path.parent().and_then(|target| target.parent()) {
            path = root.to_path_buf();
        }
    }

    path.push("data");
    path.push(DEFAULT_DATABASE_FILE);
    path
}
