//! Import history
//!
//! The bounded audit log of import attempts and the key-value storage it
//! persists through.

pub mod kv;
mod log;

pub use kv::{KeyValueStore, MemoryKeyValueStore, SqliteKeyValueStore};
pub use log::{HistoryListener, HistoryLog, PersistenceError, HISTORY_KEY, MAX_RECORDS};
