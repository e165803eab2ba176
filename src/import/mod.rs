//! CSV import pipeline
//!
//! Parsing, duplicate detection against the health store, batch writing, and
//! the session that ties them to the history log.

pub mod csv;
pub mod duplicates;
pub mod orchestrator;
pub mod session;

pub use csv::{parse, parse_report, ParseError, ParsedFile, SkipReason, SkippedRow};
pub use duplicates::find_duplicates;
pub use orchestrator::{import_batch, ImportTally};
pub use session::{run_import, ImportError, ImportSource, ImportSummary};
