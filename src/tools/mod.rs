//! Tools module
//!
//! MCP tool implementations for the blood pressure importer.

pub mod history;
pub mod imports;
pub mod readings;
pub mod status;
