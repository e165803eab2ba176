//! Blood Pressure Import Library
//!
//! CSV parsing, duplicate-aware import into a health store, and the import
//! history log.

pub mod build_info;
pub mod config;
pub mod db;
pub mod history;
pub mod import;
pub mod mcp;
pub mod models;
pub mod store;
pub mod tools;
