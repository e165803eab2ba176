//! Data models
//!
//! Parsed readings, import audit records and stored vitals.

mod import_record;
mod reading;
mod vital;

pub use import_record::{date_range_label, ImportRecord, NO_DATE_RANGE};
pub use reading::{
    columns, CsvRow, Reading, ReadingKey, RowError, IRREGULAR_PULSE_DETECTED, UNKNOWN_SOURCE,
};
pub use vital::{
    format_timestamp, parse_timestamp, Vital, VitalCreate, VitalGroup, VitalGroupCreate, VitalType,
};
