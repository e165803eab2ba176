//! Monitor export parser
//!
//! Turns the raw bytes of a CSV export into readings sorted newest first.
//! File-level problems fail the parse; a bad row is skipped and reported.

use chrono::{DateTime, Local};
use serde::Serialize;
use thiserror::Error;

use crate::models::{columns, CsvRow, Reading, RowError};

const BYTE_ORDER_MARK: char = '\u{feff}';

/// File-level failures; the whole batch is discarded
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("CSV file is empty")]
    EmptyFile,

    #[error("CSV file is missing required columns: {}", .missing.join(", "))]
    MissingRequiredColumns { missing: Vec<&'static str> },

    #[error("CSV file is not valid UTF-8 text (invalid byte at offset {valid_up_to})")]
    DecodeFailure { valid_up_to: usize },
}

/// Why a data row produced no reading
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SkipReason {
    TooFewFields { expected: usize, found: usize },
    MissingDateOrTime,
    Invalid { error: RowError },
}

impl From<RowError> for SkipReason {
    fn from(error: RowError) -> Self {
        SkipReason::Invalid { error }
    }
}

/// A data row that was skipped
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedRow {
    /// 1-based line number in the decoded file, counting only non-empty lines
    pub line: usize,
    pub reason: SkipReason,
}

/// Readings plus the rows that were skipped along the way
#[derive(Debug, Clone, Default)]
pub struct ParsedFile {
    /// Newest first
    pub readings: Vec<Reading>,
    pub skipped: Vec<SkippedRow>,
}

impl ParsedFile {
    /// Oldest and newest timestamps, if any reading was parsed
    pub fn date_range(&self) -> Option<(DateTime<Local>, DateTime<Local>)> {
        // Sorted newest first
        match (self.readings.last(), self.readings.first()) {
            (Some(oldest), Some(newest)) => Some((oldest.timestamp, newest.timestamp)),
            _ => None,
        }
    }
}

/// Parse an export into readings, newest first
pub fn parse(bytes: &[u8]) -> Result<Vec<Reading>, ParseError> {
    parse_report(bytes).map(|parsed| parsed.readings)
}

/// Parse an export, keeping a record of every skipped row
pub fn parse_report(bytes: &[u8]) -> Result<ParsedFile, ParseError> {
    let text = std::str::from_utf8(bytes).map_err(|e| ParseError::DecodeFailure {
        valid_up_to: e.valid_up_to(),
    })?;
    let text = text.strip_prefix(BYTE_ORDER_MARK).unwrap_or(text);

    let lines: Vec<&str> = text
        .split(['\n', '\r'])
        .filter(|line| !line.is_empty())
        .collect();

    if lines.len() < 2 {
        return Err(ParseError::EmptyFile);
    }

    let headers = tokenize(lines[0]);
    let missing: Vec<&'static str> = columns::REQUIRED
        .iter()
        .copied()
        .filter(|required| !headers.iter().any(|h| h == required))
        .collect();
    if !missing.is_empty() {
        return Err(ParseError::MissingRequiredColumns { missing });
    }

    let mut parsed = ParsedFile::default();

    for (index, line) in lines.iter().enumerate().skip(1) {
        let line_number = index + 1;
        let values = tokenize(line);

        if values.len() < headers.len() {
            tracing::debug!(line = line_number, "skipping row with {} of {} fields", values.len(), headers.len());
            parsed.skipped.push(SkippedRow {
                line: line_number,
                reason: SkipReason::TooFewFields {
                    expected: headers.len(),
                    found: values.len(),
                },
            });
            continue;
        }

        let row: CsvRow = headers
            .iter()
            .map(String::as_str)
            .zip(values.iter().map(String::as_str))
            .collect();

        let date = row.get(columns::DATE).copied().unwrap_or_default();
        let time = row.get(columns::TIME).copied().unwrap_or_default();
        if date.is_empty() || time.is_empty() {
            tracing::debug!(line = line_number, "skipping row without date or time");
            parsed.skipped.push(SkippedRow {
                line: line_number,
                reason: SkipReason::MissingDateOrTime,
            });
            continue;
        }

        match Reading::from_csv_row(&row, line_number, date, time) {
            Ok(reading) => parsed.readings.push(reading),
            Err(e) => {
                tracing::warn!(line = line_number, "failed to parse row: {}", e);
                parsed.skipped.push(SkippedRow {
                    line: line_number,
                    reason: e.into(),
                });
            }
        }
    }

    parsed
        .readings
        .sort_by(|a, b| b.timestamp.cmp(&a.timestamp));

    Ok(parsed)
}

/// Split one line on commas outside double quotes.
///
/// A quote toggles quoted mode and is dropped; every field is trimmed.
pub fn tokenize(line: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;

    for c in line.chars() {
        match c {
            '"' => in_quotes = !in_quotes,
            ',' if !in_quotes => {
                fields.push(current.trim().to_string());
                current.clear();
            }
            _ => current.push(c),
        }
    }
    fields.push(current.trim().to_string());

    fields
}
