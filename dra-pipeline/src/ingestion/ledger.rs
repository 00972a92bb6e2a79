//! Ingestion ledger
//!
//! One line per ingested file:
//! `<YYYY-MM-DD HH:MM:SS>, <file_name>, <source_location>, <row_count>`
//!
//! The set of file names in the ledger is the authoritative "already ingested"
//! set. A line that does not parse means the ledger can no longer be trusted,
//! so parsing fails with `Error::Consistency` instead of skipping it.

use chrono::{DateTime, Utc};
use dra_common::{time, Error, Result};
use serde::Serialize;
use std::collections::BTreeSet;

const SEPARATOR: &str = ", ";

/// One ingested source file
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LedgerEntry {
    pub timestamp: DateTime<Utc>,
    pub file_name: String,
    pub source_location: String,
    /// Rows in the source file (not in the merged dataset)
    pub row_count: usize,
}

impl LedgerEntry {
    pub fn new(file_name: impl Into<String>, source_location: impl Into<String>, row_count: usize) -> Self {
        Self {
            timestamp: time::now(),
            file_name: file_name.into(),
            source_location: source_location.into(),
            row_count,
        }
    }

    /// Render as one ledger line including the trailing newline
    pub fn to_line(&self) -> String {
        format!(
            "{}{sep}{}{sep}{}{sep}{}\n",
            time::format_record(&self.timestamp),
            self.file_name,
            self.source_location,
            self.row_count,
            sep = SEPARATOR
        )
    }

    /// Parse one ledger line.
    ///
    /// The timestamp is the first field and the row count the last, so a source
    /// location containing the separator still parses.
    pub fn parse_line(line: &str, line_no: usize) -> Result<Self> {
        let malformed = |why: &str| {
            Error::Consistency(format!("ledger line {}: {} ({:?})", line_no, why, line))
        };

        let (timestamp, rest) = line.split_once(SEPARATOR).ok_or_else(|| malformed("missing fields"))?;
        let (rest, row_count) = rest.rsplit_once(SEPARATOR).ok_or_else(|| malformed("missing row count"))?;
        let (file_name, source_location) = rest
            .split_once(SEPARATOR)
            .ok_or_else(|| malformed("missing source location"))?;

        let file_name = file_name.trim();
        if file_name.is_empty() {
            return Err(malformed("empty file name"));
        }
        let row_count = row_count
            .trim()
            .parse::<usize>()
            .map_err(|_| malformed("row count is not a number"))?;
        let timestamp = time::parse_record(timestamp).map_err(|_| malformed("bad timestamp"))?;

        Ok(Self {
            timestamp,
            file_name: file_name.to_string(),
            source_location: source_location.trim().to_string(),
            row_count,
        })
    }
}

/// Parse a whole ledger blob. Blank lines are ignored.
pub fn parse_ledger(bytes: &[u8]) -> Result<Vec<LedgerEntry>> {
    let text = std::str::from_utf8(bytes)
        .map_err(|e| Error::Consistency(format!("ledger is not UTF-8: {}", e)))?;

    text.lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(i, line)| LedgerEntry::parse_line(line, i + 1))
        .collect()
}

/// Whether `file_name` survives a ledger round trip unchanged
pub fn is_recordable_name(file_name: &str) -> bool {
    !file_name.contains(SEPARATOR)
        && !file_name.contains(|c| c == '\n' || c == '\r')
        && file_name.trim() == file_name
        && !file_name.is_empty()
}

/// File names recorded in the ledger
pub fn ingested_names(entries: &[LedgerEntry]) -> BTreeSet<String> {
    entries.iter().map(|e| e.file_name.clone()).collect()
}
