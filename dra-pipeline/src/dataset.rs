//! Tabular data: CSV parsing, row-exact deduplication and feature extraction
//!
//! Cells are kept as the exact text read from the source file. Two rows are
//! duplicates only if every cell matches byte for byte, so `1.0` and `1` are
//! different values here.

use dra_common::{Error, Result};
use std::collections::HashSet;

/// Feature columns consumed by the model, in model input order
pub const FEATURE_COLUMNS: [&str; 3] = [
    "lastmonth_activity",
    "lastyear_activity",
    "number_of_employees",
];

/// Binary target column (0/1)
pub const TARGET_COLUMN: &str = "exited";

/// One model input row
pub type FeatureRow = [f64; 3];

/// Header plus rows of raw cell text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Table {
    columns: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl Table {
    pub fn new(columns: Vec<String>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
        }
    }

    /// Build a table from already-split rows. Rows must match the header width.
    pub fn from_rows(columns: Vec<String>, rows: Vec<Vec<String>>) -> Result<Self> {
        if let Some((i, row)) = rows.iter().enumerate().find(|(_, r)| r.len() != columns.len()) {
            return Err(Error::InvalidInput(format!(
                "row {} has {} cells, header has {}",
                i,
                row.len(),
                columns.len()
            )));
        }
        Ok(Self { columns, rows })
    }

    /// Parse CSV bytes with a header row. `source` names the file in errors.
    pub fn from_csv(bytes: &[u8], source: &str) -> Result<Self> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(false)
            .from_reader(bytes);

        let headers = reader.headers().map_err(|e| Error::parse(source, e))?;
        if headers.is_empty() || headers.iter().all(|h| h.trim().is_empty()) {
            return Err(Error::parse(source, "missing header row"));
        }
        let columns: Vec<String> = headers.iter().map(|h| h.trim().to_string()).collect();

        let mut seen = HashSet::new();
        if let Some(dup) = columns.iter().find(|c| !seen.insert(c.as_str())) {
            return Err(Error::parse(source, format!("duplicate column {:?}", dup)));
        }

        let mut rows = Vec::new();
        for record in reader.records() {
            let record = record.map_err(|e| Error::parse(source, e))?;
            rows.push(record.iter().map(str::to_string).collect());
        }

        Ok(Self { columns, rows })
    }

    /// Serialize as CSV with a header row
    pub fn to_csv(&self) -> Result<Vec<u8>> {
        let mut writer = csv::Writer::from_writer(Vec::new());
        writer
            .write_record(&self.columns)
            .map_err(|e| Error::Internal(format!("CSV write failed: {}", e)))?;
        for row in &self.rows {
            writer
                .write_record(row)
                .map_err(|e| Error::Internal(format!("CSV write failed: {}", e)))?;
        }
        writer
            .into_inner()
            .map_err(|e| Error::Internal(format!("CSV flush failed: {}", e)))
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<String>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// True when `other` has the same column set, in any order
    pub fn same_columns(&self, other: &[String]) -> bool {
        let mine: HashSet<&str> = self.columns.iter().map(String::as_str).collect();
        let theirs: HashSet<&str> = other.iter().map(String::as_str).collect();
        self.columns.len() == other.len() && mine == theirs
    }

    /// Reorder columns to `columns`; `Error::Schema` if the column sets differ
    pub fn aligned_to(&self, columns: &[String]) -> Result<Table> {
        if !self.same_columns(columns) {
            return Err(Error::Schema(format!(
                "columns [{}] do not match [{}]",
                self.columns.join(", "),
                columns.join(", ")
            )));
        }
        if self.columns == columns {
            return Ok(self.clone());
        }

        let order: Vec<usize> = columns
            .iter()
            .map(|c| self.column_index(c))
            .collect::<Result<_>>()?;
        let rows = self
            .rows
            .iter()
            .map(|row| order.iter().map(|&i| row[i].clone()).collect())
            .collect();

        Ok(Table {
            columns: columns.to_vec(),
            rows,
        })
    }

    /// Append the rows of `other`, aligning its columns to this table's
    pub fn extend(&mut self, other: &Table) -> Result<()> {
        let aligned = other.aligned_to(&self.columns)?;
        self.rows.extend(aligned.rows);
        Ok(())
    }

    /// Drop rows equal to an earlier row, keeping first occurrences in order.
    /// Returns the number of rows removed.
    pub fn dedup(&mut self) -> usize {
        let before = self.rows.len();
        let mut seen: HashSet<Vec<String>> = HashSet::with_capacity(before);
        self.rows.retain(|row| seen.insert(row.clone()));
        before - self.rows.len()
    }

    pub fn column_index(&self, name: &str) -> Result<usize> {
        self.columns
            .iter()
            .position(|c| c == name)
            .ok_or_else(|| Error::Schema(format!("missing column {:?}", name)))
    }

    /// Every cell of a column parsed as a number; empty or non-numeric cells
    /// are a schema error
    pub fn numeric_column(&self, name: &str) -> Result<Vec<f64>> {
        let idx = self.column_index(name)?;
        self.rows
            .iter()
            .enumerate()
            .map(|(i, row)| {
                let cell = row[idx].trim();
                cell.parse::<f64>().map_err(|_| {
                    Error::Schema(format!(
                        "column {:?} row {}: {:?} is not numeric",
                        name, i, cell
                    ))
                })
            })
            .collect()
    }

    /// Model inputs in `FEATURE_COLUMNS` order
    pub fn features(&self) -> Result<Vec<FeatureRow>> {
        let [a, b, c] = FEATURE_COLUMNS.map(|name| self.numeric_column(name));
        let (a, b, c) = (a?, b?, c?);
        Ok((0..self.rows.len()).map(|i| [a[i], b[i], c[i]]).collect())
    }

    /// Binary labels of `TARGET_COLUMN`; anything but 0 or 1 is a schema error
    pub fn target(&self) -> Result<Vec<u8>> {
        self.numeric_column(TARGET_COLUMN)?
            .into_iter()
            .enumerate()
            .map(|(i, v)| {
                if v == 0.0 {
                    Ok(0)
                } else if v == 1.0 {
                    Ok(1)
                } else {
                    Err(Error::Schema(format!(
                        "column {:?} row {}: {} is not a binary label",
                        TARGET_COLUMN, i, v
                    )))
                }
            })
            .collect()
    }
}
