//! Ingestion engine
//!
//! Discovers new source CSV files, merges them into the canonical dataset and
//! records them in the ledger.
//!
//! # Ordering
//! The canonical dataset is written before any ledger line is appended. A crash
//! between the two leaves rows in the dataset whose files are not ledgered yet;
//! the next run re-merges those files and deduplication absorbs the repeat. The
//! reverse (ledgered file without its rows) cannot happen.

pub mod ledger;

pub use ledger::{ingested_names, is_recordable_name, parse_ledger, LedgerEntry};

use crate::dataset::{Table, FEATURE_COLUMNS, TARGET_COLUMN};
use crate::store::{ArtifactKey, ArtifactStore, Namespace};
use dra_common::{Error, Result};
use serde::Serialize;
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Extension a source file must carry
pub const SOURCE_EXTENSION: &str = ".csv";

/// A candidate file left out of a merge
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SkippedFile {
    pub file_name: String,
    pub reason: String,
}

/// Outcome of one `merge_sources` call
#[derive(Debug, Clone, Serialize)]
pub struct MergeResult {
    /// Net growth of the canonical dataset
    pub rows_added: usize,
    /// Where the canonical dataset lives
    pub dataset_key: ArtifactKey,
    /// Ledger entries written by this merge
    pub ledger_appended: Vec<LedgerEntry>,
    /// Candidates that were not merged
    pub skipped: Vec<SkippedFile>,
}

impl MergeResult {
    /// Nothing parsed, dataset untouched
    pub fn is_noop(&self) -> bool {
        self.ledger_appended.is_empty()
    }
}

/// Ingestion engine over an injected artifact store
#[derive(Clone)]
pub struct IngestionEngine {
    store: Arc<dyn ArtifactStore>,
}

impl IngestionEngine {
    pub fn new(store: Arc<dyn ArtifactStore>) -> Self {
        Self { store }
    }

    /// Ledger entries in file order; empty when no ledger exists yet
    pub fn read_ledger(&self) -> Result<Vec<LedgerEntry>> {
        match self.store.get_optional(&ArtifactKey::ledger())? {
            Some(bytes) => parse_ledger(&bytes),
            None => Ok(Vec::new()),
        }
    }

    /// The canonical dataset, if one has been written
    pub fn load_dataset(&self) -> Result<Option<Table>> {
        let key = ArtifactKey::dataset();
        match self.store.get_optional(&key)? {
            Some(bytes) => Table::from_csv(&bytes, &key.to_string())
                .map(Some)
                .map_err(|e| Error::Consistency(format!("canonical dataset unreadable: {}", e))),
            None => Ok(None),
        }
    }

    /// Source files present in the input location and absent from the ledger.
    ///
    /// Matching is by file name only: rewriting an already-ingested file under
    /// the same name is not detected. Names the ledger cannot record verbatim
    /// (containing `", "`, a line break, or surrounding whitespace) are ignored
    /// with a warning.
    pub fn discover_new_files(&self) -> Result<BTreeSet<String>> {
        let present: BTreeSet<String> = self
            .store
            .list(Namespace::Input)?
            .into_iter()
            .filter(|name| name.ends_with(SOURCE_EXTENSION))
            .filter(|name| {
                let ok = is_recordable_name(name);
                if !ok {
                    warn!(file = %name, "Ignoring source file whose name cannot be ledgered");
                }
                ok
            })
            .collect();

        let ledger = self.read_ledger()?;
        if ledger.is_empty() {
            info!(
                candidates = present.len(),
                "No ingestion ledger yet, every source file is new"
            );
            return Ok(present);
        }

        let ingested = ingested_names(&ledger);
        let new_files: BTreeSet<String> = present.difference(&ingested).cloned().collect();

        info!(
            present = present.len(),
            ingested = ingested.len(),
            new = new_files.len(),
            "Checked input location for new source files"
        );
        Ok(new_files)
    }

    /// Merge `files` into the canonical dataset and ledger them.
    ///
    /// Files are processed one at a time. A file that is missing, not a CSV,
    /// unparseable, lacking a feature or target column, or whose columns differ
    /// from the dataset is skipped with a warning and gets no ledger entry; the
    /// rest of the batch continues. Files
    /// already in the ledger are skipped too, so repeating a merge is harmless.
    pub fn merge_sources(&self, files: &BTreeSet<String>) -> Result<MergeResult> {
        let dataset_key = ArtifactKey::dataset();
        let already = ingested_names(&self.read_ledger()?);
        let existing = self.load_dataset()?;
        let rows_before = existing.as_ref().map_or(0, Table::len);

        let mut merged: Option<Table> = existing;
        let mut parsed: Vec<(String, usize)> = Vec::new();
        let mut skipped = Vec::new();

        for file_name in files {
            if already.contains(file_name) {
                debug!(file = %file_name, "Already ingested, skipping");
                continue;
            }

            let table = match self.read_source(file_name) {
                Ok(table) => table,
                Err(e) => {
                    warn!(file = %file_name, error = %e, "Skipping source file");
                    skipped.push(SkippedFile {
                        file_name: file_name.clone(),
                        reason: e.to_string(),
                    });
                    continue;
                }
            };

            info!(
                file = %file_name,
                cols = table.columns().len(),
                rows = table.len(),
                "File to ingest"
            );

            let rows = table.len();
            match merged.as_mut() {
                None => merged = Some(table),
                Some(acc) => {
                    if let Err(e) = acc.extend(&table) {
                        warn!(file = %file_name, error = %e, "Skipping source file with mismatched columns");
                        skipped.push(SkippedFile {
                            file_name: file_name.clone(),
                            reason: e.to_string(),
                        });
                        continue;
                    }
                }
            }
            parsed.push((file_name.clone(), rows));
        }

        let mut merged = match merged {
            Some(table) if !parsed.is_empty() => table,
            _ => {
                warn!(candidates = files.len(), "No files were ingested, dataset left untouched");
                return Ok(MergeResult {
                    rows_added: 0,
                    dataset_key,
                    ledger_appended: Vec::new(),
                    skipped,
                });
            }
        };

        let duplicates = merged.dedup();
        info!(
            cols = merged.columns().len(),
            rows = merged.len(),
            duplicates,
            "Final data shape after merging"
        );

        // Dataset first; a failure here leaves the ledger untouched
        self.store.put(&dataset_key, &merged.to_csv()?)?;
        info!(key = %dataset_key, "Saved canonical dataset");

        let location = self.store.location(Namespace::Input);
        let entries: Vec<LedgerEntry> = parsed
            .into_iter()
            .map(|(name, rows)| LedgerEntry::new(name, location.clone(), rows))
            .collect();
        let lines: String = entries.iter().map(LedgerEntry::to_line).collect();
        self.store.append(&ArtifactKey::ledger(), lines.as_bytes())?;
        for entry in &entries {
            info!(file = %entry.file_name, rows = entry.row_count, "Logged ingestion");
        }

        Ok(MergeResult {
            rows_added: merged.len().saturating_sub(rows_before),
            dataset_key,
            ledger_appended: entries,
            skipped,
        })
    }

    fn read_source(&self, file_name: &str) -> Result<Table> {
        if !file_name.ends_with(SOURCE_EXTENSION) {
            return Err(Error::parse(file_name, "not a CSV file"));
        }
        if !is_recordable_name(file_name) {
            return Err(Error::parse(file_name, "file name cannot be recorded in the ledger"));
        }
        let key = ArtifactKey::new(Namespace::Input, file_name);
        let bytes = self.store.get(&key).map_err(|e| match e {
            Error::NotFound(_) => Error::parse(file_name, "file does not exist"),
            other => other,
        })?;
        let table = Table::from_csv(&bytes, file_name)?;

        // The first merged file fixes the dataset schema, so it must be complete
        let missing: Vec<&str> = FEATURE_COLUMNS
            .iter()
            .copied()
            .chain(std::iter::once(TARGET_COLUMN))
            .filter(|required| !table.columns().iter().any(|c| c == required))
            .collect();
        if !missing.is_empty() {
            return Err(Error::parse(
                file_name,
                format!("missing required column(s): {}", missing.join(", ")),
            ));
        }
        Ok(table)
    }
}
