//! Dataset and pipeline diagnostics
//!
//! Summary statistics and missing-value percentages of a table, predictions
//! of the deployed model on an arbitrary dataset, and wall-clock timings of
//! the ingestion and training stages.

use crate::dataset::Table;
use crate::ingestion::IngestionEngine;
use crate::model::Trainer;
use crate::scoring::{Scorer, Slot};
use crate::store::{ArtifactKey, ArtifactStore, MemoryArtifactStore, Namespace};
use crate::training::ModelTrainer;
use dra_common::Result;
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use tracing::info;

/// Cell text treated as a missing value
const MISSING_MARKERS: [&str; 6] = ["", "NA", "N/A", "NaN", "nan", "null"];

fn is_missing(cell: &str) -> bool {
    MISSING_MARKERS.contains(&cell.trim())
}

/// Statistics of one numeric column, missing cells ignored
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColumnSummary {
    pub column: String,
    pub count: usize,
    pub mean: f64,
    pub median: f64,
    /// Sample standard deviation; `None` below two values
    pub std: Option<f64>,
}

/// Share of missing cells in one column
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MissingValues {
    pub column: String,
    /// 0.0 - 100.0
    pub percent: f64,
}

/// Wall-clock duration of one stage run
#[derive(Debug, Clone, Serialize)]
pub struct StageTiming {
    pub stage: String,
    pub seconds: f64,
}

/// Mean, median and standard deviation of every numeric column.
///
/// A column is numeric when it has at least one present cell and every present
/// cell parses as a number. Other columns are left out.
pub fn summary_statistics(table: &Table) -> Vec<ColumnSummary> {
    table
        .columns()
        .iter()
        .enumerate()
        .filter_map(|(idx, name)| {
            let values: Option<Vec<f64>> = table
                .rows()
                .iter()
                .map(|row| row[idx].trim())
                .filter(|cell| !is_missing(cell))
                .map(|cell| cell.parse::<f64>().ok())
                .collect();
            let values = values.filter(|v| !v.is_empty())?;
            Some(summarize(name, values))
        })
        .collect()
}

fn summarize(column: &str, mut values: Vec<f64>) -> ColumnSummary {
    let n = values.len();
    let mean = values.iter().sum::<f64>() / n as f64;

    values.sort_by(|a, b| a.total_cmp(b));
    let median = if n % 2 == 1 {
        values[n / 2]
    } else {
        (values[n / 2 - 1] + values[n / 2]) / 2.0
    };

    let std = (n > 1).then(|| {
        let ss: f64 = values.iter().map(|v| (v - mean).powi(2)).sum();
        (ss / (n - 1) as f64).sqrt()
    });

    ColumnSummary {
        column: column.to_string(),
        count: n,
        mean,
        median,
        std,
    }
}

/// Percentage of missing cells per column, in column order
pub fn missing_value_percentages(table: &Table) -> Vec<MissingValues> {
    let total = table.len();
    table
        .columns()
        .iter()
        .enumerate()
        .map(|(idx, name)| {
            let missing = table.rows().iter().filter(|row| is_missing(&row[idx])).count();
            let percent = if total == 0 {
                0.0
            } else {
                missing as f64 * 100.0 / total as f64
            };
            MissingValues {
                column: name.clone(),
                percent,
            }
        })
        .collect()
}

/// Diagnostics over the artifact store
pub struct Diagnostics<T: Trainer> {
    store: Arc<dyn ArtifactStore>,
    trainer: Arc<T>,
}

impl<T: Trainer> Diagnostics<T> {
    pub fn new(store: Arc<dyn ArtifactStore>, trainer: Arc<T>) -> Self {
        Self { store, trainer }
    }

    fn load(&self, key: &ArtifactKey) -> Result<Table> {
        Scorer::new(self.store.clone(), self.trainer.clone()).load_table(key)
    }

    /// Source files, canonical dataset and ledger copied into memory
    fn scratch_copy(&self) -> Result<MemoryArtifactStore> {
        let scratch = MemoryArtifactStore::new();
        for name in self.store.list(Namespace::Input)? {
            let key = ArtifactKey::new(Namespace::Input, name);
            let bytes = self.store.get(&key)?;
            scratch.insert(key, bytes);
        }
        for key in [ArtifactKey::dataset(), ArtifactKey::ledger()] {
            if let Some(bytes) = self.store.get_optional(&key)? {
                scratch.insert(key, bytes);
            }
        }
        Ok(scratch)
    }

    /// Deployed-model predictions for every row of `dataset`
    pub fn model_predictions(&self, dataset: &ArtifactKey) -> Result<Vec<u8>> {
        let scorer = Scorer::new(self.store.clone(), self.trainer.clone());
        let table = scorer.load_table(dataset)?;
        scorer.predict(Slot::Deployed, &table)
    }

    /// Summary statistics of the canonical dataset
    pub fn dataset_summary(&self) -> Result<Vec<ColumnSummary>> {
        Ok(summary_statistics(&self.load(&ArtifactKey::dataset())?))
    }

    /// Missing-value percentages of the canonical dataset
    pub fn dataset_missing_values(&self) -> Result<Vec<MissingValues>> {
        Ok(missing_value_percentages(&self.load(&ArtifactKey::dataset())?))
    }

    /// Time one ingestion run and one training run.
    ///
    /// Both stages run on an in-memory copy of the source files, dataset and
    /// ledger. Nothing is written back: new files stay unledgered for the next
    /// retraining cycle and the staging model is left alone.
    pub fn execution_time(&self) -> Result<Vec<StageTiming>> {
        let scratch: Arc<dyn ArtifactStore> = Arc::new(self.scratch_copy()?);

        let started = Instant::now();
        let engine = IngestionEngine::new(scratch.clone());
        let new_files = engine.discover_new_files()?;
        engine.merge_sources(&new_files)?;
        let ingestion = started.elapsed().as_secs_f64();

        let started = Instant::now();
        ModelTrainer::new(scratch, self.trainer.clone()).train()?;
        let training = started.elapsed().as_secs_f64();

        info!(ingestion, training, "Measured stage execution times");
        Ok(vec![
            StageTiming {
                stage: "ingestion".to_string(),
                seconds: ingestion,
            },
            StageTiming {
                stage: "training".to_string(),
                seconds: training,
            },
        ])
    }
}
