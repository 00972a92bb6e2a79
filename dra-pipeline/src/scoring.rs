//! Scoring: F1 of a slot's model and the per-slot score record
//!
//! Each slot (staging, deployed) holds exactly one score record,
//! `<YYYY-MM-DD HH:MM:SS>, <f1>`, overwritten by every `score` call.

use crate::dataset::Table;
use crate::model::{Classifier, Trainer};
use crate::store::{ArtifactKey, ArtifactStore, Namespace, MODEL_FILE, SCORE_FILE};
use chrono::{DateTime, Utc};
use dra_common::{time, Error, Result};
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use tracing::info;

/// Model slot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Slot {
    /// Freshly trained, not promoted
    Staging,
    /// Currently serving
    Deployed,
}

impl Slot {
    pub fn namespace(&self) -> Namespace {
        match self {
            Slot::Staging => Namespace::Staging,
            Slot::Deployed => Namespace::Deployed,
        }
    }

    pub fn model_key(&self) -> ArtifactKey {
        ArtifactKey::new(self.namespace(), MODEL_FILE)
    }

    pub fn score_key(&self) -> ArtifactKey {
        ArtifactKey::new(self.namespace(), SCORE_FILE)
    }
}

impl fmt::Display for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.namespace().as_str())
    }
}

impl std::str::FromStr for Slot {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "staging" => Ok(Slot::Staging),
            "deployed" => Ok(Slot::Deployed),
            other => Err(Error::InvalidInput(format!(
                "unknown slot {:?} (expected staging or deployed)",
                other
            ))),
        }
    }
}

/// Latest score of a slot
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoreRecord {
    pub timestamp: DateTime<Utc>,
    pub metric: f64,
}

impl ScoreRecord {
    pub fn new(metric: f64) -> Self {
        Self {
            timestamp: time::now(),
            metric,
        }
    }

    /// Single record line with trailing newline
    pub fn to_line(&self) -> String {
        // f64 Display is the shortest text that parses back to the same value
        format!("{}, {}\n", time::format_record(&self.timestamp), self.metric)
    }

    /// Parse a record file. Anything but one well-formed line is fatal: a
    /// drift decision must not be made against a guessed baseline.
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        let text = std::str::from_utf8(bytes)
            .map_err(|e| Error::Consistency(format!("score record is not UTF-8: {}", e)))?
            .trim();
        let malformed = || Error::Consistency(format!("invalid score record {:?}", text));

        let (timestamp, metric) = text.split_once(", ").ok_or_else(malformed)?;
        let metric: f64 = metric.trim().parse().map_err(|_| malformed())?;
        if !(0.0..=1.0).contains(&metric) {
            return Err(malformed());
        }
        let timestamp = time::parse_record(timestamp).map_err(|_| malformed())?;

        Ok(Self { timestamp, metric })
    }

    /// Read a slot's record; `None` when the slot has never been scored
    pub fn read(store: &dyn ArtifactStore, slot: Slot) -> Result<Option<Self>> {
        store
            .get_optional(&slot.score_key())?
            .map(|bytes| Self::parse(&bytes))
            .transpose()
    }

    /// Overwrite a slot's record
    pub fn write(&self, store: &dyn ArtifactStore, slot: Slot) -> Result<()> {
        store.put(&slot.score_key(), self.to_line().as_bytes())
    }
}

/// Binary F1 for the positive class 1. Zero when precision + recall is zero.
pub fn f1_score(y_true: &[u8], y_pred: &[u8]) -> f64 {
    let (mut tp, mut fp, mut fn_) = (0usize, 0usize, 0usize);
    for (&t, &p) in y_true.iter().zip(y_pred.iter()) {
        match (t, p) {
            (1, 1) => tp += 1,
            (0, 1) => fp += 1,
            (1, 0) => fn_ += 1,
            _ => {}
        }
    }
    let denom = 2 * tp + fp + fn_;
    if denom == 0 {
        0.0
    } else {
        (2 * tp) as f64 / denom as f64
    }
}

/// Scores slot models against datasets in the artifact store
pub struct Scorer<T: Trainer> {
    store: Arc<dyn ArtifactStore>,
    trainer: Arc<T>,
}

impl<T: Trainer> Clone for Scorer<T> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            trainer: self.trainer.clone(),
        }
    }
}

impl<T: Trainer> Scorer<T> {
    pub fn new(store: Arc<dyn ArtifactStore>, trainer: Arc<T>) -> Self {
        Self { store, trainer }
    }

    /// Decode a slot's model; `Error::NotFound` when the slot is empty
    pub fn load_model(&self, slot: Slot) -> Result<T::Model> {
        let bytes = self.store.get(&slot.model_key())?;
        self.trainer.decode(&bytes)
    }

    /// Read a dataset; `Error::NotFound` when absent
    pub fn load_table(&self, key: &ArtifactKey) -> Result<Table> {
        let bytes = self.store.get(key)?;
        Table::from_csv(&bytes, &key.to_string())
    }

    /// Predict every row of `table` with a slot's model
    pub fn predict(&self, slot: Slot, table: &Table) -> Result<Vec<u8>> {
        let model = self.load_model(slot)?;
        let features = table.features()?;
        let predictions = model.predict(&features);
        if predictions.len() != table.len() {
            return Err(Error::Internal(format!(
                "{} predictions for {} rows",
                predictions.len(),
                table.len()
            )));
        }
        Ok(predictions)
    }

    /// F1 of a slot's model on a dataset, without touching the score record
    pub fn evaluate(&self, slot: Slot, dataset: &ArtifactKey) -> Result<f64> {
        let model = self.load_model(slot)?;
        let table = self.load_table(dataset)?;
        let features = table.features()?;
        let target = table.target()?;

        info!(slot = %slot, dataset = %dataset, rows = table.len(), "Start prediction and scoring");
        let predictions = model.predict(&features);
        Ok(f1_score(&target, &predictions))
    }

    /// F1 of a slot's model on a dataset, persisted as the slot's score record
    pub fn score(&self, slot: Slot, dataset: &ArtifactKey) -> Result<ScoreRecord> {
        let record = ScoreRecord::new(self.evaluate(slot, dataset)?);
        record.write(self.store.as_ref(), slot)?;
        info!(slot = %slot, f1 = record.metric, "Scoring completed, record written");
        Ok(record)
    }
}
