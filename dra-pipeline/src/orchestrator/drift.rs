//! Drift decision
//!
//! Drift is declared when the deployed model scores strictly lower on the
//! freshly merged dataset than its recorded score. Equal scores are not drift.

use crate::model::Trainer;
use crate::scoring::{ScoreRecord, Scorer, Slot};
use crate::store::{ArtifactKey, ArtifactStore};
use dra_common::Result;
use serde::Serialize;
use std::sync::Arc;
use tracing::info;

/// Outcome of the drift check; derived each cycle, never persisted
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum DriftDecision {
    /// No deployed score record yet: first deployment
    NoBaseline,
    Drift { deployed: f64, new: f64 },
    NoDrift { deployed: f64, new: f64 },
}

impl DriftDecision {
    /// Compare the recorded deployed score with a fresh one
    pub fn compare(deployed: f64, new: f64) -> Self {
        if new < deployed {
            DriftDecision::Drift { deployed, new }
        } else {
            DriftDecision::NoDrift { deployed, new }
        }
    }

    pub fn requires_retrain(&self) -> bool {
        !matches!(self, DriftDecision::NoDrift { .. })
    }
}

/// Runs the drift check against the artifact store
pub struct DriftDetector<T: Trainer> {
    store: Arc<dyn ArtifactStore>,
    scorer: Scorer<T>,
}

impl<T: Trainer> DriftDetector<T> {
    pub fn new(store: Arc<dyn ArtifactStore>, scorer: Scorer<T>) -> Self {
        Self { store, scorer }
    }

    /// Read the deployed score record, then (if one exists) re-score the
    /// deployed model on the canonical dataset and compare.
    ///
    /// The re-score overwrites the deployed score record. A malformed record
    /// is an `Error::Consistency`.
    pub fn check(&self) -> Result<DriftDecision> {
        let baseline = match ScoreRecord::read(self.store.as_ref(), Slot::Deployed)? {
            Some(record) => record,
            None => {
                info!("No deployed score record, treating as first deployment");
                return Ok(DriftDecision::NoBaseline);
            }
        };

        let fresh = self.scorer.score(Slot::Deployed, &ArtifactKey::dataset())?;
        let decision = DriftDecision::compare(baseline.metric, fresh.metric);
        info!(
            deployed = baseline.metric,
            new = fresh.metric,
            drift = decision.requires_retrain(),
            "Checked for model drift"
        );
        Ok(decision)
    }
}
