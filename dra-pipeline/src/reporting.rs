//! Model reports over held-out test data

use crate::model::Trainer;
use crate::scoring::{f1_score, Scorer, Slot};
use crate::store::{ArtifactKey, ArtifactStore, Namespace, REPORT_FILE, REPORT_JSON_FILE};
use dra_common::{Error, Result};
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use tracing::info;

/// A report that can be regenerated from the current artifacts
pub trait Reporter: Send + Sync {
    /// Compute and persist the report; returns the keys written
    fn report(&self) -> Result<Vec<ArtifactKey>>;
}

/// Binary confusion matrix, `counts[true][predicted]`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ConfusionMatrix {
    counts: [[usize; 2]; 2],
}

impl ConfusionMatrix {
    pub fn from_predictions(y_true: &[u8], y_pred: &[u8]) -> Result<Self> {
        if y_true.len() != y_pred.len() {
            return Err(Error::InvalidInput(format!(
                "{} labels but {} predictions",
                y_true.len(),
                y_pred.len()
            )));
        }
        let mut cm = Self::default();
        for (&t, &p) in y_true.iter().zip(y_pred.iter()) {
            if t > 1 || p > 1 {
                return Err(Error::InvalidInput(format!("non-binary label pair ({}, {})", t, p)));
            }
            cm.counts[t as usize][p as usize] += 1;
        }
        Ok(cm)
    }

    pub fn get(&self, true_label: u8, predicted: u8) -> usize {
        self.counts[true_label as usize][predicted as usize]
    }

    pub fn true_positives(&self) -> usize {
        self.counts[1][1]
    }

    pub fn false_positives(&self) -> usize {
        self.counts[0][1]
    }

    pub fn false_negatives(&self) -> usize {
        self.counts[1][0]
    }

    pub fn true_negatives(&self) -> usize {
        self.counts[0][0]
    }

    pub fn total(&self) -> usize {
        self.counts.iter().flatten().sum()
    }

    pub fn accuracy(&self) -> f64 {
        let total = self.total();
        if total == 0 {
            return 0.0;
        }
        (self.true_positives() + self.true_negatives()) as f64 / total as f64
    }

    pub fn precision(&self) -> f64 {
        ratio(self.true_positives(), self.true_positives() + self.false_positives())
    }

    pub fn recall(&self) -> f64 {
        ratio(self.true_positives(), self.true_positives() + self.false_negatives())
    }
}

fn ratio(num: usize, den: usize) -> f64 {
    if den == 0 {
        0.0
    } else {
        num as f64 / den as f64
    }
}

impl fmt::Display for ConfusionMatrix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{:>10} {:>8} {:>8}", "", "Pred 0", "Pred 1")?;
        for t in 0..2u8 {
            writeln!(f, "{:>10} {:>8} {:>8}", format!("True {}", t), self.get(t, 0), self.get(t, 1))?;
        }
        Ok(())
    }
}

/// Full confusion-matrix report content
#[derive(Debug, Clone, Serialize)]
pub struct ConfusionReport {
    pub dataset: String,
    pub samples: usize,
    pub matrix: ConfusionMatrix,
    pub accuracy: f64,
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
}

impl ConfusionReport {
    fn render(&self) -> String {
        format!(
            "Confusion matrix of the deployed model on {} ({} samples)\n\n{}\n\
             accuracy:  {:.4}\nprecision: {:.4}\nrecall:    {:.4}\nf1:        {:.4}\n",
            self.dataset,
            self.samples,
            self.matrix,
            self.accuracy,
            self.precision,
            self.recall,
            self.f1
        )
    }
}

/// Confusion matrix of the deployed model on held-out test data, written to
/// the staging slot as text and JSON
pub struct ConfusionMatrixReporter<T: Trainer> {
    store: Arc<dyn ArtifactStore>,
    scorer: Scorer<T>,
    test_data: ArtifactKey,
}

impl<T: Trainer> ConfusionMatrixReporter<T> {
    pub fn new(store: Arc<dyn ArtifactStore>, trainer: Arc<T>) -> Self {
        Self {
            scorer: Scorer::new(store.clone(), trainer),
            store,
            test_data: ArtifactKey::test_data(),
        }
    }

    /// Report against a different dataset
    pub fn with_test_data(mut self, key: ArtifactKey) -> Self {
        self.test_data = key;
        self
    }

    /// Compute the report without persisting it
    pub fn build(&self) -> Result<ConfusionReport> {
        let table = self.scorer.load_table(&self.test_data)?;
        let target = table.target()?;
        let predictions = self.scorer.predict(Slot::Deployed, &table)?;
        let matrix = ConfusionMatrix::from_predictions(&target, &predictions)?;

        Ok(ConfusionReport {
            dataset: self.test_data.to_string(),
            samples: table.len(),
            accuracy: matrix.accuracy(),
            precision: matrix.precision(),
            recall: matrix.recall(),
            f1: f1_score(&target, &predictions),
            matrix,
        })
    }
}

impl<T: Trainer> Reporter for ConfusionMatrixReporter<T> {
    fn report(&self) -> Result<Vec<ArtifactKey>> {
        let report = self.build()?;

        let text_key = ArtifactKey::new(Namespace::Staging, REPORT_FILE);
        let json_key = ArtifactKey::new(Namespace::Staging, REPORT_JSON_FILE);
        let json = serde_json::to_vec_pretty(&report)
            .map_err(|e| Error::Internal(format!("report serialization failed: {}", e)))?;

        self.store.put(&text_key, report.render().as_bytes())?;
        self.store.put(&json_key, &json)?;

        info!(
            samples = report.samples,
            f1 = report.f1,
            key = %text_key,
            "Confusion matrix report written"
        );
        Ok(vec![text_key, json_key])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::LogisticRegressionTrainer;
    use crate::store::MemoryArtifactStore;

    #[test]
    fn test_matrix_counts() {
        let cm = ConfusionMatrix::from_predictions(&[1, 1, 0, 0, 1], &[1, 0, 0, 1, 1]).unwrap();
        assert_eq!(cm.true_positives(), 2);
        assert_eq!(cm.false_negatives(), 1);
        assert_eq!(cm.false_positives(), 1);
        assert_eq!(cm.true_negatives(), 1);
        assert_eq!(cm.total(), 5);
        assert!((cm.precision() - 2.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_matrix_rejects_length_mismatch() {
        assert!(ConfusionMatrix::from_predictions(&[1], &[]).is_err());
    }

    #[test]
    fn test_display_has_both_rows() {
        let cm = ConfusionMatrix::from_predictions(&[0, 1], &[0, 1]).unwrap();
        let text = cm.to_string();
        assert!(text.contains("True 0"));
        assert!(text.contains("True 1"));
    }

    #[test]
    fn test_report_without_deployed_model_fails() {
        let store = Arc::new(MemoryArtifactStore::new());
        store.insert(
            ArtifactKey::test_data(),
            "lastmonth_activity,lastyear_activity,number_of_employees,exited\n1,2,3,0\n",
        );
        let reporter =
            ConfusionMatrixReporter::new(store, Arc::new(LogisticRegressionTrainer::default()));
        assert!(matches!(reporter.report(), Err(Error::NotFound(_))));
    }

    #[test]
    fn test_report_writes_text_and_json() {
        let store = Arc::new(MemoryArtifactStore::new());
        let trainer = Arc::new(LogisticRegressionTrainer::default());
        let data = "lastmonth_activity,lastyear_activity,number_of_employees,exited\n\
0,10,5,1\n1,12,6,1\n90,800,40,0\n85,700,38,0\n";
        store.insert(ArtifactKey::test_data(), data);
        let table = crate::dataset::Table::from_csv(data.as_bytes(), "t").unwrap();
        let model = trainer
            .train(&table.features().unwrap(), &table.target().unwrap())
            .unwrap();
        store.insert(Slot::Deployed.model_key(), trainer.encode(&model).unwrap());

        let written = ConfusionMatrixReporter::new(store.clone(), trainer)
            .report()
            .unwrap();

        assert_eq!(written.len(), 2);
        let text = String::from_utf8(store.get(&written[0]).unwrap()).unwrap();
        assert!(text.contains("4 samples"));
        let json: serde_json::Value = serde_json::from_slice(&store.get(&written[1]).unwrap()).unwrap();
        assert_eq!(json["samples"], 4);
    }
}
