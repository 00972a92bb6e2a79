//! Model training stage

use crate::dataset::Table;
use crate::model::Trainer;
use crate::scoring::Slot;
use crate::store::{ArtifactKey, ArtifactStore};
use dra_common::Result;
use serde::Serialize;
use std::sync::Arc;
use tracing::info;

/// What a training run produced
#[derive(Debug, Clone, Serialize)]
pub struct TrainingOutcome {
    pub model_key: ArtifactKey,
    pub samples: usize,
}

/// Fits a model on a dataset and stores it in the staging slot
pub struct ModelTrainer<T: Trainer> {
    store: Arc<dyn ArtifactStore>,
    trainer: Arc<T>,
}

impl<T: Trainer> Clone for ModelTrainer<T> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            trainer: self.trainer.clone(),
        }
    }
}

impl<T: Trainer> ModelTrainer<T> {
    pub fn new(store: Arc<dyn ArtifactStore>, trainer: Arc<T>) -> Self {
        Self { store, trainer }
    }

    /// Train on the canonical dataset
    pub fn train(&self) -> Result<TrainingOutcome> {
        self.train_from(&ArtifactKey::dataset())
    }

    /// Train on `dataset` and overwrite the staging model.
    ///
    /// `Error::NotFound` when the dataset is absent, `Error::Schema` when it
    /// lacks the feature or target columns.
    pub fn train_from(&self, dataset: &ArtifactKey) -> Result<TrainingOutcome> {
        let bytes = self.store.get(dataset)?;
        let table = Table::from_csv(&bytes, &dataset.to_string())?;
        let features = table.features()?;
        let target = table.target()?;

        info!(dataset = %dataset, rows = table.len(), "Fitting model");
        let model = self.trainer.train(&features, &target)?;

        let model_key = Slot::Staging.model_key();
        self.store.put(&model_key, &self.trainer.encode(&model)?)?;
        info!(key = %model_key, "Saved trained model");

        Ok(TrainingOutcome {
            model_key,
            samples: table.len(),
        })
    }
}
