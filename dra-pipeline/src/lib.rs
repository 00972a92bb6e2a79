//! dra-pipeline library interface
//!
//! Model retraining pipeline for the dynamic risk assessment system: ingest
//! new source files, check the deployed model for drift, retrain, deploy and
//! report. Exposed as a library for the serving API and integration tests.

pub mod dataset;
pub mod deployment;
pub mod diagnostics;
pub mod ingestion;
pub mod model;
pub mod orchestrator;
pub mod reporting;
pub mod scoring;
pub mod store;
pub mod training;

pub use crate::dataset::Table;
pub use crate::model::{Classifier, LogisticRegression, LogisticRegressionTrainer, Trainer};
pub use crate::orchestrator::{DriftDecision, Orchestrator, PipelineRun, PipelineState};
pub use crate::scoring::{ScoreRecord, Scorer, Slot};
pub use crate::store::{ArtifactKey, ArtifactStore, FsArtifactStore, MemoryArtifactStore, Namespace};

use dra_common::{PipelineConfig, ResolvedPaths, Result};
use std::path::Path;
use std::sync::Arc;

/// Filesystem store for a loaded config, relative roots joined to `base_dir`
pub fn open_store(config: &PipelineConfig, base_dir: &Path) -> Result<(ResolvedPaths, Arc<dyn ArtifactStore>)> {
    let paths = config.resolve(base_dir)?;
    let store: Arc<dyn ArtifactStore> = Arc::new(FsArtifactStore::new(&paths));
    Ok((paths, store))
}
