//! Retraining cycle orchestrator
//!
//! # State Progression
//! CHECK_DATA → INGEST → CHECK_DRIFT → RETRAIN → DEPLOY → REPORT → DONE
//!
//! Each state is handled by a `phase_*` method. A phase either advances the
//! run or ends it at DONE. Errors from CHECK_DATA through DEPLOY abort the
//! cycle and leave already committed stages in place; a REPORT failure is
//! recorded on the run and logged.

mod drift;
mod run;

pub use drift::{DriftDecision, DriftDetector};
pub use run::{PipelineRun, PipelineState, StageTransition};

use crate::deployment::Deployer;
use crate::ingestion::IngestionEngine;
use crate::model::Trainer;
use crate::reporting::{ConfusionMatrixReporter, Reporter};
use crate::scoring::{Scorer, Slot};
use crate::store::{ArtifactKey, ArtifactStore};
use crate::training::ModelTrainer;
use dra_common::Result;
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{error, info};

/// Drives one retraining cycle over an injected store and trainer
pub struct Orchestrator<T: Trainer> {
    ingestion: IngestionEngine,
    drift: DriftDetector<T>,
    trainer: ModelTrainer<T>,
    scorer: Scorer<T>,
    deployer: Deployer,
    reporter: Arc<dyn Reporter>,
}

impl<T: Trainer + 'static> Orchestrator<T> {
    pub fn new(store: Arc<dyn ArtifactStore>, trainer: Arc<T>) -> Self {
        let scorer = Scorer::new(store.clone(), trainer.clone());
        Self {
            ingestion: IngestionEngine::new(store.clone()),
            drift: DriftDetector::new(store.clone(), scorer.clone()),
            trainer: ModelTrainer::new(store.clone(), trainer.clone()),
            scorer,
            deployer: Deployer::new(store.clone()),
            reporter: Arc::new(ConfusionMatrixReporter::new(store, trainer)),
        }
    }
}

impl<T: Trainer> Orchestrator<T> {
    /// Replace the REPORT stage reporter
    pub fn with_reporter(mut self, reporter: Arc<dyn Reporter>) -> Self {
        self.reporter = reporter;
        self
    }

    /// Execute one complete cycle
    pub fn run_cycle(&self) -> Result<PipelineRun> {
        let mut run = PipelineRun::new();
        info!(run_id = %run.run_id, "Starting retraining cycle");

        match self.advance(&mut run) {
            Ok(()) => {
                info!(
                    run_id = %run.run_id,
                    stopped_after = ?run.stopped_after(),
                    deployed = run.deployed(),
                    duration_seconds = run.duration_seconds(),
                    "Retraining cycle finished"
                );
                Ok(run)
            }
            Err(e) => {
                error!(run_id = %run.run_id, state = ?run.state, error = %e, "Retraining cycle aborted");
                Err(e)
            }
        }
    }

    fn advance(&self, run: &mut PipelineRun) -> Result<()> {
        let Some(new_files) = self.phase_check_data(run)? else {
            return Ok(());
        };
        self.phase_ingest(run, &new_files)?;
        if !self.phase_check_drift(run)? {
            return Ok(());
        }
        self.phase_retrain(run)?;
        self.phase_deploy(run)?;
        self.phase_report(run);
        run.transition_to(PipelineState::Done);
        Ok(())
    }

    /// CHECK_DATA: `None` ends the run
    fn phase_check_data(&self, run: &mut PipelineRun) -> Result<Option<BTreeSet<String>>> {
        let new_files = self.ingestion.discover_new_files()?;
        run.new_files = new_files.iter().cloned().collect();

        if new_files.is_empty() {
            info!("No new source files, nothing to do");
            run.transition_to(PipelineState::Done);
            return Ok(None);
        }
        info!(count = new_files.len(), "New source files found");
        Ok(Some(new_files))
    }

    /// INGEST: a merge that added nothing still goes on to CHECK_DRIFT
    fn phase_ingest(&self, run: &mut PipelineRun, new_files: &BTreeSet<String>) -> Result<()> {
        run.transition_to(PipelineState::Ingest);
        let merge = self.ingestion.merge_sources(new_files)?;
        info!(
            rows_added = merge.rows_added,
            ingested = merge.ledger_appended.len(),
            skipped = merge.skipped.len(),
            "Ingestion finished"
        );
        run.merge = Some(merge);
        Ok(())
    }

    /// CHECK_DRIFT: `false` ends the run
    fn phase_check_drift(&self, run: &mut PipelineRun) -> Result<bool> {
        run.transition_to(PipelineState::CheckDrift);
        let decision = self.drift.check()?;
        run.drift = Some(decision);

        if !decision.requires_retrain() {
            info!(?decision, "No model drift, keeping deployed model");
            run.transition_to(PipelineState::Done);
            return Ok(false);
        }
        Ok(true)
    }

    /// RETRAIN: train into staging, then score the staging model so a fresh
    /// staging score record exists for DEPLOY
    fn phase_retrain(&self, run: &mut PipelineRun) -> Result<()> {
        run.transition_to(PipelineState::Retrain);
        self.trainer.train()?;
        let record = self.scorer.score(Slot::Staging, &ArtifactKey::dataset())?;
        run.staging_score = Some(record.metric);
        Ok(())
    }

    fn phase_deploy(&self, run: &mut PipelineRun) -> Result<()> {
        run.transition_to(PipelineState::Deploy);
        run.deployment = Some(self.deployer.deploy()?);
        Ok(())
    }

    fn phase_report(&self, run: &mut PipelineRun) {
        run.transition_to(PipelineState::Report);
        match self.reporter.report() {
            Ok(keys) => run.reports = keys,
            Err(e) => {
                error!(error = %e, "Report generation failed, continuing");
                run.report_error = Some(e.to_string());
            }
        }
    }
}
