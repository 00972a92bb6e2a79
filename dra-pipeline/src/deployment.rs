//! Promotion of staging artifacts into the deployed slot
//!
//! Copy order is ledger, score record, model. Until the model copy lands the
//! previous deployed model keeps serving.

use crate::scoring::Slot;
use crate::store::{ArtifactKey, ArtifactStore, Namespace, LEDGER_FILE};
use dra_common::{Error, Result};
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, warn};

/// Artifacts copied by one deployment, in copy order
#[derive(Debug, Clone, Default, Serialize)]
pub struct DeploymentOutcome {
    pub copied: Vec<ArtifactKey>,
}

#[derive(Clone)]
pub struct Deployer {
    store: Arc<dyn ArtifactStore>,
}

impl Deployer {
    pub fn new(store: Arc<dyn ArtifactStore>) -> Self {
        Self { store }
    }

    /// Copy staging model, staging score record and the ingestion ledger into
    /// the deployed slot.
    ///
    /// Staging must hold both a model and a score record; otherwise nothing is
    /// copied and `Error::NotFound` is returned. A missing ledger is logged and
    /// skipped.
    pub fn deploy(&self) -> Result<DeploymentOutcome> {
        let model = Slot::Staging.model_key();
        let score = Slot::Staging.score_key();
        for key in [&model, &score] {
            if !self.store.exists(key)? {
                return Err(Error::NotFound(format!("nothing to deploy: {} is missing", key)));
            }
        }

        let mut outcome = DeploymentOutcome::default();

        let ledger = ArtifactKey::ledger();
        if self.store.exists(&ledger)? {
            let target = ArtifactKey::new(Namespace::Deployed, LEDGER_FILE);
            self.store.copy(&ledger, &target)?;
            outcome.copied.push(target);
        } else {
            warn!(key = %ledger, "No ingestion ledger to deploy, skipping");
        }

        for (from, to) in [
            (score, Slot::Deployed.score_key()),
            (model, Slot::Deployed.model_key()),
        ] {
            self.store.copy(&from, &to)?;
            outcome.copied.push(to);
        }

        info!(copied = outcome.copied.len(), "Deployed staging artifacts");
        Ok(outcome)
    }
}
