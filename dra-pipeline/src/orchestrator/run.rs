//! Retraining cycle state machine
//!
//! CHECK_DATA → INGEST → CHECK_DRIFT → RETRAIN → DEPLOY → REPORT → DONE, with
//! early exits to DONE after CHECK_DATA (no new files) and CHECK_DRIFT (no
//! drift).

use super::drift::DriftDecision;
use crate::deployment::DeploymentOutcome;
use crate::ingestion::MergeResult;
use crate::store::ArtifactKey;
use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

/// Cycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PipelineState {
    CheckData,
    Ingest,
    CheckDrift,
    Retrain,
    Deploy,
    Report,
    Done,
}

/// State transition event
#[derive(Debug, Clone, Serialize)]
pub struct StageTransition {
    pub run_id: Uuid,
    pub old_state: PipelineState,
    pub new_state: PipelineState,
    pub transitioned_at: DateTime<Utc>,
}

/// One retraining cycle (in-memory only)
#[derive(Debug, Clone, Serialize)]
pub struct PipelineRun {
    pub run_id: Uuid,
    pub state: PipelineState,
    pub transitions: Vec<StageTransition>,

    /// Files found by CHECK_DATA
    pub new_files: Vec<String>,
    pub merge: Option<MergeResult>,
    pub drift: Option<DriftDecision>,
    /// Staging model score on the canonical dataset after RETRAIN
    pub staging_score: Option<f64>,
    pub deployment: Option<DeploymentOutcome>,
    /// Artifacts written by REPORT
    pub reports: Vec<ArtifactKey>,
    /// REPORT failure; never fails the run
    pub report_error: Option<String>,

    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
}

impl PipelineRun {
    pub fn new() -> Self {
        Self {
            run_id: Uuid::new_v4(),
            state: PipelineState::CheckData,
            transitions: Vec::new(),
            new_files: Vec::new(),
            merge: None,
            drift: None,
            staging_score: None,
            deployment: None,
            reports: Vec::new(),
            report_error: None,
            started_at: Utc::now(),
            ended_at: None,
        }
    }

    /// Move to `new_state`, recording the transition
    pub fn transition_to(&mut self, new_state: PipelineState) -> StageTransition {
        let transition = StageTransition {
            run_id: self.run_id,
            old_state: self.state,
            new_state,
            transitioned_at: Utc::now(),
        };
        self.state = new_state;
        self.transitions.push(transition.clone());

        if new_state == PipelineState::Done {
            self.ended_at = Some(Utc::now());
        }

        transition
    }

    /// States visited in order, starting with CHECK_DATA
    pub fn path(&self) -> Vec<PipelineState> {
        std::iter::once(PipelineState::CheckData)
            .chain(self.transitions.iter().map(|t| t.new_state))
            .collect()
    }

    /// Last state before DONE
    pub fn stopped_after(&self) -> Option<PipelineState> {
        self.transitions
            .iter()
            .rev()
            .find(|t| t.new_state == PipelineState::Done)
            .map(|t| t.old_state)
    }

    pub fn is_done(&self) -> bool {
        self.state == PipelineState::Done
    }

    /// True when a new model reached the deployed slot
    pub fn deployed(&self) -> bool {
        self.deployment.is_some()
    }

    pub fn duration_seconds(&self) -> Option<f64> {
        self.ended_at
            .map(|end| (end - self.started_at).num_milliseconds() as f64 / 1000.0)
    }
}

impl Default for PipelineRun {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_run_starts_at_check_data() {
        let run = PipelineRun::new();
        assert_eq!(run.state, PipelineState::CheckData);
        assert_eq!(run.path(), vec![PipelineState::CheckData]);
        assert!(run.ended_at.is_none());
    }

    #[test]
    fn test_done_sets_end_time_and_stop_point() {
        let mut run = PipelineRun::new();
        run.transition_to(PipelineState::Ingest);
        run.transition_to(PipelineState::CheckDrift);
        let t = run.transition_to(PipelineState::Done);

        assert_eq!(t.old_state, PipelineState::CheckDrift);
        assert!(run.is_done());
        assert!(run.ended_at.is_some());
        assert_eq!(run.stopped_after(), Some(PipelineState::CheckDrift));
    }

    #[test]
    fn test_state_serializes_uppercase() {
        let json = serde_json::to_string(&PipelineState::CheckDrift).unwrap();
        assert_eq!(json, "\"CHECK_DRIFT\"");
    }
}
