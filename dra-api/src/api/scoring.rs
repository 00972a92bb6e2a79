//! Deployed-model score on held-out test data

use axum::{extract::State, Json};
use dra_pipeline::{ArtifactKey, Scorer, Slot};
use serde::Serialize;

use crate::error::{run_blocking, ApiResult};
use crate::AppState;

#[derive(Debug, Serialize)]
pub struct ScoringResponse {
    pub dataset: String,
    pub f1: f64,
}

/// GET /scoring
///
/// Not persisted; the deployed score record stays the drift baseline over the
/// canonical dataset.
pub async fn scoring(State(state): State<AppState>) -> ApiResult<Json<ScoringResponse>> {
    let dataset = ArtifactKey::test_data();
    let key = dataset.clone();
    let f1 = run_blocking(move || {
        Scorer::new(state.store, state.trainer).evaluate(Slot::Deployed, &key)
    })
    .await?;

    Ok(Json(ScoringResponse {
        dataset: dataset.to_string(),
        f1,
    }))
}
