//! Deployed-model predictions on a held-out data file

use axum::{
    extract::{Query, State},
    Json,
};
use dra_pipeline::{ArtifactKey, Namespace, Scorer, Slot};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{run_blocking, ApiError, ApiResult};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct PredictionQuery {
    /// File in the test data location. Only the final path component is
    /// used, so `testdata/testdata.csv` and `testdata.csv` are the same file.
    pub file_path: String,
}

#[derive(Debug, Serialize)]
pub struct PredictionResponse {
    pub file: String,
    pub predictions: Vec<u8>,
}

/// Resolve a client-supplied path to a test data key
pub fn test_data_key(file_path: &str) -> ApiResult<ArtifactKey> {
    let name = Path::new(file_path.trim())
        .file_name()
        .and_then(|n| n.to_str())
        .filter(|n| !n.is_empty())
        .ok_or_else(|| ApiError::BadRequest(format!("invalid file_path {:?}", file_path)))?;
    Ok(ArtifactKey::new(Namespace::TestData, name))
}

/// POST /prediction?file_path=<name>
pub async fn prediction(
    State(state): State<AppState>,
    Query(query): Query<PredictionQuery>,
) -> ApiResult<Json<PredictionResponse>> {
    let key = test_data_key(&query.file_path)?;
    let file = key.name.clone();

    let predictions = run_blocking(move || {
        let scorer = Scorer::new(state.store, state.trainer);
        let table = scorer.load_table(&key)?;
        scorer.predict(Slot::Deployed, &table)
    })
    .await?;

    tracing::info!(file = %file, rows = predictions.len(), "Served predictions");
    Ok(Json(PredictionResponse { file, predictions }))
}
