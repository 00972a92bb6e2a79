//! Pipeline diagnostics

use axum::{extract::State, Json};
use dra_pipeline::diagnostics::{Diagnostics, MissingValues, StageTiming};
use serde::Serialize;

use crate::error::{run_blocking, ApiResult};
use crate::AppState;

#[derive(Debug, Serialize)]
pub struct DiagnosticsResponse {
    pub execution_time: Vec<StageTiming>,
    pub missing_values: Vec<MissingValues>,
}

/// GET /diagnostics
///
/// Times an ingestion and a training pass run on an in-memory copy of the
/// store, then reports missing-value percentages of the canonical dataset.
/// New source files are not consumed.
pub async fn diagnostics(State(state): State<AppState>) -> ApiResult<Json<DiagnosticsResponse>> {
    let response = run_blocking(move || {
        let diagnostics = Diagnostics::new(state.store, state.trainer);
        let execution_time = diagnostics.execution_time()?;
        let missing_values = diagnostics.dataset_missing_values()?;
        Ok(DiagnosticsResponse {
            execution_time,
            missing_values,
        })
    })
    .await?;

    Ok(Json(response))
}
