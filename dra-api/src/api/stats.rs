//! Summary statistics of the canonical dataset

use axum::{extract::State, Json};
use dra_pipeline::diagnostics::{ColumnSummary, Diagnostics};

use crate::error::{run_blocking, ApiResult};
use crate::AppState;

/// GET /summarystats
///
/// Mean, median and standard deviation of every numeric column.
pub async fn summary_stats(State(state): State<AppState>) -> ApiResult<Json<Vec<ColumnSummary>>> {
    let summary = run_blocking(move || Diagnostics::new(state.store, state.trainer).dataset_summary()).await?;
    Ok(Json(summary))
}
