//! dra-api library - serving API for the deployed risk model
//!
//! Predictions, scoring, dataset statistics and diagnostics over HTTP, plus a
//! probe client that exercises every endpoint.

use axum::Router;
use dra_pipeline::{ArtifactStore, LogisticRegressionTrainer};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

pub mod api;
pub mod client;
pub mod error;

pub use crate::error::{ApiError, ApiResult};

/// Application state shared across HTTP handlers
#[derive(Clone)]
pub struct AppState {
    /// Artifact store of the active environment
    pub store: Arc<dyn ArtifactStore>,
    pub trainer: Arc<LogisticRegressionTrainer>,
}

impl AppState {
    pub fn new(store: Arc<dyn ArtifactStore>) -> Self {
        Self {
            store,
            trainer: Arc::new(LogisticRegressionTrainer::default()),
        }
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    use axum::routing::{get, post};

    Router::new()
        .route("/prediction", post(api::prediction))
        .route("/scoring", get(api::scoring))
        .route("/summarystats", get(api::summary_stats))
        .route("/diagnostics", get(api::diagnostics))
        .merge(api::health_routes())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
