//! Integration tests for dra-api endpoints
//!
//! The router is driven with `oneshot` over an in-memory artifact store; the
//! probe test runs a real listener on an ephemeral port.

use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use dra_api::client::ApiClient;
use dra_api::{build_router, AppState};
use dra_pipeline::{
    ArtifactKey, ArtifactStore, LogisticRegressionTrainer, MemoryArtifactStore, Slot, Table,
    Trainer,
};
use serde_json::Value;
use std::sync::Arc;
use tower::util::ServiceExt; // for `oneshot` method

const DATA: &str = "corporation,lastmonth_activity,lastyear_activity,number_of_employees,exited\n\
a,0,10,5,1\n\
b,2,14,6,1\n\
c,90,800,40,0\n\
d,85,700,38,0\n";

/// Test helper: store with canonical dataset, test data and a deployed model
fn seeded_store() -> Arc<MemoryArtifactStore> {
    let store = Arc::new(MemoryArtifactStore::new());
    store.insert(ArtifactKey::dataset(), DATA);
    store.insert(ArtifactKey::test_data(), DATA);

    let trainer = LogisticRegressionTrainer::default();
    let table = Table::from_csv(DATA.as_bytes(), "data.csv").unwrap();
    let model = trainer
        .train(&table.features().unwrap(), &table.target().unwrap())
        .unwrap();
    store.insert(Slot::Deployed.model_key(), trainer.encode(&model).unwrap());
    store
}

fn setup_app(store: Arc<MemoryArtifactStore>) -> axum::Router {
    build_router(AppState::new(store))
}

fn test_request(method: &str, uri: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

/// Test helper: Extract JSON body from response
async fn extract_json(body: Body) -> Value {
    let bytes = axum::body::to_bytes(body, usize::MAX)
        .await
        .expect("Should read body");
    serde_json::from_slice(&bytes).expect("Should parse JSON")
}

// =============================================================================
// Health
// =============================================================================

#[tokio::test]
async fn test_health_endpoint() {
    let app = setup_app(Arc::new(MemoryArtifactStore::new()));

    let response = app.oneshot(test_request("GET", "/health")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = extract_json(response.into_body()).await;
    assert_eq!(body["status"], "ok");
    assert_eq!(body["module"], "dra-api");
    assert!(body["version"].is_string());
}

// =============================================================================
// Prediction
// =============================================================================

#[tokio::test]
async fn test_prediction_returns_one_label_per_row() {
    let app = setup_app(seeded_store());

    let response = app
        .oneshot(test_request("POST", "/prediction?file_path=testdata/testdata.csv"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = extract_json(response.into_body()).await;
    assert_eq!(body["file"], "testdata.csv");
    let predictions = body["predictions"].as_array().unwrap();
    assert_eq!(predictions.len(), 4);
    assert!(predictions.iter().all(|p| p == 0 || p == 1));
}

#[tokio::test]
async fn test_prediction_unknown_file_is_404() {
    let app = setup_app(seeded_store());

    let response = app
        .oneshot(test_request("POST", "/prediction?file_path=missing.csv"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body = extract_json(response.into_body()).await;
    assert_eq!(body["error"]["code"], "NOT_FOUND");
}

#[tokio::test]
async fn test_prediction_without_file_path_is_400() {
    let app = setup_app(seeded_store());

    let response = app.oneshot(test_request("POST", "/prediction")).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_prediction_missing_feature_column_is_400() {
    let store = seeded_store();
    store.insert(
        ArtifactKey::new(dra_pipeline::Namespace::TestData, "thin.csv"),
        "lastmonth_activity,exited\n1,0\n",
    );
    let app = setup_app(store);

    let response = app
        .oneshot(test_request("POST", "/prediction?file_path=thin.csv"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = extract_json(response.into_body()).await;
    assert_eq!(body["error"]["code"], "SCHEMA_ERROR");
}

// =============================================================================
// Scoring
// =============================================================================

#[tokio::test]
async fn test_scoring_does_not_touch_drift_baseline() {
    let store = seeded_store();
    let app = setup_app(store.clone());

    let response = app.oneshot(test_request("GET", "/scoring")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = extract_json(response.into_body()).await;
    let f1 = body["f1"].as_f64().unwrap();
    assert!((0.0..=1.0).contains(&f1));
    assert!(!store.exists(&Slot::Deployed.score_key()).unwrap());
}

#[tokio::test]
async fn test_scoring_without_deployed_model_is_404() {
    let store = seeded_store();
    store.remove(&Slot::Deployed.model_key());
    let app = setup_app(store);

    let response = app.oneshot(test_request("GET", "/scoring")).await.unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

// =============================================================================
// Summary statistics and diagnostics
// =============================================================================

#[tokio::test]
async fn test_summary_stats_numeric_columns_only() {
    let app = setup_app(seeded_store());

    let response = app.oneshot(test_request("GET", "/summarystats")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = extract_json(response.into_body()).await;
    let columns: Vec<&str> = body
        .as_array()
        .unwrap()
        .iter()
        .map(|c| c["column"].as_str().unwrap())
        .collect();
    assert_eq!(
        columns,
        vec!["lastmonth_activity", "lastyear_activity", "number_of_employees", "exited"]
    );
    assert_eq!(body[3]["mean"], 0.5);
}

#[tokio::test]
async fn test_summary_stats_without_dataset_is_404() {
    let app = setup_app(Arc::new(MemoryArtifactStore::new()));

    let response = app.oneshot(test_request("GET", "/summarystats")).await.unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_diagnostics_leaves_new_source_files_for_the_pipeline() {
    let store = seeded_store();
    store.insert(
        ArtifactKey::new(dra_pipeline::Namespace::Input, "new.csv"),
        DATA.replace("a,0,10", "e,3,30"),
    );
    let app = setup_app(store.clone());

    let response = app.oneshot(test_request("GET", "/diagnostics")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let engine = dra_pipeline::ingestion::IngestionEngine::new(store.clone());
    assert_eq!(engine.discover_new_files().unwrap().len(), 1);
    assert_eq!(store.get(&ArtifactKey::dataset()).unwrap(), DATA.as_bytes());
}

#[tokio::test]
async fn test_diagnostics_times_stages_and_reports_missing_values() {
    let store = seeded_store();
    let app = setup_app(store.clone());

    let response = app.oneshot(test_request("GET", "/diagnostics")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = extract_json(response.into_body()).await;
    let stages: Vec<&str> = body["execution_time"]
        .as_array()
        .unwrap()
        .iter()
        .map(|t| t["stage"].as_str().unwrap())
        .collect();
    assert_eq!(stages, vec!["ingestion", "training"]);
    assert_eq!(body["missing_values"].as_array().unwrap().len(), 5);
    // Timed runs work on a copy; nothing lands in the real store
    assert!(!store.exists(&Slot::Staging.model_key()).unwrap());
    assert!(!store.exists(&ArtifactKey::ledger()).unwrap());
}

// =============================================================================
// Probe
// =============================================================================

#[tokio::test]
async fn test_probe_collects_every_endpoint() {
    let app = setup_app(seeded_store());
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    let client = ApiClient::new(format!("http://{}", addr)).unwrap();
    let returns = client.probe("testdata.csv").await.unwrap();

    assert!(returns.all_succeeded());
    assert_eq!(returns.prediction.body["predictions"].as_array().unwrap().len(), 4);
    assert!(returns.scoring.body["f1"].is_number());
}

#[tokio::test]
async fn test_probe_records_error_responses() {
    let app = setup_app(Arc::new(MemoryArtifactStore::new()));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    let client = ApiClient::new(format!("http://{}", addr)).unwrap();
    let returns = client.probe("testdata.csv").await.unwrap();

    assert!(!returns.all_succeeded());
    assert_eq!(returns.scoring.status, 404);
}
