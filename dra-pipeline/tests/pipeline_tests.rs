//! Retraining cycle tests against a filesystem artifact store
//!
//! Each test builds the five folders of an environment inside a TempDir and
//! drives the pipeline through its public API.

use chrono::Utc;
use dra_common::{Error, ResolvedPaths, Result};
use dra_pipeline::dataset::FEATURE_COLUMNS;
use dra_pipeline::ingestion::{parse_ledger, IngestionEngine};
use dra_pipeline::store::{DATASET_FILE, LEDGER_FILE, MODEL_FILE, REPORT_FILE, SCORE_FILE};
use dra_pipeline::{
    ArtifactKey, ArtifactStore, DriftDecision, FsArtifactStore, LogisticRegression,
    LogisticRegressionTrainer, MemoryArtifactStore, Namespace, Orchestrator, PipelineState,
    ScoreRecord, Slot, Table, Trainer,
};
use std::collections::BTreeSet;
use std::fs;
use std::sync::Arc;
use tempfile::TempDir;

const HEADER: &str = "corporation,lastmonth_activity,lastyear_activity,number_of_employees,exited";

/// Helper: environment folders under a TempDir, input folder created
fn create_environment() -> (TempDir, ResolvedPaths) {
    let dir = TempDir::new().unwrap();
    let base = dir.path();
    let paths = ResolvedPaths {
        environment: "test".to_string(),
        input_folder: base.join("sourcedata"),
        output_folder: base.join("ingesteddata"),
        output_model: base.join("models"),
        deployment: base.join("production_deployment"),
        test_data: base.join("testdata"),
    };
    fs::create_dir_all(&paths.input_folder).unwrap();
    (dir, paths)
}

fn row(corp: &str, lastmonth: u32, lastyear: u32, employees: u32, exited: u8) -> String {
    format!("{},{},{},{},{}", corp, lastmonth, lastyear, employees, exited)
}

fn write_csv(dir: &std::path::Path, name: &str, rows: &[String]) {
    let mut content = format!("{}\n", HEADER);
    for r in rows {
        content.push_str(r);
        content.push('\n');
    }
    fs::create_dir_all(dir).unwrap();
    fs::write(dir.join(name), content).unwrap();
}

/// `count` distinct rows; low recent activity means the customer exited
fn generated_rows(prefix: &str, count: u32) -> Vec<String> {
    (0..count)
        .map(|i| {
            let exited = u8::from(i % 2 == 0);
            let lastmonth = if exited == 1 { i % 7 } else { 40 + i % 30 };
            row(&format!("{}{}", prefix, i), lastmonth, lastmonth * 12 + i, 3 + i % 11, exited)
        })
        .collect()
}

/// Rows on which `threshold_model` scores F1 = 34 / 40 = 0.85
/// (17 true positives, 3 false positives, 3 false negatives, 10 true negatives)
fn f1_085_rows() -> Vec<String> {
    let mut rows = Vec::new();
    rows.extend((0..17).map(|i| row(&format!("tp{}", i), i % 5, 10, 5, 1)));
    rows.extend((0..3).map(|i| row(&format!("fp{}", i), 1, 10, 5, 0)));
    rows.extend((0..3).map(|i| row(&format!("fn{}", i), 50, 400, 20, 1)));
    rows.extend((0..10).map(|i| row(&format!("tn{}", i), 60, 500, 30, 0)));
    rows
}

/// Predicts exit exactly when last month's activity is below 4.5
fn threshold_model() -> LogisticRegression {
    LogisticRegression {
        feature_names: FEATURE_COLUMNS.iter().map(|s| s.to_string()).collect(),
        weights: [-1.0, 0.0, 0.0],
        intercept: 4.5,
        trained_at: Utc::now(),
        n_samples: 0,
        iterations: 0,
        converged: true,
    }
}

fn deploy_threshold_model(paths: &ResolvedPaths, recorded_f1: &str) -> Vec<u8> {
    let bytes = LogisticRegressionTrainer::default()
        .encode(&threshold_model())
        .unwrap();
    fs::create_dir_all(&paths.deployment).unwrap();
    fs::write(paths.deployment.join(MODEL_FILE), &bytes).unwrap();
    fs::write(
        paths.deployment.join(SCORE_FILE),
        format!("2024-01-01 00:00:00, {}\n", recorded_f1),
    )
    .unwrap();
    bytes
}

fn orchestrator(paths: &ResolvedPaths) -> Orchestrator<LogisticRegressionTrainer> {
    Orchestrator::new(
        Arc::new(FsArtifactStore::new(paths)),
        Arc::new(LogisticRegressionTrainer::default()),
    )
}

fn names(list: &[&str]) -> BTreeSet<String> {
    list.iter().map(|s| s.to_string()).collect()
}

#[test]
fn first_cycle_merges_two_files_and_deploys() {
    // Given: a.csv with 50 rows and b.csv with 30 rows, nothing ingested yet
    let (_dir, paths) = create_environment();
    write_csv(&paths.input_folder, "a.csv", &generated_rows("a", 50));
    write_csv(&paths.input_folder, "b.csv", &generated_rows("b", 30));
    write_csv(&paths.test_data, "testdata.csv", &generated_rows("t", 12));

    // When: one cycle runs
    let run = orchestrator(&paths).run_cycle().unwrap();

    // Then: 80 rows, one ledger line per file with its own row count
    let dataset = Table::from_csv(&fs::read(paths.output_folder.join(DATASET_FILE)).unwrap(), "d").unwrap();
    assert_eq!(dataset.len(), 80);
    let ledger = parse_ledger(&fs::read(paths.output_folder.join(LEDGER_FILE)).unwrap()).unwrap();
    let counts: Vec<(String, usize)> = ledger.iter().map(|e| (e.file_name.clone(), e.row_count)).collect();
    assert_eq!(counts, vec![("a.csv".to_string(), 50), ("b.csv".to_string(), 30)]);

    // And: every row of every ledgered file is in the dataset
    let merged: BTreeSet<String> = dataset.rows().iter().map(|r| r.join(",")).collect();
    for source_row in generated_rows("a", 50).iter().chain(generated_rows("b", 30).iter()) {
        assert!(merged.contains(source_row), "missing row {}", source_row);
    }

    // And: no baseline, so the model was trained, deployed and reported
    assert_eq!(run.drift, Some(DriftDecision::NoBaseline));
    assert_eq!(run.stopped_after(), Some(PipelineState::Report));
    for name in [MODEL_FILE, SCORE_FILE, LEDGER_FILE] {
        assert!(paths.deployment.join(name).is_file(), "{} not deployed", name);
    }
    assert!(paths.output_model.join(REPORT_FILE).is_file());
    assert!(run.report_error.is_none());
}

#[test]
fn ledgered_file_is_not_rediscovered() {
    // Given: a.csv already in the ledger, b.csv new
    let (_dir, paths) = create_environment();
    write_csv(&paths.input_folder, "a.csv", &generated_rows("a", 5));
    write_csv(&paths.input_folder, "b.csv", &generated_rows("b", 5));
    fs::create_dir_all(&paths.output_folder).unwrap();
    fs::write(
        paths.output_folder.join(LEDGER_FILE),
        format!("2024-01-01 00:00:00, a.csv, {}, 5\n", paths.input_folder.display()),
    )
    .unwrap();

    // When / Then
    let engine = IngestionEngine::new(Arc::new(FsArtifactStore::new(&paths)));
    assert_eq!(engine.discover_new_files().unwrap(), names(&["b.csv"]));
}

#[test]
fn second_cycle_without_new_files_does_nothing() {
    let (_dir, paths) = create_environment();
    write_csv(&paths.input_folder, "a.csv", &generated_rows("a", 20));
    orchestrator(&paths).run_cycle().unwrap();
    let dataset_before = fs::read(paths.output_folder.join(DATASET_FILE)).unwrap();

    let run = orchestrator(&paths).run_cycle().unwrap();

    assert_eq!(run.path(), vec![PipelineState::CheckData, PipelineState::Done]);
    assert_eq!(fs::read(paths.output_folder.join(DATASET_FILE)).unwrap(), dataset_before);
}

#[test]
fn equal_score_halts_at_drift_check() {
    // Given: deployed model recorded at 0.85 and new data on which it scores 0.85
    let (_dir, paths) = create_environment();
    let deployed_bytes = deploy_threshold_model(&paths, "0.85");
    write_csv(&paths.input_folder, "new.csv", &f1_085_rows());

    // When
    let run = orchestrator(&paths).run_cycle().unwrap();

    // Then: no drift, nothing retrained, deployed model untouched
    assert_eq!(
        run.drift,
        Some(DriftDecision::NoDrift {
            deployed: 0.85,
            new: 0.85
        })
    );
    assert_eq!(run.stopped_after(), Some(PipelineState::CheckDrift));
    assert!(!paths.output_model.join(MODEL_FILE).exists());
    assert_eq!(fs::read(paths.deployment.join(MODEL_FILE)).unwrap(), deployed_bytes);

    // And: the drift check re-scored the deployed slot
    let record = ScoreRecord::parse(&fs::read(paths.deployment.join(SCORE_FILE)).unwrap()).unwrap();
    assert_eq!(record.metric, 0.85);
}

#[test]
fn lower_score_triggers_retrain_and_redeploy() {
    // Given: deployed model recorded at 0.9, now scoring 0.85
    let (_dir, paths) = create_environment();
    let old_model = deploy_threshold_model(&paths, "0.9");
    write_csv(&paths.input_folder, "new.csv", &f1_085_rows());

    // When
    let run = orchestrator(&paths).run_cycle().unwrap();

    // Then
    assert_eq!(
        run.drift,
        Some(DriftDecision::Drift {
            deployed: 0.9,
            new: 0.85
        })
    );
    assert!(run.deployed());
    let deployed_model = fs::read(paths.deployment.join(MODEL_FILE)).unwrap();
    assert_ne!(deployed_model, old_model);
    assert_eq!(deployed_model, fs::read(paths.output_model.join(MODEL_FILE)).unwrap());

    let staging = ScoreRecord::parse(&fs::read(paths.output_model.join(SCORE_FILE)).unwrap()).unwrap();
    let deployed = ScoreRecord::parse(&fs::read(paths.deployment.join(SCORE_FILE)).unwrap()).unwrap();
    assert_eq!(staging.metric, deployed.metric);
    assert_eq!(run.staging_score, Some(staging.metric));
}

#[test]
fn malformed_deployed_score_record_aborts_cycle() {
    let (_dir, paths) = create_environment();
    deploy_threshold_model(&paths, "not-a-number");
    write_csv(&paths.input_folder, "new.csv", &f1_085_rows());

    let err = orchestrator(&paths).run_cycle().unwrap_err();

    assert!(matches!(err, Error::Consistency(_)));
    // Ingestion committed before the failure
    assert!(paths.output_folder.join(LEDGER_FILE).is_file());
}

#[test]
fn corrupt_file_is_skipped_and_not_ledgered() {
    let (_dir, paths) = create_environment();
    write_csv(&paths.input_folder, "good.csv", &generated_rows("g", 10));
    fs::write(
        paths.input_folder.join("corrupt.csv"),
        format!("{}\nx,1,2\n", HEADER),
    )
    .unwrap();

    let run = orchestrator(&paths).run_cycle().unwrap();

    let merge = run.merge.as_ref().unwrap();
    assert_eq!(merge.skipped.len(), 1);
    assert_eq!(merge.skipped[0].file_name, "corrupt.csv");
    let ledger = parse_ledger(&fs::read(paths.output_folder.join(LEDGER_FILE)).unwrap()).unwrap();
    assert_eq!(ledger.len(), 1);
    assert_eq!(ledger[0].file_name, "good.csv");
    assert!(run.deployed());

    // The corrupt file is offered again next cycle
    let engine = IngestionEngine::new(Arc::new(FsArtifactStore::new(&paths)));
    assert_eq!(engine.discover_new_files().unwrap(), names(&["corrupt.csv"]));
}

#[test]
fn stray_csv_without_model_columns_does_not_become_the_schema() {
    // Given: an unrelated CSV that sorts ahead of the real data
    let (_dir, paths) = create_environment();
    fs::write(paths.input_folder.join("a_notes.csv"), "id,comment\n1,call back\n").unwrap();
    write_csv(&paths.input_folder, "b.csv", &generated_rows("b", 20));
    write_csv(&paths.test_data, "testdata.csv", &generated_rows("t", 8));

    // When: the first cycle runs
    let run = orchestrator(&paths).run_cycle().unwrap();

    // Then: the real data is merged, trained on and deployed
    let merge = run.merge.as_ref().unwrap();
    assert_eq!(merge.skipped[0].file_name, "a_notes.csv");
    assert!(run.deployed());

    let dataset = Table::from_csv(
        &fs::read(paths.output_folder.join(DATASET_FILE)).unwrap(),
        DATASET_FILE,
    )
    .unwrap();
    assert_eq!(dataset.columns().join(","), HEADER);
    assert_eq!(dataset.len(), 20);

    let ledger = parse_ledger(&fs::read(paths.output_folder.join(LEDGER_FILE)).unwrap()).unwrap();
    assert_eq!(ledger.len(), 1);
    assert_eq!(ledger[0].file_name, "b.csv");
}

#[test]
fn duplicate_rows_across_files_are_merged_once() {
    let (_dir, paths) = create_environment();
    let rows = generated_rows("a", 10);
    write_csv(&paths.input_folder, "a.csv", &rows);
    write_csv(&paths.input_folder, "b.csv", &rows[5..]);

    let engine = IngestionEngine::new(Arc::new(FsArtifactStore::new(&paths)));
    let result = engine.merge_sources(&names(&["a.csv", "b.csv"])).unwrap();

    assert_eq!(result.rows_added, 10);
    assert_eq!(result.ledger_appended[1].row_count, 5);
}

#[test]
fn missing_input_folder_aborts_check_data() {
    let (_dir, paths) = create_environment();
    fs::remove_dir(&paths.input_folder).unwrap();

    let err = orchestrator(&paths).run_cycle().unwrap_err();
    assert!(matches!(err, Error::NotFound(_)));
}

/// Store whose dataset writes always fail
struct DatasetWriteFails(MemoryArtifactStore);

impl ArtifactStore for DatasetWriteFails {
    fn get(&self, key: &ArtifactKey) -> Result<Vec<u8>> {
        self.0.get(key)
    }

    fn put(&self, key: &ArtifactKey, bytes: &[u8]) -> Result<()> {
        if key.name == DATASET_FILE {
            return Err(Error::Io(std::io::Error::other("disk full")));
        }
        self.0.put(key, bytes)
    }

    fn append(&self, key: &ArtifactKey, bytes: &[u8]) -> Result<()> {
        self.0.append(key, bytes)
    }

    fn exists(&self, key: &ArtifactKey) -> Result<bool> {
        self.0.exists(key)
    }

    fn list(&self, namespace: Namespace) -> Result<Vec<String>> {
        self.0.list(namespace)
    }

    fn location(&self, namespace: Namespace) -> String {
        self.0.location(namespace)
    }
}

#[test]
fn dataset_write_failure_leaves_ledger_untouched() {
    let memory = MemoryArtifactStore::new();
    let mut content = format!("{}\n", HEADER);
    for r in generated_rows("a", 4) {
        content.push_str(&r);
        content.push('\n');
    }
    memory.insert(ArtifactKey::new(Namespace::Input, "a.csv"), content);
    let store = Arc::new(DatasetWriteFails(memory));

    let err = Orchestrator::new(store.clone(), Arc::new(LogisticRegressionTrainer::default()))
        .run_cycle()
        .unwrap_err();

    assert!(matches!(err, Error::Io(_)));
    assert!(!store.exists(&ArtifactKey::ledger()).unwrap());
    assert!(!store.exists(&Slot::Deployed.model_key()).unwrap());
}
