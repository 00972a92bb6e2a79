//! dra-pipeline - model retraining pipeline
//!
//! Runs the full retraining cycle (default) or a single stage against the
//! folders of the active configuration environment.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use dra_common::PipelineConfig;
use dra_pipeline::deployment::Deployer;
use dra_pipeline::diagnostics::Diagnostics;
use dra_pipeline::ingestion::IngestionEngine;
use dra_pipeline::reporting::{ConfusionMatrixReporter, Reporter};
use dra_pipeline::training::ModelTrainer;
use dra_pipeline::{ArtifactKey, LogisticRegressionTrainer, Orchestrator, Scorer, Slot};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "dra-pipeline", version, about = "Dynamic risk assessment retraining pipeline")]
struct Cli {
    /// Config file (overrides DRA_CONFIG and ./dra.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Directory relative folder paths are resolved against
    #[arg(long, global = true, default_value = ".")]
    base_dir: PathBuf,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Full cycle: ingest, drift check, retrain, deploy, report
    Run,
    /// Merge new source files into the canonical dataset
    Ingest,
    /// Train a model on the canonical dataset into staging
    Train,
    /// Score a slot's model and persist its score record
    Score {
        #[arg(long, value_enum, default_value_t = SlotArg::Staging)]
        slot: SlotArg,
        #[arg(long, value_enum, default_value_t = DatasetArg::Test)]
        dataset: DatasetArg,
    },
    /// Promote staging artifacts into the deployed slot
    Deploy,
    /// Confusion matrix of the deployed model on the test data
    Report,
    /// Dataset statistics and deployed-model predictions on the test data
    Diagnose {
        /// Also time an ingestion and a training run on an in-memory copy
        #[arg(long)]
        timings: bool,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum SlotArg {
    Staging,
    Deployed,
}

impl From<SlotArg> for Slot {
    fn from(arg: SlotArg) -> Self {
        match arg {
            SlotArg::Staging => Slot::Staging,
            SlotArg::Deployed => Slot::Deployed,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum DatasetArg {
    /// Canonical merged dataset
    Canonical,
    /// Held-out test data
    Test,
}

impl DatasetArg {
    fn key(self) -> ArtifactKey {
        match self {
            DatasetArg::Canonical => ArtifactKey::dataset(),
            DatasetArg::Test => ArtifactKey::test_data(),
        }
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = PipelineConfig::load_or_default(cli.config.as_deref())?;

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.logging.level))
        .context("invalid log level")?;
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!(
        "Starting dra-pipeline v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );

    let (paths, store) = dra_pipeline::open_store(&config, &cli.base_dir)?;
    info!(environment = %paths.environment, input = %paths.input_folder.display(), "Using path roots");

    let trainer = Arc::new(LogisticRegressionTrainer::default());

    match cli.command.unwrap_or(Command::Run) {
        Command::Run => {
            let run = Orchestrator::new(store, trainer).run_cycle()?;
            print_json(&run)?;
        }
        Command::Ingest => {
            let engine = IngestionEngine::new(store);
            let new_files = engine.discover_new_files()?;
            print_json(&engine.merge_sources(&new_files)?)?;
        }
        Command::Train => {
            print_json(&ModelTrainer::new(store, trainer).train()?)?;
        }
        Command::Score { slot, dataset } => {
            let record = Scorer::new(store, trainer).score(slot.into(), &dataset.key())?;
            print_json(&record)?;
        }
        Command::Deploy => {
            print_json(&Deployer::new(store).deploy()?)?;
        }
        Command::Report => {
            print_json(&ConfusionMatrixReporter::new(store, trainer).report()?)?;
        }
        Command::Diagnose { timings } => {
            let diagnostics = Diagnostics::new(store, trainer);
            let timings = if timings {
                Some(diagnostics.execution_time()?)
            } else {
                None
            };
            print_json(&serde_json::json!({
                "predictions": diagnostics.model_predictions(&ArtifactKey::test_data())?,
                "summary_statistics": diagnostics.dataset_summary()?,
                "missing_values": diagnostics.dataset_missing_values()?,
                "execution_time": timings,
            }))?;
        }
    }

    Ok(())
}
