//! dra-api - serving API for the deployed risk model
//!
//! `serve` exposes the deployed model over HTTP; `probe` calls every endpoint
//! of a running server and stores the combined responses.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use dra_api::client::{ApiClient, DEFAULT_BASE_URL, DEFAULT_PREDICTION_FILE};
use dra_api::{build_router, AppState};
use dra_common::PipelineConfig;
use dra_pipeline::store::API_RETURNS_FILE;
use dra_pipeline::{ArtifactKey, ArtifactStore, Namespace};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "dra-api", version, about = "Serving API for the deployed risk model")]
struct Cli {
    /// Config file (overrides DRA_CONFIG and ./dra.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Directory relative folder paths are resolved against
    #[arg(long, global = true, default_value = ".")]
    base_dir: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Serve predictions, scoring, statistics and diagnostics
    Serve {
        #[arg(long, default_value = "127.0.0.1")]
        host: String,
        #[arg(long, default_value_t = 8000)]
        port: u16,
    },
    /// Call every endpoint of a running server and save the responses
    Probe {
        #[arg(long, default_value = DEFAULT_BASE_URL)]
        base_url: String,
        /// Test data file to request predictions for
        #[arg(long, default_value = DEFAULT_PREDICTION_FILE)]
        file_path: String,
        /// Write here instead of apireturns.json in the model folder
        #[arg(long)]
        output: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = PipelineConfig::load_or_default(cli.config.as_deref())?;

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.logging.level))
        .context("invalid log level")?;
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!(
        "Starting dra-api v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );

    let (paths, store) = dra_pipeline::open_store(&config, &cli.base_dir)?;
    info!(environment = %paths.environment, "Using path roots");

    match cli.command {
        Command::Serve { host, port } => {
            let app = build_router(AppState::new(store));

            let addr = format!("{}:{}", host, port);
            let listener = tokio::net::TcpListener::bind(&addr)
                .await
                .with_context(|| format!("bind {}", addr))?;
            info!("dra-api listening on http://{}", addr);
            info!("Health check: http://{}/health", addr);

            axum::serve(listener, app).await?;
        }
        Command::Probe {
            base_url,
            file_path,
            output,
        } => {
            let client = ApiClient::new(base_url)?;
            let returns = client.probe(&file_path).await?;
            let json = serde_json::to_vec_pretty(&returns)?;

            match output {
                Some(path) => {
                    tokio::fs::write(&path, &json)
                        .await
                        .with_context(|| format!("write {}", path.display()))?;
                    info!("API returns written to {}", path.display());
                }
                None => {
                    let key = ArtifactKey::new(Namespace::Staging, API_RETURNS_FILE);
                    store.put(&key, &json)?;
                    info!(key = %key, "API returns written");
                }
            }
        }
    }

    Ok(())
}
