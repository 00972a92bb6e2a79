//! Configuration loading and path-root resolution
//!
//! The pipeline needs a handful of named directories (input, canonical dataset,
//! staging model, deployed model, held-out test data). They live in a TOML file
//! with one table per environment; `active_environment` picks the table.
//!
//! ```toml
//! active_environment = "production"
//!
//! [logging]
//! level = "info"
//!
//! [environments.production]
//! input_folder_path = "sourcedata"
//! output_folder_path = "ingesteddata"
//! output_model_path = "models"
//! deployment_path = "production_deployment"
//! test_data_path = "testdata"
//! ```

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Environment variable naming an explicit config file
pub const CONFIG_ENV_VAR: &str = "DRA_CONFIG";

/// Environment variable overriding `active_environment`
pub const ENVIRONMENT_ENV_VAR: &str = "DRA_ENVIRONMENT";

/// Config file looked up in the working directory
pub const LOCAL_CONFIG_FILE: &str = "dra.toml";

/// Directory roots for one environment, as written in the config file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathRoots {
    /// Where new source CSV files appear
    pub input_folder_path: PathBuf,
    /// Canonical dataset and ingestion ledger
    pub output_folder_path: PathBuf,
    /// Staging slot: freshly trained model and its score
    pub output_model_path: PathBuf,
    /// Deployed slot: the model currently serving predictions
    pub deployment_path: PathBuf,
    /// Held-out evaluation data
    pub test_data_path: PathBuf,
}

/// Logging section
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default tracing filter when RUST_LOG is unset
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Typed contents of the pipeline config file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Key into `environments`
    pub active_environment: String,

    #[serde(default)]
    pub logging: LoggingConfig,

    /// Path roots per environment name
    pub environments: BTreeMap<String, PathRoots>,
}

/// Absolute directories for the active environment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedPaths {
    pub environment: String,
    pub input_folder: PathBuf,
    pub output_folder: PathBuf,
    pub output_model: PathBuf,
    pub deployment: PathBuf,
    pub test_data: PathBuf,
}

impl PipelineConfig {
    /// Parse config from TOML text
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::Config(format!("Parse TOML failed: {}", e)))
    }

    /// Load config from a specific file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("Read config {} failed: {}", path.display(), e))
        })?;
        Self::from_toml_str(&content)
    }

    /// Locate and load the config file, falling back to compiled defaults.
    ///
    /// A missing file is not fatal; a file that exists but does not parse is.
    pub fn load_or_default(cli_arg: Option<&Path>) -> Result<Self> {
        let mut config = match locate_config_file(cli_arg) {
            Some(path) => {
                info!("Loading configuration from {}", path.display());
                Self::load(&path)?
            }
            None => {
                warn!("No configuration file found, using compiled defaults");
                Self::compiled_defaults()
            }
        };

        if let Ok(env_name) = std::env::var(ENVIRONMENT_ENV_VAR) {
            if !env_name.trim().is_empty() {
                info!(environment = %env_name, "Active environment overridden from {}", ENVIRONMENT_ENV_VAR);
                config.active_environment = env_name;
            }
        }

        Ok(config)
    }

    /// Defaults mirroring the conventional folder layout
    pub fn compiled_defaults() -> Self {
        let mut environments = BTreeMap::new();
        environments.insert(
            "practice".to_string(),
            PathRoots {
                input_folder_path: PathBuf::from("practicedata"),
                output_folder_path: PathBuf::from("ingesteddata"),
                output_model_path: PathBuf::from("practicemodels"),
                deployment_path: PathBuf::from("production_deployment"),
                test_data_path: PathBuf::from("testdata"),
            },
        );
        environments.insert(
            "production".to_string(),
            PathRoots {
                input_folder_path: PathBuf::from("sourcedata"),
                output_folder_path: PathBuf::from("ingesteddata"),
                output_model_path: PathBuf::from("models"),
                deployment_path: PathBuf::from("production_deployment"),
                test_data_path: PathBuf::from("testdata"),
            },
        );

        Self {
            active_environment: "practice".to_string(),
            logging: LoggingConfig::default(),
            environments,
        }
    }

    /// Path roots of the active environment
    pub fn active_roots(&self) -> Result<&PathRoots> {
        self.environments.get(&self.active_environment).ok_or_else(|| {
            Error::Config(format!(
                "active environment {:?} not defined (known: {})",
                self.active_environment,
                self.environments.keys().cloned().collect::<Vec<_>>().join(", ")
            ))
        })
    }

    /// Resolve the active environment's roots against `base_dir`.
    ///
    /// Absolute roots are kept as written.
    pub fn resolve(&self, base_dir: &Path) -> Result<ResolvedPaths> {
        let roots = self.active_roots()?;
        let join = |p: &Path| {
            if p.is_absolute() {
                p.to_path_buf()
            } else {
                base_dir.join(p)
            }
        };

        let resolved = ResolvedPaths {
            environment: self.active_environment.clone(),
            input_folder: join(&roots.input_folder_path),
            output_folder: join(&roots.output_folder_path),
            output_model: join(&roots.output_model_path),
            deployment: join(&roots.deployment_path),
            test_data: join(&roots.test_data_path),
        };
        debug!(?resolved, "Resolved path roots");
        Ok(resolved)
    }
}

/// Config file resolution, highest priority first:
/// 1. Command-line argument
/// 2. `DRA_CONFIG` environment variable
/// 3. `./dra.toml`
/// 4. Platform config directory (`~/.config/dra/dra.toml` on Linux)
pub fn locate_config_file(cli_arg: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = cli_arg {
        return Some(path.to_path_buf());
    }

    if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
        if !path.trim().is_empty() {
            return Some(PathBuf::from(path));
        }
    }

    let local = PathBuf::from(LOCAL_CONFIG_FILE);
    if local.exists() {
        return Some(local);
    }

    dirs::config_dir()
        .map(|d| d.join("dra").join(LOCAL_CONFIG_FILE))
        .filter(|p| p.exists())
}
