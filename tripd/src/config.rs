//! TripDaemon configuration types and loading

use eyre::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::revision::RevisionConfig;
use crate::stage::InvokerConfig;

/// Main TripDaemon configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Planning backend configuration
    pub stage: StageConfig,

    /// Loop and trip limits
    pub limits: LimitsConfig,

    /// Storage configuration
    pub storage: StorageConfig,
}

impl Config {
    /// Validate configuration before use
    ///
    /// Call this early in startup to fail fast with clear error messages.
    pub fn validate(&self) -> Result<()> {
        if std::env::var(&self.stage.api_key_env).is_err() {
            return Err(eyre::eyre!(
                "Planning API key not found. Set the {} environment variable.",
                self.stage.api_key_env
            ));
        }
        if self.limits.max_revisions == 0 {
            return Err(eyre::eyre!("limits.max-revisions must be at least 1"));
        }
        if self.limits.max_trip_days == 0 {
            return Err(eyre::eyre!("limits.max-trip-days must be at least 1"));
        }
        Ok(())
    }

    /// Load configuration with fallback chain
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self> {
        // If explicit config path provided, try to load it
        if let Some(path) = config_path {
            return Self::load_from_file(path).context(format!("Failed to load config from {}", path.display()));
        }

        // Try project-local config: .tripdaemon.yml
        let local_config = PathBuf::from(".tripdaemon.yml");
        if local_config.exists() {
            match Self::load_from_file(&local_config) {
                Ok(config) => return Ok(config),
                Err(e) => {
                    tracing::warn!("Failed to load config from {}: {}", local_config.display(), e);
                }
            }
        }

        // Try user config: ~/.config/tripdaemon/tripdaemon.yml
        if let Some(config_dir) = dirs::config_dir() {
            let user_config = config_dir.join("tripdaemon").join("tripdaemon.yml");
            if user_config.exists() {
                match Self::load_from_file(&user_config) {
                    Ok(config) => return Ok(config),
                    Err(e) => {
                        tracing::warn!("Failed to load config from {}: {}", user_config.display(), e);
                    }
                }
            }
        }

        // No config file found, use defaults
        tracing::info!("No config file found, using defaults");
        Ok(Self::default())
    }

    fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path).context("Failed to read config file")?;

        let config: Self = serde_yaml::from_str(&content).context("Failed to parse config file")?;

        tracing::info!("Loaded config from: {}", path.as_ref().display());
        Ok(config)
    }
}

/// Planning backend configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StageConfig {
    /// API base URL
    #[serde(rename = "base-url")]
    pub base_url: String,

    /// Environment variable containing the API key
    #[serde(rename = "api-key-env")]
    pub api_key_env: String,

    /// Per-call timeout in milliseconds
    #[serde(rename = "timeout-ms")]
    pub timeout_ms: u64,

    /// Retry attempts after the first call
    #[serde(rename = "max-retries")]
    pub max_retries: u32,

    /// Initial retry backoff in milliseconds
    #[serde(rename = "initial-backoff-ms")]
    pub initial_backoff_ms: u64,

    /// Total wall-clock budget per invocation in milliseconds
    #[serde(rename = "total-budget-ms")]
    pub total_budget_ms: u64,

    /// Maximum concurrent in-flight calls per collaborator
    #[serde(rename = "max-concurrent")]
    pub max_concurrent: usize,
}

impl Default for StageConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.tripplanner.example".to_string(),
            api_key_env: "TRIPDAEMON_API_KEY".to_string(),
            timeout_ms: 30_000,
            max_retries: 3,
            initial_backoff_ms: 1000,
            total_budget_ms: 120_000,
            max_concurrent: 8,
        }
    }
}

impl StageConfig {
    /// Read the API key from the configured environment variable
    pub fn get_api_key(&self) -> Result<String> {
        std::env::var(&self.api_key_env)
            .context(format!("API key environment variable {} not set", self.api_key_env))
    }

    /// Invoker parameters derived from this config
    pub fn invoker(&self) -> InvokerConfig {
        InvokerConfig {
            call_timeout: Duration::from_millis(self.timeout_ms),
            max_retries: self.max_retries,
            initial_backoff: Duration::from_millis(self.initial_backoff_ms),
            total_budget: Duration::from_millis(self.total_budget_ms),
            max_concurrent: self.max_concurrent,
        }
    }
}

/// Loop and trip limits
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LimitsConfig {
    /// Rejections tolerated before the loop commits its fallback
    #[serde(rename = "max-revisions")]
    pub max_revisions: u32,

    /// Longest plannable trip in days
    #[serde(rename = "max-trip-days")]
    pub max_trip_days: usize,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_revisions: 3,
            max_trip_days: 30,
        }
    }
}

impl LimitsConfig {
    /// Revise loop parameters derived from this config
    pub fn revision(&self) -> RevisionConfig {
        RevisionConfig {
            max_revisions: self.max_revisions,
        }
    }
}

/// Storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Directory for PlanStore data
    #[serde(rename = "planstore-dir")]
    pub planstore_dir: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        // Use XDG data directory (~/.local/share/tripdaemon on Linux)
        let planstore_dir = dirs::data_dir()
            .map(|d| d.join("tripdaemon"))
            .unwrap_or_else(|| PathBuf::from(".planstore"))
            .to_string_lossy()
            .into_owned();

        Self { planstore_dir }
    }
}
