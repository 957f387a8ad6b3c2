//! Forecast engine configuration parsing from environment variables.

use anyhow::{Result, bail};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use tracing::warn;

use crate::application::ml::inference_pool::DEFAULT_INFERENCE_WORKERS;
use crate::application::ml::sequence_builder::{DEFAULT_HORIZON, DEFAULT_WINDOW};

/// Forecast engine environment configuration
#[derive(Debug, Clone, PartialEq)]
pub struct ForecastEnvConfig {
    pub artifact_dir: PathBuf,
    pub model_file: String,
    pub scaler_file: String,
    pub sequence_window: usize,
    pub model_horizon: usize,
    /// 0 disables the bounded wait and runs inference inline
    pub inference_timeout_ms: u64,
    /// Threads serving bounded inference; unused when the timeout is 0
    pub inference_workers: usize,
    /// 0 re-attempts a missing/corrupt artifact load on every call
    pub artifact_retry_secs: u64,
    pub eager_load: bool,
}

impl Default for ForecastEnvConfig {
    fn default() -> Self {
        Self {
            artifact_dir: PathBuf::from("data/forecast"),
            model_file: "demand_lstm.onnx".to_string(),
            scaler_file: "demand_scaler.json".to_string(),
            sequence_window: DEFAULT_WINDOW,
            model_horizon: DEFAULT_HORIZON,
            inference_timeout_ms: 2000,
            inference_workers: DEFAULT_INFERENCE_WORKERS,
            artifact_retry_secs: 0,
            eager_load: false,
        }
    }
}

impl ForecastEnvConfig {
    pub fn from_lookup<F>(lookup: &F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let config = Self {
            artifact_dir: lookup("FORECAST_ARTIFACT_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.artifact_dir),
            model_file: lookup("FORECAST_MODEL_FILE").unwrap_or(defaults.model_file),
            scaler_file: lookup("FORECAST_SCALER_FILE").unwrap_or(defaults.scaler_file),
            sequence_window: parse_or(lookup, "FORECAST_SEQUENCE_WINDOW", defaults.sequence_window),
            model_horizon: parse_or(lookup, "FORECAST_MODEL_HORIZON", defaults.model_horizon),
            inference_timeout_ms: parse_or(
                lookup,
                "FORECAST_INFERENCE_TIMEOUT_MS",
                defaults.inference_timeout_ms,
            ),
            inference_workers: parse_or(
                lookup,
                "FORECAST_INFERENCE_WORKERS",
                defaults.inference_workers,
            ),
            artifact_retry_secs: parse_or(
                lookup,
                "FORECAST_ARTIFACT_RETRY_SECS",
                defaults.artifact_retry_secs,
            ),
            eager_load: parse_or(lookup, "FORECAST_EAGER_LOAD", defaults.eager_load),
        };

        if config.sequence_window == 0 {
            bail!("FORECAST_SEQUENCE_WINDOW must be greater than 0");
        }
        if config.model_horizon == 0 {
            bail!("FORECAST_MODEL_HORIZON must be greater than 0");
        }
        if config.inference_workers == 0 {
            bail!("FORECAST_INFERENCE_WORKERS must be greater than 0");
        }

        Ok(config)
    }

    pub fn model_path(&self) -> PathBuf {
        self.artifact_dir.join(&self.model_file)
    }

    pub fn scaler_path(&self) -> PathBuf {
        self.artifact_dir.join(&self.scaler_file)
    }

    pub fn inference_timeout(&self) -> Option<Duration> {
        (self.inference_timeout_ms > 0).then(|| Duration::from_millis(self.inference_timeout_ms))
    }

    pub fn artifact_retry_interval(&self) -> Duration {
        Duration::from_secs(self.artifact_retry_secs)
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> T
where
    F: Fn(&str) -> Option<String>,
    T: FromStr + std::fmt::Debug,
{
    match lookup(key) {
        Some(raw) => raw.trim().parse::<T>().unwrap_or_else(|_| {
            warn!("Invalid {}={:?}, using default {:?}", key, raw, default);
            default
        }),
        None => default,
    }
}
