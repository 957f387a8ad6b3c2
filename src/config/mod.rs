//! Configuration module for Shelfcast.
//!
//! This module provides structured configuration loading from environment variables,
//! organized by concern: Forecast engine and Observability.

mod forecast_config;
mod observability_config;

pub use forecast_config::ForecastEnvConfig;
pub use observability_config::{LogFormat, ObservabilityEnvConfig};

use anyhow::{Context, Result};
use std::env;

/// Main application configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub forecast: ForecastEnvConfig,
    pub observability: ObservabilityEnvConfig,
}

impl Config {
    /// Reads the process environment. Call `dotenvy::dotenv()` first to pick up `.env`.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let forecast =
            ForecastEnvConfig::from_lookup(&lookup).context("Invalid forecast configuration")?;
        let observability = ObservabilityEnvConfig::from_lookup(&lookup)
            .context("Invalid observability configuration")?;

        Ok(Self {
            forecast,
            observability,
        })
    }
}
