//! Forecast Probe - operator diagnostic for the forecasting engine
//!
//! Builds the engine from the environment, runs one forecast and prints the
//! runtime status, the single-day value and the horizon as JSON on stdout.
//! Logs go to stderr.
//!
//! # Usage
//! ```sh
//! FORECAST_ARTIFACT_DIR=data/forecast cargo run --bin forecast-probe -- \
//!     --features '{"product_id": 3, "units_sold": 120}' --days 7
//! ```

use anyhow::{Context, Result};
use clap::Parser;
use serde_json::json;
use shelfcast::application::forecast::ForecastEngine;
use shelfcast::config::{Config, LogFormat};
use shelfcast::domain::ml::FeatureVector;
use std::path::PathBuf;
use tracing::{Level, info};
use tracing_subscriber::prelude::*;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Feature mapping as a JSON object
    #[arg(long, default_value = "{}")]
    features: String,

    /// Read the feature mapping from a JSON file instead
    #[arg(long)]
    features_file: Option<PathBuf>,

    /// Number of days for the horizon forecast
    #[arg(long, default_value_t = 7)]
    days: usize,
}

fn init_tracing(format: LogFormat) {
    let filter =
        tracing_subscriber::EnvFilter::from_default_env().add_directive(Level::INFO.into());
    let registry = tracing_subscriber::registry().with(filter);

    match format {
        LogFormat::Pretty => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(false)
                    .with_writer(std::io::stderr)
                    .pretty(),
            )
            .init(),
        LogFormat::Compact => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(false)
                    .with_writer(std::io::stderr)
                    .compact(),
            )
            .init(),
    }
}

fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let config = Config::from_env()?;
    init_tracing(config.observability.log_format);

    let args = Args::parse();
    info!("Forecast Probe {} starting...", env!("CARGO_PKG_VERSION"));

    let raw = match &args.features_file {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read features file {:?}", path))?,
        None => args.features.clone(),
    };
    let features = FeatureVector::from_json(&raw).context("Features must be a JSON object")?;

    let engine = ForecastEngine::from_config(&config.forecast);

    let (day, day_source) = engine.forecast_day(&features);
    let horizon = engine.forecast(&features, args.days);
    let report = json!({
        "status": engine.runtime().status(),
        "predict": day,
        "predict_source": day_source,
        "horizon": horizon.values,
        "horizon_source": horizon.source,
    });

    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
