use super::feature_registry::FeatureVector;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Outcome of a `ModelRuntime::ensure_loaded` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LoadState {
    /// Model and scaler are cached for the rest of the process.
    Ready,
    /// The numeric runtime itself cannot be used. Terminal.
    RuntimeUnavailable,
    /// An artifact file does not exist. Re-attempted on later calls.
    ArtifactMissing,
    /// An artifact file exists but could not be deserialized. Re-attempted on later calls.
    ArtifactCorrupt,
}

impl LoadState {
    pub fn is_ready(&self) -> bool {
        matches!(self, LoadState::Ready)
    }
}

impl fmt::Display for LoadState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            LoadState::Ready => "ready",
            LoadState::RuntimeUnavailable => "runtime-unavailable",
            LoadState::ArtifactMissing => "artifact-missing",
            LoadState::ArtifactCorrupt => "artifact-corrupt",
        };
        f.write_str(label)
    }
}

/// Which tier of the cascade produced a forecast.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ForecastSource {
    /// Trained sequence model, inverse-scaled. Not clamped.
    Model,
    /// Closed-form business heuristic, clamped to the plausibility band.
    Heuristic,
    /// Uniform draw used when the heuristic itself could not be computed.
    Random,
}

/// Forecast values together with the tier that produced them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Forecast {
    pub values: Vec<i64>,
    pub source: ForecastSource,
}

/// A product to forecast, with whatever features the caller has for it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductContext {
    pub product_id: i64,
    #[serde(default)]
    pub features: FeatureVector,
}

impl ProductContext {
    pub fn new(product_id: i64) -> Self {
        Self {
            product_id,
            features: FeatureVector::new(),
        }
    }

    pub fn with_features(mut self, features: FeatureVector) -> Self {
        self.features = features;
        self
    }
}

/// One row of the catalog forecast listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductForecast {
    pub product_id: i64,
    pub forecast: i64,
    pub source: ForecastSource,
    pub generated_at: DateTime<Utc>,
}
