use std::path::PathBuf;
use thiserror::Error;

/// Failures inside the forecasting cascade.
///
/// None of these escape `ForecastEngine::predict` / `predict_horizon`; they are
/// logged where they occur and turned into a fallback invocation.
#[derive(Debug, Error)]
pub enum ForecastError {
    #[error("Numeric runtime unavailable: {reason}")]
    RuntimeUnavailable { reason: String },

    #[error("Artifact not found: {}", path.display())]
    ArtifactMissing { path: PathBuf },

    #[error("Artifact {} could not be loaded: {reason}", path.display())]
    ArtifactCorrupt { path: PathBuf, reason: String },

    #[error("Invalid feature '{feature}': {reason}")]
    FeatureValidation { feature: String, reason: String },

    #[error("Inference failed: {reason}")]
    InferenceFailure { reason: String },

    #[error("Inference timed out after {timeout_ms}ms")]
    InferenceTimeout { timeout_ms: u64 },

    #[error("Scaler used before a successful artifact load")]
    ScalerNotLoaded,

    #[error("Scaler transform failed: {reason}")]
    ScalerTransform { reason: String },

    #[error("Heuristic computation failed on '{feature}': {reason}")]
    HeuristicComputation { feature: String, reason: String },
}

impl ForecastError {
    pub fn inference(reason: impl Into<String>) -> Self {
        ForecastError::InferenceFailure {
            reason: reason.into(),
        }
    }

    pub fn scaler(reason: impl Into<String>) -> Self {
        ForecastError::ScalerTransform {
            reason: reason.into(),
        }
    }
}
