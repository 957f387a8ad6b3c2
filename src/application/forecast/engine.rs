use super::fallback::FallbackHeuristic;
use crate::application::ml::artifact_loader::{FileArtifactLoader, LoadedArtifacts};
use crate::application::ml::inference_pool::{
    DEFAULT_INFERENCE_WORKERS, InferencePool, predict_guarded,
};
use crate::application::ml::model_runtime::ModelRuntime;
use crate::application::ml::predictor::SequenceModel;
use crate::application::ml::sequence_builder::SequenceBuilder;
use crate::config::ForecastEnvConfig;
use crate::domain::errors::ForecastError;
use crate::domain::ml::feature_registry::PRODUCT_ID;
use crate::domain::ml::types::ProductContext;
use crate::domain::ml::{FeatureVector, Forecast, ForecastSource, ProductForecast};
use chrono::Utc;
use ndarray::Array2;
use rand::Rng;
use rayon::prelude::*;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Demand forecasting with graceful degradation.
///
/// Routes through the trained sequence model when its artifacts are loaded and
/// every model feature is supplied; otherwise, or when any model step fails,
/// through `FallbackHeuristic`. Forecast calls never fail.
pub struct ForecastEngine {
    runtime: Arc<ModelRuntime>,
    sequences: SequenceBuilder,
    heuristic: FallbackHeuristic,
    inference: Option<InferencePool>,
}

impl ForecastEngine {
    pub fn new(runtime: Arc<ModelRuntime>) -> Self {
        Self {
            runtime,
            sequences: SequenceBuilder::default(),
            heuristic: FallbackHeuristic::new(),
            inference: None,
        }
    }

    /// Engine backed by the artifact files named in `config`.
    pub fn from_config(config: &ForecastEnvConfig) -> Self {
        let loader = FileArtifactLoader::from_config(config);
        let runtime = ModelRuntime::with_retry_interval(loader, config.artifact_retry_interval());

        let engine = Self::new(Arc::new(runtime))
            .with_sequence_builder(SequenceBuilder::new(
                config.sequence_window,
                config.model_horizon,
            ))
            .with_inference(config.inference_timeout(), config.inference_workers);

        if config.eager_load {
            let state = engine.runtime.ensure_loaded();
            info!("Eager artifact load finished: {}", state);
        }

        engine
    }

    pub fn with_sequence_builder(mut self, sequences: SequenceBuilder) -> Self {
        self.sequences = sequences;
        self
    }

    /// Bounds how long a forecast waits on model inference. `None` runs inline.
    pub fn with_inference_timeout(self, timeout: Option<Duration>) -> Self {
        self.with_inference(timeout, DEFAULT_INFERENCE_WORKERS)
    }

    /// Runs inference on `workers` pooled threads with a per-call `timeout`.
    /// If the pool cannot be started, inference runs inline.
    pub fn with_inference(mut self, timeout: Option<Duration>, workers: usize) -> Self {
        self.inference = timeout.and_then(|timeout| match InferencePool::spawn(workers, timeout) {
            Ok(pool) => Some(pool),
            Err(e) => {
                warn!("{}; running inference inline", e);
                None
            }
        });
        self
    }

    pub fn runtime(&self) -> &ModelRuntime {
        &self.runtime
    }

    /// Single-day demand forecast.
    pub fn predict(&self, features: &FeatureVector) -> i64 {
        self.forecast_day(features).0
    }

    /// Like `predict`, but also reports which tier produced the value.
    pub fn forecast_day(&self, features: &FeatureVector) -> (i64, ForecastSource) {
        self.forecast_day_with_rng(features, &mut rand::rng())
    }

    /// Forecast for the next `days` days.
    ///
    /// The model path yields at most the model horizon (7 by default); longer
    /// requests are truncated. The fallback path always yields `days` values.
    pub fn predict_horizon(&self, features: &FeatureVector, days: usize) -> Vec<i64> {
        self.forecast(features, days).values
    }

    /// Like `predict_horizon`, but also reports which tier produced the values.
    pub fn forecast(&self, features: &FeatureVector, days: usize) -> Forecast {
        self.forecast_with_rng(features, days, &mut rand::rng())
    }

    pub fn forecast_day_with_rng<R: Rng>(
        &self,
        features: &FeatureVector,
        rng: &mut R,
    ) -> (i64, ForecastSource) {
        if let Some(first) = self.try_model(features).and_then(|v| v.first().copied()) {
            return (first, ForecastSource::Model);
        }
        self.heuristic.predict(features, rng)
    }

    pub fn forecast_with_rng<R: Rng>(
        &self,
        features: &FeatureVector,
        days: usize,
        rng: &mut R,
    ) -> Forecast {
        match self.try_model(features) {
            Some(values) => Forecast {
                values: values.into_iter().take(days).collect(),
                source: ForecastSource::Model,
            },
            None => self.heuristic.predict_horizon(features, days, rng),
        }
    }

    /// Single-day forecasts for a catalog of products, in input order.
    pub fn forecast_catalog(&self, products: &[ProductContext]) -> Vec<ProductForecast> {
        let generated_at = Utc::now();

        let forecasts: Vec<ProductForecast> = products
            .par_iter()
            .map(|product| {
                let mut features = product.features.clone();
                if !features.contains(PRODUCT_ID) {
                    features.insert(PRODUCT_ID, product.product_id);
                }
                let (forecast, source) = self.forecast_day_with_rng(&features, &mut rand::rng());
                ProductForecast {
                    product_id: product.product_id,
                    forecast,
                    source,
                    generated_at,
                }
            })
            .collect();

        debug!("Forecast {} products", forecasts.len());
        forecasts
    }

    /// Model-path forecast for the full horizon, or `None` when the request
    /// must be served by the heuristic. Failures are logged here.
    fn try_model(&self, features: &FeatureVector) -> Option<Vec<i64>> {
        let state = self.runtime.ensure_loaded();
        if !state.is_ready() {
            debug!("Model path unavailable ({}), using heuristic", state);
            return None;
        }

        let missing = features.missing_model_features();
        if !missing.is_empty() {
            debug!("Model features {:?} absent, using heuristic", missing);
            return None;
        }

        let artifacts = self.runtime.artifacts()?;
        match self.model_forecast(artifacts, features) {
            Ok(values) => Some(values),
            Err(e) => {
                warn!("Model forecast failed ({}), using heuristic", e);
                None
            }
        }
    }

    fn model_forecast(
        &self,
        artifacts: &LoadedArtifacts,
        features: &FeatureVector,
    ) -> Result<Vec<i64>, ForecastError> {
        let horizon = self.sequences.horizon();
        let scaler = self.runtime.scaler_adapter();

        let normalized = scaler.normalize(features)?;
        let sequence = self.sequences.replicate_for_inference(&normalized);

        let output = self.run_inference(artifacts.model.clone(), sequence.clone())?;
        if output.len() < horizon {
            return Err(ForecastError::inference(format!(
                "model returned {} values, expected {}",
                output.len(),
                horizon
            )));
        }

        let restored = scaler.denormalize(&output[..horizon], &sequence)?;
        restored
            .into_iter()
            .map(|v| {
                if v.is_finite() {
                    Ok(v.trunc() as i64)
                } else {
                    Err(ForecastError::inference(format!("non-finite forecast {}", v)))
                }
            })
            .collect()
    }

    /// Runs the model on the pool when a timeout is configured, inline otherwise.
    /// A panicking or overrunning model surfaces as an error, not a hang.
    fn run_inference(
        &self,
        model: Arc<dyn SequenceModel>,
        sequence: Array2<f32>,
    ) -> Result<Vec<f32>, ForecastError> {
        match &self.inference {
            Some(pool) => pool.run(model, sequence),
            None => predict_guarded(model.as_ref(), &sequence),
        }
    }
}
