use super::predictor::SequenceModel;
use super::scaler::MinMaxScaler;
use crate::config::ForecastEnvConfig;
use crate::domain::errors::ForecastError;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// A trained model and the scaler fitted alongside it. Immutable once built.
#[derive(Clone)]
pub struct LoadedArtifacts {
    pub model: Arc<dyn SequenceModel>,
    pub scaler: Arc<MinMaxScaler>,
}

/// Source of forecasting artifacts.
///
/// Implementations report why loading failed through the `ForecastError`
/// variant: `RuntimeUnavailable`, `ArtifactMissing` or `ArtifactCorrupt`.
pub trait ArtifactLoader: Send + Sync {
    fn load(&self) -> Result<LoadedArtifacts, ForecastError>;

    /// Human-readable origin, used in status lines.
    fn describe(&self) -> String;
}

/// Loads the ONNX model and JSON scaler from fixed paths on disk.
#[derive(Debug, Clone)]
pub struct FileArtifactLoader {
    model_path: PathBuf,
    scaler_path: PathBuf,
}

impl FileArtifactLoader {
    pub fn new(model_path: impl Into<PathBuf>, scaler_path: impl Into<PathBuf>) -> Self {
        Self {
            model_path: model_path.into(),
            scaler_path: scaler_path.into(),
        }
    }

    pub fn from_config(config: &ForecastEnvConfig) -> Self {
        Self::new(config.model_path(), config.scaler_path())
    }
}

impl ArtifactLoader for FileArtifactLoader {
    fn load(&self) -> Result<LoadedArtifacts, ForecastError> {
        runtime_available()?;

        for path in [&self.model_path, &self.scaler_path] {
            if !path.exists() {
                return Err(ForecastError::ArtifactMissing { path: path.clone() });
            }
        }

        // Scaler first: it needs no runtime and rejects incompatible columns early
        let scaler = MinMaxScaler::from_file(&self.scaler_path)?;
        let model = load_model(&self.model_path)?;

        Ok(LoadedArtifacts {
            model,
            scaler: Arc::new(scaler),
        })
    }

    fn describe(&self) -> String {
        format!(
            "model={} scaler={}",
            self.model_path.display(),
            self.scaler_path.display()
        )
    }
}

#[cfg(feature = "onnx")]
fn runtime_available() -> Result<(), ForecastError> {
    Ok(())
}

#[cfg(not(feature = "onnx"))]
fn runtime_available() -> Result<(), ForecastError> {
    Err(ForecastError::RuntimeUnavailable {
        reason: NO_RUNTIME.to_string(),
    })
}

#[cfg(not(feature = "onnx"))]
const NO_RUNTIME: &str = "built without the `onnx` feature";

#[cfg(feature = "onnx")]
fn load_model(path: &Path) -> Result<Arc<dyn SequenceModel>, ForecastError> {
    let model = super::onnx_predictor::OnnxSequenceModel::load(path)?;
    Ok(Arc::new(model))
}

#[cfg(not(feature = "onnx"))]
fn load_model(_path: &Path) -> Result<Arc<dyn SequenceModel>, ForecastError> {
    Err(ForecastError::RuntimeUnavailable {
        reason: NO_RUNTIME.to_string(),
    })
}
