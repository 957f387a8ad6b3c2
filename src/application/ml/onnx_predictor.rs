use super::predictor::SequenceModel;
use crate::domain::errors::ForecastError;
use ndarray::Array2;
use ort::session::Session;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{debug, info};

/// Multi-output LSTM exported to ONNX.
///
/// The session is guarded by a mutex: `Session::run` needs exclusive access,
/// so concurrent forecasts are serialized on inference only.
pub struct OnnxSequenceModel {
    session: Mutex<Session>,
    model_path: PathBuf,
}

impl OnnxSequenceModel {
    /// Builds a session from a model file.
    ///
    /// A failing session builder means the runtime itself is unusable
    /// (`RuntimeUnavailable`); a failing commit means the file is bad
    /// (`ArtifactCorrupt`).
    pub fn load(model_path: &Path) -> Result<Self, ForecastError> {
        let builder = Session::builder().map_err(|e| ForecastError::RuntimeUnavailable {
            reason: format!("Failed to create ONNX session builder: {}", e),
        })?;

        let session =
            builder
                .commit_from_file(model_path)
                .map_err(|e| ForecastError::ArtifactCorrupt {
                    path: model_path.to_path_buf(),
                    reason: e.to_string(),
                })?;

        info!("Successfully loaded ONNX model from {:?}", model_path);

        Ok(Self {
            session: Mutex::new(session),
            model_path: model_path.to_path_buf(),
        })
    }
}

impl SequenceModel for OnnxSequenceModel {
    fn predict(&self, sequence: &Array2<f32>) -> Result<Vec<f32>, ForecastError> {
        let (window, feature_dim) = sequence.dim();

        // Flatten into a single batch [1, window, features]
        let flat_data: Vec<f32> = sequence.iter().copied().collect();
        let shape = vec![1, window, feature_dim];

        let input_value = ort::value::Value::from_array((shape.as_slice(), flat_data))
            .map_err(|e| ForecastError::inference(format!("Input value creation failed: {}", e)))?;

        let inputs = ort::inputs![input_value];

        let mut session = self
            .session
            .lock()
            .map_err(|e| ForecastError::inference(format!("Session lock failed: {}", e)))?;

        let outputs = session
            .run(inputs)
            .map_err(|e| ForecastError::inference(e.to_string()))?;

        let output_value = outputs
            .iter()
            .next()
            .map(|(_, v)| v)
            .ok_or_else(|| ForecastError::inference("No output found"))?;

        let data = output_value
            .try_extract_tensor::<f32>()
            .map_err(|e| ForecastError::inference(e.to_string()))?;

        debug!(
            "ONNX inference on {:?} produced {} values",
            self.model_path,
            data.1.len()
        );
        Ok(data.1.to_vec())
    }

    fn name(&self) -> &str {
        "ONNX Runtime (LSTM)"
    }

    fn version(&self) -> &str {
        "v1 (multi-output)"
    }
}
