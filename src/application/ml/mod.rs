pub mod artifact_loader;
pub mod inference_pool;
pub mod model_runtime;
#[cfg(feature = "onnx")]
pub mod onnx_predictor;
pub mod predictor;
pub mod scaler;
pub mod sequence_builder;

pub use artifact_loader::{ArtifactLoader, FileArtifactLoader, LoadedArtifacts};
pub use inference_pool::InferencePool;
pub use model_runtime::{ModelRuntime, RuntimeStatus};
pub use predictor::SequenceModel;
pub use scaler::{MinMaxScaler, ScalerAdapter};
pub use sequence_builder::SequenceBuilder;
