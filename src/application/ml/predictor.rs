use crate::domain::errors::ForecastError;
use ndarray::Array2;

/// Interface for trained multi-output sequence models.
pub trait SequenceModel: Send + Sync {
    /// Maps a `[window, features]` matrix of normalized observations to the
    /// normalized target values for the following days, in order.
    fn predict(&self, sequence: &Array2<f32>) -> Result<Vec<f32>, ForecastError>;

    /// Get model name/type
    fn name(&self) -> &str;

    /// Get model version/id
    fn version(&self) -> &str;
}
