pub mod feature_registry;
pub mod types;

pub use feature_registry::{FEATURE_COUNT, FEATURE_NAMES, FeatureVector};
pub use types::{Forecast, ForecastSource, LoadState, ProductContext, ProductForecast};
