pub mod engine;
pub mod fallback;

pub use engine::ForecastEngine;
pub use fallback::FallbackHeuristic;
