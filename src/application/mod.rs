// Artifact loading, scaling and sequence models
pub mod ml;

// Forecast orchestration and heuristic fallback
pub mod forecast;
