// Feature vectors and forecast result types
pub mod ml;

// Domain-specific error types
pub mod errors;
