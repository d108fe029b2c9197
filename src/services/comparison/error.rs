// Comparison error taxonomy

use thiserror::Error;

use crate::services::document::DocumentReadError;

/// Fatal before any segment is processed.
#[derive(Error, Debug)]
pub enum ConfigurationError {
    #[error("API key not configured for provider {0}")]
    MissingApiKey(String),
    #[error("No oracle provider configured (tried: {0})")]
    NoProviderAvailable(String),
    #[error("Unknown provider: {0}")]
    UnknownProvider(String),
    #[error("Invalid thresholds: expected 0 <= low < high <= 1, got low={low} high={high}")]
    InvalidThresholds { high: f64, low: f64 },
    #[error("Invalid oracle settings: {0}")]
    InvalidOracleSettings(String),
    #[error("Config store error: {0}")]
    Store(String),
}

#[derive(Error, Debug)]
pub enum CompareError {
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),
    #[error(transparent)]
    Document(#[from] DocumentReadError),
    #[error("comparison cancelled after {processed} of {total} target segments")]
    Cancelled { processed: usize, total: usize },
}
