//! Error types for the ingestion crate.

use forecast_common::ForecastError;
use thiserror::Error;

/// Errors that can occur while fetching a batch from the network.
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("Request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("HTTP {status} from {url}")]
    Status { url: String, status: u16 },

    #[error("Payload from {url} exceeds {limit} bytes")]
    TooLarge { url: String, limit: usize },

    #[error("Payload from {url} is not valid UTF-8")]
    Encoding { url: String },

    #[error("Batch source unavailable: {0}")]
    Unavailable(String),
}

/// Errors that can occur during ingestion.
#[derive(Error, Debug)]
pub enum IngestionError {
    #[error("Failed to fetch batch: {0}")]
    Fetch(#[from] FetchError),

    #[error("Malformed payload for batch {batch}: {reason}")]
    MalformedPayload { batch: u32, reason: String },

    #[error("Failed to load initial batch: {0}")]
    Initialization(String),

    #[error("Invalid batch number: {0}")]
    InvalidBatchNumber(u32),

    #[error("Dataset not initialized; request batch 1 first")]
    NotInitialized,

    #[error("Batch fetch worker is unavailable")]
    WorkerUnavailable,

    #[error("Cache error: {0}")]
    Cache(#[from] storage::CacheError),
}

impl IngestionError {
    pub(crate) fn malformed(batch: u32, reason: impl std::fmt::Display) -> Self {
        IngestionError::MalformedPayload {
            batch,
            reason: reason.to_string(),
        }
    }
}

impl From<(u32, ForecastError)> for IngestionError {
    fn from((batch, err): (u32, ForecastError)) -> Self {
        IngestionError::malformed(batch, err)
    }
}

/// Result type for ingestion operations.
pub type Result<T> = std::result::Result<T, IngestionError>;
