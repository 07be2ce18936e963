//! Pipeline configuration.

use std::time::Duration;

use serde::Deserialize;

/// Configuration for [`BatchIngestionPipeline`](crate::BatchIngestionPipeline)
/// and its HTTP batch source.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Base URL of the forecast batch API; batches live at `{base_url}/data/NNN`
    pub base_url: String,
    /// Maximum number of background batch fetches in flight at once
    pub max_in_flight: usize,
    /// TCP connect timeout in seconds
    pub connect_timeout_secs: u64,
    /// Whole-request timeout in seconds; unset means no timeout
    pub request_timeout_secs: Option<u64>,
    /// Largest accepted batch body in megabytes
    pub max_payload_mb: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000".to_string(),
            max_in_flight: 2,
            connect_timeout_secs: 30,
            request_timeout_secs: None,
            max_payload_mb: 256,
        }
    }
}

impl PipelineConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_secs.map(Duration::from_secs)
    }

    pub fn max_payload_bytes(&self) -> usize {
        self.max_payload_mb.saturating_mul(1024 * 1024)
    }

    /// `max_in_flight`, never below one.
    pub fn fetch_limit(&self) -> usize {
        self.max_in_flight.max(1)
    }
}
