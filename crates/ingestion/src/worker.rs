//! Background batch fetch worker.
//!
//! The worker is a tokio task that owns a [`BatchSource`] and nothing else.
//! It shares no state with the pipeline: requests go in over one channel and
//! typed responses come back over another. The message shapes match the JSON
//! protocol `{type: "FETCH_BATCH", batchNumber}` /
//! `{type: "FETCH_SUCCESS", batchNumber, data}` /
//! `{type: "FETCH_ERROR", batchNumber, error}`.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, Semaphore};
use tracing::{debug, info, warn};

use crate::error::{IngestionError, Result};
use crate::source::BatchSource;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WorkerRequest {
    FetchBatch {
        #[serde(rename = "batchNumber")]
        batch_number: u32,
    },
}

impl WorkerRequest {
    pub fn batch_number(&self) -> u32 {
        match self {
            WorkerRequest::FetchBatch { batch_number } => *batch_number,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WorkerResponse {
    FetchSuccess {
        #[serde(rename = "batchNumber")]
        batch_number: u32,
        data: String,
    },
    FetchError {
        #[serde(rename = "batchNumber")]
        batch_number: u32,
        error: String,
    },
}

impl WorkerResponse {
    pub fn batch_number(&self) -> u32 {
        match self {
            WorkerResponse::FetchSuccess { batch_number, .. }
            | WorkerResponse::FetchError { batch_number, .. } => *batch_number,
        }
    }
}

/// Pipeline side of the worker channels.
pub struct WorkerHandle {
    requests: mpsc::UnboundedSender<WorkerRequest>,
    responses: mpsc::UnboundedReceiver<WorkerResponse>,
}

/// Worker side of the channels, for driving the protocol by hand.
pub struct WorkerEndpoint {
    pub requests: mpsc::UnboundedReceiver<WorkerRequest>,
    pub responses: mpsc::UnboundedSender<WorkerResponse>,
}

impl WorkerEndpoint {
    pub async fn next_request(&mut self) -> Option<WorkerRequest> {
        self.requests.recv().await
    }

    /// Send a response; returns false once the pipeline side is gone.
    pub fn respond(&self, response: WorkerResponse) -> bool {
        self.responses.send(response).is_ok()
    }
}

impl WorkerHandle {
    /// A handle with no task behind it. The caller plays the worker through
    /// the returned endpoint.
    pub fn detached() -> (WorkerHandle, WorkerEndpoint) {
        let (request_tx, request_rx) = mpsc::unbounded_channel();
        let (response_tx, response_rx) = mpsc::unbounded_channel();
        (
            WorkerHandle {
                requests: request_tx,
                responses: response_rx,
            },
            WorkerEndpoint {
                requests: request_rx,
                responses: response_tx,
            },
        )
    }

    pub fn send(&self, request: WorkerRequest) -> Result<()> {
        self.requests
            .send(request)
            .map_err(|_| IngestionError::WorkerUnavailable)
    }

    /// Next response, or `None` once the worker has shut down.
    pub async fn recv(&mut self) -> Option<WorkerResponse> {
        self.responses.recv().await
    }

    pub fn try_recv(&mut self) -> Option<WorkerResponse> {
        self.responses.try_recv().ok()
    }
}

/// Entry point of the fetch worker task.
pub struct BatchFetchWorker;

impl BatchFetchWorker {
    /// Spawn the worker on the current runtime.
    ///
    /// At most `max_concurrent` fetches run at once; further requests wait
    /// for a permit. The task exits when the returned handle is dropped.
    pub fn spawn(source: Arc<dyn BatchSource>, max_concurrent: usize) -> WorkerHandle {
        let (handle, endpoint) = WorkerHandle::detached();
        tokio::spawn(Self::run(source, endpoint, max_concurrent.max(1)));
        handle
    }

    async fn run(source: Arc<dyn BatchSource>, mut endpoint: WorkerEndpoint, max_concurrent: usize) {
        let semaphore = Arc::new(Semaphore::new(max_concurrent));
        info!(max_concurrent = max_concurrent, "Batch fetch worker started");

        while let Some(request) = endpoint.next_request().await {
            let batch_number = request.batch_number();
            let source = source.clone();
            let semaphore = semaphore.clone();
            let responses = endpoint.responses.clone();

            tokio::spawn(async move {
                let Ok(_permit) = semaphore.acquire_owned().await else {
                    return;
                };

                let response = match source.fetch_batch(batch_number).await {
                    Ok(data) => WorkerResponse::FetchSuccess { batch_number, data },
                    Err(e) => {
                        warn!(batch = batch_number, error = %e, "Batch fetch failed");
                        WorkerResponse::FetchError {
                            batch_number,
                            error: e.to_string(),
                        }
                    }
                };

                if responses.send(response).is_err() {
                    debug!(batch = batch_number, "Pipeline gone, dropping fetch result");
                }
            });
        }

        info!("Batch fetch worker stopped");
    }
}
