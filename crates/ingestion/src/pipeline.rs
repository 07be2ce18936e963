//! Cache-first batch ingestion.
//!
//! Batch 1 initializes the dataset and is the only request that holds the
//! load state at [`LoadState::Loading`]. Every later batch is checked against
//! the persistent cache first; on a miss it is handed to the fetch worker,
//! with at most `max_in_flight` worker fetches outstanding. Anything beyond
//! that waits in a FIFO queue and is dispatched as earlier fetches complete.
//!
//! Background failures leave a gap in the series and are not retried.

use std::collections::{BTreeSet, VecDeque};
use std::sync::Arc;

use forecast_common::GridGeometry;
use storage::BatchStore;
use tokio::sync::watch;
use tracing::{debug, info, instrument, warn};

use crate::config::PipelineConfig;
use crate::descriptor::{BatchDescriptor, LoadState};
use crate::error::{IngestionError, Result};
use crate::payload::{parse_batch, ValidatedBatch};
use crate::source::BatchSource;
use crate::store::{TimeSeriesReader, TimeSeriesStore};
use crate::worker::{BatchFetchWorker, WorkerHandle, WorkerRequest, WorkerResponse};

/// Where a merged batch came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchOrigin {
    Cache,
    Network,
}

/// Result of [`BatchIngestionPipeline::request_batch`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestOutcome {
    /// Merged before returning
    Loaded { origin: BatchOrigin, inserted: usize },
    /// Handed to the fetch worker
    Dispatched,
    /// Waiting for a free fetch slot
    Queued,
    AlreadyLoaded,
    AlreadyInFlight,
}

/// Result of [`BatchIngestionPipeline::handle_response`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseOutcome {
    Merged { inserted: usize },
    /// Fetch or validation failed; the batch is left as a gap
    Failed,
    /// The batch was not in flight (stale or duplicate response)
    Ignored,
}

pub struct BatchIngestionPipeline {
    config: PipelineConfig,
    store: TimeSeriesStore,
    cache: Arc<dyn BatchStore>,
    source: Arc<dyn BatchSource>,
    worker: WorkerHandle,
    descriptor: Option<BatchDescriptor>,
    in_flight: BTreeSet<u32>,
    queued: VecDeque<u32>,
    failed: BTreeSet<u32>,
    load_state: watch::Sender<LoadState>,
}

impl BatchIngestionPipeline {
    /// Create a pipeline around an existing worker handle.
    ///
    /// `source` is used directly for batch 1; background batches go through
    /// `worker`.
    pub fn new(
        config: PipelineConfig,
        cache: Arc<dyn BatchStore>,
        source: Arc<dyn BatchSource>,
        worker: WorkerHandle,
    ) -> Self {
        let (load_state, _) = watch::channel(LoadState::Idle);
        Self {
            config,
            store: TimeSeriesStore::new(),
            cache,
            source,
            worker,
            descriptor: None,
            in_flight: BTreeSet::new(),
            queued: VecDeque::new(),
            failed: BTreeSet::new(),
            load_state,
        }
    }

    /// Create a pipeline and spawn a [`BatchFetchWorker`] over `source`.
    pub fn spawn(
        config: PipelineConfig,
        cache: Arc<dyn BatchStore>,
        source: Arc<dyn BatchSource>,
    ) -> Self {
        let worker = BatchFetchWorker::spawn(source.clone(), config.fetch_limit());
        Self::new(config, cache, source, worker)
    }

    pub fn reader(&self) -> TimeSeriesReader {
        self.store.reader()
    }

    pub fn descriptor(&self) -> Option<&BatchDescriptor> {
        self.descriptor.as_ref()
    }

    pub fn load_state(&self) -> LoadState {
        self.load_state.borrow().clone()
    }

    pub fn subscribe_load_state(&self) -> watch::Receiver<LoadState> {
        self.load_state.subscribe()
    }

    /// Batches handed to the worker and not answered yet.
    pub fn in_flight(&self) -> Vec<u32> {
        self.in_flight.iter().copied().collect()
    }

    /// Batches waiting for a fetch slot.
    pub fn queued(&self) -> Vec<u32> {
        self.queued.iter().copied().collect()
    }

    /// True while any background fetch is outstanding or waiting.
    pub fn is_fetching(&self) -> bool {
        !self.in_flight.is_empty() || !self.queued.is_empty()
    }

    pub fn failed_batches(&self) -> Vec<u32> {
        self.failed.iter().copied().collect()
    }

    /// Bring batch `batch_number` into the store.
    ///
    /// Batch 1 completes (or fails) before this returns. Later batches are
    /// merged immediately on a cache hit; otherwise they are dispatched to
    /// the worker or queued, and arrive through [`Self::handle_response`].
    #[instrument(skip(self))]
    pub async fn request_batch(&mut self, batch_number: u32) -> Result<RequestOutcome> {
        if batch_number == 0 {
            return Err(IngestionError::InvalidBatchNumber(batch_number));
        }
        if batch_number == 1 {
            return self.initialize().await;
        }

        let descriptor = self
            .descriptor
            .as_ref()
            .ok_or(IngestionError::NotInitialized)?;
        if batch_number > descriptor.total_batches {
            return Err(IngestionError::InvalidBatchNumber(batch_number));
        }
        if descriptor.is_loaded(batch_number) {
            return Ok(RequestOutcome::AlreadyLoaded);
        }
        if self.in_flight.contains(&batch_number) {
            return Ok(RequestOutcome::AlreadyInFlight);
        }

        self.queued.retain(|&n| n != batch_number);
        self.failed.remove(&batch_number);
        self.request_background(batch_number).await
    }

    /// Queue every declared batch that is not loaded or already pending, and
    /// start as many as the fetch limit allows. Returns how many were queued.
    pub async fn schedule_remaining(&mut self) -> Result<usize> {
        let descriptor = self
            .descriptor
            .as_ref()
            .ok_or(IngestionError::NotInitialized)?;

        let pending: Vec<u32> = descriptor
            .missing_batches()
            .into_iter()
            .filter(|n| !self.in_flight.contains(n) && !self.queued.contains(n))
            .collect();

        let count = pending.len();
        for n in pending {
            self.failed.remove(&n);
            self.queued.push_back(n);
        }

        info!(
            queued = count,
            total_batches = descriptor.total_batches,
            "Scheduled background batches"
        );
        self.pump_queue().await;
        Ok(count)
    }

    /// Load batch 1, then schedule the rest.
    pub async fn start(&mut self) -> Result<RequestOutcome> {
        let outcome = self.request_batch(1).await?;
        self.schedule_remaining().await?;
        Ok(outcome)
    }

    /// Drop all state and start over from batch 1.
    pub async fn retry(&mut self) -> Result<RequestOutcome> {
        info!("Retrying dataset load");
        self.clear();
        self.start().await
    }

    /// Drop the dataset and all batch bookkeeping. Responses to fetches that
    /// were in flight are ignored when they arrive.
    pub fn clear(&mut self) {
        self.store.clear();
        self.descriptor = None;
        self.in_flight.clear();
        self.queued.clear();
        self.failed.clear();
        self.load_state.send_replace(LoadState::Idle);
    }

    /// Wait for the next worker response. `None` once the worker is gone.
    pub async fn next_response(&mut self) -> Option<WorkerResponse> {
        self.worker.recv().await
    }

    /// Process a worker response and refill free fetch slots.
    pub async fn handle_response(&mut self, response: WorkerResponse) -> ResponseOutcome {
        let batch_number = response.batch_number();
        if !self.in_flight.remove(&batch_number) {
            debug!(batch = batch_number, "Ignoring response for batch not in flight");
            return ResponseOutcome::Ignored;
        }

        let outcome = match response {
            WorkerResponse::FetchSuccess { data, .. } => {
                match self.validate_background(batch_number, &data) {
                    Ok(batch) => {
                        if let Err(e) = self.cache.set(batch_number, &data).await {
                            warn!(batch = batch_number, error = %e, "Failed to cache batch");
                        }
                        let inserted = self.merge_background(batch);
                        ResponseOutcome::Merged { inserted }
                    }
                    Err(e) => {
                        warn!(batch = batch_number, error = %e, "Discarding malformed batch");
                        self.failed.insert(batch_number);
                        ResponseOutcome::Failed
                    }
                }
            }
            WorkerResponse::FetchError { error, .. } => {
                warn!(batch = batch_number, error = %error, "Background batch failed");
                self.failed.insert(batch_number);
                ResponseOutcome::Failed
            }
        };

        self.pump_queue().await;
        outcome
    }

    /// Process responses until nothing is in flight or queued.
    ///
    /// A fetch that never answers keeps this waiting; there is no timeout
    /// unless the source has one.
    pub async fn run_until_idle(&mut self) {
        while !self.in_flight.is_empty() {
            match self.worker.recv().await {
                Some(response) => {
                    self.handle_response(response).await;
                }
                None => {
                    warn!(
                        in_flight = self.in_flight.len(),
                        "Fetch worker stopped with batches in flight"
                    );
                    break;
                }
            }
        }
    }

    async fn initialize(&mut self) -> Result<RequestOutcome> {
        if self.descriptor.as_ref().is_some_and(|d| d.is_loaded(1)) {
            return Ok(RequestOutcome::AlreadyLoaded);
        }

        self.load_state.send_replace(LoadState::Loading);
        info!("Loading initial batch");

        let (batch, origin) = match self.load_initial().await {
            Ok(loaded) => loaded,
            Err(e) => {
                let message = e.to_string();
                warn!(error = %message, "Initial batch failed");
                self.load_state.send_replace(LoadState::Failed(message.clone()));
                return Err(IngestionError::Initialization(message));
            }
        };

        let mut descriptor = BatchDescriptor::from_metadata(1, &batch.metadata);
        descriptor.mark_loaded(1);
        let stats = self
            .store
            .initialize(batch.geometry, batch.scales, batch.records);
        self.descriptor = Some(descriptor);
        self.load_state.send_replace(LoadState::Ready);

        info!(
            timesteps = stats.total,
            origin = ?origin,
            "Initial batch loaded"
        );
        Ok(RequestOutcome::Loaded {
            origin,
            inserted: stats.inserted,
        })
    }

    async fn load_initial(&self) -> Result<(ValidatedBatch, BatchOrigin)> {
        if let Some(batch) = self.cached_batch(1, None).await {
            return Ok((batch, BatchOrigin::Cache));
        }

        let data = self.source.fetch_batch(1).await?;
        let batch = parse_batch(1, &data)?;
        if let Err(e) = self.cache.set(1, &data).await {
            warn!(batch = 1, error = %e, "Failed to cache batch");
        }
        Ok((batch, BatchOrigin::Network))
    }

    async fn request_background(&mut self, batch_number: u32) -> Result<RequestOutcome> {
        let geometry = self.store.snapshot().geometry();
        if let Some(batch) = self.cached_batch(batch_number, geometry.as_deref()).await {
            let inserted = self.merge_background(batch);
            tokio::task::yield_now().await;
            return Ok(RequestOutcome::Loaded {
                origin: BatchOrigin::Cache,
                inserted,
            });
        }

        if self.in_flight.len() >= self.config.fetch_limit() {
            if !self.queued.contains(&batch_number) {
                self.queued.push_back(batch_number);
            }
            debug!(batch = batch_number, "Fetch slots full, queued batch");
            return Ok(RequestOutcome::Queued);
        }

        self.worker
            .send(WorkerRequest::FetchBatch { batch_number })?;
        self.in_flight.insert(batch_number);
        debug!(batch = batch_number, "Dispatched batch to worker");
        Ok(RequestOutcome::Dispatched)
    }

    /// Cached, valid payload for a batch. An unusable entry is deleted.
    async fn cached_batch(
        &self,
        batch_number: u32,
        geometry: Option<&GridGeometry>,
    ) -> Option<ValidatedBatch> {
        let entry = self.cache.get(batch_number).await?;
        match parse_batch(batch_number, &entry.data).and_then(|b| matching_grid(b, geometry)) {
            Ok(batch) => Some(batch),
            Err(e) => {
                warn!(batch = batch_number, error = %e, "Dropping unusable cache entry");
                if let Err(e) = self.cache.delete(batch_number).await {
                    debug!(batch = batch_number, error = %e, "Failed to delete cache entry");
                }
                None
            }
        }
    }

    fn validate_background(&self, batch_number: u32, data: &str) -> Result<ValidatedBatch> {
        let batch = parse_batch(batch_number, data)?;
        matching_grid(batch, self.store.snapshot().geometry().as_deref())
    }

    fn merge_background(&mut self, batch: ValidatedBatch) -> usize {
        let batch_number = batch.batch_number;
        let stats = self.store.merge(batch.records);
        if let Some(descriptor) = self.descriptor.as_mut() {
            descriptor.mark_loaded(batch_number);
            debug!(
                batch = batch_number,
                inserted = stats.inserted,
                loaded = descriptor.loaded_batches().len(),
                total_batches = descriptor.total_batches,
                "Merged background batch"
            );
        }
        stats.inserted
    }

    /// Start queued batches while fetch slots are free. Cache hits do not
    /// occupy a slot, so several may be merged in one call.
    async fn pump_queue(&mut self) {
        while self.in_flight.len() < self.config.fetch_limit() {
            let Some(batch_number) = self.queued.pop_front() else {
                break;
            };
            if self.descriptor.as_ref().map_or(true, |d| d.is_loaded(batch_number)) {
                continue;
            }
            if let Err(e) = self.request_background(batch_number).await {
                warn!(batch = batch_number, error = %e, "Could not start batch fetch");
                self.failed.insert(batch_number);
            }
        }
    }
}

/// Reject a batch whose grid differs from the loaded dataset's.
fn matching_grid(batch: ValidatedBatch, expected: Option<&GridGeometry>) -> Result<ValidatedBatch> {
    match expected {
        Some(expected) if *expected != batch.geometry => Err(IngestionError::malformed(
            batch.batch_number,
            "grid geometry differs from loaded dataset",
        )),
        _ => Ok(batch),
    }
}
