//! Forecast batch ingestion.
//!
//! Brings batch-delivered forecast data into a single ordered time series.
//!
//! # Architecture
//!
//! - [`payload`]: wire schema of one batch and its validation
//! - [`merge`]: first-writer-wins, time-ordered merge of timestep records
//! - [`store`]: the [`TimeSeriesStore`] (single writer) and its read handles
//! - [`source`]: network access to batches
//! - [`worker`]: background fetch task speaking a typed message protocol
//! - [`pipeline`]: cache-first orchestration of all of the above

pub mod config;
pub mod descriptor;
pub mod error;
pub mod merge;
pub mod payload;
pub mod pipeline;
pub mod source;
pub mod store;
pub mod worker;

// Re-exports
pub use config::PipelineConfig;
pub use descriptor::{BatchDescriptor, LoadState};
pub use error::{FetchError, IngestionError, Result};
pub use merge::{merge_time_series, MergeStats};
pub use payload::{parse_batch, BatchMetadata, BatchPayload, GridInfo, ValidatedBatch};
pub use pipeline::{BatchIngestionPipeline, BatchOrigin, RequestOutcome, ResponseOutcome};
pub use source::{batch_url, BatchSource, HttpBatchSource};
pub use store::{DatasetSnapshot, TimeSeriesReader, TimeSeriesStore};
pub use worker::{BatchFetchWorker, WorkerEndpoint, WorkerHandle, WorkerRequest, WorkerResponse};
