//! Storage for forecast batch payloads.
//!
//! Provides a SQLite-backed cache keyed by batch number so that batches
//! fetched in one session are available instantly in the next one.

pub mod batch_cache;

pub use batch_cache::{
    BatchStore, CacheConfig, CacheError, CachedBatch, PersistentBatchCache,
    DEFAULT_RETENTION_HOURS,
};
