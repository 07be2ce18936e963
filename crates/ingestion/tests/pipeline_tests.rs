//! Integration tests for the batch ingestion pipeline.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::Duration;
use ingestion::{
    batch_url, BatchIngestionPipeline, BatchOrigin, BatchSource, FetchError, IngestionError,
    LoadState, PipelineConfig, RequestOutcome, ResponseOutcome, WorkerEndpoint, WorkerHandle,
    WorkerRequest, WorkerResponse,
};
use storage::{BatchStore, PersistentBatchCache};
use test_utils::{synthetic_batch_json, t2_raw, SyntheticBatch};
use tokio_test::assert_ok;

#[derive(Default)]
struct StubSource {
    payloads: Mutex<HashMap<u32, String>>,
    calls: AtomicUsize,
}

impl StubSource {
    fn with(entries: &[(u32, String)]) -> Arc<Self> {
        let source = Self::default();
        for (n, json) in entries {
            source.insert(*n, json.clone());
        }
        Arc::new(source)
    }

    fn insert(&self, batch_number: u32, json: String) {
        self.payloads.lock().unwrap().insert(batch_number, json);
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl BatchSource for StubSource {
    async fn fetch_batch(&self, batch_number: u32) -> Result<String, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.payloads
            .lock()
            .unwrap()
            .get(&batch_number)
            .cloned()
            .ok_or_else(|| FetchError::Status {
                url: batch_url("http://stub", batch_number),
                status: 404,
            })
    }
}

async fn memory_cache() -> Arc<PersistentBatchCache> {
    Arc::new(
        PersistentBatchCache::open_memory(Duration::hours(12))
            .await
            .unwrap(),
    )
}

fn config(max_in_flight: usize) -> PipelineConfig {
    PipelineConfig {
        max_in_flight,
        ..PipelineConfig::default()
    }
}

async fn detached_pipeline(
    source: Arc<StubSource>,
    cache: Arc<PersistentBatchCache>,
    max_in_flight: usize,
) -> (BatchIngestionPipeline, WorkerEndpoint) {
    let (worker, endpoint) = WorkerHandle::detached();
    let pipeline = BatchIngestionPipeline::new(config(max_in_flight), cache, source, worker);
    (pipeline, endpoint)
}

#[tokio::test]
async fn test_initial_batch_then_worker_delivery() {
    let source = StubSource::with(&[(1, synthetic_batch_json(1, &[0, 1, 2], 3))]);
    let cache = memory_cache().await;
    let (mut pipeline, mut endpoint) = detached_pipeline(source, cache, 2).await;
    let reader = pipeline.reader();
    let load_state = pipeline.subscribe_load_state();

    let outcome = assert_ok!(pipeline.request_batch(1).await);
    assert_eq!(
        outcome,
        RequestOutcome::Loaded {
            origin: BatchOrigin::Network,
            inserted: 3
        }
    );
    assert_eq!(*load_state.borrow(), LoadState::Ready);
    assert_eq!(reader.time_indices(), vec![0, 1, 2]);
    assert_eq!(pipeline.descriptor().unwrap().total_batches, 3);

    assert_eq!(
        assert_ok!(pipeline.request_batch(2).await),
        RequestOutcome::Dispatched
    );
    assert_eq!(
        endpoint.next_request().await.unwrap(),
        WorkerRequest::FetchBatch { batch_number: 2 }
    );
    assert!(endpoint.respond(WorkerResponse::FetchSuccess {
        batch_number: 2,
        data: synthetic_batch_json(2, &[5, 3, 4], 3),
    }));

    let response = pipeline.next_response().await.unwrap();
    assert_eq!(
        pipeline.handle_response(response).await,
        ResponseOutcome::Merged { inserted: 3 }
    );
    assert_eq!(reader.time_indices(), vec![0, 1, 2, 3, 4, 5]);
    assert_eq!(pipeline.descriptor().unwrap().loaded_batches(), vec![1, 2]);
    assert!(pipeline.in_flight().is_empty());
}

#[tokio::test]
async fn test_cache_hit_skips_worker() {
    let source = StubSource::with(&[(1, synthetic_batch_json(1, &[0, 1], 3))]);
    let cache = memory_cache().await;
    cache
        .set(2, &synthetic_batch_json(2, &[2, 3], 3))
        .await
        .unwrap();
    let (mut pipeline, mut endpoint) = detached_pipeline(source.clone(), cache, 2).await;

    assert_ok!(pipeline.request_batch(1).await);
    let outcome = assert_ok!(pipeline.request_batch(2).await);

    assert_eq!(
        outcome,
        RequestOutcome::Loaded {
            origin: BatchOrigin::Cache,
            inserted: 2
        }
    );
    assert_eq!(source.calls(), 1);
    assert!(pipeline.in_flight().is_empty());
    assert!(endpoint.requests.try_recv().is_err());
    assert_eq!(pipeline.reader().time_indices(), vec![0, 1, 2, 3]);
}

#[tokio::test]
async fn test_initial_batch_comes_from_cache_when_present() {
    let source = StubSource::with(&[]);
    let cache = memory_cache().await;
    cache.set(1, &synthetic_batch_json(1, &[0], 1)).await.unwrap();
    let (mut pipeline, _endpoint) = detached_pipeline(source.clone(), cache, 2).await;

    let outcome = assert_ok!(pipeline.request_batch(1).await);
    assert!(matches!(
        outcome,
        RequestOutcome::Loaded {
            origin: BatchOrigin::Cache,
            ..
        }
    ));
    assert_eq!(source.calls(), 0);
}

#[tokio::test]
async fn test_initial_failure_then_retry() {
    let source = StubSource::with(&[]);
    let cache = memory_cache().await;
    let (mut pipeline, _endpoint) = detached_pipeline(source.clone(), cache, 2).await;

    let err = pipeline.request_batch(1).await.unwrap_err();
    assert!(matches!(err, IngestionError::Initialization(_)));
    assert!(matches!(pipeline.load_state(), LoadState::Failed(_)));
    assert!(pipeline.reader().is_empty());

    source.insert(1, synthetic_batch_json(1, &[0, 1], 1));
    assert_ok!(pipeline.retry().await);

    assert_eq!(pipeline.load_state(), LoadState::Ready);
    assert_eq!(pipeline.reader().time_indices(), vec![0, 1]);
    assert!(pipeline.descriptor().unwrap().is_complete());
}

#[tokio::test]
async fn test_background_failure_leaves_gap() {
    let source = StubSource::with(&[(1, synthetic_batch_json(1, &[0, 1], 3))]);
    let cache = memory_cache().await;
    let (mut pipeline, endpoint) = detached_pipeline(source, cache, 2).await;

    assert_ok!(pipeline.start().await);
    assert_eq!(pipeline.in_flight(), vec![2, 3]);

    endpoint.respond(WorkerResponse::FetchError {
        batch_number: 2,
        error: "HTTP 503".to_string(),
    });
    endpoint.respond(WorkerResponse::FetchSuccess {
        batch_number: 3,
        data: synthetic_batch_json(3, &[4, 5], 3),
    });
    pipeline.run_until_idle().await;

    assert_eq!(pipeline.reader().time_indices(), vec![0, 1, 4, 5]);
    assert_eq!(pipeline.failed_batches(), vec![2]);
    assert_eq!(pipeline.descriptor().unwrap().loaded_batches(), vec![1, 3]);
    assert_eq!(pipeline.load_state(), LoadState::Ready);
    assert!(!pipeline.is_fetching());
}

#[tokio::test]
async fn test_malformed_payloads_count_as_failures() {
    let source = StubSource::with(&[(1, synthetic_batch_json(1, &[0], 3))]);
    let cache = memory_cache().await;
    let (mut pipeline, _endpoint) = detached_pipeline(source, cache.clone(), 2).await;

    assert_ok!(pipeline.start().await);

    let garbage = WorkerResponse::FetchSuccess {
        batch_number: 2,
        data: "{not json".to_string(),
    };
    assert_eq!(pipeline.handle_response(garbage).await, ResponseOutcome::Failed);

    let wrong_grid = WorkerResponse::FetchSuccess {
        batch_number: 3,
        data: SyntheticBatch::new(3, 3, &[2]).with_grid(2, 2).to_json(),
    };
    assert_eq!(
        pipeline.handle_response(wrong_grid).await,
        ResponseOutcome::Failed
    );

    assert_eq!(pipeline.reader().time_indices(), vec![0]);
    assert_eq!(pipeline.failed_batches(), vec![2, 3]);
    assert!(cache.get(2).await.is_none());
    assert!(cache.get(3).await.is_none());
}

#[tokio::test]
async fn test_unusable_cache_entry_is_replaced_by_fetch() {
    let source = StubSource::with(&[(1, synthetic_batch_json(1, &[0], 2))]);
    let cache = memory_cache().await;
    cache.set(2, "garbage").await.unwrap();
    let (mut pipeline, _endpoint) = detached_pipeline(source, cache.clone(), 2).await;

    assert_ok!(pipeline.request_batch(1).await);
    assert_eq!(
        assert_ok!(pipeline.request_batch(2).await),
        RequestOutcome::Dispatched
    );
    assert!(cache.get(2).await.is_none());
}

#[tokio::test]
async fn test_in_flight_fetches_are_bounded() {
    let source = StubSource::with(&[(1, synthetic_batch_json(1, &[0], 5))]);
    let cache = memory_cache().await;
    let (mut pipeline, mut endpoint) = detached_pipeline(source, cache, 2).await;

    assert_ok!(pipeline.request_batch(1).await);
    assert_eq!(assert_ok!(pipeline.schedule_remaining().await), 4);
    assert_eq!(pipeline.in_flight(), vec![2, 3]);
    assert_eq!(pipeline.queued(), vec![4, 5]);

    assert_eq!(endpoint.next_request().await.unwrap().batch_number(), 2);
    assert_eq!(endpoint.next_request().await.unwrap().batch_number(), 3);

    pipeline
        .handle_response(WorkerResponse::FetchSuccess {
            batch_number: 2,
            data: synthetic_batch_json(2, &[1], 5),
        })
        .await;

    assert_eq!(pipeline.in_flight(), vec![3, 4]);
    assert_eq!(pipeline.queued(), vec![5]);
    assert_eq!(endpoint.next_request().await.unwrap().batch_number(), 4);
}

#[tokio::test]
async fn test_stale_responses_are_ignored() {
    let source = StubSource::with(&[(1, synthetic_batch_json(1, &[0], 3))]);
    let cache = memory_cache().await;
    let (mut pipeline, _endpoint) = detached_pipeline(source, cache, 1).await;

    assert_ok!(pipeline.start().await);
    assert_eq!(pipeline.in_flight(), vec![2]);

    // Batch 3 is queued, not in flight.
    let early = WorkerResponse::FetchSuccess {
        batch_number: 3,
        data: synthetic_batch_json(3, &[2], 3),
    };
    assert_eq!(pipeline.handle_response(early).await, ResponseOutcome::Ignored);

    pipeline.clear();
    let late = WorkerResponse::FetchSuccess {
        batch_number: 2,
        data: synthetic_batch_json(2, &[1], 3),
    };
    assert_eq!(pipeline.handle_response(late).await, ResponseOutcome::Ignored);
    assert!(pipeline.reader().is_empty());
    assert_eq!(pipeline.load_state(), LoadState::Idle);
}

#[tokio::test]
async fn test_first_writer_wins_across_batches() {
    let source = StubSource::with(&[(1, synthetic_batch_json(1, &[0, 1], 2))]);
    let cache = memory_cache().await;
    cache
        .set(2, &SyntheticBatch::new(2, 2, &[1, 2]).with_offset(500.0).to_json())
        .await
        .unwrap();
    let (mut pipeline, _endpoint) = detached_pipeline(source, cache, 2).await;

    assert_ok!(pipeline.request_batch(1).await);
    assert_ok!(pipeline.request_batch(2).await);

    let reader = pipeline.reader();
    let snapshot = reader.snapshot();
    let scales = snapshot.scales();
    assert_eq!(snapshot.time_indices(), vec![0, 1, 2]);

    let kept = snapshot.timestep_at(1).unwrap();
    assert_eq!(kept.value("T2", 0, &scales), Some(t2_raw(1, 0, 0.0) as f64 / 10.0));
    let added = snapshot.timestep_at(2).unwrap();
    assert_eq!(added.value("T2", 0, &scales), Some(t2_raw(2, 0, 500.0) as f64 / 10.0));
}

#[tokio::test]
async fn test_requests_before_initialization_are_rejected() {
    let source = StubSource::with(&[]);
    let cache = memory_cache().await;
    let (mut pipeline, _endpoint) = detached_pipeline(source, cache, 2).await;

    assert!(matches!(
        pipeline.request_batch(2).await,
        Err(IngestionError::NotInitialized)
    ));
    assert!(matches!(
        pipeline.request_batch(0).await,
        Err(IngestionError::InvalidBatchNumber(0))
    ));
}

#[tokio::test]
async fn test_spawned_worker_completes_dataset_and_writes_cache() {
    let source = StubSource::with(&[
        (1, synthetic_batch_json(1, &[0, 1], 3)),
        (2, synthetic_batch_json(2, &[2, 3], 3)),
        (3, synthetic_batch_json(3, &[4, 5], 3)),
    ]);
    let cache = memory_cache().await;
    let mut pipeline = BatchIngestionPipeline::spawn(config(2), cache.clone(), source.clone());

    assert_ok!(pipeline.start().await);
    pipeline.run_until_idle().await;

    let descriptor = pipeline.descriptor().unwrap();
    assert!(descriptor.is_complete());
    assert_eq!(descriptor.loaded_batches(), vec![1, 2, 3]);
    assert_eq!(pipeline.reader().time_indices(), vec![0, 1, 2, 3, 4, 5]);
    assert_eq!(source.calls(), 3);

    for n in 1..=3 {
        assert!(cache.get(n).await.is_some(), "batch {} not cached", n);
    }
}
