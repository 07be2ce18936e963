//! The merged, time-ordered forecast dataset.
//!
//! [`TimeSeriesStore`] is the only handle that can write, and it is not
//! `Clone`, so exactly one owner (the ingestion pipeline) mutates the data.
//! Everyone else holds a [`TimeSeriesReader`]. Writes build a complete new
//! [`DatasetSnapshot`] and swap it in, so a reader always sees a whole
//! dataset, never a half-merged one.

use std::sync::{Arc, RwLock};

use forecast_common::{GridGeometry, TimestepRecord, VariableScale};
use tokio::sync::watch;
use tracing::debug;

use crate::merge::{merge_time_series, MergeStats};

/// Immutable view of the dataset at one version.
#[derive(Debug, Clone, Default)]
pub struct DatasetSnapshot {
    /// Increments on every change
    pub version: u64,
    /// Increments when the dataset is replaced or cleared
    pub generation: u64,
    geometry: Option<Arc<GridGeometry>>,
    scales: Arc<VariableScale>,
    timesteps: Vec<Arc<TimestepRecord>>,
}

impl DatasetSnapshot {
    /// Record for a time index, if loaded.
    pub fn timestep_at(&self, time: i64) -> Option<Arc<TimestepRecord>> {
        self.position_of(time).map(|i| self.timesteps[i].clone())
    }

    /// Record at a position in the ordered series.
    pub fn timestep_by_position(&self, position: usize) -> Option<Arc<TimestepRecord>> {
        self.timesteps.get(position).cloned()
    }

    /// Position of a time index in the ordered series.
    pub fn position_of(&self, time: i64) -> Option<usize> {
        self.timesteps.binary_search_by_key(&time, |r| r.time).ok()
    }

    /// Loaded time indices, ascending.
    pub fn time_indices(&self) -> Vec<i64> {
        self.timesteps.iter().map(|r| r.time).collect()
    }

    pub fn timesteps(&self) -> &[Arc<TimestepRecord>] {
        &self.timesteps
    }

    pub fn geometry(&self) -> Option<Arc<GridGeometry>> {
        self.geometry.clone()
    }

    pub fn scales(&self) -> Arc<VariableScale> {
        self.scales.clone()
    }

    pub fn scale_of(&self, variable: &str) -> f64 {
        self.scales.scale_of(variable)
    }

    /// Variable names present in any loaded timestep, sorted.
    pub fn variables(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .timesteps
            .iter()
            .flat_map(|r| r.variables.keys().cloned())
            .collect();
        names.sort();
        names.dedup();
        names
    }

    pub fn len(&self) -> usize {
        self.timesteps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timesteps.is_empty()
    }
}

struct Shared {
    current: RwLock<Arc<DatasetSnapshot>>,
    changes: watch::Sender<u64>,
}

impl Shared {
    fn load(&self) -> Arc<DatasetSnapshot> {
        self.current
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    fn replace(&self, snapshot: DatasetSnapshot) {
        let version = snapshot.version;
        *self
            .current
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = Arc::new(snapshot);
        self.changes.send_replace(version);
    }
}

/// Writer handle for the dataset.
pub struct TimeSeriesStore {
    shared: Arc<Shared>,
}

impl Default for TimeSeriesStore {
    fn default() -> Self {
        Self::new()
    }
}

impl TimeSeriesStore {
    pub fn new() -> Self {
        let (changes, _) = watch::channel(0);
        Self {
            shared: Arc::new(Shared {
                current: RwLock::new(Arc::new(DatasetSnapshot::default())),
                changes,
            }),
        }
    }

    /// A read-only handle sharing this store's data.
    pub fn reader(&self) -> TimeSeriesReader {
        TimeSeriesReader {
            shared: self.shared.clone(),
        }
    }

    pub fn snapshot(&self) -> Arc<DatasetSnapshot> {
        self.shared.load()
    }

    /// Replace the dataset with a fresh one built from its first batch.
    pub fn initialize(
        &mut self,
        geometry: GridGeometry,
        scales: VariableScale,
        records: Vec<TimestepRecord>,
    ) -> MergeStats {
        let previous = self.shared.load();
        let (timesteps, stats) = merge_time_series(&[], records);

        self.shared.replace(DatasetSnapshot {
            version: previous.version + 1,
            generation: previous.generation + 1,
            geometry: Some(Arc::new(geometry)),
            scales: Arc::new(scales),
            timesteps,
        });

        debug!(timesteps = stats.total, "Initialized time series");
        stats
    }

    /// Merge records into the current dataset (first writer wins).
    pub fn merge(&mut self, records: Vec<TimestepRecord>) -> MergeStats {
        let previous = self.shared.load();
        let (timesteps, stats) = merge_time_series(previous.timesteps(), records);

        if stats.inserted > 0 {
            self.shared.replace(DatasetSnapshot {
                version: previous.version + 1,
                generation: previous.generation,
                geometry: previous.geometry.clone(),
                scales: previous.scales.clone(),
                timesteps,
            });
        }

        debug!(
            inserted = stats.inserted,
            duplicates = stats.duplicates,
            total = stats.total,
            "Merged timesteps"
        );
        stats
    }

    /// Drop the whole dataset.
    pub fn clear(&mut self) {
        let previous = self.shared.load();
        self.shared.replace(DatasetSnapshot {
            version: previous.version + 1,
            generation: previous.generation + 1,
            ..DatasetSnapshot::default()
        });
    }
}

/// Read-only handle to the dataset.
#[derive(Clone)]
pub struct TimeSeriesReader {
    shared: Arc<Shared>,
}

impl TimeSeriesReader {
    /// Current snapshot; cheap, and stable for as long as it is held.
    pub fn snapshot(&self) -> Arc<DatasetSnapshot> {
        self.shared.load()
    }

    /// Receiver that is notified with the new version after every change.
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.shared.changes.subscribe()
    }

    pub fn timestep_at(&self, time: i64) -> Option<Arc<TimestepRecord>> {
        self.snapshot().timestep_at(time)
    }

    pub fn time_indices(&self) -> Vec<i64> {
        self.snapshot().time_indices()
    }

    pub fn geometry(&self) -> Option<Arc<GridGeometry>> {
        self.snapshot().geometry()
    }

    pub fn scale_of(&self, variable: &str) -> f64 {
        self.snapshot().scale_of(variable)
    }

    pub fn variables(&self) -> Vec<String> {
        self.snapshot().variables()
    }

    pub fn version(&self) -> u64 {
        self.snapshot().version
    }

    pub fn len(&self) -> usize {
        self.snapshot().len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshot().is_empty()
    }
}
