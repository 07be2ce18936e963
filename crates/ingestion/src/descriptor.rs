//! Batch bookkeeping and load state.

use std::collections::BTreeSet;

use chrono::NaiveDateTime;
use forecast_common::ForecastTimeRange;
use serde::Serialize;
use tracing::debug;

use crate::payload::BatchMetadata;

/// Loading state of the initial batch, as seen by the UI.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
#[serde(tag = "state", content = "message", rename_all = "snake_case")]
pub enum LoadState {
    /// Nothing requested yet, or the dataset was cleared
    #[default]
    Idle,
    /// Batch 1 is being fetched; the data view is blocked
    Loading,
    /// Batch 1 is merged; background batches may still be arriving
    Ready,
    /// Batch 1 could not be loaded; retry is offered
    Failed(String),
}

impl LoadState {
    pub fn is_loading(&self) -> bool {
        matches!(self, LoadState::Loading)
    }
}

/// What the dataset declares about itself and which batches have arrived.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchDescriptor {
    /// Most recently merged batch
    pub batch_number: u32,
    pub total_batches: u32,
    pub total_timesteps: usize,
    pub batch_size: u32,
    pub start_timestamp: String,
    pub end_timestamp: String,
    loaded_batches: BTreeSet<u32>,
    time_range: Option<ForecastTimeRange>,
}

impl BatchDescriptor {
    pub fn from_metadata(batch_number: u32, metadata: &BatchMetadata) -> Self {
        let time_range = match ForecastTimeRange::parse(
            &metadata.initial_timestamp,
            &metadata.final_timestamp,
            metadata.total_timestamps,
        ) {
            Ok(range) => Some(range),
            Err(e) => {
                debug!(error = %e, "Batch metadata has no usable time range");
                None
            }
        };

        Self {
            batch_number,
            total_batches: metadata.batch_info.total_batches,
            total_timesteps: metadata.total_timestamps,
            batch_size: metadata.batch_info.batch_size,
            start_timestamp: metadata.initial_timestamp.clone(),
            end_timestamp: metadata.final_timestamp.clone(),
            loaded_batches: BTreeSet::new(),
            time_range,
        }
    }

    /// Record a merged batch. Returns false if it was already recorded.
    pub fn mark_loaded(&mut self, batch_number: u32) -> bool {
        self.batch_number = batch_number;
        self.loaded_batches.insert(batch_number)
    }

    pub fn is_loaded(&self, batch_number: u32) -> bool {
        self.loaded_batches.contains(&batch_number)
    }

    /// Loaded batch numbers, ascending.
    pub fn loaded_batches(&self) -> Vec<u32> {
        self.loaded_batches.iter().copied().collect()
    }

    /// Declared batches that have not been merged yet, ascending.
    pub fn missing_batches(&self) -> Vec<u32> {
        (1..=self.total_batches)
            .filter(|n| !self.loaded_batches.contains(n))
            .collect()
    }

    pub fn is_complete(&self) -> bool {
        self.loaded_batches.len() as u32 >= self.total_batches
    }

    /// Fraction of declared batches merged, in `[0, 1]`.
    pub fn progress(&self) -> f64 {
        if self.total_batches == 0 {
            return 1.0;
        }
        (self.loaded_batches.len() as f64 / self.total_batches as f64).min(1.0)
    }

    /// Wall-clock valid time of a time index, when the metadata allows it.
    pub fn valid_time(&self, time_index: i64) -> Option<NaiveDateTime> {
        self.time_range?.valid_time(time_index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::payload::BatchInfo;
    use forecast_common::VariableScale;
    use test_utils::assert_approx_eq;

    fn metadata(total_batches: u32) -> BatchMetadata {
        BatchMetadata {
            variable_scales: VariableScale::default(),
            batch_info: BatchInfo {
                total_batches,
                batch_size: 4,
            },
            total_timestamps: 12,
            initial_timestamp: "2024-07-01_00:00:00".to_string(),
            final_timestamp: "2024-07-01_11:00:00".to_string(),
        }
    }

    #[test]
    fn test_loaded_batches_sorted_and_unique() {
        let mut desc = BatchDescriptor::from_metadata(1, &metadata(3));
        assert!(desc.mark_loaded(3));
        assert!(desc.mark_loaded(1));
        assert!(!desc.mark_loaded(3));

        assert_eq!(desc.loaded_batches(), vec![1, 3]);
        assert_eq!(desc.missing_batches(), vec![2]);
        assert!(!desc.is_complete());
        assert_approx_eq!(desc.progress(), 2.0 / 3.0, 1e-9);
    }

    #[test]
    fn test_valid_time_from_metadata() {
        let desc = BatchDescriptor::from_metadata(1, &metadata(3));
        assert_eq!(
            desc.valid_time(5).unwrap().to_string(),
            "2024-07-01 05:00:00"
        );
    }

    #[test]
    fn test_unparseable_timestamps_disable_valid_time() {
        let mut meta = metadata(1);
        meta.initial_timestamp = "yesterday".to_string();
        let desc = BatchDescriptor::from_metadata(1, &meta);
        assert!(desc.valid_time(0).is_none());
        assert_eq!(desc.start_timestamp, "yesterday");
    }

    #[test]
    fn test_oversized_timestep_count_disables_valid_time() {
        let mut meta = metadata(1);
        meta.total_timestamps = 4_294_967_297;
        let desc = BatchDescriptor::from_metadata(1, &meta);
        assert!(desc.valid_time(0).is_none());
        assert!(desc.valid_time(5).is_none());
        assert_eq!(desc.total_timesteps, 4_294_967_297);
    }
}
