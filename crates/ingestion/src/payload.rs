//! Wire schema of a forecast batch and its validation.
//!
//! Every payload is validated here before it can reach the store. A payload
//! that fails validation is treated exactly like a failed fetch.

use std::collections::HashSet;

use forecast_common::{GridGeometry, TimestepRecord, VariableScale};
use serde::{Deserialize, Serialize};

use crate::error::{IngestionError, Result};

/// `grid_info` block: corner `[lat, lon]`, size `[rows, cols]`,
/// steps `[lat_step, lon_step]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GridInfo {
    pub corner: [f64; 2],
    pub size: [usize; 2],
    pub steps: [f64; 2],
}

impl GridInfo {
    pub fn geometry(&self) -> forecast_common::ForecastResult<GridGeometry> {
        GridGeometry::new(
            self.corner[0],
            self.corner[1],
            self.size[0],
            self.size[1],
            self.steps[0],
            self.steps[1],
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchInfo {
    pub total_batches: u32,
    pub batch_size: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchMetadata {
    #[serde(default)]
    pub variable_scales: VariableScale,
    pub batch_info: BatchInfo,
    pub total_timestamps: usize,
    pub initial_timestamp: String,
    pub final_timestamp: String,
}

/// One batch as delivered by the forecast API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchPayload {
    pub grid_info: GridInfo,
    pub time_series: Vec<TimestepRecord>,
    pub metadata: BatchMetadata,
}

/// A payload that passed validation.
#[derive(Debug, Clone)]
pub struct ValidatedBatch {
    pub batch_number: u32,
    pub geometry: GridGeometry,
    pub scales: VariableScale,
    /// Records in arrival order with in-batch duplicate times removed
    pub records: Vec<TimestepRecord>,
    pub metadata: BatchMetadata,
}

/// Parse and validate the raw JSON text of batch `batch_number`.
pub fn parse_batch(batch_number: u32, text: &str) -> Result<ValidatedBatch> {
    let payload: BatchPayload =
        serde_json::from_str(text).map_err(|e| IngestionError::malformed(batch_number, e))?;
    validate(batch_number, payload)
}

/// Validate an already deserialized payload.
pub fn validate(batch_number: u32, payload: BatchPayload) -> Result<ValidatedBatch> {
    let geometry = payload
        .grid_info
        .geometry()
        .map_err(|e| IngestionError::from((batch_number, e)))?;

    payload
        .metadata
        .variable_scales
        .validate()
        .map_err(|e| IngestionError::from((batch_number, e)))?;

    let info = &payload.metadata.batch_info;
    if info.total_batches == 0 {
        return Err(IngestionError::malformed(
            batch_number,
            "total_batches must be at least 1",
        ));
    }
    if batch_number > info.total_batches {
        return Err(IngestionError::malformed(
            batch_number,
            format!("batch exceeds declared total of {}", info.total_batches),
        ));
    }

    let mut seen = HashSet::with_capacity(payload.time_series.len());
    let mut records = Vec::with_capacity(payload.time_series.len());
    for record in payload.time_series {
        record
            .validate(&geometry)
            .map_err(|e| IngestionError::from((batch_number, e)))?;
        if seen.insert(record.time) {
            records.push(record);
        }
    }

    Ok(ValidatedBatch {
        batch_number,
        geometry,
        scales: payload.metadata.variable_scales.clone(),
        records,
        metadata: payload.metadata,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payload_json(time_series: &str, total_batches: u32) -> String {
        format!(
            r#"{{
                "grid_info": {{"corner": [45.0, 5.0], "size": [2, 2], "steps": [0.5, 0.5]}},
                "time_series": {},
                "metadata": {{
                    "variable_scales": {{"T2": 10}},
                    "batch_info": {{"total_batches": {}, "batch_size": 2}},
                    "total_timestamps": 4,
                    "initial_timestamp": "2024-07-01_00:00:00",
                    "final_timestamp": "2024-07-01_03:00:00"
                }}
            }}"#,
            time_series, total_batches
        )
    }

    #[test]
    fn test_parse_valid_batch() {
        let json = payload_json(
            r#"[{"time": 0, "variables": {"T2": [1, 2, 3, 4]}},
                {"time": 1, "variables": {"T2": [5, 6, null, 8]}}]"#,
            2,
        );
        let batch = parse_batch(1, &json).unwrap();

        assert_eq!(batch.geometry.len(), 4);
        assert_eq!(batch.records.len(), 2);
        assert_eq!(batch.scales.scale_of("T2"), 10.0);
        assert_eq!(batch.metadata.batch_info.total_batches, 2);
    }

    #[test]
    fn test_rejects_wrong_array_length() {
        let json = payload_json(r#"[{"time": 0, "variables": {"T2": [1, 2, 3]}}]"#, 1);
        assert!(matches!(
            parse_batch(1, &json),
            Err(IngestionError::MalformedPayload { batch: 1, .. })
        ));
    }

    #[test]
    fn test_rejects_overflowing_grid_size() {
        let json = payload_json(r#"[{"time": 0, "variables": {"T2": []}}]"#, 1)
            .replace(r#""size": [2, 2]"#, r#""size": [4294967296, 4294967296]"#);
        assert!(matches!(
            parse_batch(1, &json),
            Err(IngestionError::MalformedPayload { batch: 1, .. })
        ));
    }

    #[test]
    fn test_rejects_batch_beyond_total() {
        let json = payload_json(r#"[]"#, 2);
        assert!(parse_batch(3, &json).is_err());
    }

    #[test]
    fn test_rejects_invalid_json() {
        assert!(matches!(
            parse_batch(2, "{not json"),
            Err(IngestionError::MalformedPayload { batch: 2, .. })
        ));
    }

    #[test]
    fn test_in_batch_duplicate_time_keeps_first() {
        let json = payload_json(
            r#"[{"time": 0, "variables": {"T2": [1, 1, 1, 1]}},
                {"time": 0, "variables": {"T2": [9, 9, 9, 9]}}]"#,
            1,
        );
        let batch = parse_batch(1, &json).unwrap();
        assert_eq!(batch.records.len(), 1);
        assert_eq!(batch.records[0].variables["T2"].raw_at(0), Some(1.0));
    }
}
