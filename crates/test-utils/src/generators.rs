//! Synthetic forecast batch generators.
//!
//! Batches carry four variables with predictable values so tests can check
//! exactly what was merged and rendered:
//!
//! - `T2`: scale 10, raw value `2000 + time * 10 + cell + offset`
//! - `RH2`: scale 1, raw value `40 + cell % 50`
//! - `UV10`: vector, `u = 3`, `v = 4` everywhere (magnitude 5)
//! - `PRECIP`: scale 1, cell 0 is missing (`null`), others `cell as f32 / 2`

use serde_json::{json, Value};

pub const INITIAL_TIMESTAMP: &str = "2024-07-01_00:00:00";

/// Raw `T2` value of a cell in a synthetic batch.
pub fn t2_raw(time: i64, cell: usize, offset: f32) -> f32 {
    2000.0 + (time * 10) as f32 + cell as f32 + offset
}

/// Builder for one synthetic batch payload.
#[derive(Debug, Clone)]
pub struct SyntheticBatch {
    pub batch_number: u32,
    pub total_batches: u32,
    pub times: Vec<i64>,
    pub rows: usize,
    pub cols: usize,
    /// `(lat, lon)` of the grid corner
    pub corner: (f64, f64),
    /// `(lat_step, lon_step)` in degrees
    pub steps: (f64, f64),
    pub total_timestamps: usize,
    /// Added to every raw `T2` value
    pub offset: f32,
}

impl SyntheticBatch {
    /// A 3x4 grid at 45N 5E with 0.5 degree cells.
    pub fn new(batch_number: u32, total_batches: u32, times: &[i64]) -> Self {
        Self {
            batch_number,
            total_batches,
            times: times.to_vec(),
            rows: 3,
            cols: 4,
            corner: (45.0, 5.0),
            steps: (0.5, 0.5),
            total_timestamps: total_batches as usize * times.len().max(1),
            offset: 0.0,
        }
    }

    pub fn with_grid(mut self, rows: usize, cols: usize) -> Self {
        self.rows = rows;
        self.cols = cols;
        self
    }

    pub fn with_corner(mut self, lat: f64, lon: f64) -> Self {
        self.corner = (lat, lon);
        self
    }

    pub fn with_offset(mut self, offset: f32) -> Self {
        self.offset = offset;
        self
    }

    fn timestep(&self, time: i64) -> Value {
        let cells = self.rows * self.cols;
        let t2: Vec<f32> = (0..cells).map(|i| t2_raw(time, i, self.offset)).collect();
        let rh2: Vec<f32> = (0..cells).map(|i| 40.0 + (i % 50) as f32).collect();
        let precip: Vec<Value> = (0..cells)
            .map(|i| if i == 0 { Value::Null } else { json!(i as f32 / 2.0) })
            .collect();

        json!({
            "time": time,
            "variables": {
                "T2": t2,
                "RH2": rh2,
                "UV10": [vec![3.0_f32; cells], vec![4.0_f32; cells]],
                "PRECIP": precip,
            }
        })
    }

    pub fn to_value(&self) -> Value {
        let time_series: Vec<Value> = self.times.iter().map(|&t| self.timestep(t)).collect();

        json!({
            "grid_info": {
                "corner": [self.corner.0, self.corner.1],
                "size": [self.rows, self.cols],
                "steps": [self.steps.0, self.steps.1],
            },
            "time_series": time_series,
            "metadata": {
                "variable_scales": {"T2": 10, "RH2": 1, "UV10": 1, "PRECIP": 1},
                "batch_info": {
                    "total_batches": self.total_batches,
                    "batch_size": self.times.len(),
                },
                "total_timestamps": self.total_timestamps,
                "initial_timestamp": INITIAL_TIMESTAMP,
                "final_timestamp": hourly_timestamp(self.total_timestamps.saturating_sub(1)),
            }
        })
    }

    pub fn to_json(&self) -> String {
        self.to_value().to_string()
    }
}

/// JSON text of a default synthetic batch.
pub fn synthetic_batch_json(batch_number: u32, times: &[i64], total_batches: u32) -> String {
    SyntheticBatch::new(batch_number, total_batches, times).to_json()
}

/// Timestamp `hours` after [`INITIAL_TIMESTAMP`] (within July 2024).
pub fn hourly_timestamp(hours: usize) -> String {
    format!("2024-07-{:02}_{:02}:00:00", 1 + hours / 24, hours % 24)
}
