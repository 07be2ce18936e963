//! Turning one timestep of one variable into georeferenced, scaled cells.

use std::sync::Arc;

use forecast_common::{BoundingBox, GridGeometry, TimestepRecord, VariableScale};
use rayon::prelude::*;

/// Value range used for color mapping.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ValueRange {
    pub min: f64,
    pub max: f64,
}

/// One grid cell ready for drawing and hover lookups.
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessedCell {
    pub row: usize,
    pub col: usize,
    pub bounds: BoundingBox,
    /// Scaled value of the selected variable
    pub value: Option<f64>,
    /// Scaled value of every variable, aligned with [`ProcessedGrid::variables`]
    pub values: Vec<Option<f64>>,
}

/// A timestep prepared for rendering one variable.
#[derive(Debug, Clone)]
pub struct ProcessedGrid {
    pub time: i64,
    pub variable: String,
    pub variables: Arc<[String]>,
    pub cells: Vec<ProcessedCell>,
    /// Min/max of the selected variable over this timestep only; `None` when
    /// it has no finite values
    pub range: Option<ValueRange>,
    pub extent: BoundingBox,
}

impl ProcessedGrid {
    pub fn cell(&self, row: usize, col: usize) -> Option<&ProcessedCell> {
        self.cells.iter().find(|c| c.row == row && c.col == col)
    }
}

/// Compute cell bounds, scaled values and the per-timestep value range.
pub fn process(
    record: &TimestepRecord,
    geometry: &GridGeometry,
    scales: &VariableScale,
    variable: &str,
) -> ProcessedGrid {
    let variables: Arc<[String]> = record.variables.keys().cloned().collect();

    let cells: Vec<ProcessedCell> = (0..geometry.len())
        .into_par_iter()
        .filter_map(|index| {
            let cell = geometry.cell_at(index)?;
            let bounds = geometry.cell_bounds(cell.row, cell.col).ok()?;
            let values = variables
                .iter()
                .map(|name| record.value(name, index, scales))
                .collect();

            Some(ProcessedCell {
                row: cell.row,
                col: cell.col,
                bounds,
                value: record.value(variable, index, scales),
                values,
            })
        })
        .collect();

    let range = value_range(cells.iter().filter_map(|c| c.value));

    ProcessedGrid {
        time: record.time,
        variable: variable.to_string(),
        variables,
        cells,
        range,
        extent: geometry.extent(),
    }
}

fn value_range(values: impl Iterator<Item = f64>) -> Option<ValueRange> {
    values.fold(None, |range, v| match range {
        None => Some(ValueRange { min: v, max: v }),
        Some(r) => Some(ValueRange {
            min: r.min.min(v),
            max: r.max.max(v),
        }),
    })
}
