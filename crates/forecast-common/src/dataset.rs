//! Per-timestep variable grids and their scale factors.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::{ForecastError, ForecastResult, GridGeometry};

/// Divisors converting stored values into physical units.
///
/// Variables without an entry use a divisor of 1.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VariableScale(BTreeMap<String, f64>);

impl VariableScale {
    pub fn new(scales: BTreeMap<String, f64>) -> Self {
        Self(scales)
    }

    /// Divisor for a variable.
    pub fn scale_of(&self, variable: &str) -> f64 {
        self.0.get(variable).copied().unwrap_or(1.0)
    }

    /// Convert a raw stored value to physical units.
    pub fn apply(&self, variable: &str, raw: f64) -> f64 {
        raw / self.scale_of(variable)
    }

    /// Every divisor must be finite and non-zero.
    pub fn validate(&self) -> ForecastResult<()> {
        for (variable, &value) in &self.0 {
            if !value.is_finite() || value == 0.0 {
                return Err(ForecastError::InvalidScale {
                    variable: variable.clone(),
                    value,
                });
            }
        }
        Ok(())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.0.iter().map(|(k, v)| (k.as_str(), *v))
    }
}

/// Values of one variable over the whole grid for one timestep.
///
/// JSON `null` entries deserialize to `None` (missing value). Vector variables
/// arrive as a pair of arrays `[[u...], [v...]]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum VariableData {
    Scalar(Vec<Option<f32>>),
    Vector([Vec<Option<f32>>; 2]),
}

impl VariableData {
    /// Number of cells covered. For vectors this is the shorter component.
    pub fn len(&self) -> usize {
        match self {
            VariableData::Scalar(values) => values.len(),
            VariableData::Vector([u, v]) => u.len().min(v.len()),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_vector(&self) -> bool {
        matches!(self, VariableData::Vector(_))
    }

    /// Raw value at a flat index; vectors yield their magnitude.
    pub fn raw_at(&self, index: usize) -> Option<f64> {
        let value = match self {
            VariableData::Scalar(values) => values.get(index).copied().flatten()? as f64,
            VariableData::Vector([u, v]) => {
                let u = u.get(index).copied().flatten()? as f64;
                let v = v.get(index).copied().flatten()? as f64;
                u.hypot(v)
            }
        };
        value.is_finite().then_some(value)
    }

    /// Check that every component has exactly `expected` values.
    pub fn validate_len(&self, variable: &str, expected: usize) -> ForecastResult<()> {
        let lengths: &[usize] = match self {
            VariableData::Scalar(values) => &[values.len()],
            VariableData::Vector([u, v]) => &[u.len(), v.len()],
        };
        for &actual in lengths {
            if actual != expected {
                return Err(ForecastError::LengthMismatch {
                    variable: variable.to_string(),
                    expected,
                    actual,
                });
            }
        }
        Ok(())
    }
}

/// All variable grids for one forecast time index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimestepRecord {
    pub time: i64,
    pub variables: BTreeMap<String, VariableData>,
}

impl TimestepRecord {
    pub fn new(time: i64, variables: BTreeMap<String, VariableData>) -> Self {
        Self { time, variables }
    }

    /// Scaled value of `variable` at a flat cell index.
    ///
    /// Missing variables, missing cells and non-finite values all yield `None`.
    pub fn value(&self, variable: &str, index: usize, scales: &VariableScale) -> Option<f64> {
        let raw = self.variables.get(variable)?.raw_at(index)?;
        let scaled = scales.apply(variable, raw);
        scaled.is_finite().then_some(scaled)
    }

    /// Check every variable against the grid size.
    pub fn validate(&self, geometry: &GridGeometry) -> ForecastResult<()> {
        let expected = geometry.len();
        for (name, data) in &self.variables {
            data.validate_len(name, expected)?;
        }
        Ok(())
    }
}
