//! Rasterizer configuration.

use std::collections::BTreeMap;

use forecast_common::{Color, ColorRamp};
use serde::Deserialize;

use crate::gradient::NO_DATA_COLOR;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RasterConfig {
    /// Opacity applied to every filled cell
    pub opacity: f32,
    /// Color ramp per variable name; unlisted variables get a built-in ramp
    pub ramps: BTreeMap<String, ColorRamp>,
    /// Fill for cells with a missing or non-finite value
    pub no_data_color: Color,
    /// Cells this small on screen (in pixels) are skipped
    pub min_cell_pixels: f64,
    /// Hover queries below this zoom return nothing
    pub hover_min_zoom: f64,
}

impl Default for RasterConfig {
    fn default() -> Self {
        Self {
            opacity: 0.7,
            ramps: BTreeMap::new(),
            no_data_color: NO_DATA_COLOR,
            min_cell_pixels: 0.1,
            hover_min_zoom: 10.0,
        }
    }
}

impl RasterConfig {
    pub fn ramp_for(&self, variable: &str) -> ColorRamp {
        self.ramps
            .get(variable)
            .cloned()
            .unwrap_or_else(|| ColorRamp::for_variable(variable))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_configured_ramp_overrides_builtin() {
        let config: RasterConfig = serde_json::from_str(
            r##"{"opacity": 0.5, "ramps": {"T2": [
                {"position": 0.0, "color": "#000000"},
                {"position": 1.0, "color": "#ffffff"}
            ]}}"##,
        )
        .unwrap();

        assert_eq!(config.opacity, 0.5);
        assert_eq!(config.ramp_for("T2").last(), Color::rgb(255, 255, 255));
        assert_eq!(config.ramp_for("RH2"), ColorRamp::humidity());
        assert_eq!(config.hover_min_zoom, 10.0);
    }
}
