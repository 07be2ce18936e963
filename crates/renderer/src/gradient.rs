//! Value-to-color mapping for gridded forecast data.

use forecast_common::{Color, ColorRamp};

/// Fill for cells whose value is missing.
pub const NO_DATA_COLOR: Color = Color::rgb(128, 128, 128);

/// Position of `value` within `[min, max]`, clamped to `[0, 1]`.
///
/// A degenerate range (`min == max`) and non-finite input map to 0.
pub fn normalize(value: f64, min: f64, max: f64) -> f64 {
    let range = max - min;
    if !value.is_finite() || !range.is_finite() || range <= 0.0 {
        return 0.0;
    }
    ((value - min) / range).clamp(0.0, 1.0)
}

/// Color for `value` on `ramp`, scaled so `min` maps to the first stop and
/// `max` to the last.
///
/// Values at or below `min` get the first stop's color, values at or above
/// `max` the last stop's. When `min == max` the first stop's color is always
/// returned.
pub fn interpolate(value: f64, min: f64, max: f64, ramp: &ColorRamp) -> Color {
    if !value.is_finite() || value <= min || max <= min {
        return ramp.first();
    }
    if value >= max {
        return ramp.last();
    }
    ramp.sample(normalize(value, min, max))
}

#[cfg(test)]
mod tests {
    use super::*;
    use forecast_common::ColorStop;

    fn black_to_white() -> ColorRamp {
        ColorRamp::evenly_spaced(&[Color::rgb(0, 0, 0), Color::rgb(255, 255, 255)]).unwrap()
    }

    #[test]
    fn test_boundaries() {
        let ramp = ColorRamp::temperature();
        assert_eq!(interpolate(-5.0, 0.0, 10.0, &ramp), ramp.first());
        assert_eq!(interpolate(0.0, 0.0, 10.0, &ramp), ramp.first());
        assert_eq!(interpolate(10.0, 0.0, 10.0, &ramp), ramp.last());
        assert_eq!(interpolate(99.0, 0.0, 10.0, &ramp), ramp.last());
    }

    #[test]
    fn test_degenerate_range_returns_first() {
        let ramp = ColorRamp::humidity();
        for value in [-1.0, 3.0, 3.0001, 1e9] {
            assert_eq!(interpolate(value, 3.0, 3.0, &ramp), ramp.first());
        }
    }

    #[test]
    fn test_midpoint_is_linear() {
        let ramp = black_to_white();
        assert_eq!(interpolate(5.0, 0.0, 10.0, &ramp), Color::rgb(128, 128, 128));
        assert_eq!(interpolate(2.5, 0.0, 10.0, &ramp), Color::rgb(64, 64, 64));
    }

    #[test]
    fn test_uneven_stops_bracket_correctly() {
        let ramp = ColorRamp::new(vec![
            ColorStop { position: 0.0, color: Color::rgb(0, 0, 0) },
            ColorStop { position: 0.8, color: Color::rgb(200, 0, 0) },
            ColorStop { position: 1.0, color: Color::rgb(200, 200, 0) },
        ])
        .unwrap();

        assert_eq!(interpolate(40.0, 0.0, 100.0, &ramp), Color::rgb(100, 0, 0));
        assert_eq!(interpolate(90.0, 0.0, 100.0, &ramp), Color::rgb(200, 100, 0));
    }

    #[test]
    fn test_nan_maps_to_first() {
        let ramp = black_to_white();
        assert_eq!(interpolate(f64::NAN, 0.0, 1.0, &ramp), ramp.first());
        assert_eq!(normalize(f64::INFINITY, 0.0, 1.0), 0.0);
    }
}
