//! Colors and piecewise-linear color ramps.
//!
//! Ramps are defined over a normalized position in `[0, 1]`; the renderer maps
//! data values onto that range before sampling.

use serde::{Deserialize, Serialize};

use crate::{ForecastError, ForecastResult};

/// RGBA color.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "ColorSpec", into = "ColorSpec")]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Color {
    pub const fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 255 }
    }

    pub const fn transparent() -> Self {
        Self::new(0, 0, 0, 0)
    }

    /// Channel-wise linear interpolation; `t` is clamped to `[0, 1]`.
    pub fn lerp(&self, other: &Color, t: f64) -> Color {
        let t = if t.is_nan() { 0.0 } else { t.clamp(0.0, 1.0) };
        let lerp_u8 = |a: u8, b: u8| -> u8 { (a as f64 + (b as f64 - a as f64) * t).round() as u8 };

        Color::new(
            lerp_u8(self.r, other.r),
            lerp_u8(self.g, other.g),
            lerp_u8(self.b, other.b),
            lerp_u8(self.a, other.a),
        )
    }

    /// Same color with alpha scaled by `opacity` (clamped to `[0, 1]`).
    pub fn with_opacity(&self, opacity: f32) -> Color {
        let opacity = opacity.clamp(0.0, 1.0);
        Color::new(self.r, self.g, self.b, (self.a as f32 * opacity).round() as u8)
    }

    /// Parse "#RRGGBB" or "#RRGGBBAA".
    pub fn from_hex(s: &str) -> ForecastResult<Self> {
        let hex = s.trim_start_matches('#');
        let channel = |i: usize| {
            hex.get(i..i + 2)
                .and_then(|c| u8::from_str_radix(c, 16).ok())
                .ok_or_else(|| ForecastError::InvalidRamp(format!("invalid hex color '{}'", s)))
        };

        match hex.len() {
            6 => Ok(Color::rgb(channel(0)?, channel(2)?, channel(4)?)),
            8 => Ok(Color::new(channel(0)?, channel(2)?, channel(4)?, channel(6)?)),
            _ => Err(ForecastError::InvalidRamp(format!(
                "invalid hex color '{}'",
                s
            ))),
        }
    }

    pub fn to_hex(&self) -> String {
        if self.a == 255 {
            format!("#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
        } else {
            format!("#{:02x}{:02x}{:02x}{:02x}", self.r, self.g, self.b, self.a)
        }
    }
}

/// Wire representation of a color in config files.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
enum ColorSpec {
    /// Hex string: "#RRGGBB" or "#RRGGBBAA"
    Hex(String),
    /// RGB array: [r, g, b] or [r, g, b, a]
    Array(Vec<u8>),
}

impl TryFrom<ColorSpec> for Color {
    type Error = ForecastError;

    fn try_from(spec: ColorSpec) -> Result<Self, Self::Error> {
        match spec {
            ColorSpec::Hex(s) => Color::from_hex(&s),
            ColorSpec::Array(arr) => match arr.as_slice() {
                [r, g, b] => Ok(Color::rgb(*r, *g, *b)),
                [r, g, b, a] => Ok(Color::new(*r, *g, *b, *a)),
                _ => Err(ForecastError::InvalidRamp(format!(
                    "color array must have 3 or 4 channels, got {}",
                    arr.len()
                ))),
            },
        }
    }
}

impl From<Color> for ColorSpec {
    fn from(color: Color) -> Self {
        ColorSpec::Hex(color.to_hex())
    }
}

/// A color stop at a normalized position.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ColorStop {
    /// Position in `[0, 1]`
    pub position: f64,
    pub color: Color,
}

/// Piecewise-linear color ramp over `[0, 1]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<ColorStop>", into = "Vec<ColorStop>")]
pub struct ColorRamp {
    stops: Vec<ColorStop>,
}

impl ColorRamp {
    /// Build a ramp; stops must be non-empty, within `[0, 1]` and ascending.
    pub fn new(stops: Vec<ColorStop>) -> ForecastResult<Self> {
        if stops.is_empty() {
            return Err(ForecastError::InvalidRamp(
                "ramp needs at least one stop".to_string(),
            ));
        }
        for stop in &stops {
            if !(0.0..=1.0).contains(&stop.position) {
                return Err(ForecastError::InvalidRamp(format!(
                    "stop position {} outside [0, 1]",
                    stop.position
                )));
            }
        }
        if stops.windows(2).any(|w| w[1].position < w[0].position) {
            return Err(ForecastError::InvalidRamp(
                "stop positions must be ascending".to_string(),
            ));
        }
        Ok(Self { stops })
    }

    /// Spread colors evenly from 0 to 1.
    pub fn evenly_spaced(colors: &[Color]) -> ForecastResult<Self> {
        let n = colors.len();
        let stops = colors
            .iter()
            .enumerate()
            .map(|(i, &color)| ColorStop {
                position: if n > 1 { i as f64 / (n - 1) as f64 } else { 0.0 },
                color,
            })
            .collect();
        Self::new(stops)
    }

    pub fn stops(&self) -> &[ColorStop] {
        &self.stops
    }

    pub fn first(&self) -> Color {
        self.stops[0].color
    }

    pub fn last(&self) -> Color {
        self.stops[self.stops.len() - 1].color
    }

    /// Sample the ramp at a normalized position.
    ///
    /// Positions at or below the first stop return the first color, at or
    /// above the last stop the last color.
    pub fn sample(&self, t: f64) -> Color {
        if t.is_nan() || t <= self.stops[0].position {
            return self.first();
        }
        if t >= self.stops[self.stops.len() - 1].position {
            return self.last();
        }

        for pair in self.stops.windows(2) {
            let (low, high) = (&pair[0], &pair[1]);
            if t <= high.position {
                let span = high.position - low.position;
                if span <= 0.0 {
                    return high.color;
                }
                return low.color.lerp(&high.color, (t - low.position) / span);
            }
        }

        self.last()
    }

    /// Temperature ramp (deep purple through dark red).
    pub fn temperature() -> Self {
        Self::from_static(&[
            Color::rgb(25, 0, 76),
            Color::rgb(0, 0, 255),
            Color::rgb(0, 255, 255),
            Color::rgb(0, 255, 0),
            Color::rgb(255, 255, 0),
            Color::rgb(255, 165, 0),
            Color::rgb(255, 0, 0),
            Color::rgb(139, 0, 0),
        ])
    }

    /// Relative humidity ramp (tan through dark blue).
    pub fn humidity() -> Self {
        Self::from_static(&[
            Color::rgb(210, 180, 140),
            Color::rgb(255, 255, 150),
            Color::rgb(173, 255, 47),
            Color::rgb(100, 200, 255),
            Color::rgb(25, 50, 200),
        ])
    }

    /// Wind speed ramp (calm gray through dark red).
    pub fn wind_speed() -> Self {
        Self::from_static(&[
            Color::rgb(200, 200, 200),
            Color::rgb(0, 200, 255),
            Color::rgb(255, 255, 0),
            Color::rgb(255, 165, 0),
            Color::rgb(139, 0, 0),
        ])
    }

    /// Precipitation ramp (pale blue through magenta).
    pub fn precipitation() -> Self {
        Self::from_static(&[
            Color::rgb(200, 230, 255),
            Color::rgb(80, 160, 240),
            Color::rgb(0, 90, 200),
            Color::rgb(120, 0, 200),
            Color::rgb(220, 0, 180),
        ])
    }

    /// Pick a built-in ramp from a variable name.
    pub fn for_variable(variable: &str) -> Self {
        let name = variable.to_ascii_uppercase();
        if name.starts_with('T') {
            Self::temperature()
        } else if name.contains("RH") || name.contains("HUM") || name.starts_with('Q') {
            Self::humidity()
        } else if name.contains("WIND") || name.contains("WS") || name.starts_with('U') || name.starts_with('V') {
            Self::wind_speed()
        } else if name.contains("RAIN") || name.contains("PREC") || name.contains("PCP") {
            Self::precipitation()
        } else {
            Self::temperature()
        }
    }

    fn from_static(colors: &[Color]) -> Self {
        let n = colors.len();
        Self {
            stops: colors
                .iter()
                .enumerate()
                .map(|(i, &color)| ColorStop {
                    position: i as f64 / (n - 1) as f64,
                    color,
                })
                .collect(),
        }
    }
}

impl TryFrom<Vec<ColorStop>> for ColorRamp {
    type Error = ForecastError;

    fn try_from(stops: Vec<ColorStop>) -> Result<Self, Self::Error> {
        ColorRamp::new(stops)
    }
}

impl From<ColorRamp> for Vec<ColorStop> {
    fn from(ramp: ColorRamp) -> Self {
        ramp.stops
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hex_roundtrip() {
        let c = Color::from_hex("#ff8000").unwrap();
        assert_eq!(c, Color::rgb(255, 128, 0));
        assert_eq!(c.to_hex(), "#ff8000");
        assert_eq!(Color::from_hex("#ff800080").unwrap().a, 128);
        assert!(Color::from_hex("#ff80").is_err());
    }

    #[test]
    fn test_lerp_endpoints_are_exact() {
        let a = Color::rgb(10, 20, 30);
        let b = Color::rgb(200, 100, 0);
        assert_eq!(a.lerp(&b, 0.0), a);
        assert_eq!(a.lerp(&b, 1.0), b);
        assert_eq!(a.lerp(&b, 0.5), Color::rgb(105, 60, 15));
    }

    #[test]
    fn test_sample_brackets() {
        let ramp = ColorRamp::new(vec![
            ColorStop { position: 0.0, color: Color::rgb(0, 0, 0) },
            ColorStop { position: 0.25, color: Color::rgb(100, 0, 0) },
            ColorStop { position: 1.0, color: Color::rgb(100, 150, 0) },
        ])
        .unwrap();

        assert_eq!(ramp.sample(0.125), Color::rgb(50, 0, 0));
        assert_eq!(ramp.sample(0.625), Color::rgb(100, 75, 0));
        assert_eq!(ramp.sample(-1.0), Color::rgb(0, 0, 0));
        assert_eq!(ramp.sample(2.0), Color::rgb(100, 150, 0));
    }

    #[test]
    fn test_ramp_validation() {
        assert!(ColorRamp::new(vec![]).is_err());
        assert!(ColorRamp::new(vec![
            ColorStop { position: 0.6, color: Color::rgb(0, 0, 0) },
            ColorStop { position: 0.2, color: Color::rgb(0, 0, 0) },
        ])
        .is_err());
    }

    #[test]
    fn test_ramp_from_json() {
        let json = r##"[{"position": 0.0, "color": "#000000"}, {"position": 1.0, "color": [255, 255, 255]}]"##;
        let ramp: ColorRamp = serde_json::from_str(json).unwrap();
        assert_eq!(ramp.first(), Color::rgb(0, 0, 0));
        assert_eq!(ramp.last(), Color::rgb(255, 255, 255));
    }

    #[test]
    fn test_for_variable() {
        assert_eq!(ColorRamp::for_variable("T2"), ColorRamp::temperature());
        assert_eq!(ColorRamp::for_variable("RH2"), ColorRamp::humidity());
        assert_eq!(ColorRamp::for_variable("WIND10"), ColorRamp::wind_speed());
        assert_eq!(ColorRamp::for_variable("RAINNC"), ColorRamp::precipitation());
    }
}
