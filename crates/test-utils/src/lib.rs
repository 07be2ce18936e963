//! Fixtures shared by the forecast player test suites.
//!
//! Synthetic batch payloads come from [`generators`], grids and viewports
//! from [`fixtures`]. Pull it in as a dev-dependency and import from the
//! crate root.

pub mod fixtures;
pub mod generators;

pub use fixtures::*;
pub use generators::*;

/// Assert that two numbers differ by at most `tolerance`.
///
/// Both sides are widened to `f64` first, so progress fractions, value
/// ranges and fade factors can be compared without casts at the call site.
#[macro_export]
macro_rules! assert_approx_eq {
    ($actual:expr, $expected:expr, $tolerance:expr) => {{
        let actual = $actual as f64;
        let expected = $expected as f64;
        let tolerance = $tolerance as f64;
        assert!(
            (actual - expected).abs() <= tolerance,
            "{} = {} is not within {} of {}",
            stringify!($actual),
            actual,
            tolerance,
            expected
        );
    }};
}
