//! Cross-fade compositing of two raster frames.

use rayon::prelude::*;

use crate::error::{RenderError, Result};
use crate::raster::RasterFrame;

/// Composite `to` at opacity `progress` over `from` at opacity
/// `1 - progress`. Both frames must have the same size.
pub fn cross_fade(from: &RasterFrame, to: &RasterFrame, progress: f32) -> Result<Vec<u8>> {
    if (from.width, from.height) != (to.width, to.height) {
        return Err(RenderError::SizeMismatch {
            expected: (from.width, from.height),
            actual: (to.width, to.height),
        });
    }
    let expected = from.width * from.height * 4;
    for frame in [from, to] {
        if frame.pixels.len() != expected {
            return Err(RenderError::BufferLength {
                expected,
                actual: frame.pixels.len(),
            });
        }
    }

    let t = if progress.is_nan() { 0.0 } else { progress.clamp(0.0, 1.0) };
    let mut out = vec![0u8; expected];

    out.par_chunks_exact_mut(4)
        .zip(from.pixels.par_chunks_exact(4))
        .zip(to.pixels.par_chunks_exact(4))
        .for_each(|((dst, a), b)| blend_pixel(dst, a, b, t));

    Ok(out)
}

fn blend_pixel(dst: &mut [u8], from: &[u8], to: &[u8], t: f32) {
    let alpha_from = from[3] as f32 / 255.0 * (1.0 - t);
    let alpha_to = to[3] as f32 / 255.0 * t;
    let alpha = alpha_to + alpha_from * (1.0 - alpha_to);

    if alpha <= 0.0 {
        dst.fill(0);
        return;
    }

    for c in 0..3 {
        let value = (to[c] as f32 * alpha_to + from[c] as f32 * alpha_from * (1.0 - alpha_to)) / alpha;
        dst[c] = value.round().clamp(0.0, 255.0) as u8;
    }
    dst[3] = (alpha * 255.0).round() as u8;
}

#[cfg(test)]
mod tests {
    use super::*;
    use forecast_common::BoundingBox;

    fn solid(rgba: [u8; 4]) -> RasterFrame {
        let mut frame = RasterFrame::blank(2, 2, BoundingBox::new(0.0, 0.0, 1.0, 1.0), 4.0);
        for px in frame.pixels.chunks_exact_mut(4) {
            px.copy_from_slice(&rgba);
        }
        frame
    }

    #[test]
    fn test_endpoints_show_one_frame() {
        let red = solid([255, 0, 0, 255]);
        let blue = solid([0, 0, 255, 255]);

        assert_eq!(cross_fade(&red, &blue, 0.0).unwrap(), red.pixels);
        assert_eq!(cross_fade(&red, &blue, 1.0).unwrap(), blue.pixels);
    }

    #[test]
    fn test_midpoint_mixes_colors() {
        let red = solid([255, 0, 0, 255]);
        let blue = solid([0, 0, 255, 255]);
        let mid = cross_fade(&red, &blue, 0.5).unwrap();

        // Blue at 50% over red at 50%: 75% coverage, blue-weighted 2:1.
        assert_eq!(&mid[0..4], &[85, 0, 170, 191]);
    }

    #[test]
    fn test_fade_from_transparent() {
        let empty = solid([0, 0, 0, 0]);
        let green = solid([0, 200, 0, 255]);
        let mid = cross_fade(&empty, &green, 0.5).unwrap();
        assert_eq!(&mid[0..4], &[0, 200, 0, 128]);
    }

    #[test]
    fn test_size_mismatch() {
        let a = solid([0; 4]);
        let b = RasterFrame::blank(3, 2, BoundingBox::new(0.0, 0.0, 1.0, 1.0), 4.0);
        assert!(matches!(
            cross_fade(&a, &b, 0.5),
            Err(RenderError::SizeMismatch { .. })
        ));
    }
}
