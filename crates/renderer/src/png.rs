//! PNG encoding for raster frames.
//!
//! Two encodings are produced:
//! - **Indexed PNG (color type 3)** when the image has at most 256 distinct
//!   colors, which is the common case for ramp-colored grids.
//! - **RGBA PNG (color type 6)** otherwise, e.g. mid cross-fade composites.

use std::collections::HashMap;
use std::io::Write;

use flate2::write::ZlibEncoder;
use flate2::Compression;

use crate::error::{RenderError, Result};
use crate::raster::RasterFrame;

const SIGNATURE: [u8; 8] = [137, 80, 78, 71, 13, 10, 26, 10];

/// Maximum colors for indexed PNG
const MAX_PALETTE_SIZE: usize = 256;

/// Encode a rendered frame.
pub fn encode_frame(frame: &RasterFrame) -> Result<Vec<u8>> {
    encode_auto(&frame.pixels, frame.width, frame.height)
}

/// Encode RGBA pixels, choosing indexed output when the palette fits.
pub fn encode_auto(pixels: &[u8], width: usize, height: usize) -> Result<Vec<u8>> {
    check_len(pixels, width, height)?;
    match extract_palette(pixels) {
        Some((palette, indices)) => encode_indexed(&palette, &indices, width, height),
        None => encode_rgba(pixels, width, height),
    }
}

/// Encode RGBA pixels as color type 6.
pub fn encode_rgba(pixels: &[u8], width: usize, height: usize) -> Result<Vec<u8>> {
    check_len(pixels, width, height)?;

    let mut png = SIGNATURE.to_vec();
    write_chunk(&mut png, b"IHDR", &header(width, height, 6));
    write_chunk(&mut png, b"IDAT", &deflate_rows(pixels, width * 4, height)?);
    write_chunk(&mut png, b"IEND", &[]);
    Ok(png)
}

fn encode_indexed(
    palette: &[[u8; 4]],
    indices: &[u8],
    width: usize,
    height: usize,
) -> Result<Vec<u8>> {
    let mut png = SIGNATURE.to_vec();
    write_chunk(&mut png, b"IHDR", &header(width, height, 3));

    let plte: Vec<u8> = palette.iter().flat_map(|c| [c[0], c[1], c[2]]).collect();
    write_chunk(&mut png, b"PLTE", &plte);

    if palette.iter().any(|c| c[3] < 255) {
        let trns: Vec<u8> = palette.iter().map(|c| c[3]).collect();
        write_chunk(&mut png, b"tRNS", &trns);
    }

    write_chunk(&mut png, b"IDAT", &deflate_rows(indices, width, height)?);
    write_chunk(&mut png, b"IEND", &[]);
    Ok(png)
}

fn check_len(pixels: &[u8], width: usize, height: usize) -> Result<()> {
    let expected = width * height * 4;
    if pixels.len() != expected {
        return Err(RenderError::BufferLength {
            expected,
            actual: pixels.len(),
        });
    }
    Ok(())
}

fn header(width: usize, height: usize, color_type: u8) -> Vec<u8> {
    let mut ihdr = Vec::with_capacity(13);
    ihdr.extend_from_slice(&(width as u32).to_be_bytes());
    ihdr.extend_from_slice(&(height as u32).to_be_bytes());
    ihdr.push(8); // bit depth
    ihdr.push(color_type);
    ihdr.extend_from_slice(&[0, 0, 0]); // compression, filter, interlace
    ihdr
}

/// Palette and per-pixel indices, or `None` past 256 colors.
fn extract_palette(pixels: &[u8]) -> Option<(Vec<[u8; 4]>, Vec<u8>)> {
    let mut lookup: HashMap<[u8; 4], u8> = HashMap::with_capacity(MAX_PALETTE_SIZE);
    let mut palette = Vec::with_capacity(MAX_PALETTE_SIZE);
    let mut indices = Vec::with_capacity(pixels.len() / 4);

    for px in pixels.chunks_exact(4) {
        let color = [px[0], px[1], px[2], px[3]];
        let index = match lookup.get(&color) {
            Some(&i) => i,
            None => {
                if palette.len() >= MAX_PALETTE_SIZE {
                    return None;
                }
                let i = palette.len() as u8;
                palette.push(color);
                lookup.insert(color, i);
                i
            }
        };
        indices.push(index);
    }

    Some((palette, indices))
}

/// Zlib-compress scanlines, each prefixed with filter type 0.
fn deflate_rows(data: &[u8], row_bytes: usize, height: usize) -> Result<Vec<u8>> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::fast());
    for row in data.chunks_exact(row_bytes.max(1)).take(height) {
        encoder.write_all(&[0])?;
        encoder.write_all(row)?;
    }
    Ok(encoder.finish()?)
}

fn write_chunk(png: &mut Vec<u8>, kind: &[u8; 4], data: &[u8]) {
    png.extend_from_slice(&(data.len() as u32).to_be_bytes());
    png.extend_from_slice(kind);
    png.extend_from_slice(data);

    let mut hasher = crc32fast::Hasher::new();
    hasher.update(kind);
    hasher.update(data);
    png.extend_from_slice(&hasher.finalize().to_be_bytes());
}
