//! WebAssembly bindings for jpegimage-rs.
//!
//! This module provides JavaScript-compatible functions via wasm-bindgen
//! for use in browsers and Node.js.

#[cfg(target_arch = "wasm32")]
use wasm_bindgen::prelude::*;

#[cfg(target_arch = "wasm32")]
use crate::{CompressionSettings, JpegImage, JpegImageError, Sample, SampleRow};

#[cfg(target_arch = "wasm32")]
fn to_js(error: JpegImageError) -> JsValue {
    JsValue::from_str(&error.to_string())
}

/// Compress raw 8-bit pixels (1 = grayscale, 3 = RGB) into a baseline JPEG.
#[cfg(target_arch = "wasm32")]
#[wasm_bindgen]
pub fn compress(pixels: &[u8], width: u32, height: u32, components: u8, quality: u8) -> Result<Vec<u8>, JsValue> {
    let colorspace = match components {
        1 => crate::Colorspace::Grayscale,
        3 => crate::Colorspace::Rgb,
        _ => return Err(JsValue::from_str("components must be 1 or 3")),
    };
    let row_size = width as usize * components as usize;
    if width == 0 || pixels.len() < row_size * height as usize {
        return Err(JsValue::from_str("pixel buffer is smaller than width * height * components"));
    }

    let rows = pixels
        .chunks_exact(row_size)
        .take(height as usize)
        .map(|row| {
            let samples = row
                .chunks_exact(components as usize)
                .map(|p| Sample::new(&p.iter().map(|&v| v as u16).collect::<Vec<_>>(), 8))
                .collect::<Result<Vec<_>, _>>()?;
            SampleRow::new(samples)
        })
        .collect::<Result<Vec<_>, _>>()
        .map_err(to_js)?;

    let mut image = JpegImage::from_samples(rows, colorspace).map_err(to_js)?;
    let settings = CompressionSettings::default().with_quality(quality);
    let bytes = image.compressed_bytes(&settings).map_err(to_js)?;
    Ok(bytes.to_vec())
}

/// Decompress a JPEG (or re-encode a BMP) into BMP file bytes.
#[cfg(target_arch = "wasm32")]
#[wasm_bindgen]
pub fn decompress(data: &[u8]) -> Result<Vec<u8>, JsValue> {
    let mut image = JpegImage::from_stream(data).map_err(to_js)?;
    let bytes = image.decompressed_bytes().map_err(to_js)?;
    Ok(bytes.to_vec())
}

/// Insert the default Huffman tables into a JPEG that lacks them.
#[cfg(target_arch = "wasm32")]
#[wasm_bindgen]
pub fn patch_huffman_tables(data: &[u8]) -> Vec<u8> {
    crate::huffman_patcher::patch_huffman_tables(data).into_owned()
}

/// Whether `data` starts with the JPEG SOI marker.
#[cfg(target_arch = "wasm32")]
#[wasm_bindgen]
pub fn is_jpeg(data: &[u8]) -> bool {
    crate::is_compressed_stream(data)
}
