//! Quantization implementation for JPEG 1.
//! Handles quantization tables and the quantization of DCT coefficients.
//! All tables here are in natural (row-major) order.

use crate::constants::{MAXIMUM_QUALITY, MINIMUM_QUALITY};
use crate::jpeg1::dct::BLOCK_DIM;

/// Standard JPEG luminance quantization table (Quality 50).
#[rustfmt::skip]
pub const STD_LUMINANCE_QUANT_TABLE: [u8; BLOCK_DIM] = [
    16, 11, 10, 16, 24, 40, 51, 61,
    12, 12, 14, 19, 26, 58, 60, 55,
    14, 13, 16, 24, 40, 57, 69, 56,
    14, 17, 22, 29, 51, 87, 80, 62,
    18, 22, 37, 56, 68, 109, 103, 77,
    24, 35, 55, 64, 81, 104, 113, 92,
    49, 64, 78, 87, 103, 121, 120, 101,
    72, 92, 95, 98, 112, 100, 103, 99,
];

/// Standard JPEG chrominance quantization table (Quality 50).
#[rustfmt::skip]
pub const STD_CHROMINANCE_QUANT_TABLE: [u8; BLOCK_DIM] = [
    17, 18, 24, 47, 99, 99, 99, 99,
    18, 21, 26, 66, 99, 99, 99, 99,
    24, 26, 56, 99, 99, 99, 99, 99,
    47, 66, 99, 99, 99, 99, 99, 99,
    99, 99, 99, 99, 99, 99, 99, 99,
    99, 99, 99, 99, 99, 99, 99, 99,
    99, 99, 99, 99, 99, 99, 99, 99,
    99, 99, 99, 99, 99, 99, 99, 99,
];

/// Largest AC magnitude representable by the baseline Huffman categories.
const MAXIMUM_AC_MAGNITUDE: f32 = 1023.0;

/// Quantizes DCT coefficients using a quantization table.
pub fn quantize_block(dct_block: &[f32; BLOCK_DIM], quant_table: &[u8; BLOCK_DIM], output: &mut [i16; BLOCK_DIM]) {
    for i in 0..BLOCK_DIM {
        let q_val = quant_table[i] as f32;
        output[i] = (dct_block[i] / q_val)
            .round()
            .clamp(-MAXIMUM_AC_MAGNITUDE, MAXIMUM_AC_MAGNITUDE) as i16;
    }
}

/// De-quantizes DCT coefficients.
pub fn dequantize_block(quant_block: &[i16; BLOCK_DIM], quant_table: &[u16; BLOCK_DIM], output: &mut [f32; BLOCK_DIM]) {
    for i in 0..BLOCK_DIM {
        output[i] = quant_block[i] as f32 * quant_table[i] as f32;
    }
}

/// Scales a quantization table by a quality factor; values outside 1-100 are clamped.
pub fn get_scaled_quant_table(base_table: &[u8; BLOCK_DIM], quality: u8) -> [u8; BLOCK_DIM] {
    let quality = quality.clamp(MINIMUM_QUALITY, MAXIMUM_QUALITY) as u32;
    let mut scaled_table = [0u8; BLOCK_DIM];
    let s = if quality < 50 { 5000 / quality } else { 200 - 2 * quality };

    for i in 0..BLOCK_DIM {
        let val = (base_table[i] as u32 * s + 50) / 100;
        scaled_table[i] = val.clamp(1, 255) as u8;
    }
    scaled_table
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quality_50_is_identity() {
        assert_eq!(get_scaled_quant_table(&STD_LUMINANCE_QUANT_TABLE, 50), STD_LUMINANCE_QUANT_TABLE);
    }

    #[test]
    fn test_quality_extremes() {
        assert!(get_scaled_quant_table(&STD_LUMINANCE_QUANT_TABLE, 100).iter().all(|&q| q == 1));
        let worst = get_scaled_quant_table(&STD_CHROMINANCE_QUANT_TABLE, 1);
        assert!(worst.iter().all(|&q| q == 255));
        // Zero is treated as the lowest quality instead of dividing by zero.
        assert_eq!(get_scaled_quant_table(&STD_CHROMINANCE_QUANT_TABLE, 0), worst);
    }

    #[test]
    fn test_quantize_rounds_and_clamps() {
        let mut block = [0.0f32; BLOCK_DIM];
        block[0] = -1000.0;
        block[1] = 5000.0;
        block[2] = 7.6;
        let mut output = [0i16; BLOCK_DIM];
        quantize_block(&block, &[1; BLOCK_DIM], &mut output);
        assert_eq!(&output[..3], &[-1000, 1023, 8]);
    }
}
