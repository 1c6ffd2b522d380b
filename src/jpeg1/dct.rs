//! Discrete Cosine Transform (DCT) implementation for JPEG 1.
//!
//! Both transforms are computed separably (rows, then columns) with the
//! ISO/IEC 10918-1 A.3.3 normalization.

use std::f32::consts::{FRAC_1_SQRT_2, PI};

pub const BLOCK_SIZE: usize = 8;
pub const BLOCK_DIM: usize = BLOCK_SIZE * BLOCK_SIZE;

/// `table[u][x] = C(u) / 2 * cos((2x + 1) * u * PI / 16)`
fn cosine_table() -> [[f32; BLOCK_SIZE]; BLOCK_SIZE] {
    let mut table = [[0.0f32; BLOCK_SIZE]; BLOCK_SIZE];
    for (u, row) in table.iter_mut().enumerate() {
        let scale = if u == 0 { FRAC_1_SQRT_2 } else { 1.0 };
        for (x, value) in row.iter_mut().enumerate() {
            *value = 0.5 * scale * ((((2 * x + 1) * u) as f32 * PI) / 16.0).cos();
        }
    }
    table
}

pub fn fdct_8x8(input: &[f32; BLOCK_DIM], output: &mut [f32; BLOCK_DIM]) {
    let table = cosine_table();
    let mut rows = [0.0f32; BLOCK_DIM];

    for y in 0..BLOCK_SIZE {
        for v in 0..BLOCK_SIZE {
            rows[y * BLOCK_SIZE + v] = (0..BLOCK_SIZE)
                .map(|x| input[y * BLOCK_SIZE + x] * table[v][x])
                .sum();
        }
    }
    for u in 0..BLOCK_SIZE {
        for v in 0..BLOCK_SIZE {
            output[u * BLOCK_SIZE + v] = (0..BLOCK_SIZE)
                .map(|y| rows[y * BLOCK_SIZE + v] * table[u][y])
                .sum();
        }
    }
}

pub fn idct_8x8_baseline(input: &[f32; BLOCK_DIM], output: &mut [f32; BLOCK_DIM]) {
    let table = cosine_table();
    let mut columns = [0.0f32; BLOCK_DIM];

    for y in 0..BLOCK_SIZE {
        for v in 0..BLOCK_SIZE {
            columns[y * BLOCK_SIZE + v] = (0..BLOCK_SIZE)
                .map(|u| input[u * BLOCK_SIZE + v] * table[u][y])
                .sum();
        }
    }
    for y in 0..BLOCK_SIZE {
        for x in 0..BLOCK_SIZE {
            output[y * BLOCK_SIZE + x] = (0..BLOCK_SIZE)
                .map(|v| columns[y * BLOCK_SIZE + v] * table[v][x])
                .sum();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fdct_idct_dc_only() {
        let input = [-128.0f32; 64];
        let mut dct_coeffs = [0.0f32; 64];
        fdct_8x8(&input, &mut dct_coeffs);
        assert!((dct_coeffs[0] + 1024.0).abs() < 0.01);
        assert!(dct_coeffs[1..].iter().all(|c| c.abs() < 0.01));

        let mut output = [0.0f32; 64];
        idct_8x8_baseline(&dct_coeffs, &mut output);

        for i in 0..64 {
            assert!((input[i] - output[i]).abs() < 0.1, "Mismatch at {}: {} vs {}", i, input[i], output[i]);
        }
    }

    #[test]
    fn test_fdct_idct_gradient() {
        let mut input = [0.0f32; 64];
        for (i, value) in input.iter_mut().enumerate() {
            *value = ((i % 8) * 20) as f32 - 70.0 + (i / 8) as f32;
        }
        let mut dct_coeffs = [0.0f32; 64];
        fdct_8x8(&input, &mut dct_coeffs);
        let mut output = [0.0f32; 64];
        idct_8x8_baseline(&dct_coeffs, &mut output);

        for i in 0..64 {
            assert!((input[i] - output[i]).abs() < 0.01, "Mismatch at {}: {} vs {}", i, input[i], output[i]);
        }
    }
}
