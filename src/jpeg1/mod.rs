//! JPEG 1 (Baseline) Implementation (ISO/IEC 10918-1 / ITU-T T.81)
//!
//! This module implements the classic DCT-based baseline JPEG standard.
//!
//! Features:
//! - 8-bit grayscale, YCbCr, and Adobe CMYK/YCCK images.
//! - Huffman coding with standard and custom tables.
//! - Support for Restart Markers (DRI/RSTm).
//! - Interleaved and single-component scans; subsampled input on decode.

pub mod dct;
pub mod decoder;
pub mod encoder;
pub mod huffman;
pub mod quantization;

pub use decoder::Jpeg1Decoder;
pub use encoder::Jpeg1Encoder;
