//! In-memory JPEG image container.
//!
//! A [`JpegImage`] holds an image as a matrix of [`Sample`]s and produces its
//! compressed JPEG stream and its host bitmap (BMP) stream on demand, caching
//! each until the compression settings change.

pub mod bitmap_source;
pub mod bmp;
pub mod codec_engine;
pub mod compression_settings;
pub mod constants;
pub mod error;
pub mod huffman_patcher;
pub mod jpeg1;
pub mod jpeg_image;
pub mod jpeg_marker_code;
pub mod jpeg_stream_reader;
pub mod jpeg_stream_writer;
pub mod pixel_format;
pub mod sample;
pub mod stream_signature;
pub mod wasm;

use num_enum::{IntoPrimitive, TryFromPrimitive};

pub use bitmap_source::{BitmapCapability, BitmapLoader, Color, HostBitmap};
pub use codec_engine::{BaselineCodec, BitmapSink, CodecEngine, DecodeSink, SampleMatrixSink, SampleSource};
pub use compression_settings::CompressionSettings;
pub use error::{CodecError, JpegImageError};
pub use huffman_patcher::{DEFAULT_HUFFMAN_TABLES, Patched, patch_huffman_tables};
pub use jpeg_image::JpegImage;
pub use pixel_format::{HostPixelFormat, PixelLayout, map_pixel_format};
pub use sample::{Sample, SampleRow};
pub use stream_signature::is_compressed_stream;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, IntoPrimitive, TryFromPrimitive)]
#[repr(u8)]
pub enum Colorspace {
    #[default]
    Unknown = 0,
    Grayscale = 1,
    Rgb = 2,
    YCbCr = 3,
    Cmyk = 4,
    Ycck = 5,
}

impl Colorspace {
    /// Number of components a sample in this colorspace carries, if fixed.
    pub fn component_count(self) -> Option<u8> {
        match self {
            Self::Unknown => None,
            Self::Grayscale => Some(1),
            Self::Rgb | Self::YCbCr => Some(3),
            Self::Cmyk | Self::Ycck => Some(4),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FrameInfo {
    pub width: u32,
    pub height: u32,
    pub bits_per_sample: u8,
    pub component_count: u8,
    pub colorspace: Colorspace,
}
