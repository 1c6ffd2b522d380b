// The two leading bytes (SOI marker) of every JPEG interchange stream.
pub const JPEG_SIGNATURE: [u8; 2] = [0xFF, 0xD8];

// Marker signatures searched for by the Huffman table patcher.
pub const DEFINE_HUFFMAN_TABLE_SIGNATURE: [u8; 2] = [0xFF, 0xC4];
pub const START_OF_FRAME_BASELINE_SIGNATURE: [u8; 2] = [0xFF, 0xC0];

pub const MINIMUM_QUALITY: u8 = 1;
pub const MAXIMUM_QUALITY: u8 = 100;
pub const DEFAULT_QUALITY: u8 = 75;
pub const MAXIMUM_SMOOTHING_FACTOR: u8 = 100;

pub const MINIMUM_BITS_PER_COMPONENT: u8 = 1;
pub const MAXIMUM_BITS_PER_COMPONENT: u8 = 16;
pub const MAXIMUM_COMPONENT_COUNT: u8 = 4;

// Baseline JPEG only carries 8-bit samples.
pub const BASELINE_BITS_PER_SAMPLE: u8 = 8;

// The maximum width or height a SOF segment can declare.
pub const MAXIMUM_DIMENSION: u32 = u16::MAX as u32;

// BITMAPFILEHEADER (14 bytes) followed by BITMAPINFOHEADER (40 bytes).
pub const BMP_FILE_HEADER_SIZE: usize = 14;
pub const BMP_INFO_HEADER_SIZE: usize = 40;
pub const BMP_SIGNATURE: [u8; 2] = [b'B', b'M'];
