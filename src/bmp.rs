//! Windows BMP, the host bitmap interchange format.
//!
//! Writing produces BITMAPFILEHEADER + BITMAPINFOHEADER files with bottom-up
//! rows padded to four bytes: 8-bit palettized grayscale or 24-bit BGR.
//! Reading accepts uncompressed (BI_RGB) 8-, 24- and 32-bit files.

use tracing::trace;

use crate::bitmap_source::{BitmapLoader, Color, HostBitmap};
use crate::constants::{BMP_FILE_HEADER_SIZE, BMP_INFO_HEADER_SIZE, BMP_SIGNATURE};
use crate::error::{CodecError, JpegImageError, Result};
use crate::pixel_format::HostPixelFormat;
use crate::{Colorspace, FrameInfo};

const PALETTE_ENTRIES: usize = 256;
const PALETTE_ENTRY_SIZE: usize = 4;
// 2835 pixels per metre is 72 dpi.
const PIXELS_PER_METRE: i32 = 2835;
const BI_RGB: u32 = 0;

fn stride(width: usize, bits_per_pixel: usize) -> usize {
    (width * bits_per_pixel).div_ceil(32) * 4
}

/// Streams decoded rows (top to bottom) into an in-memory BMP file.
pub struct BmpWriter {
    width: usize,
    height: usize,
    colorspace: Colorspace,
    stride: usize,
    pixel_offset: usize,
    data: Vec<u8>,
    rows_written: usize,
}

impl BmpWriter {
    pub fn new(frame_info: &FrameInfo) -> std::result::Result<Self, CodecError> {
        let bits_per_pixel: u16 = match frame_info.colorspace {
            Colorspace::Grayscale => 8,
            Colorspace::Rgb | Colorspace::Cmyk => 24,
            _ => return Err(CodecError::UnsupportedColorspace),
        };
        if frame_info.colorspace.component_count() != Some(frame_info.component_count) {
            return Err(CodecError::UnsupportedComponentCount);
        }
        if frame_info.width == 0 || frame_info.width > i32::MAX as u32 {
            return Err(CodecError::InvalidArgumentWidth);
        }
        if frame_info.height == 0 || frame_info.height > i32::MAX as u32 {
            return Err(CodecError::InvalidArgumentHeight);
        }

        let width = frame_info.width as usize;
        let height = frame_info.height as usize;
        let stride = stride(width, bits_per_pixel as usize);
        let palette_size = if bits_per_pixel == 8 {
            PALETTE_ENTRIES * PALETTE_ENTRY_SIZE
        } else {
            0
        };
        let pixel_offset = BMP_FILE_HEADER_SIZE + BMP_INFO_HEADER_SIZE + palette_size;
        let image_size = stride * height;
        let file_size = pixel_offset + image_size;

        let mut data = Vec::with_capacity(file_size);
        // BITMAPFILEHEADER
        data.extend_from_slice(&BMP_SIGNATURE);
        data.extend_from_slice(&(file_size as u32).to_le_bytes());
        data.extend_from_slice(&[0; 4]); // reserved
        data.extend_from_slice(&(pixel_offset as u32).to_le_bytes());
        // BITMAPINFOHEADER
        data.extend_from_slice(&(BMP_INFO_HEADER_SIZE as u32).to_le_bytes());
        data.extend_from_slice(&(width as i32).to_le_bytes());
        data.extend_from_slice(&(height as i32).to_le_bytes()); // positive = bottom-up
        data.extend_from_slice(&1u16.to_le_bytes()); // planes
        data.extend_from_slice(&bits_per_pixel.to_le_bytes());
        data.extend_from_slice(&BI_RGB.to_le_bytes());
        data.extend_from_slice(&(image_size as u32).to_le_bytes());
        data.extend_from_slice(&PIXELS_PER_METRE.to_le_bytes());
        data.extend_from_slice(&PIXELS_PER_METRE.to_le_bytes());
        let colors_used = if palette_size > 0 { PALETTE_ENTRIES as u32 } else { 0 };
        data.extend_from_slice(&colors_used.to_le_bytes());
        data.extend_from_slice(&0u32.to_le_bytes()); // colors important
        if palette_size > 0 {
            for level in 0..=255u8 {
                data.extend_from_slice(&[level, level, level, 0]);
            }
        }
        data.resize(file_size, 0);

        Ok(Self {
            width,
            height,
            colorspace: frame_info.colorspace,
            stride,
            pixel_offset,
            data,
            rows_written: 0,
        })
    }

    /// Writes the next row of interleaved 8-bit samples.
    pub fn write_row(&mut self, row: &[u8]) -> std::result::Result<(), CodecError> {
        if self.rows_written >= self.height {
            return Err(CodecError::InvalidOperation);
        }
        let components = self.colorspace.component_count().unwrap_or(1) as usize;
        if row.len() < self.width * components {
            return Err(CodecError::NeedMoreData);
        }

        let target_row = self.height - 1 - self.rows_written;
        let start = self.pixel_offset + target_row * self.stride;
        let target = &mut self.data[start..start + self.stride];
        match self.colorspace {
            Colorspace::Grayscale => target[..self.width].copy_from_slice(&row[..self.width]),
            Colorspace::Rgb => {
                for (bgr, rgb) in target.chunks_exact_mut(3).zip(row.chunks_exact(3)) {
                    bgr.copy_from_slice(&[rgb[2], rgb[1], rgb[0]]);
                }
            }
            _ => {
                for (bgr, cmyk) in target.chunks_exact_mut(3).zip(row.chunks_exact(4)) {
                    let [r, g, b] = cmyk_to_rgb(cmyk[0], cmyk[1], cmyk[2], cmyk[3]);
                    bgr.copy_from_slice(&[b, g, r]);
                }
            }
        }
        self.rows_written += 1;
        Ok(())
    }

    pub fn finish(self) -> std::result::Result<Vec<u8>, CodecError> {
        if self.rows_written != self.height {
            return Err(CodecError::NeedMoreData);
        }
        trace!(bytes = self.data.len(), "BMP written");
        Ok(self.data)
    }
}

fn cmyk_to_rgb(c: u8, m: u8, y: u8, k: u8) -> [u8; 3] {
    let ink = |channel: u8| ((255 - channel as u32) * (255 - k as u32) / 255) as u8;
    [ink(c), ink(m), ink(y)]
}

/// A decoded BMP file held as top-down ARGB pixels.
#[derive(Debug, Clone)]
pub struct BmpBitmap {
    width: u32,
    height: u32,
    bits_per_pixel: u16,
    pixels: Vec<Color>,
}

fn le_u16(data: &[u8], offset: usize) -> std::result::Result<u16, CodecError> {
    data.get(offset..offset + 2)
        .map(|b| u16::from_le_bytes([b[0], b[1]]))
        .ok_or(CodecError::NeedMoreData)
}

fn le_u32(data: &[u8], offset: usize) -> std::result::Result<u32, CodecError> {
    data.get(offset..offset + 4)
        .map(|b| u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .ok_or(CodecError::NeedMoreData)
}

impl BmpBitmap {
    pub fn is_bmp(data: &[u8]) -> bool {
        data.len() >= BMP_FILE_HEADER_SIZE && data.starts_with(&BMP_SIGNATURE)
    }

    pub fn parse(data: &[u8]) -> std::result::Result<Self, CodecError> {
        if !Self::is_bmp(data) {
            return Err(CodecError::InvalidBitmap);
        }
        let pixel_offset = le_u32(data, 10)? as usize;
        let header_size = le_u32(data, 14)? as usize;
        if header_size < BMP_INFO_HEADER_SIZE {
            return Err(CodecError::InvalidBitmap);
        }
        let width = le_u32(data, 18)? as i32;
        let height_raw = le_u32(data, 22)? as i32;
        let bits_per_pixel = le_u16(data, 28)?;
        let compression = le_u32(data, 30)?;
        let colors_used = le_u32(data, 46)? as usize;

        if width <= 0 {
            return Err(CodecError::InvalidArgumentWidth);
        }
        if height_raw == 0 || height_raw == i32::MIN {
            return Err(CodecError::InvalidArgumentHeight);
        }
        if compression != BI_RGB || !matches!(bits_per_pixel, 8 | 24 | 32) {
            return Err(CodecError::InvalidBitmap);
        }

        let width = width as usize;
        let top_down = height_raw < 0;
        let height = height_raw.unsigned_abs() as usize;

        let palette = if bits_per_pixel == 8 {
            let entries = if colors_used == 0 { PALETTE_ENTRIES } else { colors_used.min(PALETTE_ENTRIES) };
            let start = BMP_FILE_HEADER_SIZE + header_size;
            let bytes = data
                .get(start..start + entries * PALETTE_ENTRY_SIZE)
                .ok_or(CodecError::NeedMoreData)?;
            bytes.chunks_exact(PALETTE_ENTRY_SIZE).map(|e| Color::rgb(e[2], e[1], e[0])).collect()
        } else {
            Vec::new()
        };

        let stride = stride(width, bits_per_pixel as usize);
        let pixel_data = data
            .get(pixel_offset..)
            .filter(|p| p.len() >= stride * height)
            .ok_or(CodecError::NeedMoreData)?;

        let bytes_per_pixel = bits_per_pixel as usize / 8;
        let mut pixels = Vec::with_capacity(width * height);
        for row in 0..height {
            let source_row = if top_down { row } else { height - 1 - row };
            let line = &pixel_data[source_row * stride..source_row * stride + width * bytes_per_pixel];
            for p in line.chunks_exact(bytes_per_pixel) {
                // 32-bit BI_RGB leaves the fourth byte unused.
                let color = match bytes_per_pixel {
                    1 => palette.get(p[0] as usize).copied().ok_or(CodecError::InvalidBitmap)?,
                    _ => Color::rgb(p[2], p[1], p[0]),
                };
                pixels.push(color);
            }
        }

        Ok(Self {
            width: width as u32,
            height: height as u32,
            bits_per_pixel,
            pixels,
        })
    }
}

impl HostBitmap for BmpBitmap {
    fn width(&self) -> u32 {
        self.width
    }

    fn height(&self) -> u32 {
        self.height
    }

    fn pixel_format(&self) -> HostPixelFormat {
        match self.bits_per_pixel {
            8 => HostPixelFormat::FORMAT_8BPP_INDEXED,
            24 => HostPixelFormat::FORMAT_24BPP_RGB,
            _ => HostPixelFormat::FORMAT_32BPP_RGB,
        }
    }

    fn pixel(&self, x: u32, y: u32) -> Color {
        self.pixels
            .get(y as usize * self.width as usize + x as usize)
            .copied()
            .unwrap_or_default()
    }
}

/// Loads BMP streams; anything else is reported as not supported.
#[derive(Debug, Clone, Copy, Default)]
pub struct BmpLoader;

impl BitmapLoader for BmpLoader {
    fn load(&self, data: &[u8]) -> Result<Box<dyn HostBitmap>> {
        if !BmpBitmap::is_bmp(data) {
            return Err(JpegImageError::NotSupported("stream is neither JPEG nor BMP"));
        }
        Ok(Box::new(BmpBitmap::parse(data)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(width: u32, height: u32, colorspace: Colorspace) -> FrameInfo {
        FrameInfo {
            width,
            height,
            bits_per_sample: 8,
            component_count: colorspace.component_count().unwrap_or(0),
            colorspace,
        }
    }

    #[test]
    fn test_rgb_layout_and_padding() {
        let mut writer = BmpWriter::new(&frame(2, 2, Colorspace::Rgb)).unwrap();
        writer.write_row(&[255, 0, 0, 0, 255, 0]).unwrap();
        writer.write_row(&[0, 0, 255, 10, 20, 30]).unwrap();
        let bmp = writer.finish().unwrap();

        // 2 px * 3 bytes = 6, padded to 8.
        assert_eq!(bmp.len(), 54 + 16);
        assert_eq!(&bmp[..2], b"BM");
        assert_eq!(le_u32(&bmp, 2).unwrap(), 70);
        assert_eq!(le_u32(&bmp, 10).unwrap(), 54);
        assert_eq!(le_u16(&bmp, 28).unwrap(), 24);
        // Bottom-up: the last row written comes first.
        assert_eq!(&bmp[54..62], &[255, 0, 0, 30, 20, 10, 0, 0]);
        assert_eq!(&bmp[62..70], &[0, 0, 255, 0, 255, 0, 0, 0]);
    }

    #[test]
    fn test_grayscale_uses_palette() {
        let mut writer = BmpWriter::new(&frame(3, 1, Colorspace::Grayscale)).unwrap();
        writer.write_row(&[0, 128, 255]).unwrap();
        let bmp = writer.finish().unwrap();
        assert_eq!(le_u32(&bmp, 10).unwrap(), 54 + 1024);
        assert_eq!(&bmp[54 + 4 * 128..54 + 4 * 129], &[128, 128, 128, 0]);
        assert_eq!(&bmp[1078..1082], &[0, 128, 255, 0]);
    }

    #[test]
    fn test_write_parse_roundtrip() {
        let mut writer = BmpWriter::new(&frame(3, 2, Colorspace::Rgb)).unwrap();
        writer.write_row(&[1, 2, 3, 4, 5, 6, 7, 8, 9]).unwrap();
        writer.write_row(&[10, 11, 12, 13, 14, 15, 16, 17, 18]).unwrap();
        let bitmap = BmpBitmap::parse(&writer.finish().unwrap()).unwrap();

        assert_eq!((bitmap.width(), bitmap.height()), (3, 2));
        assert_eq!(bitmap.pixel_format(), HostPixelFormat::FORMAT_24BPP_RGB);
        assert_eq!(bitmap.pixel(0, 0), Color::rgb(1, 2, 3));
        assert_eq!(bitmap.pixel(2, 1), Color::rgb(16, 17, 18));
    }

    #[test]
    fn test_parse_palettized() {
        let mut writer = BmpWriter::new(&frame(2, 1, Colorspace::Grayscale)).unwrap();
        writer.write_row(&[40, 200]).unwrap();
        let bitmap = BmpBitmap::parse(&writer.finish().unwrap()).unwrap();
        assert_eq!(bitmap.pixel_format(), HostPixelFormat::FORMAT_8BPP_INDEXED);
        assert_eq!(bitmap.pixel(1, 0), Color::rgb(200, 200, 200));
    }

    #[test]
    fn test_incomplete_writer_fails() {
        let mut writer = BmpWriter::new(&frame(1, 2, Colorspace::Grayscale)).unwrap();
        writer.write_row(&[1]).unwrap();
        assert_eq!(writer.finish().unwrap_err(), CodecError::NeedMoreData);
    }

    #[test]
    fn test_cmyk_rows_are_converted() {
        let mut writer = BmpWriter::new(&frame(1, 1, Colorspace::Cmyk)).unwrap();
        writer.write_row(&[0, 255, 255, 0]).unwrap();
        let bmp = writer.finish().unwrap();
        assert_eq!(&bmp[54..57], &[0, 0, 255]);
    }

    #[test]
    fn test_loader_rejects_other_formats() {
        let result = BmpLoader.load(b"GIF89a........");
        assert!(matches!(result, Err(JpegImageError::NotSupported(_))));
        let truncated = BmpLoader.load(b"BM\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00");
        assert!(matches!(truncated, Err(JpegImageError::Codec(CodecError::NeedMoreData))));
    }
}
