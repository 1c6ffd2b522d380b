//! Host bitmap abstraction.
//!
//! A [`HostBitmap`] is whatever native bitmap object the host platform offers;
//! a [`BitmapLoader`] turns an arbitrary byte stream into one. The container
//! reaches both through [`BitmapCapability`], so a host without bitmap support
//! simply configures [`BitmapCapability::Unavailable`].

use crate::bmp::BmpLoader;
use crate::error::Result;
use crate::pixel_format::{HostPixelFormat, PixelLayout, map_pixel_format};
use crate::sample::{Sample, SampleRow, maximum_value};
use crate::Colorspace;

/// An 8-bit-per-channel ARGB color, as host bitmaps report per-pixel values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Color {
    pub a: u8,
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Color {
    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { a: 255, r, g, b }
    }

    /// ITU-R BT.601 luma.
    pub fn luminance(self) -> u8 {
        let y = 0.299 * self.r as f32 + 0.587 * self.g as f32 + 0.114 * self.b as f32;
        y.round().clamp(0.0, 255.0) as u8
    }

    /// Naive RGB to CMYK separation.
    pub fn to_cmyk(self) -> [u8; 4] {
        let max = self.r.max(self.g).max(self.b);
        let k = 255 - max;
        if max == 0 {
            return [0, 0, 0, 255];
        }
        let separate = |channel: u8| (((max - channel) as u32 * 255 + max as u32 / 2) / max as u32) as u8;
        [separate(self.r), separate(self.g), separate(self.b), k]
    }
}

pub trait HostBitmap {
    fn width(&self) -> u32;
    fn height(&self) -> u32;
    fn pixel_format(&self) -> HostPixelFormat;
    /// Color at column `x`, row `y` (row 0 is the top of the image).
    fn pixel(&self, x: u32, y: u32) -> Color;
}

pub trait BitmapLoader {
    /// Loads a non-JPEG stream; unrecognised formats yield `NotSupported`.
    fn load(&self, data: &[u8]) -> Result<Box<dyn HostBitmap>>;
}

/// Whether the host can turn non-JPEG streams into bitmaps.
pub enum BitmapCapability {
    Available(Box<dyn BitmapLoader>),
    Unavailable,
}

impl Default for BitmapCapability {
    fn default() -> Self {
        Self::Available(Box::new(BmpLoader))
    }
}

impl std::fmt::Debug for BitmapCapability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Available(_) => f.write_str("Available"),
            Self::Unavailable => f.write_str("Unavailable"),
        }
    }
}

/// Reads every pixel of `bitmap` into sample rows laid out per its pixel format.
pub fn sample_rows(bitmap: &dyn HostBitmap) -> Result<(PixelLayout, Vec<SampleRow>)> {
    let layout = map_pixel_format(bitmap.pixel_format());
    let bits = layout.bits_per_component;
    let mut rows = Vec::with_capacity(bitmap.height() as usize);
    let mut components = Vec::with_capacity(layout.components_per_sample as usize);

    for y in 0..bitmap.height() {
        let mut samples = Vec::with_capacity(bitmap.width() as usize);
        for x in 0..bitmap.width() {
            let color = bitmap.pixel(x, y);
            components.clear();
            match layout.colorspace {
                Colorspace::Grayscale => components.push(scale_channel(color.luminance(), bits)),
                Colorspace::Cmyk => components.extend(color.to_cmyk().iter().map(|&c| scale_channel(c, bits))),
                _ => components.extend([color.r, color.g, color.b].iter().map(|&c| scale_channel(c, bits))),
            }
            samples.push(Sample::new(&components, bits)?);
        }
        rows.push(SampleRow::new(samples)?);
    }
    Ok((layout, rows))
}

/// Rescales an 8-bit channel to `bits` bits.
fn scale_channel(value: u8, bits: u8) -> u16 {
    if bits <= 8 {
        (value >> (8 - bits)) as u16
    } else {
        (value as u32 * maximum_value(bits) as u32 / 255) as u16
    }
}
