//! Mapping from host bitmap pixel formats to sample layouts.

use crate::Colorspace;

/// Raw host pixel-format descriptor.
///
/// The low byte is the format index and the second byte the bits per pixel;
/// the remaining bits are host flags (indexed, alpha, premultiplied, ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HostPixelFormat(pub u32);

impl HostPixelFormat {
    pub const FORMAT_1BPP_INDEXED: Self = Self(0x0003_0101);
    pub const FORMAT_4BPP_INDEXED: Self = Self(0x0003_0402);
    pub const FORMAT_8BPP_INDEXED: Self = Self(0x0003_0803);
    pub const FORMAT_16BPP_GRAYSCALE: Self = Self(0x0010_1004);
    pub const FORMAT_16BPP_RGB555: Self = Self(0x0002_1005);
    pub const FORMAT_16BPP_RGB565: Self = Self(0x0002_1006);
    pub const FORMAT_16BPP_ARGB1555: Self = Self(0x0006_1007);
    pub const FORMAT_24BPP_RGB: Self = Self(0x0002_1808);
    pub const FORMAT_32BPP_RGB: Self = Self(0x0002_2009);
    pub const FORMAT_32BPP_ARGB: Self = Self(0x0026_200A);
    pub const FORMAT_32BPP_PARGB: Self = Self(0x000E_200B);
    pub const FORMAT_48BPP_RGB: Self = Self(0x0010_300C);
    pub const FORMAT_64BPP_ARGB: Self = Self(0x0034_400D);
    pub const FORMAT_64BPP_PARGB: Self = Self(0x001A_400E);
    pub const FORMAT_32BPP_CMYK: Self = Self(0x0000_200F);

    const CMYK_FORMAT_INDEX: u8 = 15;

    pub fn index(self) -> u8 {
        (self.0 & 0xFF) as u8
    }

    pub fn bits_per_pixel(self) -> u8 {
        ((self.0 >> 8) & 0xFF) as u8
    }
}

/// How the samples of one pixel are laid out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PixelLayout {
    pub bits_per_component: u8,
    pub components_per_sample: u8,
    pub colorspace: Colorspace,
}

impl PixelLayout {
    const fn new(bits_per_component: u8, components_per_sample: u8, colorspace: Colorspace) -> Self {
        Self {
            bits_per_component,
            components_per_sample,
            colorspace,
        }
    }
}

pub fn map_pixel_format(format: HostPixelFormat) -> PixelLayout {
    if format == HostPixelFormat::FORMAT_16BPP_GRAYSCALE {
        return PixelLayout::new(16, 1, Colorspace::Grayscale);
    }
    match format.bits_per_pixel() {
        32 if format.index() == HostPixelFormat::CMYK_FORMAT_INDEX => PixelLayout::new(8, 4, Colorspace::Cmyk),
        16 => PixelLayout::new(6, 3, Colorspace::Rgb),
        24 | 32 => PixelLayout::new(8, 3, Colorspace::Rgb),
        48 | 64 => PixelLayout::new(16, 3, Colorspace::Rgb),
        _ => PixelLayout::new(8, 3, Colorspace::Rgb),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn layout(format: HostPixelFormat) -> (u8, u8, Colorspace) {
        let l = map_pixel_format(format);
        (l.bits_per_component, l.components_per_sample, l.colorspace)
    }

    #[test]
    fn test_descriptor_fields() {
        assert_eq!(HostPixelFormat::FORMAT_24BPP_RGB.bits_per_pixel(), 24);
        assert_eq!(HostPixelFormat::FORMAT_24BPP_RGB.index(), 8);
        assert_eq!(HostPixelFormat::FORMAT_32BPP_CMYK.index(), 15);
        assert_eq!(HostPixelFormat::FORMAT_64BPP_PARGB.bits_per_pixel(), 64);
    }

    #[test]
    fn test_grayscale_and_cmyk() {
        assert_eq!(layout(HostPixelFormat::FORMAT_16BPP_GRAYSCALE), (16, 1, Colorspace::Grayscale));
        assert_eq!(layout(HostPixelFormat::FORMAT_32BPP_CMYK), (8, 4, Colorspace::Cmyk));
    }

    #[test]
    fn test_rgb_depths() {
        for format in [
            HostPixelFormat::FORMAT_16BPP_RGB555,
            HostPixelFormat::FORMAT_16BPP_RGB565,
            HostPixelFormat::FORMAT_16BPP_ARGB1555,
        ] {
            assert_eq!(layout(format), (6, 3, Colorspace::Rgb));
        }
        for format in [
            HostPixelFormat::FORMAT_24BPP_RGB,
            HostPixelFormat::FORMAT_32BPP_RGB,
            HostPixelFormat::FORMAT_32BPP_ARGB,
            HostPixelFormat::FORMAT_32BPP_PARGB,
        ] {
            assert_eq!(layout(format), (8, 3, Colorspace::Rgb));
        }
        for format in [
            HostPixelFormat::FORMAT_48BPP_RGB,
            HostPixelFormat::FORMAT_64BPP_ARGB,
            HostPixelFormat::FORMAT_64BPP_PARGB,
        ] {
            assert_eq!(layout(format), (16, 3, Colorspace::Rgb));
        }
    }

    #[test]
    fn test_unlisted_formats_fall_back_to_rgb8() {
        assert_eq!(layout(HostPixelFormat::FORMAT_8BPP_INDEXED), (8, 3, Colorspace::Rgb));
        assert_eq!(layout(HostPixelFormat::FORMAT_1BPP_INDEXED), (8, 3, Colorspace::Rgb));
        assert_eq!(layout(HostPixelFormat(0)), (8, 3, Colorspace::Rgb));
        // A 32 bpp format whose index is not CMYK stays RGB.
        assert_eq!(layout(HostPixelFormat(0x0000_2010)), (8, 3, Colorspace::Rgb));
    }
}
