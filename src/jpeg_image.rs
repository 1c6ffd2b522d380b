//! The in-memory image container.

use std::io::{Read, Write};

use tracing::{debug, trace};

use crate::bitmap_source::{BitmapCapability, HostBitmap, sample_rows};
use crate::codec_engine::{BaselineCodec, BitmapSink, CodecEngine, SampleMatrixSink, SampleSource};
use crate::compression_settings::CompressionSettings;
use crate::error::{JpegImageError, Result};
use crate::huffman_patcher::patch_huffman_tables;
use crate::sample::SampleRow;
use crate::stream_signature::is_compressed_stream;
use crate::{Colorspace, FrameInfo};

/// An image held as a sample matrix, with lazily computed JPEG and bitmap forms.
///
/// The compressed stream is cached together with the [`CompressionSettings`]
/// that produced it and is re-encoded only when different settings are
/// requested. The bitmap stream is computed once. Both caches live until
/// [`JpegImage::dispose`] or drop.
pub struct JpegImage<E: CodecEngine = BaselineCodec> {
    engine: E,
    rows: Vec<SampleRow>,
    width: u32,
    height: u32,
    bits_per_component: u8,
    components_per_sample: u8,
    colorspace: Colorspace,
    compressed: Option<Vec<u8>>,
    compression_settings: Option<CompressionSettings>,
    decompressed: Option<Vec<u8>>,
    bitmap: Option<Box<dyn HostBitmap>>,
    disposed: bool,
}

/// Borrowed view of the sample matrix handed to the engine.
struct SampleMatrix<'a> {
    frame_info: FrameInfo,
    rows: &'a [SampleRow],
}

impl SampleSource for SampleMatrix<'_> {
    fn frame_info(&self) -> FrameInfo {
        self.frame_info
    }

    fn row(&self, index: usize) -> Option<&SampleRow> {
        self.rows.get(index)
    }
}

impl JpegImage<BaselineCodec> {
    pub fn from_samples(rows: Vec<SampleRow>, colorspace: Colorspace) -> Result<Self> {
        Self::from_samples_with_engine(rows, colorspace, BaselineCodec)
    }

    /// Loads a JPEG stream, or any stream the default BMP loader understands.
    pub fn from_stream(data: &[u8]) -> Result<Self> {
        Self::from_stream_with(data, BaselineCodec, BitmapCapability::default())
    }

    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        Self::from_reader_with(reader, BaselineCodec, BitmapCapability::default())
    }

    pub fn from_bitmap(bitmap: Box<dyn HostBitmap>) -> Result<Self> {
        Self::from_bitmap_with_engine(bitmap, BaselineCodec)
    }
}

impl<E: CodecEngine> JpegImage<E> {
    pub fn from_samples_with_engine(rows: Vec<SampleRow>, colorspace: Colorspace, engine: E) -> Result<Self> {
        if colorspace == Colorspace::Unknown {
            return Err(JpegImageError::InvalidArgument("colorspace must be known"));
        }
        let first = rows
            .first()
            .ok_or(JpegImageError::InvalidArgument("image has no rows"))?;
        if first.is_empty() {
            return Err(JpegImageError::InvalidArgument("image rows are empty"));
        }
        let width = first.len();
        let bits_per_component = first.bits_per_component();
        let components_per_sample = first.component_count();
        if rows.iter().any(|row| {
            row.len() != width
                || row.bits_per_component() != bits_per_component
                || row.component_count() != components_per_sample
        }) {
            return Err(JpegImageError::InvalidArgument("rows differ in width or sample layout"));
        }
        if colorspace
            .component_count()
            .is_some_and(|count| count != components_per_sample)
        {
            return Err(JpegImageError::InvalidArgument("component count does not match colorspace"));
        }

        debug!(width, height = rows.len(), ?colorspace, "image created from samples");
        Ok(Self {
            engine,
            width: width as u32,
            height: rows.len() as u32,
            rows,
            bits_per_component,
            components_per_sample,
            colorspace,
            compressed: None,
            compression_settings: None,
            decompressed: None,
            bitmap: None,
            disposed: false,
        })
    }

    /// Loads `data` as a JPEG when it carries the SOI signature, otherwise
    /// through the host bitmap `capability`.
    ///
    /// JPEG input is patched with the default Huffman tables if it has none; the
    /// patched stream becomes the compressed cache, without a settings snapshot.
    pub fn from_stream_with(data: &[u8], engine: E, capability: BitmapCapability) -> Result<Self> {
        if data.is_empty() {
            return Err(JpegImageError::InvalidArgument("stream is empty"));
        }
        if !is_compressed_stream(data) {
            return match capability {
                BitmapCapability::Available(loader) => {
                    let bitmap = loader.load(data)?;
                    Self::from_bitmap_with_engine(bitmap, engine)
                }
                BitmapCapability::Unavailable => Err(JpegImageError::NotSupported(
                    "stream is not a JPEG and no bitmap capability is available",
                )),
            };
        }

        let patched = patch_huffman_tables(data);
        let mut sink = SampleMatrixSink::new();
        engine.decode(&patched.data, &mut sink)?;
        let (frame_info, rows) = sink.into_parts()?;

        let mut image = Self::from_samples_with_engine(rows, frame_info.colorspace, engine)?;
        image.compressed = Some(patched.into_owned());
        Ok(image)
    }

    pub fn from_reader_with<R: Read>(mut reader: R, engine: E, capability: BitmapCapability) -> Result<Self> {
        let mut data = Vec::new();
        reader.read_to_end(&mut data)?;
        Self::from_stream_with(&data, engine, capability)
    }

    /// Takes ownership of a host bitmap and builds the sample matrix from its pixels.
    pub fn from_bitmap_with_engine(bitmap: Box<dyn HostBitmap>, engine: E) -> Result<Self> {
        if bitmap.width() == 0 || bitmap.height() == 0 {
            return Err(JpegImageError::InvalidArgument("bitmap has no pixels"));
        }
        let (layout, rows) = sample_rows(bitmap.as_ref())?;
        let mut image = Self::from_samples_with_engine(rows, layout.colorspace, engine)?;
        image.bitmap = Some(bitmap);
        Ok(image)
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn bits_per_component(&self) -> u8 {
        self.bits_per_component
    }

    pub fn components_per_sample(&self) -> u8 {
        self.components_per_sample
    }

    pub fn colorspace(&self) -> Colorspace {
        self.colorspace
    }

    pub fn frame_info(&self) -> FrameInfo {
        FrameInfo {
            width: self.width,
            height: self.height,
            bits_per_sample: self.bits_per_component,
            component_count: self.components_per_sample,
            colorspace: self.colorspace,
        }
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    pub fn host_bitmap(&self) -> Option<&dyn HostBitmap> {
        self.bitmap.as_deref()
    }

    /// Settings that produced the cached compressed stream, if any.
    pub fn compression_settings(&self) -> Option<&CompressionSettings> {
        self.compression_settings.as_ref()
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    fn ensure_live(&self) -> Result<()> {
        if self.disposed {
            return Err(JpegImageError::Disposed);
        }
        Ok(())
    }

    pub fn row(&self, index: usize) -> Result<&SampleRow> {
        self.ensure_live()?;
        self.rows.get(index).ok_or(JpegImageError::OutOfRange {
            index,
            height: self.rows.len(),
        })
    }

    pub fn rows(&self) -> Result<&[SampleRow]> {
        self.ensure_live()?;
        Ok(&self.rows)
    }

    /// True when a request with `settings` must run the encoder.
    pub fn needs_recompute(&self, settings: &CompressionSettings) -> bool {
        match (&self.compressed, &self.compression_settings) {
            (Some(_), Some(snapshot)) => snapshot != settings,
            _ => true,
        }
    }

    pub fn compressed_bytes(&mut self, settings: &CompressionSettings) -> Result<&[u8]> {
        self.ensure_live()?;
        settings.validate()?;

        if self.needs_recompute(settings) {
            debug!(?settings, "compressed cache miss, encoding");
            let source = SampleMatrix {
                frame_info: self.frame_info(),
                rows: &self.rows,
            };
            let encoded = self.engine.encode(&source, settings)?;
            self.compressed = Some(encoded);
            self.compression_settings = Some(*settings);
        } else {
            trace!("compressed cache hit");
        }
        self.compressed.as_deref().ok_or(JpegImageError::Disposed)
    }

    /// The host bitmap (BMP) stream, decoded from the cached compressed stream.
    ///
    /// When nothing has been compressed yet the image is first encoded with
    /// default settings.
    pub fn decompressed_bytes(&mut self) -> Result<&[u8]> {
        self.ensure_live()?;

        if self.decompressed.is_none() {
            if self.compressed.is_none() {
                self.compressed_bytes(&CompressionSettings::default())?;
            }
            debug!("decompressed cache miss, decoding");
            let compressed = self.compressed.as_deref().ok_or(JpegImageError::Disposed)?;
            let mut sink = BitmapSink::new();
            self.engine.decode(compressed, &mut sink)?;
            self.decompressed = Some(sink.into_bytes()?);
        } else {
            trace!("decompressed cache hit");
        }
        self.decompressed.as_deref().ok_or(JpegImageError::Disposed)
    }

    pub fn write_compressed<W: Write>(&mut self, writer: &mut W, settings: &CompressionSettings) -> Result<()> {
        let bytes = self.compressed_bytes(settings)?;
        writer.write_all(bytes)?;
        Ok(())
    }

    pub fn write_decompressed<W: Write>(&mut self, writer: &mut W) -> Result<()> {
        let bytes = self.decompressed_bytes()?;
        writer.write_all(bytes)?;
        Ok(())
    }

    /// Releases the sample matrix, both caches and the host bitmap. Repeated calls do nothing.
    pub fn dispose(&mut self) {
        if self.disposed {
            return;
        }
        self.rows = Vec::new();
        self.compressed = None;
        self.compression_settings = None;
        self.decompressed = None;
        self.bitmap = None;
        self.disposed = true;
        debug!("image disposed");
    }
}

impl<E: CodecEngine> Drop for JpegImage<E> {
    fn drop(&mut self) {
        self.dispose();
    }
}

impl<E: CodecEngine> std::fmt::Debug for JpegImage<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JpegImage")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("bits_per_component", &self.bits_per_component)
            .field("components_per_sample", &self.components_per_sample)
            .field("colorspace", &self.colorspace)
            .field("compressed", &self.compressed.as_ref().map(Vec::len))
            .field("decompressed", &self.decompressed.as_ref().map(Vec::len))
            .field("disposed", &self.disposed)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sample::Sample;

    fn gray_rows(width: usize, height: usize) -> Vec<SampleRow> {
        (0..height)
            .map(|y| {
                SampleRow::new(
                    (0..width)
                        .map(|x| Sample::new(&[((x * 16 + y * 8) % 256) as u16], 8).unwrap())
                        .collect(),
                )
                .unwrap()
            })
            .collect()
    }

    #[test]
    fn test_dimensions_follow_rows() {
        let image = JpegImage::from_samples(gray_rows(5, 3), Colorspace::Grayscale).unwrap();
        assert_eq!((image.width(), image.height()), (5, 3));
        assert_eq!(image.components_per_sample(), 1);
        assert_eq!(image.bits_per_component(), 8);
    }

    #[test]
    fn test_rejects_invalid_matrices() {
        assert!(matches!(
            JpegImage::from_samples(Vec::new(), Colorspace::Grayscale),
            Err(JpegImageError::InvalidArgument(_))
        ));
        assert!(matches!(
            JpegImage::from_samples(gray_rows(2, 2), Colorspace::Unknown),
            Err(JpegImageError::InvalidArgument(_))
        ));
        assert!(matches!(
            JpegImage::from_samples(gray_rows(2, 2), Colorspace::Rgb),
            Err(JpegImageError::InvalidArgument(_))
        ));

        let mut ragged = gray_rows(4, 2);
        ragged.push(gray_rows(3, 1).remove(0));
        assert!(matches!(
            JpegImage::from_samples(ragged, Colorspace::Grayscale),
            Err(JpegImageError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_needs_recompute_gate() {
        let mut image = JpegImage::from_samples(gray_rows(8, 8), Colorspace::Grayscale).unwrap();
        let settings = CompressionSettings::default();
        assert!(image.needs_recompute(&settings));
        image.compressed_bytes(&settings).unwrap();
        assert!(!image.needs_recompute(&settings));
        assert!(image.needs_recompute(&settings.with_quality(20)));
    }

    #[test]
    fn test_invalid_settings_leave_cache_untouched() {
        let mut image = JpegImage::from_samples(gray_rows(8, 8), Colorspace::Grayscale).unwrap();
        let settings = CompressionSettings::default();
        let first = image.compressed_bytes(&settings).unwrap().to_vec();
        let result = image.compressed_bytes(&settings.with_quality(0));
        assert!(matches!(result, Err(JpegImageError::InvalidArgument(_))));
        assert_eq!(image.compression_settings(), Some(&settings));
        assert_eq!(image.compressed_bytes(&settings).unwrap(), first.as_slice());
    }

    #[test]
    fn test_row_out_of_range() {
        let image = JpegImage::from_samples(gray_rows(4, 2), Colorspace::Grayscale).unwrap();
        assert!(image.row(1).is_ok());
        assert!(matches!(image.row(2), Err(JpegImageError::OutOfRange { index: 2, height: 2 })));
    }

    #[test]
    fn test_dispose_is_idempotent() {
        let mut image = JpegImage::from_samples(gray_rows(8, 8), Colorspace::Grayscale).unwrap();
        image.decompressed_bytes().unwrap();
        image.dispose();
        image.dispose();
        assert!(image.is_disposed());
        assert!(matches!(image.row(0), Err(JpegImageError::Disposed)));
        assert!(matches!(image.decompressed_bytes(), Err(JpegImageError::Disposed)));
        assert!(matches!(
            image.compressed_bytes(&CompressionSettings::default()),
            Err(JpegImageError::Disposed)
        ));
    }

    #[test]
    fn test_empty_stream() {
        assert!(matches!(JpegImage::from_stream(&[]), Err(JpegImageError::InvalidArgument(_))));
    }
}
