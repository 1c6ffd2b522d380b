//! The seam between the image container and a JPEG codec.
//!
//! The container only talks to [`CodecEngine`]: it hands the engine a
//! [`SampleSource`] to encode and a [`DecodeSink`] to receive decoded rows.
//! [`BaselineCodec`] is the bundled engine built on [`crate::jpeg1`].

use tracing::debug;

use crate::bmp::BmpWriter;
use crate::compression_settings::CompressionSettings;
use crate::constants::{BASELINE_BITS_PER_SAMPLE, MAXIMUM_DIMENSION};
use crate::error::CodecError;
use crate::jpeg1::{Jpeg1Decoder, Jpeg1Encoder};
use crate::sample::{SampleRow, maximum_value};
use crate::FrameInfo;

/// Read access to an image's sample matrix.
pub trait SampleSource {
    /// Dimensions and layout; `bits_per_sample` is the bits per component of the rows.
    fn frame_info(&self) -> FrameInfo;
    fn row(&self, index: usize) -> Option<&SampleRow>;
}

/// Receives decoded output one row at a time, top to bottom.
pub trait DecodeSink {
    fn begin(&mut self, frame_info: &FrameInfo) -> Result<(), CodecError>;
    /// Interleaved 8-bit samples in `frame_info.colorspace`.
    fn write_row(&mut self, row: &[u8]) -> Result<(), CodecError>;
    fn finish(&mut self) -> Result<(), CodecError> {
        Ok(())
    }
}

pub trait CodecEngine {
    fn encode(&self, source: &dyn SampleSource, settings: &CompressionSettings) -> Result<Vec<u8>, CodecError>;
    fn decode(&self, data: &[u8], sink: &mut dyn DecodeSink) -> Result<(), CodecError>;
}

/// Collects decoded rows as [`SampleRow`]s.
#[derive(Debug, Default)]
pub struct SampleMatrixSink {
    frame_info: Option<FrameInfo>,
    rows: Vec<SampleRow>,
}

impl SampleMatrixSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn into_parts(self) -> Result<(FrameInfo, Vec<SampleRow>), CodecError> {
        let frame_info = self.frame_info.ok_or(CodecError::InvalidOperation)?;
        if self.rows.len() != frame_info.height as usize {
            return Err(CodecError::NeedMoreData);
        }
        Ok((frame_info, self.rows))
    }
}

impl DecodeSink for SampleMatrixSink {
    fn begin(&mut self, frame_info: &FrameInfo) -> Result<(), CodecError> {
        self.frame_info = Some(*frame_info);
        self.rows = Vec::with_capacity(frame_info.height as usize);
        Ok(())
    }

    fn write_row(&mut self, row: &[u8]) -> Result<(), CodecError> {
        let info = self.frame_info.ok_or(CodecError::InvalidOperation)?;
        let row = SampleRow::from_packed_bytes(row, info.width as usize, info.bits_per_sample, info.component_count)
            .map_err(|_| CodecError::InvalidData)?;
        self.rows.push(row);
        Ok(())
    }
}

/// Renders decoded rows into BMP file bytes.
#[derive(Default)]
pub struct BitmapSink {
    writer: Option<BmpWriter>,
    output: Option<Vec<u8>>,
}

impl BitmapSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn into_bytes(self) -> Result<Vec<u8>, CodecError> {
        self.output.ok_or(CodecError::InvalidOperation)
    }
}

impl DecodeSink for BitmapSink {
    fn begin(&mut self, frame_info: &FrameInfo) -> Result<(), CodecError> {
        self.writer = Some(BmpWriter::new(frame_info)?);
        Ok(())
    }

    fn write_row(&mut self, row: &[u8]) -> Result<(), CodecError> {
        self.writer.as_mut().ok_or(CodecError::InvalidOperation)?.write_row(row)
    }

    fn finish(&mut self) -> Result<(), CodecError> {
        let writer = self.writer.take().ok_or(CodecError::InvalidOperation)?;
        self.output = Some(writer.finish()?);
        Ok(())
    }
}

/// Baseline sequential JPEG engine.
#[derive(Debug, Clone, Copy, Default)]
pub struct BaselineCodec;

impl BaselineCodec {
    /// Flattens the sample matrix into interleaved 8-bit samples.
    fn interleave(source: &dyn SampleSource, frame_info: &FrameInfo) -> Result<Vec<u8>, CodecError> {
        let width = frame_info.width as usize;
        let components = frame_info.component_count as usize;
        let maximum = maximum_value(frame_info.bits_per_sample) as u32;
        let mut pixels = Vec::with_capacity(width * frame_info.height as usize * components);

        for y in 0..frame_info.height as usize {
            let row = source.row(y).ok_or(CodecError::NeedMoreData)?;
            if row.len() != width || row.component_count() as usize != components {
                return Err(CodecError::InvalidData);
            }
            for sample in row {
                for &value in sample.components() {
                    let value = value as u32;
                    let scaled = if frame_info.bits_per_sample == BASELINE_BITS_PER_SAMPLE {
                        value
                    } else {
                        (value * 255 + maximum / 2) / maximum
                    };
                    pixels.push(scaled as u8);
                }
            }
        }
        Ok(pixels)
    }
}

impl CodecEngine for BaselineCodec {
    fn encode(&self, source: &dyn SampleSource, settings: &CompressionSettings) -> Result<Vec<u8>, CodecError> {
        let frame_info = source.frame_info();
        if frame_info.width == 0 || frame_info.width > MAXIMUM_DIMENSION {
            return Err(CodecError::InvalidArgumentWidth);
        }
        if frame_info.height == 0 || frame_info.height > MAXIMUM_DIMENSION {
            return Err(CodecError::InvalidArgumentHeight);
        }
        if frame_info.colorspace.component_count() != Some(frame_info.component_count) {
            return Err(CodecError::UnsupportedColorspace);
        }

        let pixels = Self::interleave(source, &frame_info)?;
        let baseline_info = FrameInfo {
            bits_per_sample: BASELINE_BITS_PER_SAMPLE,
            ..frame_info
        };

        let mut encoder = Jpeg1Encoder::new();
        encoder.set_quality(settings.quality);
        encoder.set_smoothing_factor(settings.smoothing_factor);
        encoder.set_restart_interval(settings.restart_interval);

        let mut destination = vec![0u8; Jpeg1Encoder::maximum_encoded_size(&baseline_info)];
        let length = encoder.encode(&pixels, &baseline_info, &mut destination)?;
        destination.truncate(length);
        debug!(quality = settings.quality, bytes = length, "baseline encode finished");
        Ok(destination)
    }

    fn decode(&self, data: &[u8], sink: &mut dyn DecodeSink) -> Result<(), CodecError> {
        let mut decoder = Jpeg1Decoder::new(data);
        decoder.read_header()?;
        let frame_info = decoder.frame_info()?;
        let mut pixels = vec![0u8; decoder.required_size()?];
        decoder.decode(&mut pixels)?;

        sink.begin(&frame_info)?;
        let row_size = frame_info.width as usize * frame_info.component_count as usize;
        for row in pixels.chunks_exact(row_size) {
            sink.write_row(row)?;
        }
        sink.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Colorspace;
    use crate::sample::Sample;

    struct Matrix {
        info: FrameInfo,
        rows: Vec<SampleRow>,
    }

    impl SampleSource for Matrix {
        fn frame_info(&self) -> FrameInfo {
            self.info
        }
        fn row(&self, index: usize) -> Option<&SampleRow> {
            self.rows.get(index)
        }
    }

    fn gray_matrix(bits: u8, value: u16) -> Matrix {
        let rows = (0..8)
            .map(|_| SampleRow::new((0..8).map(|_| Sample::new(&[value], bits).unwrap()).collect()).unwrap())
            .collect();
        Matrix {
            info: FrameInfo {
                width: 8,
                height: 8,
                bits_per_sample: bits,
                component_count: 1,
                colorspace: Colorspace::Grayscale,
            },
            rows,
        }
    }

    #[test]
    fn test_interleave_rescales_to_eight_bits() {
        let matrix = gray_matrix(12, 4095);
        let pixels = BaselineCodec::interleave(&matrix, &matrix.info).unwrap();
        assert!(pixels.iter().all(|&p| p == 255));

        let matrix = gray_matrix(1, 1);
        let pixels = BaselineCodec::interleave(&matrix, &matrix.info).unwrap();
        assert!(pixels.iter().all(|&p| p == 255));
    }

    #[test]
    fn test_encode_then_decode_into_samples() {
        let matrix = gray_matrix(8, 77);
        let codec = BaselineCodec;
        let jpeg = codec.encode(&matrix, &CompressionSettings::default()).unwrap();

        let mut sink = SampleMatrixSink::new();
        codec.decode(&jpeg, &mut sink).unwrap();
        let (info, rows) = sink.into_parts().unwrap();
        assert_eq!((info.width, info.height, info.colorspace), (8, 8, Colorspace::Grayscale));
        let value = rows[3].get(5).unwrap().component(0).unwrap();
        assert!((value as i32 - 77).abs() <= 2);
    }

    #[test]
    fn test_decode_into_bitmap() {
        let matrix = gray_matrix(8, 200);
        let codec = BaselineCodec;
        let jpeg = codec.encode(&matrix, &CompressionSettings::default()).unwrap();

        let mut sink = BitmapSink::new();
        codec.decode(&jpeg, &mut sink).unwrap();
        let bmp = sink.into_bytes().unwrap();
        assert_eq!(&bmp[..2], b"BM");
        assert_eq!(bmp.len(), 54 + 1024 + 8 * 8);
    }

    #[test]
    fn test_short_source_is_rejected() {
        let mut matrix = gray_matrix(8, 0);
        matrix.rows.pop();
        let result = BaselineCodec.encode(&matrix, &CompressionSettings::default());
        assert_eq!(result, Err(CodecError::NeedMoreData));
    }

    #[test]
    fn test_sink_without_output() {
        assert_eq!(BitmapSink::new().into_bytes(), Err(CodecError::InvalidOperation));
        assert_eq!(SampleMatrixSink::new().into_parts().unwrap_err(), CodecError::InvalidOperation);
    }
}
