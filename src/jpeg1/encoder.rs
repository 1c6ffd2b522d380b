//! JPEG 1 Baseline Encoder orchestration.
//!
//! Produces a sequential Huffman-coded stream with 1x1 sampling for every
//! component and the standard Huffman tables.

use tracing::debug;

use crate::jpeg_stream_writer::JpegStreamWriter;
use crate::jpeg1::dct::{BLOCK_DIM, BLOCK_SIZE, fdct_8x8};
use crate::jpeg1::huffman::{
    HuffmanEncoder, HuffmanTable, JpegBitWriter, STD_CHROMINANCE_AC_LENGTHS, STD_CHROMINANCE_AC_VALUES,
    STD_CHROMINANCE_DC_LENGTHS, STD_CHROMINANCE_DC_VALUES, STD_LUMINANCE_AC_LENGTHS, STD_LUMINANCE_AC_VALUES,
    STD_LUMINANCE_DC_LENGTHS, STD_LUMINANCE_DC_VALUES,
};
use crate::jpeg1::quantization::{
    STD_CHROMINANCE_QUANT_TABLE, STD_LUMINANCE_QUANT_TABLE, get_scaled_quant_table, quantize_block,
};
use crate::{CodecError, Colorspace, FrameInfo};

/// Zigzag scan pattern for 8x8 blocks: entry k is the natural index of the k-th coefficient.
#[rustfmt::skip]
pub const ZIGZAG_ORDER: [usize; 64] = [
    0,  1,  8, 16,  9,  2,  3, 10,
    17, 24, 32, 25, 18, 11,  4,  5,
    12, 19, 26, 33, 40, 48, 41, 34,
    27, 20, 13,  6,  7, 14, 21, 28,
    35, 42, 49, 56, 57, 50, 43, 36,
    29, 22, 15, 23, 30, 37, 44, 51,
    58, 59, 52, 45, 38, 31, 39, 46,
    53, 60, 61, 54, 47, 55, 62, 63,
];

/// Upper bound on the entropy-coded size of one block, stuffing included.
const MAXIMUM_BLOCK_SIZE: usize = 512;
/// Room for every marker segment the encoder emits ahead of the scan.
const HEADER_ALLOWANCE: usize = 1024;

/// Adobe APP14 transform flags.
const ADOBE_TRANSFORM_NONE: u8 = 0;
const ADOBE_TRANSFORM_YCCK: u8 = 2;

pub struct Jpeg1Encoder {
    huffman: HuffmanEncoder,
    dc_table_lum: HuffmanTable,
    ac_table_lum: HuffmanTable,
    dc_table_chrom: HuffmanTable,
    ac_table_chrom: HuffmanTable,
    pub quantization_table_lum: [u8; 64],
    pub quantization_table_chrom: [u8; 64],
    pub restart_interval: u16,
    pub smoothing_factor: u8,
}

impl Jpeg1Encoder {
    pub fn new() -> Self {
        Self {
            huffman: HuffmanEncoder::new(),
            dc_table_lum: HuffmanTable::standard_luminance_dc(),
            ac_table_lum: HuffmanTable::standard_luminance_ac(),
            dc_table_chrom: HuffmanTable::standard_chrominance_dc(),
            ac_table_chrom: HuffmanTable::standard_chrominance_ac(),
            quantization_table_lum: STD_LUMINANCE_QUANT_TABLE,
            quantization_table_chrom: STD_CHROMINANCE_QUANT_TABLE,
            restart_interval: 0,
            smoothing_factor: 0,
        }
    }

    pub fn set_quality(&mut self, quality: u8) {
        self.quantization_table_lum = get_scaled_quant_table(&STD_LUMINANCE_QUANT_TABLE, quality);
        self.quantization_table_chrom = get_scaled_quant_table(&STD_CHROMINANCE_QUANT_TABLE, quality);
    }

    pub fn set_restart_interval(&mut self, interval: u16) {
        self.restart_interval = interval;
    }

    pub fn set_smoothing_factor(&mut self, smoothing_factor: u8) {
        self.smoothing_factor = smoothing_factor;
    }

    /// A destination size that always holds the encoded form of `frame_info`.
    pub fn maximum_encoded_size(frame_info: &FrameInfo) -> usize {
        let blocks_w = (frame_info.width as usize).div_ceil(BLOCK_SIZE);
        let blocks_h = (frame_info.height as usize).div_ceil(BLOCK_SIZE);
        let mcus = blocks_w * blocks_h;
        // Each MCU may also be followed by a flush byte and an RSTm marker.
        HEADER_ALLOWANCE + mcus * (frame_info.component_count as usize * MAXIMUM_BLOCK_SIZE + 3)
    }

    /// Encodes interleaved 8-bit samples laid out as `frame_info.colorspace`.
    pub fn encode(&mut self, source: &[u8], frame_info: &FrameInfo, destination: &mut [u8]) -> Result<usize, CodecError> {
        if frame_info.width == 0 {
            return Err(CodecError::InvalidArgumentWidth);
        }
        if frame_info.height == 0 {
            return Err(CodecError::InvalidArgumentHeight);
        }
        if frame_info.bits_per_sample != 8 {
            return Err(CodecError::UnsupportedBitsPerSample);
        }
        let components_count = frame_info.component_count as usize;
        if frame_info.colorspace.component_count() != Some(frame_info.component_count) {
            return Err(CodecError::UnsupportedColorspace);
        }
        let width = frame_info.width as usize;
        let height = frame_info.height as usize;
        if source.len() < width * height * components_count {
            return Err(CodecError::NeedMoreData);
        }

        let mut planes = to_component_planes(source, frame_info);
        if self.smoothing_factor > 0 {
            for plane in planes.iter_mut() {
                smooth_plane(plane, width, height, self.smoothing_factor);
            }
        }

        // Luminance tables serve Y and K, chrominance tables serve Cb and Cr.
        let table_ids: &[u8] = match components_count {
            1 => &[0],
            3 => &[0, 1, 1],
            _ => &[0, 1, 1, 0],
        };

        let mut writer = JpegStreamWriter::new(destination);
        writer.write_start_of_image()?;
        match frame_info.colorspace {
            Colorspace::Cmyk => writer.write_adobe_segment(ADOBE_TRANSFORM_NONE)?,
            Colorspace::Ycck => writer.write_adobe_segment(ADOBE_TRANSFORM_YCCK)?,
            _ => writer.write_jfif_segment()?,
        }

        writer.write_dqt(0, &self.quantization_table_lum)?;
        if components_count > 1 {
            writer.write_dqt(1, &self.quantization_table_chrom)?;
        }

        if components_count == 1 {
            writer.write_dht_tables(&[
                (0, 0, &STD_LUMINANCE_DC_LENGTHS, &STD_LUMINANCE_DC_VALUES[..]),
                (1, 0, &STD_LUMINANCE_AC_LENGTHS, &STD_LUMINANCE_AC_VALUES[..]),
            ])?;
        } else {
            writer.write_dht_tables(&[
                (0, 0, &STD_LUMINANCE_DC_LENGTHS, &STD_LUMINANCE_DC_VALUES[..]),
                (1, 0, &STD_LUMINANCE_AC_LENGTHS, &STD_LUMINANCE_AC_VALUES[..]),
                (0, 1, &STD_CHROMINANCE_DC_LENGTHS, &STD_CHROMINANCE_DC_VALUES[..]),
                (1, 1, &STD_CHROMINANCE_AC_LENGTHS, &STD_CHROMINANCE_AC_VALUES[..]),
            ])?;
        }

        if self.restart_interval > 0 {
            writer.write_dri(self.restart_interval)?;
        }

        writer.write_sof0_segment(frame_info, table_ids)?;
        writer.write_sos_segment(table_ids)?;

        let blocks_w = width.div_ceil(BLOCK_SIZE);
        let blocks_h = height.div_ceil(BLOCK_SIZE);
        let restart_interval = self.restart_interval as usize;
        let mut mcus_encoded = 0usize;
        let mut next_restart_index = 0u8;
        self.huffman.reset();

        {
            let mut bit_writer = JpegBitWriter::new(&mut writer);
            for block_y in 0..blocks_h {
                for block_x in 0..blocks_w {
                    if restart_interval > 0 && mcus_encoded > 0 && mcus_encoded % restart_interval == 0 {
                        bit_writer.write_restart_marker(next_restart_index)?;
                        next_restart_index = (next_restart_index + 1) % 8;
                        self.huffman.reset();
                    }

                    for (component, plane) in planes.iter().enumerate() {
                        let block = extract_block(plane, width, height, block_x, block_y);
                        let (dc_table, ac_table, quant_table) = if table_ids[component] == 0 {
                            (&self.dc_table_lum, &self.ac_table_lum, &self.quantization_table_lum)
                        } else {
                            (&self.dc_table_chrom, &self.ac_table_chrom, &self.quantization_table_chrom)
                        };
                        Self::encode_block_internal(
                            &mut self.huffman,
                            &block,
                            &mut bit_writer,
                            dc_table,
                            ac_table,
                            quant_table,
                            component,
                        )?;
                    }
                    mcus_encoded += 1;
                }
            }
            bit_writer.flush()?;
        }

        writer.write_end_of_image()?;
        debug!(
            width,
            height,
            components = components_count,
            mcus = mcus_encoded,
            bytes = writer.len(),
            "encoded baseline JPEG"
        );
        Ok(writer.len())
    }

    fn encode_block_internal(
        huffman: &mut HuffmanEncoder,
        block: &[f32; BLOCK_DIM],
        bit_writer: &mut JpegBitWriter,
        dc_table: &HuffmanTable,
        ac_table: &HuffmanTable,
        quant_table: &[u8; BLOCK_DIM],
        dc_pred_idx: usize,
    ) -> Result<(), CodecError> {
        let mut dct_coeffs = [0.0f32; BLOCK_DIM];
        fdct_8x8(block, &mut dct_coeffs);

        let mut quant_coeffs = [0i16; BLOCK_DIM];
        quantize_block(&dct_coeffs, quant_table, &mut quant_coeffs);

        let mut zigzag_coeffs = [0i16; BLOCK_DIM];
        for (i, coefficient) in zigzag_coeffs.iter_mut().enumerate() {
            *coefficient = quant_coeffs[ZIGZAG_ORDER[i]];
        }

        // DC
        let dc_val = zigzag_coeffs[0];
        let diff = dc_val - huffman.dc_previous_value[dc_pred_idx];
        huffman.dc_previous_value[dc_pred_idx] = dc_val;

        let dc_category = HuffmanEncoder::get_category(diff);
        let dc_code = dc_table.codes[dc_category as usize];
        bit_writer.write_bits(dc_code.value, dc_code.length)?;
        let (dc_bits, dc_bit_len) = HuffmanEncoder::get_diff_bits(diff, dc_category);
        bit_writer.write_bits(dc_bits, dc_bit_len)?;

        // AC
        let mut run = 0usize;
        for &ac_val in &zigzag_coeffs[1..] {
            if ac_val == 0 {
                run += 1;
                continue;
            }
            while run > 15 {
                let zrl_code = ac_table.codes[0xF0];
                bit_writer.write_bits(zrl_code.value, zrl_code.length)?;
                run -= 16;
            }
            let category = HuffmanEncoder::get_category(ac_val);
            let ac_code = ac_table.codes[(run << 4) | category as usize];
            bit_writer.write_bits(ac_code.value, ac_code.length)?;
            let (ac_bits, ac_bit_len) = HuffmanEncoder::get_diff_bits(ac_val, category);
            bit_writer.write_bits(ac_bits, ac_bit_len)?;
            run = 0;
        }
        if run > 0 {
            let eob_code = ac_table.codes[0x00];
            bit_writer.write_bits(eob_code.value, eob_code.length)?;
        }
        Ok(())
    }
}

impl Default for Jpeg1Encoder {
    fn default() -> Self {
        Self::new()
    }
}

/// Splits interleaved samples into one plane per stored component.
///
/// RGB is converted to YCbCr; CMYK is stored inverted, as Adobe writers do.
fn to_component_planes(source: &[u8], frame_info: &FrameInfo) -> Vec<Vec<u8>> {
    let components = frame_info.component_count as usize;
    let pixel_count = frame_info.width as usize * frame_info.height as usize;
    let mut planes = vec![Vec::with_capacity(pixel_count); components];

    for pixel in source.chunks_exact(components).take(pixel_count) {
        match frame_info.colorspace {
            Colorspace::Rgb => {
                let (y, cb, cr) = rgb_to_ycbcr(pixel[0], pixel[1], pixel[2]);
                planes[0].push(y);
                planes[1].push(cb);
                planes[2].push(cr);
            }
            Colorspace::Cmyk => {
                for (plane, &value) in planes.iter_mut().zip(pixel) {
                    plane.push(255 - value);
                }
            }
            _ => {
                for (plane, &value) in planes.iter_mut().zip(pixel) {
                    plane.push(value);
                }
            }
        }
    }
    planes
}

pub fn rgb_to_ycbcr(r: u8, g: u8, b: u8) -> (u8, u8, u8) {
    let (r, g, b) = (r as f32, g as f32, b as f32);
    let luma = 0.299 * r + 0.587 * g + 0.114 * b;
    let cb = -0.168_736 * r - 0.331_264 * g + 0.5 * b + 128.0;
    let cr = 0.5 * r - 0.418_688 * g - 0.081_312 * b + 128.0;
    (clamp_to_u8(luma), clamp_to_u8(cb), clamp_to_u8(cr))
}

pub(crate) fn clamp_to_u8(value: f32) -> u8 {
    value.round().clamp(0.0, 255.0) as u8
}

/// Reads one level-shifted 8x8 block, replicating the last row and column past the image edge.
fn extract_block(plane: &[u8], width: usize, height: usize, block_x: usize, block_y: usize) -> [f32; BLOCK_DIM] {
    let mut block = [0.0f32; BLOCK_DIM];
    for y in 0..BLOCK_SIZE {
        let py = (block_y * BLOCK_SIZE + y).min(height - 1);
        for x in 0..BLOCK_SIZE {
            let px = (block_x * BLOCK_SIZE + x).min(width - 1);
            block[y * BLOCK_SIZE + x] = plane[py * width + px] as f32 - 128.0;
        }
    }
    block
}

/// Blends every sample with its eight neighbours (edges replicated).
///
/// The centre weight is `1 - 8 * SF` and each neighbour weight is `SF`, with
/// `SF = smoothing_factor / 1024`, matching the IJG full-size smoothing filter.
fn smooth_plane(plane: &mut [u8], width: usize, height: usize, smoothing_factor: u8) {
    let member_scale = 65536 - smoothing_factor as i64 * 512;
    let neighbour_scale = smoothing_factor as i64 * 64;
    let original = plane.to_vec();
    let at = |x: isize, y: isize| -> i64 {
        let x = x.clamp(0, width as isize - 1) as usize;
        let y = y.clamp(0, height as isize - 1) as usize;
        original[y * width + x] as i64
    };

    for y in 0..height as isize {
        for x in 0..width as isize {
            let mut neighbour_sum = 0;
            for dy in -1..=1 {
                for dx in -1..=1 {
                    if dx != 0 || dy != 0 {
                        neighbour_sum += at(x + dx, y + dy);
                    }
                }
            }
            let value = (at(x, y) * member_scale + neighbour_sum * neighbour_scale + 32768) >> 16;
            plane[y as usize * width + x as usize] = value.clamp(0, 255) as u8;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jpeg1::decoder::Jpeg1Decoder;

    fn frame(width: u32, height: u32, colorspace: Colorspace) -> FrameInfo {
        FrameInfo {
            width,
            height,
            bits_per_sample: 8,
            component_count: colorspace.component_count().unwrap_or(0),
            colorspace,
        }
    }

    fn encode(encoder: &mut Jpeg1Encoder, source: &[u8], frame_info: &FrameInfo) -> Vec<u8> {
        let mut encoded = vec![0u8; Jpeg1Encoder::maximum_encoded_size(frame_info)];
        let length = encoder.encode(source, frame_info, &mut encoded).expect("Encode failed");
        encoded.truncate(length);
        encoded
    }

    fn decode(encoded: &[u8]) -> (FrameInfo, Vec<u8>) {
        let mut decoder = Jpeg1Decoder::new(encoded);
        decoder.read_header().expect("Read header failed");
        let info = decoder.frame_info().expect("Frame info missing");
        let mut decoded = vec![0u8; decoder.required_size().expect("Frame info missing")];
        decoder.decode(&mut decoded).expect("Decode failed");
        (info, decoded)
    }

    fn assert_close(source: &[u8], decoded: &[u8], tolerance: i32) {
        assert_eq!(source.len(), decoded.len());
        for i in 0..source.len() {
            let diff = (source[i] as i32 - decoded[i] as i32).abs();
            assert!(diff < tolerance, "Mismatch at index {}: src={} dec={} diff={}", i, source[i], decoded[i], diff);
        }
    }

    #[test]
    fn test_encode_decode_roundtrip_grayscale() {
        let frame_info = frame(16, 16, Colorspace::Grayscale);
        let source: Vec<u8> = (0..256).map(|i| ((i % 16) * 8 + (i / 16) * 4) as u8).collect();

        let mut encoder = Jpeg1Encoder::new();
        encoder.set_quality(90);
        let encoded = encode(&mut encoder, &source, &frame_info);
        assert_eq!(&encoded[..2], &[0xFF, 0xD8]);
        assert_eq!(&encoded[encoded.len() - 2..], &[0xFF, 0xD9]);

        let (info, decoded) = decode(&encoded);
        assert_eq!(info.colorspace, Colorspace::Grayscale);
        assert_close(&source, &decoded, 12);
    }

    #[test]
    fn test_encode_decode_roundtrip_color() {
        let frame_info = frame(13, 11, Colorspace::Rgb);
        let mut source = Vec::new();
        for y in 0..11u32 {
            for x in 0..13u32 {
                source.extend_from_slice(&[(x * 18) as u8, (y * 20) as u8, 200]);
            }
        }

        let mut encoder = Jpeg1Encoder::new();
        encoder.set_quality(95);
        let encoded = encode(&mut encoder, &source, &frame_info);
        let (info, decoded) = decode(&encoded);
        assert_eq!((info.width, info.height, info.colorspace), (13, 11, Colorspace::Rgb));
        assert_close(&source, &decoded, 16);
    }

    #[test]
    fn test_encode_decode_roundtrip_restart() {
        let frame_info = frame(32, 16, Colorspace::Grayscale);
        let source: Vec<u8> = (0..32 * 16).map(|i| (i * 7 % 200) as u8).collect();

        let mut encoder = Jpeg1Encoder::new();
        encoder.set_quality(100);
        encoder.set_restart_interval(3);
        let encoded = encode(&mut encoder, &source, &frame_info);
        assert!(encoded.windows(4).any(|w| w == [0xFF, 0xDD, 0x00, 0x04]));
        assert!(encoded.windows(2).any(|w| w == [0xFF, 0xD0]));
        assert!(encoded.windows(2).any(|w| w == [0xFF, 0xD1]));

        let (_, decoded) = decode(&encoded);
        assert_close(&source, &decoded, 8);
    }

    #[test]
    fn test_encode_decode_roundtrip_cmyk() {
        let frame_info = frame(8, 8, Colorspace::Cmyk);
        let source: Vec<u8> = (0..64).flat_map(|i| [i as u8 * 2, 100, 255 - i as u8, 30]).collect();

        let mut encoder = Jpeg1Encoder::new();
        encoder.set_quality(100);
        let encoded = encode(&mut encoder, &source, &frame_info);
        assert!(encoded.windows(7).any(|w| w == [0xFF, 0xEE, 0x00, 0x0E, b'A', b'd', b'o']));

        let (info, decoded) = decode(&encoded);
        assert_eq!(info.colorspace, Colorspace::Cmyk);
        assert_close(&source, &decoded, 6);
    }

    #[test]
    fn test_quality_changes_output() {
        let frame_info = frame(16, 16, Colorspace::Grayscale);
        let source: Vec<u8> = (0..256).map(|i| (i * 37 % 256) as u8).collect();

        let mut encoder = Jpeg1Encoder::new();
        encoder.set_quality(10);
        let low = encode(&mut encoder, &source, &frame_info);
        encoder.set_quality(95);
        let high = encode(&mut encoder, &source, &frame_info);
        assert!(low.len() < high.len());
    }

    #[test]
    fn test_smoothing_flattens_noise() {
        let mut plane: Vec<u8> = (0..16).map(|i| if i % 2 == 0 { 0 } else { 200 }).collect();
        let before = plane.clone();
        smooth_plane(&mut plane, 4, 4, 100);
        let spread = |p: &[u8]| p.iter().max().copied().unwrap_or(0) - p.iter().min().copied().unwrap_or(0);
        assert!(spread(&plane) < spread(&before));

        let mut flat = vec![90u8; 9];
        smooth_plane(&mut flat, 3, 3, 100);
        assert!(flat.iter().all(|&v| v == 90));
    }

    #[test]
    fn test_rejects_mismatched_colorspace() {
        let mut info = frame(8, 8, Colorspace::Rgb);
        info.component_count = 1;
        let mut destination = vec![0u8; 4096];
        let result = Jpeg1Encoder::new().encode(&[0; 64], &info, &mut destination);
        assert_eq!(result, Err(CodecError::UnsupportedColorspace));
    }
}
