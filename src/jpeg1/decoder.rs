//! JPEG 1 Baseline Decoder implementation.
//!
//! Decodes sequential Huffman-coded frames (SOF0/SOF1, 8-bit) with any mix of
//! interleaved and single-component scans. Subsampled components are
//! upsampled by replication before colour conversion.

use tracing::debug;

use crate::jpeg_marker_code::JpegMarkerCode;
use crate::jpeg_stream_reader::{JpegComponent, JpegStreamReader};
use crate::jpeg1::dct::{BLOCK_DIM, BLOCK_SIZE, idct_8x8_baseline};
use crate::jpeg1::encoder::{ZIGZAG_ORDER, clamp_to_u8};
use crate::jpeg1::huffman::{HuffmanEncoder, HuffmanTable, JpegBitReader};
use crate::jpeg1::quantization::dequantize_block;
use crate::{CodecError, Colorspace, FrameInfo};

/// Decoded samples of one component, padded to whole blocks.
struct ComponentPlane {
    stride: usize,
    samples: Vec<u8>,
}

pub struct Jpeg1Decoder<'a> {
    reader: JpegStreamReader<'a>,
}

impl<'a> Jpeg1Decoder<'a> {
    pub fn new(source: &'a [u8]) -> Self {
        Self {
            reader: JpegStreamReader::new(source),
        }
    }

    pub fn read_header(&mut self) -> Result<(), CodecError> {
        self.reader.read_header()
    }

    /// Output frame: Grayscale, Rgb or Cmyk, 8 bits per sample.
    pub fn frame_info(&self) -> Result<FrameInfo, CodecError> {
        self.reader.frame_info()
    }

    pub fn required_size(&self) -> Result<usize, CodecError> {
        let info = self.reader.frame_info()?;
        Ok(info.width as usize * info.height as usize * info.component_count as usize)
    }

    /// Decodes every scan into `destination` as interleaved output samples.
    pub fn decode(&mut self, destination: &mut [u8]) -> Result<(), CodecError> {
        let frame_info = self.reader.frame_info()?;
        if destination.len() < self.required_size()? {
            return Err(CodecError::DestinationTooSmall);
        }

        let width = frame_info.width as usize;
        let height = frame_info.height as usize;
        let h_max = self.reader.components.iter().map(|c| c.h_samp_factor as usize).max().unwrap_or(1);
        let v_max = self.reader.components.iter().map(|c| c.v_samp_factor as usize).max().unwrap_or(1);
        let mcus_x = width.div_ceil(BLOCK_SIZE * h_max);
        let mcus_y = height.div_ceil(BLOCK_SIZE * v_max);

        let mut planes: Vec<ComponentPlane> = self
            .reader
            .components
            .iter()
            .map(|c| {
                let stride = mcus_x * c.h_samp_factor as usize * BLOCK_SIZE;
                let rows = mcus_y * c.v_samp_factor as usize * BLOCK_SIZE;
                ComponentPlane {
                    stride,
                    samples: vec![0u8; stride * rows],
                }
            })
            .collect();

        let mut scans = 0;
        while self.reader.read_next_scan()? {
            let scan = ScanLayout {
                width,
                height,
                h_max,
                v_max,
                mcus_x,
                mcus_y,
            };
            self.decode_scan(&scan, &mut planes)?;
            scans += 1;
        }
        if scans == 0 {
            return Err(CodecError::InvalidData);
        }

        let stored = self.reader.stored_colorspace();
        let adobe = self.reader.adobe_transform.is_some();
        debug!(width, height, scans, ?stored, "decoded baseline JPEG");

        let components = &self.reader.components;
        let output_components = frame_info.component_count as usize;
        let mut pixel = [0u8; 4];
        for y in 0..height {
            for x in 0..width {
                for (c, (plane, component)) in planes.iter().zip(components).enumerate() {
                    let sx = x * component.h_samp_factor as usize / h_max;
                    let sy = y * component.v_samp_factor as usize / v_max;
                    pixel[c] = plane.samples[sy * plane.stride + sx];
                }
                let offset = (y * width + x) * output_components;
                convert_pixel(&pixel, stored, adobe, &mut destination[offset..offset + output_components]);
            }
        }
        Ok(())
    }

    fn decode_scan(&mut self, scan: &ScanLayout, planes: &mut [ComponentPlane]) -> Result<(), CodecError> {
        let scan_components = self.reader.scan_component_indices.clone();
        let restart_interval = self.reader.restart_interval as usize;
        let components = self.reader.components.clone();

        let mut units: Vec<ScanUnit> = Vec::with_capacity(scan_components.len());
        for &index in &scan_components {
            let component = &components[index];
            let quant_table = self.reader.quantization_tables[component.quant_table_dest as usize]
                .ok_or(CodecError::MissingQuantizationTable)?;
            let dc_table = self.reader.huffman_tables_dc[component.dc_table_dest as usize]
                .as_ref()
                .ok_or(CodecError::MissingHuffmanTable)?;
            let ac_table = self.reader.huffman_tables_ac[component.ac_table_dest as usize]
                .as_ref()
                .ok_or(CodecError::MissingHuffmanTable)?;
            units.push(ScanUnit {
                plane: index,
                component: component.clone(),
                quant_table,
                dc_table,
                ac_table,
            });
        }

        let mut bit_reader = JpegBitReader::new(self.reader.remaining_data());
        let mut dc_preds = [0i16; 4];
        let mut next_restart_index = 0u8;

        // A single-component scan codes one block per MCU and covers only the
        // component's own extent; interleaved scans code H x V blocks per component.
        let single = units.len() == 1;
        let (mcus_per_line, mcu_count) = if single {
            let component = &units[0].component;
            let blocks_w = (scan.width * component.h_samp_factor as usize).div_ceil(scan.h_max).div_ceil(BLOCK_SIZE);
            let blocks_h = (scan.height * component.v_samp_factor as usize).div_ceil(scan.v_max).div_ceil(BLOCK_SIZE);
            (blocks_w, blocks_w * blocks_h)
        } else {
            (scan.mcus_x, scan.mcus_x * scan.mcus_y)
        };

        for mcu in 0..mcu_count {
            if restart_interval > 0 && mcu > 0 && mcu % restart_interval == 0 {
                bit_reader.read_restart_marker(JpegMarkerCode::restart(next_restart_index))?;
                next_restart_index = (next_restart_index + 1) % 8;
                dc_preds = [0; 4];
            }
            let (mx, my) = (mcu % mcus_per_line, mcu / mcus_per_line);
            for (u, unit) in units.iter().enumerate() {
                let (h, v) = if single {
                    (1, 1)
                } else {
                    (unit.component.h_samp_factor as usize, unit.component.v_samp_factor as usize)
                };
                for by in 0..v {
                    for bx in 0..h {
                        let block = decode_block(&mut bit_reader, unit, &mut dc_preds[u])?;
                        store_block(&mut planes[unit.plane], &block, mx * h + bx, my * v + by);
                    }
                }
            }
        }

        let consumed = bit_reader.position();
        self.reader.advance(consumed);
        Ok(())
    }
}

struct ScanLayout {
    width: usize,
    height: usize,
    h_max: usize,
    v_max: usize,
    mcus_x: usize,
    mcus_y: usize,
}

struct ScanUnit<'t> {
    plane: usize,
    component: JpegComponent,
    quant_table: [u16; BLOCK_DIM],
    dc_table: &'t HuffmanTable,
    ac_table: &'t HuffmanTable,
}

fn decode_block(reader: &mut JpegBitReader, unit: &ScanUnit, dc_pred: &mut i16) -> Result<[f32; BLOCK_DIM], CodecError> {
    let mut coefficients = [0i16; BLOCK_DIM];

    let category = unit.dc_table.decode(reader)?;
    if category > 11 {
        return Err(CodecError::InvalidData);
    }
    let bits = reader.read_bits(category)?;
    *dc_pred = dc_pred.wrapping_add(HuffmanEncoder::decode_value_bits(bits, category));
    coefficients[0] = *dc_pred;

    let mut k = 1;
    while k < BLOCK_DIM {
        let symbol = unit.ac_table.decode(reader)?;
        let run = (symbol >> 4) as usize;
        let size = symbol & 0x0F;
        if size == 0 {
            if run == 15 {
                k += 16;
                continue;
            }
            break;
        }
        k += run;
        if k >= BLOCK_DIM {
            return Err(CodecError::InvalidData);
        }
        let bits = reader.read_bits(size)?;
        coefficients[ZIGZAG_ORDER[k]] = HuffmanEncoder::decode_value_bits(bits, size);
        k += 1;
    }

    let mut dequantized = [0.0f32; BLOCK_DIM];
    dequantize_block(&coefficients, &unit.quant_table, &mut dequantized);
    let mut spatial = [0.0f32; BLOCK_DIM];
    idct_8x8_baseline(&dequantized, &mut spatial);
    Ok(spatial)
}

fn store_block(plane: &mut ComponentPlane, block: &[f32; BLOCK_DIM], block_x: usize, block_y: usize) {
    let rows = plane.samples.len() / plane.stride;
    for y in 0..BLOCK_SIZE {
        let py = block_y * BLOCK_SIZE + y;
        if py >= rows {
            return;
        }
        for x in 0..BLOCK_SIZE {
            let px = block_x * BLOCK_SIZE + x;
            if px < plane.stride {
                plane.samples[py * plane.stride + px] = clamp_to_u8(block[y * BLOCK_SIZE + x] + 128.0);
            }
        }
    }
}

pub fn ycbcr_to_rgb(y: u8, cb: u8, cr: u8) -> (u8, u8, u8) {
    let y = y as f32;
    let cb = cb as f32 - 128.0;
    let cr = cr as f32 - 128.0;
    let r = y + 1.402 * cr;
    let g = y - 0.344_136 * cb - 0.714_136 * cr;
    let b = y + 1.772 * cb;
    (clamp_to_u8(r), clamp_to_u8(g), clamp_to_u8(b))
}

fn convert_pixel(pixel: &[u8; 4], stored: Colorspace, adobe: bool, output: &mut [u8]) {
    match stored {
        Colorspace::YCbCr => {
            let (r, g, b) = ycbcr_to_rgb(pixel[0], pixel[1], pixel[2]);
            output.copy_from_slice(&[r, g, b]);
        }
        Colorspace::Ycck => {
            let (r, g, b) = ycbcr_to_rgb(pixel[0], pixel[1], pixel[2]);
            output.copy_from_slice(&[r, g, b, 255 - pixel[3]]);
            for value in &mut output[..3] {
                *value = 255 - *value;
            }
        }
        // Adobe writers store CMYK inverted.
        Colorspace::Cmyk if adobe => {
            for (out, &value) in output.iter_mut().zip(pixel) {
                *out = 255 - value;
            }
        }
        _ => output.copy_from_slice(&pixel[..output.len()]),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jpeg_stream_writer::JpegStreamWriter;
    use crate::jpeg1::huffman::{
        JpegBitWriter, STD_CHROMINANCE_AC_LENGTHS, STD_CHROMINANCE_AC_VALUES, STD_CHROMINANCE_DC_LENGTHS,
        STD_CHROMINANCE_DC_VALUES, STD_LUMINANCE_AC_LENGTHS, STD_LUMINANCE_AC_VALUES, STD_LUMINANCE_DC_LENGTHS,
        STD_LUMINANCE_DC_VALUES,
    };

    /// Writes a flat-colour 4:2:0 YCbCr frame of 16x16 pixels: one MCU of six blocks.
    fn flat_420_stream(y: i16, cb: i16, cr: i16) -> Vec<u8> {
        let mut buffer = vec![0u8; 2048];
        let length = {
            let mut writer = JpegStreamWriter::new(&mut buffer);
            writer.write_start_of_image().unwrap();
            writer.write_jfif_segment().unwrap();
            writer.write_dqt(0, &[1; 64]).unwrap();
            writer
                .write_dht_tables(&[
                    (0, 0, &STD_LUMINANCE_DC_LENGTHS, &STD_LUMINANCE_DC_VALUES[..]),
                    (1, 0, &STD_LUMINANCE_AC_LENGTHS, &STD_LUMINANCE_AC_VALUES[..]),
                    (0, 1, &STD_CHROMINANCE_DC_LENGTHS, &STD_CHROMINANCE_DC_VALUES[..]),
                    (1, 1, &STD_CHROMINANCE_AC_LENGTHS, &STD_CHROMINANCE_AC_VALUES[..]),
                ])
                .unwrap();
            writer
                .write_bytes(&[0xFF, 0xC0, 0x00, 0x11, 8, 0, 16, 0, 16, 3, 1, 0x22, 0, 2, 0x11, 0, 3, 0x11, 0])
                .unwrap();
            writer.write_sos_segment(&[0, 1, 1]).unwrap();

            let tables = [
                (HuffmanTable::standard_luminance_dc(), HuffmanTable::standard_luminance_ac()),
                (HuffmanTable::standard_chrominance_dc(), HuffmanTable::standard_chrominance_ac()),
            ];
            {
                let mut bits = JpegBitWriter::new(&mut writer);
                // DC level: block mean of v - 128 scaled by 8.
                let blocks = [(0, y, true), (0, 0, false), (0, 0, false), (0, 0, false), (1, cb, true), (1, cr, true)];
                for (table, value, first) in blocks {
                    let (dc, ac) = &tables[table];
                    let diff = if first { (value - 128) * 8 } else { value };
                    let category = HuffmanEncoder::get_category(diff);
                    let code = dc.codes[category as usize];
                    bits.write_bits(code.value, code.length).unwrap();
                    let (value_bits, value_len) = HuffmanEncoder::get_diff_bits(diff, category);
                    bits.write_bits(value_bits, value_len).unwrap();
                    let eob = ac.codes[0];
                    bits.write_bits(eob.value, eob.length).unwrap();
                }
                bits.flush().unwrap();
            }
            writer.write_end_of_image().unwrap();
            writer.len()
        };
        buffer.truncate(length);
        buffer
    }

    #[test]
    fn test_decodes_subsampled_frame() {
        let stream = flat_420_stream(128, 128, 128);
        let mut decoder = Jpeg1Decoder::new(&stream);
        decoder.read_header().unwrap();
        assert_eq!(decoder.frame_info().unwrap().colorspace, Colorspace::Rgb);
        let mut output = vec![0u8; decoder.required_size().unwrap()];
        decoder.decode(&mut output).unwrap();
        assert!(output.iter().all(|&v| v == 128));
    }

    #[test]
    fn test_decodes_subsampled_colour() {
        // Pure red in YCbCr is roughly (76, 85, 255).
        let stream = flat_420_stream(76, 85, 255);
        let mut decoder = Jpeg1Decoder::new(&stream);
        decoder.read_header().unwrap();
        let mut output = vec![0u8; decoder.required_size().unwrap()];
        decoder.decode(&mut output).unwrap();
        for pixel in output.chunks(3) {
            assert!(pixel[0] > 240 && pixel[1] < 15 && pixel[2] < 15, "{pixel:?}");
        }
    }

    #[test]
    fn test_rejects_small_destination() {
        let stream = flat_420_stream(128, 128, 128);
        let mut decoder = Jpeg1Decoder::new(&stream);
        decoder.read_header().unwrap();
        let mut output = vec![0u8; 10];
        assert_eq!(decoder.decode(&mut output), Err(CodecError::DestinationTooSmall));
    }

    #[test]
    fn test_missing_huffman_table() {
        let mut stream = vec![0xFF, 0xD8];
        stream.extend_from_slice(&[0xFF, 0xDB, 0x00, 0x43, 0x00]);
        stream.extend_from_slice(&[1; 64]);
        stream.extend_from_slice(&[0xFF, 0xC0, 0x00, 0x0B, 8, 0, 8, 0, 8, 1, 1, 0x11, 0]);
        stream.extend_from_slice(&[0xFF, 0xDA, 0x00, 0x08, 1, 1, 0x00, 0, 63, 0, 0x00, 0xFF, 0xD9]);
        let mut decoder = Jpeg1Decoder::new(&stream);
        decoder.read_header().unwrap();
        let mut output = vec![0u8; 64];
        assert_eq!(decoder.decode(&mut output), Err(CodecError::MissingHuffmanTable));
    }

    #[test]
    fn test_ycbcr_to_rgb_neutral() {
        assert_eq!(ycbcr_to_rgb(200, 128, 128), (200, 200, 200));
    }
}
