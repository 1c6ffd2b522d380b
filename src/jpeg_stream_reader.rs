use tracing::{trace, warn};

use crate::constants::BASELINE_BITS_PER_SAMPLE;
use crate::error::CodecError;
use crate::jpeg_marker_code::{JPEG_MARKER_START_BYTE, JpegMarkerCode};
use crate::jpeg1::encoder::ZIGZAG_ORDER;
use crate::jpeg1::huffman::HuffmanTable;
use crate::{Colorspace, FrameInfo};

#[derive(Debug, Clone, Default)]
pub struct JpegComponent {
    pub id: u8,
    pub h_samp_factor: u8,
    pub v_samp_factor: u8,
    pub quant_table_dest: u8,
    pub dc_table_dest: u8,
    pub ac_table_dest: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JpegStreamReaderState {
    BeforeStartOfImage,
    HeaderSection,
    ScanSection,
    EndOfImage,
}

pub struct JpegStreamReader<'a> {
    source: &'a [u8],
    position: usize,
    state: JpegStreamReaderState,
    frame_info: Option<FrameInfo>,
    /// Quantization tables in natural (row-major) order.
    pub quantization_tables: [Option<[u16; 64]>; 4],
    pub huffman_tables_dc: [Option<HuffmanTable>; 4],
    pub huffman_tables_ac: [Option<HuffmanTable>; 4],
    pub components: Vec<JpegComponent>,
    pub restart_interval: u16,
    pub scan_component_indices: Vec<usize>,
    /// Transform flag of an APP14 Adobe segment, when present.
    pub adobe_transform: Option<u8>,
    pub has_jfif_header: bool,
}

impl<'a> JpegStreamReader<'a> {
    pub fn new(source: &'a [u8]) -> Self {
        Self {
            source,
            position: 0,
            state: JpegStreamReaderState::BeforeStartOfImage,
            frame_info: None,
            quantization_tables: [None; 4],
            huffman_tables_dc: [const { None }; 4],
            huffman_tables_ac: [const { None }; 4],
            components: Vec::new(),
            restart_interval: 0,
            scan_component_indices: Vec::new(),
            adobe_transform: None,
            has_jfif_header: false,
        }
    }

    /// Frame parameters as declared by SOF; the colorspace is the decoded output colorspace.
    pub fn frame_info(&self) -> Result<FrameInfo, CodecError> {
        self.frame_info.ok_or(CodecError::StartOfFrameMarkerNotFound)
    }

    pub fn remaining_data(&self) -> &'a [u8] {
        self.source.get(self.position..).unwrap_or(&[])
    }

    pub fn position(&self) -> usize {
        self.position
    }

    pub fn advance(&mut self, count: usize) {
        self.position = (self.position + count).min(self.source.len());
    }

    /// Reads SOI and every segment up to (not including) the first SOS.
    pub fn read_header(&mut self) -> Result<(), CodecError> {
        self.read_start_of_image()?;

        loop {
            let marker = self.read_marker()?;
            if marker == JpegMarkerCode::StartOfScan {
                if self.frame_info.is_none() {
                    return Err(CodecError::StartOfFrameMarkerNotFound);
                }
                self.position -= 2;
                break;
            }
            if marker == JpegMarkerCode::EndOfImage {
                return Err(CodecError::UnexpectedEndOfImageMarker);
            }
            self.read_segment(marker)?;
        }
        Ok(())
    }

    /// Moves to the next scan, reading any table segments in between.
    ///
    /// Returns `false` once EOI (or the end of the data) is reached.
    pub fn read_next_scan(&mut self) -> Result<bool, CodecError> {
        loop {
            if !self.seek_marker() {
                warn!("JPEG stream ends without an EOI marker");
                self.state = JpegStreamReaderState::EndOfImage;
                return Ok(false);
            }
            let marker = self.read_marker()?;
            match marker {
                JpegMarkerCode::StartOfScan => {
                    self.read_start_of_scan_segment()?;
                    return Ok(true);
                }
                JpegMarkerCode::EndOfImage => {
                    self.state = JpegStreamReaderState::EndOfImage;
                    return Ok(false);
                }
                // A stray RSTm between scans carries no data.
                m if m.is_restart() => continue,
                m if m.is_start_of_frame() => return Err(CodecError::DuplicateStartOfFrameMarker),
                m => self.read_segment(m)?,
            }
        }
    }

    fn read_segment(&mut self, marker: JpegMarkerCode) -> Result<(), CodecError> {
        trace!(?marker, position = self.position, "reading segment");
        match marker {
            JpegMarkerCode::StartOfFrameBaseline | JpegMarkerCode::StartOfFrameExtended => self.read_sof_segment(),
            JpegMarkerCode::StartOfFrameProgressive | JpegMarkerCode::StartOfFrameLossless => {
                Err(CodecError::EncodingNotSupported)
            }
            JpegMarkerCode::DefineQuantizationTable => self.read_dqt_segment(),
            JpegMarkerCode::DefineHuffmanTable => self.read_dht_segment(),
            JpegMarkerCode::DefineRestartInterval => self.read_dri_segment(),
            JpegMarkerCode::ApplicationData0 => self.read_jfif_segment(),
            JpegMarkerCode::ApplicationData14 => self.read_adobe_segment(),
            JpegMarkerCode::StartOfImage => Err(CodecError::InvalidData),
            _ => self.skip_segment(),
        }
    }

    pub fn read_u8(&mut self) -> Result<u8, CodecError> {
        let val = *self.source.get(self.position).ok_or(CodecError::NeedMoreData)?;
        self.position += 1;
        Ok(val)
    }

    pub fn read_u16(&mut self) -> Result<u16, CodecError> {
        let b1 = self.read_u8()? as u16;
        let b2 = self.read_u8()? as u16;
        Ok((b1 << 8) | b2)
    }

    pub fn read_marker(&mut self) -> Result<JpegMarkerCode, CodecError> {
        if self.read_u8()? != JPEG_MARKER_START_BYTE {
            return Err(CodecError::JpegMarkerStartByteNotFound);
        }
        // Any number of 0xFF fill bytes may precede the marker code.
        let mut marker_byte = self.read_u8()?;
        while marker_byte == JPEG_MARKER_START_BYTE {
            marker_byte = self.read_u8()?;
        }
        match JpegMarkerCode::from_byte(marker_byte) {
            Ok(marker) => Ok(marker),
            Err(_) if is_unsupported_frame_marker(marker_byte) => Err(CodecError::EncodingNotSupported),
            Err(error) => Err(error),
        }
    }

    /// Skips entropy-coded leftovers until the next marker. Returns false at end of data.
    fn seek_marker(&mut self) -> bool {
        while self.position + 1 < self.source.len() {
            let next = self.source[self.position + 1];
            if self.source[self.position] == JPEG_MARKER_START_BYTE && next != 0x00 && next != JPEG_MARKER_START_BYTE {
                return true;
            }
            self.position += 1;
        }
        false
    }

    fn read_start_of_image(&mut self) -> Result<(), CodecError> {
        if self.source.len() < 2
            || self.source[0] != JPEG_MARKER_START_BYTE
            || self.source[1] != u8::from(JpegMarkerCode::StartOfImage)
        {
            return Err(CodecError::StartOfImageMarkerNotFound);
        }
        self.position = 2;
        self.state = JpegStreamReaderState::HeaderSection;
        Ok(())
    }

    /// Reads the length field and returns the position where the segment ends.
    fn read_segment_end(&mut self) -> Result<usize, CodecError> {
        let length = self.read_u16()? as usize;
        if length < 2 {
            return Err(CodecError::InvalidMarkerSegmentSize);
        }
        let end = self.position + length - 2;
        if end > self.source.len() {
            return Err(CodecError::NeedMoreData);
        }
        Ok(end)
    }

    pub fn skip_segment(&mut self) -> Result<(), CodecError> {
        let end = self.read_segment_end()?;
        self.position = end;
        Ok(())
    }

    fn read_sof_segment(&mut self) -> Result<(), CodecError> {
        if self.frame_info.is_some() {
            return Err(CodecError::DuplicateStartOfFrameMarker);
        }
        let end = self.read_segment_end()?;
        let bits_per_sample = self.read_u8()?;
        let height = self.read_u16()? as u32;
        let width = self.read_u16()? as u32;
        let component_count = self.read_u8()?;

        if bits_per_sample != BASELINE_BITS_PER_SAMPLE {
            return Err(CodecError::UnsupportedBitsPerSample);
        }
        if width == 0 {
            return Err(CodecError::InvalidArgumentWidth);
        }
        // A zero height defers to a DNL marker, which is not supported.
        if height == 0 {
            return Err(CodecError::InvalidArgumentHeight);
        }
        if !(1..=4).contains(&component_count) || component_count == 2 {
            return Err(CodecError::UnsupportedComponentCount);
        }
        if end != self.position + component_count as usize * 3 {
            return Err(CodecError::InvalidMarkerSegmentSize);
        }

        self.components.clear();
        for _ in 0..component_count {
            let id = self.read_u8()?;
            let sampling = self.read_u8()?;
            let tq = self.read_u8()?;
            let component = JpegComponent {
                id,
                h_samp_factor: sampling >> 4,
                v_samp_factor: sampling & 0x0F,
                quant_table_dest: tq,
                dc_table_dest: 0,
                ac_table_dest: 0,
            };
            if !(1..=4).contains(&component.h_samp_factor) || !(1..=4).contains(&component.v_samp_factor) {
                return Err(CodecError::UnsupportedSamplingFactor);
            }
            if tq >= 4 {
                return Err(CodecError::InvalidData);
            }
            self.components.push(component);
        }

        self.frame_info = Some(FrameInfo {
            width,
            height,
            bits_per_sample,
            component_count,
            colorspace: self.output_colorspace(component_count),
        });
        Ok(())
    }

    fn output_colorspace(&self, component_count: u8) -> Colorspace {
        match component_count {
            1 => Colorspace::Grayscale,
            3 => Colorspace::Rgb,
            _ => Colorspace::Cmyk,
        }
    }

    /// The colorspace the samples are stored in inside the stream.
    pub fn stored_colorspace(&self) -> Colorspace {
        match self.components.len() {
            1 => Colorspace::Grayscale,
            3 => {
                let ids: Vec<u8> = self.components.iter().map(|c| c.id).collect();
                match self.adobe_transform {
                    Some(0) => Colorspace::Rgb,
                    Some(_) => Colorspace::YCbCr,
                    None if !self.has_jfif_header && ids == [b'R', b'G', b'B'] => Colorspace::Rgb,
                    None => Colorspace::YCbCr,
                }
            }
            4 => match self.adobe_transform {
                Some(2) => Colorspace::Ycck,
                _ => Colorspace::Cmyk,
            },
            _ => Colorspace::Unknown,
        }
    }

    fn read_start_of_scan_segment(&mut self) -> Result<(), CodecError> {
        let end = self.read_segment_end()?;
        let components_in_scan = self.read_u8()? as usize;
        if components_in_scan == 0 || components_in_scan > self.components.len() {
            return Err(CodecError::InvalidData);
        }
        if end != self.position + components_in_scan * 2 + 3 {
            return Err(CodecError::InvalidMarkerSegmentSize);
        }
        self.scan_component_indices.clear();

        for _ in 0..components_in_scan {
            let id = self.read_u8()?;
            let selector = self.read_u8()?;
            let index = self
                .components
                .iter()
                .position(|c| c.id == id)
                .ok_or(CodecError::UnknownComponentId)?;
            let component = &mut self.components[index];
            component.dc_table_dest = selector >> 4;
            component.ac_table_dest = selector & 0x0F;
            if component.dc_table_dest >= 4 || component.ac_table_dest >= 4 {
                return Err(CodecError::InvalidData);
            }
            self.scan_component_indices.push(index);
        }
        let _ss = self.read_u8()?;
        let _se = self.read_u8()?;
        let _ah_al = self.read_u8()?;

        self.state = JpegStreamReaderState::ScanSection;
        Ok(())
    }

    pub fn read_dqt_segment(&mut self) -> Result<(), CodecError> {
        let end = self.read_segment_end()?;
        while self.position < end {
            let pq_tq = self.read_u8()?;
            let precision = pq_tq >> 4;
            let id = (pq_tq & 0x0F) as usize;
            if id >= 4 || precision > 1 {
                return Err(CodecError::InvalidData);
            }
            let mut table = [0u16; 64];
            for &natural_index in ZIGZAG_ORDER.iter() {
                table[natural_index] = if precision == 0 {
                    self.read_u8()? as u16
                } else {
                    self.read_u16()?
                };
            }
            self.quantization_tables[id] = Some(table);
        }
        if self.position != end {
            return Err(CodecError::InvalidMarkerSegmentSize);
        }
        Ok(())
    }

    pub fn read_dht_segment(&mut self) -> Result<(), CodecError> {
        let end = self.read_segment_end()?;
        while self.position < end {
            let tc_th = self.read_u8()?;
            let class = tc_th >> 4;
            let id = (tc_th & 0x0F) as usize;
            if id >= 4 || class > 1 {
                return Err(CodecError::InvalidData);
            }

            let mut lengths = [0u8; 16];
            for length in lengths.iter_mut() {
                *length = self.read_u8()?;
            }
            let total_values: usize = lengths.iter().map(|&l| l as usize).sum();
            if self.position + total_values > end {
                return Err(CodecError::InvalidMarkerSegmentSize);
            }

            let values = &self.source[self.position..self.position + total_values];
            self.position += total_values;

            let table = HuffmanTable::build_from_dht(&lengths, values)?;
            if class == 0 {
                self.huffman_tables_dc[id] = Some(table);
            } else {
                self.huffman_tables_ac[id] = Some(table);
            }
        }
        if self.position != end {
            return Err(CodecError::InvalidMarkerSegmentSize);
        }
        Ok(())
    }

    pub fn read_dri_segment(&mut self) -> Result<(), CodecError> {
        let length = self.read_u16()?;
        if length != 4 {
            return Err(CodecError::InvalidMarkerSegmentSize);
        }
        self.restart_interval = self.read_u16()?;
        Ok(())
    }

    fn read_jfif_segment(&mut self) -> Result<(), CodecError> {
        let end = self.read_segment_end()?;
        if self.source[self.position..end].starts_with(b"JFIF\0") {
            self.has_jfif_header = true;
        }
        self.position = end;
        Ok(())
    }

    fn read_adobe_segment(&mut self) -> Result<(), CodecError> {
        let end = self.read_segment_end()?;
        let payload = &self.source[self.position..end];
        if payload.len() >= 12 && payload.starts_with(b"Adobe") {
            self.adobe_transform = Some(payload[11]);
        }
        self.position = end;
        Ok(())
    }
}

// SOF5-SOF7 and SOF9-SOF15: hierarchical or arithmetic-coded frames.
fn is_unsupported_frame_marker(code: u8) -> bool {
    matches!(code, 0xC5..=0xC7 | 0xC9..=0xCB | 0xCD..=0xCF)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gray_header(extra: &[u8]) -> Vec<u8> {
        let mut data = vec![0xFF, 0xD8];
        data.extend_from_slice(extra);
        // SOF0: 8-bit, 16x8, one component
        data.extend_from_slice(&[0xFF, 0xC0, 0x00, 0x0B, 8, 0x00, 0x08, 0x00, 0x10, 1, 1, 0x11, 0]);
        // SOS
        data.extend_from_slice(&[0xFF, 0xDA, 0x00, 0x08, 1, 1, 0x00, 0, 63, 0]);
        data
    }

    #[test]
    fn test_reads_frame_header() {
        let data = gray_header(&[]);
        let mut reader = JpegStreamReader::new(&data);
        reader.read_header().unwrap();
        let info = reader.frame_info().unwrap();
        assert_eq!((info.width, info.height, info.component_count), (16, 8, 1));
        assert_eq!(info.colorspace, Colorspace::Grayscale);
        assert!(reader.read_next_scan().unwrap());
        assert_eq!(reader.scan_component_indices, vec![0]);
    }

    #[test]
    fn test_missing_start_of_image() {
        let mut reader = JpegStreamReader::new(&[0x00, 0x01, 0x02]);
        assert_eq!(reader.read_header(), Err(CodecError::StartOfImageMarkerNotFound));
    }

    #[test]
    fn test_progressive_frames_are_rejected() {
        let data = [0xFF, 0xD8, 0xFF, 0xC2, 0x00, 0x0B, 8, 0, 8, 0, 8, 1, 1, 0x11, 0];
        let mut reader = JpegStreamReader::new(&data);
        assert_eq!(reader.read_header(), Err(CodecError::EncodingNotSupported));
    }

    #[test]
    fn test_reads_dqt_in_zigzag_order() {
        let mut dqt = vec![0xFF, 0xDB, 0x00, 0x43, 0x00];
        dqt.extend((1..=64).map(|v| v as u8));
        let data = gray_header(&dqt);
        let mut reader = JpegStreamReader::new(&data);
        reader.read_header().unwrap();
        let table = reader.quantization_tables[0].unwrap();
        assert_eq!(table[0], 1);
        assert_eq!(table[1], 2); // zigzag 1 -> natural 1
        assert_eq!(table[8], 3); // zigzag 2 -> natural 8
        assert_eq!(table[63], 64);
    }

    #[test]
    fn test_adobe_transform_selects_stored_colorspace() {
        let adobe = [0xFF, 0xEE, 0x00, 0x0E, b'A', b'd', b'o', b'b', b'e', 0, 100, 0, 0, 0, 0, 2];
        let mut data = vec![0xFF, 0xD8];
        data.extend_from_slice(&adobe);
        data.extend_from_slice(&[
            0xFF, 0xC0, 0x00, 0x14, 8, 0, 8, 0, 8, 4, 1, 0x11, 0, 2, 0x11, 0, 3, 0x11, 0, 4, 0x11, 0,
        ]);
        data.extend_from_slice(&[0xFF, 0xDA, 0x00, 0x08, 1, 1, 0x00, 0, 63, 0]);
        let mut reader = JpegStreamReader::new(&data);
        reader.read_header().unwrap();
        assert_eq!(reader.adobe_transform, Some(2));
        assert_eq!(reader.stored_colorspace(), Colorspace::Ycck);
        assert_eq!(reader.frame_info().unwrap().colorspace, Colorspace::Cmyk);
    }

    #[test]
    fn test_truncated_segment() {
        let data = [0xFF, 0xD8, 0xFF, 0xDB, 0x00, 0x43, 0x00, 0x01];
        let mut reader = JpegStreamReader::new(&data);
        assert_eq!(reader.read_header(), Err(CodecError::NeedMoreData));
    }
}
