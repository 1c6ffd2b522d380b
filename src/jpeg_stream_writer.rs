//! JPEG Codestream Writer utilities.
//!
//! This module provides the `JpegStreamWriter` which handles the generation
//! of JPEG markers and segments (SOI, EOI, DQT, DHT, SOF0, SOS, etc.).

use crate::FrameInfo;
use crate::error::CodecError;
use crate::jpeg_marker_code::{JPEG_MARKER_START_BYTE, JpegMarkerCode};
use crate::jpeg1::encoder::ZIGZAG_ORDER;

/// One Huffman table in a DHT segment: (class, id, code lengths, symbol values).
pub type HuffmanTableSpec<'t> = (u8, u8, &'t [u8; 16], &'t [u8]);

/// A writer for JPEG codestreams that manages marker and segment emission.
pub struct JpegStreamWriter<'a> {
    destination: &'a mut [u8],
    position: usize,
}

impl<'a> JpegStreamWriter<'a> {
    pub fn new(destination: &'a mut [u8]) -> Self {
        Self {
            destination,
            position: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.position
    }

    pub fn is_empty(&self) -> bool {
        self.position == 0
    }

    pub fn write_byte(&mut self, value: u8) -> Result<(), CodecError> {
        let slot = self
            .destination
            .get_mut(self.position)
            .ok_or(CodecError::DestinationTooSmall)?;
        *slot = value;
        self.position += 1;
        Ok(())
    }

    pub fn write_bytes(&mut self, values: &[u8]) -> Result<(), CodecError> {
        let end = self.position + values.len();
        let target = self
            .destination
            .get_mut(self.position..end)
            .ok_or(CodecError::DestinationTooSmall)?;
        target.copy_from_slice(values);
        self.position = end;
        Ok(())
    }

    pub fn write_u16(&mut self, value: u16) -> Result<(), CodecError> {
        self.write_bytes(&value.to_be_bytes())
    }

    pub fn write_marker(&mut self, marker: JpegMarkerCode) -> Result<(), CodecError> {
        self.write_byte(JPEG_MARKER_START_BYTE)?;
        self.write_byte(marker.into())
    }

    pub fn write_start_of_image(&mut self) -> Result<(), CodecError> {
        self.write_marker(JpegMarkerCode::StartOfImage)
    }

    pub fn write_end_of_image(&mut self) -> Result<(), CodecError> {
        self.write_marker(JpegMarkerCode::EndOfImage)
    }

    /// APP0 JFIF 1.01 header, aspect ratio 1:1, no thumbnail.
    pub fn write_jfif_segment(&mut self) -> Result<(), CodecError> {
        self.write_marker(JpegMarkerCode::ApplicationData0)?;
        self.write_u16(16)?;
        self.write_bytes(b"JFIF\0")?;
        self.write_bytes(&[1, 1])?; // Version 1.01
        self.write_byte(0)?; // Units: aspect ratio
        self.write_u16(1)?;
        self.write_u16(1)?;
        self.write_bytes(&[0, 0])?; // No thumbnail
        Ok(())
    }

    /// APP14 Adobe segment; `transform` is 0 for CMYK, 1 for YCbCr, 2 for YCCK.
    pub fn write_adobe_segment(&mut self, transform: u8) -> Result<(), CodecError> {
        self.write_marker(JpegMarkerCode::ApplicationData14)?;
        self.write_u16(14)?;
        self.write_bytes(b"Adobe")?;
        self.write_u16(100)?; // DCTEncode version
        self.write_u16(0)?; // flags0
        self.write_u16(0)?; // flags1
        self.write_byte(transform)?;
        Ok(())
    }

    /// `table` is in natural order; it is emitted in zigzag order.
    pub fn write_dqt(&mut self, table_id: u8, table: &[u8; 64]) -> Result<(), CodecError> {
        self.write_marker(JpegMarkerCode::DefineQuantizationTable)?;
        self.write_u16(2 + 1 + 64)?;
        self.write_byte(table_id & 0x0F)?; // Precision 0 (8-bit), ID
        for &natural_index in ZIGZAG_ORDER.iter() {
            self.write_byte(table[natural_index])?;
        }
        Ok(())
    }

    /// Writes several Huffman tables in a single DHT segment.
    pub fn write_dht_tables(&mut self, tables: &[HuffmanTableSpec<'_>]) -> Result<(), CodecError> {
        self.write_marker(JpegMarkerCode::DefineHuffmanTable)?;
        let length: usize = 2 + tables.iter().map(|(_, _, _, values)| 1 + 16 + values.len()).sum::<usize>();
        self.write_u16(length as u16)?;
        for &(table_class, table_id, lengths, values) in tables {
            self.write_byte(((table_class & 1) << 4) | (table_id & 0x0F))?;
            self.write_bytes(lengths)?;
            self.write_bytes(values)?;
        }
        Ok(())
    }

    /// SOF0 with 1x1 sampling; `table_ids[i]` selects the quantization table of component i.
    pub fn write_sof0_segment(&mut self, frame_info: &FrameInfo, table_ids: &[u8]) -> Result<(), CodecError> {
        self.write_marker(JpegMarkerCode::StartOfFrameBaseline)?;
        let length = 2 + 1 + 2 + 2 + 1 + (table_ids.len() * 3);
        self.write_u16(length as u16)?;
        self.write_byte(frame_info.bits_per_sample)?;
        self.write_u16(frame_info.height as u16)?;
        self.write_u16(frame_info.width as u16)?;
        self.write_byte(table_ids.len() as u8)?;

        for (i, &table_id) in table_ids.iter().enumerate() {
            self.write_byte((i + 1) as u8)?;
            self.write_byte(0x11)?; // Sampling factors 1x1
            self.write_byte(table_id)?;
        }
        Ok(())
    }

    /// SOS covering every component; `table_ids[i]` selects both Huffman tables of component i.
    pub fn write_sos_segment(&mut self, table_ids: &[u8]) -> Result<(), CodecError> {
        self.write_marker(JpegMarkerCode::StartOfScan)?;
        let length = 2 + 1 + (table_ids.len() * 2) + 3;
        self.write_u16(length as u16)?;
        self.write_byte(table_ids.len() as u8)?;
        for (i, &table_id) in table_ids.iter().enumerate() {
            self.write_byte((i + 1) as u8)?; // Component selector
            self.write_byte((table_id << 4) | table_id)?;
        }
        self.write_byte(0)?; // Ss
        self.write_byte(63)?; // Se
        self.write_byte(0)?; // Ah/Al
        Ok(())
    }

    pub fn write_dri(&mut self, restart_interval: u16) -> Result<(), CodecError> {
        self.write_marker(JpegMarkerCode::DefineRestartInterval)?;
        self.write_u16(4)?; // Length
        self.write_u16(restart_interval)
    }
}
