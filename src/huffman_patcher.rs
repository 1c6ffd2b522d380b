//! Repairs JPEG streams that omit their Huffman table definitions.
//!
//! Motion-JPEG frames and some camera firmware emit streams without a DHT
//! segment and expect the decoder to fall back to the standard tables from
//! ITU-T T.81 Annex K. Decoders that require explicit tables cannot read those
//! streams, so the default tables are spliced in right before the baseline
//! frame header.

use std::borrow::Cow;

use tracing::{debug, trace};

use crate::constants::{DEFINE_HUFFMAN_TABLE_SIGNATURE, START_OF_FRAME_BASELINE_SIGNATURE};

/// A complete DHT segment carrying the four standard baseline tables:
/// luminance DC (0x00), luminance AC (0x10), chrominance DC (0x01) and
/// chrominance AC (0x11).
#[rustfmt::skip]
pub const DEFAULT_HUFFMAN_TABLES: [u8; 420] = [
    0xFF, 0xC4, 0x01, 0xA2,
    // Luminance DC
    0x00,
    0x00, 0x01, 0x05, 0x01, 0x01, 0x01, 0x01, 0x01, 0x01, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
    0x00, 0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08, 0x09, 0x0A, 0x0B,
    // Luminance AC
    0x10,
    0x00, 0x02, 0x01, 0x03, 0x03, 0x02, 0x04, 0x03, 0x05, 0x05, 0x04, 0x04, 0x00, 0x00, 0x01, 0x7D,
    0x01, 0x02, 0x03, 0x00, 0x04, 0x11, 0x05, 0x12, 0x21, 0x31, 0x41, 0x06, 0x13, 0x51, 0x61, 0x07,
    0x22, 0x71, 0x14, 0x32, 0x81, 0x91, 0xA1, 0x08, 0x23, 0x42, 0xB1, 0xC1, 0x15, 0x52, 0xD1, 0xF0,
    0x24, 0x33, 0x62, 0x72, 0x82, 0x09, 0x0A, 0x16, 0x17, 0x18, 0x19, 0x1A, 0x25, 0x26, 0x27, 0x28,
    0x29, 0x2A, 0x34, 0x35, 0x36, 0x37, 0x38, 0x39, 0x3A, 0x43, 0x44, 0x45, 0x46, 0x47, 0x48, 0x49,
    0x4A, 0x53, 0x54, 0x55, 0x56, 0x57, 0x58, 0x59, 0x5A, 0x63, 0x64, 0x65, 0x66, 0x67, 0x68, 0x69,
    0x6A, 0x73, 0x74, 0x75, 0x76, 0x77, 0x78, 0x79, 0x7A, 0x83, 0x84, 0x85, 0x86, 0x87, 0x88, 0x89,
    0x8A, 0x92, 0x93, 0x94, 0x95, 0x96, 0x97, 0x98, 0x99, 0x9A, 0xA2, 0xA3, 0xA4, 0xA5, 0xA6, 0xA7,
    0xA8, 0xA9, 0xAA, 0xB2, 0xB3, 0xB4, 0xB5, 0xB6, 0xB7, 0xB8, 0xB9, 0xBA, 0xC2, 0xC3, 0xC4, 0xC5,
    0xC6, 0xC7, 0xC8, 0xC9, 0xCA, 0xD2, 0xD3, 0xD4, 0xD5, 0xD6, 0xD7, 0xD8, 0xD9, 0xDA, 0xE1, 0xE2,
    0xE3, 0xE4, 0xE5, 0xE6, 0xE7, 0xE8, 0xE9, 0xEA, 0xF1, 0xF2, 0xF3, 0xF4, 0xF5, 0xF6, 0xF7, 0xF8,
    0xF9, 0xFA,
    // Chrominance DC
    0x01,
    0x00, 0x03, 0x01, 0x01, 0x01, 0x01, 0x01, 0x01, 0x01, 0x01, 0x01, 0x00, 0x00, 0x00, 0x00, 0x00,
    0x00, 0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08, 0x09, 0x0A, 0x0B,
    // Chrominance AC
    0x11,
    0x00, 0x02, 0x01, 0x02, 0x04, 0x04, 0x03, 0x04, 0x07, 0x05, 0x04, 0x04, 0x00, 0x01, 0x02, 0x77,
    0x00, 0x01, 0x02, 0x03, 0x11, 0x04, 0x05, 0x21, 0x31, 0x06, 0x12, 0x41, 0x51, 0x07, 0x61, 0x71,
    0x13, 0x22, 0x32, 0x81, 0x08, 0x14, 0x42, 0x91, 0xA1, 0xB1, 0xC1, 0x09, 0x23, 0x33, 0x52, 0xF0,
    0x15, 0x62, 0x72, 0xD1, 0x0A, 0x16, 0x24, 0x34, 0xE1, 0x25, 0xF1, 0x17, 0x18, 0x19, 0x1A, 0x26,
    0x27, 0x28, 0x29, 0x2A, 0x35, 0x36, 0x37, 0x38, 0x39, 0x3A, 0x43, 0x44, 0x45, 0x46, 0x47, 0x48,
    0x49, 0x4A, 0x53, 0x54, 0x55, 0x56, 0x57, 0x58, 0x59, 0x5A, 0x63, 0x64, 0x65, 0x66, 0x67, 0x68,
    0x69, 0x6A, 0x73, 0x74, 0x75, 0x76, 0x77, 0x78, 0x79, 0x7A, 0x82, 0x83, 0x84, 0x85, 0x86, 0x87,
    0x88, 0x89, 0x8A, 0x92, 0x93, 0x94, 0x95, 0x96, 0x97, 0x98, 0x99, 0x9A, 0xA2, 0xA3, 0xA4, 0xA5,
    0xA6, 0xA7, 0xA8, 0xA9, 0xAA, 0xB2, 0xB3, 0xB4, 0xB5, 0xB6, 0xB7, 0xB8, 0xB9, 0xBA, 0xC2, 0xC3,
    0xC4, 0xC5, 0xC6, 0xC7, 0xC8, 0xC9, 0xCA, 0xD2, 0xD3, 0xD4, 0xD5, 0xD6, 0xD7, 0xD8, 0xD9, 0xDA,
    0xE2, 0xE3, 0xE4, 0xE5, 0xE6, 0xE7, 0xE8, 0xE9, 0xEA, 0xF2, 0xF3, 0xF4, 0xF5, 0xF6, 0xF7, 0xF8,
    0xF9, 0xFA,
];

/// Output of [`patch_huffman_tables`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Patched<'a> {
    pub data: Cow<'a, [u8]>,
    /// True when the default tables were inserted.
    pub patched: bool,
}

impl Patched<'_> {
    pub fn into_owned(self) -> Vec<u8> {
        self.data.into_owned()
    }
}

/// Inserts [`DEFAULT_HUFFMAN_TABLES`] in front of the first SOF0 marker when no
/// DHT marker precedes it.
///
/// The input is returned untouched when a DHT marker comes first, or when
/// neither marker occurs anywhere in the buffer.
pub fn patch_huffman_tables(data: &[u8]) -> Patched<'_> {
    let Some(offset) = find_insertion_offset(data) else {
        return Patched {
            data: Cow::Borrowed(data),
            patched: false,
        };
    };

    debug!(offset, "inserting default Huffman tables before SOF0");
    let mut output = Vec::with_capacity(data.len() + DEFAULT_HUFFMAN_TABLES.len());
    output.extend_from_slice(&data[..offset]);
    output.extend_from_slice(&DEFAULT_HUFFMAN_TABLES);
    output.extend_from_slice(&data[offset..]);

    Patched {
        data: Cow::Owned(output),
        patched: true,
    }
}

// The scan stops at n-1 so a trailing 0xFF is never paired with a byte past the end.
fn find_insertion_offset(data: &[u8]) -> Option<usize> {
    for (position, pair) in data.windows(2).enumerate() {
        if pair == DEFINE_HUFFMAN_TABLE_SIGNATURE {
            trace!(position, "stream already defines Huffman tables");
            return None;
        }
        if pair == START_OF_FRAME_BASELINE_SIGNATURE {
            return Some(position);
        }
    }
    trace!("no DHT or SOF0 marker found, leaving stream untouched");
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jpeg_stream_writer::JpegStreamWriter;
    use crate::jpeg1::huffman::{
        STD_CHROMINANCE_AC_LENGTHS, STD_CHROMINANCE_AC_VALUES, STD_CHROMINANCE_DC_LENGTHS,
        STD_CHROMINANCE_DC_VALUES, STD_LUMINANCE_AC_LENGTHS, STD_LUMINANCE_AC_VALUES,
        STD_LUMINANCE_DC_LENGTHS, STD_LUMINANCE_DC_VALUES,
    };

    const ABBREVIATED: [u8; 12] = [
        0xFF, 0xD8, // SOI
        0xFF, 0xDB, 0x00, 0x02, // empty DQT
        0xFF, 0xC0, 0x00, 0x02, // truncated SOF0
        0xFF, 0xD9, // EOI
    ];

    #[test]
    fn test_inserts_tables_at_frame_header_offset() {
        let result = patch_huffman_tables(&ABBREVIATED);
        assert!(result.patched);
        let data = result.data;
        assert_eq!(data.len(), ABBREVIATED.len() + DEFAULT_HUFFMAN_TABLES.len());
        assert_eq!(&data[..6], &ABBREVIATED[..6]);
        assert_eq!(&data[6..6 + DEFAULT_HUFFMAN_TABLES.len()], &DEFAULT_HUFFMAN_TABLES[..]);
        assert_eq!(&data[6 + DEFAULT_HUFFMAN_TABLES.len()..], &ABBREVIATED[6..]);
    }

    #[test]
    fn test_patching_is_idempotent() {
        let once = patch_huffman_tables(&ABBREVIATED).into_owned();
        let twice = patch_huffman_tables(&once);
        assert!(!twice.patched);
        assert_eq!(twice.data.as_ref(), once.as_slice());
        assert!(matches!(twice.data, Cow::Borrowed(_)));
    }

    #[test]
    fn test_existing_tables_are_left_alone() {
        let data = [0xFF, 0xD8, 0xFF, 0xC4, 0x00, 0x02, 0xFF, 0xC0, 0x00, 0x02];
        let result = patch_huffman_tables(&data);
        assert!(!result.patched);
        assert_eq!(result.data.as_ref(), &data[..]);
    }

    #[test]
    fn test_missing_markers_leave_stream_untouched() {
        for data in [&[][..], &[0xFF][..], &[0xFF, 0xD8, 0x00, 0xFF][..]] {
            let result = patch_huffman_tables(data);
            assert!(!result.patched);
            assert_eq!(result.data.as_ref(), data);
        }
    }

    #[test]
    fn test_frame_header_at_end_of_buffer() {
        let data = [0x00, 0xFF, 0xC0];
        let result = patch_huffman_tables(&data);
        assert!(result.patched);
        assert_eq!(&result.data[1..5], &[0xFF, 0xC4, 0x01, 0xA2]);
        assert_eq!(&result.data[result.data.len() - 2..], &[0xFF, 0xC0]);
    }

    #[test]
    fn test_default_tables_match_standard_definitions() {
        let mut buffer = vec![0u8; 1024];
        let mut writer = JpegStreamWriter::new(&mut buffer);
        writer
            .write_dht_tables(&[
                (0, 0, &STD_LUMINANCE_DC_LENGTHS, &STD_LUMINANCE_DC_VALUES[..]),
                (1, 0, &STD_LUMINANCE_AC_LENGTHS, &STD_LUMINANCE_AC_VALUES[..]),
                (0, 1, &STD_CHROMINANCE_DC_LENGTHS, &STD_CHROMINANCE_DC_VALUES[..]),
                (1, 1, &STD_CHROMINANCE_AC_LENGTHS, &STD_CHROMINANCE_AC_VALUES[..]),
            ])
            .unwrap();
        let length = writer.len();
        assert_eq!(&buffer[..length], &DEFAULT_HUFFMAN_TABLES[..]);
    }
}
