use crate::constants::JPEG_SIGNATURE;

/// Returns true when `data` starts with the JPEG SOI marker.
///
/// Streams of two bytes or fewer can hold nothing but the marker itself and are
/// never treated as compressed images.
pub fn is_compressed_stream(data: &[u8]) -> bool {
    data.len() > JPEG_SIGNATURE.len() && data.starts_with(&JPEG_SIGNATURE)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_streams_are_never_compressed() {
        assert!(!is_compressed_stream(&[]));
        assert!(!is_compressed_stream(&[0xFF]));
        assert!(!is_compressed_stream(&[0xFF, 0xD8]));
    }

    #[test]
    fn test_signature_ignores_trailing_content() {
        assert!(is_compressed_stream(&[0xFF, 0xD8, 0x00]));
        assert!(is_compressed_stream(&[0xFF, 0xD8, 0xFF, 0xE0, 0x12, 0x34]));
        assert!(!is_compressed_stream(b"BM\x00\x00"));
        assert!(!is_compressed_stream(&[0xD8, 0xFF, 0x00]));
    }
}
