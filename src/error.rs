use thiserror::Error;

/// Failures raised by a codec engine while encoding or decoding a JPEG stream.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodecError {
    #[error("Need more data")]
    NeedMoreData = 1,
    #[error("Invalid data")]
    InvalidData = 2,
    #[error("Destination too small")]
    DestinationTooSmall = 3,
    #[error("Encoding not supported")]
    EncodingNotSupported = 4,
    #[error("JPEG marker start byte not found")]
    JpegMarkerStartByteNotFound = 10,
    #[error("Start of image marker not found")]
    StartOfImageMarkerNotFound = 11,
    #[error("Unknown JPEG marker found")]
    UnknownJpegMarkerFound = 13,
    #[error("Invalid marker segment size")]
    InvalidMarkerSegmentSize = 15,
    #[error("Duplicate start of frame marker")]
    DuplicateStartOfFrameMarker = 17,
    #[error("Start of frame marker not found")]
    StartOfFrameMarkerNotFound = 18,
    #[error("Unexpected end of image marker")]
    UnexpectedEndOfImageMarker = 19,
    #[error("Restart marker not found")]
    RestartMarkerNotFound = 23,
    #[error("Unknown component ID")]
    UnknownComponentId = 27,
    #[error("Missing Huffman table")]
    MissingHuffmanTable = 40,
    #[error("Missing quantization table")]
    MissingQuantizationTable = 41,
    #[error("Sampling factor not supported")]
    UnsupportedSamplingFactor = 42,
    #[error("Bits per sample not supported")]
    UnsupportedBitsPerSample = 43,
    #[error("Component count not supported")]
    UnsupportedComponentCount = 44,
    #[error("Colorspace not supported")]
    UnsupportedColorspace = 45,
    #[error("Invalid bitmap")]
    InvalidBitmap = 50,

    // Logic errors
    #[error("Invalid operation")]
    InvalidOperation = 100,
    #[error("Invalid argument width")]
    InvalidArgumentWidth = 102,
    #[error("Invalid argument height")]
    InvalidArgumentHeight = 103,
}

/// Errors surfaced by [`crate::JpegImage`] and its helpers.
#[derive(Error, Debug)]
pub enum JpegImageError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(&'static str),
    #[error("Row index {index} is out of range for an image of height {height}")]
    OutOfRange { index: usize, height: usize },
    #[error("Not supported: {0}")]
    NotSupported(&'static str),
    #[error(transparent)]
    Codec(#[from] CodecError),
    #[error("Image has been disposed")]
    Disposed,
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, JpegImageError>;
