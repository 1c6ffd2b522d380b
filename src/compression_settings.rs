use crate::constants::{DEFAULT_QUALITY, MAXIMUM_QUALITY, MAXIMUM_SMOOTHING_FACTOR, MINIMUM_QUALITY};
use crate::error::{JpegImageError, Result};

/// Every parameter that influences the bytes an encoder produces.
///
/// Two settings values that compare equal always produce the same compressed
/// stream, which is what lets [`crate::JpegImage`] reuse its cached output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CompressionSettings {
    /// Quantization quality, 1 (smallest) to 100 (best).
    pub quality: u8,
    /// Strength of the pre-encode smoothing filter, 0 (off) to 100.
    pub smoothing_factor: u8,
    /// Number of MCUs between restart markers, 0 for none.
    pub restart_interval: u16,
}

impl Default for CompressionSettings {
    fn default() -> Self {
        Self {
            quality: DEFAULT_QUALITY,
            smoothing_factor: 0,
            restart_interval: 0,
        }
    }
}

impl CompressionSettings {
    pub fn with_quality(mut self, quality: u8) -> Self {
        self.quality = quality;
        self
    }

    pub fn with_smoothing_factor(mut self, smoothing_factor: u8) -> Self {
        self.smoothing_factor = smoothing_factor;
        self
    }

    pub fn with_restart_interval(mut self, restart_interval: u16) -> Self {
        self.restart_interval = restart_interval;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if !(MINIMUM_QUALITY..=MAXIMUM_QUALITY).contains(&self.quality) {
            return Err(JpegImageError::InvalidArgument("quality must be between 1 and 100"));
        }
        if self.smoothing_factor > MAXIMUM_SMOOTHING_FACTOR {
            return Err(JpegImageError::InvalidArgument("smoothing factor must be between 0 and 100"));
        }
        Ok(())
    }
}
