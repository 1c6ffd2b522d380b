//! Pixel samples and scanlines.

use crate::constants::{MAXIMUM_BITS_PER_COMPONENT, MAXIMUM_COMPONENT_COUNT, MINIMUM_BITS_PER_COMPONENT};
use crate::error::{JpegImageError, Result};

/// The component values of a single pixel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sample {
    components: Vec<u16>,
    bits_per_component: u8,
}

impl Sample {
    pub fn new(components: &[u16], bits_per_component: u8) -> Result<Self> {
        validate_layout(bits_per_component, components.len())?;
        let maximum = maximum_value(bits_per_component);
        if components.iter().any(|&c| c > maximum) {
            return Err(JpegImageError::InvalidArgument("component value exceeds bit depth"));
        }
        Ok(Self {
            components: components.to_vec(),
            bits_per_component,
        })
    }

    pub fn bits_per_component(&self) -> u8 {
        self.bits_per_component
    }

    pub fn component_count(&self) -> u8 {
        self.components.len() as u8
    }

    pub fn component(&self, index: usize) -> Option<u16> {
        self.components.get(index).copied()
    }

    pub fn components(&self) -> &[u16] {
        &self.components
    }
}

/// One scanline of samples sharing a bit depth and component count.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SampleRow {
    samples: Vec<Sample>,
    bits_per_component: u8,
    component_count: u8,
}

impl SampleRow {
    /// Builds a row from samples. All samples must share the layout of the first one.
    pub fn new(samples: Vec<Sample>) -> Result<Self> {
        let Some(first) = samples.first() else {
            return Err(JpegImageError::InvalidArgument("sample row is empty"));
        };
        let bits_per_component = first.bits_per_component();
        let component_count = first.component_count();
        if samples
            .iter()
            .any(|s| s.bits_per_component() != bits_per_component || s.component_count() != component_count)
        {
            return Err(JpegImageError::InvalidArgument("samples in a row differ in layout"));
        }
        Ok(Self {
            samples,
            bits_per_component,
            component_count,
        })
    }

    /// Unpacks `sample_count` samples from an MSB-first bit-packed byte row.
    pub fn from_packed_bytes(
        bytes: &[u8],
        sample_count: usize,
        bits_per_component: u8,
        component_count: u8,
    ) -> Result<Self> {
        validate_layout(bits_per_component, component_count as usize)?;
        if sample_count == 0 {
            return Err(JpegImageError::InvalidArgument("sample row is empty"));
        }
        let required_bits = sample_count * component_count as usize * bits_per_component as usize;
        if bytes.len() * 8 < required_bits {
            return Err(JpegImageError::InvalidArgument("packed row is shorter than the sample count"));
        }

        let mut reader = PackedBitReader::new(bytes);
        let mut samples = Vec::with_capacity(sample_count);
        let mut components = vec![0u16; component_count as usize];
        for _ in 0..sample_count {
            for component in components.iter_mut() {
                *component = reader.read_bits(bits_per_component);
            }
            samples.push(Sample {
                components: components.clone(),
                bits_per_component,
            });
        }

        Ok(Self {
            samples,
            bits_per_component,
            component_count,
        })
    }

    /// Packs the row back into MSB-first bytes, padding the final byte with zeros.
    pub fn to_packed_bytes(&self) -> Vec<u8> {
        let mut writer = PackedBitWriter::new();
        for sample in &self.samples {
            for &component in sample.components() {
                writer.write_bits(component, self.bits_per_component);
            }
        }
        writer.finish()
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Sample> {
        self.samples.get(index)
    }

    pub fn samples(&self) -> &[Sample] {
        &self.samples
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Sample> {
        self.samples.iter()
    }

    pub fn bits_per_component(&self) -> u8 {
        self.bits_per_component
    }

    pub fn component_count(&self) -> u8 {
        self.component_count
    }
}

impl<'a> IntoIterator for &'a SampleRow {
    type Item = &'a Sample;
    type IntoIter = std::slice::Iter<'a, Sample>;

    fn into_iter(self) -> Self::IntoIter {
        self.samples.iter()
    }
}

pub(crate) fn maximum_value(bits_per_component: u8) -> u16 {
    ((1u32 << bits_per_component) - 1) as u16
}

fn validate_layout(bits_per_component: u8, component_count: usize) -> Result<()> {
    if !(MINIMUM_BITS_PER_COMPONENT..=MAXIMUM_BITS_PER_COMPONENT).contains(&bits_per_component) {
        return Err(JpegImageError::InvalidArgument("bits per component must be between 1 and 16"));
    }
    if component_count == 0 || component_count > MAXIMUM_COMPONENT_COUNT as usize {
        return Err(JpegImageError::InvalidArgument("component count must be between 1 and 4"));
    }
    Ok(())
}

struct PackedBitReader<'a> {
    data: &'a [u8],
    pos: usize,
    bits_left: u8,
}

impl<'a> PackedBitReader<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self {
            data,
            pos: 0,
            bits_left: 8,
        }
    }

    // Callers check the total length up front, so running past the end reads zeros.
    fn read_bit(&mut self) -> u16 {
        let Some(&byte) = self.data.get(self.pos) else {
            return 0;
        };
        let bit = (byte >> (self.bits_left - 1)) & 1;
        self.bits_left -= 1;
        if self.bits_left == 0 {
            self.pos += 1;
            self.bits_left = 8;
        }
        bit as u16
    }

    fn read_bits(&mut self, count: u8) -> u16 {
        let mut bits = 0u16;
        for _ in 0..count {
            bits = (bits << 1) | self.read_bit();
        }
        bits
    }
}

struct PackedBitWriter {
    data: Vec<u8>,
    bit_buffer: u8,
    bits_count: u8,
}

impl PackedBitWriter {
    fn new() -> Self {
        Self {
            data: Vec::new(),
            bit_buffer: 0,
            bits_count: 0,
        }
    }

    fn write_bits(&mut self, value: u16, count: u8) {
        for shift in (0..count).rev() {
            let bit = ((value >> shift) & 1) as u8;
            self.bit_buffer = (self.bit_buffer << 1) | bit;
            self.bits_count += 1;
            if self.bits_count == 8 {
                self.data.push(self.bit_buffer);
                self.bit_buffer = 0;
                self.bits_count = 0;
            }
        }
    }

    fn finish(mut self) -> Vec<u8> {
        if self.bits_count > 0 {
            self.bit_buffer <<= 8 - self.bits_count;
            self.data.push(self.bit_buffer);
        }
        self.data
    }
}
