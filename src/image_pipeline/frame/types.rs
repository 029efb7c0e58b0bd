use std::fmt;
use std::str::FromStr;

use crate::image_pipeline::common::error::{Result, StackError};

/// Channels stored per pixel (R, G, B and one padding channel).
pub const CHANNELS: usize = 4;

/// Channels that take part in accumulation and grading.
pub const USED_CHANNELS: usize = 3;

const BYTES_PER_SAMPLE: usize = std::mem::size_of::<u16>();

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FrameDimensions {
    pub width: usize,
    pub height: usize,
}

impl FrameDimensions {
    pub fn new(width: usize, height: usize) -> Self {
        Self { width, height }
    }

    pub fn pixel_count(&self) -> usize {
        self.width * self.height
    }

    /// Number of u16 samples in a packed RGBA16 frame of this size.
    pub fn sample_count(&self) -> usize {
        self.pixel_count() * CHANNELS
    }

    /// Size in bytes of a flat little-endian RGBA16 frame of this size.
    pub fn byte_len(&self) -> usize {
        self.sample_count() * BYTES_PER_SAMPLE
    }

    /// Rejects empty sizes and sizes whose byte length does not fit in `usize`.
    /// The size accessors above are only meaningful once this has passed.
    pub fn validate(&self) -> Result<()> {
        let byte_len = self
            .width
            .checked_mul(self.height)
            .and_then(|pixels| pixels.checked_mul(CHANNELS * BYTES_PER_SAMPLE));
        match byte_len {
            Some(len) if len > 0 => Ok(()),
            _ => Err(StackError::InvalidDimensions(self.width, self.height)),
        }
    }
}

impl fmt::Display for FrameDimensions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

impl FromStr for FrameDimensions {
    type Err = String;

    /// Parses `WIDTHxHEIGHT`, e.g. `1920x1080`.
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let (width, height) = s
            .split_once(['x', 'X'])
            .ok_or_else(|| format!("expected WIDTHxHEIGHT, got '{s}'"))?;
        let width = width
            .trim()
            .parse()
            .map_err(|e| format!("invalid width '{width}': {e}"))?;
        let height = height
            .trim()
            .parse()
            .map_err(|e| format!("invalid height '{height}': {e}"))?;
        let dims = FrameDimensions::new(width, height);
        dims.validate().map_err(|e| e.to_string())?;
        Ok(dims)
    }
}

/// One decoded frame in packed RGBA16 layout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    dims: FrameDimensions,
    data: Vec<u16>,
}

impl Frame {
    pub fn new(dims: FrameDimensions, data: Vec<u16>) -> Result<Self> {
        dims.validate()?;
        if data.len() != dims.sample_count() {
            return Err(StackError::BufferSizeMismatch {
                expected: dims.sample_count(),
                actual: data.len(),
            });
        }
        Ok(Self { dims, data })
    }

    /// A frame where every pixel carries the same RGB value and a zero pad.
    pub fn uniform(dims: FrameDimensions, rgb: [u16; USED_CHANNELS]) -> Self {
        let pixel = [rgb[0], rgb[1], rgb[2], 0];
        let data = pixel
            .iter()
            .copied()
            .cycle()
            .take(dims.sample_count())
            .collect();
        Self { dims, data }
    }

    /// Decodes a flat little-endian RGBA16 buffer.
    pub fn from_le_bytes(dims: FrameDimensions, bytes: &[u8]) -> Result<Self> {
        if bytes.len() != dims.byte_len() {
            return Err(StackError::BufferSizeMismatch {
                expected: dims.byte_len(),
                actual: bytes.len(),
            });
        }
        let data = bytes
            .chunks_exact(BYTES_PER_SAMPLE)
            .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
            .collect();
        Self::new(dims, data)
    }

    pub fn to_le_bytes(&self) -> Vec<u8> {
        samples_to_le_bytes(&self.data)
    }

    pub fn dimensions(&self) -> FrameDimensions {
        self.dims
    }

    pub fn data(&self) -> &[u16] {
        &self.data
    }

    pub fn into_data(self) -> Vec<u16> {
        self.data
    }

    pub(crate) fn check_dimensions(&self, expected: FrameDimensions) -> Result<()> {
        if self.dims != expected {
            return Err(StackError::DimensionMismatch {
                expected: expected.to_string(),
                actual: self.dims.to_string(),
            });
        }
        Ok(())
    }
}

pub(crate) fn samples_to_le_bytes(samples: &[u16]) -> Vec<u8> {
    samples.iter().flat_map(|v| v.to_le_bytes()).collect()
}
