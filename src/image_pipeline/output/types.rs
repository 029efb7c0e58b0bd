//! Output buffer types

use crate::image_pipeline::frame::{FrameDimensions, samples_to_le_bytes};

/// Representation produced for every finished window.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OutputMode {
    /// Graded, 8-bit packed BGRX for an image encoder
    #[default]
    Display,
    /// Ungraded 16-bit RGBA mean, no gain, LUT or reference applied
    Raw,
}

/// 8-bit image, four bytes per pixel in B, G, R, X order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisplayImage {
    pub dims: FrameDimensions,
    pub bgrx: Vec<u8>,
}

impl DisplayImage {
    /// Drops the padding byte and reorders to packed RGB.
    pub fn to_rgb(&self) -> Vec<u8> {
        self.bgrx
            .chunks_exact(4)
            .flat_map(|px| [px[2], px[1], px[0]])
            .collect()
    }
}

/// 16-bit RGBA mean of the window together with the number of frames in it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawImage {
    pub dims: FrameDimensions,
    pub samples: u32,
    pub data: Vec<u16>,
}

impl RawImage {
    pub fn to_le_bytes(&self) -> Vec<u8> {
        samples_to_le_bytes(&self.data)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputBuffer {
    Display(DisplayImage),
    Raw(RawImage),
}

impl OutputBuffer {
    pub fn dimensions(&self) -> FrameDimensions {
        match self {
            OutputBuffer::Display(image) => image.dims,
            OutputBuffer::Raw(image) => image.dims,
        }
    }
}
