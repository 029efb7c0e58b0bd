use std::io::Cursor;

use crate::image_pipeline::common::error::{Result, StackError};
use crate::image_pipeline::output::DisplayImage;
use crate::image_pipeline::sink::writer::DisplayEncoder;

pub const DEFAULT_JPEG_QUALITY: u8 = 95;

#[derive(Debug, Clone, Copy)]
pub struct JpegEncoder {
    quality: u8,
}

impl Default for JpegEncoder {
    fn default() -> Self {
        Self::new(DEFAULT_JPEG_QUALITY)
    }
}

impl JpegEncoder {
    /// `quality` is clamped to 1..=100.
    pub fn new(quality: u8) -> Self {
        Self {
            quality: quality.clamp(1, 100),
        }
    }

    pub fn quality(&self) -> u8 {
        self.quality
    }
}

impl DisplayEncoder for JpegEncoder {
    fn extension(&self) -> &'static str {
        "jpg"
    }

    fn encode(&self, image: &DisplayImage) -> Result<Vec<u8>> {
        let mut buffer = Vec::new();
        let mut cursor = Cursor::new(&mut buffer);
        let mut encoder =
            image::codecs::jpeg::JpegEncoder::new_with_quality(&mut cursor, self.quality);

        encoder
            .encode(
                &image.to_rgb(),
                image.dims.width as u32,
                image.dims.height as u32,
                image::ExtendedColorType::Rgb8,
            )
            .map_err(|e| StackError::EncodeError(format!("JPEG encoding failed: {}", e)))?;

        Ok(buffer)
    }
}
