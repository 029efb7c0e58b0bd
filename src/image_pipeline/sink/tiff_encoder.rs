use std::io::Cursor;

use tiff::encoder::Compression;
use tiff::encoder::compression::DeflateLevel;
use tracing::debug;

use crate::image_pipeline::common::error::{Result, StackError};
use crate::image_pipeline::output::DisplayImage;
use crate::image_pipeline::sink::types::TiffCompression;
use crate::image_pipeline::sink::writer::DisplayEncoder;

/// 8-bit RGB TIFF encoder.
#[derive(Debug, Clone, Copy, Default)]
pub struct TiffEncoder {
    compression: TiffCompression,
    /// Predictor value for compression (2 for horizontal differencing)
    predictor: Option<u16>,
}

impl TiffEncoder {
    pub fn new(compression: TiffCompression) -> Self {
        Self {
            compression,
            predictor: None,
        }
    }

    pub fn with_predictor(mut self, predictor: Option<u16>) -> Self {
        self.predictor = predictor;
        self
    }
}

impl DisplayEncoder for TiffEncoder {
    fn extension(&self) -> &'static str {
        "tiff"
    }

    fn encode(&self, image: &DisplayImage) -> Result<Vec<u8>> {
        debug!("Encoding TIFF image: {}", image.dims);

        let mut buffer = Vec::new();

        let compression = match self.compression {
            TiffCompression::None => Compression::Uncompressed,
            TiffCompression::Lzw => Compression::Lzw,
            TiffCompression::DeflateFast => Compression::Deflate(DeflateLevel::Fast),
            TiffCompression::DeflateBalanced => Compression::Deflate(DeflateLevel::Balanced),
            TiffCompression::DeflateBest => Compression::Deflate(DeflateLevel::Best),
        };

        let mut encoder = tiff::encoder::TiffEncoder::new(Cursor::new(&mut buffer))
            .map_err(|e| StackError::EncodeError(e.to_string()))?
            .with_compression(compression);

        if let Some(predictor_val) = self.predictor {
            let predictor = match predictor_val {
                2 => tiff::tags::Predictor::Horizontal,
                _ => tiff::tags::Predictor::None,
            };
            encoder = encoder.with_predictor(predictor);
        }

        encoder
            .write_image::<tiff::encoder::colortype::RGB8>(
                image.dims.width as u32,
                image.dims.height as u32,
                &image.to_rgb(),
            )
            .map_err(|e| StackError::EncodeError(e.to_string()))?;

        Ok(buffer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image_pipeline::frame::FrameDimensions;

    fn gradient(dims: FrameDimensions) -> DisplayImage {
        let bgrx = (0..dims.pixel_count())
            .flat_map(|i| [(i % 256) as u8, 7, 200, 255])
            .collect();
        DisplayImage { dims, bgrx }
    }

    #[test]
    fn test_tiff_round_trips_pixels() {
        let image = gradient(FrameDimensions::new(5, 3));
        for compression in [
            TiffCompression::None,
            TiffCompression::Lzw,
            TiffCompression::DeflateBest,
        ] {
            let bytes = TiffEncoder::new(compression)
                .with_predictor(Some(2))
                .encode(&image)
                .unwrap();

            let mut decoder = tiff::decoder::Decoder::new(Cursor::new(bytes)).unwrap();
            assert_eq!(decoder.dimensions().unwrap(), (5, 3));
            match decoder.read_image().unwrap() {
                tiff::decoder::DecodingResult::U8(data) => assert_eq!(data, image.to_rgb()),
                other => panic!("unexpected sample type: {:?}", std::mem::discriminant(&other)),
            }
        }
    }
}
