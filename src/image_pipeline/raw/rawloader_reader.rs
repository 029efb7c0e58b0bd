//! RAW image reader implementation using the rawloader library.
//!
//! This module provides support for reading various RAW image formats (ARW, CR2, NEF, DNG, etc.)
//! using the rawloader library. Each file of a still sequence goes through here before
//! being demosaiced into an RGBA16 frame.

use std::io::Cursor;
use std::panic::{self, AssertUnwindSafe};

use tracing::debug;
use rawloader::RawImageData as RawloaderImageData;
use crate::image_pipeline::common::error::{Result, StackError};
use crate::image_pipeline::raw::types::RawImageData;
use crate::image_pipeline::raw::reader::RawImageReader;

/// RAW image reader that uses the rawloader library for decoding.
#[derive(Debug, Clone, Copy, Default)]
pub struct RawLoaderReader;

/// Default bit depth when no white level information is available from the RAW file.
const DEFAULT_BITS_PER_SAMPLE: u32 = 16;

/// The bit width of the u16 data type, used for calculating actual bits per sample.
const U16_BITS: u32 = 16;

impl RawImageReader for RawLoaderReader {
    /// Reads and decodes RAW image data from a byte array.
    ///
    /// Integer sensor data is taken as is, float data (normalized 0.0-1.0) is
    /// scaled to the u16 range. The effective bit depth comes from the white
    /// level metadata.
    fn read_raw(&self, data: &[u8]) -> Result<RawImageData> {
        debug!("Decoding RAW image, {} bytes", data.len());

        // rawloader panics on some malformed files instead of returning an error.
        let decoded = panic::catch_unwind(AssertUnwindSafe(|| {
            rawloader::decode(&mut Cursor::new(data))
        }))
        .map_err(|_| StackError::DecodeError("rawloader panicked on malformed input".to_string()))?
        .map_err(|e| StackError::DecodeError(e.to_string()))?;

        let width = decoded.width;
        let height = decoded.height;

        debug!("Decoded image: {}x{} ({})", width, height, decoded.cfa.name);

        let cam_to_xyz = decoded.cam_to_xyz();
        let data: Vec<u16> = match decoded.data {
            RawloaderImageData::Integer(values) => values,
            RawloaderImageData::Float(values) => {
                values.iter().map(|&v| (v * u16::MAX as f32) as u16).collect()
            }
        };

        let max_white_level = decoded.whitelevels.iter().max().copied().unwrap_or(u16::MAX);
        let bits_per_sample = if max_white_level == 0 {
            DEFAULT_BITS_PER_SAMPLE
        } else {
            // e.g. 4095 -> 12 bits, 16383 -> 14 bits
            U16_BITS - max_white_level.leading_zeros()
        };

        Ok(RawImageData {
            width,
            height,
            data,
            bits_per_sample,
            blacklevels: decoded.blacklevels,
            whitelevels: decoded.whitelevels,
            wb_coeffs: decoded.wb_coeffs,
            cam_to_xyz,
            cfa: decoded.cfa.name.clone(),
        })
    }
}
