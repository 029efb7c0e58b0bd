use std::path::Path;

use tracing::{info, instrument};

use crate::image_pipeline::common::error::{Result, StackError};
use crate::image_pipeline::frame::{CHANNELS, Frame, FrameDimensions, USED_CHANNELS};

/// Per-channel mean of a dark frame, subtracted from every output.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReferenceFrame {
    mean: [f64; USED_CHANNELS],
    apply_after_lut: bool,
}

impl ReferenceFrame {
    pub fn new(mean: [f64; USED_CHANNELS], apply_after_lut: bool) -> Self {
        Self {
            mean,
            apply_after_lut,
        }
    }

    pub fn from_frame(frame: &Frame, apply_after_lut: bool) -> Self {
        let mut totals = [0u64; USED_CHANNELS];
        for px in frame.data().chunks_exact(CHANNELS) {
            for (total, &value) in totals.iter_mut().zip(px) {
                *total += u64::from(value);
            }
        }
        let pixels = frame.dimensions().pixel_count() as f64;
        Self::new(totals.map(|t| t as f64 / pixels), apply_after_lut)
    }

    /// Reads a flat little-endian RGBA16 dark frame matching the clip size.
    #[instrument(skip(path), fields(path = %path.as_ref().display()))]
    pub fn load<P: AsRef<Path>>(
        path: P,
        dims: FrameDimensions,
        apply_after_lut: bool,
    ) -> Result<Self> {
        let path = path.as_ref();
        let bytes = std::fs::read(path).map_err(|e| {
            StackError::InputReadError(format!("{}: {}", path.display(), e))
        })?;
        if bytes.len() != dims.byte_len() {
            return Err(StackError::InvalidReference(format!(
                "{} holds {} bytes, a {} RGBA16 frame needs {}",
                path.display(),
                bytes.len(),
                dims,
                dims.byte_len()
            )));
        }

        let reference = Self::from_frame(&Frame::from_le_bytes(dims, &bytes)?, apply_after_lut);
        info!(
            mean_r = reference.mean[0],
            mean_g = reference.mean[1],
            mean_b = reference.mean[2],
            after_lut = apply_after_lut,
            "Loaded reference frame"
        );
        Ok(reference)
    }

    pub fn mean(&self) -> [f64; USED_CHANNELS] {
        self.mean
    }

    pub fn apply_after_lut(&self) -> bool {
        self.apply_after_lut
    }

    /// Subtracts the mean, flooring at black.
    pub(crate) fn subtract_from(&self, rgb: [f64; USED_CHANNELS]) -> [f64; USED_CHANNELS] {
        [0, 1, 2].map(|c| (rgb[c] - self.mean[c]).max(0.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mean_ignores_padding_channel() {
        let dims = FrameDimensions::new(2, 1);
        let frame = Frame::new(dims, vec![100, 200, 300, 9999, 300, 400, 500, 9999]).unwrap();
        let reference = ReferenceFrame::from_frame(&frame, false);
        assert_eq!(reference.mean(), [200.0, 300.0, 400.0]);
    }

    #[test]
    fn test_subtract_floors_at_zero() {
        let reference = ReferenceFrame::new([10.0, 20.0, 30.0], false);
        assert_eq!(reference.subtract_from([15.0, 5.0, 30.0]), [5.0, 0.0, 0.0]);
    }

    #[test]
    fn test_load_flat_file() {
        let dims = FrameDimensions::new(3, 2);
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dark.raw");
        std::fs::write(&path, Frame::uniform(dims, [64, 128, 256]).to_le_bytes()).unwrap();

        let reference = ReferenceFrame::load(&path, dims, true).unwrap();
        assert_eq!(reference.mean(), [64.0, 128.0, 256.0]);
        assert!(reference.apply_after_lut());
    }

    #[test]
    fn test_load_rejects_wrong_size() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dark.raw");
        std::fs::write(&path, vec![0u8; 10]).unwrap();

        let result = ReferenceFrame::load(&path, FrameDimensions::new(3, 2), false);
        assert!(matches!(result, Err(StackError::InvalidReference(_))));
    }

    #[test]
    fn test_load_missing_file() {
        let dims = FrameDimensions::new(1, 1);
        let result = ReferenceFrame::load("/nonexistent/dark.raw", dims, false);
        assert!(matches!(result, Err(StackError::InputReadError(_))));
    }
}
