use std::io::Cursor;

use bayer::{BayerDepth, CFA, Demosaic, RasterDepth, RasterMut};
use rayon::prelude::*;
use tracing::debug;

use crate::image_pipeline::common::error::{Result, StackError};
use crate::image_pipeline::frame::{CHANNELS, Frame, FrameDimensions};
use crate::image_pipeline::raw::RawImageData;

/// Standard XYZ to sRGB D65 illuminant matrix
const XYZ_TO_SRGB: [[f32; 3]; 3] = [
    [ 3.2404542, -1.5371385, -0.4985314],
    [-0.9692660,  1.8760108,  0.0415560],
    [ 0.0556434, -0.2040259,  1.0572252],
];

/// Demosaics a decoded RAW still into a linear sRGB RGBA16 frame.
///
/// Pipeline: bilinear demosaic, black level, normalization, white balance,
/// then the camera to sRGB matrix. The pad channel is left at zero.
#[derive(Debug, Clone, Copy, Default)]
pub struct CpuDebayer;

impl CpuDebayer {
    pub fn new() -> Self {
        Self
    }

    pub fn process(&self, raw_image: &RawImageData) -> Result<Frame> {
        let width = raw_image.width;
        let height = raw_image.height;
        let dims = FrameDimensions::new(width, height);
        dims.validate()?;

        let expected = dims.pixel_count();
        if raw_image.data.len() < expected {
            return Err(StackError::BufferSizeMismatch {
                expected,
                actual: raw_image.data.len(),
            });
        }

        let cfa = cfa_from_name(&raw_image.cfa)?;
        debug!("Demosaicing {}x{} still, CFA={}", width, height, raw_image.cfa);

        let bayer_bytes: Vec<u8> = raw_image.data[..expected]
            .iter()
            .flat_map(|&val| val.to_le_bytes())
            .collect();

        let mut output_buf = vec![0u8; expected * 3 * 2];
        let mut cursor = Cursor::new(&bayer_bytes[..]);
        let mut output_raster =
            RasterMut::new(width, height, RasterDepth::Depth16, &mut output_buf);

        bayer::run_demosaic(
            &mut cursor,
            BayerDepth::Depth16LE,
            cfa,
            Demosaic::Linear,
            &mut output_raster,
        )
        .map_err(|e| StackError::DecodeError(format!("Demosaic failed: {:?}", e)))?;

        let cam_to_srgb = cam_to_srgb(&raw_image.cam_to_xyz);

        let black_level = raw_image.blacklevels[0] as f32;
        let white_level = raw_image.whitelevels[0] as f32;
        let range = (white_level - black_level).max(1.0);
        let [wb_r, wb_g, wb_b] = white_balance(&raw_image.wb_coeffs);

        let mut data = vec![0u16; dims.sample_count()];
        data.par_chunks_exact_mut(CHANNELS)
            .zip(output_buf.par_chunks_exact(6))
            .for_each(|(out, px)| {
                let r_raw = u16::from_le_bytes([px[0], px[1]]) as f32;
                let g_raw = u16::from_le_bytes([px[2], px[3]]) as f32;
                let b_raw = u16::from_le_bytes([px[4], px[5]]) as f32;

                let lin = [
                    ((r_raw - black_level).max(0.0) / range) * wb_r,
                    ((g_raw - black_level).max(0.0) / range) * wb_g,
                    ((b_raw - black_level).max(0.0) / range) * wb_b,
                ];

                for (c, row) in cam_to_srgb.iter().enumerate() {
                    let v = row[0] * lin[0] + row[1] * lin[1] + row[2] * lin[2];
                    out[c] = (v * 65535.0).round().clamp(0.0, 65535.0) as u16;
                }
            });

        Frame::new(dims, data)
    }
}

fn cfa_from_name(name: &str) -> Result<CFA> {
    // rawloader reports 2x2 patterns as four letters; larger X-Trans style layouts are not handled
    match name.get(..4).map(str::to_ascii_uppercase).as_deref() {
        Some("RGGB") => Ok(CFA::RGGB),
        Some("BGGR") => Ok(CFA::BGGR),
        Some("GRBG") => Ok(CFA::GRBG),
        Some("GBRG") => Ok(CFA::GBRG),
        _ => Err(StackError::UnsupportedFormat(format!("CFA pattern '{}'", name))),
    }
}

/// Combined Cam -> XYZ -> sRGB matrix. Falls back to identity when the
/// camera carries no usable color matrix.
fn cam_to_srgb(cam_to_xyz: &[[f32; 4]; 3]) -> [[f32; 3]; 3] {
    let usable = cam_to_xyz
        .iter()
        .flat_map(|row| row[..3].iter())
        .any(|v| v.is_finite() && *v != 0.0);
    if !usable {
        return [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]];
    }

    let mut out = [[0.0f32; 3]; 3];
    for r in 0..3 {
        for c in 0..3 {
            out[r][c] = (0..3).map(|k| XYZ_TO_SRGB[r][k] * cam_to_xyz[k][c]).sum();
        }
    }
    out
}

/// Green-normalized multipliers. rawloader uses NaN for missing coefficients.
fn white_balance(coeffs: &[f32; 4]) -> [f32; 3] {
    let g = coeffs[1];
    if !g.is_finite() || g == 0.0 {
        return [1.0; 3];
    }
    let norm = |v: f32| if v.is_finite() && v > 0.0 { v / g } else { 1.0 };
    [norm(coeffs[0]), 1.0, norm(coeffs[2])]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flat_raw(width: usize, height: usize, value: u16) -> RawImageData {
        RawImageData {
            width,
            height,
            data: vec![value; width * height],
            bits_per_sample: 16,
            blacklevels: [0; 4],
            whitelevels: [u16::MAX; 4],
            wb_coeffs: [1.0, 1.0, 1.0, f32::NAN],
            cam_to_xyz: [[0.0; 4]; 3],
            cfa: "RGGB".to_string(),
        }
    }

    #[test]
    fn test_flat_field_stays_flat() {
        let frame = CpuDebayer::new().process(&flat_raw(8, 6, 1000)).unwrap();
        assert_eq!(frame.dimensions(), FrameDimensions::new(8, 6));
        for px in frame.data().chunks_exact(CHANNELS) {
            assert_eq!(px, &[1000, 1000, 1000, 0]);
        }
    }

    #[test]
    fn test_black_level_is_removed() {
        let mut raw = flat_raw(4, 4, 600);
        raw.blacklevels = [512; 4];
        raw.whitelevels = [512 + 1024; 4];
        let frame = CpuDebayer::new().process(&raw).unwrap();
        // (600 - 512) / 1024 * 65535
        let expected = ((88.0f32 / 1024.0) * 65535.0).round() as u16;
        assert_eq!(frame.data()[0], expected);
    }

    #[test]
    fn test_unknown_cfa_is_rejected() {
        let mut raw = flat_raw(4, 4, 10);
        raw.cfa = "X".to_string();
        assert!(matches!(
            CpuDebayer::new().process(&raw),
            Err(StackError::UnsupportedFormat(_))
        ));
    }

    #[test]
    fn test_short_buffer_is_rejected() {
        let mut raw = flat_raw(4, 4, 10);
        raw.data.truncate(3);
        assert!(matches!(
            CpuDebayer::new().process(&raw),
            Err(StackError::BufferSizeMismatch { .. })
        ));
    }

    #[test]
    fn test_white_balance_normalizes_to_green() {
        assert_eq!(white_balance(&[2.0, 1.0, 1.5, f32::NAN]), [2.0, 1.0, 1.5]);
        assert_eq!(white_balance(&[f32::NAN; 4]), [1.0; 3]);
    }
}
