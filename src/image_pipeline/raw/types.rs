//! RAW image data types

/// Represents decoded RAW image data
#[derive(Debug, Clone)]
pub struct RawImageData {
    /// Width of the image in pixels
    pub width: usize,
    /// Height of the image in pixels
    pub height: usize,
    /// Raw pixel data (single channel Bayer pattern)
    pub data: Vec<u16>,
    /// Actual bits per sample from the sensor (e.g., 12, 14, or 16)
    pub bits_per_sample: u32,
    /// Per-CFA-position black levels
    pub blacklevels: [u16; 4],
    /// Per-CFA-position white levels
    pub whitelevels: [u16; 4],
    /// As-shot white balance multipliers (R, G, B, G2)
    pub wb_coeffs: [f32; 4],
    /// Camera RGB to XYZ, 3x4 with the fourth column for the second green
    pub cam_to_xyz: [[f32; 4]; 3],
    /// Color filter array layout, e.g. "RGGB"
    pub cfa: String,
}
