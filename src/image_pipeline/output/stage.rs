use rayon::prelude::*;

use crate::image_pipeline::accumulate::Accumulate;
use crate::image_pipeline::common::error::{Result, StackError};
use crate::image_pipeline::frame::{CHANNELS, FrameDimensions, USED_CHANNELS};
use crate::image_pipeline::lut::ColorLut;
use crate::image_pipeline::output::reference::ReferenceFrame;
use crate::image_pipeline::output::types::{DisplayImage, OutputBuffer, OutputMode, RawImage};

/// 16-bit to 8-bit scale (65535 / 255).
const DISPLAY_SCALE: f64 = 257.0;

const U16_MAX: f64 = u16::MAX as f64;

/// Averages the running sum and applies reference, gain and grading.
#[derive(Debug, Clone)]
pub struct OutputStage {
    gain: f64,
    lut: Option<ColorLut>,
    reference: Option<ReferenceFrame>,
}

impl Default for OutputStage {
    fn default() -> Self {
        Self::new(1.0)
    }
}

impl OutputStage {
    pub fn new(gain: f32) -> Self {
        Self {
            gain: f64::from(gain),
            lut: None,
            reference: None,
        }
    }

    pub fn with_lut(mut self, lut: Option<ColorLut>) -> Self {
        self.lut = lut;
        self
    }

    pub fn with_reference(mut self, reference: Option<ReferenceFrame>) -> Self {
        self.reference = reference;
        self
    }

    pub fn has_lut(&self) -> bool {
        self.lut.is_some()
    }

    pub fn has_reference(&self) -> bool {
        self.reference.is_some()
    }

    /// Renders the accumulator's current window. Never mutates the accumulator.
    pub fn render(&self, accumulator: &dyn Accumulate, mode: OutputMode) -> Result<OutputBuffer> {
        let samples = accumulator.sample_count();
        if samples == 0 {
            return Err(StackError::EmptyWindow);
        }
        let dims = accumulator.dimensions();
        let sum = accumulator.current_sum()?;

        Ok(match mode {
            OutputMode::Display => OutputBuffer::Display(self.render_display(dims, &sum, samples)),
            OutputMode::Raw => OutputBuffer::Raw(render_raw(dims, &sum, samples)),
        })
    }

    fn render_display(&self, dims: FrameDimensions, sum: &[u32], samples: u32) -> DisplayImage {
        let divisor = f64::from(samples);
        let mut bgrx = vec![0u8; dims.pixel_count() * CHANNELS];

        bgrx.par_chunks_mut(CHANNELS)
            .zip(sum.par_chunks(USED_CHANNELS))
            .for_each(|(out, total)| {
                let mean = [0, 1, 2].map(|c| f64::from(total[c]) / divisor);
                let [r, g, b] = self.grade(mean);
                out[0] = to_display(b);
                out[1] = to_display(g);
                out[2] = to_display(r);
                out[3] = u8::MAX;
            });

        DisplayImage { dims, bgrx }
    }

    /// Reference, gain and LUT for one mean pixel, in 16-bit units.
    fn grade(&self, mean: [f64; USED_CHANNELS]) -> [f64; USED_CHANNELS] {
        let mut rgb = mean;

        if let Some(reference) = self.reference.as_ref().filter(|r| !r.apply_after_lut()) {
            rgb = reference.subtract_from(rgb);
        }

        rgb = rgb.map(|v| v * self.gain);

        if let Some(lut) = &self.lut {
            let [r, g, b] = rgb.map(to_u16);
            rgb = lut.apply(r, g, b).map(f64::from);
        }

        if let Some(reference) = self.reference.as_ref().filter(|r| r.apply_after_lut()) {
            rgb = reference.subtract_from(rgb);
        }

        rgb
    }
}

fn render_raw(dims: FrameDimensions, sum: &[u32], samples: u32) -> RawImage {
    let divisor = f64::from(samples);
    let mut data = vec![0u16; dims.pixel_count() * CHANNELS];

    data.par_chunks_mut(CHANNELS)
        .zip(sum.par_chunks(USED_CHANNELS))
        .for_each(|(out, total)| {
            for c in 0..USED_CHANNELS {
                out[c] = to_u16(f64::from(total[c]) / divisor);
            }
        });

    RawImage {
        dims,
        samples,
        data,
    }
}

fn to_u16(value: f64) -> u16 {
    value.round().clamp(0.0, U16_MAX) as u16
}

fn to_display(value: f64) -> u8 {
    (value / DISPLAY_SCALE).round().clamp(0.0, 255.0) as u8
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image_pipeline::accumulate::Accumulator;
    use crate::image_pipeline::frame::Frame;

    fn dims() -> FrameDimensions {
        FrameDimensions::new(3, 2)
    }

    fn accumulate(values: &[[u16; 3]]) -> Accumulator {
        let mut acc = Accumulator::new(dims()).unwrap();
        for &rgb in values {
            acc.add(&Frame::uniform(dims(), rgb)).unwrap();
        }
        acc
    }

    fn display(buffer: OutputBuffer) -> DisplayImage {
        match buffer {
            OutputBuffer::Display(image) => image,
            other => panic!("expected display output, got {other:?}"),
        }
    }

    fn raw(buffer: OutputBuffer) -> RawImage {
        match buffer {
            OutputBuffer::Raw(image) => image,
            other => panic!("expected raw output, got {other:?}"),
        }
    }

    #[test]
    fn test_constant_window_renders_constant() {
        let value = 40 * 257;
        let acc = accumulate(&[[value; 3]; 5]);
        let image = display(OutputStage::default().render(&acc, OutputMode::Display).unwrap());
        assert_eq!(image.dims, dims());
        assert!(image.bgrx.chunks_exact(4).all(|px| px == [40, 40, 40, 255]));
    }

    #[test]
    fn test_display_is_bgr_ordered() {
        let acc = accumulate(&[[10 * 257, 20 * 257, 30 * 257]]);
        let image = display(OutputStage::default().render(&acc, OutputMode::Display).unwrap());
        assert_eq!(&image.bgrx[..4], &[30, 20, 10, 255]);
        assert_eq!(&image.to_rgb()[..3], &[10, 20, 30]);
    }

    #[test]
    fn test_gain_and_display_clamp() {
        let acc = accumulate(&[[100 * 257, 200 * 257, 50 * 257]]);
        let stage = OutputStage::new(2.0);
        let image = display(stage.render(&acc, OutputMode::Display).unwrap());
        assert_eq!(&image.bgrx[..4], &[100, 255, 200, 255]);
    }

    #[test]
    fn test_reference_before_lut_scales_with_gain() {
        let acc = accumulate(&[[30 * 257; 3]]);
        let stage = OutputStage::new(2.0)
            .with_reference(Some(ReferenceFrame::new([10.0 * 257.0; 3], false)));
        let image = display(stage.render(&acc, OutputMode::Display).unwrap());
        // (30 - 10) * 2
        assert_eq!(&image.bgrx[..3], &[40, 40, 40]);
    }

    #[test]
    fn test_reference_after_lut_is_not_scaled() {
        let acc = accumulate(&[[30 * 257; 3]]);
        let stage = OutputStage::new(2.0)
            .with_lut(Some(ColorLut::from_table(1, vec![[1.0, 1.0, 1.0]]).unwrap()))
            .with_reference(Some(ReferenceFrame::new([55.0 * 257.0; 3], true)));
        let image = display(stage.render(&acc, OutputMode::Display).unwrap());
        // LUT pins everything to white, then the reference comes off.
        assert_eq!(&image.bgrx[..3], &[200, 200, 200]);
    }

    #[test]
    fn test_lut_is_applied_to_mean() {
        let acc = accumulate(&[[0; 3], [u16::MAX; 3]]);
        let table = vec![[0.2, 0.4, 0.6]; 8];
        let stage = OutputStage::default().with_lut(Some(ColorLut::from_table(2, table).unwrap()));
        let image = display(stage.render(&acc, OutputMode::Display).unwrap());
        let expected = |v: f64| (v * 65535.0 / 257.0).round() as u8;
        assert_eq!(
            &image.bgrx[..3],
            &[expected(0.6), expected(0.4), expected(0.2)]
        );
    }

    #[test]
    fn test_raw_mode_skips_grading() {
        let acc = accumulate(&[[1000, 2000, 3000], [3000, 4000, 5001]]);
        let stage = OutputStage::new(4.0)
            .with_lut(Some(ColorLut::identity(2).unwrap()))
            .with_reference(Some(ReferenceFrame::new([500.0; 3], false)));
        let image = raw(stage.render(&acc, OutputMode::Raw).unwrap());
        assert_eq!(image.samples, 2);
        assert_eq!(image.data.len(), dims().pixel_count() * 4);
        assert_eq!(&image.data[..4], &[2000, 3000, 4001, 0]);
    }

    #[test]
    fn test_render_is_a_pure_read() {
        let acc = accumulate(&[[7, 8, 9], [1, 2, 3]]);
        let before = acc.current_sum().unwrap().into_owned();
        let stage = OutputStage::default();
        stage.render(&acc, OutputMode::Display).unwrap();
        stage.render(&acc, OutputMode::Raw).unwrap();
        assert_eq!(acc.current_sum().unwrap().into_owned(), before);
        assert_eq!(acc.sample_count(), 2);
    }

    #[test]
    fn test_empty_window_is_an_error() {
        let acc = Accumulator::new(dims()).unwrap();
        let result = OutputStage::default().render(&acc, OutputMode::Display);
        assert!(matches!(result, Err(StackError::EmptyWindow)));
    }
}
