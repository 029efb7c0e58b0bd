use std::collections::HashSet;

use tracing::{debug, info, warn};

use crate::image_pipeline::accumulate::{Accumulate, create_accumulator};
use crate::image_pipeline::common::error::{Result, StackError};
use crate::image_pipeline::frame::{Frame, FrameDimensions};
use crate::image_pipeline::lut::ColorLut;
use crate::image_pipeline::output::{OutputBuffer, OutputMode, OutputStage, ReferenceFrame};
use crate::image_pipeline::window::plan::JobKind;
use crate::image_pipeline::window::types::StackConfig;

/// Accumulator plus output stage: everything a completion touches.
///
/// Transient device errors never let the sum and the sample count disagree
/// with the window. A frame whose add failed is remembered and its subtract
/// becomes a no-op. A frame whose subtract failed stays queued and is removed
/// before the next job.
pub struct StackEngine {
    accumulator: Box<dyn Accumulate>,
    output: OutputStage,
    mode: OutputMode,
    skipped: HashSet<usize>,
    lingering: Vec<Frame>,
}

impl StackEngine {
    pub fn new(accumulator: Box<dyn Accumulate>, output: OutputStage, mode: OutputMode) -> Self {
        Self {
            accumulator,
            output,
            mode,
            skipped: HashSet::new(),
            lingering: Vec::new(),
        }
    }

    /// Allocates the accumulator and loads LUT and reference. A LUT that
    /// fails to load is dropped; a bad reference fails the run.
    pub fn from_config(config: &StackConfig, dims: FrameDimensions) -> Result<Self> {
        let accumulator = create_accumulator(config.backend, dims)?;

        let lut = match (&config.lut_path, config.output_mode) {
            (Some(path), OutputMode::Display) => ColorLut::load_or_disable(path),
            (Some(_), OutputMode::Raw) => {
                warn!("Raw dumps are ungraded, ignoring the LUT");
                None
            }
            (None, _) => None,
        };
        if let Some(lut) = &lut {
            info!("Using {0}x{0}x{0} LUT", lut.points());
        }

        let reference = config
            .reference_path
            .as_ref()
            .map(|path| ReferenceFrame::load(path, dims, config.reference_after_lut))
            .transpose()?;

        let output = OutputStage::new(config.gain)
            .with_lut(lut)
            .with_reference(reference);

        Ok(Self::new(accumulator, output, config.output_mode))
    }

    pub fn dimensions(&self) -> FrameDimensions {
        self.accumulator.dimensions()
    }

    /// Adds or removes clip frame `frame_index`. A transient error is
    /// returned after the bookkeeping is done, so the caller may go on.
    pub fn accumulate(&mut self, kind: JobKind, frame_index: usize, frame: &Frame) -> Result<()> {
        if let Err(err) = self.retry_lingering() {
            if err.is_fatal() {
                return Err(err);
            }
            warn!("{} frame(s) still waiting to leave the window: {}", self.lingering.len(), err);
        }

        match kind {
            JobKind::Add => match self.accumulator.add(frame) {
                Err(err) if !err.is_fatal() => {
                    self.skipped.insert(frame_index);
                    Err(err)
                }
                result => result,
            },
            JobKind::Subtract => {
                if self.skipped.remove(&frame_index) {
                    debug!("Frame {} was never added, nothing to subtract", frame_index);
                    return Ok(());
                }
                match self.accumulator.subtract(frame) {
                    Err(err) if !err.is_fatal() => {
                        self.lingering.push(frame.clone());
                        Err(err)
                    }
                    result => result,
                }
            }
        }
    }

    fn retry_lingering(&mut self) -> Result<()> {
        while let Some(frame) = self.lingering.pop() {
            if let Err(err) = self.accumulator.subtract(&frame) {
                self.lingering.push(frame);
                return Err(err);
            }
        }
        Ok(())
    }

    /// Renders the current window, or `None` when every frame in it was
    /// skipped.
    pub fn render(&self) -> Result<Option<OutputBuffer>> {
        if self.accumulator.sample_count() == 0 && !self.skipped.is_empty() {
            return Ok(None);
        }
        if !self.lingering.is_empty() {
            return Err(StackError::Device(format!(
                "{} frame(s) still waiting to leave the window",
                self.lingering.len()
            )));
        }
        self.output.render(self.accumulator.as_ref(), self.mode).map(Some)
    }

    pub fn sample_count(&self) -> u32 {
        self.accumulator.sample_count()
    }

    pub fn mode(&self) -> OutputMode {
        self.mode
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_bad_reference_fails_setup() {
        let mut reference = NamedTempFile::new().unwrap();
        reference.write_all(&[0u8; 10]).unwrap();
        let config = StackConfig::builder()
            .reference_path(Some(reference.path().to_path_buf()))
            .build();

        let result = StackEngine::from_config(&config, FrameDimensions::new(2, 2));
        assert!(matches!(result, Err(StackError::InvalidReference(_))));
    }

    #[test]
    fn test_missing_lut_is_not_fatal() {
        let config = StackConfig::builder()
            .lut_path(Some("/nonexistent/grade.cube".into()))
            .build();
        let engine = StackEngine::from_config(&config, FrameDimensions::new(2, 2)).unwrap();
        assert_eq!(engine.sample_count(), 0);
    }

    #[test]
    fn test_add_then_subtract() {
        let dims = FrameDimensions::new(2, 1);
        let config = StackConfig::builder().raw_dump(true).build();
        let mut engine = StackEngine::from_config(&config, dims).unwrap();
        let frame = Frame::uniform(dims, [10, 20, 30]);

        engine.accumulate(JobKind::Add, 0, &frame).unwrap();
        engine.accumulate(JobKind::Add, 1, &frame).unwrap();
        match engine.render().unwrap().unwrap() {
            OutputBuffer::Raw(raw) => {
                assert_eq!(raw.samples, 2);
                assert_eq!(&raw.data[..4], &[10, 20, 30, 0]);
            }
            other => panic!("expected raw output, got {:?}", other),
        }

        engine.accumulate(JobKind::Subtract, 0, &frame).unwrap();
        assert_eq!(engine.sample_count(), 1);
    }

    #[test]
    fn test_cuda_backend_request() {
        let config = StackConfig::builder()
            .backend(crate::image_pipeline::accumulate::AccumulatorBackend::Cuda)
            .build();
        let result = StackEngine::from_config(&config, FrameDimensions::new(2, 2));
        if !cfg!(jetson_cuda) {
            assert!(matches!(result, Err(StackError::Device(_))));
        }
    }
}
