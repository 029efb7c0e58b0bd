//! Stacking configuration and run report types

use std::path::PathBuf;

use crate::image_pipeline::accumulate::AccumulatorBackend;
use crate::image_pipeline::common::error::{Result, StackError};
use crate::image_pipeline::frame::FrameDimensions;
use crate::image_pipeline::output::OutputMode;
use crate::image_pipeline::sink::{DEFAULT_JPEG_QUALITY, DisplayFormat, TiffCompression};
use crate::image_pipeline::window::timing::PipelineTimings;

pub const DEFAULT_WINDOW_SIZE: u32 = 100;

/// Configuration for one stacking run
#[derive(Debug, Clone)]
pub struct StackConfig {
    /// Number of frames averaged into each output
    pub window_size: u32,
    /// Average the whole clip into one output
    pub single: bool,
    pub output_mode: OutputMode,
    pub gain: f32,
    /// Upper bound on jobs submitted but not yet accumulated
    pub max_jobs_in_flight: usize,
    /// `.cube`-style 3D LUT; a LUT that fails to load is skipped with a warning
    pub lut_path: Option<PathBuf>,
    /// Flat RGBA16 dark frame matching the clip size
    pub reference_path: Option<PathBuf>,
    pub reference_after_lut: bool,
    pub backend: AccumulatorBackend,
    pub display_format: DisplayFormat,
    pub jpeg_quality: u8,
    pub tiff_compression: TiffCompression,
    /// Frame size of flat clips, which carry no header
    pub frame_size: Option<FrameDimensions>,
}

impl Default for StackConfig {
    fn default() -> Self {
        Self {
            window_size: DEFAULT_WINDOW_SIZE,
            single: false,
            output_mode: OutputMode::Display,
            gain: 1.0,
            max_jobs_in_flight: 1,
            lut_path: None,
            reference_path: None,
            reference_after_lut: false,
            backend: AccumulatorBackend::Cpu,
            display_format: DisplayFormat::Jpeg,
            jpeg_quality: DEFAULT_JPEG_QUALITY,
            tiff_compression: TiffCompression::DeflateFast,
            frame_size: None,
        }
    }
}

impl StackConfig {
    pub fn builder() -> StackConfigBuilder {
        StackConfigBuilder::default()
    }

    pub fn validate(&self) -> Result<()> {
        if self.window_size == 0 {
            return Err(StackError::InvalidConfig("window size must be at least 1".to_string()));
        }
        if self.max_jobs_in_flight == 0 {
            return Err(StackError::InvalidConfig(
                "at least one job must be allowed in flight".to_string(),
            ));
        }
        if !self.gain.is_finite() || self.gain < 0.0 {
            return Err(StackError::InvalidConfig(format!(
                "gain must be a finite, non-negative number, got {}",
                self.gain
            )));
        }
        Ok(())
    }
}

/// Builder for StackConfig
#[derive(Default)]
pub struct StackConfigBuilder {
    window_size: Option<u32>,
    single: Option<bool>,
    output_mode: Option<OutputMode>,
    gain: Option<f32>,
    max_jobs_in_flight: Option<usize>,
    lut_path: Option<Option<PathBuf>>,
    reference_path: Option<Option<PathBuf>>,
    reference_after_lut: Option<bool>,
    backend: Option<AccumulatorBackend>,
    display_format: Option<DisplayFormat>,
    jpeg_quality: Option<u8>,
    tiff_compression: Option<TiffCompression>,
    frame_size: Option<Option<FrameDimensions>>,
}

impl StackConfigBuilder {
    pub fn window_size(mut self, window_size: u32) -> Self {
        self.window_size = Some(window_size);
        self
    }

    pub fn single(mut self, single: bool) -> Self {
        self.single = Some(single);
        self
    }

    pub fn output_mode(mut self, mode: OutputMode) -> Self {
        self.output_mode = Some(mode);
        self
    }

    /// Raw dumps are always single-shot.
    pub fn raw_dump(mut self, enable: bool) -> Self {
        if enable {
            self.output_mode = Some(OutputMode::Raw);
            self.single = Some(true);
        }
        self
    }

    pub fn gain(mut self, gain: f32) -> Self {
        self.gain = Some(gain);
        self
    }

    pub fn max_jobs_in_flight(mut self, max: usize) -> Self {
        self.max_jobs_in_flight = Some(max);
        self
    }

    pub fn lut_path(mut self, path: Option<PathBuf>) -> Self {
        self.lut_path = Some(path);
        self
    }

    pub fn reference_path(mut self, path: Option<PathBuf>) -> Self {
        self.reference_path = Some(path);
        self
    }

    pub fn reference_after_lut(mut self, after: bool) -> Self {
        self.reference_after_lut = Some(after);
        self
    }

    pub fn backend(mut self, backend: AccumulatorBackend) -> Self {
        self.backend = Some(backend);
        self
    }

    pub fn display_format(mut self, format: DisplayFormat) -> Self {
        self.display_format = Some(format);
        self
    }

    pub fn jpeg_quality(mut self, quality: u8) -> Self {
        self.jpeg_quality = Some(quality);
        self
    }

    pub fn tiff_compression(mut self, compression: TiffCompression) -> Self {
        self.tiff_compression = Some(compression);
        self
    }

    pub fn frame_size(mut self, size: Option<FrameDimensions>) -> Self {
        self.frame_size = Some(size);
        self
    }

    pub fn build(self) -> StackConfig {
        let default = StackConfig::default();
        StackConfig {
            window_size: self.window_size.unwrap_or(default.window_size),
            single: self.single.unwrap_or(default.single),
            output_mode: self.output_mode.unwrap_or(default.output_mode),
            gain: self.gain.unwrap_or(default.gain),
            max_jobs_in_flight: self.max_jobs_in_flight.unwrap_or(default.max_jobs_in_flight),
            lut_path: self.lut_path.unwrap_or(default.lut_path),
            reference_path: self.reference_path.unwrap_or(default.reference_path),
            reference_after_lut: self.reference_after_lut.unwrap_or(default.reference_after_lut),
            backend: self.backend.unwrap_or(default.backend),
            display_format: self.display_format.unwrap_or(default.display_format),
            jpeg_quality: self.jpeg_quality.unwrap_or(default.jpeg_quality),
            tiff_compression: self.tiff_compression.unwrap_or(default.tiff_compression),
            frame_size: self.frame_size.unwrap_or(default.frame_size),
        }
    }
}

/// Summary of a finished run.
#[derive(Debug, Default)]
pub struct StackReport {
    /// Frames whose add job was submitted
    pub frames_submitted: usize,
    /// Add and subtract jobs submitted
    pub jobs_submitted: usize,
    pub outputs_written: usize,
    pub peak_jobs_in_flight: usize,
    pub timings: PipelineTimings,
}
