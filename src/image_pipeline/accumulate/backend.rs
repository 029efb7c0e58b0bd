use std::borrow::Cow;

use crate::image_pipeline::common::error::{Result, StackError};
use crate::image_pipeline::frame::{Frame, FrameDimensions};
use crate::image_pipeline::accumulate::Accumulator;

pub trait Accumulate: Send {
    fn dimensions(&self) -> FrameDimensions;

    /// Folds `frame` into the running sum and counts one more sample.
    fn add(&mut self, frame: &Frame) -> Result<()>;

    /// Removes `frame` from the running sum and counts one sample less.
    ///
    /// # Panics
    ///
    /// Panics when the window is already empty.
    fn subtract(&mut self, frame: &Frame) -> Result<()>;

    fn sample_count(&self) -> u32;

    /// The current running sum, three u32 channels per pixel.
    fn current_sum(&self) -> Result<Cow<'_, [u32]>>;
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum AccumulatorBackend {
    /// Row-parallel accumulation in host memory
    #[default]
    Cpu,
    /// Accumulation in device memory through CUDA (Jetson builds only)
    Cuda,
}

pub fn create_accumulator(
    backend: AccumulatorBackend,
    dims: FrameDimensions,
) -> Result<Box<dyn Accumulate>> {
    match backend {
        AccumulatorBackend::Cpu => Ok(Box::new(Accumulator::new(dims)?)),
        #[cfg(jetson_cuda)]
        AccumulatorBackend::Cuda => Ok(Box::new(
            crate::image_pipeline::accumulate::CudaAccumulator::new(dims)?,
        )),
        #[cfg(not(jetson_cuda))]
        AccumulatorBackend::Cuda => Err(StackError::Device(
            "CUDA accumulator is not available on this platform".to_string(),
        )),
    }
}
