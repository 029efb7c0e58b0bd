use std::borrow::Cow;
use std::sync::Arc;

use cudarc::driver::safe::*;
use cudarc::driver::sys::CUresult;
use cudarc::nvrtc::Ptx;
use tracing::{debug, trace};

use crate::image_pipeline::accumulate::Accumulate;
use crate::image_pipeline::common::error::{Result, StackError};
use crate::image_pipeline::frame::{Frame, FrameDimensions, USED_CHANNELS};

const THREADS_PER_BLOCK: u32 = 256;

/// Device-memory accumulator; one kernel launch per add/subtract.
pub struct CudaAccumulator {
    dims: FrameDimensions,
    stream: Arc<CudaStream>,
    kernel: CudaFunction,
    sums: [CudaSlice<u32>; 2],
    current: usize,
    samples: u32,
}

impl CudaAccumulator {
    /// Creates the CUDA context, loads the kernel and allocates both sum slots.
    pub fn new(dims: FrameDimensions) -> Result<Self> {
        dims.validate()?;
        // Include compiled PTX from build.rs
        let ptx = include_str!(concat!(env!("OUT_DIR"), "/accumulate.ptx"));

        let ctx = CudaContext::new(0).map_err(setup_error)?;
        let stream = ctx.default_stream();
        let module = ctx.load_module(Ptx::from_src(ptx)).map_err(setup_error)?;
        let kernel = module
            .load_function("accumulate_rgba16")
            .map_err(setup_error)?;

        let len = dims.pixel_count() * USED_CHANNELS;
        let sums = [
            stream.alloc_zeros::<u32>(len).map_err(setup_error)?,
            stream.alloc_zeros::<u32>(len).map_err(setup_error)?,
        ];
        debug!(%dims, "CUDA accumulator ready");

        Ok(Self {
            dims,
            stream,
            kernel,
            sums,
            current: 0,
            samples: 0,
        })
    }

    fn fold(&mut self, frame: &Frame, subtract: bool) -> Result<()> {
        frame.check_dimensions(self.dims)?;

        let d_frame = self.stream.clone_htod(frame.data()).map_err(device_error)?;
        let next = 1 - self.current;
        let pixels = self.dims.pixel_count() as i32;
        let mode = i32::from(subtract);

        let [first, second] = &mut self.sums;
        let (source, target) = if self.current == 0 {
            (&*first, second)
        } else {
            (&*second, first)
        };

        let mut launch_args = self.stream.launch_builder(&self.kernel);
        launch_args.arg(&d_frame);
        launch_args.arg(source);
        launch_args.arg(target);
        launch_args.arg(&pixels);
        launch_args.arg(&mode);

        let cfg = LaunchConfig {
            grid_dim: ((pixels as u32).div_ceil(THREADS_PER_BLOCK), 1, 1),
            block_dim: (THREADS_PER_BLOCK, 1, 1),
            shared_mem_bytes: 0,
        };
        unsafe { launch_args.launch(cfg) }.map_err(device_error)?;

        self.current = next;
        Ok(())
    }
}

impl Accumulate for CudaAccumulator {
    fn dimensions(&self) -> FrameDimensions {
        self.dims
    }

    fn add(&mut self, frame: &Frame) -> Result<()> {
        self.fold(frame, false)?;
        self.samples += 1;
        trace!(samples = self.samples, "Added frame on device");
        Ok(())
    }

    fn subtract(&mut self, frame: &Frame) -> Result<()> {
        assert!(self.samples > 0, "subtract called on an empty window");
        self.fold(frame, true)?;
        self.samples -= 1;
        trace!(samples = self.samples, "Subtracted frame on device");
        Ok(())
    }

    fn sample_count(&self) -> u32 {
        self.samples
    }

    fn current_sum(&self) -> Result<Cow<'_, [u32]>> {
        let sum = self
            .stream
            .clone_dtoh(&self.sums[self.current])
            .map_err(device_error)?;
        Ok(Cow::Owned(sum))
    }
}

fn setup_error(e: DriverError) -> StackError {
    match device_error(e) {
        StackError::Device(msg) => StackError::ResourceExhausted(format!("CUDA setup: {msg}")),
        other => other,
    }
}

fn device_error(e: DriverError) -> StackError {
    if e.0 == CUresult::CUDA_ERROR_OUT_OF_MEMORY {
        StackError::ResourceExhausted(e.to_string())
    } else {
        StackError::Device(e.to_string())
    }
}
