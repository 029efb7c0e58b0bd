//! Running-sum accumulation
//!
//! An accumulator keeps two running-sum buffers and a sample count. Every
//! `add` or `subtract` reads the current buffer, writes the other one and then
//! makes the written buffer current, so no pass ever reads and writes the same
//! memory.

mod accumulator;
mod backend;
#[cfg(jetson_cuda)]
mod cuda_accumulator;

pub use accumulator::Accumulator;
pub use backend::{Accumulate, AccumulatorBackend, create_accumulator};
#[cfg(jetson_cuda)]
pub use cuda_accumulator::CudaAccumulator;
