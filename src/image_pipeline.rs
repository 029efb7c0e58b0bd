//! Frame stacking pipeline
//!
//! Frames come from a [`source`], are folded into a running sum by an
//! [`accumulate`] backend, and every full window is rendered by the
//! [`output`] stage and persisted through a [`sink`]. The [`window`] module
//! ties these together.

pub mod accumulate;
pub mod common;
pub mod debayer;
pub mod frame;
pub mod lut;
pub mod output;
pub mod raw;
pub mod sink;
pub mod source;
pub mod window;

pub use common::{Result, StackError};

pub use frame::{Frame, FrameDimensions};

pub use accumulate::{Accumulate, Accumulator, AccumulatorBackend};

pub use lut::ColorLut;

pub use output::{OutputBuffer, OutputMode, OutputStage, ReferenceFrame};

pub use source::{ClipSource, FrameSource, ReadToken};

pub use sink::{DisplayFormat, FileSink, OutputSink, TiffCompression};

pub use window::{StackConfig, StackConfigBuilder, StackPipeline, StackReport};
