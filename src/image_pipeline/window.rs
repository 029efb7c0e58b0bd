//! Sliding-window stacking
//!
//! Schedules add and subtract jobs over a clip, bounds the jobs in flight and
//! drives the accumulator and output stage from the completions.

mod context;
mod controller;
mod engine;
mod permits;
mod plan;
pub mod timing;
pub mod types;


pub use context::ProcessingContext;
pub use controller::StackPipeline;
pub use engine::StackEngine;
pub use permits::{JobPermit, JobPermits};
pub use plan::{JobKind, JobSpec, WindowPlan};
pub use timing::{PipelineTimings, Stage};
pub use types::{DEFAULT_WINDOW_SIZE, StackConfig, StackConfigBuilder, StackReport};
