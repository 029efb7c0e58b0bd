//! Frame buffer types
//!
//! Frames are packed RGBA16 (three used channels plus one padding channel) in
//! linear light. The same layout is used for decoded clip frames, dark
//! reference frames and raw output dumps.

mod types;

pub use types::{CHANNELS, Frame, FrameDimensions, USED_CHANNELS};
pub(crate) use types::samples_to_le_bytes;
