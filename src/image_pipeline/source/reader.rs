use crate::image_pipeline::common::error::Result;
use crate::image_pipeline::frame::{Frame, FrameDimensions};

/// Encoded bytes of one frame, handed from `submit_read` to `decode_process`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadToken {
    pub index: usize,
    pub bytes: Vec<u8>,
}

pub trait FrameSource: Send + Sync {
    fn dimensions(&self) -> FrameDimensions;

    fn frame_count(&self) -> usize;

    /// Fetches frame `index`. Called from the submitting thread only.
    fn submit_read(&self, index: usize) -> Result<ReadToken>;

    /// Decodes a fetched frame. May run on several worker threads at once.
    fn decode_process(&self, token: ReadToken) -> Result<Frame>;
}
