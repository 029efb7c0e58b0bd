//! Clip sources
//!
//! A source splits frame delivery in two: `submit_read` fetches the encoded
//! bytes of one frame on the submitting thread and `decode_process` turns them
//! into an RGBA16 [`Frame`](crate::image_pipeline::frame::Frame) on a worker.

mod flat_clip;
mod raw_stills;
mod reader;

use std::path::Path;

use crate::image_pipeline::common::error::{Result, StackError};
use crate::image_pipeline::frame::{Frame, FrameDimensions};

pub use flat_clip::FlatClip;
pub use raw_stills::RawStillSequence;
pub use reader::{FrameSource, ReadToken};

/// Either kind of on-disk clip, chosen from the input path.
#[derive(Debug)]
pub enum ClipSource {
    Flat(FlatClip),
    Stills(RawStillSequence),
}

impl ClipSource {
    /// Directories are read as raw still sequences, anything else as a flat
    /// RGBA16 clip which needs `size`.
    pub fn open<P: AsRef<Path>>(path: P, size: Option<FrameDimensions>) -> Result<Self> {
        let path = path.as_ref();
        if path.is_dir() {
            return Ok(ClipSource::Stills(RawStillSequence::open(path)?));
        }
        let dims = size.ok_or_else(|| {
            StackError::InvalidConfig(format!(
                "{} is a flat clip, its frame size must be given",
                path.display()
            ))
        })?;
        Ok(ClipSource::Flat(FlatClip::open(path, dims)?))
    }
}

impl FrameSource for ClipSource {
    fn dimensions(&self) -> FrameDimensions {
        match self {
            ClipSource::Flat(clip) => clip.dimensions(),
            ClipSource::Stills(stills) => stills.dimensions(),
        }
    }

    fn frame_count(&self) -> usize {
        match self {
            ClipSource::Flat(clip) => clip.frame_count(),
            ClipSource::Stills(stills) => stills.frame_count(),
        }
    }

    fn submit_read(&self, index: usize) -> Result<ReadToken> {
        match self {
            ClipSource::Flat(clip) => clip.submit_read(index),
            ClipSource::Stills(stills) => stills.submit_read(index),
        }
    }

    fn decode_process(&self, token: ReadToken) -> Result<Frame> {
        match self {
            ClipSource::Flat(clip) => clip.decode_process(token),
            ClipSource::Stills(stills) => stills.decode_process(token),
        }
    }
}
