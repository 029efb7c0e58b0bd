//! Flat clip source: a single file of back-to-back little-endian RGBA16
//! frames with no header.

use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tracing::{info, warn};

use crate::image_pipeline::common::error::{Result, StackError};
use crate::image_pipeline::frame::{Frame, FrameDimensions};
use crate::image_pipeline::source::reader::{FrameSource, ReadToken};

#[derive(Debug)]
pub struct FlatClip {
    path: PathBuf,
    file: Mutex<File>,
    dims: FrameDimensions,
    frame_count: usize,
}

impl FlatClip {
    pub fn open<P: AsRef<Path>>(path: P, dims: FrameDimensions) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        dims.validate()?;

        let file = File::open(&path)
            .map_err(|e| StackError::InputReadError(format!("{}: {}", path.display(), e)))?;
        let len = file
            .metadata()
            .map_err(|e| StackError::InputReadError(format!("{}: {}", path.display(), e)))?
            .len() as usize;

        let frame_bytes = dims.byte_len();
        let frame_count = len / frame_bytes;
        let trailing = len % frame_bytes;
        if trailing != 0 {
            warn!(
                "{} ends with {} bytes that do not form a whole {} frame, ignoring them",
                path.display(),
                trailing,
                dims
            );
        }
        info!("Opened flat clip {} ({} frames of {})", path.display(), frame_count, dims);

        Ok(Self {
            path,
            file: Mutex::new(file),
            dims,
            frame_count,
        })
    }
}

impl FrameSource for FlatClip {
    fn dimensions(&self) -> FrameDimensions {
        self.dims
    }

    fn frame_count(&self) -> usize {
        self.frame_count
    }

    fn submit_read(&self, index: usize) -> Result<ReadToken> {
        if index >= self.frame_count {
            return Err(StackError::InputReadError(format!(
                "frame {} is past the end of {} ({} frames)",
                index,
                self.path.display(),
                self.frame_count
            )));
        }

        let frame_bytes = self.dims.byte_len();
        let mut bytes = vec![0u8; frame_bytes];
        let mut file = self.file.lock().map_err(|_| {
            StackError::InputReadError(format!("{}: file handle poisoned", self.path.display()))
        })?;
        file.seek(SeekFrom::Start((index * frame_bytes) as u64))
            .and_then(|_| file.read_exact(&mut bytes))
            .map_err(|e| {
                let path = self.path.display();
                StackError::InputReadError(format!("{} frame {}: {}", path, index, e))
            })?;

        Ok(ReadToken { index, bytes })
    }

    fn decode_process(&self, token: ReadToken) -> Result<Frame> {
        Frame::from_le_bytes(self.dims, &token.bytes)
    }
}
