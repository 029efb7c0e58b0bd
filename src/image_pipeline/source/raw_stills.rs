//! Raw still sequence: a directory of camera RAW files, one frame per file,
//! stacked in file name order.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info, instrument};

use crate::image_pipeline::common::error::{Result, StackError};
use crate::image_pipeline::debayer::CpuDebayer;
use crate::image_pipeline::frame::{Frame, FrameDimensions};
use crate::image_pipeline::raw::{RawImageReader, RawLoaderReader};
use crate::image_pipeline::source::reader::{FrameSource, ReadToken};

/// Extensions picked up from the input directory, compared case-insensitively.
const RAW_EXTENSIONS: &[&str] = &[
    "arw", "cr2", "cr3", "crw", "dng", "erf", "kdc", "mef", "mos", "mrw", "nef", "nrw",
    "orf", "pef", "raf", "raw", "rw2", "srw", "3fr",
];

#[derive(Debug)]
pub struct RawStillSequence {
    files: Vec<PathBuf>,
    dims: FrameDimensions,
    reader: RawLoaderReader,
    debayer: CpuDebayer,
}

impl RawStillSequence {
    /// Lists the directory and decodes the first still to learn the frame size.
    #[instrument(skip_all, fields(dir = %dir.as_ref().display()))]
    pub fn open<P: AsRef<Path>>(dir: P) -> Result<Self> {
        let dir = dir.as_ref();
        let entries = fs::read_dir(dir)
            .map_err(|e| StackError::InputReadError(format!("{}: {}", dir.display(), e)))?;

        let mut files = Vec::new();
        for entry in entries {
            let path = entry?.path();
            if path.is_file() && is_raw_file(&path) {
                files.push(path);
            }
        }
        files.sort();

        let mut sequence = Self {
            files,
            dims: FrameDimensions::new(0, 0),
            reader: RawLoaderReader,
            debayer: CpuDebayer::new(),
        };

        if sequence.files.is_empty() {
            info!("No raw stills found in {}", dir.display());
            return Ok(sequence);
        }

        let first = sequence.submit_read(0)?;
        let raw = sequence.reader.read_raw(&first.bytes)?;
        sequence.dims = FrameDimensions::new(raw.width, raw.height);
        sequence.dims.validate()?;

        info!(
            "Opened {} raw stills in {} ({}, {}-bit, CFA {})",
            sequence.files.len(),
            dir.display(),
            sequence.dims,
            raw.bits_per_sample,
            raw.cfa
        );
        Ok(sequence)
    }

    pub fn files(&self) -> &[PathBuf] {
        &self.files
    }
}

fn is_raw_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| RAW_EXTENSIONS.iter().any(|known| ext.eq_ignore_ascii_case(known)))
        .unwrap_or(false)
}

impl FrameSource for RawStillSequence {
    fn dimensions(&self) -> FrameDimensions {
        self.dims
    }

    fn frame_count(&self) -> usize {
        self.files.len()
    }

    fn submit_read(&self, index: usize) -> Result<ReadToken> {
        let path = self.files.get(index).ok_or_else(|| {
            StackError::InputReadError(format!(
                "still {} requested, sequence has {}",
                index,
                self.files.len()
            ))
        })?;
        let bytes = fs::read(path)
            .map_err(|e| StackError::InputReadError(format!("{}: {}", path.display(), e)))?;
        debug!("Read still {} ({} bytes)", path.display(), bytes.len());
        Ok(ReadToken { index, bytes })
    }

    fn decode_process(&self, token: ReadToken) -> Result<Frame> {
        let raw = self.reader.read_raw(&token.bytes)?;
        let frame = self.debayer.process(&raw)?;
        frame.check_dimensions(self.dims)?;
        Ok(frame)
    }
}
