//! Output persistence
//!
//! Finished windows leave the pipeline through an [`OutputSink`]. The file
//! sink writes display images through a [`DisplayEncoder`] (JPEG or TIFF) and
//! raw means as flat little-endian RGBA16 files.

mod file_sink;
mod jpeg_encoder;
mod tiff_encoder;
pub mod types;
mod writer;

pub use file_sink::FileSink;
pub use jpeg_encoder::{DEFAULT_JPEG_QUALITY, JpegEncoder};
pub use tiff_encoder::TiffEncoder;
pub use types::{DisplayFormat, TiffCompression};
pub use writer::{DisplayEncoder, OutputSink};
