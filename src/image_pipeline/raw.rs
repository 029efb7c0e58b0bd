//! RAW image reading module
//!
//! Decodes single camera RAW files into sensor data plus the metadata the
//! demosaicing step needs (levels, white balance, CFA layout, color matrix).

mod rawloader_reader;
mod reader;
pub mod types;

pub use rawloader_reader::RawLoaderReader;
pub use reader::RawImageReader;
pub use types::RawImageData;
