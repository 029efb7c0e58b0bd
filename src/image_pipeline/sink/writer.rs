use crate::image_pipeline::common::error::Result;
use crate::image_pipeline::output::{DisplayImage, OutputBuffer};

pub trait OutputSink: Send + Sync {
    /// Persists output number `index` (0-based, in window order).
    fn write_output(&self, index: usize, buffer: &OutputBuffer) -> Result<()>;
}

pub trait DisplayEncoder: Send + Sync {
    /// File extension without the dot.
    fn extension(&self) -> &'static str;

    fn encode(&self, image: &DisplayImage) -> Result<Vec<u8>>;
}
