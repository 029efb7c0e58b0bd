use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::image_pipeline::common::error::{Result, StackError};
use crate::image_pipeline::output::OutputBuffer;
use crate::image_pipeline::sink::writer::{DisplayEncoder, OutputSink};

const RAW_EXTENSION: &str = "raw";

/// Writes each output to its own file next to `basename`.
///
/// Windowed runs produce `<basename>-0000.<ext>`, `<basename>-0001.<ext>`,
/// and so on. Single-shot runs write exactly `<basename>`.
pub struct FileSink {
    basename: PathBuf,
    single: bool,
    encoder: Box<dyn DisplayEncoder>,
}

impl FileSink {
    pub fn new<P: AsRef<Path>>(
        basename: P,
        single: bool,
        encoder: Box<dyn DisplayEncoder>,
    ) -> Self {
        Self {
            basename: basename.as_ref().to_path_buf(),
            single,
            encoder,
        }
    }

    pub fn output_path(&self, index: usize, buffer: &OutputBuffer) -> PathBuf {
        if self.single {
            return self.basename.clone();
        }
        let extension = match buffer {
            OutputBuffer::Display(_) => self.encoder.extension(),
            OutputBuffer::Raw(_) => RAW_EXTENSION,
        };
        let mut name: OsString = self.basename.clone().into_os_string();
        name.push(format!("-{:04}.{}", index, extension));
        PathBuf::from(name)
    }
}

impl OutputSink for FileSink {
    fn write_output(&self, index: usize, buffer: &OutputBuffer) -> Result<()> {
        let path = self.output_path(index, buffer);
        let bytes = match buffer {
            OutputBuffer::Display(image) => self.encoder.encode(image)?,
            OutputBuffer::Raw(image) => {
                debug!("Raw output {} holds {} frames", index, image.samples);
                image.to_le_bytes()
            }
        };

        fs::write(&path, &bytes)
            .map_err(|e| StackError::OutputWriteError(format!("{}: {}", path.display(), e)))?;
        info!("Wrote {} ({} bytes)", path.display(), bytes.len());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image_pipeline::frame::FrameDimensions;
    use crate::image_pipeline::output::{DisplayImage, RawImage};
    use crate::image_pipeline::sink::{JpegEncoder, TiffEncoder};
    use tempfile::tempdir;

    fn raw_buffer() -> OutputBuffer {
        OutputBuffer::Raw(RawImage {
            dims: FrameDimensions::new(1, 1),
            samples: 3,
            data: vec![1, 0x0201, 3, 0],
        })
    }

    #[test]
    fn test_windowed_names_are_numbered() {
        let dir = tempdir().unwrap();
        let sink = FileSink::new(dir.path().join("out"), false, Box::new(JpegEncoder::default()));
        let display = OutputBuffer::Display(DisplayImage {
            dims: FrameDimensions::new(1, 1),
            bgrx: vec![0, 0, 0, 255],
        });

        assert_eq!(sink.output_path(7, &display), dir.path().join("out-0007.jpg"));
        assert_eq!(sink.output_path(12, &raw_buffer()), dir.path().join("out-0012.raw"));

        let tiff = FileSink::new(dir.path().join("out"), false, Box::new(TiffEncoder::default()));
        assert_eq!(tiff.output_path(0, &display), dir.path().join("out-0000.tiff"));
    }

    #[test]
    fn test_single_mode_uses_basename() {
        let dir = tempdir().unwrap();
        let target = dir.path().join("stack.raw16");
        let sink = FileSink::new(&target, true, Box::new(JpegEncoder::default()));

        sink.write_output(0, &raw_buffer()).unwrap();
        let bytes = fs::read(&target).unwrap();
        assert_eq!(bytes, vec![1, 0, 1, 2, 3, 0, 0, 0]);
    }

    #[test]
    fn test_unwritable_path_is_an_output_error() {
        let dir = tempdir().unwrap();
        let encoder = Box::new(JpegEncoder::default());
        let sink = FileSink::new(dir.path().join("missing/out"), false, encoder);
        assert!(matches!(
            sink.write_output(0, &raw_buffer()),
            Err(StackError::OutputWriteError(_))
        ));
    }
}
