use thiserror::Error;

#[derive(Error, Debug)]
pub enum StackError {
    #[error("Failed to read input file: {0}")]
    InputReadError(String),

    #[error("Failed to write output file: {0}")]
    OutputWriteError(String),

    #[error("Failed to decode frame: {0}")]
    DecodeError(String),

    #[error("Failed to encode output image: {0}")]
    EncodeError(String),

    #[error("Invalid image dimensions: width={0}, height={1}")]
    InvalidDimensions(usize, usize),

    #[error("Frame buffer holds {actual} samples, expected {expected}")]
    BufferSizeMismatch { expected: usize, actual: usize },

    #[error("Frame is {actual}, engine is configured for {expected}")]
    DimensionMismatch { expected: String, actual: String },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid reference frame: {0}")]
    InvalidReference(String),

    #[error("Cannot render a window that holds no frames")]
    EmptyWindow,

    #[error("Processing resources exhausted: {0}")]
    ResourceExhausted(String),

    #[error("Device error: {0}")]
    Device(String),

    #[error("Processing context poisoned by a panicked job")]
    ContextPoisoned,

    #[error("Decode workers disconnected before the clip was submitted")]
    WorkersDisconnected,

    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl StackError {
    /// Transient device errors are logged and the run carries on; everything
    /// else stops submission.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, StackError::Device(_))
    }
}

pub type Result<T> = std::result::Result<T, StackError>;
