use thiserror::Error;

pub type LutResult<T> = std::result::Result<T, LutError>;

#[derive(Error, Debug)]
pub enum LutError {
    #[error("missing LUT_3D_SIZE")]
    MissingSize,

    #[error("invalid LUT size: {0}")]
    InvalidSize(String),

    #[error("expected {expected} samples, found {found}")]
    Truncated { expected: usize, found: usize },

    #[error("parse error on line {line}: {reason}")]
    ParseError { line: usize, reason: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
