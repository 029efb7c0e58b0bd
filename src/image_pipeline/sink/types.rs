//! Output file format types

use std::fmt;
use std::str::FromStr;

/// Container used for display outputs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DisplayFormat {
    #[default]
    Jpeg,
    Tiff,
}

impl fmt::Display for DisplayFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DisplayFormat::Jpeg => f.write_str("jpeg"),
            DisplayFormat::Tiff => f.write_str("tiff"),
        }
    }
}

impl FromStr for DisplayFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "jpeg" | "jpg" => Ok(DisplayFormat::Jpeg),
            "tiff" | "tif" => Ok(DisplayFormat::Tiff),
            other => Err(format!("unknown display format '{other}', expected jpeg or tiff")),
        }
    }
}

/// TIFF compression methods
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TiffCompression {
    /// No compression (fastest, largest file)
    None,
    /// LZW compression (slow, good compression)
    Lzw,
    /// Deflate compression - fast level (good speed/size balance)
    #[default]
    DeflateFast,
    /// Deflate compression - balanced
    DeflateBalanced,
    /// Deflate compression - best compression (slower)
    DeflateBest,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_format_parsing() {
        assert_eq!("jpg".parse::<DisplayFormat>(), Ok(DisplayFormat::Jpeg));
        assert_eq!("TIFF".parse::<DisplayFormat>(), Ok(DisplayFormat::Tiff));
        assert!("png".parse::<DisplayFormat>().is_err());
    }
}
