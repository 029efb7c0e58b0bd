use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use tracing::{debug, warn};

use crate::image_pipeline::lut::error::{LutError, LutResult};

const SIZE_KEYWORD: &str = "LUT_3D_SIZE";

/// Largest grid accepted; 256³ samples is already far beyond any real grade.
const MAX_POINTS: usize = 256;

const U16_SCALE: f64 = u16::MAX as f64;

/// A cubic RGB grid flattened as `r + g·N + b·N²`.
#[derive(Debug, Clone, PartialEq)]
pub struct ColorLut {
    table: Vec<[f64; 3]>,
    points: usize,
}

impl ColorLut {
    pub fn from_table(points: usize, table: Vec<[f64; 3]>) -> LutResult<Self> {
        validate_points(points)?;
        let expected = points * points * points;
        if table.len() != expected {
            return Err(LutError::Truncated {
                expected,
                found: table.len(),
            });
        }
        Ok(Self { table, points })
    }

    /// Grid that maps every corner onto itself.
    pub fn identity(points: usize) -> LutResult<Self> {
        validate_points(points)?;
        let step = if points > 1 { 1.0 / (points - 1) as f64 } else { 0.0 };
        let mut table = Vec::with_capacity(points * points * points);
        for b in 0..points {
            for g in 0..points {
                for r in 0..points {
                    table.push([r as f64 * step, g as f64 * step, b as f64 * step]);
                }
            }
        }
        Self::from_table(points, table)
    }

    pub fn read<P: AsRef<Path>>(path: P) -> LutResult<Self> {
        let file = File::open(path.as_ref())?;
        Self::parse(BufReader::new(file))
    }

    /// Loads a LUT, treating every failure as "no grading".
    pub fn load_or_disable<P: AsRef<Path>>(path: P) -> Option<Self> {
        let path = path.as_ref();
        match Self::read(path) {
            Ok(lut) => {
                debug!(path = %path.display(), points = lut.points, "Loaded color LUT");
                Some(lut)
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Color grading disabled");
                None
            }
        }
    }

    /// Parses the text grid format.
    ///
    /// Everything before `LUT_3D_SIZE` is ignored, as are `#` comments and
    /// keyword lines such as `TITLE` or `DOMAIN_MIN`. Samples are read as a
    /// flat stream of floats, so the line layout of the triples does not matter.
    pub fn parse<R: BufRead>(reader: R) -> LutResult<Self> {
        let mut points: Option<usize> = None;
        let mut samples: Vec<f64> = Vec::new();

        for (number, line) in reader.lines().enumerate() {
            let line = line?;
            let content = line.split('#').next().unwrap_or_default().trim();
            if content.is_empty() {
                continue;
            }

            let mut tokens = content.split_whitespace();
            let Some(first) = tokens.next() else {
                continue;
            };

            if first == SIZE_KEYWORD {
                if points.is_some() {
                    return Err(LutError::ParseError {
                        line: number + 1,
                        reason: format!("duplicate {SIZE_KEYWORD}"),
                    });
                }
                let value = tokens.next().ok_or_else(|| {
                    LutError::InvalidSize(format!("{SIZE_KEYWORD} without a value"))
                })?;
                let parsed = value
                    .parse::<usize>()
                    .map_err(|_| LutError::InvalidSize(value.to_string()))?;
                validate_points(parsed)?;
                points = Some(parsed);
                samples.reserve(parsed * parsed * parsed * 3);
                continue;
            }

            // Sample data only counts once the grid size is known.
            if points.is_none() || first.starts_with(|c: char| c.is_ascii_alphabetic()) {
                continue;
            }

            for token in std::iter::once(first).chain(tokens) {
                let value = token.parse::<f64>().map_err(|_| LutError::ParseError {
                    line: number + 1,
                    reason: format!("invalid sample '{token}'"),
                })?;
                samples.push(value);
            }
        }

        let points = points.ok_or(LutError::MissingSize)?;
        let expected = points * points * points;
        if samples.len() < expected * 3 {
            return Err(LutError::Truncated {
                expected: expected * 3,
                found: samples.len(),
            });
        }

        let table = samples
            .chunks_exact(3)
            .take(expected)
            .map(|rgb| [rgb[0], rgb[1], rgb[2]])
            .collect();
        Self::from_table(points, table)
    }

    pub fn points(&self) -> usize {
        self.points
    }

    fn cube_index(&self, [r, g, b]: [usize; 3]) -> usize {
        r + g * self.points + b * self.points * self.points
    }

    /// Grades one 16-bit RGB triple.
    ///
    /// The lower and upper grid corners are found by flooring and ceiling
    /// each axis independently, then every channel is blended between the
    /// two corners by the fractional part of its normalized input value.
    /// Results above 1.0 saturate to `u16::MAX`.
    pub fn apply(&self, r: u16, g: u16, b: u16) -> [u16; 3] {
        let input = [r, g, b].map(|v| f64::from(v) / U16_SCALE);
        let max_index = self.points - 1;
        let scale = max_index as f64;

        let low = input.map(|x| ((x * scale).floor() as usize).min(max_index));
        let high = input.map(|x| ((x * scale).ceil() as usize).min(max_index));

        let low = self.table[self.cube_index(low)];
        let high = self.table[self.cube_index(high)];

        [0, 1, 2].map(|c| quantize(mix(low[c], high[c], input[c])))
    }
}

fn validate_points(points: usize) -> LutResult<()> {
    if points == 0 || points > MAX_POINTS {
        return Err(LutError::InvalidSize(points.to_string()));
    }
    Ok(())
}

fn mix(a: f64, b: f64, t: f64) -> f64 {
    a + (b - a) * (t - t.floor())
}

fn quantize(value: f64) -> u16 {
    if value > 1.0 {
        return u16::MAX;
    }
    (value * U16_SCALE).round().max(0.0) as u16
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Cursor, Write};

    const CORNERS_2: &str = r#"
# identity corners
TITLE "Identity"
LUT_3D_SIZE 2
DOMAIN_MIN 0.0 0.0 0.0
DOMAIN_MAX 1.0 1.0 1.0

0.0 0.0 0.0
1.0 0.0 0.0
0.0 1.0 0.0
1.0 1.0 0.0
0.0 0.0 1.0
1.0 0.0 1.0
0.0 1.0 1.0
1.0 1.0 1.0
"#;

    #[test]
    fn test_parse_red_fastest_order() {
        let lut = ColorLut::parse(Cursor::new(CORNERS_2)).unwrap();
        assert_eq!(lut.points(), 2);
        assert_eq!(lut.table[lut.cube_index([1, 0, 0])], [1.0, 0.0, 0.0]);
        assert_eq!(lut.table[lut.cube_index([0, 1, 0])], [0.0, 1.0, 0.0]);
        assert_eq!(lut.table[lut.cube_index([0, 0, 1])], [0.0, 0.0, 1.0]);
        assert_eq!(lut, ColorLut::identity(2).unwrap());
    }

    #[test]
    fn test_boundary_corners() {
        let lut = ColorLut::parse(Cursor::new(CORNERS_2)).unwrap();
        assert_eq!(lut.apply(0, 0, 0), [0, 0, 0]);
        assert_eq!(lut.apply(65535, 65535, 65535), [65535, 65535, 65535]);
    }

    #[test]
    fn test_blend_uses_normalized_fraction() {
        let lut = ColorLut::identity(3).unwrap();
        // 0.25 sits between grid points 0 and 1 (0.0 and 0.5), blended by 0.25.
        let quarter = 16384;
        let out = lut.apply(quarter, quarter, quarter);
        let expected = (0.5 * (f64::from(quarter) / U16_SCALE) * U16_SCALE).round() as u16;
        assert_eq!(out, [expected; 3]);
    }

    #[test]
    fn test_saturates_above_one() {
        let table = vec![[2.0, 0.5, -1.0]; 8];
        let lut = ColorLut::from_table(2, table).unwrap();
        for input in [0u16, 1, 30000, 65535] {
            let out = lut.apply(input, input, input);
            assert_eq!(out[0], u16::MAX);
            assert_eq!(out[1], 32768);
            assert_eq!(out[2], 0);
        }
    }

    #[test]
    fn test_single_point_grid() {
        let lut = ColorLut::from_table(1, vec![[0.5, 0.25, 1.0]]).unwrap();
        assert_eq!(lut.apply(65535, 0, 12345), [32768, 16384, 65535]);
    }

    #[test]
    fn test_samples_may_span_lines() {
        let text = "LUT_3D_SIZE 1\n0.1\n0.2 0.3\n";
        let lut = ColorLut::parse(Cursor::new(text)).unwrap();
        assert_eq!(lut.table, vec![[0.1, 0.2, 0.3]]);
    }

    #[test]
    fn test_rejects_zero_size() {
        let result = ColorLut::parse(Cursor::new("LUT_3D_SIZE 0\n"));
        assert!(matches!(result, Err(LutError::InvalidSize(_))));
    }

    #[test]
    fn test_rejects_missing_size() {
        let result = ColorLut::parse(Cursor::new("0.0 0.0 0.0\n"));
        assert!(matches!(result, Err(LutError::MissingSize)));
    }

    #[test]
    fn test_rejects_truncated_table() {
        let result = ColorLut::parse(Cursor::new("LUT_3D_SIZE 2\n0 0 0\n1 1 1\n"));
        assert!(matches!(
            result,
            Err(LutError::Truncated { expected: 24, found: 6 })
        ));
    }

    #[test]
    fn test_rejects_garbage_sample() {
        let result = ColorLut::parse(Cursor::new("LUT_3D_SIZE 1\n0.0 zero 1.0\n"));
        assert!(matches!(result, Err(LutError::ParseError { line: 2, .. })));
    }

    #[test]
    fn test_load_failures_disable_grading() {
        let dir = tempfile::tempdir().unwrap();
        assert!(ColorLut::load_or_disable(dir.path().join("missing.cube")).is_none());

        let path = dir.path().join("zero.cube");
        std::fs::File::create(&path)
            .unwrap()
            .write_all(b"LUT_3D_SIZE 0\n")
            .unwrap();
        assert!(ColorLut::load_or_disable(&path).is_none());

        let path = dir.path().join("ok.cube");
        std::fs::write(&path, CORNERS_2).unwrap();
        assert_eq!(ColorLut::load_or_disable(&path).map(|l| l.points()), Some(2));
    }
}
