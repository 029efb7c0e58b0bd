//! 3-D color lookup tables
//!
//! Text grid LUTs (`LUT_3D_SIZE N` followed by `N³` RGB triples, red fastest)
//! evaluated per pixel at output time.

mod color_lut;
mod error;

pub use color_lut::ColorLut;
pub use error::{LutError, LutResult};
