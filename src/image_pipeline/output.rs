//! Output rendering
//!
//! Turns the current running sum into either an 8-bit display image for an
//! encoder or a 16-bit raw mean for archival.

mod reference;
mod stage;
pub mod types;

pub use reference::ReferenceFrame;
pub use stage::OutputStage;
pub use types::{DisplayImage, OutputBuffer, OutputMode, RawImage};
