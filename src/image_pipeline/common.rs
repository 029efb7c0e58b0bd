//! Common utilities module
//!
//! Shared error type used by every stage of the stacking pipeline.

pub mod error;

pub use error::{Result, StackError};
