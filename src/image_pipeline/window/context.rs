use std::sync::Mutex;

use crate::image_pipeline::common::error::{Result, StackError};
use crate::image_pipeline::window::engine::StackEngine;

/// The engine behind one lock. Every engine operation goes through
/// [`ProcessingContext::with_engine`], and the guard is dropped on every exit
/// path, including errors.
pub struct ProcessingContext {
    engine: Mutex<StackEngine>,
}

impl ProcessingContext {
    pub fn new(engine: StackEngine) -> Self {
        Self {
            engine: Mutex::new(engine),
        }
    }

    pub fn with_engine<T>(&self, f: impl FnOnce(&mut StackEngine) -> Result<T>) -> Result<T> {
        let mut engine = self.engine.lock().map_err(|_| StackError::ContextPoisoned)?;
        f(&mut engine)
    }

    pub fn into_engine(self) -> Result<StackEngine> {
        self.engine.into_inner().map_err(|_| StackError::ContextPoisoned)
    }
}
