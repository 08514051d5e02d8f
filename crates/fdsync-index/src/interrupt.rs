use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use crate::error::UpdateError;

/// Cooperative cancellation flag shared between a sync and whoever may stop
/// it. Clones observe the same flag.
#[derive(Debug, Clone, Default)]
pub struct Interrupt(Arc<AtomicBool>);

impl Interrupt {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn interrupt(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_interrupted(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// Fails with [`UpdateError::Cancelled`] once interrupted.
    pub fn check(&self) -> Result<(), UpdateError> {
        if self.is_interrupted() {
            Err(UpdateError::Cancelled)
        } else {
            Ok(())
        }
    }
}
