//! Cooperative cancellation for in-flight rasterization.

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

/// Shared cancellation flag.
///
/// The controller keeps one clone and hands another to the rasterizer, which
/// should poll [`CancellationToken::is_cancelled`] between units of work.
/// Cancelling does not stop the rasterizer by itself; results that arrive
/// after cancellation are still discarded by the generation check.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Idempotent; every clone observes it.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }
}
