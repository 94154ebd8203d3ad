use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio_util::sync::{CancellationToken, WaitForCancellationFuture};

/// Process wide, write-once shutdown signal.
///
/// Any connection that receives the sentinel may trigger it, any number of
/// times; once triggered it never resets. Loops either poll `is_triggered`
/// between units of work or await `triggered()` inside a `tokio::select!`.
#[derive(Clone, Debug, Default)]
pub struct ShutdownFlag {
    flipped: Arc<AtomicBool>,
    token: CancellationToken,
}

impl ShutdownFlag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true if this call flipped the flag.
    pub fn trigger(&self) -> bool {
        let first = !self.flipped.swap(true, Ordering::SeqCst);
        self.token.cancel();
        first
    }

    pub fn is_triggered(&self) -> bool {
        self.token.is_cancelled()
    }

    pub fn triggered(&self) -> WaitForCancellationFuture<'_> {
        self.token.cancelled()
    }
}
