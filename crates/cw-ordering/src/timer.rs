//! Cancellable one-shot timers.
//!
//! The timeout-vs-data race resolves through an atomic claim flag: between
//! "the data arrived, cancel the timer" and "the timer fired", exactly one
//! side proceeds.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

/// A scheduled action that either fires once or is cancelled once, never both.
#[derive(Debug)]
pub struct DelayedTask {
    claimed: Arc<AtomicBool>,
    handle: JoinHandle<()>,
}

impl DelayedTask {
    /// Schedule `action` to run after `delay` on the current runtime.
    pub fn schedule<F>(delay: Duration, action: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        let claimed = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&claimed);
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if !flag.swap(true, Ordering::AcqRel) {
                action();
            }
        });
        Self { claimed, handle }
    }

    /// Try to cancel. True means the action will never run; false means the
    /// timer won the race and the action runs (or already ran).
    pub fn cancel(&self) -> bool {
        let won = !self.claimed.swap(true, Ordering::AcqRel);
        if won {
            self.handle.abort();
        }
        won
    }
}

impl Drop for DelayedTask {
    fn drop(&mut self) {
        // An unclaimed timer dies with its owner; the sleep must not outlive it.
        self.handle.abort();
    }
}
