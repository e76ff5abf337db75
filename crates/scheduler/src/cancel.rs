//! Cooperative cancellation for render tasks.
//!
//! A render worker holds a clone of the token that was current when its task
//! started. Between stages (decode, raster, text layer) it checks
//! `is_cancelled()` and stops early if the task has been superseded. The
//! worker never treats cancellation as an error; it simply produces no
//! output.

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

/// Cancellation token shared between a render's owner and its worker.
///
/// Clones observe the same underlying flag, so cancelling any clone cancels
/// the task everywhere.
///
/// # Example
///
/// ```
/// use marginalia_scheduler::CancellationToken;
///
/// let token = CancellationToken::new();
/// let worker_token = token.clone();
///
/// token.cancel();
/// assert!(worker_token.is_cancelled());
/// ```
#[derive(Clone, Debug)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    /// Create a token in the non-cancelled state.
    pub fn new() -> Self {
        Self {
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Cancel the task this token belongs to.
    ///
    /// Idempotent; all clones observe the cancellation.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    /// Whether `cancel()` has been called on this token or any clone.
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }
}

impl Default for CancellationToken {
    fn default() -> Self {
        Self::new()
    }
}
