use std::future;
use std::time::Duration;

use tokio::time::{sleep_until, Instant};

/// Holds back a changing value until it has been quiet for `quiet`.
///
/// Meant to be polled from a `select!` loop: `push` reschedules, `settled`
/// resolves once the newest value has aged past the quiet period. Dropping
/// the debouncer or calling `cancel` discards whatever is pending.
#[derive(Debug)]
pub struct Debouncer<T> {
    quiet: Duration,
    pending: Option<(T, Instant)>,
    stable: T,
}

impl<T: Clone> Debouncer<T> {
    pub fn new(initial: T, quiet: Duration) -> Self {
        Self {
            quiet,
            pending: None,
            stable: initial,
        }
    }

    /// Last value that made it through the quiet period.
    pub fn stable(&self) -> &T {
        &self.stable
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Replaces any pending value and restarts the quiet period.
    pub fn push(&mut self, value: T) {
        self.pending = Some((value, Instant::now() + self.quiet));
    }

    pub fn cancel(&mut self) {
        self.pending = None;
    }

    /// Waits for the pending value to settle and returns it. Never resolves
    /// while nothing is pending. Cancel safe: if this future is dropped
    /// before completing, the pending value stays queued.
    pub async fn settled(&mut self) -> T {
        let deadline = match &self.pending {
            Some((_, deadline)) => *deadline,
            None => return future::pending().await,
        };
        sleep_until(deadline).await;
        match self.pending.take() {
            Some((value, _)) => {
                self.stable = value.clone();
                value
            }
            None => future::pending().await,
        }
    }
}
