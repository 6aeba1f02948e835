//! Minimum spacing between successive narration calls.
//!
//! The gate remembers when the last call was let through.  A caller arriving
//! earlier than `min_spacing` after that instant is suspended until it is
//! eligible.  The gate is shared by every run in the process; concurrent
//! callers queue on the inner lock and are released one spacing apart.

use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;

#[derive(Debug)]
pub struct CallSpacingGate {
    min_spacing: Duration,
    last_call: Mutex<Option<Instant>>,
}

impl CallSpacingGate {
    pub fn new(min_spacing: Duration) -> Self {
        Self {
            min_spacing,
            last_call: Mutex::new(None),
        }
    }

    pub fn min_spacing(&self) -> Duration {
        self.min_spacing
    }

    /// How long a caller arriving now would have to wait.
    pub async fn pending_wait(&self) -> Duration {
        let last = *self.last_call.lock().await;
        remaining(last, self.min_spacing)
    }

    /// Wait until eligible, then record the call.  Returns the time spent
    /// waiting.
    pub async fn acquire(&self) -> Duration {
        let mut last = self.last_call.lock().await;
        let wait = remaining(*last, self.min_spacing);
        if !wait.is_zero() {
            tokio::time::sleep(wait).await;
        }
        *last = Some(Instant::now());
        wait
    }

    /// Record a call made outside [`acquire`](Self::acquire) (e.g. a
    /// retry-after retry) so the next caller is spaced from it.
    pub async fn mark(&self) {
        *self.last_call.lock().await = Some(Instant::now());
    }
}

fn remaining(last: Option<Instant>, spacing: Duration) -> Duration {
    match last {
        Some(at) => spacing.saturating_sub(at.elapsed()),
        None => Duration::ZERO,
    }
}
