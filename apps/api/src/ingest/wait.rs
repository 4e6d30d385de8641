//! Condition-based waiting with bounded exponential backoff.
//!
//! Callers own the probe loop and ask a `Backoff` whether another attempt
//! is allowed:
//!
//! ```ignore
//! let mut backoff = policy.start();
//! loop {
//!     if probe().await? { break; }
//!     if !backoff.wait().await { /* timed out */ break; }
//! }
//! ```

use std::time::Duration;

use tokio::time::Instant;

/// Bounds for one polling wait. All values come from configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaitPolicy {
    pub timeout: Duration,
    pub initial_interval: Duration,
    pub max_interval: Duration,
}

impl WaitPolicy {
    pub fn new(timeout: Duration, initial_interval: Duration, max_interval: Duration) -> Self {
        Self {
            timeout,
            initial_interval,
            max_interval: max_interval.max(initial_interval),
        }
    }

    /// Starts the clock for one wait.
    pub fn start(&self) -> Backoff {
        Backoff {
            deadline: Instant::now() + self.timeout,
            next: self.initial_interval,
            max: self.max_interval,
        }
    }
}

/// Running state of one wait.
#[derive(Debug)]
pub struct Backoff {
    deadline: Instant,
    next: Duration,
    max: Duration,
}

impl Backoff {
    /// Sleeps until the next probe is due. Returns `false` once the deadline
    /// has passed, without sleeping.
    ///
    /// The last sleep is clipped to the deadline so a probe always runs at
    /// the deadline itself.
    pub async fn wait(&mut self) -> bool {
        let now = Instant::now();
        if now >= self.deadline {
            return false;
        }
        let delay = self.next.min(self.deadline - now);
        tokio::time::sleep(delay).await;
        self.next = (self.next * 2).min(self.max);
        true
    }
}
