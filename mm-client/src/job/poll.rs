//! Poll scheduling policy

use std::time::Duration;

/// Default delay between status polls
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(2000);
/// Default consecutive transport failures tolerated while polling
pub const DEFAULT_MAX_RETRIES: u32 = 3;
/// Upper bound on the backoff delay
pub const MAX_BACKOFF: Duration = Duration::from_secs(30);

/// How the orchestrator polls job status
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    /// Delay between a non-terminal response and the next poll
    pub interval: Duration,
    /// Consecutive transport failures retried before the job fails; 0 fails
    /// on the first error
    pub max_retries: u32,
    /// Ceiling for [`PollPolicy::backoff`]
    pub max_backoff: Duration,
}

impl PollPolicy {
    pub fn new(interval: Duration, max_retries: u32) -> Self {
        Self {
            interval,
            max_retries,
            max_backoff: MAX_BACKOFF.max(interval),
        }
    }

    /// Delay before retry number `attempt` (1-based)
    ///
    /// Starts at the poll interval and doubles per attempt, capped.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(16);
        self.interval
            .checked_mul(1u32 << exponent)
            .unwrap_or(self.max_backoff)
            .min(self.max_backoff)
    }
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_POLL_INTERVAL, DEFAULT_MAX_RETRIES)
    }
}
