use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Total attempts per call, the first one included.
pub const RETRY_ATTEMPTS: u32 = 2;

/// Fixed pause between attempts. Not exponential.
pub const RETRY_DELAY: Duration = Duration::from_secs(2);

/// Retry behaviour of the remote executor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Total attempts (minimum 1)
    pub attempts: u32,
    /// Delay between attempts in milliseconds
    pub delay_ms: u64,
    /// Give up right away when the remote rejects the token
    pub stop_on_auth_error: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: RETRY_ATTEMPTS,
            delay_ms: RETRY_DELAY.as_millis() as u64,
            stop_on_auth_error: false,
        }
    }
}

impl RetryPolicy {
    pub fn new(attempts: u32, delay: Duration) -> Self {
        Self {
            attempts,
            delay_ms: delay.as_millis() as u64,
            stop_on_auth_error: false,
        }
    }

    /// Single attempt, no delay.
    pub fn no_retry() -> Self {
        Self::new(1, Duration::ZERO)
    }

    pub fn stop_on_auth_error(mut self, stop: bool) -> Self {
        self.stop_on_auth_error = stop;
        self
    }

    pub fn max_attempts(&self) -> u32 {
        self.attempts.max(1)
    }

    pub fn delay(&self) -> Duration {
        Duration::from_millis(self.delay_ms)
    }

    /// Whether another attempt follows the (zero-based) `attempt`.
    pub fn has_next(&self, attempt: u32) -> bool {
        attempt + 1 < self.max_attempts()
    }
}
