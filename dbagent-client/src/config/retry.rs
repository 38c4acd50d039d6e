//! Retry and timeout escalation settings.
//!
//! A call tries the configured endpoints in order, starting from the first one
//! every time. After each failed attempt the engine sleeps for
//! [`RetryPolicy::retry_sleep`] and multiplies the attempt timeout by
//! [`RetryPolicy::timeout_ratio`], so a replica that is merely overloaded gets
//! more time on the next try.
//!
//! # Example
//!
//! ```
//! use dbagent_client::RetryPolicy;
//! use std::time::Duration;
//!
//! let policy = RetryPolicy::new()
//!     .timeout(Duration::from_secs(2))
//!     .timeout_ratio(2.0)
//!     .retry_sleep(Duration::ZERO);
//!
//! let mut timeouts = policy.timeouts();
//! assert_eq!(timeouts.next_timeout(), Duration::from_secs(2));
//! assert_eq!(timeouts.next_timeout(), Duration::from_secs(4));
//! ```

use std::time::Duration;

/// Default configuration values.
pub mod defaults {
    use std::time::Duration;

    /// Default timeout of the first attempt.
    pub const TIMEOUT: Duration = Duration::from_secs(5);

    /// Default multiplier applied to the timeout after each failed attempt.
    pub const TIMEOUT_RATIO: f64 = 1.5;

    /// Default delay after a failed attempt.
    pub const RETRY_SLEEP: Duration = Duration::from_millis(10);

    /// Default API version segment of the request URI.
    pub const API_VERSION: &str = "v1";

    /// Default `User-Agent` header value.
    pub const USER_AGENT: &str = "unknown";

    /// Default shard header prefix.
    pub const SHARD_HEADER_PREFIX: &str = dbagent_core::DEFAULT_SHARD_HEADER_PREFIX;
}

/// Timeout escalation and inter-attempt delay.
///
/// The number of attempts is not part of the policy: it is bounded by the
/// endpoint list of each subject (see `Subject::with_retry_limit`).
#[derive(Clone, Debug, PartialEq)]
pub struct RetryPolicy {
    /// Timeout of the first attempt.
    pub timeout: Duration,

    /// Multiplier applied to the timeout after each failed attempt. Must be >= 1.0.
    pub timeout_ratio: f64,

    /// Delay after each failed attempt. Zero disables sleeping.
    pub retry_sleep: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            timeout: defaults::TIMEOUT,
            timeout_ratio: defaults::TIMEOUT_RATIO,
            retry_sleep: defaults::RETRY_SLEEP,
        }
    }
}

impl RetryPolicy {
    /// Create a new RetryPolicy with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the timeout of the first attempt.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the timeout multiplier.
    ///
    /// # Panics
    ///
    /// Panics if `ratio` is less than 1.0.
    pub fn timeout_ratio(mut self, ratio: f64) -> Self {
        assert!(ratio >= 1.0, "timeout_ratio must be >= 1.0");
        self.timeout_ratio = ratio;
        self
    }

    /// Set the delay after each failed attempt.
    pub fn retry_sleep(mut self, sleep: Duration) -> Self {
        self.retry_sleep = sleep;
        self
    }

    /// Validate the policy configuration.
    pub fn validate(&self) -> Result<(), &'static str> {
        if self.timeout.is_zero() {
            return Err("timeout must be greater than zero");
        }
        if !self.timeout_ratio.is_finite() || self.timeout_ratio < 1.0 {
            return Err("timeout_ratio must be >= 1.0");
        }
        Ok(())
    }

    /// Create a [`TimeoutEscalation`] from this policy.
    pub fn timeouts(&self) -> TimeoutEscalation {
        TimeoutEscalation::new(self.timeout, self.timeout_ratio)
    }
}

/// Yields the timeout of each successive attempt: `timeout * ratio^attempt`.
#[derive(Clone, Debug)]
pub struct TimeoutEscalation {
    /// Current timeout, stored as f64 to avoid rounding errors.
    current_secs: f64,
    ratio: f64,
    attempts: u32,
}

impl TimeoutEscalation {
    /// Create a new escalation starting at `initial`.
    pub fn new(initial: Duration, ratio: f64) -> Self {
        Self {
            current_secs: initial.as_secs_f64(),
            ratio,
            attempts: 0,
        }
    }

    /// Get the number of timeouts handed out so far.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Get the timeout for the next attempt and escalate for the one after.
    pub fn next_timeout(&mut self) -> Duration {
        let current = self.current_secs;
        self.current_secs *= self.ratio;
        self.attempts += 1;
        Duration::try_from_secs_f64(current).unwrap_or(Duration::MAX)
    }
}
