//! Connect retry policy: bounded attempts with a delay between them.

use std::time::Duration;

/// Upper bound for a single connect attempt when none is configured.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Retry policy for establishing a broker connection.
///
/// The standard policy is 10 attempts, 5 seconds apart. A multiplier above 1.0
/// turns the fixed delay into exponential backoff.
#[derive(Debug, Clone, PartialEq)]
pub struct ConnectRetry {
    /// Total connection attempts before giving up (at least 1 is always made).
    pub max_attempts: u32,

    /// Delay after the first failed attempt.
    pub base_delay: Duration,

    /// Backoff multiplier applied per further failure.
    pub multiplier: f64,

    /// A connect attempt still pending after this long counts as failed.
    pub attempt_timeout: Duration,
}

impl ConnectRetry {
    pub fn fixed(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts,
            base_delay: delay,
            multiplier: 1.0,
            attempt_timeout: DEFAULT_CONNECT_TIMEOUT,
        }
    }

    pub fn with_attempt_timeout(mut self, timeout: Duration) -> Self {
        self.attempt_timeout = timeout;
        self
    }

    pub fn standard() -> Self {
        Self::fixed(10, Duration::from_secs(5))
    }

    /// Delay to wait after `attempts` failed attempts (1-indexed).
    ///
    /// delay = base_delay * multiplier^(attempts - 1)
    pub fn next_delay(&self, attempts: u32) -> Duration {
        let base_secs = self.base_delay.as_secs_f64();
        let delay_secs = base_secs * self.multiplier.powi(attempts.saturating_sub(1) as i32);
        Duration::from_secs_f64(delay_secs)
    }

    pub fn is_exhausted(&self, attempts: u32) -> bool {
        attempts >= self.max_attempts.max(1)
    }
}

impl Default for ConnectRetry {
    fn default() -> Self {
        Self::standard()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standard_policy_is_ten_attempts_five_seconds_apart() {
        let policy = ConnectRetry::standard();
        assert_eq!(policy.max_attempts, 10);
        assert_eq!(policy.next_delay(1), Duration::from_secs(5));
        assert_eq!(policy.next_delay(9), Duration::from_secs(5));
    }

    #[test]
    fn exponential_backoff_increases() {
        let policy = ConnectRetry {
            max_attempts: 5,
            base_delay: Duration::from_secs(2),
            multiplier: 2.0,
            attempt_timeout: DEFAULT_CONNECT_TIMEOUT,
        };

        assert_eq!(policy.next_delay(1), Duration::from_secs(2));
        assert_eq!(policy.next_delay(2), Duration::from_secs(4));
        assert_eq!(policy.next_delay(3), Duration::from_secs(8));
    }

    #[test]
    fn exhaustion() {
        let policy = ConnectRetry::fixed(3, Duration::ZERO);
        assert!(!policy.is_exhausted(2));
        assert!(policy.is_exhausted(3));

        // zero is treated as a single attempt
        let policy = ConnectRetry::fixed(0, Duration::ZERO);
        assert!(policy.is_exhausted(1));
    }
}
