//! Reconnection policy for the streaming chat socket.
//!
//! The default policy reproduces the deck's historical behavior: a flat
//! 3000 ms wait before every reattempt, forever. Callers that want real
//! backoff or a bounded number of attempts construct a different policy and
//! inject it into the session; nothing in the driver hardcodes the delay.

use std::time::Duration;

/// The historical flat reconnect delay.
pub const DEFAULT_RECONNECT_DELAY: Duration = Duration::from_millis(3000);

/// Decides how long to wait before reconnect attempt `n`, and when to stop.
#[derive(Clone, Debug, PartialEq)]
pub struct RetryPolicy {
    initial_delay: Duration,
    multiplier: f64,
    max_delay: Duration,
    max_attempts: Option<u32>,
}

impl RetryPolicy {
    /// A flat-interval policy with no attempt limit.
    pub fn fixed(delay: Duration) -> Self {
        Self {
            initial_delay: delay,
            multiplier: 1.0,
            max_delay: delay,
            max_attempts: None,
        }
    }

    /// An exponential backoff policy capped at `max_delay`.
    pub fn backoff(initial_delay: Duration, multiplier: f64, max_delay: Duration) -> Self {
        Self {
            initial_delay,
            multiplier: multiplier.max(1.0),
            max_delay: max_delay.max(initial_delay),
            max_attempts: None,
        }
    }

    /// Bounds the number of reattempts.
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = Some(max_attempts);
        self
    }

    /// Returns the delay before reconnect attempt `attempt` (zero-based),
    /// or `None` when the policy has given up.
    pub fn delay_for(&self, attempt: u32) -> Option<Duration> {
        if let Some(max_attempts) = self.max_attempts {
            if attempt >= max_attempts {
                return None;
            }
        }
        let exponent = attempt.min(64) as i32;
        let scaled = self.initial_delay.as_secs_f64() * self.multiplier.powi(exponent);
        let capped = scaled.min(self.max_delay.as_secs_f64());
        Some(Duration::from_secs_f64(capped))
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::fixed(DEFAULT_RECONNECT_DELAY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_policy_never_varies() {
        let policy = RetryPolicy::default();
        for attempt in [0, 1, 7, 1000] {
            assert_eq!(policy.delay_for(attempt), Some(DEFAULT_RECONNECT_DELAY));
        }
    }

    #[test]
    fn backoff_grows_and_caps() {
        let policy = RetryPolicy::backoff(
            Duration::from_secs(1),
            2.0,
            Duration::from_secs(8),
        );
        assert_eq!(policy.delay_for(0), Some(Duration::from_secs(1)));
        assert_eq!(policy.delay_for(1), Some(Duration::from_secs(2)));
        assert_eq!(policy.delay_for(2), Some(Duration::from_secs(4)));
        assert_eq!(policy.delay_for(3), Some(Duration::from_secs(8)));
        assert_eq!(policy.delay_for(10), Some(Duration::from_secs(8)));
    }

    #[test]
    fn bounded_attempts_give_up() {
        let policy = RetryPolicy::fixed(Duration::from_millis(100)).with_max_attempts(2);
        assert!(policy.delay_for(0).is_some());
        assert!(policy.delay_for(1).is_some());
        assert_eq!(policy.delay_for(2), None);
    }
}
