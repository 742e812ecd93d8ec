//! Poll delay under consecutive errors.

use std::time::Duration;

use crate::config::IolinkConfig;

/// Exponential backoff once an error threshold is crossed.
///
/// Up to `threshold` consecutive errors the base interval is used; above it
/// the delay is `2^(errors - threshold)` seconds, capped at `max`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffPolicy {
    pub base: Duration,
    pub threshold: u32,
    pub max: Duration,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            base: Duration::from_secs(1),
            threshold: 10,
            max: Duration::from_secs(30),
        }
    }
}

impl BackoffPolicy {
    /// Build the policy from bridge configuration.
    pub fn from_config(config: &IolinkConfig) -> Self {
        Self {
            base: Duration::from_millis(config.poll_interval_ms),
            threshold: config.backoff_threshold,
            max: Duration::from_millis(config.max_backoff_ms),
        }
    }

    /// Delay before the next poll after `errors` consecutive failures.
    pub fn delay(&self, errors: u32) -> Duration {
        if errors <= self.threshold {
            return self.base;
        }

        // Clamped so the shift cannot overflow.
        let exponent = (errors - self.threshold).min(31);
        Duration::from_secs(1u64 << exponent).min(self.max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_until_threshold() {
        let policy = BackoffPolicy::default();
        for errors in 0..=10 {
            assert_eq!(policy.delay(errors), Duration::from_secs(1));
        }
    }

    #[test]
    fn test_exponential_then_capped() {
        let policy = BackoffPolicy::default();
        assert_eq!(policy.delay(11), Duration::from_secs(2));
        assert_eq!(policy.delay(12), Duration::from_secs(4));
        assert_eq!(policy.delay(14), Duration::from_secs(16));
        assert_eq!(policy.delay(15), Duration::from_secs(30));
        assert_eq!(policy.delay(u32::MAX), Duration::from_secs(30));
    }

    #[test]
    fn test_non_decreasing() {
        let policy = BackoffPolicy::default();
        let mut previous = Duration::ZERO;
        for errors in 0..100 {
            let delay = policy.delay(errors);
            assert!(delay >= previous);
            previous = delay;
        }
    }

    #[test]
    fn test_from_config() {
        let policy = BackoffPolicy::from_config(&IolinkConfig::default());
        assert_eq!(policy, BackoffPolicy::default());
    }
}
