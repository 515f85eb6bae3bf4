//! Exponential backoff schedule for acknowledge retries.

use std::time::Duration;

use rand::Rng;

use ferry_core::config::RetryConfig;

/// Retry schedule handed to each receipt handle.
///
/// Delay for retry `n` (0-based) is `interval * 2^n`, capped at
/// `max_interval`, then scaled by a random factor in `1 ± jitter`.
#[derive(Debug, Clone, PartialEq)]
pub struct BackoffPolicy {
    pub interval: Duration,
    pub jitter: f64,
    /// Retries after the first attempt (0 means a single attempt).
    pub max_retries: u32,
    pub max_interval: Duration,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self::from(&RetryConfig::default())
    }
}

impl From<&RetryConfig> for BackoffPolicy {
    fn from(config: &RetryConfig) -> Self {
        Self {
            interval: Duration::from_millis(config.interval_ms),
            jitter: config.jitter.clamp(0.0, 1.0),
            max_retries: config.max_retries,
            max_interval: Duration::from_millis(config.max_interval_ms.max(config.interval_ms)),
        }
    }
}

impl BackoffPolicy {
    /// Delay before retry `attempt`, without jitter.
    pub fn base_delay(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.min(31));
        self.interval.saturating_mul(factor).min(self.max_interval)
    }

    /// Delay before retry `attempt`, with jitter applied.
    pub fn delay(&self, attempt: u32) -> Duration {
        let base = self.base_delay(attempt);
        if self.jitter <= 0.0 {
            return base;
        }
        let factor = rand::thread_rng().gen_range(1.0 - self.jitter..=1.0 + self.jitter);
        base.mul_f64(factor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_policy() {
        let policy = BackoffPolicy::default();
        assert_eq!(policy.interval, Duration::from_millis(500));
        assert_eq!(policy.max_retries, 5);
        assert_eq!(policy.jitter, 0.05);
    }

    #[test]
    fn test_base_delay_doubles_and_caps() {
        let policy = BackoffPolicy::default();
        assert_eq!(policy.base_delay(0), Duration::from_millis(500));
        assert_eq!(policy.base_delay(1), Duration::from_millis(1000));
        assert_eq!(policy.base_delay(3), Duration::from_millis(4000));
        assert_eq!(policy.base_delay(10), Duration::from_secs(10));
        assert_eq!(policy.base_delay(u32::MAX), Duration::from_secs(10));
    }

    #[test]
    fn test_jitter_stays_in_band() {
        let policy = BackoffPolicy::default();
        for _ in 0..100 {
            let d = policy.delay(0).as_secs_f64();
            assert!((0.47..=0.53).contains(&d), "delay {d} out of band");
        }
    }
}
