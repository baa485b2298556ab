//! Delay between failover attempts: a linear step plus additive random jitter so
//! concurrent callers retrying after the same outage spread out.

use crate::config::FailoverConfig;

use rand::Rng;
use std::time::Duration;

/// Source of the jitter term, injectable so tests can be deterministic.
pub trait JitterSource: Send + Sync + 'static {
    /// A value in `[0, max)`, or zero when `max` is zero.
    fn jitter(&self, max: Duration) -> Duration;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct RandomJitter;

impl JitterSource for RandomJitter {
    fn jitter(&self, max: Duration) -> Duration {
        let max_ms = max.as_millis() as u64;
        if max_ms == 0 {
            return Duration::ZERO;
        }
        Duration::from_millis(rand::rng().random_range(0..max_ms))
    }
}

/// Always returns the same jitter, clamped below the bound.
#[derive(Debug, Clone, Copy, Default)]
pub struct FixedJitter(pub Duration);

impl JitterSource for FixedJitter {
    fn jitter(&self, max: Duration) -> Duration {
        if max.is_zero() {
            return Duration::ZERO;
        }
        self.0.min(max.saturating_sub(Duration::from_millis(1)))
    }
}

/// `base + attempt * step + jitter`, where `attempt` is the 1-based attempt that just failed.
pub fn backoff_delay(config: &FailoverConfig, attempt: u32, jitter: &dyn JitterSource) -> Duration {
    config
        .backoff_base
        .saturating_add(config.backoff_step.saturating_mul(attempt))
        .saturating_add(jitter.jitter(config.backoff_jitter))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_linear_backoff_with_fixed_jitter() {
        let config = FailoverConfig::default();
        let jitter = FixedJitter(Duration::from_millis(250));

        assert_eq!(backoff_delay(&config, 1, &jitter), Duration::from_millis(1750));
        assert_eq!(backoff_delay(&config, 2, &jitter), Duration::from_millis(2250));
    }

    #[test]
    fn test_fixed_jitter_stays_below_bound() {
        let jitter = FixedJitter(Duration::from_secs(10));
        assert_eq!(
            jitter.jitter(Duration::from_millis(1000)),
            Duration::from_millis(999)
        );
        assert_eq!(jitter.jitter(Duration::ZERO), Duration::ZERO);
    }

    #[test]
    fn test_random_jitter_range() {
        let max = Duration::from_millis(1000);
        for _ in 0..200 {
            assert!(RandomJitter.jitter(max) < max);
        }
        assert_eq!(RandomJitter.jitter(Duration::ZERO), Duration::ZERO);
    }

    #[test]
    fn test_backoff_bounds() {
        let config = FailoverConfig::default();
        for attempt in 1..=3 {
            let delay = backoff_delay(&config, attempt, &RandomJitter);
            let floor = Duration::from_millis(1000 + attempt as u64 * 500);
            assert!(delay >= floor);
            assert!(delay < floor + Duration::from_millis(1000));
        }
    }
}
