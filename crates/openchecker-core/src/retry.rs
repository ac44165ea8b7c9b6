//! Exponential backoff shared by outbound HTTP calls.

use std::time::Duration;

/// Configuration for exponential backoff retry.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryConfig {
    /// Maximum number of retry attempts (not including the initial attempt).
    pub max_retries: u32,

    /// Initial delay before the first retry.
    pub initial_delay: Duration,

    /// Maximum delay between retries (cap for exponential growth).
    pub max_delay: Duration,

    /// Multiplier for exponential backoff.
    pub backoff_multiplier: f64,

    /// Add up to a quarter of the delay as random jitter.
    pub jitter: bool,
}

impl RetryConfig {
    pub const DEFAULT: Self = Self {
        max_retries: 5,
        initial_delay: Duration::from_secs(1),
        max_delay: Duration::from_secs(30),
        backoff_multiplier: 2.0,
        jitter: true,
    };

    /// Delay before retry `attempt` (0-indexed), without jitter.
    ///
    /// `initial_delay * backoff_multiplier^attempt`, capped at `max_delay`.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let multiplier = self.backoff_multiplier.powi(attempt as i32);
        let delay_secs = self.initial_delay.as_secs_f64() * multiplier;
        Duration::from_secs_f64(delay_secs.min(self.max_delay.as_secs_f64()))
    }

    /// Delay to actually sleep before retry `attempt`.
    pub fn jittered_delay(&self, attempt: u32) -> Duration {
        let delay = self.delay_for_attempt(attempt);
        if !self.jitter {
            return delay;
        }
        let max_jitter = (delay.as_millis() / 4) as u64;
        delay + Duration::from_millis(rand::random_range(0..=max_jitter))
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Rate limiting and gateway errors; the server may answer on a later try.
pub fn is_transient_status(status: u16) -> bool {
    matches!(status, 429 | 502 | 503 | 504)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delay_for_attempt() {
        let config = RetryConfig {
            jitter: false,
            ..RetryConfig::DEFAULT
        };
        assert_eq!(config.delay_for_attempt(0), Duration::from_secs(1));
        assert_eq!(config.delay_for_attempt(1), Duration::from_secs(2));
        assert_eq!(config.delay_for_attempt(4), Duration::from_secs(16));
        assert_eq!(config.delay_for_attempt(5), Duration::from_secs(30));
    }

    #[test]
    fn test_multiplier_shapes_growth() {
        let config = RetryConfig {
            backoff_multiplier: 3.0,
            jitter: false,
            ..RetryConfig::DEFAULT
        };
        assert_eq!(config.delay_for_attempt(2), Duration::from_secs(9));

        let flat = RetryConfig {
            backoff_multiplier: 1.0,
            ..config
        };
        assert_eq!(flat.delay_for_attempt(3), Duration::from_secs(1));
    }

    #[test]
    fn test_jitter_is_bounded() {
        let config = RetryConfig::DEFAULT;
        for attempt in 0..6 {
            let base = config.delay_for_attempt(attempt);
            let delay = config.jittered_delay(attempt);
            assert!(delay >= base);
            assert!(delay <= base + base / 4);
        }
    }

    #[test]
    fn test_no_jitter_is_exact() {
        let config = RetryConfig {
            jitter: false,
            ..RetryConfig::DEFAULT
        };
        assert_eq!(config.jittered_delay(2), config.delay_for_attempt(2));
    }

    #[test]
    fn test_transient_statuses() {
        for status in [429, 502, 503, 504] {
            assert!(is_transient_status(status));
        }
        for status in [200, 400, 401, 404, 500] {
            assert!(!is_transient_status(status));
        }
    }
}
