//! Reconnect policy: bounded exponential backoff with additive jitter.

use std::time::Duration;

use rand::Rng;

use rms_core::config::RealtimeConfig;
use rms_core::constants;

/// Configuration for socket reconnection behavior.
#[derive(Debug, Clone)]
pub struct ReconnectConfig {
    /// Delay before the first reconnect attempt.
    pub base_delay: Duration,
    /// Multiplier applied per attempt.
    pub growth_factor: f64,
    /// Cap on the exponential part of the delay.
    pub max_delay: Duration,
    /// Exclusive upper bound of the uniform jitter added after capping.
    pub max_jitter: Duration,
    /// Consecutive abnormal closes tolerated before giving up.
    pub max_attempts: u32,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_millis(constants::RECONNECT_BASE_DELAY_MS),
            growth_factor: constants::RECONNECT_GROWTH_FACTOR,
            max_delay: Duration::from_millis(constants::RECONNECT_MAX_DELAY_MS),
            max_jitter: Duration::from_millis(constants::RECONNECT_MAX_JITTER_MS),
            max_attempts: constants::MAX_RECONNECT_ATTEMPTS,
        }
    }
}

impl From<&RealtimeConfig> for ReconnectConfig {
    fn from(config: &RealtimeConfig) -> Self {
        Self {
            base_delay: Duration::from_millis(config.base_delay_ms),
            growth_factor: config.growth_factor,
            max_delay: Duration::from_millis(config.max_delay_ms),
            max_jitter: Duration::from_millis(config.max_jitter_ms),
            max_attempts: config.max_reconnect_attempts,
        }
    }
}

impl ReconnectConfig {
    /// Exponential part of the delay: `min(max_delay, base * growth^attempt)`.
    pub fn capped_delay(&self, attempt: u32) -> Duration {
        let base = self.base_delay.as_secs_f64();
        let max = self.max_delay.as_secs_f64();
        let exponential = base * self.growth_factor.powi(attempt.min(i32::MAX as u32) as i32);
        // powi overflows to +inf for large attempts; min() keeps it finite.
        Duration::from_secs_f64(exponential.min(max))
    }

    /// Delay for `attempt` with an explicit jitter value.
    pub fn delay_with_jitter(&self, attempt: u32, jitter: Duration) -> Duration {
        self.capped_delay(attempt) + jitter
    }

    /// Delay for `attempt` with jitter drawn uniformly from `[0, max_jitter)`.
    pub fn reconnect_delay(&self, attempt: u32) -> Duration {
        let jitter = if self.max_jitter.is_zero() {
            Duration::ZERO
        } else {
            let fraction: f64 = rand::thread_rng().gen();
            self.max_jitter.mul_f64(fraction)
        };
        self.delay_with_jitter(attempt, jitter)
    }

    /// Upper bound of any delay this policy produces.
    pub fn max_total_delay(&self) -> Duration {
        self.max_delay + self.max_jitter
    }

    /// Whether another attempt may be scheduled after `attempts` retries.
    pub fn allows_attempt(&self, attempts: u32) -> bool {
        attempts < self.max_attempts
    }
}
