//! Backoff after failed batch deliveries
//!
//! Consecutive failures open a retry window of
//! `min(max_delay, base_delay * 2^(failures - 1))`, shortened by up to 50%
//! random jitter so many clients coming back online do not flush in lockstep.
//! Automatic flush triggers are skipped while the window is open. A
//! successful delivery closes it.

use rand::Rng;
use smartalk_common::config::RetryConfig;
use std::time::Duration;
use tokio::time::Instant;

/// Largest exponent applied to the base delay
const MAX_DOUBLINGS: u32 = 20;

#[derive(Debug)]
pub struct Backoff {
    base_delay: Duration,
    max_delay: Duration,
    consecutive_failures: u32,
    retry_at: Option<Instant>,
}

impl Backoff {
    pub fn new(config: RetryConfig) -> Self {
        Self {
            base_delay: Duration::from_millis(config.base_delay_ms),
            max_delay: Duration::from_millis(config.max_delay_ms),
            consecutive_failures: 0,
            retry_at: None,
        }
    }

    /// Change bounds; failure history is kept
    pub fn reconfigure(&mut self, config: RetryConfig) {
        self.base_delay = Duration::from_millis(config.base_delay_ms);
        self.max_delay = Duration::from_millis(config.max_delay_ms);
    }

    /// Un-jittered delay after `failures` consecutive failures
    pub fn delay_for(&self, failures: u32) -> Duration {
        if failures == 0 {
            return Duration::ZERO;
        }
        let doublings = (failures - 1).min(MAX_DOUBLINGS);
        self.base_delay
            .saturating_mul(1u32 << doublings)
            .min(self.max_delay)
    }

    /// Register a failure and open the retry window; returns its length
    pub fn record_failure(&mut self) -> Duration {
        self.consecutive_failures = self.consecutive_failures.saturating_add(1);
        let delay = self.delay_for(self.consecutive_failures);
        let jitter = rand::thread_rng().gen_range(0.0..=0.5);
        let wait = delay.mul_f64(1.0 - jitter);
        self.retry_at = Some(Instant::now() + wait);
        wait
    }

    pub fn record_success(&mut self) {
        self.consecutive_failures = 0;
        self.retry_at = None;
    }

    /// Whether an automatic flush may run at `now`
    pub fn is_ready(&self, now: Instant) -> bool {
        self.retry_at.map_or(true, |at| now >= at)
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }
}
