//! Reconnect backoff (spec §4.7, client side). Generalizes the *shape* of
//! the teacher's `RetryInfo` (`net/connection.rs`: `INITIAL_RETRY_DELAY_SECS`,
//! `RETRY_BACKOFF_FACTOR`, `MAX_RETRY_DELAY_SECS`, doubling on failure,
//! reset on success) with the multiplicative jitter spec.md requires, which
//! `RetryInfo` itself doesn't have — that module is purpose-built for
//! Sybil-resistant registration timing in the teacher's consensus layer and
//! isn't reused verbatim here.

use rand::Rng;
use std::time::Duration;

pub const DEFAULT_INITIAL_DELAY: Duration = Duration::from_secs(1);
pub const DEFAULT_MAX_DELAY: Duration = Duration::from_secs(60);
const MULTIPLIER: f64 = 2.0;
const JITTER_MIN: f64 = 0.9;
const JITTER_MAX: f64 = 1.1;

pub struct ReconnectBackoff {
    initial_delay: Duration,
    max_delay: Duration,
    next_delay: Duration,
    attempts: u32,
    attempt_cap: Option<u32>,
}

impl ReconnectBackoff {
    pub fn new(initial_delay: Duration, max_delay: Duration, attempt_cap: Option<u32>) -> Self {
        Self {
            initial_delay,
            max_delay,
            next_delay: initial_delay,
            attempts: 0,
            attempt_cap,
        }
    }

    /// Computes the jittered delay for the next attempt and advances the
    /// internal state for the attempt after that. Returns `None` once the
    /// configured attempt cap is exhausted.
    pub fn next_delay(&mut self) -> Option<Duration> {
        if let Some(cap) = self.attempt_cap {
            if self.attempts >= cap {
                return None;
            }
        }
        self.attempts += 1;

        let jitter = rand::thread_rng().gen_range(JITTER_MIN..=JITTER_MAX);
        let jittered_secs = self.next_delay.as_secs_f64() * jitter;
        let delay = Duration::from_secs_f64(jittered_secs);

        let scaled = self.next_delay.mul_f64(MULTIPLIER);
        self.next_delay = scaled.min(self.max_delay);

        Some(delay)
    }

    pub fn record_success(&mut self) {
        self.attempts = 0;
        self.next_delay = self.initial_delay;
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }
}

impl Default for ReconnectBackoff {
    fn default() -> Self {
        Self::new(DEFAULT_INITIAL_DELAY, DEFAULT_MAX_DELAY, None)
    }
}
