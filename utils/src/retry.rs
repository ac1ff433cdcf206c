//! Bounded exponential backoff for idempotent session round trips.

use serde::{Deserialize, Serialize};
use std::time::Duration;

fn default_max_attempts() -> u32 {
    4
}

fn default_initial_backoff_ms() -> u64 {
    200
}

fn default_max_backoff_ms() -> u64 {
    5_000
}

fn default_round_trip_timeout_ms() -> u64 {
    10_000
}

/// How often and how patiently a request is repeated.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Total attempts, the first one included. Never less than one.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,
    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,
    /// How long to wait for the reply to one attempt.
    #[serde(default = "default_round_trip_timeout_ms")]
    pub round_trip_timeout_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_backoff_ms: default_initial_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
            round_trip_timeout_ms: default_round_trip_timeout_ms(),
        }
    }
}

impl RetryPolicy {
    /// A single attempt with no waiting.
    pub fn no_retry(round_trip_timeout_ms: u64) -> Self {
        Self {
            max_attempts: 1,
            initial_backoff_ms: 0,
            max_backoff_ms: 0,
            round_trip_timeout_ms,
        }
    }

    pub fn attempts(&self) -> u32 {
        self.max_attempts.max(1)
    }

    pub fn round_trip_timeout(&self) -> Duration {
        Duration::from_millis(self.round_trip_timeout_ms)
    }

    /// Wait before attempt `attempt` (1-based). The first attempt never waits;
    /// later ones double from `initial_backoff_ms`, capped at
    /// `max_backoff_ms`.
    pub fn backoff_before(&self, attempt: u32) -> Duration {
        if attempt <= 1 {
            return Duration::ZERO;
        }
        let doublings = (attempt - 2).min(32);
        let millis = self
            .initial_backoff_ms
            .saturating_mul(1u64 << doublings)
            .min(self.max_backoff_ms);
        Duration::from_millis(millis)
    }
}
