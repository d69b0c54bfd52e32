use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Exponential backoff applied while an SSE connection is being established.
///
/// Only failures that happen before the server answered are retried; once a
/// response arrived the stream is never replayed, since that would resubmit
/// the outbound message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReconnectPolicy {
    /// Additional attempts after the first one. `None` retries without limit.
    #[serde(default)]
    pub max_retries: Option<u32>,
    /// Backoff before the first retry.
    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,
    /// Exponential multiplier per retry step.
    #[serde(default = "default_backoff_factor")]
    pub backoff_factor: f64,
    /// Upper bound for computed backoff.
    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,
}

const fn default_initial_backoff_ms() -> u64 {
    500
}

const fn default_backoff_factor() -> f64 {
    2.0
}

const fn default_max_backoff_ms() -> u64 {
    10_000
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self::unlimited()
    }
}

impl ReconnectPolicy {
    /// Retries connection failures forever (until the stream is aborted).
    pub const fn unlimited() -> Self {
        Self {
            max_retries: None,
            initial_backoff_ms: default_initial_backoff_ms(),
            backoff_factor: default_backoff_factor(),
            max_backoff_ms: default_max_backoff_ms(),
        }
    }

    /// Fails on the first connection error.
    pub const fn none() -> Self {
        Self {
            max_retries: Some(0),
            ..Self::unlimited()
        }
    }

    pub fn limited(max_retries: u32) -> Self {
        Self {
            max_retries: Some(max_retries),
            ..Self::unlimited()
        }
    }

    pub fn with_backoff(mut self, initial_backoff_ms: u64, backoff_factor: f64) -> Self {
        self.initial_backoff_ms = if initial_backoff_ms == 0 {
            default_initial_backoff_ms()
        } else {
            initial_backoff_ms
        };
        self.backoff_factor = if backoff_factor <= 0.0 {
            default_backoff_factor()
        } else {
            backoff_factor
        };
        self
    }

    pub fn with_max_backoff_ms(mut self, max_backoff_ms: u64) -> Self {
        self.max_backoff_ms = max_backoff_ms.max(1);
        self
    }

    pub fn can_retry(&self, retries_done: u32) -> bool {
        match self.max_retries {
            None => true,
            Some(max) => retries_done < max,
        }
    }

    pub fn backoff_duration(&self, retries_done: u32) -> Duration {
        if self.max_retries == Some(0) {
            return Duration::ZERO;
        }
        let cap = self.max_backoff_ms.max(1) as f64;
        let exp = self.backoff_factor.powi(retries_done.min(64) as i32);
        let base = (self.initial_backoff_ms as f64 * exp).round().min(cap);
        Duration::from_millis(base as u64)
    }
}
