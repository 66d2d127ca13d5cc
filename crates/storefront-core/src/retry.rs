//! Retry policy for transient failures.
//!
//! The policy is pure data: it decides whether a failed attempt may be retried
//! and how long to wait, but never sleeps or sends anything itself. The attempt
//! count it is asked about lives on the request descriptor.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, ErrorKind};

/// Default number of retries after the original attempt.
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Default base delay for exponential backoff.
pub const DEFAULT_BASE_DELAY: Duration = Duration::from_millis(1000);

/// Bounded exponential backoff.
///
/// Delay before retry `n` (0-based) is `base_delay * 2^n`, optionally capped
/// by `max_delay`.
///
/// # Example
///
/// ```
/// use std::time::Duration;
/// use storefront_core::RetryPolicy;
///
/// let policy = RetryPolicy::default();
/// assert_eq!(policy.delay_for(0), Duration::from_millis(1000));
/// assert_eq!(policy.delay_for(2), Duration::from_millis(4000));
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Retries allowed after the original attempt.
    pub max_retries: u32,
    /// Delay before the first retry.
    #[serde(with = "crate::config::duration_ms")]
    pub base_delay: Duration,
    /// Upper bound for any single delay.
    #[serde(default, with = "crate::config::option_duration_ms")]
    pub max_delay: Option<Duration>,
    /// Randomize each delay to between half and all of its exponential value.
    ///
    /// Only honored when the crate is built with the `jitter` feature.
    /// Without it delays stay exact and a warning is logged the first time
    /// a jittered delay is asked for.
    #[serde(default)]
    pub jitter: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            base_delay: DEFAULT_BASE_DELAY,
            max_delay: None,
            jitter: false,
        }
    }
}

impl RetryPolicy {
    /// Exponential backoff from `base_delay` with the default retry cap.
    pub fn exponential(base_delay: Duration) -> Self {
        Self {
            base_delay,
            ..Self::default()
        }
    }

    /// A policy that never retries.
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    #[must_use]
    pub fn with_max_delay(mut self, max_delay: Duration) -> Self {
        self.max_delay = Some(max_delay);
        self
    }

    #[must_use]
    pub fn with_jitter(mut self, jitter: bool) -> Self {
        self.jitter = jitter;
        self
    }

    /// Whether a request that failed with `error` after `attempt_count`
    /// retries may be tried again.
    ///
    /// Only transient failures are retried. Unauthorized is recovered by the
    /// refresh coordinator, never by backoff.
    pub fn should_retry(&self, error: &Error, attempt_count: u32) -> bool {
        error.kind() == ErrorKind::Transient && attempt_count < self.max_retries
    }

    /// Delay to wait before retry number `attempt_count` (0-based).
    pub fn delay_for(&self, attempt_count: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt_count);
        let delay = self.base_delay.saturating_mul(factor);
        let delay = match self.max_delay {
            Some(max) => delay.min(max),
            None => delay,
        };
        self.apply_jitter(delay)
    }

    #[cfg(feature = "jitter")]
    fn apply_jitter(&self, delay: Duration) -> Duration {
        use rand::Rng;

        if !self.jitter || delay.is_zero() {
            return delay;
        }
        // Full jitter: uniform in [delay / 2, delay].
        let millis = delay.as_millis() as u64;
        let low = millis / 2;
        Duration::from_millis(rand::rng().random_range(low..=millis))
    }

    #[cfg(not(feature = "jitter"))]
    fn apply_jitter(&self, delay: Duration) -> Duration {
        static WARNED: std::sync::Once = std::sync::Once::new();

        if self.jitter {
            WARNED.call_once(|| {
                tracing::warn!("Retry jitter needs the `jitter` feature, using exact delays");
            });
        }
        delay
    }
}
