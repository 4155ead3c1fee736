//! Immutable retry policy and its validating builder.
//!
//! A [`RetryPolicy`] is built once at configuration time and only read afterwards. It bundles
//! the retry budget with the backoff curve and jitter strength used between attempts.
//!
//! Example
//! ```rust
//! use std::time::Duration;
//! use lifeline::RetryPolicy;
//!
//! let policy = RetryPolicy::builder()
//!     .max_attempts(5)
//!     .base_delay(Duration::from_millis(100))
//!     .max_delay(Duration::from_secs(2))
//!     .jitter_factor(0.1)
//!     .build()
//!     .unwrap();
//! assert_eq!(policy.max_attempts(), 5);
//! assert!(policy.use_exponential_backoff());
//! ```

use crate::{Backoff, Jitter};
use std::time::Duration;

/// Default retry budget (initial call included).
pub const DEFAULT_MAX_ATTEMPTS: usize = 3;
/// Default backoff unit.
pub const DEFAULT_BASE_DELAY: Duration = Duration::from_millis(1_000);
/// Default backoff ceiling.
pub const DEFAULT_MAX_DELAY: Duration = Duration::from_millis(30_000);
/// Default jitter strength.
pub const DEFAULT_JITTER_FACTOR: f64 = 0.2;

/// Errors produced while validating retry configuration.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PolicyError {
    /// `max_attempts` must be >= 1.
    #[error("max_attempts must be > 0 (got {0})")]
    InvalidMaxAttempts(usize),
    /// Jitter factor must be a finite value in `[0.0, 1.0]`.
    #[error("jitter_factor must be within [0.0, 1.0] (got {0})")]
    InvalidJitterFactor(f64),
    /// The backoff ceiling may not be below the backoff unit.
    #[error("max_delay ({max:?}) must be >= base_delay ({base:?})")]
    MaxLessThanBase { base: Duration, max: Duration },
}

/// Retry budget plus delay shaping for one class of operations.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    max_attempts: usize,
    backoff: Backoff,
    jitter: Jitter,
}

impl RetryPolicy {
    /// Construct a new builder with defaults.
    pub fn builder() -> RetryPolicyBuilder {
        RetryPolicyBuilder::new()
    }

    /// A policy that never retries; the backoff calculator is never consulted.
    pub fn single_attempt() -> Self {
        Self { max_attempts: 1, ..Self::default() }
    }

    /// Total attempts allowed (initial call + retries).
    pub fn max_attempts(&self) -> usize {
        self.max_attempts
    }

    pub fn base_delay(&self) -> Duration {
        self.backoff.base()
    }

    pub fn max_delay(&self) -> Duration {
        self.backoff.max()
    }

    pub fn use_exponential_backoff(&self) -> bool {
        self.backoff.is_exponential()
    }

    pub fn jitter_factor(&self) -> f64 {
        self.jitter.factor()
    }

    pub fn backoff(&self) -> &Backoff {
        &self.backoff
    }

    pub fn jitter(&self) -> &Jitter {
        &self.jitter
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            backoff: Backoff::exponential(DEFAULT_BASE_DELAY).capped_at(DEFAULT_MAX_DELAY),
            jitter: Jitter::from_factor_unchecked(DEFAULT_JITTER_FACTOR),
        }
    }
}

/// Builder for `RetryPolicy`.
#[derive(Debug, Clone)]
pub struct RetryPolicyBuilder {
    max_attempts: usize,
    base_delay: Duration,
    max_delay: Duration,
    exponential: bool,
    jitter_factor: f64,
}

impl RetryPolicyBuilder {
    /// Create a builder with the documented defaults.
    pub fn new() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            base_delay: DEFAULT_BASE_DELAY,
            max_delay: DEFAULT_MAX_DELAY,
            exponential: true,
            jitter_factor: DEFAULT_JITTER_FACTOR,
        }
    }

    /// Set total attempts (initial + retries). Must be > 0.
    pub fn max_attempts(mut self, attempts: usize) -> Self {
        self.max_attempts = attempts;
        self
    }

    pub fn base_delay(mut self, delay: Duration) -> Self {
        self.base_delay = delay;
        self
    }

    pub fn max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    /// Double the delay per retry (`true`) or keep it fixed at the base delay (`false`).
    pub fn exponential(mut self, enabled: bool) -> Self {
        self.exponential = enabled;
        self
    }

    pub fn jitter_factor(mut self, factor: f64) -> Self {
        self.jitter_factor = factor;
        self
    }

    /// Shorthand for `jitter_factor(0.0)`.
    pub fn no_jitter(self) -> Self {
        self.jitter_factor(0.0)
    }

    /// Build the retry policy, validating inputs.
    pub fn build(self) -> Result<RetryPolicy, PolicyError> {
        if self.max_attempts == 0 {
            return Err(PolicyError::InvalidMaxAttempts(0));
        }
        let jitter = Jitter::proportional(self.jitter_factor)?;
        let backoff = if self.exponential {
            Backoff::exponential(self.base_delay)
        } else {
            Backoff::constant(self.base_delay)
        }
        .with_max(self.max_delay)?;
        Ok(RetryPolicy { max_attempts: self.max_attempts, backoff, jitter })
    }
}

impl Default for RetryPolicyBuilder {
    fn default() -> Self {
        Self::new()
    }
}
