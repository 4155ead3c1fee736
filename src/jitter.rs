//! Proportional jitter to prevent synchronized retry storms
//!
//! A jittered delay is `delay + uniform(0, delay * factor)`: jitter only ever lengthens a
//! delay, by at most `factor` of it. A factor of `0.0` disables jitter.
//!
//! Notes:
//! - RNG: uses `rand`'s thread-local RNG by default, so concurrent retry loops never contend
//!   on a shared generator; deterministic RNGs can be injected via `apply_with_rng`.
//! - Precision: nanosecond arithmetic, saturating at `MAX_BACKOFF`.
//!
//! Example:
//! ```rust
//! use lifeline::Jitter;
//! use std::time::Duration;
//!
//! let jitter = Jitter::proportional(0.2).unwrap();
//! let delay = jitter.apply(Duration::from_millis(1000));
//! assert!(delay >= Duration::from_millis(1000));
//! assert!(delay <= Duration::from_millis(1200));
//! ```

use crate::backoff::MAX_BACKOFF;
use crate::policy::PolicyError;
use rand::{rng, Rng};
use std::time::Duration;

/// Jitter strength as a fraction of the delay being randomized.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Jitter {
    factor: f64,
}

impl Jitter {
    /// No jitter - use exact backoff delay
    pub const fn none() -> Self {
        Self { factor: 0.0 }
    }

    /// Jitter adding up to `factor` of the delay. `factor` must be finite and in `[0.0, 1.0]`.
    pub fn proportional(factor: f64) -> Result<Self, PolicyError> {
        if !factor.is_finite() || !(0.0..=1.0).contains(&factor) {
            return Err(PolicyError::InvalidJitterFactor(factor));
        }
        Ok(Self { factor })
    }

    pub(crate) const fn from_factor_unchecked(factor: f64) -> Self {
        Self { factor }
    }

    pub fn factor(&self) -> f64 {
        self.factor
    }

    /// Width of the random window added on top of `delay`.
    pub fn range(&self, delay: Duration) -> Duration {
        if self.factor == 0.0 {
            return Duration::ZERO;
        }
        delay.min(MAX_BACKOFF).mul_f64(self.factor)
    }

    /// Apply jitter to a delay duration
    pub fn apply(&self, delay: Duration) -> Duration {
        let mut rng = rng();
        self.apply_with_rng(delay, &mut rng)
    }

    /// Apply jitter with a custom RNG (for testing)
    pub fn apply_with_rng<R: Rng>(&self, delay: Duration, rng: &mut R) -> Duration {
        let window = Self::as_nanos_saturated(self.range(delay));
        if window == 0 {
            return delay;
        }
        let extra = rng.random_range(0..=window);
        delay.saturating_add(Duration::from_nanos(extra))
    }

    fn as_nanos_saturated(duration: Duration) -> u64 {
        duration.as_nanos().try_into().unwrap_or(u64::MAX)
    }
}

impl Default for Jitter {
    fn default() -> Self {
        Self::none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn none_jitter_returns_exact_delay() {
        let delay = Duration::from_secs(1);
        assert_eq!(Jitter::none().apply(delay), delay);
    }

    #[test]
    fn proportional_jitter_only_lengthens() {
        let jitter = Jitter::proportional(0.5).unwrap();
        let delay = Duration::from_secs(1);

        for _ in 0..100 {
            let jittered = jitter.apply(delay);
            assert!(jittered >= delay);
            assert!(jittered <= Duration::from_millis(1500));
        }
    }

    #[test]
    fn full_factor_at_most_doubles() {
        let jitter = Jitter::proportional(1.0).unwrap();
        let mut rng = StdRng::seed_from_u64(42);
        for _ in 0..100 {
            let jittered = jitter.apply_with_rng(Duration::from_millis(400), &mut rng);
            assert!(jittered <= Duration::from_millis(800));
        }
    }

    #[test]
    fn seeded_rng_is_reproducible() {
        let jitter = Jitter::proportional(0.2).unwrap();
        let mut a = StdRng::seed_from_u64(9);
        let mut b = StdRng::seed_from_u64(9);
        let delay = Duration::from_millis(1000);
        assert_eq!(jitter.apply_with_rng(delay, &mut a), jitter.apply_with_rng(delay, &mut b));
    }

    #[test]
    fn jitter_handles_zero_delay() {
        let jitter = Jitter::proportional(0.3).unwrap();
        assert_eq!(jitter.apply(Duration::ZERO), Duration::ZERO);
        assert_eq!(jitter.range(Duration::ZERO), Duration::ZERO);
    }

    #[test]
    fn constructor_rejects_invalid_factors() {
        assert!(matches!(Jitter::proportional(-0.01), Err(PolicyError::InvalidJitterFactor(_))));
        assert!(matches!(Jitter::proportional(1.01), Err(PolicyError::InvalidJitterFactor(_))));
        assert!(Jitter::proportional(f64::NAN).is_err());
    }

    #[test]
    fn saturates_large_durations_without_panicking() {
        let jitter = Jitter::proportional(1.0).unwrap();
        let mut rng = StdRng::seed_from_u64(999);
        let jittered = jitter.apply_with_rng(Duration::MAX, &mut rng);
        assert_eq!(jittered, Duration::MAX);
    }
}
