//! Backoff calculator for retry policies.
//!
//! Provides fixed and exponential curves clamped to a ceiling. Attempt semantics: the index
//! passed to [`Backoff::delay`] is the 0-based retry index, so the first retry (after the
//! initial call failed) uses index `0` and waits exactly the base delay.
//!
//! [`compute_delay`] combines the curve with the policy's proportional jitter and is the single
//! entry point used by the retry executor.
//!
//! Example
//! ```rust
//! use std::time::Duration;
//! use lifeline::Backoff;
//!
//! let backoff = Backoff::exponential(Duration::from_millis(100))
//!     .with_max(Duration::from_secs(2))
//!     .unwrap();
//! assert_eq!(backoff.delay(0), Duration::from_millis(100)); // first retry
//! assert_eq!(backoff.delay(1), Duration::from_millis(200));
//! assert_eq!(backoff.delay(5), Duration::from_secs(2)); // capped
//! ```
//!
//! Overflow behavior: without an explicit ceiling the curve saturates at `MAX_BACKOFF` (1 day),
//! or at the base delay when that is larger. An explicit ceiling replaces that bound, so a
//! delay is never shorter than the base.

use crate::policy::{PolicyError, RetryPolicy};
use rand::Rng;
use std::time::Duration;

/// Default ceiling, used when no explicit one is set (1 day).
pub const MAX_BACKOFF: Duration = Duration::from_secs(24 * 60 * 60);

const NANOS_PER_SEC: u128 = 1_000_000_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BackoffKind {
    Constant,
    Exponential,
}

/// Delay curve between retry attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Backoff {
    kind: BackoffKind,
    base: Duration,
    max: Duration,
}

impl Backoff {
    /// Create a fixed backoff: every retry waits `delay`.
    pub fn constant(delay: Duration) -> Self {
        Self { kind: BackoffKind::Constant, base: delay, max: MAX_BACKOFF.max(delay) }
    }

    /// Create an exponential backoff: retry `i` waits `base * 2^i`.
    pub fn exponential(base: Duration) -> Self {
        Self { kind: BackoffKind::Exponential, base, max: MAX_BACKOFF.max(base) }
    }

    /// Set the ceiling applied to every computed delay. Errors if `max < base`.
    pub fn with_max(self, max: Duration) -> Result<Self, PolicyError> {
        if max < self.base {
            return Err(PolicyError::MaxLessThanBase { base: self.base, max });
        }
        Ok(self.capped_at(max))
    }

    pub(crate) fn capped_at(mut self, max: Duration) -> Self {
        self.max = max;
        self
    }

    pub fn base(&self) -> Duration {
        self.base
    }

    pub fn max(&self) -> Duration {
        self.max
    }

    pub fn is_exponential(&self) -> bool {
        self.kind == BackoffKind::Exponential
    }

    /// Un-jittered delay before retry `retry_index` (0-based), clamped to the ceiling.
    pub fn delay(&self, retry_index: usize) -> Duration {
        match self.kind {
            BackoffKind::Constant => self.base.min(self.max),
            BackoffKind::Exponential => {
                let exponent = retry_index.min(u32::MAX as usize) as u32;
                let multiplier = 2u128.saturating_pow(exponent);
                let nanos = self.base.as_nanos().saturating_mul(multiplier);
                if nanos >= self.max.as_nanos() {
                    self.max
                } else {
                    // Below the ceiling, so it fits a Duration.
                    Duration::new((nanos / NANOS_PER_SEC) as u64, (nanos % NANOS_PER_SEC) as u32)
                }
            }
        }
    }
}

/// Delay to wait before retry `retry_index` under `policy`, jitter included.
///
/// Uses the thread-local generator, so it is safe to call from any number of concurrent
/// operations without shared RNG state.
pub fn compute_delay(policy: &RetryPolicy, retry_index: usize) -> Duration {
    policy.jitter().apply(policy.backoff().delay(retry_index))
}

/// Same as [`compute_delay`] with an injected random source.
pub fn compute_delay_with_rng<R: Rng>(
    policy: &RetryPolicy,
    retry_index: usize,
    rng: &mut R,
) -> Duration {
    policy.jitter().apply_with_rng(policy.backoff().delay(retry_index), rng)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn constant_backoff_returns_same_delay() {
        let backoff = Backoff::constant(Duration::from_secs(1));
        assert_eq!(backoff.delay(0), Duration::from_secs(1));
        assert_eq!(backoff.delay(1), Duration::from_secs(1));
        assert_eq!(backoff.delay(100), Duration::from_secs(1));
    }

    #[test]
    fn exponential_backoff_doubles_each_time() {
        let backoff = Backoff::exponential(Duration::from_millis(100));
        assert_eq!(backoff.delay(0), Duration::from_millis(100)); // 100 * 2^0
        assert_eq!(backoff.delay(1), Duration::from_millis(200)); // 100 * 2^1
        assert_eq!(backoff.delay(2), Duration::from_millis(400));
        assert_eq!(backoff.delay(3), Duration::from_millis(800));
        assert_eq!(backoff.delay(4), Duration::from_millis(1600));
    }

    #[test]
    fn exponential_backoff_respects_max() {
        let backoff = Backoff::exponential(Duration::from_millis(100))
            .with_max(Duration::from_secs(1))
            .unwrap();

        assert_eq!(backoff.delay(3), Duration::from_millis(800));
        assert_eq!(backoff.delay(4), Duration::from_secs(1)); // Capped
        assert_eq!(backoff.delay(10), Duration::from_secs(1)); // Still capped
    }

    #[test]
    fn constant_backoff_is_clamped_too() {
        let backoff = Backoff::constant(Duration::from_secs(5)).with_max(Duration::from_secs(5));
        assert_eq!(backoff.unwrap().delay(3), Duration::from_secs(5));
    }

    #[test]
    fn exponential_backoff_handles_overflow() {
        let backoff = Backoff::exponential(Duration::from_secs(1));
        assert_eq!(backoff.delay(1_000_000_000), MAX_BACKOFF);
        assert_eq!(backoff.delay((u32::MAX as usize) + 10_000), MAX_BACKOFF);
    }

    #[test]
    fn base_above_one_day_is_never_shortened() {
        const DAY: u64 = 24 * 60 * 60;
        let fixed = Backoff::constant(Duration::from_secs(2 * DAY));
        assert_eq!(fixed.delay(0), Duration::from_secs(2 * DAY));
        assert_eq!(fixed.delay(9), Duration::from_secs(2 * DAY));

        let exp = Backoff::exponential(Duration::from_secs(2 * DAY))
            .with_max(Duration::from_secs(10 * DAY))
            .unwrap();
        assert_eq!(exp.delay(0), Duration::from_secs(2 * DAY));
        assert_eq!(exp.delay(1), Duration::from_secs(4 * DAY));
        assert_eq!(exp.delay(2), Duration::from_secs(8 * DAY));
        assert_eq!(exp.delay(3), Duration::from_secs(10 * DAY));
        assert_eq!(exp.delay(u32::MAX as usize), Duration::from_secs(10 * DAY));
    }

    #[test]
    fn explicit_ceiling_above_one_day_is_honored() {
        let ceiling = Duration::from_secs(3 * 24 * 60 * 60);
        let exp = Backoff::exponential(Duration::from_secs(1)).with_max(ceiling).unwrap();
        assert_eq!(exp.delay(17), Duration::from_secs(131_072));
        assert_eq!(exp.delay(40), ceiling);
    }

    #[test]
    fn base_greater_than_max_is_rejected() {
        let err = Backoff::exponential(Duration::from_secs(100))
            .with_max(Duration::from_secs(50))
            .unwrap_err();
        assert!(matches!(err, PolicyError::MaxLessThanBase { .. }));
    }

    #[test]
    fn zero_base_behaves() {
        let exp = Backoff::exponential(Duration::ZERO).with_max(Duration::ZERO).unwrap();
        assert_eq!(exp.delay(3), Duration::ZERO);
    }

    #[test]
    fn computed_delay_stays_within_jitter_envelope() {
        let policy = RetryPolicy::default();
        let mut rng = StdRng::seed_from_u64(7);
        for retry in 0..8usize {
            let floor = Duration::from_millis(1000 * 2u64.pow(retry as u32))
                .min(Duration::from_millis(30_000));
            let ceiling = floor + floor / 5;
            for _ in 0..200 {
                let delay = compute_delay_with_rng(&policy, retry, &mut rng);
                assert!(delay >= floor, "retry {retry}: {delay:?} < {floor:?}");
                assert!(delay <= ceiling, "retry {retry}: {delay:?} > {ceiling:?}");
            }
        }
    }

    #[test]
    fn zero_jitter_is_deterministic() {
        let policy = RetryPolicy::builder()
            .base_delay(Duration::from_millis(100))
            .no_jitter()
            .build()
            .unwrap();
        assert_eq!(compute_delay(&policy, 0), Duration::from_millis(100));
        assert_eq!(compute_delay(&policy, 1), Duration::from_millis(200));
        assert_eq!(compute_delay(&policy, 2), Duration::from_millis(400));
    }

    #[test]
    fn fixed_policy_ignores_retry_index() {
        let policy = RetryPolicy::builder()
            .exponential(false)
            .base_delay(Duration::from_millis(250))
            .no_jitter()
            .build()
            .unwrap();
        assert_eq!(compute_delay(&policy, 0), Duration::from_millis(250));
        assert_eq!(compute_delay(&policy, 6), Duration::from_millis(250));
    }
}
