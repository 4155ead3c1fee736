//! Retry executor
//!
//! Drives repeated invocation of a fallible async operation under a [`RetryPolicy`].
//!
//! Semantics:
//! - `max_attempts` counts total attempts (initial try + retries); attempts are strictly
//!   sequential.
//! - The retry predicate classifies each failure. A rejected failure is returned unchanged as
//!   [`ResilienceError::Inner`]; the default predicate retries everything.
//! - A retryable failure on the last permitted attempt becomes
//!   [`ResilienceError::RetryExhausted`], annotated with the operation name and budget.
//! - Between attempts the executor waits [`compute_delay`] through its [`Sleeper`], raced
//!   against the cancellation token.
//!
//! Invariants:
//! - Attempts never exceed `max_attempts`.
//! - The cancellation token is checked before every attempt, raced against every attempt and
//!   every delay, and checked again after every failure. An attempt that already completed
//!   wins over a simultaneous cancellation.
//! - Exactly one outcome is produced per call.
//!
//! Example
//! ```rust
//! use std::time::Duration;
//! use lifeline::{RetryExecutor, RetryPolicy, ResilienceError};
//! use tokio_util::sync::CancellationToken;
//!
//! #[derive(Debug, thiserror::Error)]
//! #[error("oops")]
//! struct MyErr;
//!
//! # tokio::runtime::Runtime::new().unwrap().block_on(async {
//! let policy = RetryPolicy::builder()
//!     .max_attempts(3)
//!     .base_delay(Duration::from_millis(1))
//!     .max_delay(Duration::from_millis(5))
//!     .build()
//!     .unwrap();
//! let executor = RetryExecutor::new(policy).named("demo");
//! let cancel = CancellationToken::new();
//! let result: Result<(), ResilienceError<MyErr>> =
//!     executor.execute(|| async { Err(MyErr) }, &cancel).await;
//! assert!(result.unwrap_err().is_retry_exhausted());
//! # });
//! ```

use crate::backoff::compute_delay;
use crate::sleeper::wait_or_cancel;
use crate::{ResilienceError, RetryPolicy, Sleeper, TokioSleeper};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// What the executor does with one failed attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryDecision<E> {
    /// Wait `Duration`, then make the next attempt.
    Retry(Duration),
    /// The predicate rejected the failure.
    Fail(E),
    /// The failure was retryable but the budget is spent.
    Exhausted(E),
}

/// Retry loop bound to a policy, an operation name, and a sleeper.
///
/// Holds no mutable state; one executor can serve any number of concurrent calls.
#[derive(Clone)]
pub struct RetryExecutor {
    policy: RetryPolicy,
    operation: Arc<str>,
    sleeper: Arc<dyn Sleeper>,
}

impl std::fmt::Debug for RetryExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetryExecutor")
            .field("policy", &self.policy)
            .field("operation", &self.operation)
            .field("sleeper", &"<sleeper>")
            .finish()
    }
}

impl RetryExecutor {
    pub fn new(policy: RetryPolicy) -> Self {
        Self { policy, operation: Arc::from("operation"), sleeper: Arc::new(TokioSleeper) }
    }

    /// Name reported in exhaustion/cancellation errors and log fields.
    pub fn named(mut self, operation: impl Into<String>) -> Self {
        self.operation = Arc::from(operation.into());
        self
    }

    /// Provide a custom sleeper implementation.
    pub fn with_sleeper<S>(mut self, sleeper: S) -> Self
    where
        S: Sleeper + 'static,
    {
        self.sleeper = Arc::new(sleeper);
        self
    }

    pub(crate) fn with_shared_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    pub fn operation(&self) -> &str {
        &self.operation
    }

    /// Classify the failure of attempt `attempt` (0-based).
    pub fn decide<E, P>(&self, attempt: usize, error: E, should_retry: &P) -> RetryDecision<E>
    where
        P: Fn(&E) -> bool + ?Sized,
    {
        if !should_retry(&error) {
            return RetryDecision::Fail(error);
        }
        if attempt + 1 >= self.policy.max_attempts() {
            return RetryDecision::Exhausted(error);
        }
        RetryDecision::Retry(compute_delay(&self.policy, attempt))
    }

    /// Execute with the default predicate, which treats every failure as retryable.
    pub async fn execute<T, E, Fut, Op>(
        &self,
        operation: Op,
        cancel: &CancellationToken,
    ) -> Result<T, ResilienceError<E>>
    where
        T: Send,
        E: Send,
        Fut: Future<Output = Result<T, E>> + Send,
        Op: FnMut() -> Fut + Send,
    {
        self.execute_with(operation, |_: &E| true, cancel).await
    }

    /// Execute an async operation with retry semantics and a custom retry predicate.
    pub async fn execute_with<T, E, Fut, Op, P>(
        &self,
        mut operation: Op,
        should_retry: P,
        cancel: &CancellationToken,
    ) -> Result<T, ResilienceError<E>>
    where
        T: Send,
        E: Send,
        Fut: Future<Output = Result<T, E>> + Send,
        Op: FnMut() -> Fut + Send,
        P: Fn(&E) -> bool + Send + Sync,
    {
        let mut attempt = 0usize;
        loop {
            if cancel.is_cancelled() {
                return Err(self.cancelled(attempt));
            }

            let outcome = tokio::select! {
                biased;
                result = operation() => Some(result),
                _ = cancel.cancelled() => None,
            };
            let error = match outcome {
                Some(Ok(value)) => return Ok(value),
                Some(Err(error)) => error,
                None => return Err(self.cancelled(attempt + 1)),
            };

            if cancel.is_cancelled() {
                return Err(self.cancelled(attempt + 1));
            }

            match self.decide(attempt, error, &should_retry) {
                RetryDecision::Fail(error) => {
                    tracing::debug!(
                        operation = %self.operation,
                        attempt = attempt + 1,
                        "failure is not retryable"
                    );
                    return Err(ResilienceError::Inner(error));
                }
                RetryDecision::Exhausted(error) => {
                    tracing::warn!(
                        operation = %self.operation,
                        attempts = self.policy.max_attempts(),
                        "retry budget exhausted"
                    );
                    return Err(ResilienceError::RetryExhausted {
                        operation: self.operation.to_string(),
                        attempts: self.policy.max_attempts(),
                        source: error,
                    });
                }
                RetryDecision::Retry(delay) => {
                    tracing::debug!(
                        operation = %self.operation,
                        attempt = attempt + 1,
                        delay = ?delay,
                        "attempt failed; retrying"
                    );
                    if !wait_or_cancel(self.sleeper.as_ref(), delay, cancel).await {
                        return Err(self.cancelled(attempt + 1));
                    }
                }
            }
            attempt += 1;
        }
    }

    fn cancelled<E>(&self, attempts: usize) -> ResilienceError<E> {
        tracing::info!(operation = %self.operation, attempts, "operation cancelled");
        ResilienceError::Cancelled { operation: self.operation.to_string(), attempts }
    }
}
