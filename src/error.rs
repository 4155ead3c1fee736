//! Error types for the retry executor
//!
//! Every call through [`RetryExecutor`](crate::RetryExecutor) ends in exactly one of: the
//! success value, [`ResilienceError::Inner`] (fatal failure, original error unchanged),
//! [`ResilienceError::RetryExhausted`], or [`ResilienceError::Cancelled`]. Callers branch on
//! [`ResilienceError::kind`] instead of inspecting error payloads.
use std::fmt;

/// Classification of a failed call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// The retry predicate rejected the failure; retrying will not help.
    Fatal,
    /// Every attempt failed with a retryable error; a later manual retry may succeed.
    Exhausted,
    /// The caller cancelled the call.
    Cancelled,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureKind::Fatal => write!(f, "fatal"),
            FailureKind::Exhausted => write!(f, "exhausted"),
            FailureKind::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// Unified error type produced by the retry executor
#[derive(Debug, Clone)]
pub enum ResilienceError<E> {
    /// The underlying operation failed with an error the predicate refused to retry.
    Inner(E),
    /// All retry attempts were exhausted; `source` is the last attempt's failure.
    RetryExhausted { operation: String, attempts: usize, source: E },
    /// The cancellation signal fired before an attempt completed or during a delay wait.
    Cancelled { operation: String, attempts: usize },
}

impl<E: fmt::Display> fmt::Display for ResilienceError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Inner(e) => write!(f, "{}", e),
            Self::RetryExhausted { operation, attempts, source } => {
                write!(
                    f,
                    "operation '{}' exhausted {} attempts; last error: {}",
                    operation, attempts, source
                )
            }
            Self::Cancelled { operation, attempts } => {
                write!(f, "operation '{}' cancelled after {} attempts", operation, attempts)
            }
        }
    }
}

impl<E: std::error::Error + 'static> std::error::Error for ResilienceError<E> {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Inner(e) => Some(e),
            Self::RetryExhausted { source, .. } => Some(source),
            Self::Cancelled { .. } => None,
        }
    }
}

impl<E> ResilienceError<E> {
    pub fn kind(&self) -> FailureKind {
        match self {
            Self::Inner(_) => FailureKind::Fatal,
            Self::RetryExhausted { .. } => FailureKind::Exhausted,
            Self::Cancelled { .. } => FailureKind::Cancelled,
        }
    }

    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Inner(_))
    }

    pub fn is_retry_exhausted(&self) -> bool {
        matches!(self, Self::RetryExhausted { .. })
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled { .. })
    }

    /// Number of attempts that ran before this error was produced, if recorded.
    pub fn attempts(&self) -> Option<usize> {
        match self {
            Self::Inner(_) => None,
            Self::RetryExhausted { attempts, .. } | Self::Cancelled { attempts, .. } => {
                Some(*attempts)
            }
        }
    }

    /// Borrow the underlying failure: the fatal error or the last exhausted attempt's error.
    pub fn last_error(&self) -> Option<&E> {
        match self {
            Self::Inner(e) | Self::RetryExhausted { source: e, .. } => Some(e),
            Self::Cancelled { .. } => None,
        }
    }

    /// Get the inner error if this is an Inner variant
    pub fn into_inner(self) -> Option<E> {
        match self {
            Self::Inner(e) => Some(e),
            _ => None,
        }
    }

    /// Consume the error, yielding the underlying failure if there is one.
    pub fn into_last_error(self) -> Option<E> {
        match self {
            Self::Inner(e) | Self::RetryExhausted { source: e, .. } => Some(e),
            Self::Cancelled { .. } => None,
        }
    }

    /// Borrow the inner error if present.
    pub fn as_inner(&self) -> Option<&E> {
        match self {
            Self::Inner(e) => Some(e),
            _ => None,
        }
    }
}
