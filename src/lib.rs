#![forbid(unsafe_code)]
#![cfg_attr(not(test), deny(clippy::all))]

//! # Lifeline
//!
//! Execution core for calls to unreliable remote services: bounded retries with backoff and
//! jitter, cooperative cancellation, ordered request/response interceptors and per-endpoint
//! metrics.
//!
//! ## Features
//!
//! - **Backoff calculator** with fixed or exponential curves, a ceiling and proportional jitter
//! - **Retry executor** with a pluggable retry predicate and cancellation at every await point
//! - **Endpoint metrics registry** built on atomics, safe under heavy concurrency
//! - **Interceptor pipeline** applied in registration order on both requests and responses
//! - **Operation facades** for HTTP-style calls and remote file operations
//!
//! ## Quick Start
//!
//! ```rust
//! use lifeline::{RetryExecutor, RetryPolicy, ResilienceError};
//! use std::time::Duration;
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() {
//!     let policy = RetryPolicy::builder()
//!         .max_attempts(3)
//!         .base_delay(Duration::from_millis(10))
//!         .max_delay(Duration::from_millis(100))
//!         .build()
//!         .unwrap();
//!
//!     let cancel = CancellationToken::new();
//!     let result = RetryExecutor::new(policy)
//!         .named("fetch-profile")
//!         .execute(|| async { Ok::<_, std::io::Error>("profile") }, &cancel)
//!         .await;
//!     assert_eq!(result.unwrap(), "profile");
//! }
//! ```

pub mod backoff;
pub mod client;
pub mod clock;
pub mod config;
pub mod error;
pub mod interceptor;
pub mod jitter;
pub mod metrics;
pub mod policy;
pub mod prelude;
pub mod remote;
pub mod retry;
pub mod sleeper;
pub mod transport;

// Re-exports
pub use backoff::{compute_delay, compute_delay_with_rng, Backoff, MAX_BACKOFF};
pub use client::{ApiError, ApiResult, CallStatus, ResilientClient, RetryPredicate};
pub use clock::{Clock, ManualClock, MonotonicClock};
pub use config::{ConfigError, RetryConfig};
pub use error::{FailureKind, ResilienceError};
pub use interceptor::{
    CompressionInterceptor, HasHeaders, Interceptor, InterceptorError, InterceptorPipeline,
    RetryInterceptor,
};
pub use jitter::Jitter;
pub use metrics::{EndpointMetricsRegistry, EndpointStatsSnapshot, RequestGuard, RequestHandle};
pub use policy::{PolicyError, RetryPolicy, RetryPolicyBuilder};
pub use remote::{RemoteEndpoint, RemoteFileClient, RemoteStore};
pub use retry::{RetryDecision, RetryExecutor};
pub use sleeper::{wait_or_cancel, InstantSleeper, Sleeper, TokioSleeper, TrackingSleeper};
pub use transport::{InboundResponse, OutboundRequest, TransportError, TRANSIENT_STATUSES};
