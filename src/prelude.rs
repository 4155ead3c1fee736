//! Convenient re-exports for common Lifeline types.
pub use crate::{
    client::{ApiResult, CallStatus, ResilientClient},
    config::RetryConfig,
    error::{FailureKind, ResilienceError},
    interceptor::{CompressionInterceptor, Interceptor, InterceptorPipeline, RetryInterceptor},
    metrics::{EndpointMetricsRegistry, EndpointStatsSnapshot},
    policy::{RetryPolicy, RetryPolicyBuilder},
    remote::{RemoteFileClient, RemoteStore},
    retry::RetryExecutor,
    transport::{InboundResponse, OutboundRequest, TransportError},
    Backoff, Jitter,
};
pub use tokio_util::sync::CancellationToken;
