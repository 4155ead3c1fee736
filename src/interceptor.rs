//! Ordered request/response interceptors
//!
//! An [`InterceptorPipeline`] holds interceptors in registration order. Request interceptors
//! run in that order before the first attempt; response interceptors run in the same order
//! on the final response. Any interceptor may abort the call by returning an
//! [`InterceptorError`]; later interceptors are then skipped.
//!
//! Interceptors can also vote on retry classification through
//! [`Interceptor::should_retry`]. The first interceptor that returns `Some` decides.
//!
//! ```rust
//! use lifeline::{CompressionInterceptor, InterceptorPipeline, OutboundRequest};
//!
//! # tokio::runtime::Runtime::new().unwrap().block_on(async {
//! let pipeline: InterceptorPipeline =
//!     InterceptorPipeline::new().with(CompressionInterceptor::default());
//! let request = OutboundRequest::get("http://svc/users".parse().unwrap());
//! let request = pipeline.apply_request(request).await.unwrap();
//! assert_eq!(request.headers["accept-encoding"], "gzip, deflate");
//! # });
//! ```

use crate::transport::{InboundResponse, OutboundRequest, TransportError};
use async_trait::async_trait;
use http::header::ACCEPT_ENCODING;
use http::{HeaderMap, HeaderValue, StatusCode};
use std::fmt;
use std::sync::Arc;

/// Raised by an interceptor to abort the call.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("interceptor '{interceptor}' rejected the call: {message}")]
pub struct InterceptorError {
    pub interceptor: String,
    pub message: String,
}

impl InterceptorError {
    pub fn new(interceptor: impl Into<String>, message: impl Into<String>) -> Self {
        Self { interceptor: interceptor.into(), message: message.into() }
    }
}

/// Message types whose headers interceptors may edit.
pub trait HasHeaders {
    fn headers(&self) -> &HeaderMap;
    fn headers_mut(&mut self) -> &mut HeaderMap;
}

impl HasHeaders for OutboundRequest {
    fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }
}

impl HasHeaders for InboundResponse {
    fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }
}

/// A named request/response mutator.
///
/// Both hooks default to pass-through, so an interceptor only implements the side it cares
/// about.
#[async_trait]
pub trait Interceptor<Req, Resp>: Send + Sync + fmt::Debug
where
    Req: Send + 'static,
    Resp: Send + 'static,
{
    fn name(&self) -> &str;

    async fn on_request(&self, request: Req) -> Result<Req, InterceptorError> {
        Ok(request)
    }

    async fn on_response(&self, response: Resp) -> Result<Resp, InterceptorError> {
        Ok(response)
    }

    /// Vote on whether a failed attempt should be retried. `None` abstains.
    fn should_retry(&self, _error: &TransportError) -> Option<bool> {
        None
    }
}

/// Interceptors applied in registration order.
pub struct InterceptorPipeline<Req = OutboundRequest, Resp = InboundResponse>
where
    Req: Send + 'static,
    Resp: Send + 'static,
{
    interceptors: Vec<Arc<dyn Interceptor<Req, Resp>>>,
}

impl<Req, Resp> Clone for InterceptorPipeline<Req, Resp>
where
    Req: Send + 'static,
    Resp: Send + 'static,
{
    fn clone(&self) -> Self {
        Self { interceptors: self.interceptors.clone() }
    }
}

impl<Req, Resp> Default for InterceptorPipeline<Req, Resp>
where
    Req: Send + 'static,
    Resp: Send + 'static,
{
    fn default() -> Self {
        Self { interceptors: Vec::new() }
    }
}

impl<Req, Resp> fmt::Debug for InterceptorPipeline<Req, Resp>
where
    Req: Send + 'static,
    Resp: Send + 'static,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InterceptorPipeline").field("interceptors", &self.names()).finish()
    }
}

impl<Req, Resp> InterceptorPipeline<Req, Resp>
where
    Req: Send + 'static,
    Resp: Send + 'static,
{
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an interceptor.
    pub fn with<I>(mut self, interceptor: I) -> Self
    where
        I: Interceptor<Req, Resp> + 'static,
    {
        self.interceptors.push(Arc::new(interceptor));
        self
    }

    pub fn push(&mut self, interceptor: Arc<dyn Interceptor<Req, Resp>>) {
        self.interceptors.push(interceptor);
    }

    pub fn len(&self) -> usize {
        self.interceptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.interceptors.is_empty()
    }

    /// Interceptor names in registration order.
    pub fn names(&self) -> Vec<&str> {
        self.interceptors.iter().map(|i| i.name()).collect()
    }

    pub async fn apply_request(&self, mut request: Req) -> Result<Req, InterceptorError> {
        for interceptor in &self.interceptors {
            request = interceptor.on_request(request).await.map_err(|err| {
                tracing::warn!(
                    interceptor = interceptor.name(),
                    error = %err,
                    "request interceptor failed"
                );
                err
            })?;
        }
        Ok(request)
    }

    pub async fn apply_response(&self, mut response: Resp) -> Result<Resp, InterceptorError> {
        for interceptor in &self.interceptors {
            response = interceptor.on_response(response).await.map_err(|err| {
                tracing::warn!(
                    interceptor = interceptor.name(),
                    error = %err,
                    "response interceptor failed"
                );
                err
            })?;
        }
        Ok(response)
    }

    /// First non-abstaining retry vote, in registration order.
    pub fn retry_vote(&self, error: &TransportError) -> Option<bool> {
        self.interceptors.iter().find_map(|i| i.should_retry(error))
    }
}

/// Advertises compressed response encodings unless the caller already chose some.
#[derive(Debug, Clone)]
pub struct CompressionInterceptor {
    encodings: HeaderValue,
}

impl CompressionInterceptor {
    pub fn new(encodings: HeaderValue) -> Self {
        Self { encodings }
    }
}

impl Default for CompressionInterceptor {
    fn default() -> Self {
        Self::new(HeaderValue::from_static("gzip, deflate"))
    }
}

#[async_trait]
impl<Req, Resp> Interceptor<Req, Resp> for CompressionInterceptor
where
    Req: HasHeaders + Send + 'static,
    Resp: Send + 'static,
{
    fn name(&self) -> &str {
        "compression"
    }

    async fn on_request(&self, mut request: Req) -> Result<Req, InterceptorError> {
        if !request.headers().contains_key(ACCEPT_ENCODING) {
            request.headers_mut().insert(ACCEPT_ENCODING, self.encodings.clone());
        }
        Ok(request)
    }
}

/// Retry classification driven by configuration flags.
///
/// When disabled it vetoes every retry. When enabled it retries transient failures plus any
/// extra statuses registered with [`RetryInterceptor::retry_on_status`].
#[derive(Debug, Clone)]
pub struct RetryInterceptor {
    enabled: bool,
    extra_statuses: Vec<StatusCode>,
}

impl RetryInterceptor {
    pub fn new(enabled: bool) -> Self {
        Self { enabled, extra_statuses: Vec::new() }
    }

    pub fn retry_on_status(mut self, status: StatusCode) -> Self {
        self.extra_statuses.push(status);
        self
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }
}

#[async_trait]
impl<Req, Resp> Interceptor<Req, Resp> for RetryInterceptor
where
    Req: Send + 'static,
    Resp: Send + 'static,
{
    fn name(&self) -> &str {
        "retry"
    }

    fn should_retry(&self, error: &TransportError) -> Option<bool> {
        if !self.enabled {
            return Some(false);
        }
        let extra = error.status_code().is_some_and(|s| self.extra_statuses.contains(&s));
        Some(extra || error.is_transient())
    }
}
