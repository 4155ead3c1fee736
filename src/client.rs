//! HTTP-style operation facade
//!
//! [`ResilientClient::execute_with_resilience`] wires the other components around a single
//! logical call:
//!
//! 1. open a metrics scope for the endpoint,
//! 2. run request interceptors in registration order,
//! 3. invoke the transport under the retry executor,
//! 4. run response interceptors in registration order on the final response,
//! 5. close the metrics scope with the outcome and fold everything into an [`ApiResult`].
//!
//! The metrics scope is a [`RequestGuard`](crate::RequestGuard), so it is closed exactly once
//! even if the returned future is dropped mid-call.

use crate::error::FailureKind;
use crate::interceptor::{Interceptor, InterceptorError, InterceptorPipeline};
use crate::transport::{InboundResponse, OutboundRequest, TransportError};
use crate::{
    EndpointMetricsRegistry, ResilienceError, RetryExecutor, RetryPolicy, Sleeper, TokioSleeper,
};
use serde::Serialize;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tower::ServiceExt;
use tower_service::Service;

/// Caller-supplied retry classification for transport failures.
pub type RetryPredicate<'a> = &'a (dyn Fn(&TransportError) -> bool + Send + Sync);

/// How a facade call ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CallStatus {
    Success,
    /// Rejected by the retry predicate or by an interceptor.
    Fatal,
    Exhausted,
    Cancelled,
}

impl From<FailureKind> for CallStatus {
    fn from(kind: FailureKind) -> Self {
        match kind {
            FailureKind::Fatal => CallStatus::Fatal,
            FailureKind::Exhausted => CallStatus::Exhausted,
            FailureKind::Cancelled => CallStatus::Cancelled,
        }
    }
}

/// Failure detail carried by an [`ApiResult`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ApiError {
    pub code: String,
    pub message: String,
}

/// Uniform outcome of a facade call. Never an `Err`: every failure is folded in here.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiResult<T> {
    pub success: bool,
    pub status: CallStatus,
    /// HTTP status of the final response, when one was received.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_code: Option<u16>,
    /// The payload on success. On failure, the last error response after response
    /// interceptors, when one was received.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ApiError>,
}

impl<T> ApiResult<T> {
    pub fn ok(data: T, status_code: Option<u16>) -> Self {
        Self {
            success: true,
            status: CallStatus::Success,
            status_code,
            data: Some(data),
            error: None,
        }
    }

    pub fn failure(status: CallStatus, error: ApiError, status_code: Option<u16>) -> Self {
        Self { success: false, status, status_code, data: None, error: Some(error) }
    }

    pub fn from_resilience_error(err: &ResilienceError<TransportError>) -> Self {
        let code = match err {
            ResilienceError::Inner(inner) => inner.code(),
            ResilienceError::RetryExhausted { .. } => "RETRY_EXHAUSTED".to_string(),
            ResilienceError::Cancelled { .. } => "CANCELLED".to_string(),
        };
        let status_code = err.last_error().and_then(|e| e.status_code()).map(|s| s.as_u16());
        Self::failure(err.kind().into(), ApiError { code, message: err.to_string() }, status_code)
    }

    pub fn from_interceptor_error(err: &InterceptorError, status_code: Option<u16>) -> Self {
        Self::failure(
            CallStatus::Fatal,
            ApiError { code: "INTERCEPTOR_REJECTED".to_string(), message: err.to_string() },
            status_code,
        )
    }

    /// Transform the payload, keeping the classification.
    pub fn map<U, F: FnOnce(T) -> U>(self, f: F) -> ApiResult<U> {
        ApiResult {
            success: self.success,
            status: self.status,
            status_code: self.status_code,
            data: self.data.map(f),
            error: self.error,
        }
    }

    pub fn into_result(self) -> Result<T, ApiError> {
        match (self.data, self.error) {
            (Some(data), None) => Ok(data),
            (_, Some(error)) => Err(error),
            (None, None) => Err(ApiError {
                code: "EMPTY_RESULT".to_string(),
                message: "call produced neither data nor error".to_string(),
            }),
        }
    }
}

/// HTTP facade combining retry, interceptors and per-endpoint metrics.
#[derive(Debug, Clone)]
pub struct ResilientClient {
    registry: EndpointMetricsRegistry,
    pipeline: InterceptorPipeline,
    sleeper: Arc<dyn Sleeper>,
}

impl ResilientClient {
    pub fn new(registry: EndpointMetricsRegistry) -> Self {
        Self { registry, pipeline: InterceptorPipeline::new(), sleeper: Arc::new(TokioSleeper) }
    }

    /// Append an interceptor to the pipeline.
    pub fn with_interceptor<I>(mut self, interceptor: I) -> Self
    where
        I: Interceptor<OutboundRequest, InboundResponse> + 'static,
    {
        self.pipeline = self.pipeline.with(interceptor);
        self
    }

    pub fn with_pipeline(mut self, pipeline: InterceptorPipeline) -> Self {
        self.pipeline = pipeline;
        self
    }

    pub fn with_sleeper<S: Sleeper + 'static>(mut self, sleeper: S) -> Self {
        self.sleeper = Arc::new(sleeper);
        self
    }

    pub fn registry(&self) -> &EndpointMetricsRegistry {
        &self.registry
    }

    pub fn pipeline(&self) -> &InterceptorPipeline {
        &self.pipeline
    }

    /// Run one logical call against `endpoint`.
    ///
    /// `transport` is cloned for every attempt and driven with `oneshot`. A non-2xx response
    /// becomes [`TransportError::Status`].
    ///
    /// Retry classification: an interceptor voting `Some(false)` vetoes the retry outright, so
    /// a disabled [`RetryInterceptor`](crate::RetryInterceptor) is a master off switch. Otherwise
    /// `retry_predicate` decides when given, then the first interceptor vote, then
    /// [`TransportError::is_transient`].
    ///
    /// On failure the status stays the retry outcome (fatal, exhausted or cancelled). When the
    /// last attempt produced an error response, response interceptors run on it and the result
    /// is carried in `data`; an interceptor rejection is appended to the error message.
    pub async fn execute_with_resilience<B, S>(
        &self,
        endpoint: &str,
        policy: &RetryPolicy,
        request_builder: B,
        transport: S,
        retry_predicate: Option<RetryPredicate<'_>>,
        cancel: &CancellationToken,
    ) -> ApiResult<InboundResponse>
    where
        B: FnOnce() -> OutboundRequest,
        S: Service<OutboundRequest, Response = InboundResponse, Error = TransportError>
            + Clone
            + Send,
        S::Future: Send,
    {
        let guard = self.registry.track(endpoint);

        let request = match self.pipeline.apply_request(request_builder()).await {
            Ok(request) => request,
            Err(err) => {
                guard.finish(false);
                return ApiResult::from_interceptor_error(&err, None);
            }
        };

        let executor = RetryExecutor::new(policy.clone())
            .named(format!("{} {}", request.method, endpoint))
            .with_shared_sleeper(self.sleeper.clone());
        let pipeline = &self.pipeline;
        let should_retry = |err: &TransportError| {
            let vote = pipeline.retry_vote(err);
            if vote == Some(false) {
                return false;
            }
            match retry_predicate {
                Some(predicate) => predicate(err),
                None => vote.unwrap_or_else(|| err.is_transient()),
            }
        };
        let attempt = move || {
            let service = transport.clone();
            let request = request.clone();
            async move {
                match service.oneshot(request).await {
                    Ok(response) if response.is_success() => Ok(response),
                    Ok(response) => Err(TransportError::status(response)),
                    Err(err) => Err(err),
                }
            }
        };

        let outcome = executor.execute_with(attempt, should_retry, cancel).await;
        let success = outcome.is_ok();

        let result = match outcome {
            Ok(response) => {
                let status_code = Some(response.status.as_u16());
                match self.pipeline.apply_response(response).await {
                    Ok(response) => ApiResult::ok(response, status_code),
                    Err(err) => ApiResult::from_interceptor_error(&err, status_code),
                }
            }
            Err(err) => {
                let mut result = ApiResult::from_resilience_error(&err);
                let last_response = err.into_last_error().and_then(|e| match e {
                    TransportError::Status(response) => Some(*response),
                    _ => None,
                });
                if let Some(response) = last_response {
                    // The failure classification stands; interceptors only shape the detail.
                    match self.pipeline.apply_response(response).await {
                        Ok(response) => result.data = Some(response),
                        Err(rejected) => {
                            if let Some(error) = result.error.as_mut() {
                                error.message = format!("{}; {}", error.message, rejected);
                            }
                        }
                    }
                }
                result
            }
        };

        guard.finish(success);
        tracing::debug!(
            endpoint,
            status = ?result.status,
            status_code = ?result.status_code,
            "resilient call finished"
        );
        result
    }

    /// [`execute_with_resilience`](Self::execute_with_resilience) with an already built
    /// request and default retry classification.
    pub async fn send<S>(
        &self,
        endpoint: &str,
        policy: &RetryPolicy,
        request: OutboundRequest,
        transport: S,
        cancel: &CancellationToken,
    ) -> ApiResult<InboundResponse>
    where
        S: Service<OutboundRequest, Response = InboundResponse, Error = TransportError>
            + Clone
            + Send,
        S::Future: Send,
    {
        self.execute_with_resilience(endpoint, policy, move || request, transport, None, cancel)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn api_result_serializes_camel_case() {
        let ok = ApiResult::ok("payload", Some(200));
        let json = serde_json::to_value(&ok).unwrap();
        assert_eq!(json["success"], true);
        assert_eq!(json["status"], "success");
        assert_eq!(json["statusCode"], 200);
        assert_eq!(json["data"], "payload");
        assert!(json.get("error").is_none());
    }

    #[test]
    fn resilience_errors_map_to_codes() {
        let exhausted: ResilienceError<TransportError> = ResilienceError::RetryExhausted {
            operation: "GET users".into(),
            attempts: 3,
            source: TransportError::status(InboundResponse::new(
                http::StatusCode::SERVICE_UNAVAILABLE,
                "",
            )),
        };
        let result: ApiResult<()> = ApiResult::from_resilience_error(&exhausted);
        assert!(!result.success);
        assert_eq!(result.status, CallStatus::Exhausted);
        assert_eq!(result.status_code, Some(503));
        assert_eq!(result.error.as_ref().unwrap().code, "RETRY_EXHAUSTED");

        let fatal = ResilienceError::Inner(TransportError::Timeout(Duration::from_secs(1)));
        let result: ApiResult<()> = ApiResult::from_resilience_error(&fatal);
        assert_eq!(result.status, CallStatus::Fatal);
        assert_eq!(result.status_code, None);
        assert_eq!(result.error.unwrap().code, "TIMEOUT");

        let cancelled: ResilienceError<TransportError> =
            ResilienceError::Cancelled { operation: "op".into(), attempts: 1 };
        let result: ApiResult<()> = ApiResult::from_resilience_error(&cancelled);
        assert_eq!(result.status, CallStatus::Cancelled);
        assert_eq!(result.into_result().unwrap_err().code, "CANCELLED");
    }

    #[test]
    fn map_keeps_classification() {
        let result = ApiResult::ok(InboundResponse::ok("42"), Some(200))
            .map(|r| String::from_utf8_lossy(&r.body).into_owned());
        assert_eq!(result.status, CallStatus::Success);
        assert_eq!(result.into_result().unwrap(), "42");
    }
}
