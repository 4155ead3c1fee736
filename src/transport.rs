//! Message and failure types at the transport boundary.
//!
//! The core never performs I/O itself. HTTP-style callers hand the facade a
//! `tower::Service<OutboundRequest, Response = InboundResponse, Error = TransportError>`;
//! remote-file callers implement [`RemoteStore`](crate::RemoteStore). Both report failures as
//! [`TransportError`], whose [`is_transient`](TransportError::is_transient) is the default
//! retry classification.

use bytes::Bytes;
use http::{HeaderMap, HeaderName, HeaderValue, Method, StatusCode, Uri};
use std::time::Duration;

/// Statuses treated as transient by default.
pub const TRANSIENT_STATUSES: [StatusCode; 6] = [
    StatusCode::REQUEST_TIMEOUT,
    StatusCode::TOO_MANY_REQUESTS,
    StatusCode::INTERNAL_SERVER_ERROR,
    StatusCode::BAD_GATEWAY,
    StatusCode::SERVICE_UNAVAILABLE,
    StatusCode::GATEWAY_TIMEOUT,
];

/// Failure reported by a transport.
#[derive(Debug, Clone, thiserror::Error)]
pub enum TransportError {
    #[error("request timed out after {0:?}")]
    Timeout(Duration),
    #[error("connection failed: {0}")]
    Connection(String),
    /// The remote answered with a non-success status; the full response is kept.
    #[error("remote returned status {}", .0.status)]
    Status(Box<InboundResponse>),
    #[error("protocol error: {0}")]
    Protocol(String),
}

impl TransportError {
    /// Wrap a non-success response.
    pub fn status(response: InboundResponse) -> Self {
        Self::Status(Box::new(response))
    }

    /// Timeouts, connection failures and the statuses in [`TRANSIENT_STATUSES`].
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Timeout(_) | Self::Connection(_) => true,
            Self::Status(response) => TRANSIENT_STATUSES.contains(&response.status),
            Self::Protocol(_) => false,
        }
    }

    pub fn status_code(&self) -> Option<StatusCode> {
        self.response().map(|r| r.status)
    }

    pub fn response(&self) -> Option<&InboundResponse> {
        match self {
            Self::Status(response) => Some(response),
            _ => None,
        }
    }

    /// Stable machine-readable code.
    pub fn code(&self) -> String {
        match self {
            Self::Timeout(_) => "TIMEOUT".to_string(),
            Self::Connection(_) => "CONNECTION_FAILED".to_string(),
            Self::Status(response) => format!("HTTP_{}", response.status.as_u16()),
            Self::Protocol(_) => "PROTOCOL_ERROR".to_string(),
        }
    }
}

/// Outgoing request as seen by interceptors and the transport.
#[derive(Debug, Clone)]
pub struct OutboundRequest {
    pub method: Method,
    pub uri: Uri,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl OutboundRequest {
    pub fn new(method: Method, uri: Uri) -> Self {
        Self { method, uri, headers: HeaderMap::new(), body: Bytes::new() }
    }

    pub fn get(uri: Uri) -> Self {
        Self::new(Method::GET, uri)
    }

    pub fn post(uri: Uri, body: impl Into<Bytes>) -> Self {
        Self::new(Method::POST, uri).with_body(body)
    }

    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }
}

/// Response produced by the transport.
#[derive(Debug, Clone)]
pub struct InboundResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl InboundResponse {
    pub fn new(status: StatusCode, body: impl Into<Bytes>) -> Self {
        Self { status, headers: HeaderMap::new(), body: body.into() }
    }

    pub fn ok(body: impl Into<Bytes>) -> Self {
        Self::new(StatusCode::OK, body)
    }

    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }
}
