use futures::future::{ready, Ready};
use lifeline::{InboundResponse, OutboundRequest, TransportError};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};
use tower_service::Service;
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::fmt::MakeWriter;

/// Transport that replays a fixed script of outcomes and records every request it sees.
///
/// Once the script runs out it keeps answering with `fallback`.
#[derive(Clone)]
pub struct ScriptedTransport {
    script: Arc<Mutex<VecDeque<Result<InboundResponse, TransportError>>>>,
    fallback: Result<InboundResponse, TransportError>,
    seen: Arc<Mutex<Vec<OutboundRequest>>>,
}

impl ScriptedTransport {
    pub fn new(script: Vec<Result<InboundResponse, TransportError>>) -> Self {
        Self {
            script: Arc::new(Mutex::new(script.into())),
            fallback: Ok(InboundResponse::ok("")),
            seen: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Answer every call with `status`.
    pub fn always(status: http::StatusCode) -> Self {
        let mut transport = Self::new(Vec::new());
        transport.fallback = status_outcome(status);
        transport
    }

    pub fn calls(&self) -> usize {
        self.seen.lock().unwrap().len()
    }

    pub fn requests(&self) -> Vec<OutboundRequest> {
        self.seen.lock().unwrap().clone()
    }
}

impl Service<OutboundRequest> for ScriptedTransport {
    type Response = InboundResponse;
    type Error = TransportError;
    type Future = Ready<Result<InboundResponse, TransportError>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, request: OutboundRequest) -> Self::Future {
        self.seen.lock().unwrap().push(request);
        let next = self.script.lock().unwrap().pop_front();
        ready(next.unwrap_or_else(|| self.fallback.clone()))
    }
}

/// The transport answers with a response; the client decides whether the status is a failure.
pub fn status_outcome(status: http::StatusCode) -> Result<InboundResponse, TransportError> {
    Ok(InboundResponse::new(status, status.as_str().to_string()))
}

#[derive(Clone)]
pub struct SharedWriter(pub Arc<Mutex<Vec<u8>>>);

impl<'a> MakeWriter<'a> for SharedWriter {
    type Writer = SharedGuard;
    fn make_writer(&'a self) -> Self::Writer {
        SharedGuard(self.0.clone())
    }
}

pub struct SharedGuard(Arc<Mutex<Vec<u8>>>);

impl std::io::Write for SharedGuard {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }
    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

/// Install a thread-local subscriber writing into the returned buffer.
pub fn capture_logs() -> (Arc<Mutex<Vec<u8>>>, tracing::subscriber::DefaultGuard) {
    let buffer = Arc::new(Mutex::new(Vec::new()));
    let subscriber = tracing_subscriber::fmt()
        .with_writer(BoxMakeWriter::new(SharedWriter(buffer.clone())))
        .with_target(true)
        .with_max_level(tracing::Level::DEBUG)
        .without_time()
        .with_ansi(false)
        .finish();
    let guard = tracing::subscriber::set_default(subscriber);
    (buffer, guard)
}

pub fn logs(buffer: &Arc<Mutex<Vec<u8>>>) -> String {
    String::from_utf8(buffer.lock().unwrap().clone()).unwrap()
}
