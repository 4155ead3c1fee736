//! Remote file operation facade
//!
//! [`RemoteFileClient`] runs upload, download, delete and existence checks against a
//! [`RemoteStore`] under the retry executor, recording each call in the metrics registry
//! under the store's host identity (`scheme://host:port`).
//!
//! Failures are classified with [`TransportError::is_transient`] unless a custom predicate is
//! installed.

use crate::transport::TransportError;
use crate::{EndpointMetricsRegistry, ResilienceError, RetryExecutor, RetryPolicy, Sleeper};
use async_trait::async_trait;
use bytes::Bytes;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Host identity of a remote store.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RemoteEndpoint {
    pub scheme: String,
    pub host: String,
    pub port: u16,
}

impl RemoteEndpoint {
    pub fn new(scheme: impl Into<String>, host: impl Into<String>, port: u16) -> Self {
        Self { scheme: scheme.into(), host: host.into(), port }
    }

    /// Metrics key for this host.
    pub fn key(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for RemoteEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}://{}:{}", self.scheme, self.host, self.port)
    }
}

/// File operations provided by a remote-file transport (SFTP, object storage, ...).
#[async_trait]
pub trait RemoteStore: Send + Sync {
    fn endpoint(&self) -> &RemoteEndpoint;

    async fn upload(&self, path: &str, contents: Bytes) -> Result<(), TransportError>;

    async fn download(&self, path: &str) -> Result<Bytes, TransportError>;

    async fn delete(&self, path: &str) -> Result<(), TransportError>;

    async fn exists(&self, path: &str) -> Result<bool, TransportError>;
}

type Classifier = Arc<dyn Fn(&TransportError) -> bool + Send + Sync>;

/// Resilient wrapper around a [`RemoteStore`].
pub struct RemoteFileClient<S> {
    store: Arc<S>,
    registry: EndpointMetricsRegistry,
    executor: RetryExecutor,
    should_retry: Classifier,
}

impl<S> Clone for RemoteFileClient<S> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            registry: self.registry.clone(),
            executor: self.executor.clone(),
            should_retry: self.should_retry.clone(),
        }
    }
}

impl<S: RemoteStore> fmt::Debug for RemoteFileClient<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoteFileClient")
            .field("endpoint", self.store.endpoint())
            .field("executor", &self.executor)
            .finish_non_exhaustive()
    }
}

impl<S: RemoteStore> RemoteFileClient<S> {
    pub fn new(store: S, registry: EndpointMetricsRegistry, policy: RetryPolicy) -> Self {
        Self {
            store: Arc::new(store),
            registry,
            executor: RetryExecutor::new(policy),
            should_retry: Arc::new(|err: &TransportError| err.is_transient()),
        }
    }

    pub fn with_sleeper<Z: Sleeper + 'static>(mut self, sleeper: Z) -> Self {
        self.executor = self.executor.with_sleeper(sleeper);
        self
    }

    /// Replace the default transient-failure classification.
    pub fn with_retry_predicate<P>(mut self, predicate: P) -> Self
    where
        P: Fn(&TransportError) -> bool + Send + Sync + 'static,
    {
        self.should_retry = Arc::new(predicate);
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn endpoint_key(&self) -> String {
        self.store.endpoint().key()
    }

    pub async fn upload(
        &self,
        path: &str,
        contents: Bytes,
        cancel: &CancellationToken,
    ) -> Result<(), ResilienceError<TransportError>> {
        self.run("upload", path, cancel, |store, path| {
            let contents = contents.clone();
            async move { store.upload(&path, contents).await }
        })
        .await
    }

    pub async fn download(
        &self,
        path: &str,
        cancel: &CancellationToken,
    ) -> Result<Bytes, ResilienceError<TransportError>> {
        self.run("download", path, cancel, |store, path| async move { store.download(&path).await })
            .await
    }

    pub async fn delete(
        &self,
        path: &str,
        cancel: &CancellationToken,
    ) -> Result<(), ResilienceError<TransportError>> {
        self.run("delete", path, cancel, |store, path| async move { store.delete(&path).await })
            .await
    }

    pub async fn exists(
        &self,
        path: &str,
        cancel: &CancellationToken,
    ) -> Result<bool, ResilienceError<TransportError>> {
        self.run("exists", path, cancel, |store, path| async move { store.exists(&path).await })
            .await
    }

    async fn run<T, F, Fut>(
        &self,
        action: &'static str,
        path: &str,
        cancel: &CancellationToken,
        mut call: F,
    ) -> Result<T, ResilienceError<TransportError>>
    where
        T: Send,
        F: FnMut(Arc<S>, String) -> Fut + Send,
        Fut: Future<Output = Result<T, TransportError>> + Send,
    {
        let key = self.endpoint_key();
        let guard = self.registry.track(&key);
        let executor = self.executor.clone().named(format!("{action} {key}{path}"));
        let should_retry = self.should_retry.clone();

        let outcome = executor
            .execute_with(
                || call(self.store.clone(), path.to_string()),
                move |err: &TransportError| should_retry(err),
                cancel,
            )
            .await;

        guard.finish(outcome.is_ok());
        if let Err(err) = &outcome {
            tracing::debug!(
                endpoint = %key,
                action,
                path,
                kind = %err.kind(),
                "remote file call failed"
            );
        }
        outcome
    }
}
