//! Per-endpoint request metrics.
//!
//! [`EndpointMetricsRegistry`] is an explicitly constructed, cloneable handle (clones share
//! state) that callers inject wherever calls are made. Each endpoint owns a bucket of atomic
//! counters plus the start timestamps of its in-flight requests:
//!
//! - counters and response-time sums use `fetch_add`;
//! - min/max response times use explicit compare-and-swap loops, so concurrent completions
//!   never lose an extreme;
//! - the in-flight map is per endpoint, so timing one endpoint never blocks another;
//! - the active-request count is the in-flight map's size, never a separate counter.
//!
//! Endpoint buckets and abandoned handles are never evicted. Use [`RequestGuard`] (via
//! [`EndpointMetricsRegistry::track`]) to make sure every started request is ended.
//!
//! ```rust
//! use lifeline::EndpointMetricsRegistry;
//!
//! let registry = EndpointMetricsRegistry::new();
//! let handle = registry.start_request("GET /users/{id}");
//! registry.end_request("GET /users/{id}", handle, true);
//!
//! let stats = registry.get_stats("GET /users/{id}").unwrap();
//! assert_eq!(stats.total_requests, 1);
//! assert_eq!(stats.successful_requests, 1);
//! assert_eq!(stats.active_requests, 0);
//! ```

use crate::clock::{Clock, MonotonicClock};
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};

/// Identifier of one in-flight request. Minted from a registry-wide counter and never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RequestHandle(u64);

impl RequestHandle {
    pub fn id(&self) -> u64 {
        self.0
    }
}

/// Point-in-time view of one endpoint's counters.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EndpointStatsSnapshot {
    pub endpoint: String,
    pub total_requests: u64,
    pub successful_requests: u64,
    pub failed_requests: u64,
    /// `successful / total`, `0.0` when nothing was recorded.
    pub success_rate: f64,
    /// Mean over completed requests, in milliseconds.
    pub average_response_time_ms: f64,
    pub min_response_time_ms: u64,
    pub max_response_time_ms: u64,
    pub active_requests: usize,
}

impl EndpointStatsSnapshot {
    /// Requests that finished, successfully or not.
    pub fn completed_requests(&self) -> u64 {
        self.successful_requests + self.failed_requests
    }
}

#[derive(Debug)]
struct EndpointMetrics {
    total: AtomicU64,
    successful: AtomicU64,
    failed: AtomicU64,
    total_response_ms: AtomicU64,
    // u64::MAX until the first completion
    min_response_ms: AtomicU64,
    max_response_ms: AtomicU64,
    in_flight: Mutex<HashMap<RequestHandle, u64>>,
}

impl EndpointMetrics {
    fn new() -> Self {
        Self {
            total: AtomicU64::new(0),
            successful: AtomicU64::new(0),
            failed: AtomicU64::new(0),
            total_response_ms: AtomicU64::new(0),
            min_response_ms: AtomicU64::new(u64::MAX),
            max_response_ms: AtomicU64::new(0),
            in_flight: Mutex::new(HashMap::new()),
        }
    }

    fn begin(&self, handle: RequestHandle, started_at: u64) {
        self.total.fetch_add(1, Ordering::AcqRel);
        self.in_flight.lock().unwrap_or_else(PoisonError::into_inner).insert(handle, started_at);
    }

    fn finish(&self, handle: RequestHandle) -> Option<u64> {
        self.in_flight.lock().unwrap_or_else(PoisonError::into_inner).remove(&handle)
    }

    /// Outcome counters are bumped last so a reader that sees the outcome also sees the timing.
    fn record_completion(&self, elapsed_ms: u64, success: bool) {
        self.total_response_ms.fetch_add(elapsed_ms, Ordering::AcqRel);
        update_min(&self.min_response_ms, elapsed_ms);
        update_max(&self.max_response_ms, elapsed_ms);
        if success {
            self.successful.fetch_add(1, Ordering::AcqRel);
        } else {
            self.failed.fetch_add(1, Ordering::AcqRel);
        }
    }

    fn snapshot(&self, endpoint: &str) -> EndpointStatsSnapshot {
        // Outcomes before total: every counted outcome's start is then visible in `total`.
        let successful = self.successful.load(Ordering::Acquire);
        let failed = self.failed.load(Ordering::Acquire);
        let total = self.total.load(Ordering::Acquire).max(successful + failed);
        let total_ms = self.total_response_ms.load(Ordering::Acquire);
        let min_raw = self.min_response_ms.load(Ordering::Acquire);
        let max = self.max_response_ms.load(Ordering::Acquire);
        let active = self.in_flight.lock().unwrap_or_else(PoisonError::into_inner).len();

        let completed = successful + failed;
        let (min, max, average) = if completed == 0 || min_raw == u64::MAX {
            (0, max, 0.0)
        } else {
            // A completion racing this read may be half-folded; keep min <= avg <= max.
            let max = max.max(min_raw);
            let average = (total_ms as f64 / completed as f64).clamp(min_raw as f64, max as f64);
            (min_raw, max, average)
        };
        let success_rate = if total == 0 { 0.0 } else { successful as f64 / total as f64 };

        EndpointStatsSnapshot {
            endpoint: endpoint.to_string(),
            total_requests: total,
            successful_requests: successful,
            failed_requests: failed,
            success_rate,
            average_response_time_ms: average,
            min_response_time_ms: min,
            max_response_time_ms: max,
            active_requests: active,
        }
    }
}

fn update_min(slot: &AtomicU64, candidate: u64) {
    let mut current = slot.load(Ordering::Acquire);
    while candidate < current {
        match slot.compare_exchange_weak(current, candidate, Ordering::AcqRel, Ordering::Acquire)
        {
            Ok(_) => break,
            Err(actual) => current = actual,
        }
    }
}

fn update_max(slot: &AtomicU64, candidate: u64) {
    let mut current = slot.load(Ordering::Acquire);
    while candidate > current {
        match slot.compare_exchange_weak(current, candidate, Ordering::AcqRel, Ordering::Acquire)
        {
            Ok(_) => break,
            Err(actual) => current = actual,
        }
    }
}

#[derive(Debug)]
struct RegistryInner {
    endpoints: RwLock<HashMap<String, Arc<EndpointMetrics>>>,
    next_handle: AtomicU64,
    clock: Arc<dyn Clock>,
}

/// Concurrency-safe collection of per-endpoint counters and timing statistics.
#[derive(Debug, Clone)]
pub struct EndpointMetricsRegistry {
    inner: Arc<RegistryInner>,
}

impl Default for EndpointMetricsRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl EndpointMetricsRegistry {
    pub fn new() -> Self {
        Self::with_clock(MonotonicClock::default())
    }

    /// Override the clock used to time requests (useful for deterministic tests).
    pub fn with_clock<C: Clock + 'static>(clock: C) -> Self {
        Self {
            inner: Arc::new(RegistryInner {
                endpoints: RwLock::new(HashMap::new()),
                next_handle: AtomicU64::new(1),
                clock: Arc::new(clock),
            }),
        }
    }

    fn bucket(&self, endpoint: &str) -> Option<Arc<EndpointMetrics>> {
        let map = self.inner.endpoints.read().unwrap_or_else(PoisonError::into_inner);
        map.get(endpoint).cloned()
    }

    fn bucket_or_create(&self, endpoint: &str) -> Arc<EndpointMetrics> {
        if let Some(bucket) = self.bucket(endpoint) {
            return bucket;
        }
        let mut map = self.inner.endpoints.write().unwrap_or_else(PoisonError::into_inner);
        map.entry(endpoint.to_string())
            .or_insert_with(|| {
                tracing::debug!(target: "lifeline::metrics", endpoint, "tracking new endpoint");
                Arc::new(EndpointMetrics::new())
            })
            .clone()
    }

    /// Count a new request against `endpoint` and start timing it.
    pub fn start_request(&self, endpoint: &str) -> RequestHandle {
        let bucket = self.bucket_or_create(endpoint);
        let handle = RequestHandle(self.inner.next_handle.fetch_add(1, Ordering::Relaxed));
        bucket.begin(handle, self.inner.clock.now_millis());
        handle
    }

    /// Finish a request started with [`start_request`](Self::start_request).
    ///
    /// Unknown or already-ended handles are ignored.
    pub fn end_request(&self, endpoint: &str, handle: RequestHandle, success: bool) {
        let Some(bucket) = self.bucket(endpoint) else {
            return;
        };
        let Some(started_at) = bucket.finish(handle) else {
            return;
        };
        let elapsed_ms = self.inner.clock.now_millis().saturating_sub(started_at);
        bucket.record_completion(elapsed_ms, success);
    }

    /// Start a request whose end is guaranteed: dropping the guard ends it as a failure.
    pub fn track(&self, endpoint: &str) -> RequestGuard {
        let handle = self.start_request(endpoint);
        RequestGuard {
            registry: self.clone(),
            endpoint: endpoint.to_string(),
            handle: Some(handle),
        }
    }

    /// Snapshot one endpoint, or `None` if it was never observed.
    pub fn get_stats(&self, endpoint: &str) -> Option<EndpointStatsSnapshot> {
        self.bucket(endpoint).map(|bucket| bucket.snapshot(endpoint))
    }

    /// Snapshot every known endpoint.
    pub fn get_all_stats(&self) -> BTreeMap<String, EndpointStatsSnapshot> {
        let buckets: Vec<(String, Arc<EndpointMetrics>)> = {
            let map = self.inner.endpoints.read().unwrap_or_else(PoisonError::into_inner);
            map.iter().map(|(k, v)| (k.clone(), v.clone())).collect()
        };
        buckets.into_iter().map(|(k, v)| (k.clone(), v.snapshot(&k))).collect()
    }

    /// Known endpoint keys, sorted.
    pub fn endpoints(&self) -> Vec<String> {
        let map = self.inner.endpoints.read().unwrap_or_else(PoisonError::into_inner);
        let mut keys: Vec<String> = map.keys().cloned().collect();
        keys.sort();
        keys
    }

    /// Drop all endpoint state. Meant for test isolation.
    pub fn reset(&self) {
        self.inner.endpoints.write().unwrap_or_else(PoisonError::into_inner).clear();
    }
}

/// Scoped request: ends the request exactly once, on [`finish`](Self::finish) or on drop.
#[derive(Debug)]
#[must_use = "dropping the guard immediately ends the request as failed"]
pub struct RequestGuard {
    registry: EndpointMetricsRegistry,
    endpoint: String,
    handle: Option<RequestHandle>,
}

impl RequestGuard {
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn handle(&self) -> Option<RequestHandle> {
        self.handle
    }

    /// End the request with an explicit outcome.
    pub fn finish(mut self, success: bool) {
        self.end(success);
    }

    fn end(&mut self, success: bool) {
        if let Some(handle) = self.handle.take() {
            self.registry.end_request(&self.endpoint, handle, success);
        }
    }
}

impl Drop for RequestGuard {
    fn drop(&mut self) {
        self.end(false);
    }
}
