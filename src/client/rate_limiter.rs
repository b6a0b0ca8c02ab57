//! Request pacing for the SPARQL endpoint.
//!
//! Wikidata throttles aggressively and answers bursts with 429s. Concurrency is
//! bounded by the fetcher's semaphore; this limiter additionally spaces out the
//! start of consecutive requests to the same endpoint and keeps the counts that
//! end up in the run summary. It never retries anything itself.

use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Pacing state for a single endpoint.
#[derive(Debug, Default)]
pub struct EndpointState {
    /// Earliest start time for the next request
    pub next_slot: Option<Instant>,
    /// Requests answered by this endpoint
    pub requests: u64,
    /// 429 responses from this endpoint
    pub rate_limited: u64,
    /// Status of the most recent response
    pub last_status: Option<u16>,
}

impl EndpointState {
    /// Reserve the next start slot and return how long to wait for it.
    fn reserve(&mut self, min_interval: Duration) -> Duration {
        let now = Instant::now();
        let slot = self.next_slot.filter(|&t| t > now).unwrap_or(now);
        self.next_slot = Some(slot + min_interval);
        slot - now
    }
}

/// Shared request pacer, keyed by endpoint URL.
#[derive(Debug)]
pub struct RateLimiter {
    min_interval: Duration,
    states: DashMap<String, EndpointState>,
    total_requests: AtomicU64,
    total_429s: AtomicU64,
    total_wait_ms: AtomicU64,
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(Duration::from_millis(10))
    }
}

impl RateLimiter {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            states: DashMap::new(),
            total_requests: AtomicU64::new(0),
            total_429s: AtomicU64::new(0),
            total_wait_ms: AtomicU64::new(0),
        }
    }

    /// Wait until this caller may start a request to `endpoint`.
    ///
    /// Returns the duration waited.
    pub async fn wait_turn(&self, endpoint: &str) -> Duration {
        let wait_time = {
            let mut state = self.states.entry(endpoint.to_string()).or_default();
            state.reserve(self.min_interval)
        };

        if wait_time > Duration::ZERO {
            debug!(
                endpoint = endpoint,
                wait_ms = wait_time.as_millis(),
                "Pacing request"
            );
            self.total_wait_ms
                .fetch_add(wait_time.as_millis() as u64, Ordering::Relaxed);
            tokio::time::sleep(wait_time).await;
        }

        wait_time
    }

    /// Record the status of a completed request.
    pub fn record_response(&self, endpoint: &str, status: u16) {
        self.total_requests.fetch_add(1, Ordering::Relaxed);

        let mut state = self.states.entry(endpoint.to_string()).or_default();
        state.requests += 1;
        state.last_status = Some(status);

        if status == 429 {
            self.total_429s.fetch_add(1, Ordering::Relaxed);
            state.rate_limited += 1;
            warn!(
                endpoint = endpoint,
                rate_limited = state.rate_limited,
                "Endpoint is rate limiting requests (429)"
            );
        }
    }

    pub fn stats(&self) -> RateLimiterStats {
        let total_requests = self.total_requests.load(Ordering::Relaxed);
        let total_429s = self.total_429s.load(Ordering::Relaxed);
        let total_wait_ms = self.total_wait_ms.load(Ordering::Relaxed);

        RateLimiterStats {
            total_requests,
            total_429s,
            total_wait_secs: total_wait_ms as f64 / 1000.0,
            endpoints_tracked: self.states.len(),
        }
    }
}

/// Rate limiter statistics.
#[derive(Debug, Clone)]
pub struct RateLimiterStats {
    pub total_requests: u64,
    pub total_429s: u64,
    pub total_wait_secs: f64,
    pub endpoints_tracked: usize,
}
