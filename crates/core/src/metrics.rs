use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

/// In-process counters for the gateway's own observability. No cost ledger or
/// per-model dashboard breakdown — billing is someone else's concern.
#[derive(Debug)]
pub struct Metrics {
    total_requests: AtomicU64,
    total_errors: AtomicU64,
    pool_hits: AtomicU64,
    fallback_hits: AtomicU64,
    pool_exhausted: AtomicU64,
    passthrough_hits: AtomicU64,
    total_latency_ms: AtomicU64,
    created_at: Instant,
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Metrics {
    pub fn new() -> Self {
        Self {
            total_requests: AtomicU64::new(0),
            total_errors: AtomicU64::new(0),
            pool_hits: AtomicU64::new(0),
            fallback_hits: AtomicU64::new(0),
            pool_exhausted: AtomicU64::new(0),
            passthrough_hits: AtomicU64::new(0),
            total_latency_ms: AtomicU64::new(0),
            created_at: Instant::now(),
        }
    }

    pub fn record_request(&self) {
        self.total_requests.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_error(&self) {
        self.total_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_pool_hit(&self) {
        self.pool_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_fallback_hit(&self) {
        self.fallback_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_pool_exhausted(&self) {
        self.pool_exhausted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_passthrough_hit(&self) {
        self.passthrough_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_latency_ms(&self, ms: u64) {
        self.total_latency_ms.fetch_add(ms, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> serde_json::Value {
        let total_requests = self.total_requests.load(Ordering::Relaxed);
        let total_errors = self.total_errors.load(Ordering::Relaxed);
        let total_latency_ms = self.total_latency_ms.load(Ordering::Relaxed);
        let avg_latency_ms = if total_requests > 0 {
            total_latency_ms as f64 / total_requests as f64
        } else {
            0.0
        };

        serde_json::json!({
            "total_requests": total_requests,
            "total_errors": total_errors,
            "error_rate": if total_requests > 0 { total_errors as f64 / total_requests as f64 } else { 0.0 },
            "pool_hits": self.pool_hits.load(Ordering::Relaxed),
            "fallback_hits": self.fallback_hits.load(Ordering::Relaxed),
            "pool_exhausted": self.pool_exhausted.load(Ordering::Relaxed),
            "passthrough_hits": self.passthrough_hits.load(Ordering::Relaxed),
            "avg_latency_ms": avg_latency_ms,
            "uptime_seconds": self.created_at.elapsed().as_secs(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn basic_metrics_roundtrip() {
        let metrics = Metrics::new();
        metrics.record_request();
        metrics.record_request();
        metrics.record_error();
        metrics.record_latency_ms(100);
        metrics.record_latency_ms(200);

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot["total_requests"], 2);
        assert_eq!(snapshot["total_errors"], 1);
        assert_eq!(snapshot["avg_latency_ms"], 150.0);
    }
}
