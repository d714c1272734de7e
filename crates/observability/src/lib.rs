use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use once_cell::sync::OnceCell;
use serde::Serialize;
use tracing_subscriber::EnvFilter;

static TRACING_INIT: OnceCell<()> = OnceCell::new();

#[derive(Debug, Default)]
pub struct AppMetrics {
    requests_total: AtomicU64,
    candidates_returned_total: AtomicU64,
    degraded_rankings_total: AtomicU64,
    source_failures_total: AtomicU64,
    narrative_fallbacks_total: AtomicU64,
    request_errors_total: AtomicU64,
    total_latency_millis: AtomicU64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricsSnapshot {
    pub requests_total: u64,
    pub candidates_returned_total: u64,
    pub degraded_rankings_total: u64,
    pub source_failures_total: u64,
    pub narrative_fallbacks_total: u64,
    pub request_errors_total: u64,
    pub avg_latency_millis: f64,
}

impl AppMetrics {
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn inc_request(&self) {
        self.requests_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add_candidates(&self, returned: usize) {
        self.candidates_returned_total
            .fetch_add(returned as u64, Ordering::Relaxed);
    }

    /// A ranking served with fewer sources than requested; `failed` counts
    /// the sources that dropped out.
    pub fn record_degraded(&self, failed: usize) {
        self.degraded_rankings_total.fetch_add(1, Ordering::Relaxed);
        self.source_failures_total
            .fetch_add(failed as u64, Ordering::Relaxed);
    }

    pub fn inc_narrative_fallback(&self) {
        self.narrative_fallbacks_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_request_error(&self) {
        self.request_errors_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn observe_latency(&self, duration: Duration) {
        self.total_latency_millis
            .fetch_add(duration.as_millis() as u64, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let requests = self.requests_total.load(Ordering::Relaxed);
        let latency = self.total_latency_millis.load(Ordering::Relaxed);

        MetricsSnapshot {
            requests_total: requests,
            candidates_returned_total: self.candidates_returned_total.load(Ordering::Relaxed),
            degraded_rankings_total: self.degraded_rankings_total.load(Ordering::Relaxed),
            source_failures_total: self.source_failures_total.load(Ordering::Relaxed),
            narrative_fallbacks_total: self.narrative_fallbacks_total.load(Ordering::Relaxed),
            request_errors_total: self.request_errors_total.load(Ordering::Relaxed),
            avg_latency_millis: if requests == 0 {
                0.0
            } else {
                latency as f64 / requests as f64
            },
        }
    }
}

pub fn init_tracing(service_name: &str) {
    TRACING_INIT.get_or_init(|| {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!(
                "{}=info,wayfinder_api=info,wayfinder_agents=info,wayfinder_core=info",
                service_name
            ))
        });

        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_current_span(true)
            .with_span_list(true)
            .init();
    });
}
