use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use metrics::{counter, histogram};
use once_cell::sync::OnceCell;
use serde::Serialize;
use tracing_subscriber::EnvFilter;

static TRACING_INIT: OnceCell<()> = OnceCell::new();

/// Process-wide counters. Every update is mirrored into the `metrics` facade so an
/// installed recorder sees the same numbers as `/health`.
#[derive(Debug, Default)]
pub struct AppMetrics {
    requests_total: AtomicU64,
    poi_results_total: AtomicU64,
    upstream_fallback_total: AtomicU64,
    classifier_fallback_total: AtomicU64,
    itinerary_conflicts_total: AtomicU64,
    total_latency_millis: AtomicU64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricsSnapshot {
    pub requests_total: u64,
    pub poi_results_total: u64,
    pub upstream_fallback_total: u64,
    pub classifier_fallback_total: u64,
    pub itinerary_conflicts_total: u64,
    pub avg_latency_millis: f64,
}

impl AppMetrics {
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn inc_request(&self) {
        self.requests_total.fetch_add(1, Ordering::Relaxed);
        counter!("chill_requests_total").increment(1);
    }

    pub fn add_poi_results(&self, count: usize) {
        self.poi_results_total
            .fetch_add(count as u64, Ordering::Relaxed);
        counter!("chill_poi_results_total").increment(count as u64);
    }

    /// A POI or routing upstream failed and a degraded answer was served.
    pub fn inc_upstream_fallback(&self, upstream: &'static str) {
        self.upstream_fallback_total.fetch_add(1, Ordering::Relaxed);
        counter!("chill_upstream_fallback_total", "upstream" => upstream).increment(1);
    }

    pub fn inc_classifier_fallback(&self) {
        self.classifier_fallback_total
            .fetch_add(1, Ordering::Relaxed);
        counter!("chill_classifier_fallback_total").increment(1);
    }

    pub fn inc_itinerary_conflict(&self) {
        self.itinerary_conflicts_total
            .fetch_add(1, Ordering::Relaxed);
        counter!("chill_itinerary_conflicts_total").increment(1);
    }

    pub fn observe_latency(&self, duration: Duration) {
        self.total_latency_millis
            .fetch_add(duration.as_millis() as u64, Ordering::Relaxed);
        histogram!("chill_request_latency_seconds").record(duration.as_secs_f64());
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let requests = self.requests_total.load(Ordering::Relaxed);
        let latency = self.total_latency_millis.load(Ordering::Relaxed);

        MetricsSnapshot {
            requests_total: requests,
            poi_results_total: self.poi_results_total.load(Ordering::Relaxed),
            upstream_fallback_total: self.upstream_fallback_total.load(Ordering::Relaxed),
            classifier_fallback_total: self.classifier_fallback_total.load(Ordering::Relaxed),
            itinerary_conflicts_total: self.itinerary_conflicts_total.load(Ordering::Relaxed),
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
                "{}=info,chill_api=info,chill_agents=info,chill_providers=warn,chill_nlu=warn",
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
