//! Metrics recording implementation using Prometheus.

use prometheus::{
    register_counter_vec_with_registry, register_histogram_vec_with_registry,
    register_int_counter_with_registry, CounterVec, Encoder, HistogramVec, IntCounter, Opts,
    Registry, TextEncoder,
};
use std::sync::Arc;

/// Trait for recording client-side session metrics.
pub trait MetricsRecorder: Clone + Send + Sync + 'static {
    /// Records the terminal outcome of a gateway call.
    fn record_request(&self, method: &str, outcome: &str);

    /// Records the wall-clock duration of a gateway call, retries included.
    fn record_request_duration(&self, method: &str, duration_secs: f64);

    /// Records a call to the token-refresh endpoint.
    fn record_refresh_attempt(&self, result: &str);

    /// Records a session torn down after a failed refresh or a logout.
    fn record_session_invalidated(&self);
}

/// Prometheus metrics collector.
#[derive(Clone)]
pub struct Metrics {
    registry: Arc<Registry>,

    // Gateway metrics
    requests_total: CounterVec,
    request_duration_seconds: HistogramVec,

    // Session lifecycle metrics
    refresh_attempts_total: CounterVec,
    sessions_invalidated_total: IntCounter,
}

impl Metrics {
    /// Creates a new metrics instance with its own Prometheus registry.
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Arc::new(Registry::new());

        let requests_total = register_counter_vec_with_registry!(
            Opts::new(
                "gateway_requests_total",
                "Total number of API calls made through the gateway"
            ),
            &["method", "outcome"],
            registry.clone()
        )?;

        let request_duration_seconds = register_histogram_vec_with_registry!(
            "gateway_request_duration_seconds",
            "Gateway call duration in seconds, including refresh and replay",
            &["method"],
            vec![0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0],
            registry.clone()
        )?;

        let refresh_attempts_total = register_counter_vec_with_registry!(
            Opts::new(
                "token_refresh_attempts_total",
                "Total calls to the token-refresh endpoint"
            ),
            &["result"],
            registry.clone()
        )?;

        let sessions_invalidated_total = register_int_counter_with_registry!(
            Opts::new(
                "sessions_invalidated_total",
                "Sessions cleared by logout or by a rejected refresh token"
            ),
            registry.clone()
        )?;

        Ok(Metrics {
            registry,
            requests_total,
            request_duration_seconds,
            refresh_attempts_total,
            sessions_invalidated_total,
        })
    }

    /// Renders all metrics in Prometheus text format.
    pub fn render(&self) -> Result<String, prometheus::Error> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        Ok(String::from_utf8_lossy(&buffer).into_owned())
    }
}

impl MetricsRecorder for Metrics {
    fn record_request(&self, method: &str, outcome: &str) {
        self.requests_total
            .with_label_values(&[method, outcome])
            .inc();
    }

    fn record_request_duration(&self, method: &str, duration_secs: f64) {
        self.request_duration_seconds
            .with_label_values(&[method])
            .observe(duration_secs);
    }

    fn record_refresh_attempt(&self, result: &str) {
        self.refresh_attempts_total
            .with_label_values(&[result])
            .inc();
    }

    fn record_session_invalidated(&self) {
        self.sessions_invalidated_total.inc();
    }
}
