//! Prometheus metrics for the operator API.
//!
//! The server registers its own HTTP metrics next to the core collectors
//! (release lifecycle, agents, uploads, intake) and refreshes a few gauges
//! from the orchestrator status right before every scrape.

use once_cell::sync::Lazy;
use prometheus::{
    self, Encoder, HistogramOpts, HistogramVec, IntCounterVec, IntGauge, IntGaugeVec, Opts,
    Registry, TextEncoder,
};
use tracing::error;

/// Global metrics registry.
pub static REGISTRY: Lazy<Registry> = Lazy::new(|| {
    let registry = Registry::new();
    register_metrics(&registry);
    registry
});

// =============================================================================
// HTTP Request Metrics
// =============================================================================

/// HTTP request duration in seconds.
pub static HTTP_REQUEST_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "atus_http_request_duration_seconds",
            "HTTP request duration in seconds",
        )
        .buckets(vec![0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0]),
        &["method", "path", "status"],
    )
    .unwrap()
});

/// HTTP requests total count.
pub static HTTP_REQUESTS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("atus_http_requests_total", "Total HTTP requests"),
        &["method", "path", "status"],
    )
    .unwrap()
});

/// HTTP requests currently in flight.
pub static HTTP_REQUESTS_IN_FLIGHT: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "atus_http_requests_in_flight",
        "Number of HTTP requests currently being processed",
    )
    .unwrap()
});

// =============================================================================
// Orchestrator Metrics (collected dynamically)
// =============================================================================

/// Orchestrator running state (1 = running, 0 = stopped).
pub static ORCHESTRATOR_RUNNING: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "atus_orchestrator_running",
        "Whether the orchestrator is running (1) or stopped (0)",
    )
    .unwrap()
});

/// Stored releases by state.
pub static RELEASES_BY_STATE: Lazy<IntGaugeVec> = Lazy::new(|| {
    IntGaugeVec::new(
        Opts::new("atus_releases_by_state", "Stored release count by state"),
        &["state"],
    )
    .unwrap()
});

/// Sample jobs waiting in the queue.
pub static SAMPLE_QUEUE_DEPTH: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new("atus_sample_queue_depth", "Sample jobs waiting to be processed").unwrap()
});

/// Registered agents.
pub static AGENTS_REGISTERED: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new("atus_agents_registered", "Number of registered agents").unwrap()
});

// =============================================================================
// Registration
// =============================================================================

fn register_metrics(registry: &Registry) {
    let server: Vec<Box<dyn prometheus::core::Collector>> = vec![
        Box::new(HTTP_REQUEST_DURATION.clone()),
        Box::new(HTTP_REQUESTS_TOTAL.clone()),
        Box::new(HTTP_REQUESTS_IN_FLIGHT.clone()),
        Box::new(ORCHESTRATOR_RUNNING.clone()),
        Box::new(RELEASES_BY_STATE.clone()),
        Box::new(SAMPLE_QUEUE_DEPTH.clone()),
        Box::new(AGENTS_REGISTERED.clone()),
    ];

    // Core metrics (release lifecycle, agents, uploads, intake)
    for metric in server.into_iter().chain(atus_core::metrics::all_metrics()) {
        if let Err(e) = registry.register(metric) {
            error!("Failed to register metric: {}", e);
        }
    }
}

/// Encode all metrics as Prometheus text format.
pub fn encode_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        error!("Failed to encode metrics: {}", e);
    }
    String::from_utf8_lossy(&buffer).into_owned()
}

/// Collect dynamic metrics from current application state.
pub async fn collect_dynamic_metrics(state: &crate::state::AppState) {
    let status = state.orchestrator().status().await;
    ORCHESTRATOR_RUNNING.set(if status.running { 1 } else { 0 });
    SAMPLE_QUEUE_DEPTH.set(status.sample_queue_depth as i64);
    AGENTS_REGISTERED.set(status.agents as i64);
    for release_state in atus_core::ReleaseState::ALL {
        RELEASES_BY_STATE
            .with_label_values(&[release_state.as_str()])
            .set(status.count(release_state));
    }
}

/// Normalize a path for metric labels: ids, hashes and numbers become
/// placeholders so every release does not get its own series.
pub fn normalize_path(path: &str) -> String {
    path.split('/')
        .map(|segment| {
            if is_uuid(segment) {
                "{id}"
            } else if segment.len() == 40 && segment.chars().all(|c| c.is_ascii_hexdigit()) {
                "{hash}"
            } else if !segment.is_empty() && segment.chars().all(|c| c.is_ascii_digit()) {
                "{id}"
            } else {
                segment
            }
        })
        .collect::<Vec<_>>()
        .join("/")
}

fn is_uuid(segment: &str) -> bool {
    let groups: Vec<&str> = segment.split('-').collect();
    groups.len() == 5
        && groups
            .iter()
            .zip([8, 4, 4, 4, 12])
            .all(|(group, len)| group.len() == len && group.chars().all(|c| c.is_ascii_hexdigit()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_path_uuid() {
        let path = "/api/v1/releases/550e8400-e29b-41d4-a716-446655440000";
        assert_eq!(normalize_path(path), "/api/v1/releases/{id}");
    }

    #[test]
    fn test_normalize_path_uuid_with_action() {
        let path = "/api/v1/agents/550e8400-e29b-41d4-a716-446655440000/enable";
        assert_eq!(normalize_path(path), "/api/v1/agents/{id}/enable");
    }

    #[test]
    fn test_normalize_path_hash() {
        let path = "/api/v1/releases/a94a8fe5ccb19ba61c4c0873d391e987982fbbd3";
        assert_eq!(normalize_path(path), "/api/v1/releases/{hash}");
    }

    #[test]
    fn test_normalize_path_numeric() {
        assert_eq!(normalize_path("/api/v1/releases/12345"), "/api/v1/releases/{id}");
    }

    #[test]
    fn test_normalize_path_no_ids() {
        assert_eq!(normalize_path("/api/v1/health"), "/api/v1/health");
        // "v1" is not all digits
        assert_eq!(normalize_path("/api/v1/status"), "/api/v1/status");
    }

    #[test]
    fn test_encode_metrics_returns_prometheus_format() {
        HTTP_REQUESTS_TOTAL
            .with_label_values(&["GET", "/test", "200"])
            .inc();

        let output = encode_metrics();
        assert!(output.contains("atus_http_requests_total"));
        assert!(output.contains("# HELP"));
        assert!(output.contains("# TYPE"));
    }

    #[test]
    fn test_registry_contains_core_metrics() {
        atus_core::metrics::WORKING_SET_SIZE.set(0);
        atus_core::metrics::UPLOADS.with_label_values(&["success"]).inc();
        ORCHESTRATOR_RUNNING.set(0);
        RELEASES_BY_STATE.with_label_values(&["NEW"]).set(0);

        let output = encode_metrics();
        assert!(output.contains("atus_working_set_size"));
        assert!(output.contains("atus_uploads_total"));
        assert!(output.contains("atus_orchestrator_running"));
        assert!(output.contains("atus_releases_by_state"));
    }
}
