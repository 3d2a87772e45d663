//! Prometheus metrics for the gateway.
//!
//! HTTP traffic is recorded per route template by [`metrics_middleware`];
//! acknowledgement handlers add per-operation outcomes and latency through
//! [`record_ack_operation`].

use std::sync::OnceLock;
use std::time::{Duration, Instant};

use axum::extract::{MatchedPath, Request};
use axum::http::StatusCode;
use axum::http::header::CONTENT_TYPE;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use metrics::{Unit, counter, describe_counter, describe_histogram, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

// ============================================================================
// Metric Names
// ============================================================================

/// HTTP request counter, labelled by route, method and status code.
pub const HTTP_REQUESTS_TOTAL: &str = "ackgate_http_requests_total";

/// HTTP request latency histogram, labelled by route and method.
pub const HTTP_REQUEST_DURATION: &str = "ackgate_http_request_duration_seconds";

/// Acknowledgement operation counter, labelled by operation and outcome.
pub const ACK_OPERATIONS_TOTAL: &str = "ackgate_ack_operations_total";

/// Acknowledgement operation latency histogram, labelled by operation.
pub const ACK_OPERATION_DURATION: &str = "ackgate_ack_operation_duration_seconds";

// ============================================================================
// Prometheus Recorder
// ============================================================================

static PROMETHEUS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Installs the global Prometheus recorder and returns its render handle.
///
/// Idempotent; later calls return the handle installed by the first one.
///
/// # Panics
///
/// Panics if another metrics recorder was installed outside this function.
#[allow(clippy::panic)]
pub fn init_metrics() -> PrometheusHandle {
    PROMETHEUS_HANDLE
        .get_or_init(|| {
            let handle = PrometheusBuilder::new()
                .install_recorder()
                .unwrap_or_else(|e| panic!("failed to install prometheus recorder: {e}"));

            describe_counter!(HTTP_REQUESTS_TOTAL, "HTTP requests served by the gateway");
            describe_histogram!(
                HTTP_REQUEST_DURATION,
                Unit::Seconds,
                "HTTP request latency including Aggregator round trips"
            );
            describe_counter!(
                ACK_OPERATIONS_TOTAL,
                "Acknowledgement operations by outcome"
            );
            describe_histogram!(
                ACK_OPERATION_DURATION,
                Unit::Seconds,
                "Acknowledgement operation latency"
            );

            tracing::info!("Prometheus metrics recorder initialized");
            handle
        })
        .clone()
}

/// Returns the global Prometheus handle, if initialized.
#[must_use]
pub fn prometheus_handle() -> Option<PrometheusHandle> {
    PROMETHEUS_HANDLE.get().cloned()
}

// ============================================================================
// Request Metrics
// ============================================================================

/// Route template of the request; raw paths would leak rule selectors into
/// label values.
fn route_label<B>(request: &Request<B>) -> String {
    request
        .extensions()
        .get::<MatchedPath>()
        .map_or("unmatched", MatchedPath::as_str)
        .to_string()
}

/// Records `ackgate_http_requests_total` and
/// `ackgate_http_request_duration_seconds` for every response.
pub async fn metrics_middleware(request: Request, next: Next) -> Response {
    let started = Instant::now();
    let route = route_label(&request);
    let method = request.method().as_str().to_string();

    let response = next.run(request).await;

    let status = response.status().as_u16().to_string();
    histogram!(HTTP_REQUEST_DURATION, "route" => route.clone(), "method" => method.clone())
        .record(started.elapsed().as_secs_f64());
    counter!(HTTP_REQUESTS_TOTAL, "route" => route, "method" => method, "status" => status)
        .increment(1);

    response
}

/// Handler for `GET /metrics`.
pub async fn serve_metrics() -> Response {
    const TEXT: &str = "text/plain; version=0.0.4; charset=utf-8";
    match prometheus_handle() {
        Some(handle) => ([(CONTENT_TYPE, TEXT)], handle.render()).into_response(),
        None => (
            StatusCode::SERVICE_UNAVAILABLE,
            [(CONTENT_TYPE, TEXT)],
            "metrics recorder not installed",
        )
            .into_response(),
    }
}

// ============================================================================
// Acknowledgement Metrics
// ============================================================================

/// Records the outcome and latency of one acknowledgement operation.
///
/// `outcome` is a short label such as `created`, `not_found` or `error`.
pub fn record_ack_operation(operation: &'static str, outcome: &'static str, elapsed: Duration) {
    counter!(ACK_OPERATIONS_TOTAL, "operation" => operation, "outcome" => outcome).increment(1);
    histogram!(ACK_OPERATION_DURATION, "operation" => operation).record(elapsed.as_secs_f64());
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::Router;
    use axum::body::Body;
    use axum::routing::get;
    use tower::ServiceExt;

    fn has_series(rendered: &str, name: &str, labels: &[&str]) -> bool {
        rendered
            .lines()
            .filter(|line| line.starts_with(name))
            .any(|line| labels.iter().all(|label| line.contains(label)))
    }

    #[test]
    fn route_label_defaults_to_unmatched() {
        let request = Request::builder().uri("/nowhere").body(()).unwrap();
        assert_eq!(route_label(&request), "unmatched");
    }

    #[test]
    fn ack_operations_are_labelled_by_operation_and_outcome() {
        let handle = init_metrics();
        record_ack_operation("update", "not_found", Duration::from_millis(3));
        let rendered = handle.render();
        assert!(has_series(
            &rendered,
            ACK_OPERATIONS_TOTAL,
            &["operation=\"update\"", "outcome=\"not_found\""]
        ));
        assert!(has_series(
            &rendered,
            ACK_OPERATION_DURATION,
            &["operation=\"update\""]
        ));
    }

    #[tokio::test]
    async fn requests_are_labelled_by_route_template() {
        let handle = init_metrics();
        let app = Router::new()
            .route("/ack/:rule_selector", get(|| async { StatusCode::NO_CONTENT }))
            .route_layer(axum::middleware::from_fn(metrics_middleware));
        let request = Request::builder()
            .method("GET")
            .uri("/ack/abc%7Cxyz")
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::NO_CONTENT);

        let rendered = handle.render();
        assert!(has_series(
            &rendered,
            HTTP_REQUESTS_TOTAL,
            &["route=\"/ack/:rule_selector\"", "status=\"204\""]
        ));
        assert!(!rendered.contains("abc%7Cxyz"));
    }
}
