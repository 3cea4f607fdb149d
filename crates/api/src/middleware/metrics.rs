//! Prometheus metrics middleware.
//!
//! HTTP request metrics, the `/metrics` export endpoint and the business
//! counters recorded by route handlers and jobs.

use axum::{
    body::Body,
    extract::MatchedPath,
    http::{header, Method, Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use domain::models::InvitationKind;
use metrics::{counter, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};
use std::sync::OnceLock;
use std::time::Instant;

static PROMETHEUS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

const DURATION_BUCKETS: &[f64] = &[0.001, 0.005, 0.01, 0.05, 0.1, 0.2, 0.5, 1.0, 2.0, 5.0];

/// Why reserved codes went back to the pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReleaseReason {
    Cancelled,
    Expired,
}

impl ReleaseReason {
    fn as_str(&self) -> &'static str {
        match self {
            ReleaseReason::Cancelled => "cancelled",
            ReleaseReason::Expired => "expired",
        }
    }
}

/// Records `http_requests_total` and `http_request_duration_seconds`.
pub async fn metrics_middleware(req: Request<Body>, next: Next) -> Response {
    let start = Instant::now();
    let method = method_to_str(req.method());
    let path = req
        .extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str().to_string())
        .unwrap_or_else(|| "unmatched".to_string());

    let response = next.run(req).await;

    let status = response.status().as_u16().to_string();

    counter!(
        "http_requests_total",
        "method" => method,
        "path" => path.clone(),
        "status" => status
    )
    .increment(1);

    histogram!(
        "http_request_duration_seconds",
        "method" => method,
        "path" => path
    )
    .record(start.elapsed().as_secs_f64());

    response
}

fn method_to_str(method: &Method) -> &'static str {
    match *method {
        Method::GET => "GET",
        Method::POST => "POST",
        Method::PUT => "PUT",
        Method::DELETE => "DELETE",
        Method::PATCH => "PATCH",
        Method::HEAD => "HEAD",
        Method::OPTIONS => "OPTIONS",
        _ => "OTHER",
    }
}

pub fn record_invitation_created(kind: InvitationKind) {
    counter!("sponsorship_invitations_created_total", "kind" => kind.to_string()).increment(1);
}

pub fn record_invitation_accepted(kind: InvitationKind) {
    counter!("sponsorship_invitations_accepted_total", "kind" => kind.to_string()).increment(1);
}

pub fn record_codes_released(reason: ReleaseReason, count: usize) {
    if count > 0 {
        counter!("sponsorship_codes_released_total", "reason" => reason.as_str())
            .increment(count as u64);
    }
}

pub fn record_code_redeemed() {
    counter!("sponsorship_codes_redeemed_total").increment(1);
}

pub fn record_codes_transferred(count: usize) {
    counter!("sponsorship_codes_transferred_total").increment(count as u64);
}

pub fn record_codes_reclaimed(count: usize) {
    counter!("sponsorship_codes_reclaimed_total").increment(count as u64);
}

/// Handler for `/metrics` returning the Prometheus text format.
pub async fn metrics_handler() -> impl IntoResponse {
    match PROMETHEUS_HANDLE.get() {
        Some(handle) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            handle.render(),
        ),
        None => (
            StatusCode::INTERNAL_SERVER_ERROR,
            [(header::CONTENT_TYPE, "text/plain")],
            "Metrics not initialized".to_string(),
        ),
    }
}

/// Installs the global Prometheus recorder. Calling it again is a no-op.
pub fn init_metrics() -> Result<(), BuildError> {
    if PROMETHEUS_HANDLE.get().is_some() {
        return Ok(());
    }

    let handle = PrometheusBuilder::new()
        .set_buckets(DURATION_BUCKETS)?
        .install_recorder()?;

    // A concurrent initializer may have won; its handle serves the same recorder.
    let _ = PROMETHEUS_HANDLE.set(handle);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_method_to_str() {
        assert_eq!(method_to_str(&Method::GET), "GET");
        assert_eq!(method_to_str(&Method::POST), "POST");
        assert_eq!(method_to_str(&Method::TRACE), "OTHER");
    }

    #[test]
    fn test_release_reason_labels() {
        assert_eq!(ReleaseReason::Cancelled.as_str(), "cancelled");
        assert_eq!(ReleaseReason::Expired.as_str(), "expired");
    }

    #[test]
    fn test_business_counters_without_recorder() {
        // Without an installed recorder the macros are no-ops.
        record_invitation_created(InvitationKind::Farmer);
        record_codes_released(ReleaseReason::Expired, 0);
        record_codes_transferred(3);
    }
}
