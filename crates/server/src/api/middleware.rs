//! Metrics middleware for API routes.

use axum::{
    body::{Body, HttpBody},
    http::{header, Request},
    middleware::Next,
    response::Response,
};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;
use tracing::debug;

use crate::metrics::{
    normalize_path, HTTP_REQUESTS_IN_FLIGHT, HTTP_REQUESTS_TOTAL, HTTP_REQUEST_DURATION,
    HTTP_RESPONSE_BYTES,
};

/// Response bytes sent since startup.
static TOTAL_BYTES_SENT: AtomicU64 = AtomicU64::new(0);

/// Metrics middleware that tracks HTTP request duration, counts and bytes.
///
/// This middleware records:
/// - Request duration (histogram)
/// - Request count (counter)
/// - Requests in flight (gauge)
/// - Response body bytes per route (counter)
pub async fn metrics_middleware(request: Request<Body>, next: Next) -> Response {
    let start = Instant::now();
    let method = request.method().to_string();
    let path = normalize_path(request.uri().path());

    HTTP_REQUESTS_IN_FLIGHT.inc();

    let response = next.run(request).await;

    HTTP_REQUESTS_IN_FLIGHT.dec();

    let duration = start.elapsed().as_secs_f64();
    let status = response.status().as_u16().to_string();

    HTTP_REQUEST_DURATION
        .with_label_values(&[&method, &path, &status])
        .observe(duration);
    HTTP_REQUESTS_TOTAL
        .with_label_values(&[&method, &path, &status])
        .inc();

    if let Some(bytes) = response_size(&response) {
        HTTP_RESPONSE_BYTES.with_label_values(&[&path]).inc_by(bytes);
        let total = TOTAL_BYTES_SENT.fetch_add(bytes, Ordering::Relaxed) + bytes;
        debug!(method = %method, path = %path, bytes, total_bytes = total, "Response sent");
    }

    response
}

/// Body size when known up front, else the declared Content-Length.
fn response_size(response: &Response) -> Option<u64> {
    response.body().size_hint().exact().or_else(|| {
        response
            .headers()
            .get(header::CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse().ok())
    })
}
