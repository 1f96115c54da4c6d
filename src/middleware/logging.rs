//! Request logging middleware and request-id generation

use axum::{
    body::Body,
    http::{HeaderValue, Request},
    middleware::Next,
    response::Response,
};
use std::future::Future;
use std::time::Instant;
use tower_http::request_id::{MakeRequestId, RequestId};
use tracing::{debug, error, info, warn, Instrument};
use uuid::Uuid;

/// Generates a fresh UUID v4 for every request missing an `x-request-id`.
#[derive(Clone, Copy, Debug, Default)]
pub struct UuidRequestId;

impl MakeRequestId for UuidRequestId {
    fn make_request_id<B>(&mut self, _request: &Request<B>) -> Option<RequestId> {
        let id = Uuid::new_v4().to_string();
        HeaderValue::from_str(&id).ok().map(RequestId::new)
    }
}

/// Logs method, path, status and latency for every request, inside a span
/// carrying the request id.
pub async fn request_logging_middleware(request: Request<Body>, next: Next) -> Response {
    let start = Instant::now();
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("unknown")
        .to_string();

    let span = tracing::info_span!(
        "http_request",
        method = %method,
        path = %path,
        request_id = %request_id,
    );

    async move {
        debug!("Request started");
        let response = next.run(request).await;
        let status = response.status();
        let latency_ms = start.elapsed().as_millis() as u64;

        if status.is_server_error() {
            error!(status = status.as_u16(), latency_ms, "Request failed");
        } else if status.is_client_error() {
            warn!(status = status.as_u16(), latency_ms, "Request rejected");
        } else {
            info!(status = status.as_u16(), latency_ms, "Request completed");
        }
        response
    }
    .instrument(span)
    .await
}

/// Times a database operation and logs its outcome.
pub async fn log_database_query<F, T, E>(operation: &str, fut: F) -> Result<T, E>
where
    F: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    let start = Instant::now();
    let result = fut.await;
    let duration_ms = start.elapsed().as_millis() as u64;
    match &result {
        Ok(_) => debug!(operation, duration_ms, "Database operation completed"),
        Err(e) => error!(operation, duration_ms, error = %e, "Database operation failed"),
    }
    result
}

/// Times a call to an external service and logs its outcome.
pub async fn log_external_call<F, T, E>(service: &str, operation: &str, fut: F) -> Result<T, E>
where
    F: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    let start = Instant::now();
    let result = fut.await;
    let duration_ms = start.elapsed().as_millis() as u64;
    match &result {
        Ok(_) => info!(service, operation, duration_ms, "External call succeeded"),
        Err(e) => warn!(service, operation, duration_ms, error = %e, "External call failed"),
    }
    result
}
