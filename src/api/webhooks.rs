use axum::{
    body::Bytes,
    extract::{Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use serde_json::Value as JsonValue;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::middleware::error::get_request_id_from_headers;
use crate::payments::types::PaymentNotification;
use crate::services::webhook_processor::{
    ReconciliationError, ReconciliationOutcome, WebhookProcessor,
};

pub struct WebhookState {
    pub processor: Arc<WebhookProcessor>,
}

pub fn routes(state: Arc<WebhookState>) -> Router {
    Router::new()
        .route("/webhook", post(handle_webhook))
        .with_state(state)
}

fn acknowledge() -> Response {
    (StatusCode::OK, Json(serde_json::json!({"status": "ok"}))).into_response()
}

/// Non-2xx so the provider redelivers the same notification later.
fn request_redelivery() -> Response {
    (
        StatusCode::SERVICE_UNAVAILABLE,
        Json(serde_json::json!({"status": "retry"})),
    )
        .into_response()
}

/// POST /webhook
///
/// Notifications that can never succeed are logged and acknowledged with 200.
/// Transient failures (gateway timeout or 5xx, lost store connection) answer
/// 503 so the provider's redelivery re-runs the reconciliation.
pub async fn handle_webhook(
    State(state): State<Arc<WebhookState>>,
    Query(query): Query<HashMap<String, String>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let request_id = get_request_id_from_headers(&headers);
    let signature = headers
        .get("x-signature")
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string());

    let payload: Option<JsonValue> = if body.iter().all(u8::is_ascii_whitespace) {
        None
    } else {
        match serde_json::from_slice(&body) {
            Ok(p) => Some(p),
            Err(e) => {
                warn!(request_id = ?request_id, error = %e, "Invalid JSON webhook payload");
                return acknowledge();
            }
        }
    };

    let notification = match PaymentNotification::from_parts(payload.as_ref(), &query) {
        Ok(n) => n,
        Err(e) => {
            warn!(request_id = ?request_id, error = %e, "Unreadable webhook notification");
            return acknowledge();
        }
    };

    info!(
        request_id = ?request_id,
        topic = ?notification.topic,
        payment_id = ?notification.payment_id,
        "Received webhook"
    );

    match state
        .processor
        .process_notification(&notification, signature.as_deref(), request_id.as_deref())
        .await
    {
        Ok(ReconciliationOutcome::Applied(order)) => {
            info!(
                order_id = %order.id,
                payment_status = %order.payment_status,
                order_status = %order.order_status,
                "Webhook processed successfully"
            );
        }
        Ok(ReconciliationOutcome::Unchanged(order)) => {
            info!(order_id = %order.id, "Webhook already reflected in order");
        }
        Ok(ReconciliationOutcome::Ignored(reason)) => {
            debug!(reason = %reason, "Webhook ignored");
        }
        Err(ReconciliationError::InvalidSignature(reason)) => {
            warn!(request_id = ?request_id, reason = %reason, "Invalid webhook signature");
        }
        Err(e) if e.is_retryable() => {
            error!(
                request_id = ?request_id,
                payment_id = ?notification.payment_id,
                error = %e,
                "Webhook processing failed, asking provider to redeliver"
            );
            return request_redelivery();
        }
        Err(e) => {
            warn!(
                request_id = ?request_id,
                payment_id = ?notification.payment_id,
                error = %e,
                "Webhook processing failed"
            );
        }
    }

    acknowledge()
}
