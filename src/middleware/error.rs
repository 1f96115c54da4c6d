//! JSON error envelope for the order and payment routes

use crate::error::{AppError, ErrorCode};
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};

/// Body of every non-2xx answer from `/orders`.
///
/// `retryable` tells a client whether repeating the call can help; for
/// `POST /orders/{id}/payment` the repeat reuses the order id as
/// idempotency key, so it never creates a second charge.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorResponse {
    pub error: ErrorCode,
    pub message: String,
    pub request_id: Option<String>,
    /// RFC 3339
    pub timestamp: String,
    /// Context attached with `AppError::with_context`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retryable: Option<bool>,
}

impl ErrorResponse {
    pub fn from_app_error(error: &AppError) -> Self {
        let details = error
            .context
            .as_ref()
            .map(|context| serde_json::json!({ "context": context }));
        Self {
            error: error.error_code(),
            message: error.user_message(),
            request_id: error.request_id.clone(),
            timestamp: Utc::now().to_rfc3339(),
            details,
            retryable: Some(error.is_retryable()),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status_code =
            StatusCode::from_u16(self.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        // Gateway and store failures are ours to chase; rejected input is not.
        if status_code.is_server_error() {
            tracing::error!(
                error = ?self,
                error_code = ?self.error_code(),
                request_id = ?self.request_id,
                status = status_code.as_u16(),
                "Order request failed"
            );
        } else {
            tracing::warn!(
                error = %self,
                error_code = ?self.error_code(),
                request_id = ?self.request_id,
                status = status_code.as_u16(),
                "Order request rejected"
            );
        }

        (status_code, Json(ErrorResponse::from_app_error(&self))).into_response()
    }
}

/// Id set by the request-id layer, echoed into error bodies and webhook logs.
pub fn get_request_id_from_headers(headers: &axum::http::HeaderMap) -> Option<String> {
    headers
        .get("x-request-id")
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{AppErrorKind, DomainError, ValidationError};
    use axum::http::HeaderMap;

    #[test]
    fn test_error_response_from_app_error() {
        let app_error = AppError::new(AppErrorKind::Domain(DomainError::OrderNotFound {
            order_id: "6f1c".to_string(),
        }))
        .with_request_id("req_123");

        let error_response = ErrorResponse::from_app_error(&app_error);

        assert_eq!(error_response.error, ErrorCode::OrderNotFound);
        assert_eq!(error_response.request_id, Some("req_123".to_string()));
        assert!(error_response.message.contains("6f1c"));
    }

    #[test]
    fn test_envelope_uses_camel_case() {
        let app_error = AppError::new(AppErrorKind::Domain(DomainError::PaymentNotAllowed {
            order_id: "6f1c".to_string(),
            reason: "already paid".to_string(),
        }))
        .with_request_id("req_456");
        let json = serde_json::to_value(ErrorResponse::from_app_error(&app_error)).unwrap();

        assert_eq!(json["error"], "PAYMENT_NOT_ALLOWED");
        assert_eq!(json["requestId"], "req_456");
        assert_eq!(json["retryable"], false);
        assert!(json.get("details").is_none());
    }

    #[test]
    fn test_app_error_into_response() {
        let app_error = AppError::validation(ValidationError::InvalidStatus {
            value: "DONE".to_string(),
        });

        let response = app_error.into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_request_id_extraction() {
        let mut headers = HeaderMap::new();
        assert_eq!(get_request_id_from_headers(&headers), None);
        headers.insert("x-request-id", "abc".parse().unwrap());
        assert_eq!(get_request_id_from_headers(&headers), Some("abc".to_string()));
    }
}
