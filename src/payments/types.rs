use crate::orders::types::PaymentStatus;
use crate::payments::error::PaymentError;
use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::collections::HashMap;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Payer {
    pub email: String,
    pub first_name: Option<String>,
}

/// A single-shot Pix charge.
#[derive(Debug, Clone, PartialEq)]
pub struct ChargeRequest {
    pub amount: BigDecimal,
    pub description: String,
    /// Repeated requests with the same key yield the same charge.
    pub idempotency_key: String,
    /// Echoed back by the provider in payment details; holds the order id.
    pub external_reference: String,
    pub payer: Payer,
}

impl ChargeRequest {
    pub fn validate(&self) -> Result<(), PaymentError> {
        if self.amount <= BigDecimal::from(0) {
            return Err(PaymentError::ValidationError {
                message: "amount must be greater than zero".to_string(),
                field: Some("amount".to_string()),
            });
        }
        if self.idempotency_key.trim().is_empty() {
            return Err(PaymentError::ValidationError {
                message: "idempotency key is required".to_string(),
                field: Some("idempotency_key".to_string()),
            });
        }
        if self.payer.email.trim().is_empty() {
            return Err(PaymentError::ValidationError {
                message: "payer email is required".to_string(),
                field: Some("payer.email".to_string()),
            });
        }
        Ok(())
    }
}

/// Charge record returned to the client after payment initiation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Charge {
    pub gateway_payment_id: String,
    /// Raw provider status.
    pub status: String,
    pub payment_status: PaymentStatus,
    pub amount: BigDecimal,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub qr_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub qr_code_base64: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ticket_url: Option<String>,
}

/// Authoritative payment state as reported by the provider.
#[derive(Debug, Clone, PartialEq)]
pub struct PaymentDetail {
    pub gateway_payment_id: String,
    pub status: String,
    pub status_detail: Option<String>,
    pub external_reference: Option<String>,
    pub amount: Option<BigDecimal>,
    pub date_approved: Option<DateTime<Utc>>,
}

/// Inbound provider notification. Carries only the payment id; status is
/// always re-fetched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentNotification {
    pub topic: Option<String>,
    pub action: Option<String>,
    pub payment_id: Option<String>,
}

fn id_value(value: &JsonValue) -> Option<String> {
    match value {
        JsonValue::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        JsonValue::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

impl PaymentNotification {
    /// Builds a notification from the JSON body and the query string.
    ///
    /// Body fields win over query parameters. Accepts both the webhook shape
    /// (`type` + `data.id`) and the legacy IPN shape (`topic` + `id`).
    pub fn from_parts(
        body: Option<&JsonValue>,
        query: &HashMap<String, String>,
    ) -> Result<Self, PaymentError> {
        let body = match body {
            Some(JsonValue::Object(_)) | None => body,
            Some(JsonValue::Null) => None,
            Some(_) => {
                return Err(PaymentError::WebhookVerificationError {
                    message: "notification body must be a JSON object".to_string(),
                })
            }
        };

        let body_str = |key: &str| {
            body.and_then(|b| b.get(key))
                .and_then(JsonValue::as_str)
                .map(str::to_string)
        };
        let query_str = |key: &str| query.get(key).filter(|v| !v.is_empty()).cloned();

        let topic = body_str("type")
            .or_else(|| body_str("topic"))
            .or_else(|| query_str("type"))
            .or_else(|| query_str("topic"));

        let payment_id = body
            .and_then(|b| b.get("data"))
            .and_then(|data| data.get("id"))
            .and_then(id_value)
            .or_else(|| query_str("data.id"))
            .or_else(|| {
                // Legacy IPN carries the resource id at the top level.
                if topic.as_deref() == Some("payment") {
                    query_str("id")
                } else {
                    None
                }
            });

        Ok(Self {
            topic,
            action: body_str("action"),
            payment_id,
        })
    }

    pub fn is_payment(&self) -> bool {
        match (&self.topic, &self.action) {
            (Some(topic), _) => topic.eq_ignore_ascii_case("payment"),
            (None, Some(action)) => action.starts_with("payment."),
            (None, None) => false,
        }
    }
}
