use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;

use crate::database::error::DatabaseError;
use crate::middleware::logging::log_external_call;
use crate::orders::error::OrderError;
use crate::orders::status_mapper::map_provider_status;
use crate::orders::types::Order;
use crate::payments::error::PaymentError;
use crate::payments::providers::mercadopago::verify_signature;
use crate::payments::types::PaymentNotification;
use crate::payments::utils::bounded;
use crate::services::order_lifecycle::OrderLifecycleEngine;

#[derive(Debug, Error)]
pub enum ReconciliationError {
    #[error("Invalid notification: {0}")]
    InvalidNotification(String),
    #[error("Invalid signature: {0}")]
    InvalidSignature(String),
    #[error("Payment {payment_id} carries no usable external reference")]
    MissingReference { payment_id: String },
    #[error("Order not found: {0}")]
    OrderNotFound(Uuid),
    #[error("Gateway error: {0}")]
    Gateway(#[from] PaymentError),
    #[error("Database error: {0}")]
    Store(#[from] DatabaseError),
    #[error("Processing error: {0}")]
    Processing(String),
}

impl From<OrderError> for ReconciliationError {
    fn from(err: OrderError) -> Self {
        match err {
            OrderError::OrderNotFound(id) => ReconciliationError::OrderNotFound(id),
            OrderError::Store(e) => ReconciliationError::Store(e),
            other => ReconciliationError::Processing(other.to_string()),
        }
    }
}

impl ReconciliationError {
    /// Whether a later redelivery of the same notification could succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            ReconciliationError::Gateway(e) => e.is_retryable(),
            ReconciliationError::Store(e) => e.is_retryable(),
            _ => false,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ReconciliationOutcome {
    Applied(Order),
    /// Duplicate, stale or non-advancing notification.
    Unchanged(Order),
    /// Acknowledged without touching any order.
    Ignored(String),
}

pub struct WebhookProcessor {
    engine: Arc<OrderLifecycleEngine>,
    webhook_secret: Option<String>,
}

impl WebhookProcessor {
    pub fn new(engine: Arc<OrderLifecycleEngine>, webhook_secret: Option<String>) -> Self {
        Self {
            engine,
            webhook_secret,
        }
    }

    /// Reconciles one provider notification.
    ///
    /// The notification only names a payment; its status is always
    /// re-fetched from the gateway before anything is applied.
    pub async fn process_notification(
        &self,
        notification: &PaymentNotification,
        signature: Option<&str>,
        request_id: Option<&str>,
    ) -> Result<ReconciliationOutcome, ReconciliationError> {
        if let Some(secret) = &self.webhook_secret {
            let signature = signature.ok_or_else(|| {
                ReconciliationError::InvalidSignature("missing x-signature header".to_string())
            })?;
            verify_signature(
                secret,
                signature,
                request_id,
                notification.payment_id.as_deref(),
            )
            .map_err(|e| ReconciliationError::InvalidSignature(e.to_string()))?;
        }

        if !notification.is_payment() {
            info!(
                topic = ?notification.topic,
                action = ?notification.action,
                "Ignoring non-payment notification"
            );
            return Ok(ReconciliationOutcome::Ignored(format!(
                "topic {}",
                notification.topic.as_deref().unwrap_or("unknown")
            )));
        }

        let payment_id = notification.payment_id.as_deref().ok_or_else(|| {
            ReconciliationError::InvalidNotification("payment notification without id".to_string())
        })?;

        let gateway = self.engine.gateway();
        let detail = log_external_call(
            gateway.name(),
            "fetch payment detail",
            bounded(
                self.engine.gateway_timeout(),
                "fetch payment detail",
                gateway.fetch_payment_detail(payment_id),
            ),
        )
        .await?;

        let order_id = detail
            .external_reference
            .as_deref()
            .and_then(|reference| Uuid::parse_str(reference.trim()).ok())
            .ok_or_else(|| ReconciliationError::MissingReference {
                payment_id: detail.gateway_payment_id.clone(),
            })?;

        let payment_status = map_provider_status(&detail.status);
        info!(
            payment_id = %detail.gateway_payment_id,
            order_id = %order_id,
            provider_status = %detail.status,
            status_detail = ?detail.status_detail,
            payment_status = %payment_status,
            "Reconciling payment"
        );

        let updated = self
            .engine
            .apply_payment_update(order_id, payment_status)
            .await?;

        if let Some(amount) = &detail.amount {
            if *amount != updated.order.total_amount {
                warn!(
                    order_id = %order_id,
                    payment_id = %detail.gateway_payment_id,
                    paid = %amount,
                    expected = %updated.order.total_amount,
                    "Payment amount differs from order total"
                );
            }
        }

        if updated.applied {
            Ok(ReconciliationOutcome::Applied(updated.order))
        } else {
            Ok(ReconciliationOutcome::Unchanged(updated.order))
        }
    }
}
