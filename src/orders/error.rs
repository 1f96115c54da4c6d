use thiserror::Error;
use uuid::Uuid;

use crate::database::error::DatabaseError;
use crate::orders::types::OrderStatus;
use crate::payments::error::PaymentError;

pub type OrderResult<T> = Result<T, OrderError>;

#[derive(Debug, Clone, Error)]
pub enum OrderError {
    #[error("invalid input: {message}")]
    InvalidInput {
        message: String,
        field: Option<String>,
    },

    #[error("user not found: {0}")]
    UserNotFound(String),

    #[error("product not found: {0}")]
    ProductNotFound(String),

    #[error("order not found: {0}")]
    OrderNotFound(Uuid),

    #[error("invalid status transition from {from} to {to}")]
    InvalidTransition { from: OrderStatus, to: OrderStatus },

    #[error("payment not allowed for order {order_id}: {reason}")]
    PaymentNotAllowed { order_id: Uuid, reason: String },

    /// Transient gateway failure; the caller may retry.
    #[error("payment gateway unavailable: {0}")]
    GatewayUnavailable(String),

    #[error("payment gateway rejected the request: {0}")]
    GatewayRejected(String),

    #[error(transparent)]
    Store(#[from] DatabaseError),
}

impl OrderError {
    pub fn invalid(message: impl Into<String>, field: impl Into<String>) -> Self {
        OrderError::InvalidInput {
            message: message.into(),
            field: Some(field.into()),
        }
    }

    pub fn is_retryable(&self) -> bool {
        match self {
            OrderError::GatewayUnavailable(_) => true,
            OrderError::Store(err) => err.is_retryable(),
            _ => false,
        }
    }
}

impl From<PaymentError> for OrderError {
    fn from(err: PaymentError) -> Self {
        if err.is_retryable() {
            OrderError::GatewayUnavailable(err.to_string())
        } else {
            OrderError::GatewayRejected(err.to_string())
        }
    }
}
