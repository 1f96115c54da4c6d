//! Unified error handling for the food order backend
//!
//! This module provides a unified error system with proper HTTP status mapping,
//! user-friendly messages, and structured error codes for client handling.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::orders::error::OrderError;
use crate::orders::types::OrderStatus;

/// Error codes for programmatic handling
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum ErrorCode {
    // Domain errors (4xx)
    #[serde(rename = "USER_NOT_FOUND")]
    UserNotFound,
    #[serde(rename = "PRODUCT_NOT_FOUND")]
    ProductNotFound,
    #[serde(rename = "ORDER_NOT_FOUND")]
    OrderNotFound,
    #[serde(rename = "INVALID_STATUS_TRANSITION")]
    InvalidStatusTransition,
    #[serde(rename = "PAYMENT_NOT_ALLOWED")]
    PaymentNotAllowed,

    // Infrastructure errors (5xx)
    #[serde(rename = "DATABASE_ERROR")]
    DatabaseError,
    #[serde(rename = "CONFIGURATION_ERROR")]
    ConfigurationError,

    // External errors (502)
    #[serde(rename = "PAYMENT_GATEWAY_UNAVAILABLE")]
    PaymentGatewayUnavailable,
    #[serde(rename = "PAYMENT_GATEWAY_REJECTED")]
    PaymentGatewayRejected,

    // Generic
    #[serde(rename = "INTERNAL_ERROR")]
    InternalError,
    #[serde(rename = "VALIDATION_ERROR")]
    ValidationError,
}

/// Domain-specific business logic errors
#[derive(Debug, Clone)]
pub enum DomainError {
    UserNotFound { user_id: String },
    ProductNotFound { product_id: String },
    OrderNotFound { order_id: String },
    /// Requested status is not reachable from the current one
    InvalidStatusTransition { from: OrderStatus, to: OrderStatus },
    /// Order is in a state that cannot be charged
    PaymentNotAllowed { order_id: String, reason: String },
}

/// Infrastructure-level errors (database, configuration)
#[derive(Debug, Clone)]
pub enum InfrastructureError {
    /// Database connection or query failure
    Database { message: String, is_retryable: bool },
    /// Missing or invalid configuration
    Configuration { message: String },
}

/// External service errors
#[derive(Debug, Clone)]
pub enum ExternalError {
    /// Payment gateway (Mercado Pago) error
    PaymentGateway {
        provider: String,
        message: String,
        is_retryable: bool,
    },
}

/// Input validation errors
#[derive(Debug, Clone)]
pub enum ValidationError {
    /// Body could not be read as the expected shape
    MalformedBody { reason: String },
    /// Field present but unacceptable
    InvalidField { field: String, reason: String },
    /// Unknown order status in a path, query or body
    InvalidStatus { value: String },
    /// Path identifier is not a valid UUID
    InvalidId { value: String },
}

/// Unified application error type
#[derive(Debug, Clone)]
pub struct AppError {
    pub kind: AppErrorKind,
    pub request_id: Option<String>,
    pub context: Option<String>,
}

#[derive(Debug, Clone)]
pub enum AppErrorKind {
    Domain(DomainError),
    Infrastructure(InfrastructureError),
    External(ExternalError),
    Validation(ValidationError),
}

impl AppError {
    pub fn new(kind: AppErrorKind) -> Self {
        Self {
            kind,
            request_id: None,
            context: None,
        }
    }

    pub fn validation(err: ValidationError) -> Self {
        Self::new(AppErrorKind::Validation(err))
    }

    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = Some(request_id.into());
        self
    }

    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    /// Map error to HTTP status code
    pub fn status_code(&self) -> u16 {
        match &self.kind {
            AppErrorKind::Domain(err) => match err {
                DomainError::UserNotFound { .. } => 404,
                DomainError::ProductNotFound { .. } => 404,
                DomainError::OrderNotFound { .. } => 404,
                DomainError::InvalidStatusTransition { .. } => 409, // Conflict
                DomainError::PaymentNotAllowed { .. } => 409,
            },
            AppErrorKind::Infrastructure(_) => 500,
            AppErrorKind::External(ExternalError::PaymentGateway { .. }) => 502, // Bad Gateway
            AppErrorKind::Validation(_) => 400,
        }
    }

    /// Get error code for client handling
    pub fn error_code(&self) -> ErrorCode {
        match &self.kind {
            AppErrorKind::Domain(err) => match err {
                DomainError::UserNotFound { .. } => ErrorCode::UserNotFound,
                DomainError::ProductNotFound { .. } => ErrorCode::ProductNotFound,
                DomainError::OrderNotFound { .. } => ErrorCode::OrderNotFound,
                DomainError::InvalidStatusTransition { .. } => ErrorCode::InvalidStatusTransition,
                DomainError::PaymentNotAllowed { .. } => ErrorCode::PaymentNotAllowed,
            },
            AppErrorKind::Infrastructure(err) => match err {
                InfrastructureError::Database { .. } => ErrorCode::DatabaseError,
                InfrastructureError::Configuration { .. } => ErrorCode::ConfigurationError,
            },
            AppErrorKind::External(ExternalError::PaymentGateway { is_retryable, .. }) => {
                if *is_retryable {
                    ErrorCode::PaymentGatewayUnavailable
                } else {
                    ErrorCode::PaymentGatewayRejected
                }
            }
            AppErrorKind::Validation(_) => ErrorCode::ValidationError,
        }
    }

    /// Get user-friendly error message
    pub fn user_message(&self) -> String {
        match &self.kind {
            AppErrorKind::Domain(err) => match err {
                DomainError::UserNotFound { user_id } => format!("User '{}' not found", user_id),
                DomainError::ProductNotFound { product_id } => {
                    format!("Product '{}' not found", product_id)
                }
                DomainError::OrderNotFound { order_id } => {
                    format!("Order '{}' not found", order_id)
                }
                DomainError::InvalidStatusTransition { from, to } => {
                    format!("Order cannot move from {} to {}", from, to)
                }
                DomainError::PaymentNotAllowed { order_id, reason } => {
                    format!("Order '{}' cannot be paid: {}", order_id, reason)
                }
            },
            AppErrorKind::Infrastructure(_) => {
                "Service temporarily unavailable. Please try again later".to_string()
            }
            AppErrorKind::External(ExternalError::PaymentGateway {
                provider,
                is_retryable,
                ..
            }) => {
                if *is_retryable {
                    format!(
                        "Payment provider ({}) is temporarily unavailable. Please try again",
                        provider
                    )
                } else {
                    "Payment provider rejected the charge. Please contact support".to_string()
                }
            }
            AppErrorKind::Validation(err) => match err {
                ValidationError::MalformedBody { reason } => {
                    format!("Malformed request body: {}", reason)
                }
                ValidationError::InvalidField { field, reason } => {
                    format!("Invalid value for '{}': {}", field, reason)
                }
                ValidationError::InvalidStatus { value } => {
                    format!("Unknown order status '{}'", value)
                }
                ValidationError::InvalidId { value } => format!("Invalid order id '{}'", value),
            },
        }
    }

    /// Check if error is retryable
    pub fn is_retryable(&self) -> bool {
        match &self.kind {
            AppErrorKind::Domain(_) => false,
            AppErrorKind::Infrastructure(err) => match err {
                InfrastructureError::Database { is_retryable, .. } => *is_retryable,
                InfrastructureError::Configuration { .. } => false,
            },
            AppErrorKind::External(ExternalError::PaymentGateway { is_retryable, .. }) => {
                *is_retryable
            }
            AppErrorKind::Validation(_) => false,
        }
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.user_message())
    }
}

impl std::error::Error for AppError {}

// From<DatabaseError> lives in database/error.rs

impl From<OrderError> for AppError {
    fn from(err: OrderError) -> Self {
        let kind = match err {
            OrderError::InvalidInput { message, field } => {
                AppErrorKind::Validation(ValidationError::InvalidField {
                    field: field.unwrap_or_else(|| "request".to_string()),
                    reason: message,
                })
            }
            OrderError::UserNotFound(user_id) => {
                AppErrorKind::Domain(DomainError::UserNotFound { user_id })
            }
            OrderError::ProductNotFound(product_id) => {
                AppErrorKind::Domain(DomainError::ProductNotFound { product_id })
            }
            OrderError::OrderNotFound(id) => AppErrorKind::Domain(DomainError::OrderNotFound {
                order_id: id.to_string(),
            }),
            OrderError::InvalidTransition { from, to } => {
                AppErrorKind::Domain(DomainError::InvalidStatusTransition { from, to })
            }
            OrderError::PaymentNotAllowed { order_id, reason } => {
                AppErrorKind::Domain(DomainError::PaymentNotAllowed {
                    order_id: order_id.to_string(),
                    reason,
                })
            }
            OrderError::GatewayUnavailable(message) => {
                AppErrorKind::External(ExternalError::PaymentGateway {
                    provider: "mercadopago".to_string(),
                    message,
                    is_retryable: true,
                })
            }
            OrderError::GatewayRejected(message) => {
                AppErrorKind::External(ExternalError::PaymentGateway {
                    provider: "mercadopago".to_string(),
                    message,
                    is_retryable: false,
                })
            }
            OrderError::Store(e) => return AppError::from(e),
        };

        AppError::new(kind)
    }
}

/// Result type for operations that can fail with AppError
pub type AppResult<T> = Result<T, AppError>;
