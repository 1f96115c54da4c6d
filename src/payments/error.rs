use thiserror::Error;

pub type PaymentResult<T> = Result<T, PaymentError>;

#[derive(Debug, Clone, Error)]
pub enum PaymentError {
    #[error("Validation error: {message}")]
    ValidationError {
        message: String,
        field: Option<String>,
    },

    #[error("Network error: {message}")]
    NetworkError { message: String },

    #[error("Rate limit exceeded: {message}")]
    RateLimitError {
        message: String,
        retry_after_seconds: Option<u64>,
    },

    #[error("Webhook verification failed: {message}")]
    WebhookVerificationError { message: String },

    #[error("Provider error: provider={provider}, message={message}")]
    ProviderError {
        provider: String,
        message: String,
        provider_code: Option<String>,
        retryable: bool,
    },
}

impl PaymentError {
    pub fn is_retryable(&self) -> bool {
        match self {
            PaymentError::ValidationError { .. } => false,
            PaymentError::NetworkError { .. } => true,
            PaymentError::RateLimitError { .. } => true,
            PaymentError::WebhookVerificationError { .. } => false,
            PaymentError::ProviderError { retryable, .. } => *retryable,
        }
    }

    pub(crate) fn malformed_response(provider: &str, message: impl Into<String>) -> Self {
        PaymentError::ProviderError {
            provider: provider.to_string(),
            message: message.into(),
            provider_code: None,
            retryable: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryable_flags_are_set() {
        assert!(PaymentError::NetworkError {
            message: "timeout".to_string()
        }
        .is_retryable());
        assert!(PaymentError::RateLimitError {
            message: "limited".to_string(),
            retry_after_seconds: Some(30)
        }
        .is_retryable());
        assert!(!PaymentError::ValidationError {
            message: "bad".to_string(),
            field: None
        }
        .is_retryable());
        assert!(!PaymentError::malformed_response("mercadopago", "missing id").is_retryable());
    }

    #[test]
    fn provider_errors_carry_their_own_retryability() {
        let server = PaymentError::ProviderError {
            provider: "mercadopago".to_string(),
            message: "HTTP 503".to_string(),
            provider_code: Some("503".to_string()),
            retryable: true,
        };
        assert!(server.is_retryable());
    }
}
