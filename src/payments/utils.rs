use crate::payments::error::{PaymentError, PaymentResult};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde_json::Value as JsonValue;
use std::future::Future;
use std::time::Duration;
use tracing::warn;

#[derive(Clone)]
pub struct PaymentHttpClient {
    client: Client,
    provider: &'static str,
    timeout: Duration,
    max_retries: u32,
    base_backoff: Duration,
}

impl PaymentHttpClient {
    pub fn new(provider: &'static str, timeout: Duration, max_retries: u32) -> PaymentResult<Self> {
        let client =
            Client::builder()
                .timeout(timeout)
                .build()
                .map_err(|e| PaymentError::NetworkError {
                    message: format!("failed to initialize HTTP client: {}", e),
                })?;

        Ok(Self {
            client,
            provider,
            timeout,
            max_retries,
            base_backoff: Duration::from_secs(1),
        })
    }

    /// Backoff before retry `n` is `base_backoff * 2^n`.
    pub fn with_base_backoff(mut self, base_backoff: Duration) -> Self {
        self.base_backoff = base_backoff;
        self
    }

    fn backoff(&self, attempt: u32) -> Duration {
        self.base_backoff * (1 << attempt.min(6))
    }

    pub async fn request_json<T: DeserializeOwned>(
        &self,
        method: reqwest::Method,
        url: &str,
        bearer_token: Option<&str>,
        body: Option<&JsonValue>,
        additional_headers: &[(&str, &str)],
    ) -> PaymentResult<T> {
        let mut last_error = None;
        for attempt in 0..=self.max_retries {
            let mut request = self.client.request(method.clone(), url);
            request = request.timeout(self.timeout);

            if let Some(token) = bearer_token {
                request = request.bearer_auth(token);
            }
            for (k, v) in additional_headers {
                request = request.header(*k, *v);
            }
            if let Some(payload) = body {
                request = request.json(payload);
            }

            let response = request
                .send()
                .await
                .map_err(|e| PaymentError::NetworkError {
                    message: format!("{} request failed: {}", self.provider, e),
                });

            match response {
                Ok(resp) => {
                    let status = resp.status();
                    let text = match resp.text().await {
                        Ok(text) => text,
                        Err(e) => {
                            let err = PaymentError::NetworkError {
                                message: format!(
                                    "{} response body could not be read: {}",
                                    self.provider, e
                                ),
                            };
                            if attempt < self.max_retries {
                                warn!(
                                    provider = self.provider,
                                    status = %status,
                                    attempt = attempt + 1,
                                    error = %err,
                                    "provider response body unreadable, retrying"
                                );
                                last_error = Some(err);
                                tokio::time::sleep(self.backoff(attempt)).await;
                                continue;
                            }
                            return Err(err);
                        }
                    };
                    if status.is_success() {
                        return serde_json::from_str::<T>(&text).map_err(|e| {
                            PaymentError::malformed_response(
                                self.provider,
                                format!("invalid provider JSON response: {}", e),
                            )
                        });
                    }

                    if status.as_u16() == 429 {
                        if attempt < self.max_retries {
                            tokio::time::sleep(self.backoff(attempt)).await;
                            continue;
                        }
                        return Err(PaymentError::RateLimitError {
                            message: format!("{} rate limit exceeded", self.provider),
                            retry_after_seconds: None,
                        });
                    }

                    if status.is_server_error() && attempt < self.max_retries {
                        warn!(
                            provider = self.provider,
                            status = %status,
                            attempt = attempt + 1,
                            "provider server error, retrying"
                        );
                        tokio::time::sleep(self.backoff(attempt)).await;
                        continue;
                    }

                    return Err(PaymentError::ProviderError {
                        provider: self.provider.to_string(),
                        message: format!("HTTP {}: {}", status, text),
                        provider_code: Some(status.as_u16().to_string()),
                        retryable: status.is_server_error(),
                    });
                }
                Err(e) => {
                    warn!(
                        provider = self.provider,
                        attempt = attempt + 1,
                        error = %e,
                        "provider request failed"
                    );
                    last_error = Some(e);
                    if attempt < self.max_retries {
                        tokio::time::sleep(self.backoff(attempt)).await;
                        continue;
                    }
                }
            }
        }

        Err(last_error.unwrap_or(PaymentError::NetworkError {
            message: format!("{} request failed", self.provider),
        }))
    }
}

/// Runs a gateway call under a hard deadline. Elapsed deadlines surface as
/// a retryable network error.
pub async fn bounded<T, F>(limit: Duration, operation: &str, fut: F) -> PaymentResult<T>
where
    F: Future<Output = PaymentResult<T>>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result,
        Err(_) => Err(PaymentError::NetworkError {
            message: format!("{} timed out after {:?}", operation, limit),
        }),
    }
}

pub fn verify_hmac_sha256_hex(payload: &[u8], secret: &str, signature: &str) -> bool {
    use hmac::{Hmac, Mac};
    use sha2::Sha256;

    type HmacSha256 = Hmac<Sha256>;
    let mut mac = match HmacSha256::new_from_slice(secret.as_bytes()) {
        Ok(v) => v,
        Err(_) => return false,
    };
    mac.update(payload);
    let computed = hex::encode(mac.finalize().into_bytes());
    secure_eq(
        computed.as_bytes(),
        signature.trim().to_lowercase().as_bytes(),
    )
}

pub fn secure_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter()
        .zip(b.iter())
        .fold(0_u8, |acc, (x, y)| acc | (x ^ y))
        == 0
}
