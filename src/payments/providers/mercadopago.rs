use crate::config::MercadoPagoConfig;
use crate::orders::status_mapper::map_provider_status;
use crate::payments::error::{PaymentError, PaymentResult};
use crate::payments::provider::PaymentGateway;
use crate::payments::types::{Charge, ChargeRequest, PaymentDetail};
use crate::payments::utils::{verify_hmac_sha256_hex, PaymentHttpClient};
use async_trait::async_trait;
use bigdecimal::{BigDecimal, ToPrimitive};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::Value as JsonValue;
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, info};

const PROVIDER: &str = "mercadopago";

pub struct MercadoPagoGateway {
    config: MercadoPagoConfig,
    http: PaymentHttpClient,
}

impl MercadoPagoGateway {
    pub fn new(config: MercadoPagoConfig) -> PaymentResult<Self> {
        let http = PaymentHttpClient::new(PROVIDER, config.timeout(), config.max_retries)?;
        Ok(Self { config, http })
    }

    /// Shortens retry backoff; used by tests against a local mock server.
    pub fn with_retry_backoff(mut self, base_backoff: Duration) -> Self {
        self.http = self.http.with_base_backoff(base_backoff);
        self
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url.trim_end_matches('/'), path)
    }

    fn charge_payload(&self, request: &ChargeRequest) -> PaymentResult<JsonValue> {
        let amount = request
            .amount
            .round(2)
            .to_f64()
            .ok_or_else(|| PaymentError::ValidationError {
                message: format!("amount {} cannot be sent to the provider", request.amount),
                field: Some("amount".to_string()),
            })?;

        let mut payer = serde_json::json!({ "email": request.payer.email });
        if let Some(first_name) = &request.payer.first_name {
            payer["first_name"] = JsonValue::String(first_name.clone());
        }

        Ok(serde_json::json!({
            "transaction_amount": amount,
            "description": request.description,
            "payment_method_id": "pix",
            "payer": payer,
            "notification_url": self.config.notification_url,
            "external_reference": request.external_reference,
        }))
    }
}

#[async_trait]
impl PaymentGateway for MercadoPagoGateway {
    async fn create_charge(&self, request: ChargeRequest) -> PaymentResult<Charge> {
        request.validate()?;
        let payload = self.charge_payload(&request)?;

        let raw: MpPayment = self
            .http
            .request_json(
                reqwest::Method::POST,
                &self.endpoint("/v1/payments"),
                Some(&self.config.access_token),
                Some(&payload),
                &[("X-Idempotency-Key", request.idempotency_key.as_str())],
            )
            .await?;

        let gateway_payment_id = raw.payment_id()?;
        info!(
            payment_id = %gateway_payment_id,
            external_reference = %request.external_reference,
            status = %raw.status,
            "mercadopago pix charge created"
        );

        let transaction_data = raw
            .point_of_interaction
            .and_then(|poi| poi.transaction_data)
            .unwrap_or_default();

        Ok(Charge {
            gateway_payment_id,
            payment_status: map_provider_status(&raw.status),
            status: raw.status,
            amount: raw
                .transaction_amount
                .as_ref()
                .and_then(parse_amount)
                .unwrap_or(request.amount),
            qr_code: transaction_data.qr_code,
            qr_code_base64: transaction_data.qr_code_base64,
            ticket_url: transaction_data.ticket_url,
        })
    }

    async fn fetch_payment_detail(&self, payment_id: &str) -> PaymentResult<PaymentDetail> {
        let payment_id = payment_id.trim();
        if payment_id.is_empty() || !payment_id.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(PaymentError::ValidationError {
                message: format!("invalid payment id: {:?}", payment_id),
                field: Some("payment_id".to_string()),
            });
        }

        let raw: MpPayment = self
            .http
            .request_json(
                reqwest::Method::GET,
                &self.endpoint(&format!("/v1/payments/{}", payment_id)),
                Some(&self.config.access_token),
                None,
                &[],
            )
            .await?;

        debug!(payment_id = %payment_id, status = %raw.status, "mercadopago payment fetched");

        Ok(PaymentDetail {
            gateway_payment_id: raw.payment_id()?,
            amount: raw.transaction_amount.as_ref().and_then(parse_amount),
            date_approved: raw
                .date_approved
                .as_deref()
                .and_then(|v| DateTime::parse_from_rfc3339(v).ok())
                .map(|v| v.with_timezone(&Utc)),
            external_reference: raw.external_reference.filter(|v| !v.trim().is_empty()),
            status_detail: raw.status_detail,
            status: raw.status,
        })
    }

    fn name(&self) -> &'static str {
        PROVIDER
    }
}

/// Verifies an `x-signature` header (`ts=...,v1=...`) against the manifest
/// `id:{data.id};request-id:{x-request-id};ts:{ts};`. Parts whose value is
/// absent are left out of the manifest.
pub fn verify_signature(
    secret: &str,
    signature_header: &str,
    request_id: Option<&str>,
    data_id: Option<&str>,
) -> PaymentResult<()> {
    let mut ts = None;
    let mut v1 = None;
    for part in signature_header.split(',') {
        match part.split_once('=') {
            Some((key, value)) if key.trim() == "ts" => ts = Some(value.trim()),
            Some((key, value)) if key.trim() == "v1" => v1 = Some(value.trim()),
            _ => {}
        }
    }

    let (ts, v1) = match (ts, v1) {
        (Some(ts), Some(v1)) => (ts, v1),
        _ => {
            return Err(PaymentError::WebhookVerificationError {
                message: "x-signature header must carry ts and v1".to_string(),
            })
        }
    };

    let mut manifest = String::new();
    if let Some(id) = data_id.filter(|v| !v.is_empty()) {
        manifest.push_str(&format!("id:{};", id.to_lowercase()));
    }
    if let Some(request_id) = request_id.filter(|v| !v.is_empty()) {
        manifest.push_str(&format!("request-id:{};", request_id));
    }
    manifest.push_str(&format!("ts:{};", ts));

    if verify_hmac_sha256_hex(manifest.as_bytes(), secret, v1) {
        Ok(())
    } else {
        Err(PaymentError::WebhookVerificationError {
            message: "invalid mercadopago signature".to_string(),
        })
    }
}

fn parse_amount(value: &serde_json::Number) -> Option<BigDecimal> {
    BigDecimal::from_str(&value.to_string()).ok()
}

#[derive(Debug, Deserialize)]
struct MpPayment {
    id: JsonValue,
    #[serde(default)]
    status: String,
    #[serde(default)]
    status_detail: Option<String>,
    #[serde(default)]
    transaction_amount: Option<serde_json::Number>,
    #[serde(default)]
    external_reference: Option<String>,
    #[serde(default)]
    date_approved: Option<String>,
    #[serde(default)]
    point_of_interaction: Option<MpPointOfInteraction>,
}

impl MpPayment {
    fn payment_id(&self) -> PaymentResult<String> {
        match &self.id {
            JsonValue::Number(n) => Ok(n.to_string()),
            JsonValue::String(s) if !s.is_empty() => Ok(s.clone()),
            _ => Err(PaymentError::malformed_response(
                PROVIDER,
                "payment response carries no id",
            )),
        }
    }
}

#[derive(Debug, Deserialize)]
struct MpPointOfInteraction {
    #[serde(default)]
    transaction_data: Option<MpTransactionData>,
}

#[derive(Debug, Default, Deserialize)]
struct MpTransactionData {
    #[serde(default)]
    qr_code: Option<String>,
    #[serde(default)]
    qr_code_base64: Option<String>,
    #[serde(default)]
    ticket_url: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orders::types::PaymentStatus;
    use crate::payments::types::Payer;
    use httpmock::prelude::*;
    use serde_json::json;

    fn gateway(base_url: String, max_retries: u32) -> MercadoPagoGateway {
        MercadoPagoGateway::new(MercadoPagoConfig {
            access_token: "TEST-token".to_string(),
            base_url,
            notification_url: "https://food.example.com/webhook".to_string(),
            webhook_secret: None,
            timeout_secs: 5,
            max_retries,
            default_payer_email: "customer@example.com".to_string(),
        })
        .expect("gateway init should succeed")
        .with_retry_backoff(Duration::from_millis(1))
    }

    fn charge_request() -> ChargeRequest {
        ChargeRequest {
            amount: BigDecimal::from_str("250.00").unwrap(),
            description: "Payment for order 6f1c".to_string(),
            idempotency_key: "6f1c".to_string(),
            external_reference: "6f1c".to_string(),
            payer: Payer {
                email: "ana@example.com".to_string(),
                first_name: Some("Ana".to_string()),
            },
        }
    }

    #[tokio::test]
    async fn create_charge_sends_idempotency_key_and_reads_qr_code() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/v1/payments")
                    .header("authorization", "Bearer TEST-token")
                    .header("x-idempotency-key", "6f1c")
                    .body_contains("\"payment_method_id\":\"pix\"")
                    .body_contains("\"external_reference\":\"6f1c\"")
                    .body_contains("\"notification_url\":\"https://food.example.com/webhook\"");
                then.status(201).json_body(json!({
                    "id": 1319000001,
                    "status": "pending",
                    "status_detail": "pending_waiting_transfer",
                    "transaction_amount": 250.0,
                    "external_reference": "6f1c",
                    "point_of_interaction": {
                        "transaction_data": {
                            "qr_code": "00020126...",
                            "qr_code_base64": "iVBORw0KGgo=",
                            "ticket_url": "https://www.mercadopago.com.br/payments/1319000001/ticket"
                        }
                    }
                }));
            })
            .await;

        let charge = gateway(server.base_url(), 0)
            .create_charge(charge_request())
            .await
            .expect("charge should be created");

        mock.assert_async().await;
        assert_eq!(charge.gateway_payment_id, "1319000001");
        assert_eq!(charge.status, "pending");
        assert_eq!(charge.payment_status, PaymentStatus::Pending);
        assert_eq!(charge.amount, BigDecimal::from(250));
        assert_eq!(charge.qr_code.as_deref(), Some("00020126..."));
    }

    #[tokio::test]
    async fn client_error_is_fatal() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/v1/payments");
                then.status(400)
                    .json_body(json!({ "message": "invalid payer email", "status": 400 }));
            })
            .await;

        let err = gateway(server.base_url(), 2)
            .create_charge(charge_request())
            .await
            .unwrap_err();

        assert!(!err.is_retryable());
        assert!(matches!(err, PaymentError::ProviderError { .. }));
    }

    #[tokio::test]
    async fn server_error_is_retried_then_reported_as_retryable() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST).path("/v1/payments");
                then.status(503);
            })
            .await;

        let err = gateway(server.base_url(), 1)
            .create_charge(charge_request())
            .await
            .unwrap_err();

        assert_eq!(mock.hits_async().await, 2);
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn rate_limit_is_retryable() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/v1/payments");
                then.status(429);
            })
            .await;

        let err = gateway(server.base_url(), 0)
            .create_charge(charge_request())
            .await
            .unwrap_err();

        assert!(matches!(err, PaymentError::RateLimitError { .. }));
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn fetch_payment_detail_reads_reference_and_status() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET)
                    .path("/v1/payments/1319000001")
                    .header("authorization", "Bearer TEST-token");
                then.status(200).json_body(json!({
                    "id": 1319000001,
                    "status": "approved",
                    "status_detail": "accredited",
                    "transaction_amount": 99.9,
                    "external_reference": "b7b0c2a4-6a53-4c35-9d55-0b8f4c1f3e10",
                    "date_approved": "2024-05-02T10:20:30.000-04:00"
                }));
            })
            .await;

        let detail = gateway(server.base_url(), 0)
            .fetch_payment_detail("1319000001")
            .await
            .expect("detail should be fetched");

        assert_eq!(detail.status, "approved");
        assert_eq!(
            detail.external_reference.as_deref(),
            Some("b7b0c2a4-6a53-4c35-9d55-0b8f4c1f3e10")
        );
        assert_eq!(detail.amount, Some(BigDecimal::from_str("99.9").unwrap()));
        assert!(detail.date_approved.is_some());
    }

    #[tokio::test]
    async fn malformed_payment_id_is_rejected_before_any_request() {
        let gateway = gateway("http://127.0.0.1:9".to_string(), 0);
        let err = gateway.fetch_payment_detail("../admin").await.unwrap_err();
        assert!(matches!(err, PaymentError::ValidationError { .. }));
    }

    #[test]
    fn signature_verification_follows_manifest_format() {
        use hmac::{Hmac, Mac};
        use sha2::Sha256;

        let manifest = "id:123456;request-id:req-1;ts:1704908010;";
        let mut mac = Hmac::<Sha256>::new_from_slice(b"whsec").unwrap();
        mac.update(manifest.as_bytes());
        let v1 = hex::encode(mac.finalize().into_bytes());
        let header = format!("ts=1704908010,v1={}", v1);

        assert!(verify_signature("whsec", &header, Some("req-1"), Some("123456")).is_ok());
        assert!(verify_signature("whsec", &header, Some("req-2"), Some("123456")).is_err());
        assert!(verify_signature("whsec", "v1=abc", Some("req-1"), Some("123456")).is_err());
    }
}
