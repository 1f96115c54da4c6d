//! Shared fixtures for integration tests.
#![allow(dead_code)]

use async_trait::async_trait;
use bigdecimal::BigDecimal;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use food_order_backend::database::memory::{InMemoryCatalog, InMemoryOrderStore};
use food_order_backend::orders::{PaymentStatus, Product, User};
use food_order_backend::payments::{
    Charge, ChargeRequest, PaymentDetail, PaymentError, PaymentGateway, PaymentResult,
};
use food_order_backend::services::{
    CreateOrderRequest, EngineConfig, LineItemRequest, OrderLifecycleEngine, WebhookProcessor,
};

/// Gateway double. Charges are deduplicated by idempotency key, the way
/// the real provider behaves.
#[derive(Default)]
pub struct MockGateway {
    pub create_calls: AtomicUsize,
    pub detail_calls: AtomicUsize,
    keys: Mutex<Vec<String>>,
    charges: Mutex<HashMap<String, Charge>>,
    details: Mutex<HashMap<String, PaymentDetail>>,
    delay: Mutex<Option<Duration>>,
    fail_with: Option<PaymentError>,
}

impl MockGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn slow(delay: Duration) -> Self {
        Self {
            delay: Mutex::new(Some(delay)),
            ..Self::default()
        }
    }

    /// Changes the latency of every later call; `None` makes it answer at once.
    pub fn set_delay(&self, delay: Option<Duration>) {
        *self.delay.lock().unwrap() = delay;
    }

    async fn stall(&self) {
        let delay = *self.delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
    }

    pub fn failing(err: PaymentError) -> Self {
        Self {
            fail_with: Some(err),
            ..Self::default()
        }
    }

    /// Registers what the provider reports for `payment_id`.
    pub fn set_detail(&self, payment_id: &str, status: &str, external_reference: Option<String>) {
        self.details.lock().unwrap().insert(
            payment_id.to_string(),
            PaymentDetail {
                gateway_payment_id: payment_id.to_string(),
                status: status.to_string(),
                status_detail: None,
                external_reference,
                amount: None,
                date_approved: None,
            },
        );
    }

    pub fn keys(&self) -> Vec<String> {
        self.keys.lock().unwrap().clone()
    }

    pub fn distinct_charges(&self) -> usize {
        self.charges.lock().unwrap().len()
    }
}

#[async_trait]
impl PaymentGateway for MockGateway {
    async fn create_charge(&self, request: ChargeRequest) -> PaymentResult<Charge> {
        self.create_calls.fetch_add(1, Ordering::SeqCst);
        self.keys
            .lock()
            .unwrap()
            .push(request.idempotency_key.clone());
        self.stall().await;
        if let Some(err) = &self.fail_with {
            return Err(err.clone());
        }

        let mut charges = self.charges.lock().unwrap();
        let next_id = charges.len() + 1000;
        let charge = charges
            .entry(request.idempotency_key.clone())
            .or_insert_with(|| Charge {
                gateway_payment_id: next_id.to_string(),
                status: "pending".to_string(),
                payment_status: PaymentStatus::Pending,
                amount: request.amount.clone(),
                qr_code: Some("00020126-pix-copia-e-cola".to_string()),
                qr_code_base64: None,
                ticket_url: None,
            });
        Ok(charge.clone())
    }

    async fn fetch_payment_detail(&self, payment_id: &str) -> PaymentResult<PaymentDetail> {
        self.detail_calls.fetch_add(1, Ordering::SeqCst);
        self.stall().await;
        if let Some(err) = &self.fail_with {
            return Err(err.clone());
        }
        self.details
            .lock()
            .unwrap()
            .get(payment_id)
            .cloned()
            .ok_or_else(|| PaymentError::ProviderError {
                provider: "mock".to_string(),
                message: format!("payment {} not found", payment_id),
                provider_code: Some("404".to_string()),
                retryable: false,
            })
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}

pub struct Fixture {
    pub engine: Arc<OrderLifecycleEngine>,
    pub processor: Arc<WebhookProcessor>,
    pub store: InMemoryOrderStore,
    pub catalog: Arc<InMemoryCatalog>,
    pub gateway: Arc<MockGateway>,
}

pub async fn fixture(gateway: MockGateway) -> Fixture {
    fixture_with(gateway, Duration::from_secs(5), None).await
}

/// Catalog: user `u1` (no email), `p1` at 100 and `p2` at 50.
pub async fn fixture_with(
    gateway: MockGateway,
    gateway_timeout: Duration,
    webhook_secret: Option<String>,
) -> Fixture {
    let store = InMemoryOrderStore::new();
    let catalog = Arc::new(InMemoryCatalog::new());
    catalog
        .insert_user(User {
            id: "u1".to_string(),
            name: "Ana".to_string(),
            email: None,
        })
        .await;
    for (id, price) in [("p1", 100), ("p2", 50)] {
        catalog
            .upsert_product(Product {
                id: id.to_string(),
                name: format!("Product {}", id),
                category: Some("mains".to_string()),
                unit_price: BigDecimal::from(price),
            })
            .await;
    }

    let gateway = Arc::new(gateway);
    let engine = Arc::new(OrderLifecycleEngine::new(
        Arc::new(store.clone()),
        catalog.clone(),
        catalog.clone(),
        gateway.clone(),
        EngineConfig {
            gateway_timeout,
            ..EngineConfig::default()
        },
    ));
    let processor = Arc::new(WebhookProcessor::new(engine.clone(), webhook_secret));

    Fixture {
        engine,
        processor,
        store,
        catalog,
        gateway,
    }
}

pub fn order_request(items: &[(&str, i64)]) -> CreateOrderRequest {
    CreateOrderRequest {
        user_id: "u1".to_string(),
        line_items: items
            .iter()
            .map(|(product_id, quantity)| LineItemRequest {
                product_id: product_id.to_string(),
                quantity: *quantity,
            })
            .collect(),
    }
}
