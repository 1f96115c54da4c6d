//! Order lifecycle and webhook reconciliation against in-memory stores.

mod common;

use bigdecimal::BigDecimal;
use futures::future::join_all;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use std::collections::HashMap;
use std::sync::atomic::Ordering;
use std::time::Duration;

use common::{fixture, fixture_with, order_request, MockGateway};
use food_order_backend::orders::{OrderError, OrderStatus, PaymentStatus, Product};
use food_order_backend::payments::{PaymentError, PaymentNotification};
use food_order_backend::services::{ReconciliationError, ReconciliationOutcome};

fn payment_notification(payment_id: &str) -> PaymentNotification {
    PaymentNotification {
        topic: Some("payment".to_string()),
        action: Some("payment.updated".to_string()),
        payment_id: Some(payment_id.to_string()),
    }
}

#[tokio::test]
async fn test_order_total_is_price_snapshot() {
    let f = fixture(MockGateway::new()).await;

    let order = f
        .engine
        .create_order(order_request(&[("p1", 2), ("p2", 1)]))
        .await
        .unwrap();

    assert_eq!(order.total_amount, BigDecimal::from(250));
    assert_eq!(order.order_status, OrderStatus::Opened);
    assert_eq!(order.payment_status, PaymentStatus::Pending);
    assert_eq!(order.line_items.len(), 2);

    f.catalog
        .upsert_product(Product {
            id: "p1".to_string(),
            name: "Product p1".to_string(),
            category: None,
            unit_price: BigDecimal::from(999),
        })
        .await;

    let reloaded = f.engine.get_order(order.id).await.unwrap();
    assert_eq!(reloaded.total_amount, BigDecimal::from(250));
    assert_eq!(reloaded.line_items[0].unit_price, BigDecimal::from(100));
}

#[tokio::test]
async fn test_invalid_orders_are_not_persisted() {
    let f = fixture(MockGateway::new()).await;

    let empty = f.engine.create_order(order_request(&[])).await;
    assert!(matches!(empty, Err(OrderError::InvalidInput { .. })));

    let zero = f.engine.create_order(order_request(&[("p1", 0)])).await;
    assert!(matches!(zero, Err(OrderError::InvalidInput { .. })));

    let missing = f
        .engine
        .create_order(order_request(&[("p1", 1), ("p404", 1)]))
        .await;
    assert!(matches!(missing, Err(OrderError::ProductNotFound(id)) if id == "p404"));

    assert!(f.store.is_empty().await);
}

#[tokio::test]
async fn test_approved_payment_marks_order_received() {
    let f = fixture(MockGateway::new()).await;
    let order = f
        .engine
        .create_order(order_request(&[("p1", 1)]))
        .await
        .unwrap();

    f.gateway
        .set_detail("2001", "approved", Some(order.id.to_string()));
    let outcome = f
        .processor
        .process_notification(&payment_notification("2001"), None, None)
        .await
        .unwrap();

    match outcome {
        ReconciliationOutcome::Applied(updated) => {
            assert_eq!(updated.payment_status, PaymentStatus::Paid);
            assert_eq!(updated.order_status, OrderStatus::Received);
        }
        other => panic!("expected applied, got {:?}", other),
    }

    let duplicate = f
        .processor
        .process_notification(&payment_notification("2001"), None, None)
        .await
        .unwrap();
    assert!(matches!(duplicate, ReconciliationOutcome::Unchanged(_)));

    let stored = f.engine.get_order(order.id).await.unwrap();
    assert_eq!(stored.payment_status, PaymentStatus::Paid);
    assert_eq!(stored.order_status, OrderStatus::Received);
}

#[tokio::test]
async fn test_rejected_payment_is_terminal() {
    let f = fixture(MockGateway::new()).await;
    let order = f
        .engine
        .create_order(order_request(&[("p2", 3)]))
        .await
        .unwrap();

    f.gateway
        .set_detail("3001", "rejected", Some(order.id.to_string()));
    f.processor
        .process_notification(&payment_notification("3001"), None, None)
        .await
        .unwrap();

    let rejected = f.engine.get_order(order.id).await.unwrap();
    assert_eq!(rejected.payment_status, PaymentStatus::Rejected);
    assert_eq!(rejected.order_status, OrderStatus::Canceled);

    f.gateway
        .set_detail("3002", "approved", Some(order.id.to_string()));
    let late = f
        .processor
        .process_notification(&payment_notification("3002"), None, None)
        .await
        .unwrap();
    assert!(matches!(late, ReconciliationOutcome::Unchanged(_)));

    let stored = f.engine.get_order(order.id).await.unwrap();
    assert_eq!(stored.payment_status, PaymentStatus::Rejected);
    assert_eq!(stored.order_status, OrderStatus::Canceled);
    assert_eq!(stored.updated_at, rejected.updated_at);

    let retry = f.engine.initiate_payment(order.id).await;
    assert!(matches!(retry, Err(OrderError::PaymentNotAllowed { .. })));
}

#[tokio::test]
async fn test_paid_notification_on_advanced_order_only_updates_payment() {
    let f = fixture(MockGateway::new()).await;
    let order = f
        .engine
        .create_order(order_request(&[("p1", 1)]))
        .await
        .unwrap();

    f.gateway
        .set_detail("4001", "in_process", Some(order.id.to_string()));
    f.processor
        .process_notification(&payment_notification("4001"), None, None)
        .await
        .unwrap();
    f.engine
        .update_order_status(order.id, OrderStatus::Received)
        .await
        .unwrap();
    f.engine
        .update_order_status(order.id, OrderStatus::Preparing)
        .await
        .unwrap();

    f.gateway
        .set_detail("4001", "approved", Some(order.id.to_string()));
    f.processor
        .process_notification(&payment_notification("4001"), None, None)
        .await
        .unwrap();

    let stored = f.engine.get_order(order.id).await.unwrap();
    assert_eq!(stored.payment_status, PaymentStatus::Paid);
    assert_eq!(stored.order_status, OrderStatus::Preparing);
}

#[tokio::test]
async fn test_concurrent_payment_initiation_creates_one_charge() {
    let f = fixture(MockGateway::slow(Duration::from_millis(20))).await;
    let order = f
        .engine
        .create_order(order_request(&[("p1", 2), ("p2", 1)]))
        .await
        .unwrap();

    let attempts = (0..8).map(|_| f.engine.initiate_payment(order.id));
    let charges: Vec<_> = join_all(attempts)
        .await
        .into_iter()
        .collect::<Result<_, _>>()
        .unwrap();

    assert_eq!(f.gateway.distinct_charges(), 1);
    let first = &charges[0];
    assert!(charges
        .iter()
        .all(|c| c.gateway_payment_id == first.gateway_payment_id));
    assert_eq!(first.amount, BigDecimal::from(250));

    let keys = f.gateway.keys();
    assert_eq!(keys.len(), 8);
    assert!(keys.iter().all(|key| *key == order.id.to_string()));

    let stored = f.engine.get_order(order.id).await.unwrap();
    assert_eq!(stored.payment_status, PaymentStatus::Pending);
}

#[tokio::test]
async fn test_concurrent_reconciliations_apply_once() {
    let f = fixture(MockGateway::new()).await;
    let order = f
        .engine
        .create_order(order_request(&[("p1", 1)]))
        .await
        .unwrap();
    f.gateway
        .set_detail("5001", "approved", Some(order.id.to_string()));

    let notification = payment_notification("5001");
    let runs = (0..10).map(|_| f.processor.process_notification(&notification, None, None));
    let outcomes = join_all(runs).await;

    let applied = outcomes
        .iter()
        .filter(|o| matches!(o, Ok(ReconciliationOutcome::Applied(_))))
        .count();
    let unchanged = outcomes
        .iter()
        .filter(|o| matches!(o, Ok(ReconciliationOutcome::Unchanged(_))))
        .count();
    assert_eq!(applied, 1);
    assert_eq!(unchanged, 9);

    let stored = f.engine.get_order(order.id).await.unwrap();
    assert_eq!(stored.order_status, OrderStatus::Received);
}

#[tokio::test]
async fn test_gateway_timeout_is_retryable() {
    let f = fixture_with(
        MockGateway::slow(Duration::from_millis(300)),
        Duration::from_millis(50),
        None,
    )
    .await;
    let order = f
        .engine
        .create_order(order_request(&[("p1", 1)]))
        .await
        .unwrap();

    let err = f.engine.initiate_payment(order.id).await.unwrap_err();
    assert!(matches!(err, OrderError::GatewayUnavailable(_)));
    assert!(err.is_retryable());

    let err = f
        .processor
        .process_notification(&payment_notification("6001"), None, None)
        .await
        .unwrap_err();
    assert!(err.is_retryable());

    let stored = f.engine.get_order(order.id).await.unwrap();
    assert_eq!(stored.payment_status, PaymentStatus::Pending);
}

#[tokio::test]
async fn test_gateway_rejection_is_fatal() {
    let f = fixture(MockGateway::failing(PaymentError::ProviderError {
        provider: "mock".to_string(),
        message: "invalid payer".to_string(),
        provider_code: Some("400".to_string()),
        retryable: false,
    }))
    .await;
    let order = f
        .engine
        .create_order(order_request(&[("p1", 1)]))
        .await
        .unwrap();

    let err = f.engine.initiate_payment(order.id).await.unwrap_err();
    assert!(matches!(err, OrderError::GatewayRejected(_)));
    assert!(!err.is_retryable());
}

#[tokio::test]
async fn test_unusable_notifications() {
    let f = fixture(MockGateway::new()).await;

    let merchant_order = PaymentNotification::from_parts(
        Some(&serde_json::json!({"type": "merchant_order", "data": {"id": "1"}})),
        &HashMap::new(),
    )
    .unwrap();
    let ignored = f
        .processor
        .process_notification(&merchant_order, None, None)
        .await
        .unwrap();
    assert!(matches!(ignored, ReconciliationOutcome::Ignored(_)));
    assert_eq!(f.gateway.detail_calls.load(Ordering::SeqCst), 0);

    f.gateway.set_detail("7001", "approved", None);
    let err = f
        .processor
        .process_notification(&payment_notification("7001"), None, None)
        .await
        .unwrap_err();
    assert!(matches!(err, ReconciliationError::MissingReference { .. }));

    f.gateway
        .set_detail("7002", "approved", Some(uuid::Uuid::new_v4().to_string()));
    let err = f
        .processor
        .process_notification(&payment_notification("7002"), None, None)
        .await
        .unwrap_err();
    assert!(matches!(err, ReconciliationError::OrderNotFound(_)));
    assert!(!err.is_retryable());
}

#[tokio::test]
async fn test_signed_notifications() {
    let secret = "webhook-secret";
    let f = fixture_with(
        MockGateway::new(),
        Duration::from_secs(5),
        Some(secret.to_string()),
    )
    .await;
    let order = f
        .engine
        .create_order(order_request(&[("p1", 1)]))
        .await
        .unwrap();
    f.gateway
        .set_detail("8001", "approved", Some(order.id.to_string()));
    let notification = payment_notification("8001");

    let unsigned = f
        .processor
        .process_notification(&notification, None, Some("req-1"))
        .await
        .unwrap_err();
    assert!(matches!(unsigned, ReconciliationError::InvalidSignature(_)));

    let forged = f
        .processor
        .process_notification(&notification, Some("ts=1700000000,v1=deadbeef"), Some("req-1"))
        .await
        .unwrap_err();
    assert!(matches!(forged, ReconciliationError::InvalidSignature(_)));
    assert_eq!(f.gateway.detail_calls.load(Ordering::SeqCst), 0);

    let manifest = "id:8001;request-id:req-1;ts:1700000000;";
    let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes()).unwrap();
    mac.update(manifest.as_bytes());
    let header = format!("ts=1700000000,v1={}", hex::encode(mac.finalize().into_bytes()));

    let outcome = f
        .processor
        .process_notification(&notification, Some(&header), Some("req-1"))
        .await
        .unwrap();
    assert!(matches!(outcome, ReconciliationOutcome::Applied(_)));
}
