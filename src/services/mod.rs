//! Services module for business logic and integrations

pub mod order_lifecycle;
pub mod webhook_processor;

pub use order_lifecycle::{CreateOrderRequest, EngineConfig, LineItemRequest, OrderLifecycleEngine};
pub use webhook_processor::{ReconciliationError, ReconciliationOutcome, WebhookProcessor};
