use crate::payments::error::PaymentResult;
use crate::payments::types::{Charge, ChargeRequest, PaymentDetail};
use async_trait::async_trait;

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Creates a charge. Must be safe to call repeatedly with the same
    /// idempotency key.
    async fn create_charge(&self, request: ChargeRequest) -> PaymentResult<Charge>;

    async fn fetch_payment_detail(&self, payment_id: &str) -> PaymentResult<PaymentDetail>;

    fn name(&self) -> &'static str;
}
