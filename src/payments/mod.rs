pub mod error;
pub mod provider;
pub mod providers;
pub mod types;
pub mod utils;

pub use error::{PaymentError, PaymentResult};
pub use provider::PaymentGateway;
pub use providers::MercadoPagoGateway;
pub use types::{Charge, ChargeRequest, Payer, PaymentDetail, PaymentNotification};
