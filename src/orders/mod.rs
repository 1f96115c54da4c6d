pub mod error;
pub mod status_mapper;
pub mod types;

pub use error::{OrderError, OrderResult};
pub use types::{
    LineItem, NewOrder, Order, OrderPatch, OrderStatus, PaymentStatus, Product, User, UserSnapshot,
};
