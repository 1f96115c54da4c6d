use async_trait::async_trait;
use uuid::Uuid;

use crate::database::error::DatabaseError;
use crate::orders::types::{NewOrder, Order, OrderPatch, OrderStatus, Product, User};

/// Decides, against the freshly locked order, which fields to write.
/// `None` leaves the order untouched.
pub type OrderMutation = Box<dyn FnOnce(&Order) -> Option<OrderPatch> + Send>;

/// Result of [`OrderStore::update_by_id`].
#[derive(Debug, Clone, PartialEq)]
pub struct UpdatedOrder {
    pub order: Order,
    /// `false` when the mutation declined to change anything.
    pub applied: bool,
}

#[async_trait]
pub trait OrderStore: Send + Sync {
    /// Persists a new order and returns it with its assigned id.
    async fn save(&self, order: NewOrder) -> Result<Order, DatabaseError>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Order>, DatabaseError>;

    /// Atomic read-modify-write of one order.
    ///
    /// `mutation` runs while the store holds the order exclusively, so two
    /// concurrent callers always observe each other's writes. Returns
    /// `None` if no order has this id.
    async fn update_by_id(
        &self,
        id: Uuid,
        mutation: OrderMutation,
    ) -> Result<Option<UpdatedOrder>, DatabaseError>;

    /// All orders, oldest first.
    async fn find_all(&self) -> Result<Vec<Order>, DatabaseError>;

    /// Orders whose status is in `statuses`, oldest first.
    async fn find_by_status(&self, statuses: &[OrderStatus]) -> Result<Vec<Order>, DatabaseError>;
}

#[async_trait]
pub trait UserDirectory: Send + Sync {
    async fn find_user_by_id(&self, id: &str) -> Result<Option<User>, DatabaseError>;
}

#[async_trait]
pub trait ProductCatalog: Send + Sync {
    async fn find_product_by_id(&self, id: &str) -> Result<Option<Product>, DatabaseError>;
}
