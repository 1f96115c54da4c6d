use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    Opened,
    Received,
    Preparing,
    Closed,
    Finished,
    Canceled,
}

impl OrderStatus {
    pub const ALL: [OrderStatus; 6] = [
        OrderStatus::Opened,
        OrderStatus::Received,
        OrderStatus::Preparing,
        OrderStatus::Closed,
        OrderStatus::Finished,
        OrderStatus::Canceled,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Opened => "OPENED",
            OrderStatus::Received => "RECEIVED",
            OrderStatus::Preparing => "PREPARING",
            OrderStatus::Closed => "CLOSED",
            OrderStatus::Finished => "FINISHED",
            OrderStatus::Canceled => "CANCELED",
        }
    }

    /// `FINISHED` and `CANCELED` accept no further transitions.
    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Finished | OrderStatus::Canceled)
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderStatus {
    type Err = StatusParseError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_uppercase();
        OrderStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == normalized)
            .ok_or_else(|| StatusParseError {
                kind: "order status",
                value: value.to_string(),
            })
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentStatus {
    Pending,
    Processing,
    Paid,
    Unpaid,
    Rejected,
    Canceled,
}

impl PaymentStatus {
    pub const ALL: [PaymentStatus; 6] = [
        PaymentStatus::Pending,
        PaymentStatus::Processing,
        PaymentStatus::Paid,
        PaymentStatus::Unpaid,
        PaymentStatus::Rejected,
        PaymentStatus::Canceled,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "PENDING",
            PaymentStatus::Processing => "PROCESSING",
            PaymentStatus::Paid => "PAID",
            PaymentStatus::Unpaid => "UNPAID",
            PaymentStatus::Rejected => "REJECTED",
            PaymentStatus::Canceled => "CANCELED",
        }
    }

    /// A settled status is a final answer from the provider and is never
    /// replaced by an in-flight one.
    pub fn is_settled(&self) -> bool {
        matches!(
            self,
            PaymentStatus::Paid | PaymentStatus::Rejected | PaymentStatus::Canceled
        )
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PaymentStatus {
    type Err = StatusParseError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_uppercase();
        PaymentStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == normalized)
            .ok_or_else(|| StatusParseError {
                kind: "payment status",
                value: value.to_string(),
            })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown {kind}: {value}")]
pub struct StatusParseError {
    pub kind: &'static str,
    pub value: String,
}

/// Entry of the user directory.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub email: Option<String>,
}

/// Entry of the product catalog.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub category: Option<String>,
    pub unit_price: BigDecimal,
}

/// User data captured on the order at creation time.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct UserSnapshot {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

impl From<&User> for UserSnapshot {
    fn from(user: &User) -> Self {
        Self {
            id: user.id.clone(),
            name: user.name.clone(),
            email: user.email.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct LineItem {
    pub product_id: String,
    pub product_name: String,
    pub quantity: u32,
    pub unit_price: BigDecimal,
}

impl LineItem {
    pub fn from_product(product: &Product, quantity: u32) -> Self {
        Self {
            product_id: product.id.clone(),
            product_name: product.name.clone(),
            quantity,
            unit_price: product.unit_price.clone(),
        }
    }

    pub fn subtotal(&self) -> BigDecimal {
        &self.unit_price * BigDecimal::from(self.quantity)
    }
}

/// An order that has not been persisted yet; the store assigns its id.
#[derive(Debug, Clone, PartialEq)]
pub struct NewOrder {
    pub user: UserSnapshot,
    pub line_items: Vec<LineItem>,
    pub created_at: DateTime<Utc>,
    pub order_status: OrderStatus,
    pub payment_status: PaymentStatus,
    pub total_amount: BigDecimal,
}

impl NewOrder {
    /// Builds an `OPENED`/`PENDING` order and fixes its total from the
    /// line item snapshots.
    pub fn open(user: UserSnapshot, line_items: Vec<LineItem>) -> Self {
        let total_amount = line_items
            .iter()
            .fold(BigDecimal::from(0), |acc, item| acc + item.subtotal());
        Self {
            user,
            line_items,
            created_at: Utc::now(),
            order_status: OrderStatus::Opened,
            payment_status: PaymentStatus::Pending,
            total_amount,
        }
    }

    pub fn into_order(self, id: Uuid) -> Order {
        Order {
            id,
            user: self.user,
            line_items: self.line_items,
            created_at: self.created_at,
            updated_at: self.created_at,
            order_status: self.order_status,
            payment_status: self.payment_status,
            total_amount: self.total_amount,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: Uuid,
    pub user: UserSnapshot,
    pub line_items: Vec<LineItem>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub order_status: OrderStatus,
    pub payment_status: PaymentStatus,
    pub total_amount: BigDecimal,
}

impl Order {
    pub fn is_terminal(&self) -> bool {
        self.order_status.is_terminal()
    }

    /// Applies a patch in place. Only stores call this, inside their
    /// update critical section.
    pub fn apply_patch(&mut self, patch: &OrderPatch) {
        if let Some(status) = patch.order_status {
            self.order_status = status;
        }
        if let Some(status) = patch.payment_status {
            self.payment_status = status;
        }
        self.updated_at = Utc::now();
    }
}

/// Status fields to overwrite in a single atomic update.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OrderPatch {
    pub order_status: Option<OrderStatus>,
    pub payment_status: Option<PaymentStatus>,
}

impl OrderPatch {
    pub fn is_empty(&self) -> bool {
        self.order_status.is_none() && self.payment_status.is_none()
    }
}
