//! Order Lifecycle Engine
//!
//! Creates orders against the catalog with a price snapshot, starts Pix
//! charges through the payment gateway and applies reconciled payment
//! outcomes to the order state machine.

use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::database::repository::{OrderStore, ProductCatalog, UpdatedOrder, UserDirectory};
use crate::logging::mask_email;
use crate::middleware::logging::log_external_call;
use crate::orders::error::{OrderError, OrderResult};
use crate::orders::status_mapper::{plan_payment_update, plan_status_update};
use crate::orders::types::{LineItem, NewOrder, Order, OrderStatus, PaymentStatus, UserSnapshot};
use crate::payments::provider::PaymentGateway;
use crate::payments::types::{Charge, ChargeRequest, Payer};
use crate::payments::utils::bounded;

/// Requested line: a product reference and a quantity.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct LineItemRequest {
    pub product_id: String,
    pub quantity: i64,
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrderRequest {
    pub user_id: String,
    #[serde(alias = "products")]
    pub line_items: Vec<LineItemRequest>,
}

#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Hard deadline for every gateway call.
    pub gateway_timeout: Duration,
    /// Used when the ordering user has no email on file.
    pub default_payer_email: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            gateway_timeout: Duration::from_secs(10),
            default_payer_email: "customer@example.com".to_string(),
        }
    }
}

pub struct OrderLifecycleEngine {
    store: Arc<dyn OrderStore>,
    users: Arc<dyn UserDirectory>,
    catalog: Arc<dyn ProductCatalog>,
    gateway: Arc<dyn PaymentGateway>,
    config: EngineConfig,
}

impl OrderLifecycleEngine {
    pub fn new(
        store: Arc<dyn OrderStore>,
        users: Arc<dyn UserDirectory>,
        catalog: Arc<dyn ProductCatalog>,
        gateway: Arc<dyn PaymentGateway>,
        config: EngineConfig,
    ) -> Self {
        Self {
            store,
            users,
            catalog,
            gateway,
            config,
        }
    }

    pub fn gateway(&self) -> &Arc<dyn PaymentGateway> {
        &self.gateway
    }

    pub fn gateway_timeout(&self) -> Duration {
        self.config.gateway_timeout
    }

    fn validate(request: &CreateOrderRequest) -> OrderResult<Vec<(String, u32)>> {
        let user_id = request.user_id.trim();
        if user_id.is_empty() {
            return Err(OrderError::invalid("userId is required", "userId"));
        }
        if request.line_items.is_empty() {
            return Err(OrderError::invalid(
                "lineItems must contain at least one item",
                "lineItems",
            ));
        }

        request
            .line_items
            .iter()
            .enumerate()
            .map(|(index, item)| {
                let product_id = item.product_id.trim();
                if product_id.is_empty() {
                    return Err(OrderError::invalid(
                        format!("lineItems[{}].productId is required", index),
                        format!("lineItems[{}].productId", index),
                    ));
                }
                let quantity = u32::try_from(item.quantity)
                    .ok()
                    .filter(|q| *q > 0)
                    .ok_or_else(|| {
                        OrderError::invalid(
                            format!(
                                "lineItems[{}].quantity must be a positive integer, got {}",
                                index, item.quantity
                            ),
                            format!("lineItems[{}].quantity", index),
                        )
                    })?;
                Ok((product_id.to_string(), quantity))
            })
            .collect()
    }

    /// Validates, resolves and persists a new order.
    ///
    /// Products are resolved in request order; the first missing one aborts
    /// the call. Nothing is written unless every lookup succeeds.
    pub async fn create_order(&self, request: CreateOrderRequest) -> OrderResult<Order> {
        let lines = Self::validate(&request)?;
        let user_id = request.user_id.trim();

        let user = self
            .users
            .find_user_by_id(user_id)
            .await?
            .ok_or_else(|| OrderError::UserNotFound(user_id.to_string()))?;

        let mut line_items = Vec::with_capacity(lines.len());
        for (product_id, quantity) in lines {
            let product = self
                .catalog
                .find_product_by_id(&product_id)
                .await?
                .ok_or(OrderError::ProductNotFound(product_id))?;
            line_items.push(LineItem::from_product(&product, quantity));
        }

        let order = self
            .store
            .save(NewOrder::open(UserSnapshot::from(&user), line_items))
            .await?;

        info!(
            order_id = %order.id,
            user_id = %order.user.id,
            items = order.line_items.len(),
            total = %order.total_amount,
            "Order created"
        );
        Ok(order)
    }

    /// Starts a Pix charge for the order. The order id doubles as the
    /// idempotency key, so retries never create a second charge. The order
    /// itself is not modified; its payment status changes only through
    /// reconciliation.
    pub async fn initiate_payment(&self, order_id: Uuid) -> OrderResult<Charge> {
        let order = self.get_order(order_id).await?;

        if order.is_terminal() {
            return Err(OrderError::PaymentNotAllowed {
                order_id,
                reason: format!("order is {}", order.order_status),
            });
        }
        if order.payment_status == PaymentStatus::Paid {
            return Err(OrderError::PaymentNotAllowed {
                order_id,
                reason: "order is already paid".to_string(),
            });
        }

        let request = ChargeRequest {
            amount: order.total_amount.clone(),
            description: format!("Payment for order {}", order.id),
            idempotency_key: order.id.to_string(),
            external_reference: order.id.to_string(),
            payer: Payer {
                email: order
                    .user
                    .email
                    .clone()
                    .filter(|email| !email.trim().is_empty())
                    .unwrap_or_else(|| self.config.default_payer_email.clone()),
                first_name: Some(order.user.name.clone()),
            },
        };

        let payer = mask_email(&request.payer.email);
        let charge = log_external_call(
            self.gateway.name(),
            "create charge",
            bounded(
                self.config.gateway_timeout,
                "create charge",
                self.gateway.create_charge(request),
            ),
        )
        .await
        .map_err(|e| {
            warn!(
                order_id = %order_id,
                gateway = self.gateway.name(),
                retryable = e.is_retryable(),
                error = %e,
                "Payment initiation failed"
            );
            OrderError::from(e)
        })?;

        info!(
            order_id = %order_id,
            payment_id = %charge.gateway_payment_id,
            status = %charge.status,
            payer = %payer,
            "Payment initiated"
        );
        Ok(charge)
    }

    /// Applies a reconciled payment status to the order in one atomic
    /// update. Terminal orders are returned unchanged.
    pub async fn apply_payment_update(
        &self,
        order_id: Uuid,
        payment_status: PaymentStatus,
    ) -> OrderResult<UpdatedOrder> {
        let updated = self
            .store
            .update_by_id(
                order_id,
                Box::new(move |order| plan_payment_update(order, payment_status)),
            )
            .await?
            .ok_or(OrderError::OrderNotFound(order_id))?;

        if updated.applied {
            info!(
                order_id = %order_id,
                payment_status = %updated.order.payment_status,
                order_status = %updated.order.order_status,
                "Payment update applied"
            );
        } else {
            debug!(
                order_id = %order_id,
                incoming = %payment_status,
                payment_status = %updated.order.payment_status,
                order_status = %updated.order.order_status,
                "Payment update left order unchanged"
            );
        }
        Ok(updated)
    }

    pub async fn get_order(&self, order_id: Uuid) -> OrderResult<Order> {
        self.store
            .find_by_id(order_id)
            .await?
            .ok_or(OrderError::OrderNotFound(order_id))
    }

    /// Lists orders oldest first. Without a filter, finished orders are
    /// left out.
    pub async fn list_orders(&self, statuses: Option<&[OrderStatus]>) -> OrderResult<Vec<Order>> {
        let orders = match statuses {
            Some(statuses) if !statuses.is_empty() => self.store.find_by_status(statuses).await?,
            _ => {
                let active: Vec<OrderStatus> = OrderStatus::ALL
                    .into_iter()
                    .filter(|status| *status != OrderStatus::Finished)
                    .collect();
                self.store.find_by_status(&active).await?
            }
        };
        Ok(orders)
    }

    /// Operator-driven status change along the order state machine.
    pub async fn update_order_status(
        &self,
        order_id: Uuid,
        target: OrderStatus,
    ) -> OrderResult<Order> {
        let updated = self
            .store
            .update_by_id(
                order_id,
                Box::new(move |order| plan_status_update(order, target)),
            )
            .await?
            .ok_or(OrderError::OrderNotFound(order_id))?;

        let order = updated.order;
        if updated.applied {
            info!(order_id = %order_id, order_status = %order.order_status, "Order status updated");
            return Ok(order);
        }

        if order.is_terminal() || order.order_status == target {
            return Ok(order);
        }

        Err(OrderError::InvalidTransition {
            from: order.order_status,
            to: target,
        })
    }

    pub async fn get_payment_status(&self, order_id: Uuid) -> OrderResult<PaymentStatus> {
        Ok(self.get_order(order_id).await?.payment_status)
    }
}
