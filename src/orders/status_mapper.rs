//! Status tables for payment reconciliation.
//!
//! Translates Mercado Pago payment statuses into [`PaymentStatus`], payment
//! outcomes into order-status targets, and holds the legal edge set of the
//! order state machine.

use crate::orders::types::{Order, OrderPatch, OrderStatus, PaymentStatus};

/// Maps a provider status string to the internal payment status.
///
/// Unrecognized values fall back to `PENDING`.
pub fn map_provider_status(provider_status: &str) -> PaymentStatus {
    match provider_status.trim().to_lowercase().as_str() {
        "approved" => PaymentStatus::Paid,
        "authorized" => PaymentStatus::Processing,
        "cancelled" => PaymentStatus::Canceled,
        "pending" => PaymentStatus::Pending,
        "in_process" | "in_mediation" => PaymentStatus::Processing,
        "rejected" => PaymentStatus::Rejected,
        _ => PaymentStatus::Pending,
    }
}

/// Order status a payment outcome drives the order towards, if any.
pub fn order_status_for_payment(payment_status: PaymentStatus) -> Option<OrderStatus> {
    match payment_status {
        PaymentStatus::Paid => Some(OrderStatus::Received),
        PaymentStatus::Rejected | PaymentStatus::Canceled => Some(OrderStatus::Canceled),
        PaymentStatus::Pending | PaymentStatus::Processing | PaymentStatus::Unpaid => None,
    }
}

/// Immediate successor on the fulfilment line.
fn next_in_line(status: OrderStatus) -> Option<OrderStatus> {
    match status {
        OrderStatus::Opened => Some(OrderStatus::Received),
        OrderStatus::Received => Some(OrderStatus::Preparing),
        OrderStatus::Preparing => Some(OrderStatus::Closed),
        OrderStatus::Closed => Some(OrderStatus::Finished),
        OrderStatus::Finished | OrderStatus::Canceled => None,
    }
}

pub fn can_transition(from: OrderStatus, to: OrderStatus) -> bool {
    if from.is_terminal() {
        return false;
    }
    to == OrderStatus::Canceled || next_in_line(from) == Some(to)
}

/// Decides what a reconciled payment status changes on `order`.
///
/// Returns `None` when nothing is to be written: the order is terminal, the
/// update would regress a settled payment, or both fields already hold the
/// derived values.
pub fn plan_payment_update(order: &Order, payment_status: PaymentStatus) -> Option<OrderPatch> {
    if order.is_terminal() {
        return None;
    }

    let mut patch = OrderPatch::default();

    let stale = order.payment_status.is_settled() && !payment_status.is_settled();
    if !stale && order.payment_status != payment_status {
        patch.payment_status = Some(payment_status);
    }

    if !stale {
        if let Some(target) = order_status_for_payment(payment_status) {
            if can_transition(order.order_status, target) {
                patch.order_status = Some(target);
            }
        }
    }

    if patch.is_empty() {
        None
    } else {
        Some(patch)
    }
}

/// Decides an operator-driven status change on `order`.
pub fn plan_status_update(order: &Order, target: OrderStatus) -> Option<OrderPatch> {
    if can_transition(order.order_status, target) {
        Some(OrderPatch {
            order_status: Some(target),
            payment_status: None,
        })
    } else {
        None
    }
}
