//! Order endpoints: creation, lookup, kitchen status changes and payment.

use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    routing::{get, post, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use crate::error::{AppError, AppResult, ValidationError};
use crate::middleware::error::get_request_id_from_headers;
use crate::orders::types::{Order, OrderStatus, PaymentStatus};
use crate::payments::types::Charge;
use crate::services::order_lifecycle::{CreateOrderRequest, OrderLifecycleEngine};

#[derive(Clone)]
pub struct OrdersState {
    pub engine: Arc<OrderLifecycleEngine>,
}

#[derive(Debug, Deserialize)]
pub struct ListOrdersQuery {
    /// Comma-separated order statuses (e.g. "OPENED,RECEIVED")
    pub status: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateStatusRequest {
    pub status: String,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentStatusResponse {
    pub order_id: Uuid,
    pub payment_status: PaymentStatus,
}

pub fn routes(state: OrdersState) -> Router {
    Router::new()
        .route("/orders", post(create_order).get(list_orders))
        .route("/orders/{id}", get(get_order))
        .route("/orders/{id}/status", put(update_order_status))
        .route("/orders/{id}/payment", post(initiate_payment))
        .route("/orders/{id}/payment-status", get(get_payment_status))
        .with_state(state)
}

/// Attaches the caller's request id to any error leaving a handler.
fn tagged(headers: &HeaderMap) -> impl Fn(AppError) -> AppError {
    let request_id = get_request_id_from_headers(headers);
    move |err| match &request_id {
        Some(id) => err.with_request_id(id.clone()),
        None => err,
    }
}

fn parse_order_id(raw: &str) -> AppResult<Uuid> {
    Uuid::parse_str(raw.trim()).map_err(|_| {
        AppError::validation(ValidationError::InvalidId {
            value: raw.to_string(),
        })
    })
}

fn parse_status_filter(raw: &str) -> AppResult<Vec<OrderStatus>> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse::<OrderStatus>().map_err(|_| {
                AppError::validation(ValidationError::InvalidStatus {
                    value: s.to_string(),
                })
            })
        })
        .collect()
}

/// POST /orders
pub async fn create_order(
    State(state): State<OrdersState>,
    headers: HeaderMap,
    payload: Result<Json<JsonValue>, JsonRejection>,
) -> AppResult<(StatusCode, Json<Order>)> {
    let tag = tagged(&headers);

    let Json(body) = payload.map_err(|e| {
        tag(AppError::validation(ValidationError::MalformedBody {
            reason: e.body_text(),
        }))
    })?;
    let request: CreateOrderRequest = serde_json::from_value(body).map_err(|e| {
        tag(AppError::validation(ValidationError::MalformedBody {
            reason: e.to_string(),
        }))
    })?;

    let order = state
        .engine
        .create_order(request)
        .await
        .map_err(|e| tag(e.into()))?;

    Ok((StatusCode::CREATED, Json(order)))
}

/// GET /orders?status=A,B
pub async fn list_orders(
    State(state): State<OrdersState>,
    headers: HeaderMap,
    Query(query): Query<ListOrdersQuery>,
) -> AppResult<Json<Vec<Order>>> {
    let tag = tagged(&headers);
    let filter = match query.status.as_deref() {
        Some(raw) => Some(parse_status_filter(raw).map_err(&tag)?),
        None => None,
    };

    let orders = state
        .engine
        .list_orders(filter.as_deref())
        .await
        .map_err(|e| tag(e.into()))?;

    info!(count = orders.len(), "Orders listed");
    Ok(Json(orders))
}

/// GET /orders/{id}
pub async fn get_order(
    State(state): State<OrdersState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> AppResult<Json<Order>> {
    let tag = tagged(&headers);
    let order_id = parse_order_id(&id).map_err(&tag)?;

    let order = state
        .engine
        .get_order(order_id)
        .await
        .map_err(|e| tag(e.into()))?;
    Ok(Json(order))
}

/// PUT /orders/{id}/status
pub async fn update_order_status(
    State(state): State<OrdersState>,
    headers: HeaderMap,
    Path(id): Path<String>,
    payload: Result<Json<UpdateStatusRequest>, JsonRejection>,
) -> AppResult<Json<Order>> {
    let tag = tagged(&headers);
    let order_id = parse_order_id(&id).map_err(&tag)?;
    let Json(request) = payload.map_err(|e| {
        tag(AppError::validation(ValidationError::MalformedBody {
            reason: e.body_text(),
        }))
    })?;
    let target: OrderStatus = request.status.parse().map_err(|_| {
        tag(AppError::validation(ValidationError::InvalidStatus {
            value: request.status.clone(),
        }))
    })?;

    let order = state
        .engine
        .update_order_status(order_id, target)
        .await
        .map_err(|e| tag(e.into()))?;
    Ok(Json(order))
}

/// POST /orders/{id}/payment
pub async fn initiate_payment(
    State(state): State<OrdersState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> AppResult<impl IntoResponse> {
    let tag = tagged(&headers);
    let order_id = parse_order_id(&id).map_err(&tag)?;

    let charge: Charge = state
        .engine
        .initiate_payment(order_id)
        .await
        .map_err(|e| tag(e.into()))?;
    Ok((StatusCode::CREATED, Json(charge)))
}

/// GET /orders/{id}/payment-status
pub async fn get_payment_status(
    State(state): State<OrdersState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> AppResult<Json<PaymentStatusResponse>> {
    let tag = tagged(&headers);
    let order_id = parse_order_id(&id).map_err(&tag)?;

    let payment_status = state
        .engine
        .get_payment_status(order_id)
        .await
        .map_err(|e| tag(e.into()))?;
    Ok(Json(PaymentStatusResponse {
        order_id,
        payment_status,
    }))
}
