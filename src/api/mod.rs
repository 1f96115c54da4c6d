//! HTTP surface: route wiring and the service-level handlers.

pub mod orders;
pub mod webhooks;

use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::request_id::{PropagateRequestIdLayer, SetRequestIdLayer};
use tracing::{error, info};

use crate::health::{HealthChecker, HealthStatus};
use crate::middleware::logging::{request_logging_middleware, UuidRequestId};
use crate::services::order_lifecycle::OrderLifecycleEngine;
use crate::services::webhook_processor::WebhookProcessor;

use self::orders::OrdersState;
use self::webhooks::WebhookState;

#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<OrderLifecycleEngine>,
    pub processor: Arc<WebhookProcessor>,
    pub health_checker: HealthChecker,
}

/// Builds the full router with request-id and request logging layers.
pub fn build_router(state: AppState) -> Router {
    let order_routes = orders::routes(OrdersState {
        engine: state.engine.clone(),
    });
    let webhook_routes = webhooks::routes(Arc::new(WebhookState {
        processor: state.processor.clone(),
    }));

    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .route("/health/ready", get(readiness))
        .route("/health/live", get(liveness))
        .with_state(state.health_checker)
        .merge(order_routes)
        .merge(webhook_routes)
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::x_request_id(UuidRequestId))
                .layer(axum::middleware::from_fn(request_logging_middleware))
                .layer(PropagateRequestIdLayer::x_request_id()),
        )
}

async fn root() -> &'static str {
    info!("📍 Root endpoint accessed");
    "Food Order Backend API"
}

async fn health(
    State(checker): State<HealthChecker>,
) -> Result<Json<HealthStatus>, (StatusCode, Json<HealthStatus>)> {
    let health_status = checker.check_health().await;

    if health_status.is_healthy() {
        Ok(Json(health_status))
    } else {
        error!("❌ Health check failed - service unhealthy");
        Err((StatusCode::SERVICE_UNAVAILABLE, Json(health_status)))
    }
}

/// Readiness probe - checks if the service is ready to accept traffic
async fn readiness(
    state: State<HealthChecker>,
) -> Result<Json<HealthStatus>, (StatusCode, Json<HealthStatus>)> {
    let result = health(state).await;
    if result.is_err() {
        error!("❌ Readiness check failed");
    }
    result
}

/// Liveness probe - the process answers, nothing else is checked
async fn liveness() -> &'static str {
    "OK"
}
