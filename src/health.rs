//! Health check module
//! Provides health status for the service and its storage backend

use serde::Serialize;
use std::collections::HashMap;
use std::time::Duration;
#[cfg(feature = "database")]
use std::time::Instant;
#[cfg(feature = "database")]
use tokio::time::timeout;
#[cfg(feature = "database")]
use tracing::{debug, error};

/// Health status response
#[derive(Debug, Serialize, Clone)]
pub struct HealthStatus {
    pub status: HealthState,
    pub version: &'static str,
    pub checks: HashMap<String, ComponentHealth>,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

/// Overall health state
#[derive(Debug, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum HealthState {
    Healthy,
    Degraded,
    Unhealthy,
}

/// Individual component health status
#[derive(Debug, Serialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct ComponentHealth {
    pub status: ComponentState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_time_ms: Option<u128>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

/// Component state
#[derive(Debug, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ComponentState {
    Up,
    Down,
    Warning,
}

impl HealthStatus {
    pub fn new() -> Self {
        Self {
            status: HealthState::Healthy,
            version: env!("CARGO_PKG_VERSION"),
            checks: HashMap::new(),
            timestamp: chrono::Utc::now(),
        }
    }

    pub fn is_healthy(&self) -> bool {
        !matches!(self.status, HealthState::Unhealthy)
    }
}

impl Default for HealthStatus {
    fn default() -> Self {
        Self::new()
    }
}

impl ComponentHealth {
    pub fn up(response_time_ms: Option<u128>) -> Self {
        Self {
            status: ComponentState::Up,
            response_time_ms,
            details: None,
        }
    }

    pub fn down(details: Option<String>) -> Self {
        Self {
            status: ComponentState::Down,
            response_time_ms: None,
            details,
        }
    }

    pub fn warning(response_time_ms: Option<u128>, details: Option<String>) -> Self {
        Self {
            status: ComponentState::Warning,
            response_time_ms,
            details,
        }
    }
}

/// Health checker for the service
#[derive(Clone)]
pub struct HealthChecker {
    #[cfg(feature = "database")]
    db_pool: Option<sqlx::PgPool>,
    #[cfg_attr(not(feature = "database"), allow(dead_code))]
    check_timeout: Duration,
}

impl HealthChecker {
    /// Checker for a service running on in-memory stores.
    pub fn in_memory() -> Self {
        Self {
            #[cfg(feature = "database")]
            db_pool: None,
            check_timeout: Duration::from_secs(5),
        }
    }

    #[cfg(feature = "database")]
    pub fn with_database(db_pool: sqlx::PgPool) -> Self {
        Self {
            db_pool: Some(db_pool),
            check_timeout: Duration::from_secs(5),
        }
    }

    /// Perform health check
    pub async fn check_health(&self) -> HealthStatus {
        let mut health_status = HealthStatus::new();
        let (name, component) = self.storage_component().await;
        health_status.checks.insert(name.to_string(), component);
        health_status.status = overall_state(&health_status.checks);
        health_status
    }

    #[cfg(feature = "database")]
    async fn storage_component(&self) -> (&'static str, ComponentHealth) {
        let Some(pool) = &self.db_pool else {
            return in_memory_component();
        };

        let component = match timeout(self.check_timeout, check_database_health(pool)).await {
            Ok(Ok(response_time)) => {
                debug!("Database health check: OK ({}ms)", response_time);
                if response_time > self.check_timeout.as_millis() / 2 {
                    ComponentHealth::warning(Some(response_time), Some("Slow response".to_string()))
                } else {
                    ComponentHealth::up(Some(response_time))
                }
            }
            Ok(Err(e)) => {
                error!("Database health check failed: {}", e);
                ComponentHealth::down(Some(e.to_string()))
            }
            Err(_) => {
                error!("Database health check timed out");
                ComponentHealth::down(Some("Timeout".to_string()))
            }
        };
        ("database", component)
    }

    #[cfg(not(feature = "database"))]
    async fn storage_component(&self) -> (&'static str, ComponentHealth) {
        in_memory_component()
    }
}

fn in_memory_component() -> (&'static str, ComponentHealth) {
    (
        "storage",
        ComponentHealth {
            status: ComponentState::Up,
            response_time_ms: None,
            details: Some("in-memory".to_string()),
        },
    )
}

fn overall_state(checks: &HashMap<String, ComponentHealth>) -> HealthState {
    if checks.values().any(|c| c.status == ComponentState::Down) {
        HealthState::Unhealthy
    } else if checks.values().any(|c| c.status == ComponentState::Warning) {
        HealthState::Degraded
    } else {
        HealthState::Healthy
    }
}

#[cfg(feature = "database")]
pub async fn check_database_health(
    pool: &sqlx::PgPool,
) -> Result<u128, crate::database::error::DatabaseError> {
    let start = Instant::now();
    crate::database::health_check(pool).await?;
    Ok(start.elapsed().as_millis())
}
