use anyhow::Context;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal;
use tracing::{error, info, warn};

use food_order_backend::api::{build_router, AppState};
use food_order_backend::config::AppConfig;
use food_order_backend::database::memory::{InMemoryCatalog, InMemoryOrderStore};
use food_order_backend::database::repository::{OrderStore, ProductCatalog, UserDirectory};
use food_order_backend::health::HealthChecker;
use food_order_backend::logging::init_tracing;
use food_order_backend::payments::{MercadoPagoGateway, PaymentGateway};
use food_order_backend::services::{EngineConfig, OrderLifecycleEngine, WebhookProcessor};

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received, starting graceful shutdown");
}

struct Storage {
    orders: Arc<dyn OrderStore>,
    users: Arc<dyn UserDirectory>,
    catalog: Arc<dyn ProductCatalog>,
    health_checker: HealthChecker,
}

async fn in_memory_storage(config: &AppConfig) -> anyhow::Result<Storage> {
    let catalog = match &config.catalog_seed_file {
        Some(path) => {
            let raw = tokio::fs::read_to_string(path)
                .await
                .with_context(|| format!("failed to read catalog seed file {}", path))?;
            let catalog = InMemoryCatalog::from_seed_json(&raw)
                .with_context(|| format!("invalid catalog seed file {}", path))?;
            let (users, products) = catalog.counts().await;
            info!(users, products, path = %path, "📦 Catalog seeded");
            catalog
        }
        None => {
            warn!("⚠️  No catalog seed file configured, catalog starts empty");
            InMemoryCatalog::new()
        }
    };
    let catalog = Arc::new(catalog);

    Ok(Storage {
        orders: Arc::new(InMemoryOrderStore::new()),
        users: catalog.clone(),
        catalog,
        health_checker: HealthChecker::in_memory(),
    })
}

#[cfg(feature = "database")]
async fn init_storage(config: &AppConfig) -> anyhow::Result<Storage> {
    use food_order_backend::database::catalog_repository::PgCatalogRepository;
    use food_order_backend::database::order_repository::PgOrderRepository;
    use food_order_backend::database::{init_pool_from_config, run_migrations};

    let Some(db_config) = &config.database else {
        info!("💾 No DATABASE_URL set, using in-memory stores");
        return in_memory_storage(config).await;
    };

    info!("🗄️  Initializing database connection pool...");
    let pool = init_pool_from_config(db_config).await.map_err(|e| {
        error!("❌ Failed to connect to database: {}", e);
        anyhow::anyhow!(e)
    })?;
    info!("✅ Database connection pool initialized");

    if db_config.run_migrations {
        run_migrations(&pool).await.map_err(|e| anyhow::anyhow!(e))?;
    }

    let catalog = Arc::new(PgCatalogRepository::new(pool.clone()));
    Ok(Storage {
        orders: Arc::new(PgOrderRepository::new(pool.clone())),
        users: catalog.clone(),
        catalog,
        health_checker: HealthChecker::with_database(pool),
    })
}

#[cfg(not(feature = "database"))]
async fn init_storage(config: &AppConfig) -> anyhow::Result<Storage> {
    if config.database.is_some() {
        warn!("⚠️  DATABASE_URL is set but the database feature is disabled");
    }
    in_memory_storage(config).await
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::from_env().context("failed to load configuration")?;
    init_tracing(&config.logging);
    config.validate().map_err(|e| {
        error!("❌ Invalid configuration: {}", e);
        anyhow::anyhow!(e)
    })?;

    info!(
        version = env!("CARGO_PKG_VERSION"),
        host = %config.server.host,
        port = config.server.port,
        "🚀 Starting food order backend"
    );

    let storage = init_storage(&config).await?;

    info!("💳 Initializing Mercado Pago gateway...");
    let gateway: Arc<dyn PaymentGateway> = Arc::new(
        MercadoPagoGateway::new(config.mercadopago.clone())
            .map_err(|e| anyhow::anyhow!("failed to build payment gateway: {}", e))?,
    );
    info!(
        notification_url = %config.mercadopago.notification_url,
        signature_check = config.mercadopago.webhook_secret.is_some(),
        "✅ Payment gateway ready"
    );

    let engine = Arc::new(OrderLifecycleEngine::new(
        storage.orders,
        storage.users,
        storage.catalog,
        gateway,
        EngineConfig {
            gateway_timeout: config.mercadopago.timeout(),
            default_payer_email: config.mercadopago.default_payer_email.clone(),
        },
    ));
    let processor = Arc::new(WebhookProcessor::new(
        engine.clone(),
        config.mercadopago.webhook_secret.clone(),
    ));

    info!("🛣️  Setting up application routes...");
    let app = build_router(AppState {
        engine,
        processor,
        health_checker: storage.health_checker,
    });
    info!("✅ Routes configured");

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .with_context(|| {
            format!(
                "invalid listen address {}:{}",
                config.server.host, config.server.port
            )
        })?;
    let listener = tokio::net::TcpListener::bind(addr).await.map_err(|e| {
        error!("❌ Failed to bind to address {}: {}", addr, e);
        e
    })?;

    info!(address = %addr, "🚀 Server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("👋 Server shut down gracefully");
    Ok(())
}
