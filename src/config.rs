//! Application configuration module
//! Handles environment variable loading, configuration validation, and application settings

use std::env;
use std::time::Duration;

/// Main application configuration
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub server: ServerConfig,
    /// `None` runs the service on in-memory stores.
    pub database: Option<DatabaseConfig>,
    pub logging: LoggingConfig,
    pub mercadopago: MercadoPagoConfig,
    pub catalog_seed_file: Option<String>,
}

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

/// Database configuration
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub connection_timeout: u64,   // seconds
    pub idle_timeout: Option<u64>, // seconds
    pub run_migrations: bool,
}

/// Logging configuration
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

/// Log format options
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogFormat {
    Json,
    Plain,
}

/// Mercado Pago gateway configuration
#[derive(Debug, Clone)]
pub struct MercadoPagoConfig {
    pub access_token: String,
    pub base_url: String,
    /// Callback URL sent with every charge.
    pub notification_url: String,
    /// Enables `x-signature` verification on incoming notifications.
    pub webhook_secret: Option<String>,
    pub timeout_secs: u64,
    pub max_retries: u32,
    pub default_payer_email: String,
}

impl MercadoPagoConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl AppConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if it exists
        let _ = dotenv::dotenv().ok();

        let database = match env::var("DATABASE_URL") {
            Ok(url) if !url.trim().is_empty() => Some(DatabaseConfig::from_env(url)?),
            _ => None,
        };

        Ok(AppConfig {
            server: ServerConfig::from_env()?,
            database,
            logging: LoggingConfig::from_env()?,
            mercadopago: MercadoPagoConfig::from_env()?,
            catalog_seed_file: env::var("CATALOG_SEED_FILE")
                .ok()
                .filter(|path| !path.trim().is_empty()),
        })
    }

    /// Validate the entire configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.server.validate()?;
        if let Some(database) = &self.database {
            database.validate()?;
        }
        self.logging.validate()?;
        self.mercadopago.validate()?;

        Ok(())
    }
}

fn parse_var<T: std::str::FromStr>(name: &str, default: &str) -> Result<T, ConfigError> {
    env::var(name)
        .unwrap_or_else(|_| default.to_string())
        .trim()
        .parse()
        .map_err(|_| ConfigError::InvalidValue(name.to_string()))
}

fn is_http_url(url: &str) -> bool {
    url.starts_with("http://") || url.starts_with("https://")
}

impl ServerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(ServerConfig {
            host: env::var("SERVER_HOST").unwrap_or_else(|_| "127.0.0.1".to_string()),
            port: parse_var("SERVER_PORT", "8000")?,
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.port == 0 {
            return Err(ConfigError::InvalidValue(
                "SERVER_PORT cannot be 0".to_string(),
            ));
        }

        if self.host.is_empty() {
            return Err(ConfigError::InvalidValue(
                "SERVER_HOST cannot be empty".to_string(),
            ));
        }

        Ok(())
    }
}

impl DatabaseConfig {
    pub fn from_env(url: String) -> Result<Self, ConfigError> {
        Ok(DatabaseConfig {
            url,
            max_connections: parse_var("DB_MAX_CONNECTIONS", "20")?,
            min_connections: parse_var("DB_MIN_CONNECTIONS", "5")?,
            connection_timeout: parse_var("DB_CONNECTION_TIMEOUT", "30")?,
            idle_timeout: env::var("DB_IDLE_TIMEOUT")
                .ok()
                .and_then(|val| val.parse().ok()),
            run_migrations: parse_var("DB_RUN_MIGRATIONS", "true")?,
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.url.is_empty() {
            return Err(ConfigError::InvalidValue("DATABASE_URL".to_string()));
        }

        if self.max_connections == 0 {
            return Err(ConfigError::InvalidValue("DB_MAX_CONNECTIONS".to_string()));
        }

        if self.min_connections > self.max_connections {
            return Err(ConfigError::InvalidValue(
                "DB_MIN_CONNECTIONS must be <= DB_MAX_CONNECTIONS".to_string(),
            ));
        }

        Ok(())
    }
}

impl LoggingConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(LoggingConfig {
            level: env::var("LOG_LEVEL").unwrap_or_else(|_| "INFO".to_string()),
            format: match env::var("LOG_FORMAT")
                .unwrap_or_else(|_| "plain".to_string())
                .to_lowercase()
                .as_str()
            {
                "json" => LogFormat::Json,
                _ => LogFormat::Plain,
            },
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let valid_levels = ["TRACE", "DEBUG", "INFO", "WARN", "ERROR"];
        if !valid_levels.contains(&self.level.to_uppercase().as_str()) {
            return Err(ConfigError::InvalidValue("LOG_LEVEL".to_string()));
        }

        Ok(())
    }
}

/// Picks the callback URL: an explicit one wins, otherwise the public base
/// URL with `/webhook` appended.
pub fn resolve_notification_url(
    explicit: Option<String>,
    public_base_url: Option<String>,
) -> Option<String> {
    explicit
        .filter(|url| !url.trim().is_empty())
        .or_else(|| {
            public_base_url
                .filter(|base| !base.trim().is_empty())
                .map(|base| format!("{}/webhook", base.trim().trim_end_matches('/')))
        })
}

impl MercadoPagoConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let notification_url = resolve_notification_url(
            env::var("PAYMENT_NOTIFICATION_URL").ok(),
            env::var("PUBLIC_BASE_URL").ok(),
        )
        .ok_or_else(|| {
            ConfigError::MissingVariable("PAYMENT_NOTIFICATION_URL or PUBLIC_BASE_URL".to_string())
        })?;

        Ok(MercadoPagoConfig {
            access_token: env::var("MERCADOPAGO_ACCESS_TOKEN")
                .map_err(|_| ConfigError::MissingVariable("MERCADOPAGO_ACCESS_TOKEN".to_string()))?,
            base_url: env::var("MERCADOPAGO_BASE_URL")
                .unwrap_or_else(|_| "https://api.mercadopago.com".to_string()),
            notification_url,
            webhook_secret: env::var("MERCADOPAGO_WEBHOOK_SECRET")
                .ok()
                .filter(|secret| !secret.is_empty()),
            timeout_secs: parse_var("MERCADOPAGO_TIMEOUT_SECS", "10")?,
            max_retries: parse_var("MERCADOPAGO_MAX_RETRIES", "2")?,
            default_payer_email: env::var("DEFAULT_PAYER_EMAIL")
                .unwrap_or_else(|_| "customer@example.com".to_string()),
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.access_token.trim().is_empty() {
            return Err(ConfigError::InvalidValue(
                "MERCADOPAGO_ACCESS_TOKEN".to_string(),
            ));
        }

        if !is_http_url(&self.base_url) {
            return Err(ConfigError::InvalidValue(
                "MERCADOPAGO_BASE_URL must be a valid URL".to_string(),
            ));
        }

        if !is_http_url(&self.notification_url) {
            return Err(ConfigError::InvalidValue(
                "PAYMENT_NOTIFICATION_URL must be a valid URL".to_string(),
            ));
        }

        if self.timeout_secs == 0 {
            return Err(ConfigError::InvalidValue(
                "MERCADOPAGO_TIMEOUT_SECS".to_string(),
            ));
        }

        if !self.default_payer_email.contains('@') {
            return Err(ConfigError::ValidationFailed(
                "DEFAULT_PAYER_EMAIL must be an email address".to_string(),
            ));
        }

        Ok(())
    }
}

/// Configuration error types
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingVariable(String),

    #[error("Invalid value for configuration: {0}")]
    InvalidValue(String),

    #[error("Validation failed: {0}")]
    ValidationFailed(String),
}
