use config::{Config, ConfigError, Environment, File};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::env;
use std::path::Path;
use thiserror::Error;
use tracing::{error, info};
use validator::{Validate, ValidationError};

/// Default values for configuration
const DEFAULT_LOG_LEVEL: &str = "info";
const DEFAULT_ENV: &str = "development";
const DEFAULT_PORT: u16 = 8080;
const CONFIG_DIR: &str = "config";
const DEFAULT_TAX_RATE: &str = "0.15";
const DEFAULT_FREE_SHIPPING_THRESHOLD: &str = "1000";
const DEFAULT_FLAT_SHIPPING_FEE: &str = "50";
const DEFAULT_COUNTRY: &str = "India";
const DEFAULT_GATEWAY_API_BASE: &str = "https://api.razorpay.com/v1";
const DEV_DEFAULT_JWT_SECRET: &str =
    "this_is_a_development_secret_key_that_is_at_least_64_characters_long_for_testing";

/// Payment gateway credentials and endpoint.
///
/// The key secret doubles as the HMAC key for callback signature
/// verification, so it must never be serialized back out or logged.
#[derive(Clone, Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct GatewayConfig {
    /// Public key id sent as the basic-auth username
    #[validate(length(min = 1))]
    pub key_id: String,

    /// Shared secret: basic-auth password and HMAC signing key
    #[validate(length(min = 1))]
    pub key_secret: String,

    /// Gateway REST endpoint base, overridable for tests
    #[serde(default = "default_gateway_api_base")]
    pub api_base: String,

    /// Settlement currency for opened transactions
    #[serde(default = "default_gateway_currency")]
    pub currency: String,
}

/// Pricing policy knobs used by the quote computation.
#[derive(Clone, Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct PricingConfig {
    /// Tax rate applied to the item subtotal (0.15 = 15%)
    #[serde(default = "default_tax_rate")]
    #[validate(custom = "validate_tax_rate")]
    pub tax_rate: Decimal,

    /// Subtotals strictly above this ship free
    #[serde(default = "default_free_shipping_threshold")]
    pub free_shipping_threshold: Decimal,

    /// Flat shipping fee below the threshold
    #[serde(default = "default_flat_shipping_fee")]
    pub flat_shipping_fee: Decimal,

    /// Country substituted when the shipping address omits one
    #[serde(default = "default_country")]
    pub default_country: String,
}

impl Default for PricingConfig {
    fn default() -> Self {
        Self {
            tax_rate: default_tax_rate(),
            free_shipping_threshold: default_free_shipping_threshold(),
            flat_shipping_fee: default_flat_shipping_fee(),
            default_country: default_country(),
        }
    }
}

/// Application configuration structure with validation
#[derive(Clone, Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct AppConfig {
    /// Database connection URL
    pub database_url: String,

    /// JWT secret key (minimum 64 characters)
    #[validate(length(min = 64), custom = "validate_jwt_secret")]
    pub jwt_secret: String,

    /// JWT expiration time in seconds
    pub jwt_expiration: usize,

    /// Server host address
    pub host: String,

    /// Server port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Application environment
    pub environment: String,

    /// Logging level
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Log in JSON format (structured logging)
    #[serde(default)]
    pub log_json: bool,

    /// CORS: comma-separated list of allowed origins (production)
    #[serde(default)]
    pub cors_allowed_origins: Option<String>,

    /// Allow permissive CORS fallback
    #[serde(default)]
    pub cors_allow_any_origin: bool,

    /// Pricing policy
    #[serde(default)]
    #[validate]
    pub pricing: PricingConfig,

    /// Payment gateway credentials; checkout with the gateway payment
    /// method is rejected when absent
    #[serde(default)]
    #[validate]
    pub gateway: Option<GatewayConfig>,

    /// Event channel capacity for async event processing
    #[serde(default = "default_event_channel_capacity")]
    pub event_channel_capacity: usize,
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}

fn default_tax_rate() -> Decimal {
    DEFAULT_TAX_RATE.parse().expect("constant parses")
}

fn default_free_shipping_threshold() -> Decimal {
    DEFAULT_FREE_SHIPPING_THRESHOLD.parse().expect("constant parses")
}

fn default_flat_shipping_fee() -> Decimal {
    DEFAULT_FLAT_SHIPPING_FEE.parse().expect("constant parses")
}

fn default_country() -> String {
    DEFAULT_COUNTRY.to_string()
}

fn default_gateway_api_base() -> String {
    DEFAULT_GATEWAY_API_BASE.to_string()
}

fn default_gateway_currency() -> String {
    "INR".to_string()
}

fn default_event_channel_capacity() -> usize {
    1024
}

fn validate_tax_rate(rate: &Decimal) -> Result<(), ValidationError> {
    if *rate < Decimal::ZERO || *rate >= Decimal::ONE {
        return Err(ValidationError::new("tax_rate_out_of_range"));
    }
    Ok(())
}

fn validate_jwt_secret(secret: &str) -> Result<(), ValidationError> {
    if secret.chars().all(|c| c == secret.chars().next().unwrap_or(' ')) {
        return Err(ValidationError::new("jwt_secret_degenerate"));
    }
    Ok(())
}

#[derive(Debug, Error)]
pub enum AppConfigError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] ConfigError),
    #[error("configuration validation failed: {0}")]
    Validation(#[from] validator::ValidationErrors),
}

impl AppConfig {
    pub fn log_level(&self) -> &str {
        &self.log_level
    }

    pub fn is_development(&self) -> bool {
        self.environment.eq_ignore_ascii_case("development")
    }

    pub fn should_allow_permissive_cors(&self) -> bool {
        self.cors_allow_any_origin || self.is_development()
    }
}

/// Loads configuration from `config/` files layered with `APP__*`
/// environment variables.
///
/// The JWT secret has no production default; it must be provided via
/// environment variable or config file. In development a built-in secret is
/// substituted so the server starts without ceremony.
pub fn load_config() -> Result<AppConfig, AppConfigError> {
    let run_env = env::var("RUN_ENV")
        .or_else(|_| env::var("APP_ENV"))
        .unwrap_or_else(|_| DEFAULT_ENV.to_string());
    info!("Loading configuration for environment: {}", run_env);

    if !Path::new(CONFIG_DIR).exists() {
        info!(
            "Config directory '{}' not found; relying on built-in defaults and environment variables",
            CONFIG_DIR
        );
    }

    let builder = Config::builder()
        .set_default("database_url", "sqlite://storefront.db?mode=rwc")?
        .set_default("jwt_expiration", 3600)?
        .set_default("host", "0.0.0.0")?
        .set_default("port", DEFAULT_PORT as i64)?
        .set_default("environment", DEFAULT_ENV)?
        .set_default("log_level", DEFAULT_LOG_LEVEL)?
        .set_default("log_json", false)?
        .add_source(File::with_name(&format!("{}/default", CONFIG_DIR)).required(false))
        .add_source(File::with_name(&format!("{}/{}", CONFIG_DIR, run_env)).required(false));

    let config = builder
        .add_source(Environment::with_prefix("APP").separator("__"))
        .build()?;

    if config.get_string("jwt_secret").is_err() {
        if run_env == DEFAULT_ENV {
            info!("JWT secret not configured; using built-in development secret");
        } else {
            error!("JWT secret is not configured. Set APP__JWT_SECRET with a secure random string (minimum 64 characters).");
            return Err(AppConfigError::Load(ConfigError::NotFound(
                "jwt_secret is required but not configured. Set APP__JWT_SECRET.".into(),
            )));
        }
    }

    let config = Config::builder()
        .set_default("jwt_secret", DEV_DEFAULT_JWT_SECRET)?
        .add_source(config)
        .build()?;

    let app_config: AppConfig = config.try_deserialize()?;

    app_config.validate().map_err(|e| {
        error!("Configuration validation failed: {:?}", e);
        AppConfigError::Validation(e)
    })?;

    info!("Configuration loaded successfully");
    Ok(app_config)
}

/// Initializes the global tracing subscriber.
pub fn init_tracing(level: &str, json: bool) {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let default_directive = format!("storefront_api={},tower_http=debug", level);
    let filter_directive = env::var("RUST_LOG")
        .ok()
        .filter(|s| !s.trim().is_empty())
        .unwrap_or(default_directive);

    let filter = EnvFilter::try_new(filter_directive)
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_LEVEL));

    if json {
        let _ = tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .try_init();
    } else {
        let _ = tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer())
            .try_init();
    }
}
