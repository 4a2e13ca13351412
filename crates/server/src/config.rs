//! Server configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `MARKET_DATABASE_URL` - `PostgreSQL` connection string (falls back to `DATABASE_URL`)
//!
//! ## Optional
//! - `MARKET_HOST` - Bind address (default: 127.0.0.1)
//! - `MARKET_PORT` - Listen port (default: 8000)
//! - `MARKET_TIME_ZONE` - IANA time zone of the store (default: Asia/Seoul)
//! - `MARKET_CART_TTL_DAYS` - Days a cart is kept after creation (default: 7)
//! - `MARKET_CANCEL_WINDOW_MINUTES` - Customer self-cancel window (default: 30)
//! - `MARKET_SLOT_LENGTH_MINUTES` - Length of a delivery slot (default: 60)
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT`, `SENTRY_SAMPLE_RATE`, `SENTRY_TRACES_SAMPLE_RATE`
//!
//! ## Optional (store policy bootstrap)
//!
//! Used only when the store policy row does not exist yet. Once written, the
//! stored policy is authoritative.
//!
//! - `MARKET_POLICY_OPEN_TIME` / `MARKET_POLICY_CLOSE_TIME` (default: 09:00 / 21:00)
//! - `MARKET_POLICY_CUTOFF_TIME` - Same-day order cutoff (default: 19:00)
//! - `MARKET_POLICY_MIN_ORDER` - Minimum order amount (default: 0)
//! - `MARKET_POLICY_BASE_FEE` - Delivery fee (default: 0)
//! - `MARKET_POLICY_FREE_THRESHOLD` - Free delivery threshold (default: 0)
//! - `MARKET_POLICY_RESERVATION_DAYS` - Days ahead a slot may be booked (default: 2)

use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;

use chrono::{Duration, NaiveTime};
use chrono_tz::Tz;
use local_market_core::Money;
use local_market_core::order::OrderTerms;
use local_market_core::policy::StorePolicy;
use rust_decimal::Decimal;
use secrecy::SecretString;
use thiserror::Error;

const DEFAULT_TIME_ZONE: &str = "Asia/Seoul";

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
}

/// Server configuration.
#[derive(Debug, Clone)]
pub struct MarketConfig {
    /// `PostgreSQL` database connection URL (contains password)
    pub database_url: SecretString,
    /// IP address to bind the server to
    pub host: IpAddr,
    /// Port to listen on
    pub port: u16,
    /// Time zone used for store hours, cutoffs and holidays
    pub time_zone: Tz,
    /// How long a new cart is kept
    pub cart_ttl: Duration,
    /// Cancellation window and slot length applied to new orders
    pub order_terms: OrderTerms,
    /// Store policy written when none exists yet
    pub policy_defaults: StorePolicy,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    /// Sentry environment (e.g., "development", "staging", "production")
    pub sentry_environment: Option<String>,
    /// Sentry error sample rate (0.0 to 1.0)
    pub sentry_sample_rate: f32,
    /// Sentry traces sample rate for performance monitoring (0.0 to 1.0)
    pub sentry_traces_sample_rate: f32,
}

impl MarketConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing or invalid.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let database_url = get_database_url("MARKET_DATABASE_URL")?;
        let host = parse_env("MARKET_HOST", "127.0.0.1")?;
        let port = parse_env("MARKET_PORT", "8000")?;
        let time_zone = parse_env("MARKET_TIME_ZONE", DEFAULT_TIME_ZONE)?;
        let cart_ttl = Duration::days(parse_env("MARKET_CART_TTL_DAYS", "7")?);
        let order_terms = OrderTerms {
            cancel_window: Duration::minutes(parse_env("MARKET_CANCEL_WINDOW_MINUTES", "30")?),
            slot_length: Duration::minutes(parse_env("MARKET_SLOT_LENGTH_MINUTES", "60")?),
        };
        let policy_defaults = policy_defaults_from_env()?;

        let sentry_dsn = get_optional_env("SENTRY_DSN");
        let sentry_environment = get_optional_env("SENTRY_ENVIRONMENT");
        let sentry_sample_rate = get_optional_env("SENTRY_SAMPLE_RATE")
            .and_then(|s| s.parse().ok())
            .unwrap_or(1.0);
        let sentry_traces_sample_rate = get_optional_env("SENTRY_TRACES_SAMPLE_RATE")
            .and_then(|s| s.parse().ok())
            .unwrap_or(1.0);

        Ok(Self {
            database_url,
            host,
            port,
            time_zone,
            cart_ttl,
            order_terms,
            policy_defaults,
            sentry_dsn,
            sentry_environment,
            sentry_sample_rate,
            sentry_traces_sample_rate,
        })
    }

    /// Returns the socket address for binding the server.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

/// Load the store policy bootstrap values.
///
/// Shared with the CLI so `lm-cli policy init` writes the same defaults the
/// server would.
///
/// # Errors
///
/// Returns `ConfigError::InvalidEnvVar` for unparsable values or a policy
/// that fails validation.
pub fn policy_defaults_from_env() -> Result<StorePolicy, ConfigError> {
    let base = StorePolicy::default();
    let policy = StorePolicy {
        open_time: parse_time_env("MARKET_POLICY_OPEN_TIME", base.open_time)?,
        close_time: parse_time_env("MARKET_POLICY_CLOSE_TIME", base.close_time)?,
        same_day_cutoff_time: parse_time_env("MARKET_POLICY_CUTOFF_TIME", base.same_day_cutoff_time)?,
        min_order_amount_default: parse_money_env(
            "MARKET_POLICY_MIN_ORDER",
            base.min_order_amount_default,
        )?,
        base_delivery_fee_default: parse_money_env(
            "MARKET_POLICY_BASE_FEE",
            base.base_delivery_fee_default,
        )?,
        free_delivery_threshold_default: parse_money_env(
            "MARKET_POLICY_FREE_THRESHOLD",
            base.free_delivery_threshold_default,
        )?,
        allow_reservation_days: match get_optional_env("MARKET_POLICY_RESERVATION_DAYS") {
            Some(v) => parse_value("MARKET_POLICY_RESERVATION_DAYS", &v)?,
            None => base.allow_reservation_days,
        },
    };

    policy
        .validate()
        .map_err(|e| ConfigError::InvalidEnvVar("MARKET_POLICY_*".to_string(), e.message))?;
    Ok(policy)
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Get database URL with fallback to generic `DATABASE_URL` (used by Fly.io postgres attach).
pub fn get_database_url(primary_key: &str) -> Result<SecretString, ConfigError> {
    if let Ok(value) = std::env::var(primary_key) {
        return Ok(SecretString::from(value));
    }
    if let Ok(value) = std::env::var("DATABASE_URL") {
        return Ok(SecretString::from(value));
    }
    Err(ConfigError::MissingEnvVar(primary_key.to_string()))
}

/// Get an optional environment variable.
fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// Get an environment variable with a default value.
fn get_env_or_default(key: &str, default: &str) -> String {
    get_optional_env(key).unwrap_or_else(|| default.to_string())
}

/// Parse an environment variable, falling back to `default`.
fn parse_env<T>(key: &str, default: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    parse_value(key, &get_env_or_default(key, default))
}

fn parse_value<T>(key: &str, value: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse::<T>()
        .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
}

fn parse_time_env(key: &str, default: NaiveTime) -> Result<NaiveTime, ConfigError> {
    get_optional_env(key).map_or(Ok(default), |v| parse_time(key, &v))
}

fn parse_money_env(key: &str, default: Money) -> Result<Money, ConfigError> {
    get_optional_env(key).map_or(Ok(default), |v| parse_money(key, &v))
}

/// Parse `HH:MM` (seconds optional).
fn parse_time(key: &str, value: &str) -> Result<NaiveTime, ConfigError> {
    let value = value.trim();
    NaiveTime::parse_from_str(value, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(value, "%H:%M:%S"))
        .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
}

fn parse_money(key: &str, value: &str) -> Result<Money, ConfigError> {
    let amount: Decimal = parse_value(key, value)?;
    if amount.is_sign_negative() {
        return Err(ConfigError::InvalidEnvVar(
            key.to_string(),
            "must not be negative".to_string(),
        ));
    }
    Ok(Money::new(amount))
}
