//! Application state shared across handlers.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use local_market_core::clock::{Clock, SystemClock, local_now};
use sqlx::PgPool;

use crate::config::MarketConfig;

/// Application state shared across all handlers.
///
/// This struct is cheaply cloneable via `Arc` and provides access to
/// shared resources like database connections, configuration and the clock.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: MarketConfig,
    pool: PgPool,
    clock: Arc<dyn Clock>,
}

impl AppState {
    /// Create application state reading the system clock.
    #[must_use]
    pub fn new(config: MarketConfig, pool: PgPool) -> Self {
        Self::with_clock(config, pool, Arc::new(SystemClock))
    }

    /// Create application state with an explicit clock.
    #[must_use]
    pub fn with_clock(config: MarketConfig, pool: PgPool, clock: Arc<dyn Clock>) -> Self {
        Self {
            inner: Arc::new(AppStateInner {
                config,
                pool,
                clock,
            }),
        }
    }

    /// Get a reference to the configuration.
    #[must_use]
    pub fn config(&self) -> &MarketConfig {
        &self.inner.config
    }

    /// Get a reference to the database connection pool.
    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.inner.pool
    }

    /// The store's time zone.
    #[must_use]
    pub fn time_zone(&self) -> Tz {
        self.inner.config.time_zone
    }

    /// Current instant, read fresh on every call.
    #[must_use]
    pub fn now(&self) -> DateTime<Utc> {
        self.inner.clock.now()
    }

    /// Current instant in the store's time zone.
    #[must_use]
    pub fn local_now(&self) -> DateTime<Tz> {
        local_now(self.inner.clock.as_ref(), self.time_zone())
    }
}
