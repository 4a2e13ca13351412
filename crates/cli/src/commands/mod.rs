//! CLI subcommands.

pub mod carts;
pub mod migrate;
pub mod policy;
pub mod seed;

use local_market_server::config::{ConfigError, MarketConfig};
use local_market_server::db::{self, RepositoryError};
use local_market_server::error::AppError;
use local_market_server::state::AppState;
use thiserror::Error;

/// Errors that can occur while running a command.
#[derive(Debug, Error)]
pub enum CliError {
    /// Configuration is missing or invalid.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Database connection or query error.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Repository error.
    #[error("repository error: {0}")]
    Repository(#[from] RepositoryError),

    /// Migration error.
    #[error("migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// A store rule rejected the input.
    #[error("{0}")]
    App(#[from] AppError),

    /// Input file could not be read.
    #[error("cannot read {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    /// Input file is not valid YAML for the expected shape.
    #[error("invalid seed file: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// Output serialization failed.
    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Load configuration and connect, returning the same state the server uses.
async fn connect() -> Result<AppState, CliError> {
    let config = MarketConfig::from_env()?;

    tracing::info!("Connecting to database...");
    let pool = db::create_pool(&config.database_url).await?;

    Ok(AppState::new(config, pool))
}
