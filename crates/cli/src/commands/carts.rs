//! Cart maintenance.

use local_market_server::db::CartRepository;

use super::{CliError, connect};

/// Delete carts whose expiry has passed.
///
/// # Errors
///
/// Returns an error if configuration or the database fails.
pub async fn purge_expired() -> Result<(), CliError> {
    let state = connect().await?;
    let removed = CartRepository::new(state.pool())
        .purge_expired(state.now())
        .await?;

    tracing::info!(removed, "Expired carts purged");
    Ok(())
}
