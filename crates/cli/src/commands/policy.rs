//! Store policy commands.
//!
//! # Usage
//!
//! ```bash
//! # Write the policy row from MARKET_POLICY_* defaults if it is missing
//! lm-cli policy init
//!
//! # Print the stored policy as JSON
//! lm-cli policy show
//! ```

use local_market_server::services::StoreConfigService;

use super::{CliError, connect};

/// Create the policy row from the configured defaults, if absent.
///
/// # Errors
///
/// Returns an error if configuration or the database fails.
pub async fn init() -> Result<(), CliError> {
    let state = connect().await?;
    let policy = StoreConfigService::new(&state).policy().await?;

    tracing::info!(
        open = %policy.open_time,
        close = %policy.close_time,
        cutoff = %policy.same_day_cutoff_time,
        reservation_days = policy.allow_reservation_days,
        "Store policy ready"
    );
    Ok(())
}

/// Print the stored policy.
///
/// # Errors
///
/// Returns an error if configuration or the database fails.
pub async fn show() -> Result<(), CliError> {
    let state = connect().await?;
    let policy = StoreConfigService::new(&state).policy().await?;

    #[allow(clippy::print_stdout)]
    {
        println!("{}", serde_json::to_string_pretty(&policy)?);
    }
    Ok(())
}
