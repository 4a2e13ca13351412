//! Local Market CLI - Database migrations and store maintenance.
//!
//! # Usage
//!
//! ```bash
//! # Apply database migrations
//! lm-cli migrate
//!
//! # Load categories, products, zones and holidays
//! lm-cli seed --file crates/cli/seed.example.yaml
//!
//! # Bootstrap or print the store policy
//! lm-cli policy init
//! lm-cli policy show
//!
//! # Remove expired carts
//! lm-cli carts purge-expired
//! ```

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand};

mod commands;

use commands::CliError;

#[derive(Parser)]
#[command(name = "lm-cli")]
#[command(author, version, about = "Local Market CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run database migrations
    Migrate,
    /// Seed the store from a YAML file
    Seed {
        /// Path to the seed file
        #[arg(short, long)]
        file: String,
    },
    /// Manage the store policy
    Policy {
        #[command(subcommand)]
        action: PolicyAction,
    },
    /// Cart maintenance
    Carts {
        #[command(subcommand)]
        action: CartsAction,
    },
}

#[derive(Subcommand)]
enum PolicyAction {
    /// Write the policy from MARKET_POLICY_* defaults if none exists
    Init,
    /// Print the stored policy
    Show,
}

#[derive(Subcommand)]
enum CartsAction {
    /// Delete carts whose expiry has passed
    PurgeExpired,
}

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), CliError> {
    match cli.command {
        Commands::Migrate => commands::migrate::run().await?,
        Commands::Seed { file } => commands::seed::run(&file).await?,
        Commands::Policy { action } => match action {
            PolicyAction::Init => commands::policy::init().await?,
            PolicyAction::Show => commands::policy::show().await?,
        },
        Commands::Carts { action } => match action {
            CartsAction::PurgeExpired => commands::carts::purge_expired().await?,
        },
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parses_subcommands() {
        let cli = Cli::try_parse_from(["lm-cli", "carts", "purge-expired"]);
        assert!(matches!(
            cli.map(|c| c.command),
            Ok(Commands::Carts {
                action: CartsAction::PurgeExpired
            })
        ));

        let cli = Cli::try_parse_from(["lm-cli", "seed", "--file", "seed.yaml"]);
        assert!(matches!(
            cli.map(|c| c.command),
            Ok(Commands::Seed { file }) if file == "seed.yaml"
        ));
    }
}
