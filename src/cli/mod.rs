//! CLI module for the team membership service
//!
//! Provides subcommands:
//! - `serve`: run the HTTP API
//! - `migrate`: apply or revert database migrations
//! - `token`: mint a development token for an identity

pub mod migrate;
pub mod serve;
pub mod token;

use anyhow::Context;
use clap::{Parser, Subcommand};

use crate::config::AppConfig;
use crate::infrastructure::logging;

/// Team membership service - teams, members and last-admin protection
#[derive(Parser)]
#[command(name = "team-membership-service")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Run the HTTP API server
    Serve,

    /// Apply or revert database migrations
    Migrate(migrate::MigrateArgs),

    /// Mint a JWT for a development identity
    Token(token::TokenArgs),
}

/// Load `.env`, the layered configuration and the log subscriber
///
/// A configuration that fails to load aborts the command.
pub(crate) fn bootstrap() -> anyhow::Result<AppConfig> {
    dotenvy::dotenv().ok();

    let config = AppConfig::load().context("Failed to load configuration")?;

    logging::init_logging(&logging::LoggingConfig::from(&config.logging));

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_subcommands() {
        let cli = Cli::try_parse_from(["team-membership-service", "migrate", "--revert"]).unwrap();
        assert!(matches!(cli.command, Command::Migrate(args) if args.revert));

        let cli = Cli::try_parse_from([
            "team-membership-service",
            "token",
            "--user-id",
            "7",
            "--login",
            "ann",
            "--grant",
            "teams:read=teams:id:1",
        ])
        .unwrap();
        assert!(matches!(cli.command, Command::Token(args) if args.user_id == 7));
    }

    #[test]
    fn test_unknown_subcommand() {
        assert!(Cli::try_parse_from(["team-membership-service", "ui"]).is_err());
    }
}
