//! Migrate command - applies or reverts the team schema

use anyhow::bail;
use clap::Args;
use tracing::info;

use crate::infrastructure::storage::{connect_pool, Migrator, PostgresMigrator, StorageType};

#[derive(Args, Debug, Clone)]
pub struct MigrateArgs {
    /// Revert the most recent migration instead of applying pending ones
    #[arg(long)]
    pub revert: bool,

    /// Only print the current schema version
    #[arg(long, conflicts_with = "revert")]
    pub status: bool,
}

/// Run migrations against the configured database
pub async fn run(args: MigrateArgs) -> anyhow::Result<()> {
    let config = super::bootstrap()?;

    if config.database.backend != StorageType::Postgres {
        bail!(
            "Migrations need the postgres backend, configured backend is '{}'",
            config.database.backend
        );
    }

    let pool = connect_pool(&config.database.postgres()).await?;
    let migrator = PostgresMigrator::new(pool);

    if args.status {
        let version = migrator.version().await?;
        info!(version = ?version, "Current schema version");
        return Ok(());
    }

    if args.revert {
        migrator.revert().await?;
    } else {
        migrator.run().await?;
    }

    let version = migrator.version().await?;
    info!(version = ?version, reverted = args.revert, "Migrations finished");

    Ok(())
}
