//! Team Membership Service
//!
//! Manages teams within organizations and the users that belong to them:
//! - Team CRUD with name uniqueness per organization and cascading delete
//! - Memberships with Member/Admin permissions
//! - Protection against removing or demoting a team's last Admin
//! - Search and member listings restricted by scoped access control

pub mod api;
pub mod cli;
pub mod config;
pub mod domain;
pub mod infrastructure;

pub use self::config::AppConfig;

use std::sync::Arc;

use tracing::info;

use api::state::AppState;
use infrastructure::access::ScopedAccessFilterProvider;
use infrastructure::auth::{JwtConfig, JwtService};
use infrastructure::storage::{connect_pool, run_storage_migrations, StorageType};
use infrastructure::team::{InMemoryTeamRepository, PostgresTeamRepository, TeamService};

/// Create the application state with default configuration
pub async fn create_app_state() -> anyhow::Result<AppState> {
    create_app_state_with_config(&AppConfig::default()).await
}

/// Create the application state with custom configuration
///
/// With the Postgres backend, pending migrations are applied first.
pub async fn create_app_state_with_config(config: &AppConfig) -> anyhow::Result<AppState> {
    let team_service = create_team_service(config).await?;

    let jwt_service = JwtService::new(JwtConfig::new(
        &config.auth.jwt_secret,
        config.auth.jwt_expiration_hours,
    ));

    Ok(AppState::new(Arc::new(team_service), Arc::new(jwt_service)))
}

async fn create_team_service(config: &AppConfig) -> anyhow::Result<TeamService> {
    let access = Arc::new(ScopedAccessFilterProvider::new(
        config.auth.access_control_enabled,
    ));

    info!(backend = %config.database.backend, "Storage backend selected");

    let service = match config.database.backend {
        StorageType::Memory => {
            let repo = Arc::new(InMemoryTeamRepository::new());
            TeamService::new(repo.clone(), repo, access)
        }
        StorageType::Postgres => {
            let postgres = config.database.postgres();
            let pool = connect_pool(&postgres).await?;
            run_storage_migrations(&pool).await?;

            let repo = Arc::new(
                PostgresTeamRepository::new(pool).with_statement_timeout(postgres.statement_timeout_ms),
            );
            TeamService::new(repo.clone(), repo, access)
        }
    };

    Ok(service.with_settings(config.teams.settings()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_create_in_memory_state() {
        let state = create_app_state().await.unwrap();

        assert!(state.team_service.ping().await.is_ok());
        assert!(state.team_service.settings().creator_is_admin);
        assert_eq!(state.jwt_service.expiration_hours(), 24);
    }
}
