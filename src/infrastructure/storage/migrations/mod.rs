//! Database migrations infrastructure

use async_trait::async_trait;
use sqlx::postgres::PgPool;

use crate::domain::DomainError;

/// Trait for running database migrations
#[async_trait]
pub trait Migrator: Send + Sync {
    /// Runs all pending migrations
    async fn run(&self) -> Result<(), DomainError>;

    /// Reverts the last migration
    async fn revert(&self) -> Result<(), DomainError>;

    /// Returns the current migration version
    async fn version(&self) -> Result<Option<i64>, DomainError>;
}

/// PostgreSQL migrator tracking applied versions in `_migrations`
#[derive(Debug)]
pub struct PostgresMigrator {
    pool: PgPool,
}

impl PostgresMigrator {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Creates the migrations table if it doesn't exist
    async fn ensure_migrations_table(&self) -> Result<(), DomainError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS _migrations (
                version BIGINT PRIMARY KEY,
                description TEXT NOT NULL,
                installed_on TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                success BOOLEAN NOT NULL DEFAULT TRUE
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| DomainError::storage(format!("Failed to create migrations table: {}", e)))?;

        Ok(())
    }

    /// Runs a single migration
    pub async fn run_migration(&self, migration: &Migration) -> Result<(), DomainError> {
        self.ensure_migrations_table().await?;

        // Check if already applied
        let applied: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM _migrations WHERE version = $1)",
        )
        .bind(migration.version)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| DomainError::storage(format!("Failed to check migration status: {}", e)))?;

        if applied {
            return Ok(());
        }

        // Run the migration
        sqlx::raw_sql(&migration.up)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                DomainError::storage(format!(
                    "Failed to run migration {}: {}",
                    migration.version, e
                ))
            })?;

        // Record the migration
        sqlx::query(
            "INSERT INTO _migrations (version, description) VALUES ($1, $2)",
        )
        .bind(migration.version)
        .bind(&migration.description)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            DomainError::storage(format!("Failed to record migration {}: {}", migration.version, e))
        })?;

        Ok(())
    }

    /// Reverts a single migration
    pub async fn revert_migration(&self, migration: &Migration) -> Result<(), DomainError> {
        self.ensure_migrations_table().await?;

        // Check if applied
        let applied: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM _migrations WHERE version = $1)",
        )
        .bind(migration.version)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| DomainError::storage(format!("Failed to check migration status: {}", e)))?;

        if !applied {
            return Ok(());
        }

        // Run the down migration
        sqlx::raw_sql(&migration.down)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                DomainError::storage(format!(
                    "Failed to revert migration {}: {}",
                    migration.version, e
                ))
            })?;

        // Remove the migration record
        sqlx::query("DELETE FROM _migrations WHERE version = $1")
            .bind(migration.version)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                DomainError::storage(format!(
                    "Failed to remove migration record {}: {}",
                    migration.version, e
                ))
            })?;

        Ok(())
    }

    /// Returns the latest applied migration version
    pub async fn current_version(&self) -> Result<Option<i64>, DomainError> {
        self.ensure_migrations_table().await?;

        let version: Option<i64> = sqlx::query_scalar(
            "SELECT MAX(version) FROM _migrations WHERE success = TRUE",
        )
        .fetch_one(&self.pool)
        .await
        .map_err(|e| DomainError::storage(format!("Failed to get migration version: {}", e)))?;

        Ok(version)
    }

    /// Returns all applied migration versions
    pub async fn applied_versions(&self) -> Result<Vec<i64>, DomainError> {
        self.ensure_migrations_table().await?;

        let versions: Vec<i64> = sqlx::query_scalar(
            "SELECT version FROM _migrations WHERE success = TRUE ORDER BY version",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| DomainError::storage(format!("Failed to get applied migrations: {}", e)))?;

        Ok(versions)
    }
}

#[async_trait]
impl Migrator for PostgresMigrator {
    async fn run(&self) -> Result<(), DomainError> {
        for migration in storage_migrations() {
            self.run_migration(&migration).await?;
        }

        Ok(())
    }

    async fn revert(&self) -> Result<(), DomainError> {
        let Some(current) = self.current_version().await? else {
            return Ok(());
        };

        match storage_migrations().iter().find(|m| m.version == current) {
            Some(migration) => self.revert_migration(migration).await,
            None => Err(DomainError::storage(format!(
                "Applied migration {} is unknown to this build",
                current
            ))),
        }
    }

    async fn version(&self) -> Result<Option<i64>, DomainError> {
        self.current_version().await
    }
}

/// Represents a database migration
#[derive(Debug, Clone)]
pub struct Migration {
    /// Migration version (timestamp-based recommended)
    pub version: i64,
    /// Human-readable description
    pub description: String,
    /// SQL to run when applying the migration
    pub up: String,
    /// SQL to run when reverting the migration
    pub down: String,
}

impl Migration {
    pub fn new(
        version: i64,
        description: impl Into<String>,
        up: impl Into<String>,
        down: impl Into<String>,
    ) -> Self {
        Self {
            version,
            description: description.into(),
            up: up.into(),
            down: down.into(),
        }
    }
}

/// Collection of migrations for the team schema
pub fn storage_migrations() -> Vec<Migration> {
    vec![
        Migration::new(
            1,
            "Create user and user_auth tables",
            r#"
            CREATE TABLE IF NOT EXISTS "user" (
                id BIGSERIAL PRIMARY KEY,
                login VARCHAR(190) NOT NULL UNIQUE,
                email VARCHAR(190) NOT NULL,
                name VARCHAR(255) NOT NULL DEFAULT '',
                created TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                updated TIMESTAMPTZ NOT NULL DEFAULT NOW()
            );
            CREATE TABLE IF NOT EXISTS user_auth (
                id BIGSERIAL PRIMARY KEY,
                user_id BIGINT NOT NULL,
                auth_module VARCHAR(190) NOT NULL,
                auth_id VARCHAR(190) NOT NULL DEFAULT '',
                created TIMESTAMPTZ NOT NULL DEFAULT NOW()
            );
            CREATE INDEX IF NOT EXISTS idx_user_auth_user_id ON user_auth(user_id);
            "#,
            r#"
            DROP TABLE IF EXISTS user_auth;
            DROP TABLE IF EXISTS "user";
            "#,
        ),
        Migration::new(
            2,
            "Create team table",
            r#"
            CREATE TABLE IF NOT EXISTS team (
                id BIGSERIAL PRIMARY KEY,
                org_id BIGINT NOT NULL,
                name VARCHAR(190) NOT NULL,
                email VARCHAR(190),
                created TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                updated TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                CONSTRAINT uq_team_org_id_name UNIQUE (org_id, name)
            );
            CREATE INDEX IF NOT EXISTS idx_team_org_id ON team(org_id);
            "#,
            r#"
            DROP TABLE IF EXISTS team;
            "#,
        ),
        Migration::new(
            3,
            "Create team_member table",
            r#"
            CREATE TABLE IF NOT EXISTS team_member (
                id BIGSERIAL PRIMARY KEY,
                org_id BIGINT NOT NULL,
                team_id BIGINT NOT NULL,
                user_id BIGINT NOT NULL,
                external BOOLEAN NOT NULL DEFAULT FALSE,
                permission BIGINT NOT NULL DEFAULT 0,
                created TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                updated TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                CONSTRAINT uq_team_member_org_team_user UNIQUE (org_id, team_id, user_id)
            );
            CREATE INDEX IF NOT EXISTS idx_team_member_team_id ON team_member(team_id);
            CREATE INDEX IF NOT EXISTS idx_team_member_user_id ON team_member(org_id, user_id);
            "#,
            r#"
            DROP TABLE IF EXISTS team_member;
            "#,
        ),
        Migration::new(
            4,
            "Create tables referencing teams",
            r#"
            CREATE TABLE IF NOT EXISTS dashboard_acl (
                id BIGSERIAL PRIMARY KEY,
                org_id BIGINT NOT NULL,
                dashboard_id BIGINT NOT NULL,
                team_id BIGINT,
                user_id BIGINT,
                permission BIGINT NOT NULL DEFAULT 1
            );
            CREATE TABLE IF NOT EXISTS team_role (
                id BIGSERIAL PRIMARY KEY,
                org_id BIGINT NOT NULL,
                team_id BIGINT NOT NULL,
                role_id BIGINT NOT NULL,
                created TIMESTAMPTZ NOT NULL DEFAULT NOW()
            );
            CREATE TABLE IF NOT EXISTS permission (
                id BIGSERIAL PRIMARY KEY,
                role_id BIGINT NOT NULL,
                action VARCHAR(190) NOT NULL,
                scope VARCHAR(190) NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_dashboard_acl_team_id ON dashboard_acl(team_id);
            CREATE INDEX IF NOT EXISTS idx_team_role_team_id ON team_role(team_id);
            CREATE INDEX IF NOT EXISTS idx_permission_scope ON permission(scope);
            "#,
            r#"
            DROP TABLE IF EXISTS permission;
            DROP TABLE IF EXISTS team_role;
            DROP TABLE IF EXISTS dashboard_acl;
            "#,
        ),
    ]
}

/// Runs all pending storage migrations
pub async fn run_storage_migrations(pool: &PgPool) -> Result<(), DomainError> {
    PostgresMigrator::new(pool.clone()).run().await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_migration_creation() {
        let migration = Migration::new(1, "Test migration", "CREATE TABLE test", "DROP TABLE test");

        assert_eq!(migration.version, 1);
        assert_eq!(migration.description, "Test migration");
        assert_eq!(migration.up, "CREATE TABLE test");
        assert_eq!(migration.down, "DROP TABLE test");
    }

    #[test]
    fn test_storage_migrations_order() {
        let migrations = storage_migrations();

        assert!(!migrations.is_empty());

        // Verify migrations are in order
        for i in 1..migrations.len() {
            assert!(
                migrations[i].version > migrations[i - 1].version,
                "Migrations should be in ascending order"
            );
        }
    }

    #[test]
    fn test_team_schema_constraints() {
        let migrations = storage_migrations();
        let schema: String = migrations.iter().map(|m| m.up.as_str()).collect();

        assert!(schema.contains("UNIQUE (org_id, name)"));
        assert!(schema.contains("UNIQUE (org_id, team_id, user_id)"));
        for table in ["team", "team_member", "dashboard_acl", "team_role", "permission"] {
            assert!(
                schema.contains(&format!("CREATE TABLE IF NOT EXISTS {} (", table)),
                "missing table {}",
                table
            );
        }
    }

    #[test]
    fn test_storage_migrations_content() {
        let migrations = storage_migrations();

        // Verify all migrations have required content
        for migration in migrations {
            assert!(!migration.description.is_empty());
            assert!(!migration.up.is_empty());
            assert!(!migration.down.is_empty());
        }
    }
}
