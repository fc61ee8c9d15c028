//! Shared Postgres for store integration tests.
//!
//! `TEST_DATABASE_URL` points the tests at an existing database; otherwise a
//! throwaway container is started once per test binary and reused. Migrations
//! run once. Each test works in its own organization so tests can share the
//! database concurrently. When no database can be reached the tests are
//! skipped with a note on stderr.

#![allow(dead_code)]

use std::sync::atomic::{AtomicI64, Ordering};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPool, PgPoolOptions};
use testcontainers::runners::AsyncRunner;
use testcontainers::{ContainerAsync, ImageExt};
use testcontainers_modules::postgres::Postgres;
use tokio::sync::OnceCell;

use team_membership_service::domain::{OrgId, TeamId, UserId};
use team_membership_service::infrastructure::storage::run_storage_migrations;

struct SharedDatabase {
    url: String,
    // Keeps the container alive for the whole test run
    _container: Option<ContainerAsync<Postgres>>,
}

static SHARED: OnceCell<Option<SharedDatabase>> = OnceCell::const_new();
static NEXT_ORG: AtomicI64 = AtomicI64::new(1);

impl SharedDatabase {
    async fn init() -> Result<Self> {
        let database = match std::env::var("TEST_DATABASE_URL") {
            Ok(url) => Self {
                url,
                _container: None,
            },
            Err(_) => {
                let container = Postgres::default()
                    .with_tag("16")
                    .start()
                    .await
                    .context("Failed to start Postgres container")?;

                let host = container.get_host().await?;
                let port = container.get_host_port_ipv4(5432).await?;

                Self {
                    url: format!("postgresql://postgres:postgres@{}:{}/postgres", host, port),
                    _container: Some(container),
                }
            }
        };

        let pool = PgPool::connect(&database.url)
            .await
            .context("Failed to connect to Postgres for migrations")?;
        run_storage_migrations(&pool)
            .await
            .context("Failed to run migrations")?;
        pool.close().await;

        Ok(database)
    }

    async fn get() -> Option<&'static Self> {
        SHARED
            .get_or_init(|| async {
                match Self::init().await {
                    Ok(database) => Some(database),
                    Err(e) => {
                        eprintln!("Postgres unavailable, skipping store tests: {:#}", e);
                        None
                    }
                }
            })
            .await
            .as_ref()
    }
}

/// A fresh pool and a private organization on the shared database
pub struct TestDatabase {
    pub pool: PgPool,
    pub org_id: OrgId,
}

impl TestDatabase {
    pub async fn connect() -> Option<Self> {
        let shared = SharedDatabase::get().await?;

        let pool = PgPoolOptions::new()
            .max_connections(10)
            .connect(&shared.url)
            .await
            .expect("Failed to connect to test database");

        // Unique across runs against a reused database
        let org_id = Utc::now().timestamp_millis() * 1000 + NEXT_ORG.fetch_add(1, Ordering::SeqCst);

        Some(Self {
            pool,
            org_id: OrgId::new(org_id),
        })
    }

    /// Login made unique to this test's organization
    pub fn login(&self, name: &str) -> String {
        format!("{}.{}", name, self.org_id)
    }

    pub async fn insert_user(&self, name: &str) -> UserId {
        let login = self.login(name);

        let id: i64 = sqlx::query_scalar(
            r#"INSERT INTO "user" (login, email, name) VALUES ($1, $2, $3) RETURNING id"#,
        )
        .bind(&login)
        .bind(format!("{}@example.com", login))
        .bind(name.to_uppercase())
        .fetch_one(&self.pool)
        .await
        .expect("Failed to insert user");

        UserId::new(id)
    }

    pub async fn insert_auth_link(&self, user_id: UserId, module: &str, created: DateTime<Utc>) {
        sqlx::query("INSERT INTO user_auth (user_id, auth_module, created) VALUES ($1, $2, $3)")
            .bind(user_id.value())
            .bind(module)
            .bind(created)
            .execute(&self.pool)
            .await
            .expect("Failed to insert auth link");
    }

    /// Rows of `table` whose `column` equals `value`
    pub async fn count_rows(&self, table: &str, column: &str, value: i64) -> i64 {
        sqlx::query_scalar(&format!(
            "SELECT COUNT(*) FROM {} WHERE {} = $1",
            table, column
        ))
        .bind(value)
        .fetch_one(&self.pool)
        .await
        .expect("Failed to count rows")
    }

    pub async fn count_permissions(&self, team_id: TeamId) -> i64 {
        sqlx::query_scalar("SELECT COUNT(*) FROM permission WHERE scope = $1")
            .bind(team_id.scope())
            .fetch_one(&self.pool)
            .await
            .expect("Failed to count permissions")
    }
}
