//! PostgreSQL team and membership repository
//!
//! Mutations run in a transaction. Operations guarded by the last-admin rule
//! lock the team's admin rows with `FOR UPDATE` before deciding, so concurrent
//! demotions and removals on the same team serialize.

use std::fmt::Debug;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPool, PgRow};
use sqlx::{PgConnection, Postgres, QueryBuilder, Row, Transaction};
use tracing::debug;

use super::sql::{is_unique_violation, like_pattern, push_access_filter};
use crate::domain::membership::{ensure_not_sole_admin, PermissionChange};
use crate::domain::{
    DomainError, GetTeamQuery, MemberQuery, Membership, MembershipKey, MembershipRepository,
    NewTeam, OrgId, Permission, Team, TeamId, TeamMemberView, TeamRepository, TeamSearchQuery,
    TeamSearchResult, TeamView, UserId,
};

const TEAM_COLUMNS: &str =
    "team.id, team.org_id, team.name, team.email, team.created, team.updated";

/// Case-insensitive by name in byte order, matching the in-memory store
const TEAM_ORDER: &str = r#" ORDER BY LOWER(team.name) COLLATE "C" ASC, team.id ASC"#;

/// PostgreSQL implementation of both team repositories
#[derive(Clone)]
pub struct PostgresTeamRepository {
    pool: PgPool,
    statement_timeout_ms: u64,
}

impl Debug for PostgresTeamRepository {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PostgresTeamRepository")
            .field("statement_timeout_ms", &self.statement_timeout_ms)
            .finish()
    }
}

impl PostgresTeamRepository {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            statement_timeout_ms: 0,
        }
    }

    /// Bound every statement inside a transaction (builder pattern)
    pub fn with_statement_timeout(mut self, millis: u64) -> Self {
        self.statement_timeout_ms = millis;
        self
    }

    /// Returns a reference to the connection pool
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Dropping the returned transaction without committing rolls it back
    async fn begin(&self) -> Result<Transaction<'static, Postgres>, DomainError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| DomainError::storage(format!("Failed to begin transaction: {}", e)))?;

        if self.statement_timeout_ms > 0 {
            // SET does not accept bind parameters
            sqlx::query(&format!(
                "SET LOCAL statement_timeout = {}",
                self.statement_timeout_ms
            ))
            .execute(&mut *tx)
            .await
            .map_err(|e| DomainError::storage(format!("Failed to set statement timeout: {}", e)))?;
        }

        Ok(tx)
    }
}

async fn commit(tx: Transaction<'static, Postgres>) -> Result<(), DomainError> {
    tx.commit()
        .await
        .map_err(|e| DomainError::storage(format!("Failed to commit transaction: {}", e)))
}

async fn team_exists(
    conn: &mut PgConnection,
    org_id: OrgId,
    team_id: TeamId,
) -> Result<bool, DomainError> {
    sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM team WHERE org_id = $1 AND id = $2)")
        .bind(org_id.value())
        .bind(team_id.value())
        .fetch_one(conn)
        .await
        .map_err(|e| DomainError::storage(format!("Failed to check team: {}", e)))
}

async fn ensure_team(
    conn: &mut PgConnection,
    org_id: OrgId,
    team_id: TeamId,
) -> Result<(), DomainError> {
    if team_exists(conn, org_id, team_id).await? {
        Ok(())
    } else {
        Err(DomainError::team_not_found(format!(
            "Team {} not found in org {}",
            team_id, org_id
        )))
    }
}

async fn member_exists(conn: &mut PgConnection, key: &MembershipKey) -> Result<bool, DomainError> {
    sqlx::query_scalar(
        "SELECT EXISTS(SELECT 1 FROM team_member WHERE org_id = $1 AND team_id = $2 AND user_id = $3)",
    )
    .bind(key.org_id.value())
    .bind(key.team_id.value())
    .bind(key.user_id.value())
    .fetch_one(conn)
    .await
    .map_err(|e| DomainError::storage(format!("Failed to check membership: {}", e)))
}

/// Admins of the team, with their rows locked until the transaction ends
async fn lock_admin_ids(
    conn: &mut PgConnection,
    org_id: OrgId,
    team_id: TeamId,
) -> Result<Vec<UserId>, DomainError> {
    let ids: Vec<i64> = sqlx::query_scalar(
        r#"
        SELECT user_id FROM team_member
        WHERE org_id = $1 AND team_id = $2 AND permission = $3
        ORDER BY user_id
        FOR UPDATE
        "#,
    )
    .bind(org_id.value())
    .bind(team_id.value())
    .bind(Permission::Admin.value())
    .fetch_all(conn)
    .await
    .map_err(|e| DomainError::storage(format!("Failed to load team admins: {}", e)))?;

    Ok(ids.into_iter().map(UserId::new).collect())
}

/// Locks the member row and returns its permission, if the member exists
async fn lock_member(
    conn: &mut PgConnection,
    key: &MembershipKey,
) -> Result<Option<Permission>, DomainError> {
    let permission: Option<i64> = sqlx::query_scalar(
        r#"
        SELECT permission FROM team_member
        WHERE org_id = $1 AND team_id = $2 AND user_id = $3
        FOR UPDATE
        "#,
    )
    .bind(key.org_id.value())
    .bind(key.team_id.value())
    .bind(key.user_id.value())
    .fetch_optional(conn)
    .await
    .map_err(|e| DomainError::storage(format!("Failed to load membership: {}", e)))?;

    Ok(permission.map(Permission::normalize))
}

async fn insert_member(conn: &mut PgConnection, membership: &Membership) -> Result<(), DomainError> {
    let key = membership.key();

    sqlx::query(
        r#"
        INSERT INTO team_member (org_id, team_id, user_id, external, permission, created, updated)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        "#,
    )
    .bind(key.org_id.value())
    .bind(key.team_id.value())
    .bind(key.user_id.value())
    .bind(membership.is_external())
    .bind(membership.permission().value())
    .bind(membership.created())
    .bind(membership.updated())
    .execute(conn)
    .await
    .map_err(|e| {
        if is_unique_violation(&e) {
            DomainError::already_member(key.to_string())
        } else {
            DomainError::storage(format!("Failed to add team member: {}", e))
        }
    })?;

    Ok(())
}

/// Admin rows are locked before the member row in every guarded path
async fn update_member_permission(
    conn: &mut PgConnection,
    key: &MembershipKey,
    permission: Permission,
) -> Result<(), DomainError> {
    let change = PermissionChange::plan(permission);

    let admin_ids = if change.guarded {
        lock_admin_ids(conn, key.org_id, key.team_id).await?
    } else {
        Vec::new()
    };

    if lock_member(conn, key).await?.is_none() {
        return Err(DomainError::member_not_found(key.to_string()));
    }

    ensure_not_sole_admin(&admin_ids, key)?;

    sqlx::query(
        r#"
        UPDATE team_member SET permission = $1, updated = $2
        WHERE org_id = $3 AND team_id = $4 AND user_id = $5
        "#,
    )
    .bind(change.permission.value())
    .bind(Utc::now())
    .bind(key.org_id.value())
    .bind(key.team_id.value())
    .bind(key.user_id.value())
    .execute(conn)
    .await
    .map_err(|e| DomainError::storage(format!("Failed to update team member: {}", e)))?;

    Ok(())
}

fn team_from_row(row: &PgRow) -> Result<Team, DomainError> {
    let read = |e: sqlx::Error| DomainError::storage(format!("Failed to read team row: {}", e));

    let id: i64 = row.try_get("id").map_err(read)?;
    let org_id: i64 = row.try_get("org_id").map_err(read)?;
    let name: String = row.try_get("name").map_err(read)?;
    let email: Option<String> = row.try_get("email").map_err(read)?;
    let created: DateTime<Utc> = row.try_get("created").map_err(read)?;
    let updated: DateTime<Utc> = row.try_get("updated").map_err(read)?;

    let team = Team::new(TeamId::new(id), OrgId::new(org_id), name, email)
        .map_err(|e| DomainError::storage(format!("Stored team {} is invalid: {}", id, e)))?;

    Ok(team.with_timestamps(created, updated))
}

fn team_view_from_row(row: &PgRow) -> Result<TeamView, DomainError> {
    let read = |e: sqlx::Error| DomainError::storage(format!("Failed to read team row: {}", e));

    let member_count: i64 = row.try_get("member_count").map_err(read)?;
    let permission: Option<i64> = row.try_get("permission").map_err(read)?;
    let view = TeamView::new(team_from_row(row)?, member_count);

    Ok(match permission {
        Some(value) => view.with_permission(Permission::normalize(value)),
        None => view,
    })
}

fn member_from_row(row: &PgRow) -> Result<TeamMemberView, DomainError> {
    let read = |e: sqlx::Error| DomainError::storage(format!("Failed to read member row: {}", e));

    Ok(TeamMemberView {
        org_id: OrgId::new(row.try_get("org_id").map_err(read)?),
        team_id: TeamId::new(row.try_get("team_id").map_err(read)?),
        user_id: UserId::new(row.try_get("user_id").map_err(read)?),
        email: row.try_get("email").map_err(read)?,
        name: row.try_get("name").map_err(read)?,
        login: row.try_get("login").map_err(read)?,
        external: row.try_get("external").map_err(read)?,
        permission: Permission::normalize(row.try_get("permission").map_err(read)?),
        auth_module: row.try_get("auth_module").map_err(read)?,
    })
}

/// Select list for team views; the filtering user's permission when one is given
fn push_team_select<'a>(
    builder: &mut QueryBuilder<'a, Postgres>,
    hidden_users: &'a [String],
    user_filter: Option<UserId>,
) {
    builder.push("SELECT ");
    builder.push(TEAM_COLUMNS);
    builder.push(", (SELECT COUNT(*) FROM team_member AS tm");

    if hidden_users.is_empty() {
        builder.push(" WHERE tm.team_id = team.id)");
    } else {
        builder.push(
            " INNER JOIN \"user\" AS u ON u.id = tm.user_id WHERE tm.team_id = team.id AND u.login <> ALL(",
        );
        builder.push_bind(hidden_users);
        builder.push("))");
    }

    builder.push(" AS member_count");

    if user_filter.is_some() {
        builder.push(", team_member.permission AS permission");
    } else {
        builder.push(", NULL::BIGINT AS permission");
    }
}

fn push_team_from(builder: &mut QueryBuilder<'_, Postgres>, user_filter: Option<UserId>) {
    builder.push(" FROM team");

    if let Some(user_id) = user_filter {
        builder.push(" INNER JOIN team_member ON team_member.team_id = team.id AND team_member.user_id = ");
        builder.push_bind(user_id.value());
    }
}

fn push_search_where<'a>(builder: &mut QueryBuilder<'a, Postgres>, query: &'a TeamSearchQuery) {
    builder.push(" WHERE team.org_id = ");
    builder.push_bind(query.org_id.value());

    if let Some(text) = query.query.as_deref() {
        builder.push(" AND team.name ILIKE ");
        builder.push_bind(like_pattern(text));
    }

    if let Some(name) = query.name.as_deref() {
        builder.push(" AND team.name = ");
        builder.push_bind(name);
    }

    if let Some(filter) = &query.access_filter {
        builder.push(" AND (");
        push_access_filter(builder, filter);
        builder.push(")");
    }
}

#[async_trait]
impl TeamRepository for PostgresTeamRepository {
    async fn create(&self, new_team: NewTeam) -> Result<Team, DomainError> {
        let now = Utc::now();

        let id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO team (org_id, name, email, created, updated)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id
            "#,
        )
        .bind(new_team.org_id.value())
        .bind(&new_team.name)
        .bind(new_team.email.as_deref())
        .bind(now)
        .bind(now)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                DomainError::name_taken(new_team.name.clone())
            } else {
                DomainError::storage(format!("Failed to create team: {}", e))
            }
        })?;

        debug!(team_id = id, org_id = %new_team.org_id, "Inserted team");

        let team = Team::new(TeamId::new(id), new_team.org_id, new_team.name, new_team.email)
            .map_err(|e| DomainError::validation(e.to_string()))?;

        Ok(team.with_timestamps(now, now))
    }

    async fn update(&self, team: &Team) -> Result<(), DomainError> {
        let result = sqlx::query(
            r#"
            UPDATE team SET name = $1, email = $2, updated = $3
            WHERE org_id = $4 AND id = $5
            "#,
        )
        .bind(team.name())
        .bind(team.email())
        .bind(team.updated())
        .bind(team.org_id().value())
        .bind(team.id().value())
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                DomainError::name_taken(team.name())
            } else {
                DomainError::storage(format!("Failed to update team: {}", e))
            }
        })?;

        if result.rows_affected() == 0 {
            return Err(DomainError::team_not_found(format!(
                "Team {} not found in org {}",
                team.id(),
                team.org_id()
            )));
        }

        Ok(())
    }

    async fn delete(&self, org_id: OrgId, team_id: TeamId) -> Result<(), DomainError> {
        let mut tx = self.begin().await?;
        ensure_team(&mut tx, org_id, team_id).await?;

        let statements = [
            "DELETE FROM team_member WHERE org_id = $1 AND team_id = $2",
            "DELETE FROM team WHERE org_id = $1 AND id = $2",
            "DELETE FROM dashboard_acl WHERE org_id = $1 AND team_id = $2",
            "DELETE FROM team_role WHERE org_id = $1 AND team_id = $2",
        ];

        for statement in statements {
            sqlx::query(statement)
                .bind(org_id.value())
                .bind(team_id.value())
                .execute(&mut *tx)
                .await
                .map_err(|e| DomainError::storage(format!("Failed to delete team: {}", e)))?;
        }

        sqlx::query("DELETE FROM permission WHERE scope = $1")
            .bind(team_id.scope())
            .execute(&mut *tx)
            .await
            .map_err(|e| {
                DomainError::storage(format!("Failed to delete team permissions: {}", e))
            })?;

        commit(tx).await
    }

    async fn get(&self, query: &GetTeamQuery) -> Result<TeamView, DomainError> {
        let mut builder = QueryBuilder::new("");
        push_team_select(&mut builder, &query.hidden_users, query.user_filter);
        push_team_from(&mut builder, query.user_filter);
        builder.push(" WHERE team.org_id = ");
        builder.push_bind(query.org_id.value());
        builder.push(" AND team.id = ");
        builder.push_bind(query.team_id.value());

        let row = builder
            .build()
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| DomainError::storage(format!("Failed to get team: {}", e)))?;

        match row {
            Some(row) => team_view_from_row(&row),
            None => Err(DomainError::team_not_found(format!(
                "Team {} not found in org {}",
                query.team_id, query.org_id
            ))),
        }
    }

    async fn find_by_name(&self, org_id: OrgId, name: &str) -> Result<Option<Team>, DomainError> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM team WHERE org_id = $1 AND name = $2",
            TEAM_COLUMNS
        ))
        .bind(org_id.value())
        .bind(name)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| DomainError::storage(format!("Failed to find team: {}", e)))?;

        row.as_ref().map(team_from_row).transpose()
    }

    async fn search(&self, query: &TeamSearchQuery) -> Result<TeamSearchResult, DomainError> {
        let mut builder = QueryBuilder::new("");
        push_team_select(&mut builder, &query.hidden_users, query.user_filter);
        push_team_from(&mut builder, query.user_filter);
        push_search_where(&mut builder, query);
        builder.push(TEAM_ORDER);

        if let Some(offset) = query.offset() {
            builder.push(" LIMIT ");
            builder.push_bind(i64::from(query.per_page));
            builder.push(" OFFSET ");
            builder.push_bind(offset as i64);
        }

        let rows = builder
            .build()
            .fetch_all(&self.pool)
            .await
            .map_err(|e| DomainError::storage(format!("Failed to search teams: {}", e)))?;

        let teams = rows
            .iter()
            .map(team_view_from_row)
            .collect::<Result<Vec<_>, _>>()?;

        let mut count = QueryBuilder::new("SELECT COUNT(*)");
        push_team_from(&mut count, query.user_filter);
        push_search_where(&mut count, query);

        let total_count: i64 = count
            .build_query_scalar()
            .fetch_one(&self.pool)
            .await
            .map_err(|e| DomainError::storage(format!("Failed to count teams: {}", e)))?;

        Ok(TeamSearchResult {
            teams,
            total_count,
            page: query.page,
            per_page: query.per_page,
        })
    }

    async fn list_by_user(&self, org_id: OrgId, user_id: UserId) -> Result<Vec<TeamView>, DomainError> {
        let mut builder = QueryBuilder::new("");
        push_team_select(&mut builder, &[], Some(user_id));
        push_team_from(&mut builder, Some(user_id));
        builder.push(" WHERE team.org_id = ");
        builder.push_bind(org_id.value());
        builder.push(TEAM_ORDER);

        let rows = builder
            .build()
            .fetch_all(&self.pool)
            .await
            .map_err(|e| DomainError::storage(format!("Failed to list user teams: {}", e)))?;

        rows.iter().map(team_view_from_row).collect()
    }

    async fn ping(&self) -> Result<(), DomainError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| DomainError::storage(format!("Database ping failed: {}", e)))?;

        Ok(())
    }
}

#[async_trait]
impl MembershipRepository for PostgresTeamRepository {
    async fn add(&self, membership: Membership) -> Result<Membership, DomainError> {
        let key = membership.key();
        let mut tx = self.begin().await?;

        if member_exists(&mut tx, &key).await? {
            return Err(DomainError::already_member(key.to_string()));
        }

        ensure_team(&mut tx, key.org_id, key.team_id).await?;
        insert_member(&mut tx, &membership).await?;
        commit(tx).await?;

        Ok(membership)
    }

    async fn add_or_update(&self, membership: Membership) -> Result<(), DomainError> {
        let key = membership.key();
        let mut tx = self.begin().await?;

        if member_exists(&mut tx, &key).await? {
            update_member_permission(&mut tx, &key, membership.permission()).await?;
        } else {
            ensure_team(&mut tx, key.org_id, key.team_id).await?;
            insert_member(&mut tx, &membership).await?;
        }

        commit(tx).await
    }

    async fn update_permission(
        &self,
        key: &MembershipKey,
        permission: Permission,
    ) -> Result<(), DomainError> {
        let mut tx = self.begin().await?;
        update_member_permission(&mut tx, key, permission).await?;
        commit(tx).await
    }

    async fn remove(&self, key: &MembershipKey) -> Result<(), DomainError> {
        let mut tx = self.begin().await?;
        ensure_team(&mut tx, key.org_id, key.team_id).await?;

        let admin_ids = lock_admin_ids(&mut tx, key.org_id, key.team_id).await?;
        ensure_not_sole_admin(&admin_ids, key)?;

        let result = sqlx::query(
            "DELETE FROM team_member WHERE org_id = $1 AND team_id = $2 AND user_id = $3",
        )
        .bind(key.org_id.value())
        .bind(key.team_id.value())
        .bind(key.user_id.value())
        .execute(&mut *tx)
        .await
        .map_err(|e| DomainError::storage(format!("Failed to remove team member: {}", e)))?;

        if result.rows_affected() == 0 {
            return Err(DomainError::member_not_found(key.to_string()));
        }

        commit(tx).await
    }

    async fn is_member(&self, key: &MembershipKey) -> Result<bool, DomainError> {
        let mut conn = self
            .pool
            .acquire()
            .await
            .map_err(|e| DomainError::storage(format!("Failed to acquire connection: {}", e)))?;

        member_exists(&mut conn, key).await
    }

    async fn list(&self, query: &MemberQuery) -> Result<Vec<TeamMemberView>, DomainError> {
        let mut builder = QueryBuilder::new(
            r#"
            SELECT team_member.org_id, team_member.team_id, team_member.user_id,
                   "user".email, "user".name, "user".login,
                   team_member.external, team_member.permission,
                   user_auth.auth_module
            FROM team_member
            INNER JOIN "user" ON "user".id = team_member.user_id
            LEFT JOIN user_auth ON user_auth.id = (
                SELECT ua.id FROM user_auth AS ua
                WHERE ua.user_id = team_member.user_id
                ORDER BY ua.created DESC
                LIMIT 1
            )
            WHERE TRUE"#,
        );

        if let Some(org_id) = query.org_id {
            builder.push(" AND team_member.org_id = ");
            builder.push_bind(org_id.value());
        }

        if let Some(team_id) = query.team_id {
            builder.push(" AND team_member.team_id = ");
            builder.push_bind(team_id.value());
        }

        if let Some(user_id) = query.user_id {
            builder.push(" AND team_member.user_id = ");
            builder.push_bind(user_id.value());
        }

        if query.external_only {
            builder.push(" AND team_member.external = TRUE");
        }

        if let Some(filter) = &query.access_filter {
            builder.push(" AND (");
            push_access_filter(&mut builder, filter);
            builder.push(")");
        }

        builder.push(r#" ORDER BY "user".login COLLATE "C" ASC, "user".email COLLATE "C" ASC"#);

        let rows = builder
            .build()
            .fetch_all(&self.pool)
            .await
            .map_err(|e| DomainError::storage(format!("Failed to list team members: {}", e)))?;

        rows.iter().map(member_from_row).collect()
    }

    async fn is_admin_of_teams(&self, org_id: OrgId, user_id: UserId) -> Result<bool, DomainError> {
        sqlx::query_scalar(
            r#"
            SELECT EXISTS(
                SELECT 1 FROM team_member
                INNER JOIN team ON team.id = team_member.team_id
                WHERE team_member.org_id = $1 AND team_member.user_id = $2 AND team_member.permission = $3
            )
            "#,
        )
        .bind(org_id.value())
        .bind(user_id.value())
        .bind(Permission::Admin.value())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| DomainError::storage(format!("Failed to check team admin: {}", e)))
    }
}
