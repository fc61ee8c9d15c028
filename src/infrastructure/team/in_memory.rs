//! In-memory team and membership repository
//!
//! Useful for testing and development. Every mutation holds the write lock for
//! its whole check-then-write sequence, which makes mutations serializable.

use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::membership::{ensure_not_sole_admin, PermissionChange};
use crate::domain::{
    DomainError, GetTeamQuery, MemberQuery, Membership, MembershipKey, MembershipRepository,
    NewTeam, OrgId, Permission, Team, TeamId, TeamMemberView, TeamRepository, TeamSearchQuery,
    TeamSearchResult, TeamView, UserId,
};

/// Display attributes of a user, joined into member listings
#[derive(Debug, Clone, PartialEq)]
pub struct UserProfile {
    pub id: UserId,
    pub login: String,
    pub email: String,
    pub name: String,
}

impl UserProfile {
    pub fn new(
        id: UserId,
        login: impl Into<String>,
        email: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        Self {
            id,
            login: login.into(),
            email: email.into(),
            name: name.into(),
        }
    }
}

#[derive(Debug, Clone)]
struct AuthLink {
    user_id: UserId,
    auth_module: String,
    created: DateTime<Utc>,
}

/// Records that reference a team and go away with it
#[derive(Debug, Default)]
struct ScopedRecords {
    dashboard_acl: Vec<(OrgId, TeamId)>,
    team_roles: Vec<(OrgId, TeamId)>,
    permission_scopes: Vec<String>,
}

/// Case-insensitive by name, ties broken by id
fn by_team_name(a: &TeamView, b: &TeamView) -> Ordering {
    a.team
        .name()
        .to_lowercase()
        .cmp(&b.team.name().to_lowercase())
        .then_with(|| a.team.id().cmp(&b.team.id()))
}

#[derive(Debug, Default)]
struct State {
    teams: BTreeMap<TeamId, Team>,
    members: BTreeMap<MembershipKey, Membership>,
    users: HashMap<UserId, UserProfile>,
    auth_links: Vec<AuthLink>,
    scoped: ScopedRecords,
    next_team_id: i64,
}

impl State {
    fn team(&self, org_id: OrgId, team_id: TeamId) -> Option<&Team> {
        self.teams
            .get(&team_id)
            .filter(|team| team.org_id() == org_id)
    }

    fn ensure_team(&self, org_id: OrgId, team_id: TeamId) -> Result<(), DomainError> {
        match self.team(org_id, team_id) {
            Some(_) => Ok(()),
            None => Err(DomainError::team_not_found(format!(
                "Team {} not found in org {}",
                team_id, org_id
            ))),
        }
    }

    fn admin_ids(&self, org_id: OrgId, team_id: TeamId) -> Vec<UserId> {
        self.members
            .values()
            .filter(|m| m.org_id() == org_id && m.team_id() == team_id)
            .filter(|m| m.permission().is_admin())
            .map(Membership::user_id)
            .collect()
    }

    fn member_count(&self, team_id: TeamId, hidden_users: &[String]) -> i64 {
        self.members
            .values()
            .filter(|m| m.team_id() == team_id)
            .filter(|m| {
                if hidden_users.is_empty() {
                    return true;
                }

                self.users
                    .get(&m.user_id())
                    .is_some_and(|user| !hidden_users.contains(&user.login))
            })
            .count() as i64
    }

    fn latest_auth_module(&self, user_id: UserId) -> Option<String> {
        self.auth_links
            .iter()
            .filter(|link| link.user_id == user_id)
            .max_by_key(|link| link.created)
            .map(|link| link.auth_module.clone())
    }

    fn update_permission(
        &mut self,
        key: &MembershipKey,
        permission: Permission,
    ) -> Result<(), DomainError> {
        if !self.members.contains_key(key) {
            return Err(DomainError::member_not_found(key.to_string()));
        }

        let change = PermissionChange::plan(permission);

        if change.guarded {
            ensure_not_sole_admin(&self.admin_ids(key.org_id, key.team_id), key)?;
        }

        if let Some(member) = self.members.get_mut(key) {
            member.set_permission(change.permission);
        }

        Ok(())
    }

    fn insert_member(&mut self, membership: Membership) -> Result<Membership, DomainError> {
        self.ensure_team(membership.org_id(), membership.team_id())?;
        self.members.insert(membership.key(), membership.clone());
        Ok(membership)
    }
}

/// Thread-safe in-memory implementation of both team repositories
#[derive(Debug, Default)]
pub struct InMemoryTeamRepository {
    state: RwLock<State>,
}

impl InMemoryTeamRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a user whose attributes appear in member listings
    pub fn add_user(&self, user: UserProfile) -> Result<(), DomainError> {
        let mut state = self.write()?;
        state.users.insert(user.id, user);
        Ok(())
    }

    /// Record a login link between a user and an identity provider
    pub fn add_auth_link(
        &self,
        user_id: UserId,
        auth_module: impl Into<String>,
        created: DateTime<Utc>,
    ) -> Result<(), DomainError> {
        let mut state = self.write()?;
        state.auth_links.push(AuthLink {
            user_id,
            auth_module: auth_module.into(),
            created,
        });
        Ok(())
    }

    /// Attach a dashboard ACL entry, a role assignment and a scoped
    /// permission to the team
    pub fn attach_team_records(&self, org_id: OrgId, team_id: TeamId) -> Result<(), DomainError> {
        let mut state = self.write()?;
        state.scoped.dashboard_acl.push((org_id, team_id));
        state.scoped.team_roles.push((org_id, team_id));
        state.scoped.permission_scopes.push(team_id.scope());
        Ok(())
    }

    /// Number of records still referencing the team
    pub fn team_record_count(&self, team_id: TeamId) -> Result<usize, DomainError> {
        let state = self.read()?;
        let scope = team_id.scope();

        Ok(state.scoped.dashboard_acl.iter().filter(|(_, t)| *t == team_id).count()
            + state.scoped.team_roles.iter().filter(|(_, t)| *t == team_id).count()
            + state.scoped.permission_scopes.iter().filter(|s| **s == scope).count())
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, State>, DomainError> {
        self.state
            .read()
            .map_err(|e| DomainError::storage(format!("Failed to acquire read lock: {}", e)))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, State>, DomainError> {
        self.state
            .write()
            .map_err(|e| DomainError::storage(format!("Failed to acquire write lock: {}", e)))
    }
}

#[async_trait]
impl TeamRepository for InMemoryTeamRepository {
    async fn create(&self, new_team: NewTeam) -> Result<Team, DomainError> {
        let mut state = self.write()?;

        let taken = state
            .teams
            .values()
            .any(|t| t.org_id() == new_team.org_id && t.name() == new_team.name);

        if taken {
            return Err(DomainError::name_taken(new_team.name));
        }

        state.next_team_id += 1;
        let id = TeamId::new(state.next_team_id);
        let team = Team::new(id, new_team.org_id, new_team.name, new_team.email)
            .map_err(|e| DomainError::validation(e.to_string()))?;

        state.teams.insert(id, team.clone());
        Ok(team)
    }

    async fn update(&self, team: &Team) -> Result<(), DomainError> {
        let mut state = self.write()?;

        let taken = state.teams.values().any(|t| {
            t.org_id() == team.org_id() && t.name() == team.name() && t.id() != team.id()
        });

        if taken {
            return Err(DomainError::name_taken(team.name()));
        }

        match state.teams.get_mut(&team.id()) {
            Some(existing) if existing.org_id() == team.org_id() => {
                *existing = team.clone();
                Ok(())
            }
            _ => Err(DomainError::team_not_found(format!(
                "Team {} not found in org {}",
                team.id(),
                team.org_id()
            ))),
        }
    }

    async fn delete(&self, org_id: OrgId, team_id: TeamId) -> Result<(), DomainError> {
        let mut state = self.write()?;
        state.ensure_team(org_id, team_id)?;

        // Same order as the SQL store: members, team, ACL, roles, permissions
        state
            .members
            .retain(|key, _| !(key.org_id == org_id && key.team_id == team_id));
        state.teams.remove(&team_id);
        state
            .scoped
            .dashboard_acl
            .retain(|entry| *entry != (org_id, team_id));
        state
            .scoped
            .team_roles
            .retain(|entry| *entry != (org_id, team_id));

        let scope = team_id.scope();
        state.scoped.permission_scopes.retain(|s| *s != scope);

        Ok(())
    }

    async fn get(&self, query: &GetTeamQuery) -> Result<TeamView, DomainError> {
        let state = self.read()?;

        let not_found = || {
            DomainError::team_not_found(format!(
                "Team {} not found in org {}",
                query.team_id, query.org_id
            ))
        };

        let team = state.team(query.org_id, query.team_id).ok_or_else(not_found)?;

        if let Some(user_id) = query.user_filter {
            let key = MembershipKey::new(query.org_id, query.team_id, user_id);

            if !state.members.contains_key(&key) {
                return Err(not_found());
            }
        }

        let count = state.member_count(team.id(), &query.hidden_users);
        Ok(TeamView::new(team.clone(), count))
    }

    async fn find_by_name(&self, org_id: OrgId, name: &str) -> Result<Option<Team>, DomainError> {
        let state = self.read()?;

        Ok(state
            .teams
            .values()
            .find(|t| t.org_id() == org_id && t.name() == name)
            .cloned())
    }

    async fn search(&self, query: &TeamSearchQuery) -> Result<TeamSearchResult, DomainError> {
        let state = self.read()?;
        let needle = query.query.as_deref().map(str::to_lowercase);

        let mut matches: Vec<TeamView> = state
            .teams
            .values()
            .filter(|t| t.org_id() == query.org_id)
            .filter(|t| match &needle {
                Some(needle) => t.name().to_lowercase().contains(needle.as_str()),
                None => true,
            })
            .filter(|t| query.name.as_deref().is_none_or(|name| t.name() == name))
            .filter(|t| {
                query
                    .access_filter
                    .as_ref()
                    .is_none_or(|filter| filter.permits(t.id().value()))
            })
            .filter_map(|t| {
                let view = TeamView::new(t.clone(), state.member_count(t.id(), &query.hidden_users));

                match query.user_filter {
                    Some(user_id) => state
                        .members
                        .get(&MembershipKey::new(query.org_id, t.id(), user_id))
                        .map(|m| view.with_permission(m.permission())),
                    None => Some(view),
                }
            })
            .collect();

        matches.sort_by(by_team_name);
        let total_count = matches.len() as i64;

        let teams = match query.offset() {
            Some(offset) => matches
                .into_iter()
                .skip(offset as usize)
                .take(query.per_page as usize)
                .collect(),
            None => matches,
        };

        Ok(TeamSearchResult {
            teams,
            total_count,
            page: query.page,
            per_page: query.per_page,
        })
    }

    async fn list_by_user(&self, org_id: OrgId, user_id: UserId) -> Result<Vec<TeamView>, DomainError> {
        let state = self.read()?;

        let mut teams: Vec<TeamView> = state
            .members
            .values()
            .filter(|m| m.org_id() == org_id && m.user_id() == user_id)
            .filter_map(|m| {
                let team = state.team(org_id, m.team_id())?;
                let count = state.member_count(team.id(), &[]);
                Some(TeamView::new(team.clone(), count).with_permission(m.permission()))
            })
            .collect();

        teams.sort_by(by_team_name);
        Ok(teams)
    }

    async fn ping(&self) -> Result<(), DomainError> {
        self.read().map(|_| ())
    }
}

#[async_trait]
impl MembershipRepository for InMemoryTeamRepository {
    async fn add(&self, membership: Membership) -> Result<Membership, DomainError> {
        let mut state = self.write()?;
        let key = membership.key();

        if state.members.contains_key(&key) {
            return Err(DomainError::already_member(key.to_string()));
        }

        state.insert_member(membership)
    }

    async fn add_or_update(&self, membership: Membership) -> Result<(), DomainError> {
        let mut state = self.write()?;
        let key = membership.key();

        if state.members.contains_key(&key) {
            state.update_permission(&key, membership.permission())
        } else {
            state.insert_member(membership).map(|_| ())
        }
    }

    async fn update_permission(
        &self,
        key: &MembershipKey,
        permission: Permission,
    ) -> Result<(), DomainError> {
        self.write()?.update_permission(key, permission)
    }

    async fn remove(&self, key: &MembershipKey) -> Result<(), DomainError> {
        let mut state = self.write()?;
        state.ensure_team(key.org_id, key.team_id)?;
        ensure_not_sole_admin(&state.admin_ids(key.org_id, key.team_id), key)?;

        match state.members.remove(key) {
            Some(_) => Ok(()),
            None => Err(DomainError::member_not_found(key.to_string())),
        }
    }

    async fn is_member(&self, key: &MembershipKey) -> Result<bool, DomainError> {
        Ok(self.read()?.members.contains_key(key))
    }

    async fn list(&self, query: &MemberQuery) -> Result<Vec<TeamMemberView>, DomainError> {
        let state = self.read()?;

        let mut members: Vec<TeamMemberView> = state
            .members
            .values()
            .filter(|m| query.org_id.is_none_or(|org| m.org_id() == org))
            .filter(|m| query.team_id.is_none_or(|team| m.team_id() == team))
            .filter(|m| query.user_id.is_none_or(|user| m.user_id() == user))
            .filter(|m| !query.external_only || m.is_external())
            .filter(|m| {
                query
                    .access_filter
                    .as_ref()
                    .is_none_or(|filter| filter.permits(m.user_id().value()))
            })
            .filter_map(|m| {
                let user = state.users.get(&m.user_id())?;

                Some(TeamMemberView {
                    org_id: m.org_id(),
                    team_id: m.team_id(),
                    user_id: m.user_id(),
                    email: user.email.clone(),
                    name: user.name.clone(),
                    login: user.login.clone(),
                    external: m.is_external(),
                    permission: m.permission(),
                    auth_module: state.latest_auth_module(m.user_id()),
                })
            })
            .collect();

        members.sort_by(|a, b| a.login.cmp(&b.login).then_with(|| a.email.cmp(&b.email)));
        Ok(members)
    }

    async fn is_admin_of_teams(&self, org_id: OrgId, user_id: UserId) -> Result<bool, DomainError> {
        let state = self.read()?;

        Ok(state.members.values().any(|m| {
            m.org_id() == org_id
                && m.user_id() == user_id
                && m.permission().is_admin()
                && state.team(org_id, m.team_id()).is_some()
        }))
    }
}
