//! Team service for team and membership management

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::domain::access::{
    ACTION_ORG_USERS_READ, ACTION_TEAMS_READ, SCOPE_TEAMS_ID_PREFIX, SCOPE_USERS_ID_PREFIX,
};
use crate::domain::team::{validate_team_email, validate_team_name};
use crate::domain::{
    AccessFilterProvider, DomainError, GetTeamQuery, MemberQuery, Membership, MembershipKey,
    MembershipRepository, NewTeam, OrgId, Permission, SignedInUser, Team, TeamId,
    TeamMemberView, TeamRepository, TeamSearchQuery, TeamSearchResult, TeamView, UserId,
};

/// Column the team access filter applies to
const TEAM_ID_COLUMN: &str = "team.id";
/// Column the member access filter applies to
const USER_ID_COLUMN: &str = "\"user\".id";

/// Behaviour knobs for the team service
#[derive(Debug, Clone)]
pub struct TeamSettings {
    /// Logins excluded from member counts for regular users
    pub hidden_users: Vec<String>,
    /// Add the creator of a team as its first Admin
    pub creator_is_admin: bool,
    pub default_page_size: u32,
    pub max_page_size: u32,
}

impl Default for TeamSettings {
    fn default() -> Self {
        Self {
            hidden_users: Vec::new(),
            creator_is_admin: true,
            default_page_size: 100,
            max_page_size: 1000,
        }
    }
}

/// Request for creating a new team
#[derive(Debug, Clone)]
pub struct CreateTeamRequest {
    pub name: String,
    pub email: Option<String>,
}

/// Request for updating a team
#[derive(Debug, Clone)]
pub struct UpdateTeamRequest {
    pub name: String,
    pub email: Option<String>,
}

/// Request for searching teams
#[derive(Debug, Clone, Default)]
pub struct SearchTeamsRequest {
    pub query: Option<String>,
    pub name: Option<String>,
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

/// Team service for managing teams and their members
#[derive(Debug)]
pub struct TeamService {
    teams: Arc<dyn TeamRepository>,
    members: Arc<dyn MembershipRepository>,
    access: Arc<dyn AccessFilterProvider>,
    settings: TeamSettings,
}

impl TeamService {
    /// Create a new team service
    pub fn new(
        teams: Arc<dyn TeamRepository>,
        members: Arc<dyn MembershipRepository>,
        access: Arc<dyn AccessFilterProvider>,
    ) -> Self {
        Self {
            teams,
            members,
            access,
            settings: TeamSettings::default(),
        }
    }

    pub fn with_settings(mut self, settings: TeamSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn settings(&self) -> &TeamSettings {
        &self.settings
    }

    /// Hidden users apply to everyone but server admins, and never to oneself
    fn hidden_users_for(&self, user: &SignedInUser) -> Vec<String> {
        if user.is_server_admin {
            return Vec::new();
        }

        self.settings
            .hidden_users
            .iter()
            .filter(|login| **login != user.login)
            .cloned()
            .collect()
    }

    /// Create a new team in the user's organization
    pub async fn create_team(
        &self,
        user: &SignedInUser,
        request: CreateTeamRequest,
    ) -> Result<Team, DomainError> {
        info!(org_id = %user.org_id, name = %request.name, "Creating team");

        validate_team_name(&request.name).map_err(|e| DomainError::validation(e.to_string()))?;

        if let Some(email) = request.email.as_deref() {
            validate_team_email(email).map_err(|e| DomainError::validation(e.to_string()))?;
        }

        if self
            .teams
            .find_by_name(user.org_id, &request.name)
            .await?
            .is_some()
        {
            return Err(DomainError::name_taken(request.name));
        }

        let team = self
            .teams
            .create(NewTeam {
                org_id: user.org_id,
                name: request.name,
                email: request.email,
            })
            .await?;

        if self.settings.creator_is_admin {
            let key = MembershipKey::new(user.org_id, team.id(), user.user_id);
            self.members
                .add_or_update(Membership::new(key, false, Permission::Admin))
                .await?;
        }

        info!(team_id = %team.id(), org_id = %team.org_id(), "Team created");
        Ok(team)
    }

    /// Update a team's name and email
    pub async fn update_team(
        &self,
        user: &SignedInUser,
        team_id: TeamId,
        request: UpdateTeamRequest,
    ) -> Result<Team, DomainError> {
        info!(team_id = %team_id, org_id = %user.org_id, "Updating team");

        let mut team = self
            .teams
            .get(&GetTeamQuery::new(user.org_id, team_id))
            .await?
            .team;

        if let Some(other) = self.teams.find_by_name(user.org_id, &request.name).await? {
            if other.id() != team_id {
                return Err(DomainError::name_taken(request.name));
            }
        }

        team.set_name(request.name)
            .map_err(|e| DomainError::validation(e.to_string()))?;
        team.set_email(request.email)
            .map_err(|e| DomainError::validation(e.to_string()))?;

        self.teams.update(&team).await?;
        Ok(team)
    }

    /// Delete a team and every record referencing it
    pub async fn delete_team(&self, org_id: OrgId, team_id: TeamId) -> Result<(), DomainError> {
        info!(team_id = %team_id, org_id = %org_id, "Deleting team");
        self.teams.delete(org_id, team_id).await
    }

    /// Get a team as seen by the user
    pub async fn get_team(
        &self,
        user: &SignedInUser,
        team_id: TeamId,
    ) -> Result<TeamView, DomainError> {
        debug!(team_id = %team_id, org_id = %user.org_id, "Getting team");

        let query =
            GetTeamQuery::new(user.org_id, team_id).with_hidden_users(self.hidden_users_for(user));
        self.teams.get(&query).await
    }

    /// Search the teams the user may read
    pub async fn search_teams(
        &self,
        user: &SignedInUser,
        request: SearchTeamsRequest,
    ) -> Result<TeamSearchResult, DomainError> {
        let filter = self.access.filter(
            user,
            TEAM_ID_COLUMN,
            SCOPE_TEAMS_ID_PREFIX,
            ACTION_TEAMS_READ,
        )?;

        let per_page = request
            .per_page
            .unwrap_or(self.settings.default_page_size)
            .min(self.settings.max_page_size);
        let page = request.page.unwrap_or(1);

        let mut query = TeamSearchQuery::new(user.org_id)
            .with_page(page, per_page)
            .with_access_filter(filter)
            .with_hidden_users(self.hidden_users_for(user));

        if let Some(text) = request.query.filter(|q| !q.is_empty()) {
            query = query.with_query(text);
        }

        if let Some(name) = request.name.filter(|n| !n.is_empty()) {
            query = query.with_name(name);
        }

        let result = self.teams.search(&query).await?;
        debug!(
            org_id = %user.org_id,
            total = result.total_count,
            returned = result.teams.len(),
            "Searched teams"
        );

        Ok(result)
    }

    /// Teams the signed-in user belongs to, with their permission in each
    pub async fn teams_of_user(&self, user: &SignedInUser) -> Result<Vec<TeamView>, DomainError> {
        self.teams.list_by_user(user.org_id, user.user_id).await
    }

    /// Add a user to a team
    pub async fn add_member(
        &self,
        key: MembershipKey,
        external: bool,
        permission: Permission,
    ) -> Result<Membership, DomainError> {
        info!(
            team_id = %key.team_id,
            user_id = %key.user_id,
            permission = %permission,
            "Adding team member"
        );

        self.members
            .add(Membership::new(key, external, permission))
            .await
    }

    /// Add a user to a team, or update their permission if already a member
    pub async fn add_or_update_member(
        &self,
        key: MembershipKey,
        external: bool,
        permission: Permission,
    ) -> Result<(), DomainError> {
        info!(
            team_id = %key.team_id,
            user_id = %key.user_id,
            permission = %permission,
            "Adding or updating team member"
        );

        self.members
            .add_or_update(Membership::new(key, external, permission))
            .await
            .inspect_err(|e| log_rule_violation(e, &key))
    }

    /// Change a member's permission; unknown values count as Member
    pub async fn update_member(&self, key: MembershipKey, permission: i64) -> Result<(), DomainError> {
        let permission = Permission::normalize(permission);
        info!(
            team_id = %key.team_id,
            user_id = %key.user_id,
            permission = %permission,
            "Updating team member"
        );

        self.members
            .update_permission(&key, permission)
            .await
            .inspect_err(|e| log_rule_violation(e, &key))
    }

    /// Remove a user from a team
    pub async fn remove_member(&self, key: MembershipKey) -> Result<(), DomainError> {
        info!(team_id = %key.team_id, user_id = %key.user_id, "Removing team member");

        self.members
            .remove(&key)
            .await
            .inspect_err(|e| log_rule_violation(e, &key))
    }

    /// Members of a team restricted to the users the caller may read
    pub async fn list_members(
        &self,
        user: &SignedInUser,
        team_id: TeamId,
    ) -> Result<Vec<TeamMemberView>, DomainError> {
        // Surface TeamNotFound rather than an empty list
        self.teams
            .get(&GetTeamQuery::new(user.org_id, team_id))
            .await?;

        let filter = self.access.filter(
            user,
            USER_ID_COLUMN,
            SCOPE_USERS_ID_PREFIX,
            ACTION_ORG_USERS_READ,
        )?;

        let query = MemberQuery::new()
            .with_org(user.org_id)
            .with_team(team_id)
            .with_access_filter(filter);

        self.members.list(&query).await
    }

    /// Every membership of one user; no access filtering is applied
    pub async fn user_memberships(
        &self,
        org_id: OrgId,
        user_id: UserId,
        external_only: bool,
    ) -> Result<Vec<TeamMemberView>, DomainError> {
        let mut query = MemberQuery::new().with_org(org_id).with_user(user_id);

        if external_only {
            query = query.external_only();
        }

        self.members.list(&query).await
    }

    pub async fn is_member(&self, key: MembershipKey) -> Result<bool, DomainError> {
        self.members.is_member(&key).await
    }

    pub async fn is_admin_of_teams(
        &self,
        org_id: OrgId,
        user_id: UserId,
    ) -> Result<bool, DomainError> {
        self.members.is_admin_of_teams(org_id, user_id).await
    }

    /// Check that the backing store is reachable
    pub async fn ping(&self) -> Result<(), DomainError> {
        self.teams.ping().await
    }
}

fn log_rule_violation(error: &DomainError, key: &MembershipKey) {
    if let DomainError::LastAdminProtected { .. } = error {
        warn!(
            team_id = %key.team_id,
            user_id = %key.user_id,
            "Refused to strip the last admin of a team"
        );
    }
}
