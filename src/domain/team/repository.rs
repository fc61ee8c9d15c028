//! Team repository trait

use async_trait::async_trait;

use super::entity::{OrgId, Team, TeamId, TeamView};
use crate::domain::access::AccessFilter;
use crate::domain::membership::UserId;
use crate::domain::DomainError;

/// Attributes of a team about to be created
#[derive(Debug, Clone, PartialEq)]
pub struct NewTeam {
    pub org_id: OrgId,
    pub name: String,
    pub email: Option<String>,
}

/// Query for a single team
#[derive(Debug, Clone)]
pub struct GetTeamQuery {
    pub org_id: OrgId,
    pub team_id: TeamId,
    /// Only return the team when this user is a member
    pub user_filter: Option<UserId>,
    /// Logins excluded from the member count
    pub hidden_users: Vec<String>,
}

impl GetTeamQuery {
    pub fn new(org_id: OrgId, team_id: TeamId) -> Self {
        Self {
            org_id,
            team_id,
            user_filter: None,
            hidden_users: Vec::new(),
        }
    }

    pub fn with_user_filter(mut self, user_id: UserId) -> Self {
        self.user_filter = Some(user_id);
        self
    }

    pub fn with_hidden_users(mut self, hidden_users: Vec<String>) -> Self {
        self.hidden_users = hidden_users;
        self
    }
}

/// Query parameters for searching teams
#[derive(Debug, Clone)]
pub struct TeamSearchQuery {
    pub org_id: OrgId,
    /// Case-insensitive substring matched against the name
    pub query: Option<String>,
    /// Exact name match
    pub name: Option<String>,
    /// 1-based page number
    pub page: u32,
    /// Page size; `0` returns every match
    pub per_page: u32,
    /// Only teams this user is a member of; their permission is returned
    pub user_filter: Option<UserId>,
    /// Restricts visible teams; applied to the team id column
    pub access_filter: Option<AccessFilter>,
    /// Logins excluded from the member count
    pub hidden_users: Vec<String>,
}

impl TeamSearchQuery {
    pub fn new(org_id: OrgId) -> Self {
        Self {
            org_id,
            query: None,
            name: None,
            page: 1,
            per_page: 0,
            user_filter: None,
            access_filter: None,
            hidden_users: Vec::new(),
        }
    }

    pub fn with_query(mut self, query: impl Into<String>) -> Self {
        self.query = Some(query.into());
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_page(mut self, page: u32, per_page: u32) -> Self {
        self.page = page.max(1);
        self.per_page = per_page;
        self
    }

    pub fn with_user_filter(mut self, user_id: UserId) -> Self {
        self.user_filter = Some(user_id);
        self
    }

    pub fn with_access_filter(mut self, filter: AccessFilter) -> Self {
        self.access_filter = Some(filter);
        self
    }

    pub fn with_hidden_users(mut self, hidden_users: Vec<String>) -> Self {
        self.hidden_users = hidden_users;
        self
    }

    /// Number of rows to skip, or `None` when pagination is off
    pub fn offset(&self) -> Option<u64> {
        if self.per_page == 0 {
            return None;
        }

        Some(u64::from(self.per_page) * u64::from(self.page.max(1) - 1))
    }
}

/// One page of search results and the total match count
#[derive(Debug, Clone, PartialEq)]
pub struct TeamSearchResult {
    pub teams: Vec<TeamView>,
    pub total_count: i64,
    pub page: u32,
    pub per_page: u32,
}

/// Repository for teams
#[async_trait]
pub trait TeamRepository: Send + Sync + std::fmt::Debug {
    /// Insert a team and return it with its assigned id
    async fn create(&self, team: NewTeam) -> Result<Team, DomainError>;

    /// Persist name and email; fails with `TeamNotFound`
    async fn update(&self, team: &Team) -> Result<(), DomainError>;

    /// Delete a team with its members and every record scoped to it
    async fn delete(&self, org_id: OrgId, team_id: TeamId) -> Result<(), DomainError>;

    /// Get a team; fails with `TeamNotFound`
    async fn get(&self, query: &GetTeamQuery) -> Result<TeamView, DomainError>;

    /// Find a team of the organization by exact name
    async fn find_by_name(&self, org_id: OrgId, name: &str) -> Result<Option<Team>, DomainError>;

    /// Search teams, ordered by name
    async fn search(&self, query: &TeamSearchQuery) -> Result<TeamSearchResult, DomainError>;

    /// Every team the user is a member of
    async fn list_by_user(&self, org_id: OrgId, user_id: UserId) -> Result<Vec<TeamView>, DomainError>;

    /// Check the store is reachable
    async fn ping(&self) -> Result<(), DomainError>;
}
