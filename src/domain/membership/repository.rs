//! Membership repository trait

use async_trait::async_trait;

use super::entity::{Membership, MembershipKey, Permission, TeamMemberView, UserId};
use crate::domain::access::AccessFilter;
use crate::domain::team::{OrgId, TeamId};
use crate::domain::DomainError;

/// Query parameters for listing team members
///
/// Unset filters are unrestricted; leaving `org_id` unset lists across
/// organizations.
#[derive(Debug, Clone, Default)]
pub struct MemberQuery {
    pub org_id: Option<OrgId>,
    pub team_id: Option<TeamId>,
    pub user_id: Option<UserId>,
    /// Only memberships provisioned by an external identity source
    pub external_only: bool,
    /// Restricts visible users; applied to the user id column
    pub access_filter: Option<AccessFilter>,
}

impl MemberQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_org(mut self, org_id: OrgId) -> Self {
        self.org_id = Some(org_id);
        self
    }

    pub fn with_team(mut self, team_id: TeamId) -> Self {
        self.team_id = Some(team_id);
        self
    }

    pub fn with_user(mut self, user_id: UserId) -> Self {
        self.user_id = Some(user_id);
        self
    }

    pub fn external_only(mut self) -> Self {
        self.external_only = true;
        self
    }

    pub fn with_access_filter(mut self, filter: AccessFilter) -> Self {
        self.access_filter = Some(filter);
        self
    }
}

/// Repository for team memberships
///
/// Every mutating method runs in a single transaction. Guarded writes
/// (demotion, removal) perform the sole-admin check in that same transaction.
#[async_trait]
pub trait MembershipRepository: Send + Sync + std::fmt::Debug {
    /// Add a member; fails with `AlreadyMember` or `TeamNotFound`
    async fn add(&self, membership: Membership) -> Result<Membership, DomainError>;

    /// Update the member when present, otherwise add it
    async fn add_or_update(&self, membership: Membership) -> Result<(), DomainError>;

    /// Change a member's permission; fails with `MemberNotFound` or
    /// `LastAdminProtected`
    async fn update_permission(
        &self,
        key: &MembershipKey,
        permission: Permission,
    ) -> Result<(), DomainError>;

    /// Remove a member; fails with `TeamNotFound`, `LastAdminProtected` or
    /// `MemberNotFound`
    async fn remove(&self, key: &MembershipKey) -> Result<(), DomainError>;

    /// Check whether the membership exists
    async fn is_member(&self, key: &MembershipKey) -> Result<bool, DomainError>;

    /// List members joined with user attributes, ordered by login then email
    async fn list(&self, query: &MemberQuery) -> Result<Vec<TeamMemberView>, DomainError>;

    /// Whether the user is Admin of at least one team in the organization
    async fn is_admin_of_teams(&self, org_id: OrgId, user_id: UserId) -> Result<bool, DomainError>;
}
