//! Membership entity and related types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::team::{OrgId, TeamId};

/// User identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(i64);

impl UserId {
    pub const fn new(id: i64) -> Self {
        Self(id)
    }

    pub const fn value(&self) -> i64 {
        self.0
    }
}

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Permission level of a membership
///
/// Stored and transmitted as an integer: Member is `0`, Admin is `4`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "i64", into = "i64")]
pub enum Permission {
    #[default]
    Member,
    Admin,
}

impl Permission {
    const ADMIN_VALUE: i64 = 4;

    /// Coerce a raw permission value; anything that is not Admin is Member
    pub fn normalize(value: i64) -> Self {
        if value == Self::ADMIN_VALUE {
            Self::Admin
        } else {
            Self::Member
        }
    }

    pub fn value(&self) -> i64 {
        match self {
            Self::Member => 0,
            Self::Admin => Self::ADMIN_VALUE,
        }
    }

    pub fn is_admin(&self) -> bool {
        matches!(self, Self::Admin)
    }
}

impl From<i64> for Permission {
    fn from(value: i64) -> Self {
        Self::normalize(value)
    }
}

impl From<Permission> for i64 {
    fn from(permission: Permission) -> Self {
        permission.value()
    }
}

impl std::fmt::Display for Permission {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Member => write!(f, "member"),
            Self::Admin => write!(f, "admin"),
        }
    }
}

/// Identifies one membership row
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MembershipKey {
    pub org_id: OrgId,
    pub team_id: TeamId,
    pub user_id: UserId,
}

impl MembershipKey {
    pub fn new(org_id: OrgId, team_id: TeamId, user_id: UserId) -> Self {
        Self {
            org_id,
            team_id,
            user_id,
        }
    }
}

impl std::fmt::Display for MembershipKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "user {} in team {} (org {})",
            self.user_id, self.team_id, self.org_id
        )
    }
}

/// The relation row linking a user to a team
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Membership {
    org_id: OrgId,
    team_id: TeamId,
    user_id: UserId,
    /// Provisioned by an external identity source
    external: bool,
    permission: Permission,
    created: DateTime<Utc>,
    updated: DateTime<Utc>,
}

impl Membership {
    /// Create a new membership stamped with the current time
    pub fn new(key: MembershipKey, external: bool, permission: Permission) -> Self {
        let now = Utc::now();

        Self {
            org_id: key.org_id,
            team_id: key.team_id,
            user_id: key.user_id,
            external,
            permission,
            created: now,
            updated: now,
        }
    }

    /// Restore stored timestamps (builder pattern)
    pub fn with_timestamps(mut self, created: DateTime<Utc>, updated: DateTime<Utc>) -> Self {
        self.created = created;
        self.updated = updated;
        self
    }

    // Getters

    pub fn key(&self) -> MembershipKey {
        MembershipKey::new(self.org_id, self.team_id, self.user_id)
    }

    pub fn org_id(&self) -> OrgId {
        self.org_id
    }

    pub fn team_id(&self) -> TeamId {
        self.team_id
    }

    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    pub fn is_external(&self) -> bool {
        self.external
    }

    pub fn permission(&self) -> Permission {
        self.permission
    }

    pub fn created(&self) -> DateTime<Utc> {
        self.created
    }

    pub fn updated(&self) -> DateTime<Utc> {
        self.updated
    }

    // Mutators

    pub fn set_permission(&mut self, permission: Permission) {
        self.permission = permission;
        self.updated = Utc::now();
    }
}

/// A membership joined with the member's display attributes
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TeamMemberView {
    pub org_id: OrgId,
    pub team_id: TeamId,
    pub user_id: UserId,
    pub email: String,
    pub name: String,
    pub login: String,
    pub external: bool,
    pub permission: Permission,
    /// Identity provider of the user's most recent login link
    pub auth_module: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key() -> MembershipKey {
        MembershipKey::new(OrgId::new(1), TeamId::new(42), UserId::new(7))
    }

    #[test]
    fn test_permission_normalize() {
        assert_eq!(Permission::normalize(4), Permission::Admin);
        assert_eq!(Permission::normalize(0), Permission::Member);
        assert_eq!(Permission::normalize(1), Permission::Member);
        assert_eq!(Permission::normalize(2), Permission::Member);
        assert_eq!(Permission::normalize(-5), Permission::Member);
    }

    #[test]
    fn test_permission_values() {
        assert_eq!(Permission::Member.value(), 0);
        assert_eq!(Permission::Admin.value(), 4);
        assert!(Permission::Admin.is_admin());
        assert!(!Permission::Member.is_admin());
    }

    #[test]
    fn test_permission_serde() {
        assert_eq!(serde_json::to_string(&Permission::Admin).unwrap(), "4");

        let coerced: Permission = serde_json::from_str("2").unwrap();
        assert_eq!(coerced, Permission::Member);
    }

    #[test]
    fn test_membership_creation() {
        let membership = Membership::new(key(), true, Permission::Admin);

        assert_eq!(membership.key(), key());
        assert!(membership.is_external());
        assert_eq!(membership.permission(), Permission::Admin);
        assert_eq!(membership.created(), membership.updated());
    }

    #[test]
    fn test_membership_set_permission_touches() {
        let mut membership = Membership::new(key(), false, Permission::Admin);
        let original_updated = membership.updated();

        std::thread::sleep(std::time::Duration::from_millis(10));

        membership.set_permission(Permission::Member);
        assert_eq!(membership.permission(), Permission::Member);
        assert!(membership.updated() > original_updated);
        assert!(membership.created() < membership.updated());
    }

    #[test]
    fn test_membership_key_display() {
        assert_eq!(key().to_string(), "user 7 in team 42 (org 1)");
    }
}
