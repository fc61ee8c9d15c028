//! Team entity and related types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::validation::{validate_team_email, validate_team_name, TeamValidationError};
use crate::domain::membership::Permission;

/// Organization identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrgId(i64);

impl OrgId {
    pub const fn new(id: i64) -> Self {
        Self(id)
    }

    pub const fn value(&self) -> i64 {
        self.0
    }
}

impl std::fmt::Display for OrgId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Team identifier, unique across organizations
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TeamId(i64);

impl TeamId {
    pub const fn new(id: i64) -> Self {
        Self(id)
    }

    pub const fn value(&self) -> i64 {
        self.0
    }

    /// Access-control scope naming this team
    pub fn scope(&self) -> String {
        format!("teams:id:{}", self.0)
    }
}

impl std::fmt::Display for TeamId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Team entity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Team {
    id: TeamId,
    org_id: OrgId,
    name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    email: Option<String>,
    created: DateTime<Utc>,
    updated: DateTime<Utc>,
}

impl Team {
    /// Create a new team
    pub fn new(
        id: TeamId,
        org_id: OrgId,
        name: impl Into<String>,
        email: Option<String>,
    ) -> Result<Self, TeamValidationError> {
        let name = name.into();
        validate_team_name(&name)?;

        if let Some(email) = email.as_deref() {
            validate_team_email(email)?;
        }

        let now = Utc::now();

        Ok(Self {
            id,
            org_id,
            name,
            email,
            created: now,
            updated: now,
        })
    }

    /// Restore stored timestamps (builder pattern)
    pub fn with_timestamps(mut self, created: DateTime<Utc>, updated: DateTime<Utc>) -> Self {
        self.created = created;
        self.updated = updated;
        self
    }

    // Getters

    pub fn id(&self) -> TeamId {
        self.id
    }

    pub fn org_id(&self) -> OrgId {
        self.org_id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn email(&self) -> Option<&str> {
        self.email.as_deref()
    }

    pub fn created(&self) -> DateTime<Utc> {
        self.created
    }

    pub fn updated(&self) -> DateTime<Utc> {
        self.updated
    }

    // Mutators

    /// Update the name
    pub fn set_name(&mut self, name: impl Into<String>) -> Result<(), TeamValidationError> {
        let name = name.into();
        validate_team_name(&name)?;
        self.name = name;
        self.touch();
        Ok(())
    }

    /// Update the contact email; `None` clears it
    pub fn set_email(&mut self, email: Option<String>) -> Result<(), TeamValidationError> {
        if let Some(email) = email.as_deref() {
            validate_team_email(email)?;
        }
        self.email = email;
        self.touch();
        Ok(())
    }

    fn touch(&mut self) {
        self.updated = Utc::now();
    }
}

/// A team as presented to readers: the entity plus derived attributes
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TeamView {
    #[serde(flatten)]
    pub team: Team,
    /// Number of members, excluding hidden users
    pub member_count: i64,
    /// Permission of the filtering user, when listed from a user's perspective
    #[serde(skip_serializing_if = "Option::is_none")]
    pub permission: Option<Permission>,
}

impl TeamView {
    pub fn new(team: Team, member_count: i64) -> Self {
        Self {
            team,
            member_count,
            permission: None,
        }
    }

    pub fn with_permission(mut self, permission: Permission) -> Self {
        self.permission = Some(permission);
        self
    }
}
