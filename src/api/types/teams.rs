//! Team API request and response types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{TeamMemberView, TeamView};

#[derive(Debug, Clone, Deserialize)]
pub struct CreateTeamBody {
    pub name: String,
    #[serde(default)]
    pub email: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UpdateTeamBody {
    pub name: String,
    #[serde(default)]
    pub email: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddMemberBody {
    pub user_id: i64,
    /// Raw permission value; anything but 4 (Admin) means Member
    #[serde(default)]
    pub permission: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UpdateMemberBody {
    pub permission: i64,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SearchTeamsParams {
    pub query: Option<String>,
    pub name: Option<String>,
    pub page: Option<u32>,
    pub perpage: Option<u32>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UserMembershipsParams {
    #[serde(default)]
    pub external: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TeamDto {
    pub id: i64,
    pub org_id: i64,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    pub member_count: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub permission: Option<i64>,
    pub created: DateTime<Utc>,
    pub updated: DateTime<Utc>,
}

impl From<TeamView> for TeamDto {
    fn from(view: TeamView) -> Self {
        Self {
            id: view.team.id().value(),
            org_id: view.team.org_id().value(),
            name: view.team.name().to_string(),
            email: view.team.email().map(str::to_string),
            member_count: view.member_count,
            permission: view.permission.map(|p| p.value()),
            created: view.team.created(),
            updated: view.team.updated(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MemberDto {
    pub org_id: i64,
    pub team_id: i64,
    pub user_id: i64,
    pub email: String,
    pub name: String,
    pub login: String,
    pub external: bool,
    pub permission: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auth_module: Option<String>,
}

impl From<TeamMemberView> for MemberDto {
    fn from(view: TeamMemberView) -> Self {
        Self {
            org_id: view.org_id.value(),
            team_id: view.team_id.value(),
            user_id: view.user_id.value(),
            email: view.email,
            name: view.name,
            login: view.login,
            external: view.external,
            permission: view.permission.value(),
            auth_module: view.auth_module,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchTeamsResponse {
    pub total_count: i64,
    pub teams: Vec<TeamDto>,
    pub page: u32,
    pub per_page: u32,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatedTeamResponse {
    pub team_id: i64,
    pub message: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{OrgId, Permission, Team, TeamId, UserId};

    #[test]
    fn test_team_dto_camel_case() {
        let team = Team::new(TeamId::new(7), OrgId::new(1), "Ops", None).unwrap();
        let dto = TeamDto::from(TeamView::new(team, 3).with_permission(Permission::Admin));
        let json = serde_json::to_value(&dto).unwrap();

        assert_eq!(json["id"], 7);
        assert_eq!(json["orgId"], 1);
        assert_eq!(json["memberCount"], 3);
        assert_eq!(json["permission"], 4);
        assert!(json.get("email").is_none());
    }

    #[test]
    fn test_member_dto() {
        let dto = MemberDto::from(TeamMemberView {
            org_id: OrgId::new(1),
            team_id: TeamId::new(2),
            user_id: UserId::new(3),
            email: "ann@example.com".to_string(),
            name: "Ann".to_string(),
            login: "ann".to_string(),
            external: true,
            permission: Permission::Member,
            auth_module: Some("ldap".to_string()),
        });
        let json = serde_json::to_value(&dto).unwrap();

        assert_eq!(json["userId"], 3);
        assert_eq!(json["permission"], 0);
        assert_eq!(json["authModule"], "ldap");
    }

    #[test]
    fn test_add_member_body_defaults_to_member() {
        let body: AddMemberBody = serde_json::from_str(r#"{"userId": 5}"#).unwrap();
        assert_eq!(body.user_id, 5);
        assert_eq!(body.permission, 0);
    }
}
