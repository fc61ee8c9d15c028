//! Team and team membership endpoints

use axum::{
    extract::{Path, State},
    routing::{get, post, put},
    Router,
};
use tracing::debug;

use super::middleware::{require_action, require_permission, RequireUser};
use super::state::AppState;
use super::types::{
    AddMemberBody, ApiError, CreateTeamBody, CreatedTeamResponse, Json, MemberDto,
    MessageResponse, Query, SearchTeamsParams, SearchTeamsResponse, TeamDto, UpdateMemberBody,
    UpdateTeamBody, UserMembershipsParams,
};
use crate::domain::access::{
    ACTION_TEAMS_CREATE, ACTION_TEAMS_DELETE, ACTION_TEAMS_PERMISSIONS_READ,
    ACTION_TEAMS_PERMISSIONS_WRITE, ACTION_TEAMS_READ, ACTION_TEAMS_WRITE,
};
use crate::domain::team::validate_id;
use crate::domain::{MembershipKey, Permission, TeamId, UserId};
use crate::infrastructure::team::{CreateTeamRequest, SearchTeamsRequest, UpdateTeamRequest};

/// Routes under `/api`
pub fn create_team_router() -> Router<AppState> {
    Router::new()
        .route("/teams", post(create_team))
        .route("/teams/search", get(search_teams))
        .route(
            "/teams/{team_id}",
            get(get_team).put(update_team).delete(delete_team),
        )
        .route("/teams/{team_id}/members", get(list_members).post(add_member))
        .route(
            "/teams/{team_id}/members/{user_id}",
            put(update_member).delete(remove_member),
        )
        .route("/user/teams", get(user_teams))
        .route("/user/memberships", get(user_memberships))
}

fn parse_team_id(raw: i64) -> Result<TeamId, ApiError> {
    validate_id("team_id", raw)
        .map_err(|e| ApiError::bad_request(e.to_string()).with_param("team_id"))?;
    Ok(TeamId::new(raw))
}

fn parse_user_id(raw: i64) -> Result<UserId, ApiError> {
    validate_id("user_id", raw)
        .map_err(|e| ApiError::bad_request(e.to_string()).with_param("user_id"))?;
    Ok(UserId::new(raw))
}

async fn create_team(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    Json(body): Json<CreateTeamBody>,
) -> Result<Json<CreatedTeamResponse>, ApiError> {
    require_action(&user, ACTION_TEAMS_CREATE)?;

    let team = state
        .team_service
        .create_team(
            &user,
            CreateTeamRequest {
                name: body.name,
                email: body.email,
            },
        )
        .await?;

    Ok(Json(CreatedTeamResponse {
        team_id: team.id().value(),
        message: "Team created".to_string(),
    }))
}

async fn search_teams(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    Query(params): Query<SearchTeamsParams>,
) -> Result<Json<SearchTeamsResponse>, ApiError> {
    let result = state
        .team_service
        .search_teams(
            &user,
            SearchTeamsRequest {
                query: params.query,
                name: params.name,
                page: params.page,
                per_page: params.perpage,
            },
        )
        .await?;

    Ok(Json(SearchTeamsResponse {
        total_count: result.total_count,
        teams: result.teams.into_iter().map(TeamDto::from).collect(),
        page: result.page,
        per_page: result.per_page,
    }))
}

async fn get_team(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    Path(team_id): Path<i64>,
) -> Result<Json<TeamDto>, ApiError> {
    let team_id = parse_team_id(team_id)?;
    require_permission(&user, ACTION_TEAMS_READ, &team_id.scope())?;

    let team = state.team_service.get_team(&user, team_id).await?;
    Ok(Json(team.into()))
}

async fn update_team(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    Path(team_id): Path<i64>,
    Json(body): Json<UpdateTeamBody>,
) -> Result<Json<MessageResponse>, ApiError> {
    let team_id = parse_team_id(team_id)?;
    require_permission(&user, ACTION_TEAMS_WRITE, &team_id.scope())?;

    state
        .team_service
        .update_team(
            &user,
            team_id,
            UpdateTeamRequest {
                name: body.name,
                email: body.email,
            },
        )
        .await?;

    Ok(Json(MessageResponse::new("Team updated")))
}

async fn delete_team(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    Path(team_id): Path<i64>,
) -> Result<Json<MessageResponse>, ApiError> {
    let team_id = parse_team_id(team_id)?;
    require_permission(&user, ACTION_TEAMS_DELETE, &team_id.scope())?;

    state.team_service.delete_team(user.org_id, team_id).await?;
    Ok(Json(MessageResponse::new("Team deleted")))
}

async fn list_members(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    Path(team_id): Path<i64>,
) -> Result<Json<Vec<MemberDto>>, ApiError> {
    let team_id = parse_team_id(team_id)?;
    require_permission(&user, ACTION_TEAMS_PERMISSIONS_READ, &team_id.scope())?;

    let members = state.team_service.list_members(&user, team_id).await?;
    debug!(team_id = %team_id, count = members.len(), "Listed team members");

    Ok(Json(members.into_iter().map(MemberDto::from).collect()))
}

async fn add_member(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    Path(team_id): Path<i64>,
    Json(body): Json<AddMemberBody>,
) -> Result<Json<MessageResponse>, ApiError> {
    let team_id = parse_team_id(team_id)?;
    let member_id = parse_user_id(body.user_id)?;
    require_permission(&user, ACTION_TEAMS_PERMISSIONS_WRITE, &team_id.scope())?;

    let key = MembershipKey::new(user.org_id, team_id, member_id);
    state
        .team_service
        .add_member(key, false, Permission::normalize(body.permission))
        .await?;

    Ok(Json(MessageResponse::new("Member added to Team")))
}

async fn update_member(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    Path((team_id, member_id)): Path<(i64, i64)>,
    Json(body): Json<UpdateMemberBody>,
) -> Result<Json<MessageResponse>, ApiError> {
    let team_id = parse_team_id(team_id)?;
    let member_id = parse_user_id(member_id)?;
    require_permission(&user, ACTION_TEAMS_PERMISSIONS_WRITE, &team_id.scope())?;

    let key = MembershipKey::new(user.org_id, team_id, member_id);
    state.team_service.update_member(key, body.permission).await?;

    Ok(Json(MessageResponse::new("Team member updated")))
}

async fn remove_member(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    Path((team_id, member_id)): Path<(i64, i64)>,
) -> Result<Json<MessageResponse>, ApiError> {
    let team_id = parse_team_id(team_id)?;
    let member_id = parse_user_id(member_id)?;
    require_permission(&user, ACTION_TEAMS_PERMISSIONS_WRITE, &team_id.scope())?;

    let key = MembershipKey::new(user.org_id, team_id, member_id);
    state.team_service.remove_member(key).await?;

    Ok(Json(MessageResponse::new("Team member removed")))
}

async fn user_teams(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
) -> Result<Json<Vec<TeamDto>>, ApiError> {
    let teams = state.team_service.teams_of_user(&user).await?;
    Ok(Json(teams.into_iter().map(TeamDto::from).collect()))
}

/// The caller's own memberships; never another user's
async fn user_memberships(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    Query(params): Query<UserMembershipsParams>,
) -> Result<Json<Vec<MemberDto>>, ApiError> {
    let memberships = state
        .team_service
        .user_memberships(user.org_id, user.user_id, params.external)
        .await?;

    Ok(Json(memberships.into_iter().map(MemberDto::from).collect()))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use super::*;
    use crate::api::router::create_router_with_state;
    use crate::domain::access::ACTION_ORG_USERS_READ;
    use crate::domain::{OrgId, SignedInUser};
    use crate::infrastructure::access::ScopedAccessFilterProvider;
    use crate::infrastructure::auth::{JwtConfig, JwtGenerator, JwtService};
    use crate::infrastructure::team::{InMemoryTeamRepository, TeamService, UserProfile};

    struct TestApp {
        router: Router,
        jwt: Arc<JwtService>,
    }

    impl TestApp {
        fn new() -> Self {
            let repo = Arc::new(InMemoryTeamRepository::new());

            for (id, login) in [(1, "ann"), (2, "ben"), (3, "cat")] {
                repo.add_user(UserProfile::new(
                    UserId::new(id),
                    login,
                    format!("{}@example.com", login),
                    login,
                ))
                .unwrap();
            }

            let service = TeamService::new(
                repo.clone(),
                repo,
                Arc::new(ScopedAccessFilterProvider::default()),
            );
            let jwt = Arc::new(JwtService::new(JwtConfig::new("router-test-secret", 1)));
            let state = AppState::new(Arc::new(service), jwt.clone());

            Self {
                router: create_router_with_state(state),
                jwt,
            }
        }

        async fn call(
            &self,
            user: Option<&SignedInUser>,
            method: &str,
            uri: &str,
            body: Option<Value>,
        ) -> (StatusCode, Value) {
            let mut request = Request::builder().method(method).uri(uri);

            if let Some(user) = user {
                let token = self.jwt.generate(user).unwrap();
                request = request.header("authorization", format!("Bearer {}", token));
            }

            let request = match body {
                Some(body) => request
                    .header("content-type", "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
                None => request.body(Body::empty()).unwrap(),
            };

            let response = self.router.clone().oneshot(request).await.unwrap();
            let status = response.status();
            let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
                .await
                .unwrap();
            let value = if bytes.is_empty() {
                Value::Null
            } else {
                serde_json::from_slice(&bytes).unwrap()
            };

            (status, value)
        }
    }

    fn org_admin() -> SignedInUser {
        let mut user = SignedInUser::new(OrgId::new(1), UserId::new(1), "ann");

        for action in [
            ACTION_TEAMS_CREATE,
            ACTION_TEAMS_READ,
            ACTION_TEAMS_WRITE,
            ACTION_TEAMS_DELETE,
            ACTION_TEAMS_PERMISSIONS_READ,
            ACTION_TEAMS_PERMISSIONS_WRITE,
            ACTION_ORG_USERS_READ,
        ] {
            user = user.with_permission(action, ["*"]);
        }

        user
    }

    async fn create_team(app: &TestApp, name: &str) -> i64 {
        let (status, body) = app
            .call(Some(&org_admin()), "POST", "/api/teams", Some(json!({ "name": name })))
            .await;
        assert_eq!(status, StatusCode::OK, "{}", body);
        body["teamId"].as_i64().unwrap()
    }

    #[tokio::test]
    async fn test_requires_token() {
        let app = TestApp::new();

        let (status, body) = app.call(None, "GET", "/api/teams/search", None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"]["type"], "authentication_error");
    }

    #[tokio::test]
    async fn test_create_requires_permission() {
        let app = TestApp::new();
        let viewer = SignedInUser::new(OrgId::new(1), UserId::new(2), "ben");

        let (status, _) = app
            .call(Some(&viewer), "POST", "/api/teams", Some(json!({ "name": "Ops" })))
            .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_team_lifecycle() {
        let app = TestApp::new();
        let admin = org_admin();
        let team_id = create_team(&app, "Ops").await;

        let (status, body) = app
            .call(Some(&admin), "GET", &format!("/api/teams/{}", team_id), None)
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["name"], "Ops");
        assert_eq!(body["memberCount"], 1);

        let (status, _) = app
            .call(
                Some(&admin),
                "PUT",
                &format!("/api/teams/{}", team_id),
                Some(json!({ "name": "Operations", "email": "ops@example.com" })),
            )
            .await;
        assert_eq!(status, StatusCode::OK);

        let (status, _) = app
            .call(Some(&admin), "DELETE", &format!("/api/teams/{}", team_id), None)
            .await;
        assert_eq!(status, StatusCode::OK);

        let (status, body) = app
            .call(Some(&admin), "GET", &format!("/api/teams/{}", team_id), None)
            .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"]["code"], "team_not_found");
    }

    #[tokio::test]
    async fn test_duplicate_team_name_conflicts() {
        let app = TestApp::new();
        create_team(&app, "Ops").await;

        let (status, body) = app
            .call(Some(&org_admin()), "POST", "/api/teams", Some(json!({ "name": "Ops" })))
            .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["error"]["code"], "team_name_taken");
    }

    #[tokio::test]
    async fn test_member_rules_over_http() {
        let app = TestApp::new();
        let admin = org_admin();
        let team_id = create_team(&app, "Ops").await;
        let members = format!("/api/teams/{}/members", team_id);

        let (status, _) = app
            .call(Some(&admin), "POST", &members, Some(json!({ "userId": 2 })))
            .await;
        assert_eq!(status, StatusCode::OK);

        let (status, body) = app
            .call(Some(&admin), "POST", &members, Some(json!({ "userId": 2, "permission": 4 })))
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "already_member");

        let (status, body) = app
            .call(Some(&admin), "DELETE", &format!("{}/1", members), None)
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "last_admin");

        let (status, _) = app
            .call(
                Some(&admin),
                "PUT",
                &format!("{}/2", members),
                Some(json!({ "permission": 4 })),
            )
            .await;
        assert_eq!(status, StatusCode::OK);

        let (status, _) = app
            .call(Some(&admin), "DELETE", &format!("{}/1", members), None)
            .await;
        assert_eq!(status, StatusCode::OK);

        let (status, body) = app
            .call(Some(&admin), "DELETE", &format!("{}/3", members), None)
            .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"]["code"], "member_not_found");

        let (status, body) = app.call(Some(&admin), "GET", &members, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.as_array().unwrap().len(), 1);
        assert_eq!(body[0]["login"], "ben");
        assert_eq!(body[0]["permission"], 4);
    }

    #[tokio::test]
    async fn test_scoped_permissions() {
        let app = TestApp::new();
        let ops = create_team(&app, "Ops").await;
        let dev = create_team(&app, "Dev").await;

        let reader = SignedInUser::new(OrgId::new(1), UserId::new(3), "cat")
            .with_permission(ACTION_TEAMS_READ, [format!("teams:id:{}", dev)]);

        let (status, body) = app
            .call(Some(&reader), "GET", "/api/teams/search?perpage=10", None)
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["totalCount"], 1);
        assert_eq!(body["teams"][0]["name"], "Dev");
        assert_eq!(body["perPage"], 10);

        let (status, _) = app
            .call(Some(&reader), "GET", &format!("/api/teams/{}", ops), None)
            .await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, _) = app
            .call(Some(&reader), "GET", &format!("/api/teams/{}", dev), None)
            .await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_invalid_ids_rejected() {
        let app = TestApp::new();

        let (status, body) = app
            .call(Some(&org_admin()), "GET", "/api/teams/0", None)
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["param"], "team_id");

        let team_id = create_team(&app, "Ops").await;
        let (status, body) = app
            .call(
                Some(&org_admin()),
                "POST",
                &format!("/api/teams/{}/members", team_id),
                Some(json!({ "userId": -1 })),
            )
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["param"], "user_id");
    }

    #[tokio::test]
    async fn test_signed_in_user_views() {
        let app = TestApp::new();
        let team_id = create_team(&app, "Ops").await;

        let (status, body) = app
            .call(Some(&org_admin()), "GET", "/api/user/teams", None)
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body[0]["id"], team_id);
        assert_eq!(body[0]["permission"], 4);

        // No permissions needed to see one's own memberships
        let plain = SignedInUser::new(OrgId::new(1), UserId::new(1), "ann");
        let (status, body) = app
            .call(Some(&plain), "GET", "/api/user/memberships", None)
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.as_array().unwrap().len(), 1);

        let (status, body) = app
            .call(Some(&plain), "GET", "/api/user/memberships?external=true", None)
            .await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_health_endpoints() {
        let app = TestApp::new();

        let (status, body) = app.call(None, "GET", "/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "healthy");

        let (status, body) = app.call(None, "GET", "/ready", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["checks"][0]["name"], "team_store");

        let (status, _) = app.call(None, "GET", "/live", None).await;
        assert_eq!(status, StatusCode::OK);
    }
}
