//! Authentication and authorization for team routes

use axum::{
    extract::FromRequestParts,
    http::{header, request::Parts, HeaderMap},
};
use tracing::debug;

use crate::api::state::AppState;
use crate::api::types::ApiError;
use crate::domain::SignedInUser;

/// Extractor that requires a valid JWT token
///
/// The token is read from `Authorization: Bearer <jwt_token>`; its claims
/// carry the full identity, including granted permissions.
#[derive(Debug, Clone)]
pub struct RequireUser(pub SignedInUser);

impl FromRequestParts<AppState> for RequireUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = extract_jwt_token(&parts.headers)?;

        let claims = state
            .jwt_service
            .validate(&token)
            .map_err(|e| ApiError::unauthorized(format!("Invalid token: {}", e)))?;

        let user = claims.into_user();
        debug!(user_id = %user.user_id, org_id = %user.org_id, "Authenticated request");

        Ok(RequireUser(user))
    }
}

/// Extract JWT token from Authorization header
pub fn extract_jwt_token(headers: &HeaderMap) -> Result<String, ApiError> {
    if let Some(auth_header) = headers.get(header::AUTHORIZATION) {
        let auth_str = auth_header
            .to_str()
            .map_err(|_| ApiError::bad_request("Invalid Authorization header encoding"))?;

        if let Some(token) = auth_str.strip_prefix("Bearer ") {
            return Ok(token.trim().to_string());
        }
    }

    Err(ApiError::unauthorized(
        "Authentication required. Provide JWT token via 'Authorization: Bearer <token>' header",
    ))
}

/// Require the action on the given scope
pub fn require_permission(user: &SignedInUser, action: &str, scope: &str) -> Result<(), ApiError> {
    if user.has_permission(action, scope) {
        return Ok(());
    }

    debug!(user_id = %user.user_id, action = %action, scope = %scope, "Permission denied");
    Err(ApiError::forbidden(format!(
        "Missing permission '{}' on '{}'",
        action, scope
    )))
}

/// Require the action on any scope
pub fn require_action(user: &SignedInUser, action: &str) -> Result<(), ApiError> {
    if user.has_action(action) {
        return Ok(());
    }

    debug!(user_id = %user.user_id, action = %action, "Permission denied");
    Err(ApiError::forbidden(format!("Missing permission '{}'", action)))
}
