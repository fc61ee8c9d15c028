//! API middleware components

pub mod auth;

pub use auth::{extract_jwt_token, require_action, require_permission, RequireUser};
