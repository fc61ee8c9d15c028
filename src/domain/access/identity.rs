//! Signed-in identity and scoped permission checks

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::domain::membership::UserId;
use crate::domain::team::OrgId;

/// The identity a request is made on behalf of
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignedInUser {
    pub org_id: OrgId,
    pub user_id: UserId,
    pub login: String,
    #[serde(default)]
    pub is_server_admin: bool,
    /// Granted scopes keyed by action
    #[serde(default)]
    pub permissions: HashMap<String, Vec<String>>,
}

impl SignedInUser {
    pub fn new(org_id: OrgId, user_id: UserId, login: impl Into<String>) -> Self {
        Self {
            org_id,
            user_id,
            login: login.into(),
            is_server_admin: false,
            permissions: HashMap::new(),
        }
    }

    /// Grant scopes for an action (builder pattern)
    pub fn with_permission(
        mut self,
        action: impl Into<String>,
        scopes: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        self.permissions
            .entry(action.into())
            .or_default()
            .extend(scopes.into_iter().map(Into::into));
        self
    }

    pub fn with_server_admin(mut self, is_server_admin: bool) -> Self {
        self.is_server_admin = is_server_admin;
        self
    }

    /// Scopes granted for an action
    pub fn scopes(&self, action: &str) -> &[String] {
        self.permissions
            .get(action)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Whether the action is granted on any scope
    pub fn has_action(&self, action: &str) -> bool {
        !self.scopes(action).is_empty()
    }

    /// Whether the action is granted on the given scope
    pub fn has_permission(&self, action: &str, scope: &str) -> bool {
        self.scopes(action)
            .iter()
            .any(|granted| scope_covers(granted, scope))
    }
}

/// Whether a granted scope covers the target scope
///
/// `*` covers everything; `teams:*` and `teams:id:*` cover every scope that
/// shares their prefix.
pub fn scope_covers(granted: &str, target: &str) -> bool {
    if granted == "*" || granted == target {
        return true;
    }

    match granted.strip_suffix('*') {
        Some(prefix) if prefix.ends_with(':') => target.starts_with(prefix),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user() -> SignedInUser {
        SignedInUser::new(OrgId::new(1), UserId::new(10), "alice")
    }

    #[test]
    fn test_scope_covers() {
        assert!(scope_covers("*", "teams:id:1"));
        assert!(scope_covers("teams:*", "teams:id:1"));
        assert!(scope_covers("teams:id:*", "teams:id:1"));
        assert!(scope_covers("teams:id:1", "teams:id:1"));
        assert!(!scope_covers("teams:id:1", "teams:id:12"));
        assert!(!scope_covers("users:*", "teams:id:1"));
        assert!(!scope_covers("teams*", "teams:id:1"));
    }

    #[test]
    fn test_has_permission() {
        let user = user()
            .with_permission("teams:read", ["teams:id:1", "teams:id:2"])
            .with_permission("teams:write", ["teams:*"]);

        assert!(user.has_permission("teams:read", "teams:id:2"));
        assert!(!user.has_permission("teams:read", "teams:id:3"));
        assert!(user.has_permission("teams:write", "teams:id:99"));
        assert!(!user.has_permission("teams:delete", "teams:id:1"));
    }

    #[test]
    fn test_has_action() {
        let user = user().with_permission("teams:create", Vec::<String>::new());
        assert!(!user.has_action("teams:create"));

        let user = user.with_permission("teams:create", ["*"]);
        assert!(user.has_action("teams:create"));
    }

    #[test]
    fn test_identity_deserialization_defaults() {
        let json = r#"{"org_id": 1, "user_id": 10, "login": "alice"}"#;
        let user: SignedInUser = serde_json::from_str(json).unwrap();

        assert!(!user.is_server_admin);
        assert!(user.permissions.is_empty());
    }
}
