//! Access filter built from the scopes granted to a signed-in user

use tracing::debug;

use crate::domain::access::{AccessFilter, AccessFilterProvider, SignedInUser};
use crate::domain::DomainError;

/// Builds SQL filters from `<prefix><id>` scopes in the user's permissions
///
/// When access control is disabled every filter lets all rows through.
#[derive(Debug, Clone)]
pub struct ScopedAccessFilterProvider {
    enabled: bool,
}

impl ScopedAccessFilterProvider {
    pub fn new(enabled: bool) -> Self {
        Self { enabled }
    }
}

impl Default for ScopedAccessFilterProvider {
    fn default() -> Self {
        Self::new(true)
    }
}

impl AccessFilterProvider for ScopedAccessFilterProvider {
    fn filter(
        &self,
        user: &SignedInUser,
        column: &str,
        prefix: &str,
        action: &str,
    ) -> Result<AccessFilter, DomainError> {
        if !self.enabled {
            return Ok(AccessFilter::allow_all());
        }

        if column.is_empty() || !prefix.ends_with(':') {
            return Err(DomainError::internal(format!(
                "Invalid access filter target '{}' / '{}'",
                column, prefix
            )));
        }

        let kind_wildcard = wildcard_of(prefix);
        let mut ids = Vec::new();

        for scope in user.scopes(action) {
            if scope == "*" || scope == &kind_wildcard || scope == &format!("{}*", prefix) {
                debug!(action = %action, scope = %scope, "Wildcard scope grants every row");
                return Ok(AccessFilter::allow_all());
            }

            if let Some(raw) = scope.strip_prefix(prefix) {
                match raw.parse::<i64>() {
                    Ok(id) => ids.push(id),
                    Err(_) => debug!(scope = %scope, "Ignoring scope with non-numeric id"),
                }
            }
        }

        Ok(AccessFilter::ids(column, ids))
    }
}

/// `teams:id:` → `teams:*`
fn wildcard_of(prefix: &str) -> String {
    let kind = prefix.split(':').next().unwrap_or_default();
    format!("{}:*", kind)
}
