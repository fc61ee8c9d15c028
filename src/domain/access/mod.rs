//! Access control domain - identities, actions and SQL filters

mod filter;
mod identity;

pub use filter::{AccessFilter, AccessFilterProvider};
pub use identity::{scope_covers, SignedInUser};

#[cfg(test)]
pub use filter::MockAccessFilterProvider;

pub const ACTION_TEAMS_CREATE: &str = "teams:create";
pub const ACTION_TEAMS_READ: &str = "teams:read";
pub const ACTION_TEAMS_WRITE: &str = "teams:write";
pub const ACTION_TEAMS_DELETE: &str = "teams:delete";
pub const ACTION_TEAMS_PERMISSIONS_READ: &str = "teams.permissions:read";
pub const ACTION_TEAMS_PERMISSIONS_WRITE: &str = "teams.permissions:write";
pub const ACTION_ORG_USERS_READ: &str = "org.users:read";

pub const SCOPE_TEAMS_ID_PREFIX: &str = "teams:id:";
pub const SCOPE_USERS_ID_PREFIX: &str = "users:id:";
