//! Last-admin protection
//!
//! Stores load the user ids of every Admin membership of a team inside the
//! transaction that will perform the write, then ask these functions whether
//! the write may proceed. The read must lock the rows it returns so two
//! concurrent demotions or removals cannot both pass.

use super::entity::{MembershipKey, Permission, UserId};
use crate::domain::DomainError;

/// True when `user` holds the only Admin membership among `admin_ids`
pub fn is_sole_admin(admin_ids: &[UserId], user: UserId) -> bool {
    matches!(admin_ids, [only] if *only == user)
}

/// Reject the write when it would strip the team of its last Admin
pub fn ensure_not_sole_admin(admin_ids: &[UserId], key: &MembershipKey) -> Result<(), DomainError> {
    if is_sole_admin(admin_ids, key.user_id) {
        return Err(DomainError::last_admin(key.to_string()));
    }

    Ok(())
}

/// A permission change after normalization
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PermissionChange {
    pub permission: Permission,
    /// Whether the sole-admin check must pass before applying
    pub guarded: bool,
}

impl PermissionChange {
    /// Plan a change to `requested`; anything but Admin may demote
    pub fn plan(requested: Permission) -> Self {
        Self {
            permission: requested,
            guarded: !requested.is_admin(),
        }
    }
}
