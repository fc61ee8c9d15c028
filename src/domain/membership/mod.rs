//! Membership domain - the relation between users and teams

mod entity;
mod guard;
mod repository;

pub use entity::{Membership, MembershipKey, Permission, TeamMemberView, UserId};
pub use guard::{ensure_not_sole_admin, is_sole_admin, PermissionChange};
pub use repository::{MemberQuery, MembershipRepository};
