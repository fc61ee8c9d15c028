//! Domain layer - Core business logic and entities

pub mod access;
pub mod error;
pub mod membership;
pub mod team;

pub use access::{AccessFilter, AccessFilterProvider, SignedInUser};
pub use error::DomainError;
pub use membership::{
    MemberQuery, Membership, MembershipKey, MembershipRepository, Permission, TeamMemberView,
    UserId,
};
pub use team::{
    GetTeamQuery, NewTeam, OrgId, Team, TeamId, TeamRepository, TeamSearchQuery,
    TeamSearchResult, TeamView,
};
