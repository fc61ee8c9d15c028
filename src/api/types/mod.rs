//! HTTP request and response types

pub mod error;
pub mod extract;
pub mod teams;

pub use error::{ApiError, ApiErrorResponse};
pub use extract::{Json, Query};
pub use teams::{
    AddMemberBody, CreateTeamBody, CreatedTeamResponse, MemberDto, MessageResponse,
    SearchTeamsParams, SearchTeamsResponse, TeamDto, UpdateMemberBody, UpdateTeamBody,
    UserMembershipsParams,
};
