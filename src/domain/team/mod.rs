//! Team domain - teams and their search queries

mod entity;
mod repository;
mod validation;

pub use entity::{OrgId, Team, TeamId, TeamView};
pub use repository::{GetTeamQuery, NewTeam, TeamRepository, TeamSearchQuery, TeamSearchResult};
pub use validation::{
    validate_id, validate_team_email, validate_team_name, TeamValidationError,
};
