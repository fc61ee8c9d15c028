//! Team infrastructure implementations

mod in_memory;
mod postgres_repository;
mod service;
mod sql;

pub use in_memory::{InMemoryTeamRepository, UserProfile};
pub use postgres_repository::PostgresTeamRepository;
pub use service::{
    CreateTeamRequest, SearchTeamsRequest, TeamService, TeamSettings, UpdateTeamRequest,
};
