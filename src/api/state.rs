//! Application state for shared services

use std::sync::Arc;

use crate::infrastructure::auth::JwtGenerator;
use crate::infrastructure::team::TeamService;

/// Application state shared by every handler
#[derive(Clone)]
pub struct AppState {
    pub team_service: Arc<TeamService>,
    pub jwt_service: Arc<dyn JwtGenerator>,
}

impl AppState {
    pub fn new(team_service: Arc<TeamService>, jwt_service: Arc<dyn JwtGenerator>) -> Self {
        Self {
            team_service,
            jwt_service,
        }
    }
}
