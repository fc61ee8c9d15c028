//! Authentication infrastructure module
//!
//! This module provides JWT token management for signed-in identities.

mod jwt;

pub use jwt::{JwtClaims, JwtConfig, JwtGenerator, JwtService, DEFAULT_JWT_SECRET};
