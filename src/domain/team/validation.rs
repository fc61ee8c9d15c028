//! Team validation

use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;

/// Errors that can occur during team validation
#[derive(Debug, Error, Clone, PartialEq)]
pub enum TeamValidationError {
    #[error("Team name cannot be empty")]
    EmptyName,

    #[error("Team name cannot exceed {0} characters")]
    NameTooLong(usize),

    #[error("Team email is not a valid address")]
    InvalidEmail,

    #[error("{0} must be a positive integer")]
    InvalidId(&'static str),
}

const MAX_TEAM_NAME_LENGTH: usize = 190;

static EMAIL_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap());

/// Validate a team name
pub fn validate_team_name(name: &str) -> Result<(), TeamValidationError> {
    if name.trim().is_empty() {
        return Err(TeamValidationError::EmptyName);
    }

    if name.chars().count() > MAX_TEAM_NAME_LENGTH {
        return Err(TeamValidationError::NameTooLong(MAX_TEAM_NAME_LENGTH));
    }

    Ok(())
}

/// Validate a team contact email
pub fn validate_team_email(email: &str) -> Result<(), TeamValidationError> {
    if !EMAIL_PATTERN.is_match(email) {
        return Err(TeamValidationError::InvalidEmail);
    }

    Ok(())
}

/// Validate a numeric identifier received from a caller
pub fn validate_id(field: &'static str, id: i64) -> Result<(), TeamValidationError> {
    if id <= 0 {
        return Err(TeamValidationError::InvalidId(field));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_team_name() {
        assert!(validate_team_name("My Team").is_ok());
        assert!(validate_team_name("Team with spaces & symbols!").is_ok());
    }

    #[test]
    fn test_empty_team_name() {
        assert_eq!(validate_team_name(""), Err(TeamValidationError::EmptyName));
        assert_eq!(validate_team_name("   "), Err(TeamValidationError::EmptyName));
    }

    #[test]
    fn test_team_name_too_long() {
        let long_name = "a".repeat(191);
        assert_eq!(
            validate_team_name(&long_name),
            Err(TeamValidationError::NameTooLong(190))
        );
    }

    #[test]
    fn test_team_email() {
        assert!(validate_team_email("team@example.com").is_ok());
        assert_eq!(
            validate_team_email("team@"),
            Err(TeamValidationError::InvalidEmail)
        );
        assert_eq!(
            validate_team_email("two words@example.com"),
            Err(TeamValidationError::InvalidEmail)
        );
    }

    #[test]
    fn test_validate_id() {
        assert!(validate_id("teamId", 1).is_ok());
        assert_eq!(
            validate_id("teamId", 0),
            Err(TeamValidationError::InvalidId("teamId"))
        );
        assert_eq!(
            validate_id("userId", -3).unwrap_err().to_string(),
            "userId must be a positive integer"
        );
    }
}
