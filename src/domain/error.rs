use thiserror::Error;

/// Core domain errors
///
/// Membership rule violations have their own variants so callers can match on
/// the kind instead of comparing messages.
#[derive(Debug, Error)]
pub enum DomainError {
    #[error("Team not found: {message}")]
    TeamNotFound { message: String },

    #[error("Team member not found: {message}")]
    MemberNotFound { message: String },

    #[error("User is already a member of this team: {message}")]
    AlreadyMember { message: String },

    #[error("Not allowed to remove or demote the last admin: {message}")]
    LastAdminProtected { message: String },

    #[error("Team name taken: {message}")]
    TeamNameTaken { message: String },

    #[error("Validation error: {message}")]
    Validation { message: String },

    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Internal error: {message}")]
    Internal { message: String },

    #[error("Storage error: {message}")]
    Storage { message: String },
}

impl DomainError {
    pub fn team_not_found(message: impl Into<String>) -> Self {
        Self::TeamNotFound {
            message: message.into(),
        }
    }

    pub fn member_not_found(message: impl Into<String>) -> Self {
        Self::MemberNotFound {
            message: message.into(),
        }
    }

    pub fn already_member(message: impl Into<String>) -> Self {
        Self::AlreadyMember {
            message: message.into(),
        }
    }

    pub fn last_admin(message: impl Into<String>) -> Self {
        Self::LastAdminProtected {
            message: message.into(),
        }
    }

    pub fn name_taken(message: impl Into<String>) -> Self {
        Self::TeamNameTaken {
            message: message.into(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage {
            message: message.into(),
        }
    }

    /// Whether this error is a business-rule rejection rather than a failure
    /// of the underlying store
    pub fn is_rule_violation(&self) -> bool {
        matches!(
            self,
            Self::TeamNotFound { .. }
                | Self::MemberNotFound { .. }
                | Self::AlreadyMember { .. }
                | Self::LastAdminProtected { .. }
                | Self::TeamNameTaken { .. }
                | Self::Validation { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_team_not_found_error() {
        let error = DomainError::team_not_found("Team 42 not found");
        assert_eq!(error.to_string(), "Team not found: Team 42 not found");
    }

    #[test]
    fn test_last_admin_error() {
        let error = DomainError::last_admin("user 7 in team 42");
        assert!(matches!(error, DomainError::LastAdminProtected { .. }));
        assert!(error.to_string().contains("last admin"));
    }

    #[test]
    fn test_rule_violation_classification() {
        assert!(DomainError::already_member("x").is_rule_violation());
        assert!(DomainError::last_admin("x").is_rule_violation());
        assert!(!DomainError::storage("connection reset").is_rule_violation());
        assert!(!DomainError::internal("boom").is_rule_violation());
    }
}
