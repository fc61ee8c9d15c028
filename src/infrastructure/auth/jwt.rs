//! JWT token generation and validation

use std::collections::HashMap;
use std::fmt::Debug;

use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::domain::{DomainError, OrgId, SignedInUser, UserId};

/// JWT claims structure
///
/// Carries the whole signed-in identity so requests need no user lookup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JwtClaims {
    /// Subject (user ID)
    pub sub: i64,
    pub org_id: i64,
    pub login: String,
    #[serde(default)]
    pub server_admin: bool,
    /// Granted scopes keyed by action
    #[serde(default)]
    pub permissions: HashMap<String, Vec<String>>,
    /// Issued at timestamp (Unix epoch)
    pub iat: i64,
    /// Expiration timestamp (Unix epoch)
    pub exp: i64,
}

impl JwtClaims {
    /// Create new claims for a signed-in user
    ///
    /// Fails when the expiration lies beyond what a timestamp can represent.
    pub fn new(user: &SignedInUser, expiration_hours: u64) -> Result<Self, DomainError> {
        let now = Utc::now();
        let exp = i64::try_from(expiration_hours)
            .ok()
            .and_then(Duration::try_hours)
            .and_then(|ttl| now.checked_add_signed(ttl))
            .ok_or_else(|| {
                DomainError::configuration(format!(
                    "JWT expiration of {} hours is out of range",
                    expiration_hours
                ))
            })?;

        Ok(Self {
            sub: user.user_id.value(),
            org_id: user.org_id.value(),
            login: user.login.clone(),
            server_admin: user.is_server_admin,
            permissions: user.permissions.clone(),
            iat: now.timestamp(),
            exp: exp.timestamp(),
        })
    }

    /// Check if the token has expired
    pub fn is_expired(&self) -> bool {
        Utc::now().timestamp() >= self.exp
    }

    /// The identity the token was issued for
    pub fn into_user(self) -> SignedInUser {
        SignedInUser {
            org_id: OrgId::new(self.org_id),
            user_id: UserId::new(self.sub),
            login: self.login,
            is_server_admin: self.server_admin,
            permissions: self.permissions,
        }
    }
}

/// Placeholder secret shipped in the default configuration
pub const DEFAULT_JWT_SECRET: &str = "change-me-in-production";

/// Configuration for JWT service
#[derive(Debug, Clone)]
pub struct JwtConfig {
    /// Secret key for signing tokens
    pub secret: String,
    /// Token expiration time in hours
    pub expiration_hours: u64,
}

impl JwtConfig {
    /// Create new JWT configuration
    pub fn new(secret: impl Into<String>, expiration_hours: u64) -> Self {
        Self {
            secret: secret.into(),
            expiration_hours,
        }
    }
}

impl Default for JwtConfig {
    fn default() -> Self {
        Self {
            secret: DEFAULT_JWT_SECRET.to_string(),
            expiration_hours: 24,
        }
    }
}

/// Trait for JWT operations
pub trait JwtGenerator: Send + Sync + Debug {
    /// Generate a JWT token for a signed-in user
    fn generate(&self, user: &SignedInUser) -> Result<String, DomainError>;

    /// Validate a JWT token and return the claims
    fn validate(&self, token: &str) -> Result<JwtClaims, DomainError>;

    /// Get the token expiration time in hours
    fn expiration_hours(&self) -> u64;
}

/// HS256 JWT service using a shared secret
#[derive(Clone)]
pub struct JwtService {
    config: JwtConfig,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
}

impl Debug for JwtService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtService")
            .field("expiration_hours", &self.config.expiration_hours)
            .field("encoding_key", &"[hidden]")
            .field("decoding_key", &"[hidden]")
            .finish()
    }
}

impl JwtService {
    /// Create a new JWT service with the given configuration
    pub fn new(config: JwtConfig) -> Self {
        let encoding_key = EncodingKey::from_secret(config.secret.as_bytes());
        let decoding_key = DecodingKey::from_secret(config.secret.as_bytes());

        Self {
            config,
            encoding_key,
            decoding_key,
        }
    }

    /// Create a JWT service with default configuration
    pub fn with_default_config() -> Self {
        Self::new(JwtConfig::default())
    }
}

impl JwtGenerator for JwtService {
    fn generate(&self, user: &SignedInUser) -> Result<String, DomainError> {
        let claims = JwtClaims::new(user, self.config.expiration_hours)?;

        encode(&Header::default(), &claims, &self.encoding_key)
            .map_err(|e| DomainError::internal(format!("Failed to generate JWT: {}", e)))
    }

    fn validate(&self, token: &str) -> Result<JwtClaims, DomainError> {
        let validation = Validation::default();

        let token_data = decode::<JwtClaims>(token, &self.decoding_key, &validation)
            .map_err(|e| DomainError::validation(format!("Invalid JWT: {}", e)))?;

        Ok(token_data.claims)
    }

    fn expiration_hours(&self) -> u64 {
        self.config.expiration_hours
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::access::ACTION_TEAMS_READ;

    fn create_test_user() -> SignedInUser {
        SignedInUser::new(OrgId::new(3), UserId::new(42), "testuser")
            .with_permission(ACTION_TEAMS_READ, ["teams:id:7"])
    }

    #[test]
    fn test_generate_and_validate_token() {
        let service = JwtService::new(JwtConfig::new("test-secret", 24));

        let token = service.generate(&create_test_user()).unwrap();
        assert!(!token.is_empty());

        let claims = service.validate(&token).unwrap();
        assert_eq!(claims.sub, 42);
        assert_eq!(claims.org_id, 3);
        assert!(!claims.is_expired());

        let user = claims.into_user();
        assert_eq!(user, create_test_user());
    }

    #[test]
    fn test_invalid_token() {
        let service = JwtService::with_default_config();
        assert!(service.validate("invalid.token.here").is_err());
    }

    #[test]
    fn test_wrong_secret() {
        let issuer = JwtService::new(JwtConfig::new("secret-a", 24));
        let verifier = JwtService::new(JwtConfig::new("secret-b", 24));

        let token = issuer.generate(&create_test_user()).unwrap();
        assert!(verifier.validate(&token).is_err());
    }

    #[test]
    fn test_expired_claims() {
        let mut claims = JwtClaims::new(&create_test_user(), 1).unwrap();
        claims.exp = Utc::now().timestamp() - 10;
        assert!(claims.is_expired());
    }

    #[test]
    fn test_out_of_range_expiration() {
        let result = JwtClaims::new(&create_test_user(), u64::MAX);
        assert!(matches!(result, Err(DomainError::Configuration { .. })));

        let service = JwtService::new(JwtConfig::new("secret", 10_000_000_000_000));
        assert!(matches!(
            service.generate(&create_test_user()),
            Err(DomainError::Configuration { .. })
        ));
    }

    #[test]
    fn test_expiration_hours() {
        let service = JwtService::new(JwtConfig::new("secret", 48));
        assert_eq!(service.expiration_hours(), 48);
    }

    #[test]
    fn test_debug_hides_keys() {
        let service = JwtService::new(JwtConfig::new("very-secret", 24));
        let text = format!("{:?}", service);
        assert!(!text.contains("very-secret"));
        assert!(text.contains("[hidden]"));
    }
}
