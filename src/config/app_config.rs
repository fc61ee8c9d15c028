use serde::Deserialize;

use crate::infrastructure::auth::DEFAULT_JWT_SECRET;
use crate::infrastructure::storage::{PostgresConfig, StorageType};
use crate::infrastructure::team::TeamSettings;

/// Application configuration
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub logging: LoggingConfig,
    pub database: DatabaseConfig,
    pub auth: AuthConfig,
    pub teams: TeamsConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub backend: StorageType,
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub connect_timeout_secs: u64,
    pub idle_timeout_secs: u64,
    /// `0` disables the per-statement timeout
    pub statement_timeout_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    pub jwt_secret: String,
    pub jwt_expiration_hours: u64,
    /// When off, every scope filter lets all rows through
    pub access_control_enabled: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TeamsConfig {
    pub hidden_users: Vec<String>,
    pub creator_is_admin: bool,
    pub default_page_size: u32,
    pub max_page_size: u32,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::default(),
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        let postgres = PostgresConfig::default();

        Self {
            backend: StorageType::default(),
            url: postgres.url,
            max_connections: postgres.max_connections,
            min_connections: postgres.min_connections,
            connect_timeout_secs: postgres.connect_timeout_secs,
            idle_timeout_secs: postgres.idle_timeout_secs,
            statement_timeout_ms: postgres.statement_timeout_ms,
        }
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: DEFAULT_JWT_SECRET.to_string(),
            jwt_expiration_hours: 24,
            access_control_enabled: true,
        }
    }
}

impl Default for TeamsConfig {
    fn default() -> Self {
        let settings = TeamSettings::default();

        Self {
            hidden_users: settings.hidden_users,
            creator_is_admin: settings.creator_is_admin,
            default_page_size: settings.default_page_size,
            max_page_size: settings.max_page_size,
        }
    }
}

impl DatabaseConfig {
    pub fn postgres(&self) -> PostgresConfig {
        PostgresConfig::new(&self.url)
            .with_max_connections(self.max_connections)
            .with_min_connections(self.min_connections)
            .with_connect_timeout(self.connect_timeout_secs)
            .with_idle_timeout(self.idle_timeout_secs)
            .with_statement_timeout(self.statement_timeout_ms)
    }
}

impl AuthConfig {
    /// Whether tokens would be signed with the publicly known placeholder secret
    pub fn has_default_secret(&self) -> bool {
        self.jwt_secret == DEFAULT_JWT_SECRET
    }
}

impl TeamsConfig {
    pub fn settings(&self) -> TeamSettings {
        TeamSettings {
            hidden_users: self.hidden_users.clone(),
            creator_is_admin: self.creator_is_admin,
            default_page_size: self.default_page_size,
            max_page_size: self.max_page_size.max(1),
        }
    }
}

impl AppConfig {
    pub fn load() -> Result<Self, config::ConfigError> {
        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name("config/local").required(false))
            .add_source(
                config::Environment::with_prefix("APP")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("teams.hidden_users")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();

        assert_eq!(config.server.port, 8080);
        assert_eq!(config.database.backend, StorageType::Memory);
        assert!(config.auth.access_control_enabled);
        assert!(config.teams.creator_is_admin);
    }

    #[test]
    fn test_partial_source_keeps_defaults() {
        let config: AppConfig = config::Config::builder()
            .set_override("database.backend", "postgres")
            .unwrap()
            .set_override("teams.max_page_size", 50)
            .unwrap()
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();

        assert_eq!(config.database.backend, StorageType::Postgres);
        assert_eq!(config.database.max_connections, 10);
        assert_eq!(config.teams.max_page_size, 50);
        assert_eq!(config.teams.default_page_size, 100);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_invalid_value_fails_to_load() {
        let result: Result<AppConfig, _> = config::Config::builder()
            .set_override("database.backend", "postgres")
            .unwrap()
            .set_override("server.port", "80a")
            .unwrap()
            .build()
            .unwrap()
            .try_deserialize();

        assert!(result.is_err());
    }

    #[test]
    fn test_default_secret_detection() {
        let mut auth = AuthConfig::default();
        assert!(auth.has_default_secret());

        auth.jwt_secret = "s3cret".to_string();
        assert!(!auth.has_default_secret());
    }

    #[test]
    fn test_database_to_postgres_config() {
        let database = DatabaseConfig {
            url: "postgres://db/teams".to_string(),
            statement_timeout_ms: 750,
            ..Default::default()
        };

        let postgres = database.postgres();
        assert_eq!(postgres.url, "postgres://db/teams");
        assert_eq!(postgres.statement_timeout_ms, 750);
    }
}
