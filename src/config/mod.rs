use serde::{Deserialize, Serialize};
use std::env;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing configuration: {0}")]
    Missing(&'static str),

    #[error("Invalid value for {name}: {value}")]
    Invalid { name: &'static str, value: String },

    #[error("Fatal misconfiguration: {0}")]
    Misconfigured(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub environment: Environment,
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub identity: IdentityConfig,
    pub api: ApiConfig,
    pub security: SecurityConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Development,
    Staging,
    Production,
}

impl Environment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Environment::Development => "development",
            Environment::Staging => "staging",
            Environment::Production => "production",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    Memory,
    Postgres,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub backend: StoreBackend,
    #[serde(skip_serializing)]
    pub url: Option<String>,
    pub max_connections: u32,
    pub connection_timeout: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IdentityBackend {
    Local,
    Remote,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdentityConfig {
    pub provider: IdentityBackend,
    pub project_id: Option<String>,
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    pub base_url: String,
    #[serde(skip_serializing)]
    pub token_secret: Option<String>,
    pub token_ttl_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    pub max_upload_bytes: usize,
    pub default_page_size: u32,
    pub max_page_size: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityConfig {
    pub cors_origins: Vec<String>,
    /// Trust `dev-token:` bearer strings without asking the identity provider.
    pub dev_token_bypass: bool,
}

/// Secret used by the local identity provider when none is configured.
/// Accepted outside production only.
pub const DEVELOPMENT_TOKEN_SECRET: &str = "estate-portal-development-secret";

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let environment = match env::var("APP_ENV").as_deref() {
            Ok("production") | Ok("prod") => Environment::Production,
            Ok("staging") | Ok("stage") => Environment::Staging,
            Ok("development") | Ok("dev") | Err(_) => Environment::Development,
            Ok(other) => {
                return Err(ConfigError::Invalid { name: "APP_ENV", value: other.to_string() })
            }
        };

        let config = Self::for_environment(environment).with_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    pub fn for_environment(environment: Environment) -> Self {
        match environment {
            Environment::Production => Self::production(),
            Environment::Staging => Self::staging(),
            Environment::Development => Self::development(),
        }
    }

    fn with_env_overrides(mut self) -> Result<Self, ConfigError> {
        // Server overrides
        if let Ok(v) = env::var("PORTAL_API_PORT").or_else(|_| env::var("PORT")) {
            self.server.port = parse_var("PORT", &v)?;
        }
        if let Ok(v) = env::var("HOST") {
            self.server.host = v;
        }

        // Database overrides
        if let Ok(v) = env::var("STORE_BACKEND") {
            self.database.backend = match v.as_str() {
                "memory" => StoreBackend::Memory,
                "postgres" => StoreBackend::Postgres,
                _ => return Err(ConfigError::Invalid { name: "STORE_BACKEND", value: v }),
            };
        }
        if let Ok(v) = env::var("DATABASE_URL") {
            self.database.url = Some(v);
            if env::var("STORE_BACKEND").is_err() {
                self.database.backend = StoreBackend::Postgres;
            }
        }
        if let Ok(v) = env::var("DATABASE_MAX_CONNECTIONS") {
            self.database.max_connections = parse_var("DATABASE_MAX_CONNECTIONS", &v)?;
        }
        if let Ok(v) = env::var("DATABASE_CONNECTION_TIMEOUT") {
            self.database.connection_timeout = parse_var("DATABASE_CONNECTION_TIMEOUT", &v)?;
        }

        // Identity provider overrides
        if let Ok(v) = env::var("IDENTITY_PROVIDER") {
            self.identity.provider = match v.as_str() {
                "local" => IdentityBackend::Local,
                "remote" => IdentityBackend::Remote,
                _ => return Err(ConfigError::Invalid { name: "IDENTITY_PROVIDER", value: v }),
            };
        }
        if let Ok(v) = env::var("IDENTITY_PROJECT_ID") {
            self.identity.project_id = Some(v);
        }
        if let Ok(v) = env::var("IDENTITY_API_KEY") {
            self.identity.api_key = Some(v);
        }
        if let Ok(v) = env::var("IDENTITY_BASE_URL") {
            self.identity.base_url = v;
        }
        if let Ok(v) = env::var("IDENTITY_TOKEN_SECRET") {
            self.identity.token_secret = Some(v);
        }
        if let Ok(v) = env::var("IDENTITY_TOKEN_TTL_SECS") {
            self.identity.token_ttl_secs = parse_var("IDENTITY_TOKEN_TTL_SECS", &v)?;
        }

        // API overrides
        if let Ok(v) = env::var("MAX_UPLOAD_BYTES") {
            self.api.max_upload_bytes = parse_var("MAX_UPLOAD_BYTES", &v)?;
        }
        if let Ok(v) = env::var("API_DEFAULT_PAGE_SIZE") {
            self.api.default_page_size = parse_var("API_DEFAULT_PAGE_SIZE", &v)?;
        }
        if let Ok(v) = env::var("API_MAX_PAGE_SIZE") {
            self.api.max_page_size = parse_var("API_MAX_PAGE_SIZE", &v)?;
        }

        // Security overrides
        if let Ok(v) = env::var("CORS_ORIGINS").or_else(|_| env::var("CORS_ORIGIN")) {
            self.security.cors_origins = v
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
        }
        if let Ok(v) = env::var("AUTH_DEV_BYPASS") {
            self.security.dev_token_bypass = parse_var("AUTH_DEV_BYPASS", &v)?;
        }

        Ok(self)
    }

    /// Reject combinations that must never reach a running server.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.security.dev_token_bypass && self.environment != Environment::Development {
            return Err(ConfigError::Misconfigured(format!(
                "AUTH_DEV_BYPASS is enabled in {} mode",
                self.environment.as_str()
            )));
        }

        if self.security.cors_origins.iter().any(|o| o == "*")
            && self.environment != Environment::Development
        {
            return Err(ConfigError::Misconfigured(
                "wildcard CORS origin is only allowed in development".to_string(),
            ));
        }

        match self.database.backend {
            StoreBackend::Postgres if self.database.url.is_none() => {
                return Err(ConfigError::Missing("DATABASE_URL"));
            }
            StoreBackend::Memory if self.environment == Environment::Production => {
                return Err(ConfigError::Misconfigured(
                    "the in-memory store cannot back a production deployment".to_string(),
                ));
            }
            _ => {}
        }

        match self.identity.provider {
            IdentityBackend::Local => {
                if self.environment == Environment::Production && self.identity.token_secret.is_none() {
                    return Err(ConfigError::Missing("IDENTITY_TOKEN_SECRET"));
                }
            }
            IdentityBackend::Remote => {
                if self.identity.api_key.is_none() {
                    return Err(ConfigError::Missing("IDENTITY_API_KEY"));
                }
                url::Url::parse(&self.identity.base_url).map_err(|_| ConfigError::Invalid {
                    name: "IDENTITY_BASE_URL",
                    value: self.identity.base_url.clone(),
                })?;
            }
        }

        if self.api.default_page_size == 0 || self.api.default_page_size > self.api.max_page_size {
            return Err(ConfigError::Invalid {
                name: "API_DEFAULT_PAGE_SIZE",
                value: self.api.default_page_size.to_string(),
            });
        }

        Ok(())
    }

    pub fn is_development(&self) -> bool {
        self.environment == Environment::Development
    }

    pub fn token_secret(&self) -> &str {
        self.identity
            .token_secret
            .as_deref()
            .unwrap_or(DEVELOPMENT_TOKEN_SECRET)
    }

    fn development() -> Self {
        Self {
            environment: Environment::Development,
            server: ServerConfig { host: "0.0.0.0".to_string(), port: 5000 },
            database: DatabaseConfig {
                backend: StoreBackend::Memory,
                url: None,
                max_connections: 5,
                connection_timeout: 30,
            },
            identity: IdentityConfig {
                provider: IdentityBackend::Local,
                project_id: None,
                api_key: None,
                base_url: "https://identitytoolkit.googleapis.com/v1".to_string(),
                token_secret: None,
                token_ttl_secs: 60 * 60,
            },
            api: ApiConfig {
                max_upload_bytes: 10 * 1024 * 1024, // 10MB
                default_page_size: 20,
                max_page_size: 100,
            },
            security: SecurityConfig {
                cors_origins: vec!["http://localhost:3000".to_string(), "http://localhost:5173".to_string()],
                dev_token_bypass: false,
            },
        }
    }

    fn staging() -> Self {
        Self {
            environment: Environment::Staging,
            server: ServerConfig { host: "0.0.0.0".to_string(), port: 5000 },
            database: DatabaseConfig {
                backend: StoreBackend::Postgres,
                url: None,
                max_connections: 10,
                connection_timeout: 10,
            },
            identity: IdentityConfig {
                provider: IdentityBackend::Remote,
                project_id: None,
                api_key: None,
                base_url: "https://identitytoolkit.googleapis.com/v1".to_string(),
                token_secret: None,
                token_ttl_secs: 60 * 60,
            },
            api: ApiConfig {
                max_upload_bytes: 5 * 1024 * 1024, // 5MB
                default_page_size: 20,
                max_page_size: 100,
            },
            security: SecurityConfig {
                cors_origins: vec!["https://staging.example.com".to_string()],
                dev_token_bypass: false,
            },
        }
    }

    fn production() -> Self {
        Self {
            environment: Environment::Production,
            server: ServerConfig { host: "0.0.0.0".to_string(), port: 5000 },
            database: DatabaseConfig {
                backend: StoreBackend::Postgres,
                url: None,
                max_connections: 20,
                connection_timeout: 5,
            },
            identity: IdentityConfig {
                provider: IdentityBackend::Remote,
                project_id: None,
                api_key: None,
                base_url: "https://identitytoolkit.googleapis.com/v1".to_string(),
                token_secret: None,
                token_ttl_secs: 60 * 60,
            },
            api: ApiConfig {
                max_upload_bytes: 5 * 1024 * 1024, // 5MB
                default_page_size: 20,
                max_page_size: 50,
            },
            security: SecurityConfig {
                cors_origins: vec!["https://portal.example.com".to_string()],
                dev_token_bypass: false,
            },
        }
    }
}

fn parse_var<T: std::str::FromStr>(name: &'static str, value: &str) -> Result<T, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::Invalid { name, value: value.to_string() })
}
