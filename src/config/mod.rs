use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::env;
use std::path::Path;

use crate::types::ServiceKind;

/// Development-only signing secret. Production refuses to start with it.
pub const DEFAULT_JWT_SECRET: &str = "my_very_secret_jwt_key";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub environment: Environment,
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub security: SecurityConfig,
    pub services: ServiceUrls,
    pub upstream: UpstreamConfig,
    pub pagination: PaginationConfig,
    pub storage: StorageConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Development,
    Staging,
    Production,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    /// When unset each service listens on its own default port.
    pub port: Option<u16>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub data_dir: String,
    pub max_connections: u32,
    pub connection_timeout: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SecurityConfig {
    pub jwt_secret: String,
    pub jwt_expiry_minutes: i64,
    pub argon2_memory_kib: u32,
    pub argon2_iterations: u32,
    pub enable_cors: bool,
    pub cors_origins: Vec<String>,
    pub internal_api_key: Option<String>,
    pub invite_link_expiry_hours: i64,
    pub invite_base_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceUrls {
    pub account_url: String,
    pub group_url: String,
    pub project_url: String,
    pub file_url: String,
    pub process_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UpstreamConfig {
    pub max_attempts: u32,
    pub retry_delay_ms: u64,
    pub timeout_secs: u64,
    pub user_cache_ttl_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PaginationConfig {
    pub default_page_size: u32,
    pub max_page_size: u32,
    pub internal_max_page_size: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub root_dir: String,
    pub max_file_size_bytes: usize,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self::development()
    }
}

impl Default for Environment {
    fn default() -> Self {
        Environment::Development
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: None,
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            data_dir: "data".to_string(),
            max_connections: 5,
            connection_timeout: 30,
        }
    }
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            jwt_secret: DEFAULT_JWT_SECRET.to_string(),
            jwt_expiry_minutes: 30,
            argon2_memory_kib: 19 * 1024,
            argon2_iterations: 2,
            enable_cors: true,
            cors_origins: vec!["http://localhost:8080".to_string()],
            internal_api_key: None,
            invite_link_expiry_hours: 24,
            invite_base_url: "http://localhost:8080".to_string(),
        }
    }
}

impl Default for ServiceUrls {
    fn default() -> Self {
        Self {
            account_url: ServiceKind::Account.local_url(),
            group_url: ServiceKind::Groups.local_url(),
            project_url: ServiceKind::Projects.local_url(),
            file_url: ServiceKind::Files.local_url(),
            process_url: ServiceKind::Process.local_url(),
        }
    }
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            retry_delay_ms: 500,
            timeout_secs: 10,
            user_cache_ttl_secs: 300,
        }
    }
}

impl Default for PaginationConfig {
    fn default() -> Self {
        Self {
            default_page_size: 20,
            max_page_size: 100,
            internal_max_page_size: 500,
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            root_dir: "storage".to_string(),
            max_file_size_bytes: 10 * 1024 * 1024, // 10MB
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },
    #[error("Failed to parse config file {path}: {source}")]
    Parse {
        path: String,
        source: serde_yaml::Error,
    },
    #[error("JWT_SECRET must be set to a non-default value in production")]
    InsecureSecret,
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self::preset(Self::environment_from_env()).with_env_overrides()
    }

    /// Load a YAML file as the base layer, then apply environment overrides.
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let display = path.display().to_string();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: display.clone(),
            source,
        })?;
        let config: AppConfig = serde_yaml::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: display,
            source,
        })?;
        Ok(config.with_env_overrides())
    }

    fn environment_from_env() -> Environment {
        match env::var("APP_ENV").as_deref() {
            Ok("production") | Ok("prod") => Environment::Production,
            Ok("staging") | Ok("stage") => Environment::Staging,
            _ => Environment::Development,
        }
    }

    pub fn preset(environment: Environment) -> Self {
        match environment {
            Environment::Production => Self::production(),
            Environment::Staging => Self::staging(),
            Environment::Development => Self::development(),
        }
    }

    pub fn with_env_overrides(mut self) -> Self {
        // Server overrides
        if let Ok(v) = env::var("HOST") {
            self.server.host = v;
        }
        if let Ok(v) = env::var("PORT") {
            self.server.port = v.parse().ok().or(self.server.port);
        }

        // Database overrides
        if let Ok(v) = env::var("DATA_DIR") {
            self.database.data_dir = v;
        }
        if let Ok(v) = env::var("DATABASE_MAX_CONNECTIONS") {
            self.database.max_connections = v.parse().unwrap_or(self.database.max_connections);
        }
        if let Ok(v) = env::var("DATABASE_CONNECTION_TIMEOUT") {
            self.database.connection_timeout = v.parse().unwrap_or(self.database.connection_timeout);
        }

        // Security overrides
        if let Ok(v) = env::var("JWT_SECRET") {
            self.security.jwt_secret = v;
        }
        if let Ok(v) = env::var("JWT_EXPIRY_MINUTES") {
            self.security.jwt_expiry_minutes = v.parse().unwrap_or(self.security.jwt_expiry_minutes);
        }
        if let Ok(v) = env::var("SECURITY_ENABLE_CORS") {
            self.security.enable_cors = v.parse().unwrap_or(self.security.enable_cors);
        }
        if let Ok(v) = env::var("SECURITY_CORS_ORIGINS") {
            self.security.cors_origins = v.split(',').map(|s| s.trim().to_string()).collect();
        }
        if let Ok(v) = env::var("INTERNAL_API_KEY") {
            self.security.internal_api_key = Some(v).filter(|k| !k.is_empty());
        }
        if let Ok(v) = env::var("INVITE_LINK_EXPIRY_HOURS") {
            self.security.invite_link_expiry_hours =
                v.parse().unwrap_or(self.security.invite_link_expiry_hours);
        }
        if let Ok(v) = env::var("INVITE_BASE_URL") {
            self.security.invite_base_url = v;
        }

        // Sibling service URLs
        if let Ok(v) = env::var("ACCOUNT_SERVICE_URL") {
            self.services.account_url = v;
        }
        if let Ok(v) = env::var("GROUP_SERVICE_URL") {
            self.services.group_url = v;
        }
        if let Ok(v) = env::var("PROJECT_SERVICE_URL") {
            self.services.project_url = v;
        }
        if let Ok(v) = env::var("FILE_SERVICE_URL") {
            self.services.file_url = v;
        }
        if let Ok(v) = env::var("PROCESS_SERVICE_URL") {
            self.services.process_url = v;
        }

        // Upstream overrides
        if let Ok(v) = env::var("UPSTREAM_MAX_ATTEMPTS") {
            self.upstream.max_attempts = v.parse().unwrap_or(self.upstream.max_attempts);
        }
        if let Ok(v) = env::var("UPSTREAM_RETRY_DELAY_MS") {
            self.upstream.retry_delay_ms = v.parse().unwrap_or(self.upstream.retry_delay_ms);
        }
        if let Ok(v) = env::var("UPSTREAM_TIMEOUT_SECS") {
            self.upstream.timeout_secs = v.parse().unwrap_or(self.upstream.timeout_secs);
        }
        if let Ok(v) = env::var("USER_CACHE_TTL_SECS") {
            self.upstream.user_cache_ttl_secs = v.parse().unwrap_or(self.upstream.user_cache_ttl_secs);
        }

        // Storage overrides
        if let Ok(v) = env::var("STORAGE_DIR") {
            self.storage.root_dir = v;
        }
        if let Ok(v) = env::var("MAX_FILE_SIZE_BYTES") {
            self.storage.max_file_size_bytes = v.parse().unwrap_or(self.storage.max_file_size_bytes);
        }

        self
    }

    /// Reject configurations that must never reach production.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.environment == Environment::Production
            && (self.security.jwt_secret.is_empty() || self.security.jwt_secret == DEFAULT_JWT_SECRET)
        {
            return Err(ConfigError::InsecureSecret);
        }
        Ok(())
    }

    pub fn development() -> Self {
        Self {
            environment: Environment::Development,
            server: ServerConfig::default(),
            database: DatabaseConfig::default(),
            security: SecurityConfig::default(),
            services: ServiceUrls::default(),
            upstream: UpstreamConfig::default(),
            pagination: PaginationConfig::default(),
            storage: StorageConfig::default(),
        }
    }

    pub fn staging() -> Self {
        let mut config = Self::development();
        config.environment = Environment::Staging;
        config.database.max_connections = 10;
        config.upstream.max_attempts = 6;
        config.upstream.retry_delay_ms = 2000;
        config
    }

    pub fn production() -> Self {
        let mut config = Self::development();
        config.environment = Environment::Production;
        config.database.max_connections = 20;
        config.security.jwt_secret = String::new();
        config.security.cors_origins = Vec::new();
        config.upstream.max_attempts = 6;
        config.upstream.retry_delay_ms = 2000;
        config
    }

    /// Copy with secrets blanked, for display.
    pub fn redacted(&self) -> Self {
        let mut copy = self.clone();
        copy.security.jwt_secret = "<redacted>".to_string();
        if copy.security.internal_api_key.is_some() {
            copy.security.internal_api_key = Some("<redacted>".to_string());
        }
        copy
    }
}

// Global singleton config - initialized once at startup
pub static CONFIG: Lazy<AppConfig> = Lazy::new(|| match env::var("TEAMHUB_CONFIG") {
    Ok(path) => AppConfig::from_yaml_file(&path).unwrap_or_else(|e| {
        tracing::warn!("{}; falling back to environment configuration", e);
        AppConfig::from_env()
    }),
    Err(_) => AppConfig::from_env(),
});

// Convenience function for accessing config
pub fn config() -> &'static AppConfig {
    &CONFIG
}

#[macro_export]
macro_rules! is_production {
    () => {
        matches!($crate::config::CONFIG.environment, $crate::config::Environment::Production)
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_development_config() {
        let config = AppConfig::development();
        assert_eq!(config.security.jwt_expiry_minutes, 30);
        assert_eq!(config.security.invite_link_expiry_hours, 24);
        assert_eq!(config.pagination.max_page_size, 100);
        assert_eq!(config.upstream.user_cache_ttl_secs, 300);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_default_production_config() {
        let config = AppConfig::production();
        assert_eq!(config.upstream.max_attempts, 6);
        assert!(config.security.cors_origins.is_empty());
        assert!(matches!(config.validate(), Err(ConfigError::InsecureSecret)));
    }

    #[test]
    fn production_accepts_custom_secret() {
        let mut config = AppConfig::production();
        config.security.jwt_secret = "a-real-secret".to_string();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn partial_yaml_fills_missing_sections_with_defaults() {
        let yaml = "environment: staging\nsecurity:\n  jwt_expiry_minutes: 5\n";
        let config: AppConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.environment, Environment::Staging);
        assert_eq!(config.security.jwt_expiry_minutes, 5);
        assert_eq!(config.security.jwt_secret, DEFAULT_JWT_SECRET);
        assert_eq!(config.pagination.default_page_size, 20);
    }

    #[test]
    fn redacted_hides_secrets() {
        let mut config = AppConfig::development();
        config.security.internal_api_key = Some("k".to_string());
        let shown = config.redacted();
        assert_eq!(shown.security.jwt_secret, "<redacted>");
        assert_eq!(shown.security.internal_api_key.as_deref(), Some("<redacted>"));
    }
}
