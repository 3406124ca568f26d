//! Process configuration.
//!
//! Sources, later ones win:
//! 1. built-in defaults
//! 2. a TOML file (`$WAREHOUSE_CONFIG`, default `config/config.toml`)
//! 3. environment variables
//!
//! The loaded config is validated once and is read-only afterwards.

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;
use url::Url;

use warehouse_auth::Role;

use crate::retry::{InvalidRetryPolicy, RetryPolicy};

pub const DEFAULT_CONFIG_PATH: &str = "config/config.toml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid value for {key}: {value:?}")]
    Env { key: &'static str, value: String },

    #[error("jwt_secret must not be empty")]
    EmptySecret,

    #[error("invalid retry settings: {0}")]
    Retry(#[from] InvalidRetryPolicy),

    #[error("no database location: set DATABASE_URL or [database] host and name")]
    MissingDatabase,
}

/// Which persistence backend the binary runs on.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    #[default]
    Postgres,
    /// Dev mode: nothing survives a restart.
    Memory,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
        }
    }
}

#[derive(Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Full connection string; takes precedence over the parts below.
    pub dsn: Option<String>,
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub name: String,
    pub sslmode: String,
    pub max_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            dsn: None,
            host: String::new(),
            port: 5432,
            user: String::new(),
            password: String::new(),
            name: String::new(),
            sslmode: "disable".to_string(),
            max_connections: 5,
        }
    }
}

impl fmt::Debug for DatabaseConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DatabaseConfig")
            .field("dsn", &self.dsn.as_ref().map(|_| "<redacted>"))
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .field("name", &self.name)
            .field("sslmode", &self.sslmode)
            .field("max_connections", &self.max_connections)
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub attempts: u32,
    pub base_delay_ms: u64,
    pub backoff: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        let policy = RetryPolicy::default();
        Self {
            attempts: policy.attempts(),
            base_delay_ms: policy.base_delay().as_millis() as u64,
            backoff: policy.backoff(),
        }
    }
}

/// A user created at startup on the in-memory backend.
#[derive(Clone, PartialEq, Eq, Deserialize)]
pub struct SeedUser {
    pub username: String,
    pub password: String,
    pub role: Role,
}

impl fmt::Debug for SeedUser {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SeedUser")
            .field("username", &self.username)
            .field("role", &self.role)
            .finish_non_exhaustive()
    }
}

#[derive(Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub jwt_secret: String,
    pub store: StoreBackend,
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub retry: RetryConfig,
    pub seed_users: Vec<SeedUser>,
}

impl fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppConfig")
            .field("jwt_secret", &"<redacted>")
            .field("store", &self.store)
            .field("server", &self.server)
            .field("database", &self.database)
            .field("retry", &self.retry)
            .field("seed_users", &self.seed_users)
            .finish()
    }
}

impl AppConfig {
    /// Load from the process environment and the config file it points at.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_with(|key| std::env::var(key).ok())
    }

    /// Like [`AppConfig::load`] with an injectable environment.
    pub fn load_with<F>(env: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = match env("WAREHOUSE_CONFIG") {
            Some(path) => Self::from_file(Path::new(&path))?,
            None => {
                let path = Path::new(DEFAULT_CONFIG_PATH);
                if path.exists() {
                    Self::from_file(path)?
                } else {
                    Self::default()
                }
            }
        };
        config.apply_env(env)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Overlay environment variables onto the file values.
    pub fn apply_env<F>(&mut self, env: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(secret) = env("JWT_SECRET") {
            self.jwt_secret = secret;
        }
        if let Some(store) = env("WAREHOUSE_STORE") {
            self.store = match store.trim().to_ascii_lowercase().as_str() {
                "memory" => StoreBackend::Memory,
                "postgres" => StoreBackend::Postgres,
                _ => {
                    return Err(ConfigError::Env {
                        key: "WAREHOUSE_STORE",
                        value: store,
                    });
                }
            };
        }
        if let Some(host) = env("SERVER_HOST") {
            self.server.host = host;
        }
        if let Some(port) = env("SERVER_PORT") {
            self.server.port = parse_env("SERVER_PORT", port)?;
        }
        if let Some(dsn) = env("DATABASE_URL") {
            self.database.dsn = Some(dsn);
        }
        if let Some(attempts) = env("RETRY_ATTEMPTS") {
            self.retry.attempts = parse_env("RETRY_ATTEMPTS", attempts)?;
        }
        if let Some(delay) = env("RETRY_BASE_DELAY_MS") {
            self.retry.base_delay_ms = parse_env("RETRY_BASE_DELAY_MS", delay)?;
        }
        if let Some(backoff) = env("RETRY_BACKOFF") {
            self.retry.backoff = parse_env("RETRY_BACKOFF", backoff)?;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.jwt_secret.is_empty() {
            return Err(ConfigError::EmptySecret);
        }
        self.retry_policy()?;
        if self.store == StoreBackend::Postgres && self.dsn().is_none() {
            return Err(ConfigError::MissingDatabase);
        }
        Ok(())
    }

    pub fn retry_policy(&self) -> Result<RetryPolicy, InvalidRetryPolicy> {
        RetryPolicy::new(
            self.retry.attempts,
            Duration::from_millis(self.retry.base_delay_ms),
            self.retry.backoff,
        )
    }

    /// Connection string: `database.dsn` if set, otherwise assembled from
    /// the parts with user, password and name percent-encoded. `None` when
    /// host or name is missing, or the host is not a valid URL host.
    pub fn dsn(&self) -> Option<String> {
        let db = &self.database;
        if let Some(dsn) = db.dsn.as_deref().filter(|d| !d.trim().is_empty()) {
            return Some(dsn.to_string());
        }
        if db.host.is_empty() || db.name.is_empty() {
            return None;
        }
        let mut url = Url::parse(&format!("postgres://{}:{}", db.host, db.port)).ok()?;
        if !db.user.is_empty() {
            url.set_username(&db.user).ok()?;
            if !db.password.is_empty() {
                url.set_password(Some(&db.password)).ok()?;
            }
        }
        url.set_path(&format!("/{}", db.name));
        url.query_pairs_mut().append_pair("sslmode", &db.sslmode);
        Some(url.to_string())
    }

    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

fn parse_env<T: std::str::FromStr>(key: &'static str, value: String) -> Result<T, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::Env { key, value })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    const FULL: &str = r#"
        jwt_secret = "file-secret"

        [server]
        host = "127.0.0.1"
        port = 9090

        [database]
        host = "db"
        user = "wh"
        password = "hunter2"
        name = "warehouse"

        [retry]
        attempts = 5
        base_delay_ms = 100
        backoff = 1.5

        [[seed_users]]
        username = "alice"
        password = "pw1"
        role = "manager"
    "#;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    fn parse(toml: &str) -> AppConfig {
        toml::from_str(toml).unwrap()
    }

    #[test]
    fn defaults_apply_to_missing_sections() {
        let config = parse(r#"jwt_secret = "s""#);
        assert_eq!(config.listen_addr(), "0.0.0.0:8080");
        assert_eq!(config.database.sslmode, "disable");
        assert_eq!(config.retry_policy().unwrap(), RetryPolicy::default());
        assert_eq!(config.store, StoreBackend::Postgres);
    }

    #[test]
    fn file_values_are_read() {
        let config = parse(FULL);
        assert_eq!(config.listen_addr(), "127.0.0.1:9090");
        assert_eq!(config.retry_policy().unwrap().attempts(), 5);
        assert_eq!(config.seed_users.len(), 1);
        assert_eq!(config.seed_users[0].role, Role::Manager);
        assert_eq!(
            config.dsn().as_deref(),
            Some("postgres://wh:hunter2@db:5432/warehouse?sslmode=disable")
        );
    }

    #[test]
    fn dsn_parts_are_percent_encoded() {
        let mut config = parse(FULL);
        config.database.password = "p@ss/w:rd#1".into();
        assert_eq!(
            config.dsn().as_deref(),
            Some("postgres://wh:p%40ss%2Fw%3Ard%231@db:5432/warehouse?sslmode=disable")
        );

        config.database.host = "bad host".into();
        assert_eq!(config.dsn(), None);
    }

    #[test]
    fn environment_overrides_file() {
        let mut config = parse(FULL);
        config
            .apply_env(env(&[
                ("JWT_SECRET", "env-secret"),
                ("SERVER_PORT", "7000"),
                ("DATABASE_URL", "postgres://other/db"),
                ("RETRY_ATTEMPTS", "2"),
                ("WAREHOUSE_STORE", "memory"),
            ]))
            .unwrap();

        assert_eq!(config.jwt_secret, "env-secret");
        assert_eq!(config.server.port, 7000);
        assert_eq!(config.dsn().as_deref(), Some("postgres://other/db"));
        assert_eq!(config.retry.attempts, 2);
        assert_eq!(config.store, StoreBackend::Memory);
    }

    #[test]
    fn unparsable_environment_value_is_reported() {
        let mut config = AppConfig::default();
        let err = config
            .apply_env(env(&[("SERVER_PORT", "eighty")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::Env { key: "SERVER_PORT", .. }));
    }

    #[test]
    fn validation_rejects_bad_settings() {
        let mut config = parse(FULL);
        assert!(config.validate().is_ok());

        config.jwt_secret.clear();
        assert!(matches!(config.validate(), Err(ConfigError::EmptySecret)));

        let mut config = parse(FULL);
        config.retry.attempts = 0;
        assert!(matches!(config.validate(), Err(ConfigError::Retry(_))));

        let mut config = parse(FULL);
        config.database = DatabaseConfig::default();
        assert!(matches!(config.validate(), Err(ConfigError::MissingDatabase)));

        config.store = StoreBackend::Memory;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn explicit_config_path_must_exist() {
        let err = AppConfig::load_with(env(&[(
            "WAREHOUSE_CONFIG",
            "/definitely/not/here/config.toml",
        )]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }

    #[test]
    fn loads_file_named_by_environment() {
        let path = std::env::temp_dir().join(format!("warehouse-config-{}.toml", std::process::id()));
        std::fs::write(&path, FULL).unwrap();

        let config = AppConfig::load_with(env(&[
            ("WAREHOUSE_CONFIG", path.to_str().unwrap()),
            ("SERVER_HOST", "localhost"),
        ]))
        .unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(config.listen_addr(), "localhost:9090");
        assert_eq!(config.jwt_secret, "file-secret");
    }

    #[test]
    fn debug_output_hides_secrets() {
        let rendered = format!("{:?}", parse(FULL));
        assert!(!rendered.contains("file-secret"));
        assert!(!rendered.contains("hunter2"));
        assert!(!rendered.contains("pw1"));
    }
}
