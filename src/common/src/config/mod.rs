use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::time::Duration;

use chrono::FixedOffset;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::storage::PublicUrlBase;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};

/// Configuration file picked up from the working directory when no path is given.
pub const DEFAULT_CONFIG_FILE: &str = "socio.toml";

/// Unprefixed variables understood for compatibility with the hosted deployment.
const LEGACY_ENV_KEYS: [&str; 4] = [
    "SUPABASE_URL",
    "SUPABASE_SERVICE_ROLE_KEY",
    "DATABASE_URL",
    "PORT",
];

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    Load(#[from] Box<figment::Error>),
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Postgres DSN of the Supabase database (SQLite DSNs are accepted for local runs)
    pub dsn: String,
    /// Upper bound of pooled connections
    pub max_connections: u32,
    /// Create the tables when they are missing (local development and tests)
    pub init_schema: bool,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            dsn: String::new(),
            max_connections: 5,
            init_schema: false,
        }
    }
}

impl DatabaseConfig {
    /// Create an in-memory database configuration for local runs
    pub fn in_memory() -> Self {
        Self {
            dsn: String::from("sqlite::memory:"),
            max_connections: 1,
            init_schema: true,
        }
    }
}

impl fmt::Debug for DatabaseConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DatabaseConfig")
            .field("dsn", &redact_dsn(&self.dsn))
            .field("max_connections", &self.max_connections)
            .field("init_schema", &self.init_schema)
            .finish()
    }
}

#[derive(Clone, Serialize, Deserialize, Default)]
pub struct SupabaseConfig {
    /// Project URL, e.g. https://<project>.supabase.co
    pub url: String,
    /// Service role key used for storage calls
    pub service_role_key: String,
}

impl fmt::Debug for SupabaseConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SupabaseConfig")
            .field("url", &self.url)
            .field("service_role_key", &"<redacted>")
            .finish()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum StorageBackend {
    /// Supabase Storage REST API
    #[default]
    Supabase,
    /// One `object_store` per bucket, configured through `storage.buckets`
    ObjectStore,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    /// Bucket name to object store DSN (`memory://`, `file:///path`, `s3://...`)
    pub buckets: HashMap<String, String>,
    /// Timeout applied to each storage request
    #[serde(with = "humantime_serde")]
    pub request_timeout: Duration,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::Supabase,
            buckets: HashMap::new(),
            request_timeout: Duration::from_secs(30),
        }
    }
}

/// How expired rows are matched against the reference date.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum MatchMode {
    /// Only rows whose closing/end date equals the reference date
    #[default]
    Exact,
    /// Every row whose closing/end date is on or before the reference date
    Backlog,
}

impl fmt::Display for MatchMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MatchMode::Exact => write!(f, "exact"),
            MatchMode::Backlog => write!(f, "backlog"),
        }
    }
}

/// Nightly cleanup job configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CleanupConfig {
    /// Run the scheduler inside `socio serve`
    ///
    /// Env: SOCIO__CLEANUP__ENABLED
    pub enabled: bool,
    /// Hour of day (0-23) in the configured offset
    pub hour: u32,
    /// Minute of hour (0-59)
    pub minute: u32,
    /// Fixed UTC offset of the schedule, `+05:30` for Asia/Kolkata
    pub utc_offset: String,
    pub match_mode: MatchMode,
    /// Resolve and log deletions without performing them
    ///
    /// Env: SOCIO__CLEANUP__DRY_RUN
    pub dry_run: bool,
}

impl Default for CleanupConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            hour: 0,
            minute: 1,
            utc_offset: String::from("+05:30"),
            match_mode: MatchMode::Exact,
            dry_run: false,
        }
    }
}

impl CleanupConfig {
    pub fn offset(&self) -> Result<FixedOffset, ConfigError> {
        parse_utc_offset(&self.utc_offset)
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct HttpConfig {
    pub bind: String,
    pub port: u16,
    /// Reported by the health endpoint
    pub environment: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            bind: String::from("0.0.0.0"),
            port: 8000,
            environment: String::from("development"),
        }
    }
}

#[derive(Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// Only addresses in this domain may sign in or register
    pub allowed_domain: String,
    /// Bearer token for the admin endpoints; admin routes are disabled when unset
    pub admin_key: Option<String>,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            allowed_domain: String::from("christuniversity.in"),
            admin_key: None,
        }
    }
}

impl fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthConfig")
            .field("allowed_domain", &self.allowed_domain)
            .field("admin_key", &self.admin_key.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, Default)]
pub struct Configuration {
    pub database: DatabaseConfig,
    pub supabase: SupabaseConfig,
    pub storage: StorageConfig,
    pub cleanup: CleanupConfig,
    pub http: HttpConfig,
    pub auth: AuthConfig,
}

impl Configuration {
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from_path(Path::new(DEFAULT_CONFIG_FILE))
    }

    pub fn load_from_path(path: &Path) -> Result<Self, ConfigError> {
        let config = Self::figment(path).extract().map_err(Box::new)?;
        Ok(config)
    }

    /// Defaults, then the TOML file, then legacy variables, then `SOCIO__` variables.
    pub fn figment(path: &Path) -> Figment {
        Figment::from(Serialized::defaults(Configuration::default()))
            .merge(Toml::file(path))
            .merge(legacy_env())
            .merge(Env::prefixed("SOCIO__").split("__"))
    }

    /// Check everything the service needs before it starts.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.database.dsn.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "database.dsn (or DATABASE_URL) must be set".to_string(),
            ));
        }

        // persisted file URLs are resolved against the project URL with either backend
        if self.supabase.url.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "supabase.url (or SUPABASE_URL) must be set".to_string(),
            ));
        }
        PublicUrlBase::parse(&self.supabase.url)
            .map_err(|e| ConfigError::Invalid(e.to_string()))?;

        match self.storage.backend {
            StorageBackend::Supabase => {
                if self.supabase.service_role_key.trim().is_empty() {
                    return Err(ConfigError::Invalid(
                        "supabase.service_role_key (or SUPABASE_SERVICE_ROLE_KEY) must be set"
                            .to_string(),
                    ));
                }
            }
            StorageBackend::ObjectStore => {
                if self.storage.buckets.is_empty() {
                    return Err(ConfigError::Invalid(
                        "storage.buckets must map at least one bucket for the object_store backend"
                            .to_string(),
                    ));
                }
            }
        }

        if self.cleanup.hour > 23 || self.cleanup.minute > 59 {
            return Err(ConfigError::Invalid(format!(
                "cleanup schedule {:02}:{:02} is not a valid time of day",
                self.cleanup.hour, self.cleanup.minute
            )));
        }
        self.cleanup.offset()?;

        if self.auth.allowed_domain.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "auth.allowed_domain must not be empty".to_string(),
            ));
        }

        Ok(())
    }
}

fn legacy_env() -> Env {
    Env::raw().only(&LEGACY_ENV_KEYS).map(|key| {
        match key.as_str().to_ascii_uppercase().as_str() {
            "SUPABASE_URL" => "supabase.url".into(),
            "SUPABASE_SERVICE_ROLE_KEY" => "supabase.service_role_key".into(),
            "DATABASE_URL" => "database.dsn".into(),
            "PORT" => "http.port".into(),
            other => other.to_ascii_lowercase().into(),
        }
    })
}

/// Parse `+HH:MM` / `-HH:MM` (or `Z`) into a fixed offset.
pub fn parse_utc_offset(value: &str) -> Result<FixedOffset, ConfigError> {
    let value = value.trim();
    if value.eq_ignore_ascii_case("z") || value == "+00:00" {
        return FixedOffset::east_opt(0)
            .ok_or_else(|| ConfigError::Invalid("invalid UTC offset".to_string()));
    }

    let invalid = || ConfigError::Invalid(format!("invalid UTC offset '{value}', expected +HH:MM"));

    let (sign, rest) = match value.split_at_checked(1) {
        Some(("+", rest)) => (1, rest),
        Some(("-", rest)) => (-1, rest),
        _ => return Err(invalid()),
    };
    let (hours, minutes) = rest.split_once(':').ok_or_else(invalid)?;
    let hours: i32 = hours.parse().map_err(|_| invalid())?;
    let minutes: i32 = minutes.parse().map_err(|_| invalid())?;
    if !(0..=23).contains(&hours) || !(0..=59).contains(&minutes) {
        return Err(invalid());
    }

    FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60)).ok_or_else(invalid)
}

/// Hide the password part of a DSN for logs.
pub fn redact_dsn(dsn: &str) -> String {
    match url::Url::parse(dsn) {
        Ok(mut url) if url.password().is_some() => {
            let _ = url.set_password(Some("***"));
            url.to_string()
        }
        _ => dsn.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use figment::Jail;

    fn load_in_jail() -> Result<Configuration, figment::Error> {
        Configuration::load().map_err(|e| figment::Error::from(e.to_string()))
    }

    #[test]
    fn test_default_configuration() {
        let config = Configuration::default();

        assert!(config.database.dsn.is_empty());
        assert_eq!(config.storage.backend, StorageBackend::Supabase);
        assert!(config.cleanup.enabled);
        assert_eq!(config.cleanup.hour, 0);
        assert_eq!(config.cleanup.minute, 1);
        assert_eq!(config.cleanup.utc_offset, "+05:30");
        assert_eq!(config.cleanup.match_mode, MatchMode::Exact);
        assert!(!config.cleanup.dry_run);
        assert_eq!(config.http.port, 8000);
        assert_eq!(config.auth.allowed_domain, "christuniversity.in");
    }

    #[test]
    fn test_defaults_fail_validation() {
        // Missing credentials must stop the process at startup
        let err = Configuration::default().validate().unwrap_err();
        assert!(err.to_string().contains("database.dsn"));
    }

    #[test]
    fn test_legacy_env_vars() {
        Jail::expect_with(|jail| {
            jail.set_env("SUPABASE_URL", "https://demo.supabase.co");
            jail.set_env("SUPABASE_SERVICE_ROLE_KEY", "service-key");
            jail.set_env("DATABASE_URL", "postgres://postgres:secret@db:5432/postgres");
            jail.set_env("PORT", "9100");

            let config = load_in_jail()?;
            assert_eq!(config.supabase.url, "https://demo.supabase.co");
            assert_eq!(config.supabase.service_role_key, "service-key");
            assert_eq!(
                config.database.dsn,
                "postgres://postgres:secret@db:5432/postgres"
            );
            assert_eq!(config.http.port, 9100);
            assert!(config.validate().is_ok());
            Ok(())
        });
    }

    #[test]
    fn test_prefixed_env_overrides_legacy() {
        Jail::expect_with(|jail| {
            jail.set_env("DATABASE_URL", "postgres://legacy/db");
            jail.set_env("SOCIO__DATABASE__DSN", "postgres://prefixed/db");
            jail.set_env("SOCIO__CLEANUP__MATCH_MODE", "backlog");
            jail.set_env("SOCIO__CLEANUP__DRY_RUN", "true");

            let config = load_in_jail()?;
            assert_eq!(config.database.dsn, "postgres://prefixed/db");
            assert_eq!(config.cleanup.match_mode, MatchMode::Backlog);
            assert!(config.cleanup.dry_run);
            Ok(())
        });
    }

    #[test]
    fn test_toml_file() {
        Jail::expect_with(|jail| {
            jail.create_file(
                DEFAULT_CONFIG_FILE,
                r#"
                [database]
                dsn = "sqlite::memory:"

                [supabase]
                url = "https://demo.supabase.co"

                [storage]
                backend = "object_store"
                request_timeout = "5s"

                [storage.buckets]
                fest-images = "memory://"

                [cleanup]
                hour = 2
                minute = 30
                utc_offset = "+00:00"
                "#,
            )?;

            let config = load_in_jail()?;
            assert_eq!(config.storage.backend, StorageBackend::ObjectStore);
            assert_eq!(config.storage.request_timeout, Duration::from_secs(5));
            assert_eq!(
                config.storage.buckets.get("fest-images").map(String::as_str),
                Some("memory://")
            );
            assert_eq!(config.cleanup.hour, 2);
            assert_eq!(config.cleanup.minute, 30);
            assert!(config.validate().is_ok());
            Ok(())
        });
    }

    #[test]
    fn test_validate_rejects_bad_schedule() {
        let mut config = Configuration::default();
        config.database = DatabaseConfig::in_memory();
        config.storage.backend = StorageBackend::ObjectStore;
        config
            .storage
            .buckets
            .insert("fest-images".to_string(), "memory://".to_string());

        config.supabase.url = "https://demo.supabase.co".to_string();
        assert!(config.validate().is_ok());

        config.cleanup.hour = 24;
        assert!(config.validate().is_err());

        config.cleanup.hour = 0;
        config.cleanup.utc_offset = "IST".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_requires_project_url_for_object_store() {
        let mut config = Configuration::default();
        config.database = DatabaseConfig::in_memory();
        config.storage.backend = StorageBackend::ObjectStore;
        config
            .storage
            .buckets
            .insert("fest-images".to_string(), "memory://".to_string());

        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("supabase.url"));

        config.supabase.url = "demo.supabase.co".to_string();
        assert!(config.validate().is_err());

        config.supabase.url = "https://demo.supabase.co".to_string();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_utc_offset() {
        assert_eq!(
            parse_utc_offset("+05:30").unwrap().local_minus_utc(),
            5 * 3600 + 30 * 60
        );
        assert_eq!(parse_utc_offset("-04:00").unwrap().local_minus_utc(), -4 * 3600);
        assert_eq!(parse_utc_offset("Z").unwrap().local_minus_utc(), 0);
        assert!(parse_utc_offset("05:30").is_err());
        assert!(parse_utc_offset("+5").is_err());
        assert!(parse_utc_offset("+24:00").is_err());
    }

    #[test]
    fn test_secrets_are_redacted() {
        let mut config = Configuration::default();
        config.database.dsn = "postgres://postgres:hunter2@db:5432/postgres".to_string();
        config.supabase.service_role_key = "service-key".to_string();
        config.auth.admin_key = Some("admin-key".to_string());

        let debug = format!("{config:?}");
        assert!(!debug.contains("hunter2"));
        assert!(!debug.contains("service-key"));
        assert!(!debug.contains("admin-key"));
    }
}
