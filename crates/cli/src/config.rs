use persistence::healer::{HealOptions, PhaseId};
use persistence::seed::AdminAccount;
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub database: DatabaseConfig,
    pub logging: LoggingConfig,
    #[serde(default)]
    pub heal: HealConfig,
    #[serde(default)]
    pub backup: BackupConfig,
    #[serde(default)]
    pub purge: PurgeConfig,
    #[serde(default)]
    pub seed: SeedConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Only commands that talk to the database require it.
    #[serde(default)]
    pub url: String,

    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    #[serde(default = "default_min_connections")]
    pub min_connections: u32,

    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,

    #[serde(default = "default_idle_timeout")]
    pub idle_timeout_secs: u64,

    /// Operate on this schema instead of the server default.
    #[serde(default)]
    pub schema: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default = "default_log_format")]
    pub format: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HealConfig {
    /// Longest a phase waits for a table lock before giving up.
    #[serde(default = "default_lock_timeout")]
    pub lock_timeout_secs: u64,

    /// Attempts per phase when it fails on lock contention.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    #[serde(default = "default_retry_backoff")]
    pub retry_backoff_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BackupConfig {
    #[serde(default = "default_backup_dir")]
    pub dir: PathBuf,

    /// Backups older than this are removed after each backup. 0 keeps all.
    #[serde(default = "default_retention_days")]
    pub retention_days: u32,

    #[serde(default = "default_pg_dump")]
    pub pg_dump: String,

    #[serde(default = "default_pg_restore")]
    pub pg_restore: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PurgeConfig {
    /// How long an issued document stays valid. 0 disables the purge.
    #[serde(default = "default_validity_months")]
    pub validity_months: i32,

    /// Days an archived document is kept before it is deleted.
    #[serde(default = "default_grace_days")]
    pub grace_days: i64,

    /// Directory that document `file_path`s are relative to.
    #[serde(default = "default_static_root")]
    pub static_root: PathBuf,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SeedConfig {
    #[serde(default = "default_admin_username")]
    pub admin_username: String,

    #[serde(default = "default_admin_email")]
    pub admin_email: String,

    /// No bootstrap administrator is created unless this is set.
    #[serde(default)]
    pub admin_password: Option<String>,
}

// Default value functions
fn default_max_connections() -> u32 {
    5
}
fn default_min_connections() -> u32 {
    1
}
fn default_connect_timeout() -> u64 {
    10
}
fn default_idle_timeout() -> u64 {
    600
}
fn default_log_level() -> String {
    "info".to_string()
}
fn default_log_format() -> String {
    "pretty".to_string()
}
fn default_lock_timeout() -> u64 {
    5
}
fn default_max_attempts() -> u32 {
    3
}
fn default_retry_backoff() -> u64 {
    500
}
fn default_backup_dir() -> PathBuf {
    PathBuf::from("backups")
}
fn default_retention_days() -> u32 {
    7
}
fn default_pg_dump() -> String {
    "pg_dump".to_string()
}
fn default_pg_restore() -> String {
    "pg_restore".to_string()
}
fn default_validity_months() -> i32 {
    6
}
fn default_grace_days() -> i64 {
    30
}
fn default_static_root() -> PathBuf {
    PathBuf::from("static")
}
fn default_admin_username() -> String {
    "admin".to_string()
}
fn default_admin_email() -> String {
    "admin@example.com".to_string()
}

impl Default for HealConfig {
    fn default() -> Self {
        Self {
            lock_timeout_secs: default_lock_timeout(),
            max_attempts: default_max_attempts(),
            retry_backoff_ms: default_retry_backoff(),
        }
    }
}

impl Default for BackupConfig {
    fn default() -> Self {
        Self {
            dir: default_backup_dir(),
            retention_days: default_retention_days(),
            pg_dump: default_pg_dump(),
            pg_restore: default_pg_restore(),
        }
    }
}

impl Default for PurgeConfig {
    fn default() -> Self {
        Self {
            validity_months: default_validity_months(),
            grace_days: default_grace_days(),
            static_root: default_static_root(),
        }
    }
}

impl Default for SeedConfig {
    fn default() -> Self {
        Self {
            admin_username: default_admin_username(),
            admin_email: default_admin_email(),
            admin_password: None,
        }
    }
}

impl DatabaseConfig {
    /// The connection URL, or an error naming the variable to set.
    pub fn require_url(&self) -> Result<&str, ConfigValidationError> {
        if self.url.trim().is_empty() {
            return Err(ConfigValidationError::MissingRequired(
                "RECORDS__DATABASE__URL environment variable must be set".to_string(),
            ));
        }
        Ok(&self.url)
    }

    pub fn pool_config(&self) -> Result<persistence::db::DatabaseConfig, ConfigValidationError> {
        Ok(persistence::db::DatabaseConfig {
            url: self.require_url()?.to_string(),
            max_connections: self.max_connections,
            min_connections: self.min_connections,
            connect_timeout_secs: self.connect_timeout_secs,
            idle_timeout_secs: self.idle_timeout_secs,
            schema: self.schema.clone(),
        })
    }
}

impl HealConfig {
    pub fn options(&self, phases: Vec<PhaseId>) -> HealOptions {
        HealOptions {
            lock_timeout: Duration::from_secs(self.lock_timeout_secs),
            max_attempts: self.max_attempts,
            retry_backoff: Duration::from_millis(self.retry_backoff_ms),
            phases,
        }
    }
}

impl SeedConfig {
    pub fn admin_account(&self) -> Option<AdminAccount> {
        let password = self.admin_password.as_ref().filter(|p| !p.is_empty())?;
        Some(AdminAccount {
            username: self.admin_username.clone(),
            email: self.admin_email.clone(),
            password: password.clone(),
        })
    }
}

/// Configuration validation error
#[derive(Debug, thiserror::Error)]
pub enum ConfigValidationError {
    #[error("Missing required configuration: {0}")]
    MissingRequired(String),

    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),
}

impl Config {
    /// Load configuration from files and environment variables.
    ///
    /// Loading order (later sources override earlier):
    /// 1. config/default.toml - base configuration with defaults
    /// 2. config/local.toml - local overrides (optional, not in git)
    /// 3. Environment variables with RECORDS__ prefix
    pub fn load() -> Result<Self, config::ConfigError> {
        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default"))
            .add_source(config::File::with_name("config/local").required(false))
            .add_source(config::Environment::with_prefix("RECORDS").separator("__"))
            .build()?;

        let cfg: Self = config.try_deserialize()?;
        cfg.validate()
            .map_err(|e| config::ConfigError::Message(e.to_string()))?;
        Ok(cfg)
    }

    /// Load configuration for testing with custom overrides.
    ///
    /// Builds the config from embedded defaults and overrides only, without
    /// touching config files.
    #[cfg(test)]
    pub fn load_for_test(overrides: &[(&str, &str)]) -> Result<Self, config::ConfigError> {
        let defaults = r#"
            [database]
            url = ""
            max_connections = 5
            min_connections = 1

            [logging]
            level = "info"
            format = "json"
        "#;

        let mut builder = config::Config::builder()
            .add_source(config::File::from_str(defaults, config::FileFormat::Toml));

        for (key, value) in overrides {
            builder = builder.set_override(*key, *value)?;
        }

        // validation is left to the individual tests
        builder.build()?.try_deserialize()
    }

    fn validate(&self) -> Result<(), ConfigValidationError> {
        if self.database.min_connections > self.database.max_connections {
            return Err(ConfigValidationError::InvalidValue(
                "min_connections cannot exceed max_connections".to_string(),
            ));
        }

        if self.heal.max_attempts == 0 {
            return Err(ConfigValidationError::InvalidValue(
                "heal.max_attempts must be at least 1".to_string(),
            ));
        }

        if self.purge.grace_days < 0 {
            return Err(ConfigValidationError::InvalidValue(
                "purge.grace_days cannot be negative".to_string(),
            ));
        }

        Ok(())
    }
}
