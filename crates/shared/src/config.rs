//! Application configuration management.

use serde::Deserialize;

/// Application configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Database configuration.
    pub database: DatabaseConfig,
    /// Ledger engine configuration.
    #[serde(default)]
    pub ledger: LedgerConfig,
    /// Logging configuration.
    #[serde(default)]
    pub log: LogConfig,
}

/// Database configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Database connection URL.
    pub url: String,
    /// Maximum number of connections in the pool.
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    /// Minimum number of connections in the pool.
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,
    /// Seconds to wait for a pooled connection before giving up.
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
}

fn default_max_connections() -> u32 {
    10
}

fn default_min_connections() -> u32 {
    1
}

fn default_connect_timeout() -> u64 {
    30
}

/// Ledger engine configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LedgerConfig {
    /// Upper bound on waiting for an account row lock, in milliseconds.
    #[serde(default = "default_lock_timeout_ms")]
    pub lock_timeout_ms: u64,
    /// Maximum length, in characters, of a caller-supplied transfer description.
    ///
    /// The engine clamps this to what the log description column can hold.
    #[serde(default = "default_max_description_len")]
    pub max_description_len: usize,
}

fn default_lock_timeout_ms() -> u64 {
    5_000
}

fn default_max_description_len() -> usize {
    255
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            lock_timeout_ms: default_lock_timeout_ms(),
            max_description_len: default_max_description_len(),
        }
    }
}

/// Logging configuration, consumed by the binaries when installing a subscriber.
#[derive(Debug, Clone, Deserialize)]
pub struct LogConfig {
    /// `EnvFilter` directive used when `RUST_LOG` is unset.
    #[serde(default = "default_log_filter")]
    pub filter: String,
    /// Emit JSON lines instead of human-readable output.
    #[serde(default)]
    pub json: bool,
}

fn default_log_filter() -> String {
    "bankcore=info,seeder=info,sea_orm=warn".to_string()
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            filter: default_log_filter(),
            json: false,
        }
    }
}

impl AppConfig {
    /// Loads configuration from environment and config files.
    ///
    /// Sources, later ones overriding earlier ones: `config/default`,
    /// `config/{RUN_MODE}`, then `BANKCORE__`-prefixed environment variables
    /// (e.g. `BANKCORE__DATABASE__URL`).
    ///
    /// # Errors
    ///
    /// Returns an error if configuration cannot be loaded.
    pub fn load() -> Result<Self, config::ConfigError> {
        let run_mode = std::env::var("RUN_MODE").unwrap_or_else(|_| "development".to_string());

        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name(&format!("config/{run_mode}")).required(false))
            .add_source(config::Environment::with_prefix("BANKCORE").separator("__"))
            .build()?;

        config.try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_from_environment_with_defaults() {
        temp_env::with_vars(
            [
                ("BANKCORE__DATABASE__URL", Some("postgres://localhost/bank")),
                ("RUN_MODE", Some("test-without-files")),
            ],
            || {
                let config = AppConfig::load().unwrap();
                assert_eq!(config.database.url, "postgres://localhost/bank");
                assert_eq!(config.database.max_connections, 10);
                assert_eq!(config.database.min_connections, 1);
                assert_eq!(config.ledger.lock_timeout_ms, 5_000);
                assert_eq!(config.ledger.max_description_len, 255);
                assert!(!config.log.json);
            },
        );
    }

    #[test]
    fn test_ledger_overrides_from_environment() {
        temp_env::with_vars(
            [
                ("BANKCORE__DATABASE__URL", Some("postgres://localhost/bank")),
                ("BANKCORE__LEDGER__LOCK_TIMEOUT_MS", Some("250")),
                ("RUN_MODE", Some("test-without-files")),
            ],
            || {
                let config = AppConfig::load().unwrap();
                assert_eq!(config.ledger.lock_timeout_ms, 250);
                assert_eq!(config.ledger.max_description_len, 255);
            },
        );
    }

    #[test]
    fn test_missing_database_url_fails() {
        temp_env::with_vars(
            [
                ("BANKCORE__DATABASE__URL", None::<&str>),
                ("RUN_MODE", Some("test-without-files")),
            ],
            || {
                assert!(AppConfig::load().is_err());
            },
        );
    }
}
