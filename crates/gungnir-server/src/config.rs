//! Server configuration loading from file and environment variables.

use gungnir_cipher::CipherConfig;
use serde::Deserialize;
use std::net::{IpAddr, Ipv4Addr};
use std::time::Duration;
use thiserror::Error;

/// Top-level server configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Server network settings.
    #[serde(default)]
    pub server: ServerConfig,

    /// Record store settings.
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Record query limits and long-poll timing.
    #[serde(default)]
    pub query: QueryConfig,

    /// Decrypters, one per `(alg, kid)` pair found on stored records.
    #[serde(default = "default_ciphers")]
    pub cipher: Vec<CipherConfig>,
}

/// Network configuration for the HTTP server.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Host address to bind to.
    #[serde(default = "default_host")]
    pub host: IpAddr,

    /// Port to listen on.
    #[serde(default = "default_port")]
    pub port: u16,
}

/// Record store configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_db_path")]
    pub path: String,

    /// SQLite busy timeout in milliseconds.
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,

    /// Maximum pooled connections.
    #[serde(default = "default_pool_max_size")]
    pub pool_max_size: u32,
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level filter (e.g., "info", "debug", "gungnir_server=debug,info").
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Whether to output logs in JSON format.
    #[serde(default)]
    pub json: bool,
}

/// Query limits and long-poll timing.
#[derive(Debug, Clone, Deserialize)]
pub struct QueryConfig {
    /// Maximum records fetched for the events endpoint.
    #[serde(default = "default_get_limit")]
    pub get_event_limit: usize,

    /// Maximum state records fetched for the status endpoint.
    #[serde(default = "default_get_limit")]
    pub get_status_limit: usize,

    /// Extra attempts after a failed record fetch.
    #[serde(default = "default_get_retries")]
    pub get_retries: u32,

    /// Pause between fetch attempts, in milliseconds.
    #[serde(default = "default_retry_interval_ms")]
    pub retry_interval_ms: u64,

    /// Pause between long-poll fetches, in milliseconds.
    #[serde(default = "default_long_poll_sleep_ms")]
    pub long_poll_sleep_ms: u64,

    /// How long a long-poll request waits for new records, in milliseconds.
    #[serde(default = "default_long_poll_timeout_ms")]
    pub long_poll_timeout_ms: u64,
}

impl QueryConfig {
    pub fn retry_interval(&self) -> Duration {
        Duration::from_millis(self.retry_interval_ms)
    }

    pub fn long_poll_sleep(&self) -> Duration {
        Duration::from_millis(self.long_poll_sleep_ms)
    }

    pub fn long_poll_timeout(&self) -> Duration {
        Duration::from_millis(self.long_poll_timeout_ms)
    }
}

fn default_host() -> IpAddr {
    IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1))
}

fn default_port() -> u16 {
    6400
}

fn default_db_path() -> String {
    "gungnir.db".to_string()
}

fn default_busy_timeout_ms() -> u64 {
    5_000
}

fn default_pool_max_size() -> u32 {
    8
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_get_limit() -> usize {
    50
}

fn default_get_retries() -> u32 {
    1
}

fn default_retry_interval_ms() -> u64 {
    100
}

fn default_long_poll_sleep_ms() -> u64 {
    1_000
}

fn default_long_poll_timeout_ms() -> u64 {
    30_000
}

fn default_ciphers() -> Vec<CipherConfig> {
    vec![CipherConfig {
        alg: "none".to_string(),
        kid: "none".to_string(),
        key: None,
    }]
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            database: DatabaseConfig::default(),
            logging: LoggingConfig::default(),
            query: QueryConfig::default(),
            cipher: default_ciphers(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
            busy_timeout_ms: default_busy_timeout_ms(),
            pool_max_size: default_pool_max_size(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            get_event_limit: default_get_limit(),
            get_status_limit: default_get_limit(),
            get_retries: default_get_retries(),
            retry_interval_ms: default_retry_interval_ms(),
            long_poll_sleep_ms: default_long_poll_sleep_ms(),
            long_poll_timeout_ms: default_long_poll_timeout_ms(),
        }
    }
}

/// Errors that can occur when loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read the configuration file.
    #[error("failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),

    /// Failed to parse the configuration file.
    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Loads configuration from a TOML file, falling back to defaults.
///
/// Environment variable overrides:
/// - `GUNGNIR_HOST` overrides `server.host`
/// - `GUNGNIR_PORT` overrides `server.port`
/// - `GUNGNIR_DB_PATH` overrides `database.path`
/// - `GUNGNIR_LOG_LEVEL` overrides `logging.level`
/// - `GUNGNIR_LOG_JSON` overrides `logging.json` (set to "true" to enable)
/// - `GUNGNIR_LONG_POLL_TIMEOUT_MS` overrides `query.long_poll_timeout_ms`
///
/// # Errors
///
/// Returns `ConfigError` if the file exists but cannot be read or parsed.
pub fn load_config(path: Option<&str>) -> Result<Config, ConfigError> {
    let mut config = match path {
        Some(p) => match std::fs::read_to_string(p) {
            Ok(contents) => toml::from_str(&contents)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!(path = p, "config file not found, using defaults");
                Config::default()
            }
            Err(e) => return Err(ConfigError::FileRead(e)),
        },
        None => Config::default(),
    };

    if let Ok(host) = std::env::var("GUNGNIR_HOST") {
        if let Ok(parsed) = host.parse() {
            config.server.host = parsed;
        }
    }
    if let Ok(port) = std::env::var("GUNGNIR_PORT") {
        if let Ok(parsed) = port.parse() {
            config.server.port = parsed;
        }
    }
    if let Ok(db_path) = std::env::var("GUNGNIR_DB_PATH") {
        config.database.path = db_path;
    }
    if let Ok(level) = std::env::var("GUNGNIR_LOG_LEVEL") {
        config.logging.level = level;
    }
    if let Ok(json) = std::env::var("GUNGNIR_LOG_JSON") {
        config.logging.json = json == "true" || json == "1";
    }
    if let Ok(timeout) = std::env::var("GUNGNIR_LONG_POLL_TIMEOUT_MS") {
        if let Ok(parsed) = timeout.parse() {
            config.query.long_poll_timeout_ms = parsed;
        }
    }

    Ok(config)
}
