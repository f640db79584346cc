//! Server configuration loading from file and environment variables.

use serde::Deserialize;
use std::net::{IpAddr, Ipv4Addr};
use std::time::Duration;
use thiserror::Error;

/// Top-level server configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    /// Server network settings.
    #[serde(default)]
    pub server: ServerConfig,

    /// Database settings.
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Federation fetch settings.
    #[serde(default)]
    pub federation: FederationConfig,
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

/// Database configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Path to the SQLite database file, or `:memory:`.
    #[serde(default = "default_db_path")]
    pub path: String,

    /// SQLite busy timeout in milliseconds.
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,

    /// Maximum number of pooled connections.
    #[serde(default = "default_pool_max_size")]
    pub pool_max_size: u32,
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level filter (e.g., "info", "debug", "keyfed_federation=debug,info").
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Whether to output logs in JSON format.
    #[serde(default)]
    pub json: bool,
}

/// Federation fetch configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct FederationConfig {
    /// Time budget for one fetch call, in milliseconds. A fetch that runs
    /// out of budget returns a partial response.
    #[serde(default = "default_fetch_timeout_ms")]
    pub fetch_timeout_ms: u64,

    /// Width of the batching window, in seconds. Records created in the
    /// current window are held back until it closes.
    #[serde(default = "default_window_secs")]
    pub window_secs: i64,

    /// Rows loaded per storage round trip.
    #[serde(default = "default_page_size")]
    pub page_size: usize,
}

impl FederationConfig {
    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_millis(self.fetch_timeout_ms)
    }
}

fn default_host() -> IpAddr {
    IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1))
}

fn default_port() -> u16 {
    3000
}

fn default_db_path() -> String {
    "keyfed.db".to_string()
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

fn default_fetch_timeout_ms() -> u64 {
    25_000
}

fn default_window_secs() -> i64 {
    3_600
}

fn default_page_size() -> usize {
    keyfed_db::DEFAULT_PAGE_SIZE
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

impl Default for FederationConfig {
    fn default() -> Self {
        Self {
            fetch_timeout_ms: default_fetch_timeout_ms(),
            window_secs: default_window_secs(),
            page_size: default_page_size(),
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
/// - `KEYFED_HOST` overrides `server.host`
/// - `KEYFED_PORT` overrides `server.port`
/// - `KEYFED_DB_PATH` overrides `database.path`
/// - `KEYFED_LOG_LEVEL` overrides `logging.level`
/// - `KEYFED_LOG_JSON` overrides `logging.json` (set to "true" to enable)
/// - `KEYFED_FETCH_TIMEOUT_MS` overrides `federation.fetch_timeout_ms`
/// - `KEYFED_WINDOW_SECS` overrides `federation.window_secs`
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

    apply_overrides(&mut config, |key| std::env::var(key).ok());
    Ok(config)
}

/// Applies `KEYFED_*` overrides looked up through `var`. Values that fail
/// to parse are ignored.
fn apply_overrides(config: &mut Config, var: impl Fn(&str) -> Option<String>) {
    if let Some(parsed) = var("KEYFED_HOST").and_then(|v| v.parse().ok()) {
        config.server.host = parsed;
    }
    if let Some(parsed) = var("KEYFED_PORT").and_then(|v| v.parse().ok()) {
        config.server.port = parsed;
    }
    if let Some(db_path) = var("KEYFED_DB_PATH") {
        config.database.path = db_path;
    }
    if let Some(level) = var("KEYFED_LOG_LEVEL") {
        config.logging.level = level;
    }
    if let Some(json) = var("KEYFED_LOG_JSON") {
        config.logging.json = json == "true" || json == "1";
    }
    if let Some(parsed) = var("KEYFED_FETCH_TIMEOUT_MS").and_then(|v| v.parse().ok()) {
        config.federation.fetch_timeout_ms = parsed;
    }
    if let Some(parsed) = var("KEYFED_WINDOW_SECS").and_then(|v| v.parse().ok()) {
        config.federation.window_secs = parsed;
    }
}
