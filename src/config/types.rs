// Configuration types module
// Defines all configuration-related data structures

use serde::Deserialize;
use std::time::Duration;

pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 5000;
pub const DEFAULT_WATCH_PATH: &str = "./ralph.json";
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 2;

/// Main configuration structure
#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub watch: WatchConfig,
    #[serde(default)]
    pub http: HttpConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub performance: PerformanceConfig,
}

/// Server configuration
#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Tokio worker threads, CPU cores when unset
    #[serde(default)]
    pub workers: Option<usize>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            workers: None,
        }
    }
}

/// Watched status file configuration
#[derive(Debug, Deserialize, Clone)]
pub struct WatchConfig {
    pub path: String,
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
    /// Sub-second override, takes precedence over `poll_interval_secs`
    #[serde(default)]
    pub poll_interval_ms: Option<u64>,
}

#[allow(clippy::missing_const_for_fn)]
fn default_poll_interval_secs() -> u64 {
    DEFAULT_POLL_INTERVAL_SECS
}

impl WatchConfig {
    /// Effective refresh period, never zero
    pub fn poll_interval(&self) -> Duration {
        let interval = self.poll_interval_ms.map_or_else(
            || Duration::from_secs(self.poll_interval_secs),
            Duration::from_millis,
        );
        interval.max(Duration::from_millis(1))
    }
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            path: DEFAULT_WATCH_PATH.to_string(),
            poll_interval_secs: default_poll_interval_secs(),
            poll_interval_ms: None,
        }
    }
}

/// HTTP configuration
#[derive(Debug, Deserialize, Clone)]
pub struct HttpConfig {
    #[serde(default = "default_static_dir")]
    pub static_dir: String,
    #[serde(default = "default_index_file")]
    pub index_file: String,
    #[serde(default = "default_enable_cors")]
    pub enable_cors: bool,
    #[serde(default = "default_server_name")]
    pub server_name: String,
    /// Liveness probe path, empty string disables it
    #[serde(default = "default_health_path")]
    pub health_path: String,
}

#[allow(clippy::missing_const_for_fn)]
fn default_static_dir() -> String {
    "static".to_string()
}

#[allow(clippy::missing_const_for_fn)]
fn default_index_file() -> String {
    "index.html".to_string()
}

#[allow(clippy::missing_const_for_fn)]
fn default_enable_cors() -> bool {
    true
}

#[allow(clippy::missing_const_for_fn)]
fn default_server_name() -> String {
    "ralph-dashboard".to_string()
}

#[allow(clippy::missing_const_for_fn)]
fn default_health_path() -> String {
    "/healthz".to_string()
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            static_dir: default_static_dir(),
            index_file: default_index_file(),
            enable_cors: default_enable_cors(),
            server_name: default_server_name(),
            health_path: default_health_path(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default = "default_access_log")]
    pub access_log: bool,
    /// Access log format (combined, common, json, or custom pattern)
    #[serde(default = "default_access_log_format")]
    pub access_log_format: String,
    /// Access log file path (optional, stdout if not set)
    #[serde(default)]
    pub access_log_file: Option<String>,
    /// Error log file path (optional, stderr if not set)
    #[serde(default)]
    pub error_log_file: Option<String>,
}

#[allow(clippy::missing_const_for_fn)]
fn default_log_level() -> String {
    "info".to_string()
}

#[allow(clippy::missing_const_for_fn)]
fn default_access_log() -> bool {
    true
}

#[allow(clippy::missing_const_for_fn)]
fn default_access_log_format() -> String {
    "combined".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            access_log: default_access_log(),
            access_log_format: default_access_log_format(),
            access_log_file: None,
            error_log_file: None,
        }
    }
}

/// Performance configuration
#[derive(Debug, Deserialize, Clone)]
pub struct PerformanceConfig {
    #[serde(default = "default_keep_alive")]
    pub keep_alive: bool,
    #[serde(default = "default_connection_timeout_secs")]
    pub connection_timeout_secs: u64,
}

#[allow(clippy::missing_const_for_fn)]
fn default_keep_alive() -> bool {
    true
}

#[allow(clippy::missing_const_for_fn)]
fn default_connection_timeout_secs() -> u64 {
    30
}

impl Default for PerformanceConfig {
    fn default() -> Self {
        Self {
            keep_alive: default_keep_alive(),
            connection_timeout_secs: default_connection_timeout_secs(),
        }
    }
}
