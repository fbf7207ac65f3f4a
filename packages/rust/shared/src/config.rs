//! Application configuration for StoreFinder.
//!
//! User config lives at `~/.storefinder/storefinder.toml`.
//! CLI flags override config file values, which override defaults.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Result, StoreFinderError};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "storefinder.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".storefinder";

/// Longest accepted refresh interval (one week).
pub const MAX_REFRESH_INTERVAL: Duration = Duration::from_secs(7 * 24 * 60 * 60);

/// Longest accepted scheduler tick (one hour).
pub const MAX_TICK: Duration = Duration::from_secs(60 * 60);

// ---------------------------------------------------------------------------
// Config structs (matching storefinder.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Where the store list comes from.
    #[serde(default)]
    pub catalog: CatalogConfig,

    /// Outbound HTTP behaviour.
    #[serde(default)]
    pub http: HttpSettings,

    /// Refresh scheduler settings.
    #[serde(default)]
    pub scheduler: SchedulerConfig,

    /// Worker pool settings.
    #[serde(default)]
    pub pool: PoolConfig,

    /// Query server settings.
    #[serde(default)]
    pub server: ServerConfig,
}

/// `[catalog]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogConfig {
    /// URL of the JSON store list.
    #[serde(default = "default_stores_url")]
    pub stores_url: String,

    /// Drop stores whose `online` flag is false during bootstrap.
    #[serde(default)]
    pub skip_offline: bool,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            stores_url: default_stores_url(),
            skip_offline: false,
        }
    }
}

fn default_stores_url() -> String {
    "https://www.tuenvio.cu/stores.json".into()
}

/// `[http]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpSettings {
    /// Per-request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Extra attempts after the first failed request.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Base delay between attempts; attempt `n` waits `n * retry_backoff_ms`.
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            max_retries: default_max_retries(),
            retry_backoff_ms: default_retry_backoff_ms(),
        }
    }
}

fn default_timeout_secs() -> u64 {
    30
}
fn default_max_retries() -> u32 {
    3
}
fn default_retry_backoff_ms() -> u64 {
    500
}

/// `[scheduler]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Seconds between two dispatches of the same section.
    #[serde(default = "default_refresh_interval_secs")]
    pub refresh_interval_secs: u64,

    /// Milliseconds between two registry scans.
    #[serde(default = "default_tick_ms")]
    pub tick_ms: u64,

    /// Maximum registry entries examined per scan. Unset scans everything.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scan_limit: Option<usize>,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            refresh_interval_secs: default_refresh_interval_secs(),
            tick_ms: default_tick_ms(),
            scan_limit: None,
        }
    }
}

fn default_refresh_interval_secs() -> u64 {
    60
}
fn default_tick_ms() -> u64 {
    1000
}

/// `[pool]` section.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PoolConfig {
    /// Number of concurrent fetch workers. Unset uses available parallelism.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workers: Option<usize>,
}

/// `[server]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Interface the query server binds to.
    #[serde(default = "default_host")]
    pub host: String,

    /// Port the query server listens on.
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> String {
    "127.0.0.1".into()
}
fn default_port() -> u16 {
    8080
}

// ---------------------------------------------------------------------------
// Runtime configs (merged from config + CLI flags)
// ---------------------------------------------------------------------------

/// Runtime HTTP client configuration.
#[derive(Debug, Clone)]
pub struct HttpConfig {
    /// Per-request timeout.
    pub timeout: Duration,
    /// Extra attempts after the first failure.
    pub max_retries: u32,
    /// Base backoff between attempts.
    pub retry_backoff: Duration,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self::from(&AppConfig::default())
    }
}

impl From<&AppConfig> for HttpConfig {
    fn from(config: &AppConfig) -> Self {
        Self {
            timeout: Duration::from_secs(config.http.timeout_secs),
            max_retries: config.http.max_retries,
            retry_backoff: Duration::from_millis(config.http.retry_backoff_ms),
        }
    }
}

/// Runtime refresh configuration for the scheduler and worker pool.
#[derive(Debug, Clone)]
pub struct RefreshConfig {
    /// Minimum time between two dispatches of one section.
    pub refresh_interval: Duration,
    /// Time between two registry scans.
    pub tick: Duration,
    /// Maximum entries examined per scan; `None` scans the whole registry.
    pub scan_limit: Option<usize>,
    /// Fixed worker pool size.
    pub workers: usize,
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self::from(&AppConfig::default())
    }
}

impl From<&AppConfig> for RefreshConfig {
    fn from(config: &AppConfig) -> Self {
        Self {
            refresh_interval: Duration::from_secs(config.scheduler.refresh_interval_secs),
            tick: Duration::from_millis(config.scheduler.tick_ms),
            scan_limit: config.scheduler.scan_limit,
            workers: config.pool.workers.unwrap_or_else(default_workers),
        }
    }
}

/// Number of available processing units, falling back to 1.
pub fn default_workers() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.storefinder/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| StoreFinderError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.storefinder/storefinder.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| StoreFinderError::io(path, e))?;

    let config: AppConfig = toml::from_str(&content).map_err(|e| {
        StoreFinderError::config(format!("failed to parse {}: {e}", path.display()))
    })?;
    validate_config(&config)?;
    Ok(config)
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| StoreFinderError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| StoreFinderError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| StoreFinderError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}

/// Reject values the scheduler and pool cannot run with.
pub fn validate_config(config: &AppConfig) -> Result<()> {
    if config.scheduler.refresh_interval_secs == 0 {
        return Err(StoreFinderError::config(
            "scheduler.refresh_interval_secs must be greater than 0",
        ));
    }
    if config.scheduler.refresh_interval_secs > MAX_REFRESH_INTERVAL.as_secs() {
        return Err(StoreFinderError::config(format!(
            "scheduler.refresh_interval_secs must be at most {}",
            MAX_REFRESH_INTERVAL.as_secs()
        )));
    }
    if config.scheduler.tick_ms == 0 {
        return Err(StoreFinderError::config(
            "scheduler.tick_ms must be greater than 0",
        ));
    }
    if config.scheduler.tick_ms > MAX_TICK.as_millis() as u64 {
        return Err(StoreFinderError::config(format!(
            "scheduler.tick_ms must be at most {}",
            MAX_TICK.as_millis()
        )));
    }
    if config.scheduler.scan_limit == Some(0) {
        return Err(StoreFinderError::config(
            "scheduler.scan_limit must be greater than 0 when set",
        ));
    }
    if config.pool.workers == Some(0) {
        return Err(StoreFinderError::config(
            "pool.workers must be greater than 0 when set",
        ));
    }
    url::Url::parse(&config.catalog.stores_url).map_err(|e| {
        StoreFinderError::config(format!(
            "catalog.stores_url '{}' is not a valid URL: {e}",
            config.catalog.stores_url
        ))
    })?;
    Ok(())
}
