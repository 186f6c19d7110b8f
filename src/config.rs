//! Configuration System
//!
//! Handles loading configuration from files and environment variables.
//! Supports TOML config files and environment variable overrides.

use chrono::NaiveTime;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::solar::{FixedSchedule, NoaaCalculator, SolarCalculator};
use crate::storage::{AdapterConfig, ParameterDefinition, ParameterRegistry};

/// Main configuration structure
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub fetch: FetchConfig,

    #[serde(default)]
    pub cache: CacheConfig,

    #[serde(default)]
    pub statistics: StatisticsConfig,

    #[serde(default)]
    pub api: ApiConfig,

    #[serde(default)]
    pub logging: LoggingConfig,

    /// Parameter table; empty means the eleven standard IMGW parameters
    #[serde(default)]
    pub parameters: Vec<ParameterDefinition>,
}

/// Database locations
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageConfig {
    #[serde(default = "default_data_dir")]
    pub data_dir: String,

    /// Measurement database, relative to `data_dir` unless absolute
    #[serde(default = "default_measurements_db")]
    pub measurements_db: String,

    /// Station and boundary database, relative to `data_dir` unless absolute
    #[serde(default = "default_geo_db")]
    pub geo_db: String,
}

fn default_data_dir() -> String {
    dirs::data_local_dir()
        .map(|p| p.join("meteo-region").to_string_lossy().to_string())
        .unwrap_or_else(|| "./meteo_data".to_string())
}

fn default_measurements_db() -> String {
    "measurements.db".to_string()
}

fn default_geo_db() -> String {
    "geo.db".to_string()
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            measurements_db: default_measurements_db(),
            geo_db: default_geo_db(),
        }
    }
}

impl StorageConfig {
    fn resolve(&self, file: &str) -> PathBuf {
        let path = Path::new(file);
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            Path::new(&self.data_dir).join(path)
        }
    }

    pub fn measurements_path(&self) -> PathBuf {
        self.resolve(&self.measurements_db)
    }

    pub fn geo_path(&self) -> PathBuf {
        self.resolve(&self.geo_db)
    }
}

/// Measurement store call policy
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FetchConfig {
    #[serde(default = "default_fetch_timeout")]
    pub timeout_ms: u64,

    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    #[serde(default = "default_backoff")]
    pub backoff_ms: u64,
}

fn default_fetch_timeout() -> u64 {
    5000 // 5 seconds
}

fn default_max_retries() -> u32 {
    3
}

fn default_backoff() -> u64 {
    200
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout_ms: default_fetch_timeout(),
            max_retries: default_max_retries(),
            backoff_ms: default_backoff(),
        }
    }
}

impl FetchConfig {
    pub fn adapter_config(&self) -> AdapterConfig {
        AdapterConfig {
            timeout: Duration::from_millis(self.timeout_ms),
            max_retries: self.max_retries,
            backoff: Duration::from_millis(self.backoff_ms),
        }
    }
}

/// Result cache configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CacheConfig {
    /// Keep results in a SQLite file across restarts
    #[serde(default)]
    pub persistent: bool,

    /// Cache database, relative to `storage.data_dir` unless absolute
    #[serde(default = "default_cache_path")]
    pub path: String,

    /// Entry lifetime; 0 keeps entries until cleared
    #[serde(default = "default_cache_ttl")]
    pub ttl_secs: u64,
}

fn default_cache_path() -> String {
    "cache.db".to_string()
}

fn default_cache_ttl() -> u64 {
    60 * 60 // 1 hour
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            persistent: false,
            path: default_cache_path(),
            ttl_secs: default_cache_ttl(),
        }
    }
}

impl CacheConfig {
    pub fn ttl(&self) -> Option<Duration> {
        (self.ttl_secs > 0).then(|| Duration::from_secs(self.ttl_secs))
    }
}

/// Sunrise/sunset source
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SolarModel {
    /// Sunrise equation per station coordinates
    #[default]
    Noaa,
    /// Same local clock times for every station and date
    Fixed,
}

/// Aggregation settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StatisticsConfig {
    /// Share trimmed from each end for the trimmed mean, in [0, 0.5)
    #[serde(default = "default_trim")]
    pub trim_proportion: f64,

    /// Store queries in flight per request
    #[serde(default = "default_max_concurrent_fetches")]
    pub max_concurrent_fetches: usize,

    #[serde(default)]
    pub solar: SolarModel,

    /// UTC sunrise for the fixed model, `HH:MM`
    #[serde(default = "default_fixed_sunrise")]
    pub fixed_sunrise: String,

    /// UTC sunset for the fixed model, `HH:MM`
    #[serde(default = "default_fixed_sunset")]
    pub fixed_sunset: String,
}

fn default_trim() -> f64 {
    0.1
}

fn default_max_concurrent_fetches() -> usize {
    8
}

fn default_fixed_sunrise() -> String {
    "06:00".to_string()
}

fn default_fixed_sunset() -> String {
    "18:00".to_string()
}

impl Default for StatisticsConfig {
    fn default() -> Self {
        Self {
            trim_proportion: default_trim(),
            max_concurrent_fetches: default_max_concurrent_fetches(),
            solar: SolarModel::default(),
            fixed_sunrise: default_fixed_sunrise(),
            fixed_sunset: default_fixed_sunset(),
        }
    }
}

fn parse_clock(field: &str, value: &str) -> Result<NaiveTime, ConfigError> {
    NaiveTime::parse_from_str(value, "%H:%M")
        .map_err(|e| ConfigError::Invalid(format!("statistics.{} = {:?}: {}", field, value, e)))
}

impl StatisticsConfig {
    /// Build the configured solar calculator
    pub fn solar_calculator(&self) -> Result<std::sync::Arc<dyn SolarCalculator>, ConfigError> {
        match self.solar {
            SolarModel::Noaa => Ok(std::sync::Arc::new(NoaaCalculator::new())),
            SolarModel::Fixed => {
                let sunrise = parse_clock("fixed_sunrise", &self.fixed_sunrise)?;
                let sunset = parse_clock("fixed_sunset", &self.fixed_sunset)?;
                let schedule = FixedSchedule::new(sunrise, sunset).ok_or_else(|| {
                    ConfigError::Invalid(format!(
                        "fixed sunrise {} must be before sunset {}",
                        self.fixed_sunrise, self.fixed_sunset
                    ))
                })?;
                Ok(std::sync::Arc::new(schedule))
            }
        }
    }
}

/// API server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ApiConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Allowed CORS origins; empty allows any origin
    #[serde(default)]
    pub cors_origins: Vec<String>,

    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8090
}

fn default_request_timeout() -> u64 {
    30
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            cors_origins: Vec::new(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default = "default_log_format")]
    pub format: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl Config {
    /// Load configuration from a file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            error: e.to_string(),
        })?;

        Self::parse(&content).map_err(|e| match e {
            ConfigError::Parse { error, .. } => ConfigError::Parse {
                path: path.to_path_buf(),
                error,
            },
            other => other,
        })
    }

    /// Parse configuration from TOML text
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|e| ConfigError::Parse {
            path: PathBuf::new(),
            error: e.to_string(),
        })
    }

    /// Load configuration from environment variables only
    pub fn from_env() -> Self {
        let mut config = Config::default();
        config.apply_env_overrides();
        config
    }

    /// Load configuration with environment variable overrides
    pub fn load_with_env(path: &Path) -> Result<Self, ConfigError> {
        let mut config = Self::load(path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Load an explicit file, or the first default location that exists
    ///
    /// An explicit path must load; default locations that fail are skipped
    /// and listed in the returned [`LoadReport`]. Nothing is logged here, as
    /// configuration is read before the subscriber is installed.
    pub fn load_default(explicit: Option<&Path>) -> Result<(Self, LoadReport), ConfigError> {
        if let Some(path) = explicit {
            let config = Self::load_with_env(path)?;
            let report = LoadReport {
                source: Some(path.to_path_buf()),
                skipped: Vec::new(),
            };
            return Ok((config, report));
        }

        let candidates: Vec<PathBuf> = [
            dirs::config_dir().map(|p| p.join("meteo-region").join("config.toml")),
            Some(PathBuf::from("/etc/meteo-region/config.toml")),
            Some(PathBuf::from("./config.toml")),
        ]
        .into_iter()
        .flatten()
        .collect();

        Ok(Self::load_first(&candidates))
    }

    /// First candidate that exists and loads, falling back to defaults
    fn load_first(candidates: &[PathBuf]) -> (Self, LoadReport) {
        let mut report = LoadReport::default();

        for path in candidates.iter().filter(|p| p.exists()) {
            match Self::load_with_env(path) {
                Ok(config) => {
                    report.source = Some(path.clone());
                    return (config, report);
                }
                Err(e) => report.skipped.push((path.clone(), e)),
            }
        }

        (Self::from_env(), report)
    }

    /// Apply environment variable overrides to an existing config
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    fn apply_overrides(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(data_dir) = var("METEO_REGION_DATA_DIR") {
            self.storage.data_dir = data_dir;
        }

        if let Some(host) = var("METEO_REGION_API_HOST") {
            self.api.host = host;
        }
        if let Some(port) = var("METEO_REGION_API_PORT") {
            match port.parse() {
                Ok(p) => self.api.port = p,
                Err(_) => tracing::warn!(value = %port, "Ignoring invalid METEO_REGION_API_PORT"),
            }
        }

        if let Some(ttl) = var("METEO_REGION_CACHE_TTL_SECS") {
            match ttl.parse() {
                Ok(t) => self.cache.ttl_secs = t,
                Err(_) => tracing::warn!(value = %ttl, "Ignoring invalid METEO_REGION_CACHE_TTL_SECS"),
            }
        }

        if let Some(level) = var("METEO_REGION_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Some(format) = var("METEO_REGION_LOG_FORMAT") {
            self.logging.format = format;
        }
    }

    /// Check value ranges and cross-field constraints
    pub fn validate(&self) -> Result<(), ConfigError> {
        let trim = self.statistics.trim_proportion;
        if !(0.0..0.5).contains(&trim) {
            return Err(ConfigError::Invalid(format!(
                "statistics.trim_proportion must be in [0, 0.5), got {}",
                trim
            )));
        }
        if self.statistics.max_concurrent_fetches == 0 {
            return Err(ConfigError::Invalid(
                "statistics.max_concurrent_fetches must be at least 1".to_string(),
            ));
        }
        if self.fetch.timeout_ms == 0 {
            return Err(ConfigError::Invalid(
                "fetch.timeout_ms must be positive".to_string(),
            ));
        }
        if !matches!(self.logging.format.as_str(), "pretty" | "json") {
            return Err(ConfigError::Invalid(format!(
                "logging.format must be \"pretty\" or \"json\", got {:?}",
                self.logging.format
            )));
        }

        self.statistics.solar_calculator()?;
        self.parameter_registry()?;
        Ok(())
    }

    /// Registry of the configured parameters
    pub fn parameter_registry(&self) -> Result<ParameterRegistry, ConfigError> {
        if self.parameters.is_empty() {
            Ok(ParameterRegistry::standard())
        } else {
            ParameterRegistry::from_definitions(self.parameters.clone())
        }
    }

    /// Cache database location
    pub fn cache_path(&self) -> PathBuf {
        self.storage.resolve(&self.cache.path)
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path:?}: {error}")]
    Io { path: PathBuf, error: String },

    #[error("Failed to parse config file {path:?}: {error}")]
    Parse { path: PathBuf, error: String },

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Where [`Config::load_default`] found its configuration
#[derive(Debug, Default)]
pub struct LoadReport {
    /// File the configuration came from, `None` for built-in defaults
    pub source: Option<PathBuf>,
    /// Default locations that exist but failed to load
    pub skipped: Vec<(PathBuf, ConfigError)>,
}

impl LoadReport {
    /// Log the outcome; call once the subscriber is installed
    pub fn log(&self) {
        for (path, error) in &self.skipped {
            tracing::warn!("Failed to load config from {:?}: {}", path, error);
        }
        match &self.source {
            Some(path) => tracing::info!("Loaded config from {:?}", path),
            None => tracing::info!("Using default config with environment overrides"),
        }
    }
}

/// Generate a default config file content
pub fn generate_default_config() -> String {
    r#"# meteo-region configuration
#
# Environment variables override these settings:
# - METEO_REGION_DATA_DIR
# - METEO_REGION_API_HOST
# - METEO_REGION_API_PORT
# - METEO_REGION_CACHE_TTL_SECS
# - METEO_REGION_LOG_LEVEL
# - METEO_REGION_LOG_FORMAT

[storage]
# Directory holding the databases
data_dir = "~/.local/share/meteo-region"

# Station telemetry (relative to data_dir)
measurements_db = "measurements.db"

# Stations and administrative boundaries (relative to data_dir)
geo_db = "geo.db"

[fetch]
# Deadline for a single store query (ms)
timeout_ms = 5000

# Retries after a timeout or connection failure
max_retries = 3

# Base backoff; retry n waits backoff_ms * n^2
backoff_ms = 200

[cache]
# Keep results in a SQLite file across restarts
persistent = false

# Cache database (relative to data_dir)
path = "cache.db"

# Entry lifetime in seconds, 0 = until cleared
ttl_secs = 3600

[statistics]
# Share trimmed from each end for the trimmed mean
trim_proportion = 0.1

# Store queries in flight per request
max_concurrent_fetches = 8

# Sunrise/sunset source: "noaa" (per station) or "fixed"
solar = "noaa"

# UTC clock times used when solar = "fixed"
fixed_sunrise = "06:00"
fixed_sunset = "18:00"

[api]
# API server host
host = "0.0.0.0"

# API server port
port = 8090

# Allowed CORS origins, empty allows any
cors_origins = []

# Request timeout in seconds
request_timeout_secs = 30

[logging]
# Log level: trace, debug, info, warn, error
level = "info"

# Log format: pretty (for development) or json (for production)
format = "pretty"

# Parameter table. Leave out to use the eleven standard IMGW parameters.
#
# [[parameters]]
# code = "B00300S"
# name = "Air temperature"
# unit = "°C"
# aggregation = "mean_median"
#
# [[parameters]]
# code = "B00606S"
# unit = "mm"
# aggregation = "sum"
"#
    .to_string()
}
