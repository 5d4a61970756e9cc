//! Configuration layer for the review platform.
//!
//! Values come from the environment first and an optional TOML file second;
//! anything unset falls back to a default. Malformed values never abort
//! startup, they log a warning and keep the default.

use std::path::PathBuf;

use serde::Deserialize;
use thiserror::Error;
use tracing::warn;

/// Environment variable naming the optional TOML config file.
pub const CONFIG_FILE_ENV: &str = "REVIEW_CONFIG";

/// Environment variable selecting the deployment environment.
pub const ENVIRONMENT_ENV: &str = "REVIEW_ENV";

/// Errors raised while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The config file could not be read
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The config file could not be parsed
    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

/// Repository cache settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Root directory for cached working trees
    pub cache_root: PathBuf,
    /// Total cache quota in gigabytes
    pub max_cache_size_gb: u64,
    /// Cache TTL in hours
    pub default_ttl_hours: i64,
    /// Deadline for VCS subprocess operations, in seconds
    pub vcs_timeout_secs: u64,
    /// Deadline for remote HEAD probes, in seconds
    pub probe_timeout_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            cache_root: PathBuf::from("./cache/repositories"),
            max_cache_size_gb: 10,
            default_ttl_hours: 24,
            vcs_timeout_secs: 30,
            probe_timeout_secs: 10,
        }
    }
}

impl CacheConfig {
    /// Cache quota in megabytes.
    #[must_use]
    pub fn max_cache_size_mb(&self) -> u64 {
        self.max_cache_size_gb * 1024
    }
}

/// Job queue settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
    /// Maximum number of scans executing at once
    pub max_concurrent_jobs: usize,
    /// Age after which terminal jobs are swept, in hours
    pub retention_hours: i64,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            max_concurrent_jobs: 4,
            retention_hours: 24,
        }
    }
}

/// Maintenance loop settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MaintenanceConfig {
    /// Repositories synced per auto-sync batch
    pub sync_batch_size: usize,
    /// Pause between individual syncs, in milliseconds
    pub sync_delay_ms: u64,
    /// Minimum age since last sync before auto-sync considers a project, in hours
    pub auto_sync_min_age_hours: i64,
}

impl Default for MaintenanceConfig {
    fn default() -> Self {
        Self {
            sync_batch_size: 10,
            sync_delay_ms: 1000,
            auto_sync_min_age_hours: 1,
        }
    }
}

/// Top-level service configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub cache: CacheConfig,
    pub queue: QueueConfig,
    pub maintenance: MaintenanceConfig,
    /// Whether the service runs in production mode
    pub production: bool,
}

impl ServiceConfig {
    /// Build a configuration from the environment only.
    #[must_use]
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.apply_env();
        config
    }

    /// Load configuration from the file named by `REVIEW_CONFIG` (when set)
    /// with environment variables taking precedence.
    ///
    /// # Errors
    /// Returns an error when a named config file exists but cannot be read
    /// or parsed. An unset `REVIEW_CONFIG` is not an error.
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = match std::env::var(CONFIG_FILE_ENV) {
            Ok(path) => Self::from_file(PathBuf::from(path))?,
            Err(_) => Self::default(),
        };
        config.apply_env();
        Ok(config)
    }

    /// Parse a TOML config file.
    ///
    /// # Errors
    /// Returns an error when the file cannot be read or parsed.
    pub fn from_file(path: PathBuf) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(&path).map_err(|source| ConfigError::Read {
            path: path.clone(),
            source,
        })?;
        toml::from_str(&text).map_err(|source| ConfigError::Parse { path, source })
    }

    fn apply_env(&mut self) {
        if let Some(value) = env_number::<u64>("MAX_CACHE_SIZE_GB") {
            self.cache.max_cache_size_gb = value;
        }
        if let Some(value) = env_number::<i64>("DEFAULT_CACHE_TTL_HOURS") {
            self.cache.default_ttl_hours = value;
        }
        if let Ok(environment) = std::env::var(ENVIRONMENT_ENV) {
            self.production = environment.eq_ignore_ascii_case("production");
        }
    }
}

fn env_number<T: std::str::FromStr>(name: &str) -> Option<T> {
    let raw = std::env::var(name).ok()?;
    match raw.parse() {
        Ok(value) => Some(value),
        Err(_) => {
            warn!(var = name, value = %raw, "ignoring malformed numeric environment variable");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    fn test_defaults() {
        let config = ServiceConfig::default();
        assert_eq!(config.cache.max_cache_size_gb, 10);
        assert_eq!(config.cache.default_ttl_hours, 24);
        assert_eq!(config.cache.max_cache_size_mb(), 10 * 1024);
        assert_eq!(config.queue.max_concurrent_jobs, 4);
        assert_eq!(config.maintenance.sync_batch_size, 10);
        assert!(!config.production);
    }

    #[test]
    #[serial]
    fn test_env_overrides() {
        std::env::set_var("MAX_CACHE_SIZE_GB", "2");
        std::env::set_var("DEFAULT_CACHE_TTL_HOURS", "6");
        std::env::set_var(ENVIRONMENT_ENV, "production");
        let config = ServiceConfig::from_env();
        std::env::remove_var("MAX_CACHE_SIZE_GB");
        std::env::remove_var("DEFAULT_CACHE_TTL_HOURS");
        std::env::remove_var(ENVIRONMENT_ENV);

        assert_eq!(config.cache.max_cache_size_gb, 2);
        assert_eq!(config.cache.default_ttl_hours, 6);
        assert!(config.production);
    }

    #[test]
    #[serial]
    fn test_malformed_env_keeps_default() {
        std::env::set_var("MAX_CACHE_SIZE_GB", "lots");
        let config = ServiceConfig::from_env();
        std::env::remove_var("MAX_CACHE_SIZE_GB");
        assert_eq!(config.cache.max_cache_size_gb, 10);
    }

    #[test]
    fn test_from_file_partial_overrides() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("review.toml");
        std::fs::write(
            &path,
            "[cache]\nmax_cache_size_gb = 5\n\n[queue]\nmax_concurrent_jobs = 8\n",
        )
        .unwrap();
        let config = ServiceConfig::from_file(path).unwrap();
        assert_eq!(config.cache.max_cache_size_gb, 5);
        assert_eq!(config.queue.max_concurrent_jobs, 8);
        // untouched sections keep defaults
        assert_eq!(config.cache.default_ttl_hours, 24);
        assert_eq!(config.maintenance.sync_delay_ms, 1000);
    }
}
