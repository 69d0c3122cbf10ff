//! Configuration management for mirrorcache
//!
//! One TOML file with a section per engine component. Every field has a
//! default, so a missing file or a partial file both work. Durations are
//! written as `"60s"` and speeds as `"10 Mibps"`.

use std::path::{Path, PathBuf};

use humantime_serde::re::humantime::format_duration;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::app::{FetchConfig, StorageConfig, UpstreamConfig};
use crate::constants::{cache, logging};
use crate::errors::{ConfigError, ConfigResult, Result};

/// Unified application configuration for TOML serialization
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Cache location
    pub storage: StorageConfig,
    /// Upstream HTTP client settings
    pub upstream: UpstreamConfig,
    /// Fetch engine behaviour and speed ceilings
    pub fetch: FetchConfig,
    /// Logging configuration
    pub logging: LoggingConfig,
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Level used when no verbosity flag is given
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: logging::DEFAULT_LEVEL.to_string(),
        }
    }
}

impl AppConfig {
    /// Runtime configuration of each engine component
    pub fn to_runtime_config(&self) -> (StorageConfig, UpstreamConfig, FetchConfig) {
        (
            self.storage.clone(),
            self.upstream.clone(),
            self.fetch.clone(),
        )
    }

    /// Load configuration
    ///
    /// An explicit path must exist. Otherwise `./config.toml` and then the
    /// user config file are tried, falling back to defaults.
    pub async fn load(config_file_override: Option<PathBuf>) -> Result<Self> {
        let config_path = match config_file_override {
            Some(path) => {
                if !path.exists() {
                    return Err(ConfigError::NotFound { path }.into());
                }
                Some(path)
            }
            None => Self::find_config_file(),
        };

        match config_path {
            Some(path) => Ok(Self::load_from_file(&path).await?),
            None => {
                debug!("No config file found, using defaults");
                Ok(Self::default())
            }
        }
    }

    /// Write the commented default configuration to `path`
    ///
    /// Refuses to overwrite an existing file unless `force` is set.
    pub async fn init_config_file(path: Option<PathBuf>, force: bool) -> Result<PathBuf> {
        let config_path = match path {
            Some(path) => path,
            None => Self::get_default_config_path()?,
        };

        if config_path.exists() && !force {
            return Err(ConfigError::InvalidValue {
                field: "config".to_string(),
                value: config_path.display().to_string(),
                reason: "File already exists, use --force to overwrite".to_string(),
            }
            .into());
        }

        if let Some(parent) = config_path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(ConfigError::Io)?;
        }

        tokio::fs::write(&config_path, Self::generate_default_config_content())
            .await
            .map_err(ConfigError::Io)?;

        info!("Wrote default configuration to {}", config_path.display());
        Ok(config_path)
    }

    /// Effective configuration as TOML
    pub fn to_toml_string(&self) -> ConfigResult<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    fn find_config_file() -> Option<PathBuf> {
        let mut search_paths = vec![PathBuf::from("./config.toml")];
        if let Ok(path) = Self::get_default_config_path() {
            search_paths.push(path);
        }

        search_paths.into_iter().find(|path| {
            let found = path.exists();
            if found {
                debug!("Found config file: {}", path.display());
            }
            found
        })
    }

    /// Get the default config file path for the current user
    pub fn get_default_config_path() -> ConfigResult<PathBuf> {
        let config_dir = dirs::config_dir().ok_or_else(|| ConfigError::NotFound {
            path: PathBuf::from("<user config directory>"),
        })?;

        Ok(config_dir
            .join(cache::CONFIG_DIR_NAME)
            .join(cache::CONFIG_FILE_NAME))
    }

    async fn load_from_file(path: &Path) -> ConfigResult<Self> {
        let content = tokio::fs::read_to_string(path).await?;
        let config: AppConfig = toml::from_str(&content)?;

        info!("Loaded configuration from: {}", path.display());
        Ok(config)
    }

    /// Generate default configuration content with helpful comments
    pub fn generate_default_config_content() -> String {
        let defaults = Self::default();
        let upstream = &defaults.upstream;
        let fetch = &defaults.fetch;

        format!(
            r#"# mirrorcache configuration
# Every setting is optional; removed lines fall back to these defaults.

[storage]
# Cache directory (leave unset to use the platform cache directory)
# cache_root = "/var/cache/mirrorcache"

[upstream]
http2 = {http2}
tcp_keepalive = "30s"
tcp_nodelay = {nodelay}
pool_idle_timeout = "{pool_idle}"
pool_max_per_host = {pool_max}
# Time allowed until upstream response headers arrive
header_timeout = "{header_timeout}"
connect_timeout = "{connect_timeout}"
# Timeout of the conditional HEAD that revalidates repository databases
probe_timeout = "{probe_timeout}"
# Upstream requests per second
rate_limit_rps = {rps}

[fetch]
# Chunk size of every copy loop, in bytes
buffer_size = {buffer_size}
# A transfer fails when no data arrives for this long
network_timeout = "{network_timeout}"
# Resume interrupted downloads from their partial file
reuse_partial_downloads = {reuse}
# Finish downloads even after every client has gone away
keep_downloading = {keep}
# Hash downloads and reject data that fails its checksum
checksum_integrity_check = {checksum}
# Speed ceilings such as "10 Mibps", "500 kB" or "unlimited"
foreground_read_max_speed = "{fg_read}"
foreground_write_max_speed = "{fg_write}"
background_read_max_speed = "{bg_read}"

[logging]
level = "{level}"  # error, warn, info, debug, trace
"#,
            http2 = upstream.http2,
            nodelay = upstream.tcp_nodelay,
            pool_idle = format_duration(
                upstream.pool_idle_timeout.unwrap_or_default()
            ),
            pool_max = upstream.pool_max_per_host,
            header_timeout = format_duration(upstream.header_timeout),
            connect_timeout = format_duration(upstream.connect_timeout),
            probe_timeout = format_duration(upstream.probe_timeout),
            rps = upstream.rate_limit_rps,
            buffer_size = fetch.buffer_size,
            network_timeout = format_duration(fetch.network_timeout),
            reuse = fetch.reuse_partial_downloads,
            keep = fetch.keep_downloading,
            checksum = fetch.checksum_integrity_check,
            fg_read = fetch.foreground_read_max_speed,
            fg_write = fetch.foreground_write_max_speed,
            bg_read = fetch.background_read_max_speed,
            level = defaults.logging.level,
        )
    }
}
