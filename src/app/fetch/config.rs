//! Fetch engine options

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::app::throttle::Speed;
use crate::constants::fetch;

/// Options consumed by the fetch orchestrator
///
/// Speeds are ceilings in bits per second where zero means unlimited. The
/// foreground ceilings apply while a client is attached, the background one
/// to fetches started without a client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    /// Chunk size for all copy loops
    pub buffer_size: usize,
    /// Inactivity timeout around every upstream buffer fill
    #[serde(with = "humantime_serde")]
    pub network_timeout: Duration,
    /// Resume from an existing partial file instead of starting over
    pub reuse_partial_downloads: bool,
    /// Keep fetching after the last client has gone away
    pub keep_downloading: bool,
    /// Hash downloads and consult the integrity oracle before caching
    pub checksum_integrity_check: bool,
    pub foreground_read_max_speed: Speed,
    pub foreground_write_max_speed: Speed,
    pub background_read_max_speed: Speed,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            buffer_size: fetch::DEFAULT_BUFFER_SIZE,
            network_timeout: fetch::DEFAULT_NETWORK_TIMEOUT,
            reuse_partial_downloads: true,
            keep_downloading: false,
            checksum_integrity_check: true,
            foreground_read_max_speed: Speed::UNLIMITED,
            foreground_write_max_speed: Speed::UNLIMITED,
            background_read_max_speed: Speed::UNLIMITED,
        }
    }
}

impl FetchConfig {
    pub fn with_buffer_size(mut self, buffer_size: usize) -> Self {
        self.buffer_size = buffer_size.max(1);
        self
    }

    pub fn with_network_timeout(mut self, timeout: Duration) -> Self {
        self.network_timeout = timeout;
        self
    }

    pub fn with_reuse_partial_downloads(mut self, reuse: bool) -> Self {
        self.reuse_partial_downloads = reuse;
        self
    }

    pub fn with_keep_downloading(mut self, keep: bool) -> Self {
        self.keep_downloading = keep;
        self
    }

    pub fn with_checksum_integrity_check(mut self, check: bool) -> Self {
        self.checksum_integrity_check = check;
        self
    }

    pub fn with_foreground_speeds(mut self, read: Speed, write: Speed) -> Self {
        self.foreground_read_max_speed = read;
        self.foreground_write_max_speed = write;
        self
    }

    pub fn with_background_speed(mut self, read: Speed) -> Self {
        self.background_read_max_speed = read;
        self
    }
}
