//! Application constants for mirrorcache
//!
//! Constants are grouped by the part of the engine that consumes them so the
//! tunables of one concern can be found in one place.

use std::time::Duration;

/// HTTP client configuration constants
pub mod http {
    use super::Duration;

    /// Default user agent for all upstream requests
    pub const USER_AGENT: &str = concat!("mirrorcache/", env!("CARGO_PKG_VERSION"));

    /// Time allowed for an upstream to answer with response headers
    pub const HEADER_TIMEOUT: Duration = Duration::from_secs(30);

    /// Connection establishment timeout
    pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(15);

    /// Timeout for the conditional HEAD used to revalidate dynamic resources
    pub const PROBE_TIMEOUT: Duration = Duration::from_secs(10);

    /// Connection pool idle timeout
    pub const POOL_IDLE_TIMEOUT: Duration = Duration::from_secs(90);

    /// Maximum idle connections per host in pool
    pub const POOL_MAX_PER_HOST: usize = 16;

    /// Upstream requests per second across all fetches
    pub const DEFAULT_RATE_LIMIT_RPS: u32 = 20;

    /// Upper bound of the random delay added to each rate-limited request
    pub const RATE_LIMIT_JITTER: Duration = Duration::from_millis(50);

    /// Date layout used by `If-Modified-Since` and `Last-Modified`
    pub const HTTP_DATE_FORMAT: &str = "%a, %d %b %Y %H:%M:%S GMT";

    /// Upstream statuses that ask the mirror selector to pick another mirror
    pub const MIRROR_FAILURE_STATUSES: [u16; 7] = [403, 502, 503, 504, 401, 500, 429];
}

/// Response header names and cache annotations
pub mod headers {
    /// Header describing how a response was produced
    pub const X_CACHE: &str = "X-Cache";

    /// Served from a complete cached file
    pub const CACHE_HIT: &str = "HIT";

    /// Served from a download that is still in progress
    pub const CACHE_STREAM: &str = "STREAM";

    /// Served straight from upstream without touching the cache
    pub const CACHE_PASSTHROUGH: &str = "PASSTHROUGH";

    pub const CONTENT_RANGE: &str = "Content-Range";
    pub const LAST_MODIFIED: &str = "Last-Modified";
    pub const ETAG: &str = "ETag";
    pub const ACCEPT_RANGES: &str = "Accept-Ranges";
}

/// Download and streaming tunables
pub mod fetch {
    use super::Duration;

    /// Default chunk size for every copy loop
    pub const DEFAULT_BUFFER_SIZE: usize = 8192;

    /// Default inactivity timeout around a single buffer fill
    pub const DEFAULT_NETWORK_TIMEOUT: Duration = Duration::from_secs(60);

    /// Delay between polls of a partial file that has no new bytes yet
    pub const TEE_POLL_INTERVAL: Duration = Duration::from_millis(100);

    /// Delay between checks of a resource locked by a fetch this process cannot see
    pub const LOCK_POLL_INTERVAL: Duration = Duration::from_millis(250);

    /// Automatic restarts from offset zero allowed per fetch
    pub const MAX_AUTOMATIC_RESTARTS: u32 = 1;

    /// Capacity of progress channels handed out by the CLI
    pub const PROGRESS_CHANNEL_CAPACITY: usize = 256;
}

/// Throttling constants
pub mod throttle {
    /// Accumulated delay that has to build up before the pacer actually sleeps
    pub const MIN_DELAY_MS: f64 = 10.0;
}

/// Cache layout constants
pub mod cache {
    /// Directory name under the platform cache directory
    pub const CACHE_DIR_NAME: &str = "mirrorcache";

    /// Suffix of in-progress downloads
    pub const PARTIAL_SUFFIX: &str = ".partial";

    /// Directory name under the platform config directory
    pub const CONFIG_DIR_NAME: &str = "mirrorcache";

    /// Configuration file name
    pub const CONFIG_FILE_NAME: &str = "config.toml";
}

/// Logging configuration
pub mod logging {
    /// Default log level when no verbosity flag is given
    pub const DEFAULT_LEVEL: &str = "warn";

    /// Log target of this crate, used to build the filter directive
    pub const CRATE_TARGET: &str = "mirrorcache";
}

pub use cache::PARTIAL_SUFFIX;
pub use fetch::{DEFAULT_BUFFER_SIZE, TEE_POLL_INTERVAL};
pub use http::{MIRROR_FAILURE_STATUSES, USER_AGENT};
