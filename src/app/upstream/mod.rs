//! Upstream transport
//!
//! The fetch engine talks to mirrors only through the [`Upstream`] trait:
//!
//! - `http`: the `reqwest` implementation with request rate limiting
//! - `config`: client tuning and the header/connect/probe timeouts
//! - `mirror`: the hook asked to pick another mirror after a failure

use std::fmt::{self, Debug};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::io::AsyncRead;
use url::Url;

use crate::errors::{FetchError, FetchResult};

pub mod config;
pub mod http;
pub mod mirror;

pub use config::UpstreamConfig;
pub use http::HttpUpstream;
pub use mirror::{MirrorSelector, NoopMirrorSelector};

/// Body of an upstream response
pub type UpstreamBody = Box<dyn AsyncRead + Send + Unpin>;

/// A mirror the engine can download from
#[async_trait]
pub trait Upstream: Send + Sync + Debug {
    /// GET `url` starting at byte `offset`
    ///
    /// Resolves once response headers have arrived. Non-success statuses
    /// are returned as [`FetchError::Status`].
    async fn get(&self, url: &Url, offset: u64) -> FetchResult<UpstreamResponse>;

    /// Conditional HEAD used to revalidate a cached copy
    ///
    /// Returns the response status. Only transport failures are errors.
    async fn head(&self, url: &Url, if_modified_since: DateTime<Utc>) -> FetchResult<u16>;
}

/// Response headers the engine cares about
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UpstreamHeaders {
    pub content_length: Option<u64>,
    pub content_range: Option<ContentRange>,
    pub last_modified: Option<String>,
    pub etag: Option<String>,
    pub accept_ranges: Option<String>,
}

/// Status, headers and a streaming body
pub struct UpstreamResponse {
    pub status: u16,
    pub headers: UpstreamHeaders,
    pub body: UpstreamBody,
}

impl Debug for UpstreamResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UpstreamResponse")
            .field("status", &self.status)
            .field("headers", &self.headers)
            .finish_non_exhaustive()
    }
}

/// Parsed `Content-Range` header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContentRange {
    /// First and last byte of the range, absent for `bytes */total`
    pub range: Option<(u64, u64)>,
    /// Full size of the representation, absent for `a-b/*`
    pub total: Option<u64>,
}

impl ContentRange {
    pub fn new(start: u64, end: u64, total: u64) -> Self {
        Self {
            range: Some((start, end)),
            total: Some(total),
        }
    }

    /// Unsatisfied range form, `bytes */total`
    pub fn unsatisfied(total: u64) -> Self {
        Self {
            range: None,
            total: Some(total),
        }
    }

    pub fn parse(value: &str) -> FetchResult<Self> {
        let invalid = || FetchError::InvalidContentRange {
            value: value.to_string(),
        };

        let spec = value.trim().strip_prefix("bytes").ok_or_else(invalid)?.trim();
        let (range, total) = spec.split_once('/').ok_or_else(invalid)?;

        let total = match total.trim() {
            "*" => None,
            total => Some(total.parse::<u64>().map_err(|_| invalid())?),
        };

        let range = match range.trim() {
            "*" => None,
            range => {
                let (start, end) = range.split_once('-').ok_or_else(invalid)?;
                let start = start.trim().parse::<u64>().map_err(|_| invalid())?;
                let end = end.trim().parse::<u64>().map_err(|_| invalid())?;
                if end < start {
                    return Err(invalid());
                }
                Some((start, end))
            }
        };

        if range.is_none() && total.is_none() {
            return Err(invalid());
        }

        Ok(Self { range, total })
    }
}

impl fmt::Display for ContentRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("bytes ")?;
        match self.range {
            Some((start, end)) => write!(f, "{}-{}", start, end)?,
            None => f.write_str("*")?,
        }
        match self.total {
            Some(total) => write!(f, "/{}", total),
            None => f.write_str("/*"),
        }
    }
}
