//! `reqwest` transport with request rate limiting
//!
//! Every request waits on a shared `governor` limiter (with jitter so that
//! many fetches starting together do not hit the mirror in lockstep). GET
//! resolves once headers arrive and hands the body out as an `AsyncRead`.

use std::io;
use std::num::NonZeroU32;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::TryStreamExt;
use governor::{clock::DefaultClock, state::InMemoryState, Jitter, Quota, RateLimiter};
use reqwest::header::{self, HeaderMap};
use reqwest::{Client, RequestBuilder};
use tokio_util::io::StreamReader;
use tracing::debug;
use url::Url;

use crate::app::upstream::config::UpstreamConfig;
use crate::app::upstream::{ContentRange, Upstream, UpstreamHeaders, UpstreamResponse};
use crate::constants::http;
use crate::errors::{ConfigError, ConfigResult, FetchError, FetchResult, Result};

type DirectRateLimiter = RateLimiter<governor::state::NotKeyed, InMemoryState, DefaultClock>;

/// HTTP mirror access
#[derive(Debug)]
pub struct HttpUpstream {
    client: Client,
    rate_limiter: DirectRateLimiter,
    header_timeout: Duration,
    probe_timeout: Duration,
}

impl HttpUpstream {
    /// Build the client and limiter described by `config`
    ///
    /// # Errors
    ///
    /// Returns an error if the rate limit is zero or the client cannot be built
    pub fn new(config: &UpstreamConfig) -> Result<Self> {
        let rate_limiter = Self::build_rate_limiter(config.rate_limit_rps)?;
        let client = config.build_http_client()?;

        Ok(Self {
            client,
            rate_limiter,
            header_timeout: config.header_timeout,
            probe_timeout: config.probe_timeout,
        })
    }

    fn build_rate_limiter(rate_limit_rps: u32) -> ConfigResult<DirectRateLimiter> {
        let rps = NonZeroU32::new(rate_limit_rps).ok_or_else(|| ConfigError::InvalidValue {
            field: "upstream.rate_limit_rps".to_string(),
            value: rate_limit_rps.to_string(),
            reason: "Rate limit must be non-zero".to_string(),
        })?;
        Ok(RateLimiter::direct(Quota::per_second(rps)))
    }

    /// Get a reference to the underlying HTTP client
    pub fn client(&self) -> &Client {
        &self.client
    }

    async fn send(
        &self,
        request: RequestBuilder,
        timeout: Duration,
        url: &Url,
    ) -> FetchResult<reqwest::Response> {
        self.rate_limiter
            .until_ready_with_jitter(Jitter::up_to(http::RATE_LIMIT_JITTER))
            .await;

        tokio::time::timeout(timeout, request.send())
            .await
            .map_err(|_| FetchError::HeaderTimeout {
                seconds: timeout.as_secs(),
                url: url.to_string(),
            })?
            .map_err(FetchError::from)
    }

    fn parse_headers(headers: &HeaderMap) -> FetchResult<UpstreamHeaders> {
        let text = |name: header::HeaderName| {
            headers
                .get(name)
                .and_then(|value| value.to_str().ok())
                .map(str::to_string)
        };

        let content_range = text(header::CONTENT_RANGE)
            .map(|value| ContentRange::parse(&value))
            .transpose()?;

        Ok(UpstreamHeaders {
            content_length: text(header::CONTENT_LENGTH).and_then(|value| value.parse().ok()),
            content_range,
            last_modified: text(header::LAST_MODIFIED),
            etag: text(header::ETAG),
            accept_ranges: text(header::ACCEPT_RANGES),
        })
    }
}

#[async_trait]
impl Upstream for HttpUpstream {
    async fn get(&self, url: &Url, offset: u64) -> FetchResult<UpstreamResponse> {
        let mut request = self.client.get(url.as_str());
        if offset > 0 {
            request = request.header(header::RANGE, format!("bytes={}-", offset));
        }

        let response = self.send(request, self.header_timeout, url).await?;
        let status = response.status().as_u16();

        if !response.status().is_success() {
            debug!("GET {} answered HTTP {}", url, status);
            return Err(FetchError::Status {
                status,
                url: url.to_string(),
            });
        }

        let headers = Self::parse_headers(response.headers())?;
        debug!(
            "GET {} from offset {}: HTTP {}, length {:?}",
            url, offset, status, headers.content_length
        );

        let stream = response
            .bytes_stream()
            .map_err(|e| io::Error::new(io::ErrorKind::Other, e));
        let body = StreamReader::new(Box::pin(stream));

        Ok(UpstreamResponse {
            status,
            headers,
            body: Box::new(body),
        })
    }

    async fn head(&self, url: &Url, if_modified_since: DateTime<Utc>) -> FetchResult<u16> {
        let request = self.client.head(url.as_str()).header(
            header::IF_MODIFIED_SINCE,
            if_modified_since.format(http::HTTP_DATE_FORMAT).to_string(),
        );

        let response = self.send(request, self.probe_timeout, url).await?;
        Ok(response.status().as_u16())
    }
}
