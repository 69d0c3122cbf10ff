//! Client side of a request
//!
//! The HTTP listener is not part of this crate. Whatever serves clients
//! hands the orchestrator a [`ClientSink`]: the request details the engine
//! needs plus a place to put the response.

use chrono::{DateTime, NaiveDateTime, Utc};
use tokio::io::AsyncWrite;

use crate::constants::http::HTTP_DATE_FORMAT;

/// Request details and response target of one client
pub trait ClientSink: Send {
    /// Offset from the request's `Range` header, 0 if absent
    fn requested_offset(&self) -> u64;

    /// The request's `If-Modified-Since`, if any
    fn if_modified_since(&self) -> Option<DateTime<Utc>>;

    fn set_status(&mut self, status: u16);

    fn set_header(&mut self, name: &str, value: String);

    fn set_content_length(&mut self, length: u64);

    /// Response body
    fn body(&mut self) -> &mut (dyn AsyncWrite + Send + Unpin);
}

/// [`ClientSink`] that records the response head and writes the body to `W`
#[derive(Debug)]
pub struct ResponseSink<W> {
    offset: u64,
    if_modified_since: Option<DateTime<Utc>>,
    status: Option<u16>,
    headers: Vec<(String, String)>,
    content_length: Option<u64>,
    writer: W,
}

impl<W> ResponseSink<W>
where
    W: AsyncWrite + Send + Unpin,
{
    pub fn new(writer: W) -> Self {
        Self {
            offset: 0,
            if_modified_since: None,
            status: None,
            headers: Vec::new(),
            content_length: None,
            writer,
        }
    }

    pub fn with_offset(mut self, offset: u64) -> Self {
        self.offset = offset;
        self
    }

    pub fn with_if_modified_since(mut self, since: DateTime<Utc>) -> Self {
        self.if_modified_since = Some(since);
        self
    }

    pub fn status(&self) -> Option<u16> {
        self.status
    }

    /// Last value set for `name`, compared case-insensitively
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .rev()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }

    pub fn content_length(&self) -> Option<u64> {
        self.content_length
    }

    pub fn writer(&self) -> &W {
        &self.writer
    }

    pub fn into_writer(self) -> W {
        self.writer
    }
}

impl<W> ClientSink for ResponseSink<W>
where
    W: AsyncWrite + Send + Unpin,
{
    fn requested_offset(&self) -> u64 {
        self.offset
    }

    fn if_modified_since(&self) -> Option<DateTime<Utc>> {
        self.if_modified_since
    }

    fn set_status(&mut self, status: u16) {
        self.status = Some(status);
    }

    fn set_header(&mut self, name: &str, value: String) {
        self.headers.push((name.to_string(), value));
    }

    fn set_content_length(&mut self, length: u64) {
        self.content_length = Some(length);
    }

    fn body(&mut self) -> &mut (dyn AsyncWrite + Send + Unpin) {
        &mut self.writer
    }
}

/// Start offset of a `Range: bytes=<start>-` header
///
/// Only open-ended single ranges are meaningful to the cache; anything else
/// yields `None`.
pub fn parse_range_offset(value: &str) -> Option<u64> {
    let spec = value.trim().strip_prefix("bytes=")?;
    let (start, end) = spec.split_once('-')?;
    if !end.trim().is_empty() || spec.contains(',') {
        return None;
    }
    start.trim().parse().ok()
}

/// Parse an IMF-fixdate such as `Sun, 06 Nov 1994 08:49:37 GMT`
pub fn parse_http_date(value: &str) -> Option<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(value.trim(), HTTP_DATE_FORMAT)
        .ok()
        .map(|naive| DateTime::from_naive_utc_and_offset(naive, Utc))
}

/// Format a timestamp as an IMF-fixdate
pub fn format_http_date(time: DateTime<Utc>) -> String {
    time.format(HTTP_DATE_FORMAT).to_string()
}
