//! Test doubles and fixtures for orchestrator scenarios

use std::collections::{HashMap, VecDeque};
use std::io::Cursor;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use tempfile::TempDir;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use url::Url;

use crate::app::fetch::{ClientSink, FetchConfig, FetchOrchestrator, ResponseSink};
use crate::app::hash::{Checksum, ChecksumAccumulator, ChecksumType};
use crate::app::integrity::ExpectedDigest;
use crate::app::models::{Resource, ResourceId};
use crate::app::storage::{FsStorage, StorageProvider};
use crate::app::upstream::{
    ContentRange, MirrorSelector, Upstream, UpstreamBody, UpstreamHeaders, UpstreamResponse,
};
use crate::errors::{FetchError, FetchResult};

pub const MIRROR: &str = "http://mirror.test";

/// How the upstream answers one GET
#[derive(Debug, Clone)]
pub enum Reply {
    /// Serve the content, honouring the requested offset
    Serve,
    /// Answer 200 with the whole content whatever the offset
    IgnoreRange,
    /// Fail with this HTTP status
    Status(u16),
    /// Announce the full length but end the body after this many bytes
    Truncate(usize),
    /// Serve the range but report this total in `Content-Range`
    WrongTotal(u64),
}

#[derive(Debug, Default)]
struct ScriptedFile {
    data: Vec<u8>,
    replies: VecDeque<Reply>,
    /// Status of conditional HEADs, `None` for a transport failure
    head: Option<u16>,
    pacing: Option<(usize, Duration)>,
}

/// In-memory mirror that records every request
#[derive(Debug, Default)]
pub struct ScriptedUpstream {
    files: Mutex<HashMap<String, ScriptedFile>>,
    gets: Mutex<Vec<(String, u64)>>,
    heads: Mutex<Vec<(String, DateTime<Utc>)>>,
}

impl ScriptedUpstream {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn serve(&self, path: &str, data: &[u8]) {
        let mut files = self.files.lock();
        let file = files.entry(path.to_string()).or_default();
        file.data = data.to_vec();
        file.head.get_or_insert(200);
    }

    /// Deliver bodies of `path` in `chunk`-sized pieces, `delay` apart
    pub fn pace(&self, path: &str, chunk: usize, delay: Duration) {
        self.files.lock().entry(path.to_string()).or_default().pacing = Some((chunk, delay));
    }

    /// Queue replies for the next GETs of `path`; afterwards it is served
    pub fn reply_with(&self, path: &str, replies: impl IntoIterator<Item = Reply>) {
        self.files
            .lock()
            .entry(path.to_string())
            .or_default()
            .replies
            .extend(replies);
    }

    pub fn set_head(&self, path: &str, status: Option<u16>) {
        self.files.lock().entry(path.to_string()).or_default().head = status;
    }

    /// Offsets of every GET issued for `path`
    pub fn get_offsets(&self, path: &str) -> Vec<u64> {
        self.gets
            .lock()
            .iter()
            .filter(|(p, _)| p == path)
            .map(|(_, offset)| *offset)
            .collect()
    }

    pub fn head_count(&self, path: &str) -> usize {
        self.heads.lock().iter().filter(|(p, _)| p == path).count()
    }

    fn body(data: Vec<u8>, pacing: Option<(usize, Duration)>) -> UpstreamBody {
        match pacing {
            None => Box::new(Cursor::new(data)),
            Some((chunk, delay)) => {
                let chunk = chunk.max(1);
                let (reader, mut writer) = tokio::io::duplex(chunk * 4);
                tokio::spawn(async move {
                    for piece in data.chunks(chunk) {
                        tokio::time::sleep(delay).await;
                        if writer.write_all(piece).await.is_err() {
                            return;
                        }
                    }
                });
                Box::new(reader)
            }
        }
    }
}

#[async_trait]
impl Upstream for ScriptedUpstream {
    async fn get(&self, url: &Url, offset: u64) -> FetchResult<UpstreamResponse> {
        let path = url.path().to_string();
        self.gets.lock().push((path.clone(), offset));

        let (data, reply, pacing) = {
            let mut files = self.files.lock();
            let Some(file) = files.get_mut(&path) else {
                return Err(FetchError::Status {
                    status: 404,
                    url: url.to_string(),
                });
            };
            let reply = file.replies.pop_front().unwrap_or(Reply::Serve);
            (file.data.clone(), reply, file.pacing)
        };

        let len = data.len() as u64;
        let status_error = |status| FetchError::Status {
            status,
            url: url.to_string(),
        };

        let (start, body_end, total) = match reply {
            Reply::Status(status) => return Err(status_error(status)),
            Reply::IgnoreRange => (0, len, len),
            Reply::Serve => (offset, len, len),
            Reply::Truncate(n) => (offset, (offset + n as u64).min(len), len),
            Reply::WrongTotal(total) => (offset, len, total),
        };

        if start > 0 && start >= len {
            return Err(status_error(416));
        }

        let status = if start > 0 { 206 } else { 200 };
        let headers = UpstreamHeaders {
            content_length: Some(len - start),
            content_range: (start > 0).then(|| ContentRange::new(start, len - 1, total)),
            last_modified: None,
            etag: Some("\"scripted\"".to_string()),
            accept_ranges: Some("bytes".to_string()),
        };
        let body = data[start as usize..body_end as usize].to_vec();

        Ok(UpstreamResponse {
            status,
            headers,
            body: Self::body(body, pacing),
        })
    }

    async fn head(&self, url: &Url, if_modified_since: DateTime<Utc>) -> FetchResult<u16> {
        let path = url.path().to_string();
        self.heads.lock().push((path.clone(), if_modified_since));

        let head = self.files.lock().get(&path).map(|file| file.head);
        match head {
            Some(Some(status)) => Ok(status),
            Some(None) => Err(FetchError::HeaderTimeout {
                seconds: 10,
                url: url.to_string(),
            }),
            None => Ok(404),
        }
    }
}

/// Mirror selector that remembers every reselection request
#[derive(Debug, Default)]
pub struct RecordingSelector {
    pub calls: Mutex<Vec<(Url, u16)>>,
}

#[async_trait]
impl MirrorSelector for RecordingSelector {
    async fn reselect(&self, failed: &Url, status: u16) {
        self.calls.lock().push((failed.clone(), status));
    }
}

/// Orchestrator over a temporary cache and a scripted upstream
pub struct Fixture {
    pub temp_dir: TempDir,
    pub storage: Arc<dyn StorageProvider>,
    pub upstream: Arc<ScriptedUpstream>,
    pub orchestrator: FetchOrchestrator,
}

impl Fixture {
    pub fn new(config: FetchConfig) -> Self {
        let temp_dir = TempDir::new().unwrap();
        let storage: Arc<dyn StorageProvider> = Arc::new(FsStorage::with_root(temp_dir.path()));
        let upstream = ScriptedUpstream::new();
        let orchestrator = FetchOrchestrator::new(config, storage.clone(), upstream.clone());

        Self {
            temp_dir,
            storage,
            upstream,
            orchestrator,
        }
    }

    /// A package served by the upstream, checked against `data`'s digest
    pub fn package(&self, name: &str, data: &[u8]) -> Resource {
        let resource = Resource::package(
            ResourceId::new("extra", "x86_64", name),
            url(&format!("/extra/os/x86_64/{}", name)),
            Some(ExpectedDigest::new(sha256(data)).with_size(data.len() as u64)),
        );
        self.upstream.serve(resource.uri.path(), data);
        resource
    }

    /// A repository database served by the upstream
    pub fn database(&self, name: &str, data: &[u8]) -> Resource {
        let resource = Resource::database(
            ResourceId::new("core", "x86_64", name),
            url(&format!("/core/os/x86_64/{}", name)),
        );
        self.upstream.serve(resource.uri.path(), data);
        resource
    }

    pub fn full_path(&self, resource: &Resource) -> PathBuf {
        location(self.storage.full_handle(resource).location())
    }

    pub fn partial_path(&self, resource: &Resource) -> PathBuf {
        location(self.storage.partial_handle(resource).location())
    }

    pub async fn write_full(&self, resource: &Resource, data: &[u8]) {
        write(self.full_path(resource), data).await;
    }

    pub async fn write_partial(&self, resource: &Resource, data: &[u8]) {
        write(self.partial_path(resource), data).await;
    }

    pub async fn full_bytes(&self, resource: &Resource) -> Option<Vec<u8>> {
        tokio::fs::read(self.full_path(resource)).await.ok()
    }

    pub async fn partial_bytes(&self, resource: &Resource) -> Option<Vec<u8>> {
        tokio::fs::read(self.partial_path(resource)).await.ok()
    }
}

fn location(path: Option<&std::path::Path>) -> PathBuf {
    path.expect("filesystem storage has locations").to_path_buf()
}

async fn write(path: PathBuf, data: &[u8]) {
    tokio::fs::create_dir_all(path.parent().unwrap()).await.unwrap();
    tokio::fs::write(path, data).await.unwrap();
}

pub fn url(path: &str) -> Url {
    Url::parse(&format!("{}{}", MIRROR, path)).unwrap()
}

pub fn sha256(data: &[u8]) -> Checksum {
    let mut accumulator = ChecksumAccumulator::new(ChecksumType::Sha256);
    accumulator.update(data);
    accumulator.finalize()
}

/// Deterministic, non-repeating-looking test content
pub fn payload(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i * 31 % 251) as u8).collect()
}

/// Borrow a sink as the orchestrator's client parameter
pub fn client<W>(sink: &mut ResponseSink<W>) -> Option<&mut dyn ClientSink>
where
    W: AsyncWrite + Send + Unpin,
{
    Some(sink)
}

/// Poll `check` until it holds or `limit` passes
pub async fn eventually(mut check: impl FnMut() -> bool, limit: Duration) -> bool {
    let deadline = tokio::time::Instant::now() + limit;
    while tokio::time::Instant::now() < deadline {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    check()
}
