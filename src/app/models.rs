//! Data models for mirrorcache
//!
//! This module defines the resources the engine fetches, their identity for
//! locking and storage purposes, and the small value types reported back to
//! callers.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::app::integrity::{AcceptAll, ExpectedDigest, IntegrityOracle, NonEmpty};
use crate::errors::{StorageError, StorageResult};

/// Stable identity of a resource
///
/// Derived from the logical repository, architecture and file name so the
/// same artifact maps to the same key no matter which mirror serves it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ResourceId {
    pub repository: String,
    pub architecture: String,
    pub file_name: String,
}

impl ResourceId {
    pub fn new(
        repository: impl Into<String>,
        architecture: impl Into<String>,
        file_name: impl Into<String>,
    ) -> Self {
        Self {
            repository: repository.into(),
            architecture: architecture.into(),
            file_name: file_name.into(),
        }
    }

    /// Derive an identity from a mirror-relative request path
    ///
    /// The repository is the first path segment, the architecture the
    /// second-to-last and the file name the last, so both
    /// `/core/os/x86_64/core.db` and `/extra/x86_64/foo.pkg.tar.zst` work.
    pub fn from_request_path(path: &str) -> StorageResult<Self> {
        let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();

        if segments.len() < 3 || segments.iter().any(|s| *s == "." || *s == "..") {
            return Err(StorageError::InvalidResourcePath {
                path: path.to_string(),
            });
        }

        Ok(Self::new(
            segments[0],
            segments[segments.len() - 2],
            segments[segments.len() - 1],
        ))
    }

    /// Package name and version parsed from the file name, if it is a package
    pub fn package(&self) -> Option<PackageFileName> {
        PackageFileName::parse(&self.file_name)
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}/{}",
            self.repository, self.architecture, self.file_name
        )
    }
}

/// Components of a `<name>-<version>-<release>-<arch>.pkg.tar.*` file name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageFileName {
    pub name: String,
    pub version: String,
    pub architecture: String,
}

impl PackageFileName {
    pub fn parse(file_name: &str) -> Option<Self> {
        let stem = file_name.strip_suffix(".sig").unwrap_or(file_name);
        let (stem, _) = stem.split_once(".pkg.")?;

        let parts: Vec<&str> = stem.split('-').collect();
        if parts.len() < 4 {
            return None;
        }

        let n = parts.len();
        let name = parts[..n - 3].join("-");
        if name.is_empty() {
            return None;
        }

        Some(Self {
            name,
            version: format!("{}-{}", parts[n - 3], parts[n - 2]),
            architecture: parts[n - 1].to_string(),
        })
    }
}

/// How the engine treats a resource
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceKind {
    /// Never cached, always streamed from upstream
    Passthrough,
    /// Repository database, revalidated on every request
    Database,
    /// Immutable package file with a known digest
    Package,
    /// Detached signature
    Signature,
}

/// Behaviour flags derived from a [`ResourceKind`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capabilities {
    pub cacheable: bool,
    pub integrity_checkable: bool,
}

impl ResourceKind {
    pub fn capabilities(self) -> Capabilities {
        match self {
            ResourceKind::Passthrough => Capabilities {
                cacheable: false,
                integrity_checkable: false,
            },
            ResourceKind::Database => Capabilities {
                cacheable: true,
                integrity_checkable: false,
            },
            ResourceKind::Package | ResourceKind::Signature => Capabilities {
                cacheable: true,
                integrity_checkable: true,
            },
        }
    }

    /// Dynamic resources must be revalidated before a cached copy is trusted
    pub fn is_dynamic(self) -> bool {
        matches!(self, ResourceKind::Database)
    }

    /// Classify a mirror file by its name
    ///
    /// Repository databases end in `.db` or `.files` (optionally compressed),
    /// signatures in `.sig` and packages contain `.pkg.`. Everything else is
    /// passed through.
    pub fn infer(file_name: &str) -> Self {
        if file_name.ends_with(".sig") {
            return ResourceKind::Signature;
        }
        if file_name.contains(".pkg.") {
            return ResourceKind::Package;
        }

        let database = [".db", ".files"].iter().any(|suffix| {
            file_name.ends_with(suffix)
                || file_name.contains(&format!("{}.tar.", suffix))
        });
        if database {
            ResourceKind::Database
        } else {
            ResourceKind::Passthrough
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ResourceKind::Passthrough => "passthrough",
            ResourceKind::Database => "database",
            ResourceKind::Package => "package",
            ResourceKind::Signature => "signature",
        };
        f.write_str(name)
    }
}

/// A remotely fetchable artifact resolved against the current mirror
#[derive(Debug, Clone)]
pub struct Resource {
    pub id: ResourceId,
    pub uri: Url,
    pub kind: ResourceKind,
    pub dynamic: bool,
    pub integrity: Arc<dyn IntegrityOracle>,
}

impl Resource {
    fn with_kind(id: ResourceId, uri: Url, kind: ResourceKind) -> Self {
        let integrity: Arc<dyn IntegrityOracle> = match kind {
            ResourceKind::Signature => Arc::new(NonEmpty),
            _ => Arc::new(AcceptAll),
        };

        Self {
            id,
            uri,
            kind,
            dynamic: kind.is_dynamic(),
            integrity,
        }
    }

    /// A resource that bypasses the cache entirely
    pub fn passthrough(id: ResourceId, uri: Url) -> Self {
        Self::with_kind(id, uri, ResourceKind::Passthrough)
    }

    /// A repository database; cached but revalidated upstream
    pub fn database(id: ResourceId, uri: Url) -> Self {
        Self::with_kind(id, uri, ResourceKind::Database)
    }

    /// A package; `expected` is its digest from the repository metadata
    pub fn package(id: ResourceId, uri: Url, expected: Option<ExpectedDigest>) -> Self {
        let resource = Self::with_kind(id, uri, ResourceKind::Package);
        match expected {
            Some(expected) => resource.with_integrity(Arc::new(expected)),
            None => resource,
        }
    }

    /// A detached signature; accepted when non-empty
    pub fn signature(id: ResourceId, uri: Url) -> Self {
        Self::with_kind(id, uri, ResourceKind::Signature)
    }

    /// Build a resource of any kind
    pub fn of_kind(kind: ResourceKind, id: ResourceId, uri: Url) -> Self {
        Self::with_kind(id, uri, kind)
    }

    pub fn with_integrity(mut self, integrity: Arc<dyn IntegrityOracle>) -> Self {
        self.integrity = integrity;
        self
    }

    pub fn capabilities(&self) -> Capabilities {
        self.kind.capabilities()
    }

    pub fn is_cacheable(&self) -> bool {
        self.capabilities().cacheable
    }
}

/// Progress of one transfer, reported after every chunk
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferProgress {
    /// Expected final size, when upstream announced one
    pub total: Option<u64>,
    /// Bytes present in the partial file so far, including resumed bytes
    pub so_far: u64,
    /// Bytes written by the chunk that triggered this report
    pub new_bytes: u64,
}

impl TransferProgress {
    /// Completion ratio when the total is known
    pub fn fraction(&self) -> Option<f64> {
        match self.total {
            Some(0) => Some(1.0),
            Some(total) => Some(self.so_far as f64 / total as f64),
            None => None,
        }
    }
}

/// How a request was satisfied
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheStatus {
    /// Served from, or already present as, a complete cached file
    Hit,
    /// Client copy is current; nothing was sent
    NotModified,
    /// Streamed from upstream without caching
    Passthrough,
    /// Streamed from a download in progress
    Stream,
    /// Downloaded into the cache with no client attached
    Fetched,
    /// Downloaded but rejected by the integrity check
    Discarded,
    /// Non-cacheable resource requested without a client
    Skipped,
}

impl fmt::Display for CacheStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            CacheStatus::Hit => "hit",
            CacheStatus::NotModified => "not modified",
            CacheStatus::Passthrough => "passthrough",
            CacheStatus::Stream => "stream",
            CacheStatus::Fetched => "fetched",
            CacheStatus::Discarded => "discarded",
            CacheStatus::Skipped => "skipped",
        };
        f.write_str(text)
    }
}
