//! Core of the mirror cache
//!
//! - `models`, `hash`, `integrity`: what is fetched and how it is checked
//! - `throttle`: bandwidth ceilings for every copy loop
//! - `storage`: full and partial files, single-flight locks, maintenance
//! - `sync`: coordination between a fetch and its tee consumers
//! - `upstream`: mirror transport
//! - `fetch`: the orchestrator deciding how each request is answered
//!
//! # Examples
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use mirrorcache::app::{
//!     FetchConfig, FetchOrchestrator, FsStorage, HttpUpstream, Resource, ResourceId,
//!     StorageConfig, UpstreamConfig,
//! };
//!
//! # async fn example() -> mirrorcache::Result<()> {
//! let storage = Arc::new(FsStorage::new(&StorageConfig::default()).await?);
//! let upstream = Arc::new(HttpUpstream::new(&UpstreamConfig::default())?);
//! let orchestrator = FetchOrchestrator::new(FetchConfig::default(), storage, upstream);
//!
//! let resource = Resource::database(
//!     ResourceId::new("core", "x86_64", "core.db"),
//!     "https://mirror.example/core/os/x86_64/core.db".parse().unwrap(),
//! );
//! let status = orchestrator.prefetch(&resource, None).await?;
//! println!("core.db: {}", status);
//! # Ok(())
//! # }
//! ```

pub mod fetch;
pub mod hash;
pub mod integrity;
pub mod models;
pub mod storage;
pub mod sync;
pub mod throttle;
pub mod upstream;

// Re-export main public API
pub use fetch::{ClientSink, FetchConfig, FetchOrchestrator, ResponseSink};
pub use hash::{Checksum, ChecksumType};
pub use integrity::{AcceptAll, ExpectedDigest, IntegrityOracle, NonEmpty};
pub use models::{CacheStatus, Resource, ResourceId, ResourceKind, TransferProgress};
pub use storage::{CacheStats, CacheVerifier, FsStorage, StorageConfig, StorageProvider};
pub use throttle::{Speed, SpeedLimit, ThrottledStream};
pub use upstream::{HttpUpstream, MirrorSelector, Upstream, UpstreamConfig};
