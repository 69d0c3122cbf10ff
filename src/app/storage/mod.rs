//! Cache storage
//!
//! Full and partial files, the single-flight registry that guards them, and
//! the maintenance views (statistics, verification) built on top.

pub mod config;
pub mod handle;
pub mod path;
pub mod provider;
pub mod registry;
pub mod stats;
pub mod verification;

pub use config::StorageConfig;
pub use handle::{FileHandle, ReadHandle, ResourceHandle, WriteHandle};
pub use path::PathGenerator;
pub use provider::{FsStorage, StorageProvider};
pub use registry::{FlightInfo, SingleFlightRegistry};
pub use stats::{format_bytes, CacheStats, DirectoryScanner};
pub use verification::{hash_handle, CacheVerifier, VerificationFailure, VerificationReport};
