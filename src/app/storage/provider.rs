//! Storage provider
//!
//! The provider hands out handles for the full and partial file of a
//! resource and owns the single-flight registry that serializes fetches.

use std::fmt::Debug;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::fs;
use tracing::{debug, info};

use crate::app::models::{Resource, ResourceId};
use crate::app::storage::config::StorageConfig;
use crate::app::storage::handle::{FileHandle, ResourceHandle};
use crate::app::storage::path::PathGenerator;
use crate::app::storage::registry::{FlightInfo, SingleFlightRegistry};
use crate::errors::{StorageError, StorageResult};

/// Where cached data lives and who may write it
pub trait StorageProvider: Send + Sync + Debug {
    fn full_handle(&self, resource: &Resource) -> Arc<dyn ResourceHandle>;

    fn partial_handle(&self, resource: &Resource) -> Arc<dyn ResourceHandle>;

    /// Take the single-flight slot of a resource
    fn try_lock_resource(&self, id: &ResourceId) -> bool;

    fn release_resource(&self, id: &ResourceId);

    fn is_resource_locked(&self, id: &ResourceId) -> bool;

    /// Resources with a fetch in flight
    fn active_fetches(&self) -> Vec<FlightInfo> {
        Vec::new()
    }
}

/// Filesystem-backed storage under a single root directory
#[derive(Debug)]
pub struct FsStorage {
    root: PathBuf,
    registry: SingleFlightRegistry,
}

impl FsStorage {
    /// Open (and create if needed) the cache root from configuration
    pub async fn new(config: &StorageConfig) -> StorageResult<Self> {
        let root = config.resolve_root()?;
        Self::ensure_directory_exists(&root).await?;
        info!("Cache root: {}", root.display());

        Ok(Self::with_root(root))
    }

    /// Use `root` as is, without touching the filesystem
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            registry: SingleFlightRegistry::new(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn registry(&self) -> &SingleFlightRegistry {
        &self.registry
    }

    async fn ensure_directory_exists(path: &Path) -> StorageResult<()> {
        if !path.exists() {
            debug!("Creating cache directory: {}", path.display());
            fs::create_dir_all(path)
                .await
                .map_err(|_| StorageError::DirectoryNotAccessible {
                    path: path.to_path_buf(),
                })?;
        }
        Ok(())
    }
}

impl StorageProvider for FsStorage {
    fn full_handle(&self, resource: &Resource) -> Arc<dyn ResourceHandle> {
        Arc::new(FileHandle::new(PathGenerator::full_path(
            &self.root,
            &resource.id,
            resource.kind,
        )))
    }

    fn partial_handle(&self, resource: &Resource) -> Arc<dyn ResourceHandle> {
        Arc::new(FileHandle::new(PathGenerator::partial_path(
            &self.root,
            &resource.id,
            resource.kind,
        )))
    }

    fn try_lock_resource(&self, id: &ResourceId) -> bool {
        self.registry.try_acquire(id)
    }

    fn release_resource(&self, id: &ResourceId) {
        self.registry.release(id)
    }

    fn is_resource_locked(&self, id: &ResourceId) -> bool {
        self.registry.is_locked(id)
    }

    fn active_fetches(&self) -> Vec<FlightInfo> {
        self.registry.snapshot()
    }
}
