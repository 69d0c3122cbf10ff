//! Storage configuration types and defaults

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::constants::cache;
use crate::errors::{StorageError, StorageResult};

/// Configuration for the filesystem cache
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Root directory for cache storage (OS-specific if None)
    pub cache_root: Option<PathBuf>,
}

impl StorageConfig {
    /// Create a new storage configuration with custom cache root
    pub fn with_cache_root(cache_root: PathBuf) -> Self {
        Self {
            cache_root: Some(cache_root),
        }
    }

    /// Configured root, falling back to the platform cache directory
    pub fn resolve_root(&self) -> StorageResult<PathBuf> {
        match &self.cache_root {
            Some(root) => Ok(root.clone()),
            None => default_cache_root(),
        }
    }
}

/// `<platform cache dir>/mirrorcache`
pub fn default_cache_root() -> StorageResult<PathBuf> {
    dirs::cache_dir()
        .map(|dir| dir.join(cache::CACHE_DIR_NAME))
        .ok_or_else(|| StorageError::DirectoryNotAccessible {
            path: PathBuf::from("<platform cache directory>"),
        })
}
