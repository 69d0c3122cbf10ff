//! Cache statistics and disk usage
//!
//! Counts complete and partial files under the cache root and reports the
//! fetches currently in flight.

use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::warn;

use crate::app::storage::path::PathGenerator;
use crate::app::storage::provider::StorageProvider;

/// Snapshot of the cache contents
#[derive(Debug, Clone, Default, Serialize)]
pub struct CacheStats {
    /// Cache root directory
    pub cache_root: PathBuf,
    /// Fetches holding a single-flight slot
    pub active_fetches: usize,
    /// Number of complete files
    pub full_files: usize,
    /// Total size of complete files in bytes
    pub full_size: u64,
    /// Number of partial downloads
    pub partial_files: usize,
    /// Total size of partial downloads in bytes
    pub partial_size: u64,
}

impl CacheStats {
    /// Scan `cache_root` and combine it with the provider's in-flight fetches
    pub async fn collect(cache_root: &Path, storage: &dyn StorageProvider) -> Self {
        let usage = DirectoryScanner::scan_cache_directory(cache_root).await;

        Self {
            cache_root: cache_root.to_path_buf(),
            active_fetches: storage.active_fetches().len(),
            full_files: usage.full_files,
            full_size: usage.full_size,
            partial_files: usage.partial_files,
            partial_size: usage.partial_size,
        }
    }

    /// Total bytes on disk
    pub fn total_size(&self) -> u64 {
        self.full_size + self.partial_size
    }

    /// Format cache size in human-readable format
    pub fn format_cache_size(&self) -> String {
        format_bytes(self.total_size())
    }
}

/// File counts from one directory scan
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DiskUsage {
    pub full_files: usize,
    pub full_size: u64,
    pub partial_files: usize,
    pub partial_size: u64,
}

impl DiskUsage {
    fn add(&mut self, other: DiskUsage) {
        self.full_files += other.full_files;
        self.full_size += other.full_size;
        self.partial_files += other.partial_files;
        self.partial_size += other.partial_size;
    }
}

/// Directory scanner for cache statistics
pub struct DirectoryScanner;

impl DirectoryScanner {
    /// Scan the cache directory without blocking the async runtime
    pub async fn scan_cache_directory(cache_root: &Path) -> DiskUsage {
        let cache_root = cache_root.to_path_buf();

        tokio::task::spawn_blocking(move || Self::scan_directory_recursive(&cache_root))
            .await
            .unwrap_or_else(|e| {
                warn!("Failed to scan cache directory: {}", e);
                DiskUsage::default()
            })
    }

    fn scan_directory_recursive(dir: &Path) -> DiskUsage {
        let mut usage = DiskUsage::default();

        if let Ok(entries) = std::fs::read_dir(dir) {
            for entry in entries.flatten() {
                let path = entry.path();

                if path.is_dir() {
                    usage.add(Self::scan_directory_recursive(&path));
                } else if path.is_file() {
                    let size = entry.metadata().map(|m| m.len()).unwrap_or(0);
                    if PathGenerator::is_partial(&path) {
                        usage.partial_files += 1;
                        usage.partial_size += size;
                    } else {
                        usage.full_files += 1;
                        usage.full_size += size;
                    }
                }
            }
        }

        usage
    }
}

/// Format bytes in human-readable format
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
    const THRESHOLD: u64 = 1024;

    if bytes == 0 {
        return "0 B".to_string();
    }

    let mut size = bytes as f64;
    let mut unit_index = 0;

    while size >= THRESHOLD as f64 && unit_index < UNITS.len() - 1 {
        size /= THRESHOLD as f64;
        unit_index += 1;
    }

    if unit_index == 0 {
        format!("{} {}", bytes, UNITS[unit_index])
    } else {
        format!("{:.2} {}", size, UNITS[unit_index])
    }
}
