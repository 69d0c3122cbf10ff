//! Cache integrity checking
//!
//! Re-hashes complete files of integrity-checkable resources and asks each
//! resource's oracle whether the stored bytes are still acceptable. Files
//! that fail are removed so the next request fetches them again.

use std::time::{Duration, Instant};

use serde::Serialize;
use tokio::io::AsyncReadExt;
use tracing::{debug, warn};

use crate::app::hash::{Checksum, ChecksumAccumulator, ChecksumType};
use crate::app::models::{Resource, ResourceId};
use crate::app::storage::handle::ResourceHandle;
use crate::app::storage::provider::StorageProvider;
use crate::constants::DEFAULT_BUFFER_SIZE;

/// Cache verification report
#[derive(Debug, Clone, Default, Serialize)]
pub struct VerificationReport {
    /// Total files checked
    pub files_checked: usize,
    /// Files that passed verification
    pub files_verified: usize,
    /// Files that failed verification
    pub files_failed: usize,
    /// Resources with no complete file in the cache
    pub files_missing: usize,
    /// Resources that carry no integrity information
    pub files_skipped: usize,
    /// Total verification time
    pub verification_time: Duration,
    /// Failed files with details
    pub failed_files: Vec<VerificationFailure>,
}

/// Details about a verification failure
#[derive(Debug, Clone, Serialize)]
pub struct VerificationFailure {
    pub resource: ResourceId,
    pub reason: String,
    /// Digest of the stored bytes, when they could be read
    pub actual: Option<Checksum>,
}

impl VerificationReport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Check if verification passed (no failures)
    pub fn is_successful(&self) -> bool {
        self.files_failed == 0
    }

    /// Get verification success rate as percentage
    pub fn success_rate(&self) -> f64 {
        if self.files_checked == 0 {
            0.0
        } else {
            (self.files_verified as f64 / self.files_checked as f64) * 100.0
        }
    }

    fn add_failed(&mut self, resource: &ResourceId, reason: String, actual: Option<Checksum>) {
        self.files_checked += 1;
        self.files_failed += 1;
        self.failed_files.push(VerificationFailure {
            resource: resource.clone(),
            reason,
            actual,
        });
    }
}

/// Hash a stored file in chunks
pub async fn hash_handle(
    handle: &dyn ResourceHandle,
    kind: ChecksumType,
) -> std::io::Result<(u64, Checksum)> {
    let mut reader = handle.open_read().await?;
    let mut accumulator = ChecksumAccumulator::new(kind);
    let mut buffer = vec![0u8; DEFAULT_BUFFER_SIZE];
    let mut size = 0u64;

    loop {
        let n = reader.read(&mut buffer).await?;
        if n == 0 {
            break;
        }
        accumulator.update(&buffer[..n]);
        size += n as u64;
    }

    Ok((size, accumulator.finalize()))
}

/// Checks cached files against their integrity oracles
pub struct CacheVerifier;

impl CacheVerifier {
    /// Verify the complete files of `resources`, removing failures when asked
    pub async fn verify_resources(
        storage: &dyn StorageProvider,
        resources: &[Resource],
        remove_failed: bool,
    ) -> VerificationReport {
        let started = Instant::now();
        let mut report = VerificationReport::new();

        for resource in resources {
            if !resource.capabilities().integrity_checkable {
                report.files_skipped += 1;
                continue;
            }

            let full = storage.full_handle(resource);
            if !full.exists().await {
                report.files_missing += 1;
                continue;
            }

            if storage.is_resource_locked(&resource.id) {
                debug!("Skipping {}: fetch in progress", resource.id);
                report.files_skipped += 1;
                continue;
            }

            match hash_handle(full.as_ref(), resource.integrity.algorithm()).await {
                Ok((size, checksum)) => {
                    if resource.integrity.verify(size, &checksum).await {
                        report.files_checked += 1;
                        report.files_verified += 1;
                    } else {
                        warn!("Cached file {} failed verification", resource.id);
                        report.add_failed(
                            &resource.id,
                            "Checksum or size mismatch".to_string(),
                            Some(checksum),
                        );
                        if remove_failed {
                            if let Err(e) = full.delete().await {
                                warn!("Could not remove {}: {}", full.name(), e);
                            }
                        }
                    }
                }
                Err(e) => {
                    report.add_failed(&resource.id, format!("Read error: {}", e), None);
                }
            }

            if report.files_checked % 1000 == 0 && report.files_checked > 0 {
                debug!(
                    "Verified {} files, {} failures",
                    report.files_checked, report.files_failed
                );
            }
        }

        report.verification_time = started.elapsed();
        report
    }
}
