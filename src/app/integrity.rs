//! Integrity oracles
//!
//! An oracle decides whether a finished download may become a cache entry.
//! The engine only knows the transferred size and the digest it computed;
//! ground truth (package metadata) lives with whoever builds the [`Resource`].
//!
//! [`Resource`]: crate::app::models::Resource

use std::fmt::Debug;

use async_trait::async_trait;
use tracing::debug;

use crate::app::hash::{Checksum, ChecksumType};

/// Judges a completed transfer
#[async_trait]
pub trait IntegrityOracle: Send + Sync + Debug {
    /// Algorithm the running digest must use
    fn algorithm(&self) -> ChecksumType {
        ChecksumType::Sha256
    }

    /// Whether `size` bytes hashing to `checksum` are acceptable
    async fn verify(&self, size: u64, checksum: &Checksum) -> bool;
}

/// Accepts everything; used when no ground truth is available
#[derive(Debug, Clone, Copy, Default)]
pub struct AcceptAll;

#[async_trait]
impl IntegrityOracle for AcceptAll {
    async fn verify(&self, _size: u64, _checksum: &Checksum) -> bool {
        true
    }
}

/// Accepts any non-empty transfer (detached signatures)
#[derive(Debug, Clone, Copy, Default)]
pub struct NonEmpty;

#[async_trait]
impl IntegrityOracle for NonEmpty {
    async fn verify(&self, size: u64, _checksum: &Checksum) -> bool {
        size > 0
    }
}

/// Compares against a known digest and, when given, a known size
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExpectedDigest {
    pub size: Option<u64>,
    pub checksum: Checksum,
}

impl ExpectedDigest {
    pub fn new(checksum: Checksum) -> Self {
        Self {
            size: None,
            checksum,
        }
    }

    pub fn with_size(mut self, size: u64) -> Self {
        self.size = Some(size);
        self
    }
}

#[async_trait]
impl IntegrityOracle for ExpectedDigest {
    fn algorithm(&self) -> ChecksumType {
        self.checksum.kind()
    }

    async fn verify(&self, size: u64, checksum: &Checksum) -> bool {
        if let Some(expected) = self.size {
            if expected != size {
                debug!("Size mismatch: expected {} bytes, got {}", expected, size);
                return false;
            }
        }

        if &self.checksum != checksum {
            debug!("Checksum mismatch: expected {}, got {}", self.checksum, checksum);
            return false;
        }

        true
    }
}
