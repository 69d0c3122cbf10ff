//! Checksums for integrity verification
//!
//! Digests are kept as raw bytes together with their algorithm. Hex is only
//! produced for display, logs and serialized forms. [`ChecksumAccumulator`]
//! computes a digest incrementally while a download is being written.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::errors::{ConfigError, ConfigResult};

/// Digest algorithms understood by the integrity checks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ChecksumType {
    #[default]
    Sha256,
    Md5,
}

impl ChecksumType {
    /// Length of the raw digest in bytes
    pub fn digest_len(self) -> usize {
        match self {
            ChecksumType::Sha256 => 32,
            ChecksumType::Md5 => 16,
        }
    }

    /// Human-readable algorithm name
    pub fn name(self) -> &'static str {
        match self {
            ChecksumType::Sha256 => "SHA256",
            ChecksumType::Md5 => "MD5",
        }
    }
}

impl fmt::Display for ChecksumType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A digest value tagged with its algorithm
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Checksum {
    kind: ChecksumType,
    bytes: Vec<u8>,
}

impl Checksum {
    /// Parse a hex digest for the given algorithm
    ///
    /// The string must have exactly twice as many hex characters as the
    /// digest has bytes. Case is ignored.
    pub fn from_hex(kind: ChecksumType, hex_digest: &str) -> ConfigResult<Self> {
        let invalid = || ConfigError::InvalidChecksum {
            algorithm: kind.name().to_string(),
            checksum: hex_digest.to_string(),
        };

        if hex_digest.len() != kind.digest_len() * 2 {
            return Err(invalid());
        }

        let bytes = hex::decode(hex_digest).map_err(|_| invalid())?;
        Ok(Self { kind, bytes })
    }

    /// Guess the algorithm from the digest length (64 → SHA256, 32 → MD5)
    pub fn parse(hex_digest: &str) -> ConfigResult<Self> {
        match hex_digest.len() {
            64 => Self::from_hex(ChecksumType::Sha256, hex_digest),
            32 => Self::from_hex(ChecksumType::Md5, hex_digest),
            _ => Err(ConfigError::InvalidChecksum {
                algorithm: "SHA256 or MD5".to_string(),
                checksum: hex_digest.to_string(),
            }),
        }
    }

    pub(crate) fn from_digest(kind: ChecksumType, bytes: Vec<u8>) -> Self {
        Self { kind, bytes }
    }

    pub fn kind(&self) -> ChecksumType {
        self.kind
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Lowercase hex representation
    pub fn to_hex(&self) -> String {
        hex::encode(&self.bytes)
    }
}

impl fmt::Display for Checksum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind.name().to_lowercase(), self.to_hex())
    }
}

impl FromStr for Checksum {
    type Err = ConfigError;

    /// Accepts `sha256:<hex>`, `md5:<hex>` or a bare hex digest
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once(':') {
            Some(("sha256", digest)) => Self::from_hex(ChecksumType::Sha256, digest),
            Some(("md5", digest)) => Self::from_hex(ChecksumType::Md5, digest),
            Some(_) => Err(ConfigError::InvalidChecksum {
                algorithm: "unknown".to_string(),
                checksum: s.to_string(),
            }),
            None => Self::parse(s),
        }
    }
}

impl Serialize for Checksum {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Checksum {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let value = String::deserialize(deserializer)?;
        value.parse().map_err(serde::de::Error::custom)
    }
}

/// Running digest fed chunk by chunk during a transfer
pub enum ChecksumAccumulator {
    Sha256(Sha256),
    Md5(md5::Context),
}

impl ChecksumAccumulator {
    pub fn new(kind: ChecksumType) -> Self {
        match kind {
            ChecksumType::Sha256 => ChecksumAccumulator::Sha256(Sha256::new()),
            ChecksumType::Md5 => ChecksumAccumulator::Md5(md5::Context::new()),
        }
    }

    pub fn update(&mut self, data: &[u8]) {
        match self {
            ChecksumAccumulator::Sha256(hasher) => hasher.update(data),
            ChecksumAccumulator::Md5(context) => context.consume(data),
        }
    }

    pub fn finalize(self) -> Checksum {
        match self {
            ChecksumAccumulator::Sha256(hasher) => {
                Checksum::from_digest(ChecksumType::Sha256, hasher.finalize().to_vec())
            }
            ChecksumAccumulator::Md5(context) => {
                Checksum::from_digest(ChecksumType::Md5, context.compute().0.to_vec())
            }
        }
    }
}

impl fmt::Debug for ChecksumAccumulator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChecksumAccumulator::Sha256(_) => f.write_str("ChecksumAccumulator(SHA256)"),
            ChecksumAccumulator::Md5(_) => f.write_str("ChecksumAccumulator(MD5)"),
        }
    }
}
