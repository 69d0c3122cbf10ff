//! Command-line argument parsing for mirrorcache
//!
//! This module defines the CLI structure using clap derive macros. Every
//! command that touches a mirror file takes its upstream URL and derives the
//! cache identity from the URL path unless `--repo` / `--arch` say otherwise.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Args, Parser, Subcommand, ValueEnum};
use url::Url;

use crate::app::{Checksum, ChecksumType, ExpectedDigest, Resource, ResourceId, ResourceKind};
use crate::errors::{ConfigResult, StorageError, StorageResult};

/// mirrorcache - caching fetch engine for package mirrors
#[derive(Parser, Debug)]
#[command(
    name = "mirrorcache",
    version,
    about = "Cache package mirror files locally and serve them through one shared download",
    long_about = "A caching fetch engine for package mirrors.
Concurrent requests for the same file share a single upstream download, interrupted downloads resume from their partial file, and every transfer can be throttled."
)]
pub struct Cli {
    /// Global options
    #[command(flatten)]
    pub global: GlobalArgs,

    /// Subcommands
    #[command(subcommand)]
    pub command: Commands,
}

/// Global arguments available to all subcommands
#[derive(Args, Debug)]
pub struct GlobalArgs {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Very verbose logging (debug level)
    #[arg(long, global = true)]
    pub very_verbose: bool,

    /// Quiet mode - suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Configuration file path
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Cache directory path
    #[arg(long, global = true, value_name = "DIR")]
    pub cache_dir: Option<PathBuf>,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Download a file into the cache without serving it
    Fetch(FetchArgs),

    /// Request a file as a client would and write the response body
    Get(GetArgs),

    /// Verify a cached file against a known checksum
    Verify(VerifyArgs),

    /// Cache statistics
    Cache(CacheArgs),

    /// Configuration file management
    Config(ConfigArgs),
}

/// Location of one mirror file
#[derive(Args, Debug, Clone)]
pub struct ResourceArgs {
    /// Upstream URL of the file
    #[arg(value_name = "URL")]
    pub url: Url,

    /// Repository name (defaults to the first URL path segment)
    #[arg(long)]
    pub repo: Option<String>,

    /// Architecture (defaults to the second-to-last URL path segment)
    #[arg(long)]
    pub arch: Option<String>,
}

/// How a file should be treated by the cache
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum KindArg {
    /// Guess from the file name
    #[default]
    Auto,
    Database,
    Package,
    Signature,
    Passthrough,
}

/// Arguments for the fetch command
#[derive(Args, Debug, Clone)]
pub struct FetchArgs {
    #[command(flatten)]
    pub resource: ResourceArgs,

    /// Resource kind
    #[arg(long, value_enum, default_value_t = KindArg::Auto)]
    pub kind: KindArg,

    /// Expected SHA-256 of the file
    #[arg(long, value_name = "HEX")]
    pub sha256: Option<String>,

    /// Expected size in bytes
    #[arg(long, requires = "sha256")]
    pub size: Option<u64>,

    /// Disable the progress bar
    #[arg(long)]
    pub no_progress: bool,
}

/// Arguments for the get command
#[derive(Args, Debug, Clone)]
pub struct GetArgs {
    #[command(flatten)]
    pub resource: ResourceArgs,

    /// Resource kind
    #[arg(long, value_enum, default_value_t = KindArg::Auto)]
    pub kind: KindArg,

    /// Byte offset to start from, as in `Range: bytes=<offset>-`
    #[arg(long, default_value_t = 0)]
    pub offset: u64,

    /// Only send the body if the file changed after this HTTP date
    #[arg(long, value_name = "DATE")]
    pub if_modified_since: Option<String>,

    /// File receiving the response body
    #[arg(short, long, value_name = "FILE")]
    pub output: PathBuf,
}

/// Arguments for the verify command
#[derive(Args, Debug, Clone)]
pub struct VerifyArgs {
    #[command(flatten)]
    pub resource: ResourceArgs,

    /// Expected SHA-256 of the file
    #[arg(long, value_name = "HEX")]
    pub sha256: String,

    /// Expected size in bytes
    #[arg(long)]
    pub size: Option<u64>,

    /// Keep the cached file even if it fails verification
    #[arg(long)]
    pub keep: bool,
}

/// Arguments for cache management
#[derive(Args, Debug)]
pub struct CacheArgs {
    #[command(subcommand)]
    pub action: CacheAction,
}

/// Cache management actions
#[derive(Subcommand, Debug)]
pub enum CacheAction {
    /// Show cache statistics
    Stats {
        /// Print statistics as JSON
        #[arg(long)]
        json: bool,
    },
}

/// Arguments for configuration management
#[derive(Args, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub action: ConfigAction,
}

/// Configuration actions
#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Write a commented default configuration file
    Init {
        /// Overwrite an existing file
        #[arg(short, long)]
        force: bool,

        /// Destination (defaults to the user config directory)
        #[arg(value_name = "FILE")]
        path: Option<PathBuf>,
    },

    /// Print the effective configuration
    Show,
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Get the logging level based on global arguments
    pub fn log_level(&self) -> tracing::Level {
        if self.global.quiet {
            tracing::Level::ERROR
        } else if self.global.very_verbose {
            tracing::Level::DEBUG
        } else if self.global.verbose {
            tracing::Level::INFO
        } else {
            tracing::Level::WARN
        }
    }

    /// Level for the crate filter directive; flags win over `configured`
    pub fn log_filter(&self, configured: &str) -> String {
        if self.global.quiet || self.global.verbose || self.global.very_verbose {
            self.log_level().to_string().to_lowercase()
        } else {
            configured.to_string()
        }
    }
}

impl ResourceArgs {
    /// Cache identity of the file
    pub fn resource_id(&self) -> StorageResult<ResourceId> {
        let path = self.url.path();

        if let (Some(repo), Some(arch)) = (&self.repo, &self.arch) {
            let file_name = path
                .rsplit('/')
                .find(|segment| !segment.is_empty())
                .filter(|segment| *segment != "." && *segment != "..")
                .ok_or_else(|| StorageError::InvalidResourcePath {
                    path: path.to_string(),
                })?;
            return Ok(ResourceId::new(repo.as_str(), arch.as_str(), file_name));
        }

        let mut id = ResourceId::from_request_path(path)?;
        if let Some(repo) = &self.repo {
            id.repository = repo.clone();
        }
        if let Some(arch) = &self.arch {
            id.architecture = arch.clone();
        }
        Ok(id)
    }
}

impl KindArg {
    pub fn resolve(self, file_name: &str) -> ResourceKind {
        match self {
            KindArg::Auto => ResourceKind::infer(file_name),
            KindArg::Database => ResourceKind::Database,
            KindArg::Package => ResourceKind::Package,
            KindArg::Signature => ResourceKind::Signature,
            KindArg::Passthrough => ResourceKind::Passthrough,
        }
    }
}

/// Digest oracle from command-line values
pub fn expected_digest(sha256: &str, size: Option<u64>) -> ConfigResult<ExpectedDigest> {
    let expected = ExpectedDigest::new(Checksum::from_hex(ChecksumType::Sha256, sha256)?);
    Ok(match size {
        Some(size) => expected.with_size(size),
        None => expected,
    })
}

impl FetchArgs {
    /// Resource described by these arguments
    pub fn build_resource(&self) -> crate::errors::Result<Resource> {
        let id = self.resource.resource_id()?;
        let kind = self.kind.resolve(&id.file_name);
        let resource = Resource::of_kind(kind, id, self.resource.url.clone());

        match &self.sha256 {
            Some(sha256) => Ok(resource.with_integrity(Arc::new(expected_digest(sha256, self.size)?))),
            None => Ok(resource),
        }
    }
}

impl GetArgs {
    pub fn build_resource(&self) -> crate::errors::Result<Resource> {
        let id = self.resource.resource_id()?;
        let kind = self.kind.resolve(&id.file_name);
        Ok(Resource::of_kind(kind, id, self.resource.url.clone()))
    }
}

impl VerifyArgs {
    pub fn build_resource(&self) -> crate::errors::Result<Resource> {
        let id = self.resource.resource_id()?;
        let expected = expected_digest(&self.sha256, self.size)?;
        Ok(Resource::package(id, self.resource.url.clone(), Some(expected)))
    }
}
