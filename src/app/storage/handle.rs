//! Storage handles
//!
//! A [`ResourceHandle`] stands for one storage location (a full or a partial
//! file). The fetch engine only talks to handles and never builds paths on
//! its own.

use std::fmt::Debug;
use std::io;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::fs::{self, File, OpenOptions};
use tokio::io::{AsyncRead, AsyncSeek, AsyncWrite};

use crate::errors::{StorageError, StorageResult};

/// Readable, seekable view of a stored file
pub trait ReadHandle: AsyncRead + AsyncSeek + Send + Unpin {}
impl<T: AsyncRead + AsyncSeek + Send + Unpin> ReadHandle for T {}

/// Read-write view of a stored file
pub trait WriteHandle: AsyncRead + AsyncWrite + AsyncSeek + Send + Unpin {}
impl<T: AsyncRead + AsyncWrite + AsyncSeek + Send + Unpin> WriteHandle for T {}

#[async_trait]
pub trait ResourceHandle: Send + Sync + Debug {
    /// Short name for logs
    fn name(&self) -> String;

    /// Filesystem location, for backends that have one
    fn location(&self) -> Option<&Path> {
        None
    }

    async fn exists(&self) -> bool;

    async fn len(&self) -> io::Result<u64>;

    /// Last write time
    async fn modified(&self) -> io::Result<DateTime<Utc>>;

    /// Last access time
    async fn accessed(&self) -> io::Result<DateTime<Utc>>;

    /// Remove the stored data; succeeds if there is nothing to remove
    async fn delete(&self) -> io::Result<()>;

    /// Atomically move this data to `destination`, replacing it
    async fn move_to(&self, destination: &dyn ResourceHandle) -> StorageResult<()>;

    async fn open_read(&self) -> io::Result<Box<dyn ReadHandle>>;

    /// Open for reading and writing, creating the file and its parents
    async fn open_read_write_or_create(&self) -> io::Result<Box<dyn WriteHandle>>;
}

/// Handle backed by a plain file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileHandle {
    path: PathBuf,
}

impl FileHandle {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn ensure_parent(path: &Path) -> io::Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        Ok(())
    }
}

#[async_trait]
impl ResourceHandle for FileHandle {
    fn name(&self) -> String {
        self.path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.path.display().to_string())
    }

    fn location(&self) -> Option<&Path> {
        Some(&self.path)
    }

    async fn exists(&self) -> bool {
        fs::metadata(&self.path)
            .await
            .map(|metadata| metadata.is_file())
            .unwrap_or(false)
    }

    async fn len(&self) -> io::Result<u64> {
        Ok(fs::metadata(&self.path).await?.len())
    }

    async fn modified(&self) -> io::Result<DateTime<Utc>> {
        Ok(fs::metadata(&self.path).await?.modified()?.into())
    }

    async fn accessed(&self) -> io::Result<DateTime<Utc>> {
        Ok(fs::metadata(&self.path).await?.accessed()?.into())
    }

    async fn delete(&self) -> io::Result<()> {
        match fs::remove_file(&self.path).await {
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            other => other,
        }
    }

    async fn move_to(&self, destination: &dyn ResourceHandle) -> StorageResult<()> {
        let target = destination
            .location()
            .ok_or_else(|| StorageError::ForeignHandle {
                name: destination.name(),
            })?;

        Self::ensure_parent(target).await?;
        fs::rename(&self.path, target).await?;
        Ok(())
    }

    async fn open_read(&self) -> io::Result<Box<dyn ReadHandle>> {
        let file = File::open(&self.path).await?;
        Ok(Box::new(file))
    }

    async fn open_read_write_or_create(&self) -> io::Result<Box<dyn WriteHandle>> {
        Self::ensure_parent(&self.path).await?;
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&self.path)
            .await?;
        Ok(Box::new(file))
    }
}
