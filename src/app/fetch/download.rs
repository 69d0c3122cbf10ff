//! The fetcher: one upstream transfer into the partial file
//!
//! A download resumes from the partial file when allowed, writes and hashes
//! every chunk, then either renames the partial file into place or discards
//! everything when the integrity oracle rejects the data. Corrupt resumes
//! (416, or a remote whose size changed) start over from zero, at most
//! [`MAX_AUTOMATIC_RESTARTS`] times per download.

use std::io::SeekFrom;
use std::sync::Arc;

use tokio::io::{AsyncReadExt, AsyncSeekExt, AsyncWriteExt};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::app::fetch::config::FetchConfig;
use crate::app::fetch::copy::read_chunk;
use crate::app::hash::ChecksumAccumulator;
use crate::app::models::{Resource, TransferProgress};
use crate::app::storage::{ResourceHandle, StorageProvider};
use crate::app::sync::{Completion, TransferCoordinator};
use crate::app::throttle::Pacer;
use crate::app::upstream::{MirrorSelector, Upstream};
use crate::constants::fetch::MAX_AUTOMATIC_RESTARTS;
use crate::errors::{FetchError, FetchResult};

/// What one attempt ended with
enum Step {
    Done(Completion),
    /// The local partial cannot be resumed; start over from zero
    Restart(FetchError),
}

/// Everything a spawned fetch needs, owned
#[derive(Debug)]
pub(crate) struct Download {
    pub config: Arc<FetchConfig>,
    pub storage: Arc<dyn StorageProvider>,
    pub upstream: Arc<dyn Upstream>,
    pub mirrors: Arc<dyn MirrorSelector>,
    pub resource: Resource,
    pub coordinator: Arc<TransferCoordinator>,
    pub progress: Option<mpsc::Sender<TransferProgress>>,
    /// Result of the freshness check; stale data is never resumed
    pub fresh: bool,
}

impl Download {
    pub async fn run(self) -> FetchResult<Completion> {
        let full = self.storage.full_handle(&self.resource);
        let partial = self.storage.partial_handle(&self.resource);

        if !self.config.reuse_partial_downloads || !self.fresh {
            debug!("Discarding cached data of {} before fetching", self.resource.id);
            delete_all(full.as_ref(), partial.as_ref()).await?;
        }

        let mut restarts = 0;
        loop {
            match self.attempt(full.as_ref(), partial.as_ref()).await? {
                Step::Done(completion) => return Ok(completion),
                Step::Restart(reason) if restarts < MAX_AUTOMATIC_RESTARTS => {
                    restarts += 1;
                    warn!(
                        "Restarting {} from the beginning: {}",
                        self.resource.id, reason
                    );
                    delete_all(full.as_ref(), partial.as_ref()).await?;
                }
                Step::Restart(reason) => return Err(reason),
            }
        }
    }

    async fn attempt(
        &self,
        full: &dyn ResourceHandle,
        partial: &dyn ResourceHandle,
    ) -> FetchResult<Step> {
        let uri = &self.resource.uri;
        let mut offset = if self.config.reuse_partial_downloads && partial.exists().await {
            partial.len().await?
        } else {
            0
        };

        let mut response =
            match super::get_upstream(self.upstream.as_ref(), self.mirrors.as_ref(), uri, offset)
                .await
            {
                Ok(response) => response,
                Err(e) if offset > 0 && e.status_code() == Some(416) => {
                    return Ok(Step::Restart(e));
                }
                Err(e) => return Err(e),
            };

        if offset > 0 && response.status != 206 {
            warn!(
                "{} ignored the range request for {}, starting from zero",
                uri, self.resource.id
            );
            partial.delete().await?;
            offset = 0;
        }

        let expected = response.headers.content_length.map(|length| offset + length);
        if offset > 0 {
            let total = response.headers.content_range.and_then(|range| range.total);
            if let (Some(expected), Some(actual)) = (expected, total) {
                if expected != actual {
                    return Ok(Step::Restart(FetchError::SizeChanged { expected, actual }));
                }
            }
        }
        self.coordinator.set_content_length(expected);

        let mut file = partial.open_read_write_or_create().await?;
        self.coordinator.mark_streaming();
        info!(
            "Fetching {} from offset {} ({} bytes expected)",
            self.resource.id,
            offset,
            expected.map_or_else(|| "unknown".to_string(), |e| e.to_string())
        );

        let mut hasher = self
            .config
            .checksum_integrity_check
            .then(|| ChecksumAccumulator::new(self.resource.integrity.algorithm()));
        let mut buffer = vec![0u8; self.config.buffer_size.max(1)];

        if offset > 0 {
            if let Some(hasher) = hasher.as_mut() {
                let mut prefix = (&mut file).take(offset);
                loop {
                    let n = prefix.read(&mut buffer).await?;
                    if n == 0 {
                        break;
                    }
                    hasher.update(&buffer[..n]);
                }
            }
        }
        file.seek(SeekFrom::Start(offset)).await?;

        let limit = self.coordinator.read_limit();
        let mut pacer = Pacer::new();
        let mut so_far = offset;

        loop {
            let n = read_chunk(&mut response.body, &mut buffer, self.config.network_timeout).await?;
            if n == 0 {
                break;
            }

            file.write_all(&buffer[..n]).await?;
            if let Some(hasher) = hasher.as_mut() {
                hasher.update(&buffer[..n]);
            }
            so_far += n as u64;

            if let Some(progress) = &self.progress {
                let _ = progress.try_send(TransferProgress {
                    total: expected,
                    so_far,
                    new_bytes: n as u64,
                });
            }

            if let Some(delay) = pacer.record(n, limit.get()) {
                tokio::time::sleep(delay).await;
                pacer.resume();
            }
        }
        if let Some(delay) = pacer.drain() {
            tokio::time::sleep(delay).await;
        }

        file.flush().await?;
        drop(file);

        if let Some(expected) = expected {
            if so_far < expected {
                return Err(FetchError::IncompleteDownload {
                    received: so_far,
                    expected,
                });
            }
        }

        if let Some(hasher) = hasher {
            let checksum = hasher.finalize();
            if !self.resource.integrity.verify(so_far, &checksum).await {
                warn!(
                    "{} failed integrity check ({} bytes, {}), discarding",
                    self.resource.id, so_far, checksum
                );
                delete_all(full, partial).await?;
                return Ok(Step::Done(Completion::Discarded));
            }
        }

        partial.move_to(full).await?;
        info!("Cached {} ({} bytes)", self.resource.id, so_far);
        Ok(Step::Done(Completion::Cached))
    }
}

/// Remove both the full and the partial file
pub(crate) async fn delete_all(
    full: &dyn ResourceHandle,
    partial: &dyn ResourceHandle,
) -> std::io::Result<()> {
    partial.delete().await?;
    full.delete().await
}
