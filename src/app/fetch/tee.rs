//! Streaming a download that is still in progress
//!
//! A tee consumer never talks to upstream. It follows the partial file the
//! fetcher is writing, sleeping briefly whenever it has caught up, until the
//! fetch reports its outcome.

use std::io;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tracing::{debug, warn};

use crate::app::fetch::config::FetchConfig;
use crate::app::fetch::sink::ClientSink;
use crate::app::models::{CacheStatus, Resource};
use crate::app::storage::{ReadHandle, StorageProvider};
use crate::app::sync::{Completion, TransferCoordinator};
use crate::app::throttle::ThrottledStream;
use crate::constants::{headers, TEE_POLL_INTERVAL};
use crate::errors::{FetchError, FetchResult};

pub(crate) async fn serve(
    coordinator: &TransferCoordinator,
    storage: &dyn StorageProvider,
    resource: &Resource,
    client: &mut dyn ClientSink,
    config: &FetchConfig,
) -> FetchResult<CacheStatus> {
    coordinator.promote(config.foreground_read_max_speed);
    coordinator.wait_ready().await?;

    let source = open_source(storage, resource).await?;

    client.set_status(200);
    client.set_header(headers::X_CACHE, headers::CACHE_STREAM.to_string());
    if let Some(length) = coordinator.content_length() {
        client.set_content_length(length);
    }

    let mut reader = ThrottledStream::reader(source, config.foreground_write_max_speed);
    let mut buffer = vec![0u8; config.buffer_size.max(1)];
    let mut sent = 0u64;
    let mut finished = None;

    loop {
        let n = reader.read(&mut buffer).await?;
        if n > 0 {
            client.body().write_all(&buffer[..n]).await?;
            sent += n as u64;
            continue;
        }

        if finished.is_some() {
            break;
        }

        match coordinator.outcome() {
            Some(Err(error)) => return Err(FetchError::Shared(error)),
            // Bytes may have landed between the empty read and completion
            Some(Ok(completion)) => finished = Some(completion),
            None => tokio::time::sleep(TEE_POLL_INTERVAL).await,
        }
    }

    client.body().flush().await?;
    if finished == Some(Completion::Discarded) {
        warn!(
            "Streamed {} bytes of {} but it failed its integrity check",
            sent, resource.id
        );
        return Ok(CacheStatus::Discarded);
    }
    debug!("STREAM {} finished after {} bytes", resource.id, sent);
    Ok(CacheStatus::Stream)
}

/// Open the partial file, or the full file if the fetch already renamed it
async fn open_source(
    storage: &dyn StorageProvider,
    resource: &Resource,
) -> FetchResult<Box<dyn ReadHandle>> {
    let unavailable = || FetchError::ResourceUnavailable {
        resource: resource.id.to_string(),
    };

    match storage.partial_handle(resource).open_read().await {
        Ok(source) => Ok(source),
        Err(e) if e.kind() == io::ErrorKind::NotFound => storage
            .full_handle(resource)
            .open_read()
            .await
            .map_err(|_| unavailable()),
        Err(e) => Err(e.into()),
    }
}
