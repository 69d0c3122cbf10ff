//! Fetch orchestration
//!
//! [`FetchOrchestrator::fetch`] decides for every request how it is
//! answered:
//!
//! 1. non-cacheable resources stream straight from upstream
//! 2. a fresh, complete cached file is served directly (HIT)
//! 3. a ranged request the cache cannot answer bypasses it (PASSTHROUGH)
//! 4. everything else joins the single download of the resource, starting
//!    it if none is running, and streams from the growing partial file
//!
//! Dynamic resources are revalidated upstream with a conditional HEAD before
//! their cached copy is trusted.

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use url::Url;

use crate::app::hash::Checksum;
use crate::app::models::{CacheStatus, Resource, TransferProgress};
use crate::app::storage::{
    hash_handle, CacheVerifier, FlightInfo, StorageProvider, VerificationReport,
};
use crate::app::sync::{Claim, Completion, FetchSlot, InflightTransfers, TransferCoordinator};
use crate::app::upstream::{MirrorSelector, NoopMirrorSelector, Upstream, UpstreamResponse};
use crate::constants::fetch::LOCK_POLL_INTERVAL;
use crate::errors::{FetchError, FetchResult};

pub mod config;
pub mod copy;
pub mod download;
pub mod hit;
pub mod passthrough;
pub mod sink;
pub mod tee;

#[cfg(test)]
mod tests;

pub use config::FetchConfig;
pub use sink::{format_http_date, parse_http_date, parse_range_offset, ClientSink, ResponseSink};

use download::Download;

/// GET from upstream, asking for another mirror on mirror failures
pub(crate) async fn get_upstream(
    upstream: &dyn Upstream,
    mirrors: &dyn MirrorSelector,
    url: &Url,
    offset: u64,
) -> FetchResult<UpstreamResponse> {
    match upstream.get(url, offset).await {
        Ok(response) => Ok(response),
        Err(e) => {
            if let Some(status) = e.status_code().filter(|_| e.is_mirror_failure()) {
                warn!("Mirror failure for {}: HTTP {}, reselecting", url, status);
                mirrors.reselect(url, status).await;
            }
            Err(e)
        }
    }
}

/// Entry point of the caching engine
#[derive(Debug, Clone)]
pub struct FetchOrchestrator {
    config: Arc<FetchConfig>,
    storage: Arc<dyn StorageProvider>,
    upstream: Arc<dyn Upstream>,
    mirrors: Arc<dyn MirrorSelector>,
    transfers: Arc<InflightTransfers>,
}

impl FetchOrchestrator {
    pub fn new(
        config: FetchConfig,
        storage: Arc<dyn StorageProvider>,
        upstream: Arc<dyn Upstream>,
    ) -> Self {
        Self {
            config: Arc::new(config),
            storage,
            upstream,
            mirrors: Arc::new(NoopMirrorSelector),
            transfers: InflightTransfers::new(),
        }
    }

    pub fn with_mirror_selector(mut self, mirrors: Arc<dyn MirrorSelector>) -> Self {
        self.mirrors = mirrors;
        self
    }

    pub fn config(&self) -> &FetchConfig {
        &self.config
    }

    pub fn storage(&self) -> &Arc<dyn StorageProvider> {
        &self.storage
    }

    /// Fetches currently holding a single-flight slot
    pub fn active_fetches(&self) -> Vec<FlightInfo> {
        self.storage.active_fetches()
    }

    /// Answer one request for `resource`
    ///
    /// With a `client` the response is written to it. Without one the
    /// resource is brought into the cache and the call returns once that
    /// fetch has finished. `progress` receives an event per downloaded chunk
    /// when this call starts the download.
    ///
    /// # Errors
    ///
    /// Upstream, transport and cache I/O failures. Integrity failures are
    /// not errors; they are reported as [`CacheStatus::Discarded`].
    pub async fn fetch(
        &self,
        resource: &Resource,
        mut client: Option<&mut dyn ClientSink>,
        progress: Option<mpsc::Sender<TransferProgress>>,
    ) -> FetchResult<CacheStatus> {
        if !resource.is_cacheable() {
            return match client {
                Some(client) => {
                    passthrough::serve(
                        self.upstream.as_ref(),
                        self.mirrors.as_ref(),
                        resource,
                        client,
                        &self.config,
                    )
                    .await
                }
                None => {
                    debug!("Nothing to cache for {}", resource.id);
                    Ok(CacheStatus::Skipped)
                }
            };
        }

        loop {
            let full = self.storage.full_handle(resource);
            let fresh = self.is_fresh(resource).await;

            if fresh && full.exists().await {
                return match client.as_deref_mut() {
                    Some(client) => hit::serve(full.as_ref(), client, &self.config).await,
                    None => Ok(CacheStatus::Hit),
                };
            }

            if let Some(client) = client.as_deref_mut() {
                if client.requested_offset() > 0 {
                    debug!(
                        "Offset {} of uncached {}, bypassing cache",
                        client.requested_offset(),
                        resource.id
                    );
                    return passthrough::serve(
                        self.upstream.as_ref(),
                        self.mirrors.as_ref(),
                        resource,
                        client,
                        &self.config,
                    )
                    .await;
                }
            }

            let speed = if client.is_some() {
                self.config.foreground_read_max_speed
            } else {
                self.config.background_read_max_speed
            };
            let claim = self.transfers.claim(&self.storage, &resource.id, || {
                TransferCoordinator::new(resource.id.clone(), speed)
            });

            match claim {
                Claim::Fetcher(coordinator, slot) => {
                    if !resource.dynamic && full.exists().await {
                        // Another fetch completed between the check and the claim
                        coordinator.finish(Ok(Completion::Cached));
                        drop(slot);
                        continue;
                    }

                    let task = self.spawn_download(
                        resource,
                        coordinator.clone(),
                        slot,
                        fresh,
                        client.is_none(),
                        progress,
                    );

                    return match client {
                        Some(client) => self.stream(&coordinator, resource, client).await,
                        None => match task.await {
                            Ok(outcome) => completion_status(outcome),
                            Err(e) => Err(FetchError::TaskFailed {
                                reason: e.to_string(),
                            }),
                        },
                    };
                }
                Claim::Consumer(coordinator, _lease) => {
                    debug!("Joining running fetch of {}", resource.id);
                    return match client {
                        Some(client) => self.stream(&coordinator, resource, client).await,
                        None => completion_status(coordinator.wait_finished().await),
                    };
                }
                Claim::Busy => {
                    debug!("{} is locked by another fetch, waiting", resource.id);
                    tokio::time::sleep(LOCK_POLL_INTERVAL).await;
                }
            }
        }
    }

    /// Bring `resource` into the cache without a client
    pub async fn prefetch(
        &self,
        resource: &Resource,
        progress: Option<mpsc::Sender<TransferProgress>>,
    ) -> FetchResult<CacheStatus> {
        self.fetch(resource, None, progress).await
    }

    /// Re-check the complete cached file of `resource`
    ///
    /// Returns `None` when integrity checking is disabled.
    pub async fn verify_cached(
        &self,
        resource: &Resource,
        remove_failed: bool,
    ) -> Option<VerificationReport> {
        if !self.config.checksum_integrity_check {
            return None;
        }
        Some(
            CacheVerifier::verify_resources(
                self.storage.as_ref(),
                std::slice::from_ref(resource),
                remove_failed,
            )
            .await,
        )
    }

    /// Size and digest of the complete cached file, if there is one
    pub async fn cached_digest(
        &self,
        resource: &Resource,
    ) -> FetchResult<Option<(u64, Checksum)>> {
        let full = self.storage.full_handle(resource);
        if !full.exists().await {
            return Ok(None);
        }
        let digest = hash_handle(full.as_ref(), resource.integrity.algorithm()).await?;
        Ok(Some(digest))
    }

    /// Whether cached data of `resource` may be used without refetching
    ///
    /// Static resources are always fresh. Dynamic ones are revalidated with
    /// a conditional HEAD against the newer of the full and partial files;
    /// if the probe itself fails the cached copy is trusted.
    async fn is_fresh(&self, resource: &Resource) -> bool {
        if !resource.dynamic {
            return true;
        }

        let full = self.storage.full_handle(resource).modified().await.ok();
        let partial = self.storage.partial_handle(resource).modified().await.ok();
        let since = match full.max(partial) {
            Some(since) => since,
            None => return false,
        };

        match self.upstream.head(&resource.uri, since).await {
            Ok(status) => {
                debug!("Revalidated {}: HTTP {}", resource.id, status);
                status == 304
            }
            Err(e) => {
                warn!(
                    "Could not revalidate {}, using cached copy: {}",
                    resource.id, e
                );
                true
            }
        }
    }

    fn spawn_download(
        &self,
        resource: &Resource,
        coordinator: Arc<TransferCoordinator>,
        slot: FetchSlot,
        fresh: bool,
        background: bool,
        progress: Option<mpsc::Sender<TransferProgress>>,
    ) -> tokio::task::JoinHandle<Result<Completion, Arc<FetchError>>> {
        let lease = (self.config.keep_downloading || background)
            .then(|| coordinator.cancellation().attach());

        let download = Download {
            config: self.config.clone(),
            storage: self.storage.clone(),
            upstream: self.upstream.clone(),
            mirrors: self.mirrors.clone(),
            resource: resource.clone(),
            coordinator: coordinator.clone(),
            progress,
            fresh,
        };

        tokio::spawn(async move {
            let token = coordinator.cancellation().token();
            let result = tokio::select! {
                _ = token.cancelled() => {
                    info!("Fetch of {} cancelled, no consumers left", coordinator.resource());
                    Err(FetchError::Cancelled)
                }
                result = download.run() => result,
            };

            if let Err(e) = &result {
                warn!("Fetch of {} failed: {}", coordinator.resource(), e);
            }
            let outcome = result.map_err(FetchError::into_shared);
            coordinator.finish(outcome.clone());
            drop(slot);
            drop(lease);
            outcome
        })
    }

    /// Tee the running fetch to `client`, keeping the fetch alive meanwhile
    async fn stream(
        &self,
        coordinator: &Arc<TransferCoordinator>,
        resource: &Resource,
        client: &mut dyn ClientSink,
    ) -> FetchResult<CacheStatus> {
        coordinator
            .cancellation()
            .run_under_refcount(tee::serve(
                coordinator,
                self.storage.as_ref(),
                resource,
                client,
                &self.config,
            ))
            .await
    }
}

fn completion_status(outcome: Result<Completion, Arc<FetchError>>) -> FetchResult<CacheStatus> {
    match outcome {
        Ok(Completion::Cached) => Ok(CacheStatus::Fetched),
        Ok(Completion::Discarded) => Ok(CacheStatus::Discarded),
        Err(e) => Err(FetchError::Shared(e)),
    }
}
