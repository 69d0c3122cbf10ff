//! Table of fetches in flight
//!
//! Claiming a resource takes its single-flight slot and publishes the new
//! coordinator under one lock, so a second caller either sees the
//! coordinator or gets the slot itself. The slot is released and the entry
//! removed together when the [`FetchSlot`] is dropped. A coordinator whose
//! slot goes away without an outcome is finished with an error so its
//! consumers never wait forever.
//!
//! Joining attaches to the coordinator's cancellation under the same lock.
//! A transfer whose consumers have all left is treated as busy rather than
//! joined, so the caller waits for its slot instead of inheriting the cancel.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::app::models::ResourceId;
use crate::app::storage::StorageProvider;
use crate::app::sync::cancellation::AttachGuard;
use crate::app::sync::transfer::TransferCoordinator;
use crate::errors::FetchError;

/// What a caller should do about a resource
#[derive(Debug)]
pub enum Claim {
    /// Caller owns the slot and must run the fetch
    Fetcher(Arc<TransferCoordinator>, FetchSlot),
    /// A fetch is running in this process; tee from it while holding the lease
    Consumer(Arc<TransferCoordinator>, AttachGuard),
    /// The slot is held by a fetch this table does not know about
    Busy,
}

#[derive(Debug, Default)]
pub struct InflightTransfers {
    transfers: Mutex<HashMap<ResourceId, Arc<TransferCoordinator>>>,
}

impl InflightTransfers {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Join the running fetch of `id` or become its fetcher
    pub fn claim(
        self: &Arc<Self>,
        storage: &Arc<dyn StorageProvider>,
        id: &ResourceId,
        create: impl FnOnce() -> TransferCoordinator,
    ) -> Claim {
        let mut transfers = self.transfers.lock();

        if let Some(existing) = transfers.get(id) {
            return match existing.cancellation().try_attach() {
                Some(lease) => Claim::Consumer(existing.clone(), lease),
                None => {
                    debug!("Fetch of {} is winding down, not joining", id);
                    Claim::Busy
                }
            };
        }

        if !storage.try_lock_resource(id) {
            return Claim::Busy;
        }

        let coordinator = Arc::new(create());
        transfers.insert(id.clone(), coordinator.clone());
        debug!("Registered fetch for {}", id);

        Claim::Fetcher(
            coordinator,
            FetchSlot {
                id: id.clone(),
                storage: storage.clone(),
                transfers: self.clone(),
            },
        )
    }

    pub fn get(&self, id: &ResourceId) -> Option<Arc<TransferCoordinator>> {
        self.transfers.lock().get(id).cloned()
    }

    pub fn len(&self) -> usize {
        self.transfers.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Ownership of a single-flight slot
#[derive(Debug)]
pub struct FetchSlot {
    id: ResourceId,
    storage: Arc<dyn StorageProvider>,
    transfers: Arc<InflightTransfers>,
}

impl FetchSlot {
    pub fn resource(&self) -> &ResourceId {
        &self.id
    }
}

impl Drop for FetchSlot {
    fn drop(&mut self) {
        let mut transfers = self.transfers.transfers.lock();
        if let Some(coordinator) = transfers.remove(&self.id) {
            let abandoned = coordinator.finish(Err(Arc::new(FetchError::TaskFailed {
                reason: "fetch ended without an outcome".to_string(),
            })));
            if abandoned {
                warn!("Fetch of {} ended without an outcome", self.id);
            }
        }
        self.storage.release_resource(&self.id);
        debug!("Released fetch slot for {}", self.id);
    }
}
