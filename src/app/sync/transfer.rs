//! Per-download coordination state
//!
//! One [`TransferCoordinator`] exists for every resource with a fetch in
//! flight. The fetcher drives its phase forward; tee consumers wait on it,
//! read the expected length from it and attach to its cancellation.

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::watch;

use crate::app::models::ResourceId;
use crate::app::sync::cancellation::RefCountedCancellation;
use crate::app::throttle::{Speed, SpeedLimit};
use crate::errors::{FetchError, FetchResult};

/// How a fetch that ran to the end left the cache
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion {
    /// The full file now exists
    Cached,
    /// The data failed its integrity check and was removed
    Discarded,
}

/// Result shared with every consumer of a fetch
pub type TransferOutcome = Result<Completion, Arc<FetchError>>;

#[derive(Debug, Clone)]
pub enum TransferPhase {
    /// Waiting for upstream headers
    Connecting,
    /// Partial file open, bytes may be read
    Streaming,
    Finished(TransferOutcome),
}

#[derive(Debug)]
pub struct TransferCoordinator {
    resource: ResourceId,
    phase: watch::Sender<TransferPhase>,
    /// Expected final size, -1 when unknown
    content_length: AtomicI64,
    read_limit: SpeedLimit,
    cancellation: Arc<RefCountedCancellation>,
    started_at: DateTime<Utc>,
}

impl TransferCoordinator {
    pub fn new(resource: ResourceId, read_speed: Speed) -> Self {
        let (phase, _) = watch::channel(TransferPhase::Connecting);

        Self {
            resource,
            phase,
            content_length: AtomicI64::new(-1),
            read_limit: SpeedLimit::new(read_speed),
            cancellation: RefCountedCancellation::new(),
            started_at: Utc::now(),
        }
    }

    pub fn resource(&self) -> &ResourceId {
        &self.resource
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn content_length(&self) -> Option<u64> {
        u64::try_from(self.content_length.load(Ordering::Acquire)).ok()
    }

    pub fn set_content_length(&self, length: Option<u64>) {
        let value = length
            .and_then(|length| i64::try_from(length).ok())
            .unwrap_or(-1);
        self.content_length.store(value, Ordering::Release);
    }

    /// Live handle to the upstream read ceiling of this fetch
    pub fn read_limit(&self) -> SpeedLimit {
        self.read_limit.clone()
    }

    /// Switch the running fetch to `speed`, typically when a client arrives
    pub fn promote(&self, speed: Speed) {
        self.read_limit.set(speed);
    }

    pub fn cancellation(&self) -> &Arc<RefCountedCancellation> {
        &self.cancellation
    }

    /// Open the gate for consumers; only the first call has an effect
    pub fn mark_streaming(&self) -> bool {
        self.phase.send_if_modified(|phase| {
            if matches!(phase, TransferPhase::Connecting) {
                *phase = TransferPhase::Streaming;
                true
            } else {
                false
            }
        })
    }

    /// Record the final outcome; only the first call has an effect
    pub fn finish(&self, outcome: TransferOutcome) -> bool {
        self.phase.send_if_modified(|phase| {
            if matches!(phase, TransferPhase::Finished(_)) {
                false
            } else {
                *phase = TransferPhase::Finished(outcome);
                true
            }
        })
    }

    /// Outcome, once the fetch has finished
    pub fn outcome(&self) -> Option<TransferOutcome> {
        match &*self.phase.borrow() {
            TransferPhase::Finished(outcome) => Some(outcome.clone()),
            _ => None,
        }
    }

    pub fn phase(&self) -> TransferPhase {
        self.phase.borrow().clone()
    }

    /// Wait until bytes may be read
    ///
    /// Fails with the fetch error if the fetch ended before it ever started
    /// streaming.
    pub async fn wait_ready(&self) -> FetchResult<()> {
        let mut receiver = self.phase.subscribe();
        let phase = receiver
            .wait_for(|phase| !matches!(phase, TransferPhase::Connecting))
            .await
            .map(|phase| phase.clone())
            .map_err(|_| FetchError::TaskFailed {
                reason: "transfer state dropped".to_string(),
            })?;

        match phase {
            TransferPhase::Finished(Err(error)) => Err(FetchError::Shared(error)),
            _ => Ok(()),
        }
    }

    /// Wait for the final outcome
    pub async fn wait_finished(&self) -> TransferOutcome {
        let mut receiver = self.phase.subscribe();
        let phase = receiver
            .wait_for(|phase| matches!(phase, TransferPhase::Finished(_)))
            .await
            .map(|phase| phase.clone());

        match phase {
            Ok(TransferPhase::Finished(outcome)) => outcome,
            _ => Err(Arc::new(FetchError::TaskFailed {
                reason: "transfer state dropped".to_string(),
            })),
        }
    }
}
