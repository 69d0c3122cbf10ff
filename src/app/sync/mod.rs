//! Coordination between a fetch and its consumers

pub mod cancellation;
pub mod inflight;
pub mod transfer;

pub use cancellation::{AttachGuard, RefCountedCancellation};
pub use inflight::{Claim, FetchSlot, InflightTransfers};
pub use transfer::{Completion, TransferCoordinator, TransferOutcome, TransferPhase};
