//! Single-flight registry
//!
//! Records which resources currently have an upstream fetch running. A
//! successful [`SingleFlightRegistry::try_acquire`] is the only way to become
//! the fetcher of a resource; the slot stays taken until it is released.

use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;

use crate::app::models::ResourceId;

/// Bookkeeping for one acquired slot
#[derive(Debug, Clone, Serialize)]
pub struct FlightInfo {
    pub resource: ResourceId,
    /// When the slot was acquired
    pub acquired_at: DateTime<Utc>,
}

impl FlightInfo {
    /// How long the slot has been held
    pub fn held_for(&self) -> Duration {
        Utc::now()
            .signed_duration_since(self.acquired_at)
            .to_std()
            .unwrap_or(Duration::ZERO)
    }
}

/// Set of resources with an active fetch
#[derive(Debug, Default)]
pub struct SingleFlightRegistry {
    flights: Mutex<HashMap<ResourceId, DateTime<Utc>>>,
}

impl SingleFlightRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take the slot for `id`; false if it is already taken
    pub fn try_acquire(&self, id: &ResourceId) -> bool {
        let mut flights = self.flights.lock();
        if flights.contains_key(id) {
            return false;
        }
        flights.insert(id.clone(), Utc::now());
        true
    }

    /// Give the slot back; releasing a free slot is a no-op
    pub fn release(&self, id: &ResourceId) {
        self.flights.lock().remove(id);
    }

    pub fn is_locked(&self, id: &ResourceId) -> bool {
        self.flights.lock().contains_key(id)
    }

    /// Number of slots currently taken
    pub fn len(&self) -> usize {
        self.flights.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Copy of the current slots, oldest first
    pub fn snapshot(&self) -> Vec<FlightInfo> {
        let mut flights: Vec<FlightInfo> = self
            .flights
            .lock()
            .iter()
            .map(|(resource, acquired_at)| FlightInfo {
                resource: resource.clone(),
                acquired_at: *acquired_at,
            })
            .collect();
        flights.sort_by_key(|flight| flight.acquired_at);
        flights
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn id(name: &str) -> ResourceId {
        ResourceId::new("core", "x86_64", name)
    }

    #[test]
    fn test_acquire_and_release() {
        let registry = SingleFlightRegistry::new();

        assert!(registry.try_acquire(&id("a")));
        assert!(!registry.try_acquire(&id("a")));
        assert!(registry.is_locked(&id("a")));
        assert!(!registry.is_locked(&id("b")));

        registry.release(&id("a"));
        assert!(!registry.is_locked(&id("a")));
        assert!(registry.try_acquire(&id("a")));
    }

    #[test]
    fn test_release_is_idempotent() {
        let registry = SingleFlightRegistry::new();
        registry.release(&id("never-acquired"));

        registry.try_acquire(&id("a"));
        registry.release(&id("a"));
        registry.release(&id("a"));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_keys_by_value() {
        let registry = SingleFlightRegistry::new();
        let first = ResourceId::new("extra", "x86_64", "foo.pkg.tar.zst");
        let second = ResourceId::new("extra", "x86_64", "foo.pkg.tar.zst");

        assert!(registry.try_acquire(&first));
        assert!(!registry.try_acquire(&second));
    }

    #[test]
    fn test_concurrent_acquire_has_single_winner() {
        let registry = Arc::new(SingleFlightRegistry::new());
        let winners = Arc::new(AtomicUsize::new(0));

        let threads: Vec<_> = (0..16)
            .map(|_| {
                let registry = registry.clone();
                let winners = winners.clone();
                std::thread::spawn(move || {
                    if registry.try_acquire(&id("contended")) {
                        winners.fetch_add(1, Ordering::SeqCst);
                    }
                })
            })
            .collect();

        for thread in threads {
            thread.join().unwrap();
        }

        assert_eq!(winners.load(Ordering::SeqCst), 1);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_snapshot() {
        let registry = SingleFlightRegistry::new();
        registry.try_acquire(&id("a"));
        registry.try_acquire(&id("b"));

        let snapshot = registry.snapshot();
        assert_eq!(snapshot.len(), 2);
        assert!(snapshot.iter().all(|flight| flight.held_for() < Duration::from_secs(5)));
    }
}
