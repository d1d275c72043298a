//! Admission control for batch workers

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::{debug, info};

use crate::error::{ConvertError, Result};

/// Fixed-size admission gate bounding how many files are converted at once.
///
/// A slot is held for the whole lifetime of a worker and released when the
/// returned permit is dropped.
#[derive(Debug, Clone)]
pub struct AdmissionGate {
    semaphore: Arc<Semaphore>,
    capacity: usize,
}

impl AdmissionGate {
    /// Create a gate with `capacity` slots (at least one)
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        debug!("Creating admission gate with {} slots", capacity);

        Self {
            semaphore: Arc::new(Semaphore::new(capacity)),
            capacity,
        }
    }

    /// Wait for a free slot
    pub async fn admit(&self) -> Result<OwnedSemaphorePermit> {
        Arc::clone(&self.semaphore)
            .acquire_owned()
            .await
            .map_err(|e| ConvertError::Worker {
                message: format!("admission gate closed: {}", e),
                file: None,
            })
    }

    /// Take a slot only if one is free right now
    pub fn try_admit(&self) -> Option<OwnedSemaphorePermit> {
        Arc::clone(&self.semaphore).try_acquire_owned().ok()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Slots not currently held by a worker
    pub fn available(&self) -> usize {
        self.semaphore.available_permits()
    }
}

/// Shared stop signal checked before each admission.
///
/// Cancelling stops new files from being dispatched; files already admitted
/// run to completion.
#[derive(Debug, Clone, Default)]
pub struct CancellationFlag {
    cancelled: Arc<AtomicBool>,
}

impl CancellationFlag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation. Idempotent.
    pub fn cancel(&self) {
        if !self.cancelled.swap(true, Ordering::SeqCst) {
            info!("Cancellation requested, no new files will be started");
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_gate_bounds_concurrency() {
        let gate = AdmissionGate::new(2);
        assert_eq!(gate.capacity(), 2);

        let first = gate.admit().await.unwrap();
        let _second = gate.admit().await.unwrap();
        assert_eq!(gate.available(), 0);
        assert!(gate.try_admit().is_none());

        drop(first);
        assert_eq!(gate.available(), 1);
        assert!(gate.try_admit().is_some());
    }

    #[test]
    fn test_zero_capacity_is_clamped() {
        let gate = AdmissionGate::new(0);
        assert_eq!(gate.capacity(), 1);
        assert_eq!(gate.available(), 1);
    }

    #[test]
    fn test_cancellation_is_shared_between_clones() {
        let flag = CancellationFlag::new();
        let observer = flag.clone();
        assert!(!observer.is_cancelled());

        flag.cancel();
        flag.cancel();
        assert!(observer.is_cancelled());
    }
}
