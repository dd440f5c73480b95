use std::sync::Arc;

use tokio::sync::{OwnedSemaphorePermit, Semaphore};

/// Global cap on simultaneously executing run bodies.
#[derive(Clone)]
pub struct AdmissionSlots {
    sem: Arc<Semaphore>,
    capacity: usize,
}

impl AdmissionSlots {
    pub fn new(capacity: usize) -> Self {
        Self {
            sem: Arc::new(Semaphore::new(capacity)),
            capacity,
        }
    }

    /// Waits for a free slot. `None` only if the slots were closed.
    pub async fn acquire(&self) -> Option<OwnedSemaphorePermit> {
        Arc::clone(&self.sem).acquire_owned().await.ok()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn used(&self) -> usize {
        self.capacity.saturating_sub(self.sem.available_permits())
    }
}
