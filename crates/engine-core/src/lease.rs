use model::key::TableKey;
use std::{
    collections::HashSet,
    sync::{Arc, Mutex, PoisonError},
};
use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug)]
#[error("lease for {0} is already held")]
pub struct LeaseHeld(pub TableKey);

/// In-process mutual exclusion per (source_system, table_name). At most one
/// active batch run per pair; independent pairs proceed in parallel.
#[derive(Default)]
pub struct LeaseRegistry {
    held: Mutex<HashSet<TableKey>>,
}

impl LeaseRegistry {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Non-blocking acquire; a second orchestrator on the same pair is
    /// rejected until the current holder drops its lease.
    pub fn try_acquire(self: &Arc<Self>, key: &TableKey) -> Result<Lease, LeaseHeld> {
        let mut held = self
            .held
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if !held.insert(key.clone()) {
            return Err(LeaseHeld(key.clone()));
        }
        debug!(key = %key, "lease acquired");
        Ok(Lease {
            registry: Arc::clone(self),
            key: key.clone(),
        })
    }

    pub fn is_held(&self, key: &TableKey) -> bool {
        self.held
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(key)
    }

    fn release(&self, key: &TableKey) {
        self.held
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(key);
        debug!(key = %key, "lease released");
    }
}

/// RAII lease guard. Dropping it releases the pair, including on error and
/// panic unwind paths.
pub struct Lease {
    registry: Arc<LeaseRegistry>,
    key: TableKey,
}

impl Lease {
    pub fn key(&self) -> &TableKey {
        &self.key
    }
}

impl Drop for Lease {
    fn drop(&mut self) {
        self.registry.release(&self.key);
    }
}
