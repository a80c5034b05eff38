use std::sync::{Arc, Mutex, PoisonError};

use dashmap::DashMap;

use etomic_core::SwapId;

/// One mutex per swap identifier.
///
/// Every state-changing operation runs inside [`IdLocks::with`] for its id,
/// so read, guard checks, asset movement, and write happen as one serialized
/// step. Different identifiers never contend. A mutex only lives in the table
/// while some call holds or waits on it.
#[derive(Debug, Default)]
pub struct IdLocks {
    locks: DashMap<SwapId, Arc<Mutex<()>>>,
}

impl IdLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `f` while holding the lock for `id`.
    pub fn with<T>(&self, id: SwapId, f: impl FnOnce() -> T) -> T {
        let lock = self.locks.entry(id).or_default().clone();
        let result = {
            // A panic inside `f` cannot leave a half-written record behind,
            // so a poisoned lock is still safe to take.
            let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);
            f()
        };
        drop(lock);
        // Clones are only taken under the shard lock, so a count of one
        // means no other call holds or waits on this mutex.
        self.locks.remove_if(&id, |_, lock| Arc::strong_count(lock) == 1);
        result
    }

    /// Number of identifiers with a call in flight.
    pub fn len(&self) -> usize {
        self.locks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}
