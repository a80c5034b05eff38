use dashmap::DashMap;

use etomic_core::{EscrowError, SwapId};

/// Keyed storage for one record family.
///
/// Records are only ever inserted or overwritten, never deleted. Callers
/// serialize writes per identifier through [`crate::IdLocks`].
pub trait RecordStore<R>: Send + Sync {
    fn load(&self, id: &SwapId) -> Result<Option<R>, EscrowError>;

    fn save(&self, id: &SwapId, record: &R) -> Result<(), EscrowError>;

    /// Every stored record, in no particular order.
    fn entries(&self) -> Result<Vec<(SwapId, R)>, EscrowError>;
}

/// In-memory record store.
#[derive(Debug)]
pub struct MemoryStore<R> {
    records: DashMap<SwapId, R>,
}

impl<R> MemoryStore<R> {
    pub fn new() -> Self {
        Self {
            records: DashMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl<R> Default for MemoryStore<R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: Clone + Send + Sync> RecordStore<R> for MemoryStore<R> {
    fn load(&self, id: &SwapId) -> Result<Option<R>, EscrowError> {
        Ok(self.records.get(id).map(|r| r.value().clone()))
    }

    fn save(&self, id: &SwapId, record: &R) -> Result<(), EscrowError> {
        self.records.insert(*id, record.clone());
        Ok(())
    }

    fn entries(&self) -> Result<Vec<(SwapId, R)>, EscrowError> {
        Ok(self
            .records
            .iter()
            .map(|entry| (*entry.key(), entry.value().clone()))
            .collect())
    }
}
