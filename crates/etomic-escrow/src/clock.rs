use std::sync::atomic::{AtomicU64, Ordering};

/// Monotonic reference for lock expiries, in the engine's `LockUnit`.
pub trait Clock: Send + Sync {
    fn now(&self) -> u64;
}

/// Wall-clock seconds since the Unix epoch.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> u64 {
        u64::try_from(chrono::Utc::now().timestamp()).unwrap_or(0)
    }
}

/// Externally driven clock: a block height advanced by the host, or a fixed
/// time in tests.
#[derive(Debug, Default)]
pub struct ManualClock {
    current: AtomicU64,
}

impl ManualClock {
    pub fn new(start: u64) -> Self {
        Self {
            current: AtomicU64::new(start),
        }
    }

    pub fn set(&self, value: u64) {
        self.current.store(value, Ordering::SeqCst);
    }

    /// Advance by `by` units and return the new value.
    pub fn advance(&self, by: u64) -> u64 {
        self.current.fetch_add(by, Ordering::SeqCst) + by
    }
}

impl Clock for ManualClock {
    fn now(&self) -> u64 {
        self.current.load(Ordering::SeqCst)
    }
}
