//! Nonces already accepted from each signing key.
//!
//! An entry only has to outlive its request's expiry: once a request has
//! expired, `SignedRequest::open` refuses it before the guard is consulted.

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use etomic_core::Address;

/// Prune expired entries once every this many admissions.
const PRUNE_EVERY: u64 = 1024;

#[derive(Debug, Default)]
pub struct ReplayGuard {
    /// (signer, nonce) -> expiry of the request that used it.
    seen: DashMap<(Address, u64), i64>,
    admitted: AtomicU64,
}

impl ReplayGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `nonce` for `signer`. Returns false if it was already used by
    /// a request that has not yet expired.
    pub fn admit(&self, signer: Address, nonce: u64, expires_at: i64, now: i64) -> bool {
        if self.admitted.fetch_add(1, Ordering::Relaxed) % PRUNE_EVERY == PRUNE_EVERY - 1 {
            self.prune(now);
        }
        match self.seen.entry((signer, nonce)) {
            Entry::Occupied(mut used) => {
                if *used.get() >= now {
                    return false;
                }
                used.insert(expires_at);
                true
            }
            Entry::Vacant(slot) => {
                slot.insert(expires_at);
                true
            }
        }
    }

    /// Forget every nonce whose request expired before `now`.
    pub fn prune(&self, now: i64) {
        self.seen.retain(|_, expires_at| *expires_at >= now);
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}
