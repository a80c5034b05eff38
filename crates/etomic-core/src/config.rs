use serde::{Deserialize, Serialize};

use crate::types::{Address, LockUnit};

/// Parameters shared by every escrow variant of one engine instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Unit of every lock expiry and claim deadline.
    pub lock_unit: LockUnit,
    /// Length of one deal period, in `lock_unit`s. The deposit leg locks for
    /// two periods and the payment leg for one.
    pub deal_period: u64,
    /// Minimum gap between the payment leg's expiry and the deposit leg's.
    pub safety_margin: u64,
    /// The single identity allowed to approve relay deals.
    pub relay_address: Option<Address>,
    /// Account that holds locked funds on the asset ledger.
    pub escrow_account: Address,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            lock_unit: LockUnit::Height,
            deal_period: 10,
            safety_margin: 5,
            relay_address: None,
            escrow_account: Address([0xe5; 20]),
        }
    }
}

impl EngineConfig {
    /// Lock length of the deposit leg.
    pub fn deposit_period(&self) -> u64 {
        self.deal_period.saturating_mul(2)
    }

    /// Lock length of the payment leg.
    pub fn payment_period(&self) -> u64 {
        self.deal_period
    }

    /// Whether legs funded at the same instant keep the payment leg's claim
    /// window clear of the deposit leg's reclaim window.
    pub fn windows_are_separated(&self) -> bool {
        self.payment_period().saturating_add(self.safety_margin) <= self.deposit_period()
    }
}
