//! Fixtures shared by the cross-crate scenario tests.

use std::sync::Arc;

use etomic_core::{Address, Amount, Asset, Call, EngineConfig, SwapId};
use etomic_escrow::{Escrow, ManualClock, MemoryLedger};

pub const ALICE: Address = Address([0xaa; 20]);
pub const BOB: Address = Address([0xbb; 20]);
pub const EVE: Address = Address([0xee; 20]);
pub const RELAY: Address = Address([0xc3; 20]);
pub const TOKEN: Address = Address([0x70; 20]);

/// Clock reading every fixture starts at.
pub const START: u64 = 100;
/// Native and token balance minted to each party.
pub const FUNDS: Amount = 1_000_000;

pub fn swap_id(n: u8) -> SwapId {
    SwapId([n; 32])
}

/// A call from `caller` with no value attached.
pub fn call(caller: Address) -> Call {
    Call::new(caller)
}

/// A call from `caller` carrying `value` of the native asset.
pub fn paying(caller: Address, value: Amount) -> Call {
    Call::new(caller).with_value(value)
}

/// An in-memory engine with a manual clock and funded parties.
pub struct Fixture {
    pub escrow: Arc<Escrow>,
    pub clock: Arc<ManualClock>,
    pub ledger: Arc<MemoryLedger>,
}

impl Fixture {
    pub fn new() -> Self {
        Self::with_config(EngineConfig {
            relay_address: Some(RELAY),
            ..Default::default()
        })
    }

    pub fn with_config(config: EngineConfig) -> Self {
        let clock = Arc::new(ManualClock::new(START));
        let ledger = Arc::new(MemoryLedger::new(config.escrow_account));
        for party in [ALICE, BOB, EVE] {
            for asset in [Asset::Native, Asset::Token(TOKEN)] {
                ledger
                    .mint(asset, party, FUNDS)
                    .expect("minting into an empty ledger cannot overflow");
            }
        }
        let escrow = Escrow::in_memory(config, clock.clone(), ledger.clone())
            .map(Arc::new)
            .expect("fixture config keeps the lock windows apart");
        tracing::debug!(start = START, "fixture ready");
        Self {
            escrow,
            clock,
            ledger,
        }
    }

    pub fn native(&self, account: Address) -> Amount {
        self.ledger.balance_of(Asset::Native, account)
    }

    pub fn token(&self, account: Address) -> Amount {
        self.ledger.balance_of(Asset::Token(TOKEN), account)
    }

    pub fn escrowed(&self, asset: Asset) -> Amount {
        self.ledger
            .balance_of(asset, self.ledger.escrow_account())
    }

    /// Let the escrow account pull `amount` of the test token from `owner`.
    pub fn allow(&self, owner: Address, amount: Amount) {
        self.ledger
            .approve(TOKEN, owner, self.ledger.escrow_account(), amount);
    }
}

impl Default for Fixture {
    fn default() -> Self {
        Self::new()
    }
}
