//! Etomic Escrow Engine
//!
//! State machines for every escrow variant, the asset-ledger seam they move
//! funds through, and the record stores they persist to.

pub mod clock;
pub mod deal;
pub mod deposit;
pub mod engine;
pub mod ledger;
pub mod locks;
pub mod payment;
pub mod relay_deal;
pub mod store;

pub use clock::{Clock, ManualClock, SystemClock};
pub use deal::{CounterpartyDealClaim, DealRecord, DealRequest, InitiatorDealClaim, TwoSecretDeals};
pub use deposit::{
    DepositRecord, DualLegEscrow, Leg, LegClaimRequest, LegPaymentRecord, LegReclaimRequest,
    LegRecord, LegRequest,
};
pub use engine::{EngineContext, Escrow, EscrowStores};
pub use ledger::{AllowanceEntry, AssetLedger, BalanceEntry, LedgerSnapshot, MemoryLedger};
pub use locks::IdLocks;
pub use payment::{HtlcPayments, PaymentRecord, PaymentRequest, RefundRequest, SpendRequest};
pub use relay_deal::{
    ApprovalSignal, DealRef, ReceiverClaim, RelayDealRecord, RelayDealRequest, RelayDeals,
};
pub use store::{MemoryStore, RecordStore};
