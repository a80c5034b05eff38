//! Etomic Core: fundamental types, errors, and status machines shared by
//! every escrow variant of the Etomic swap engine.

pub mod config;
pub mod error;
pub mod status;
pub mod types;

pub use config::EngineConfig;
pub use error::EscrowError;
pub use status::{
    DealEvent, DealStatus, LegEvent, LegStatus, PaymentEvent, PaymentStatus, RelayDealEvent,
    RelayDealStatus,
};
pub use types::{Address, Amount, Asset, Call, Commitment, ForeignTxRef, LockUnit, SwapId};

/// Result alias used across the engine crates.
pub type Result<T> = std::result::Result<T, EscrowError>;
