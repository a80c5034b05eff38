//! Etomic Relay
//!
//! Bridges relay-approved deals to a foreign ledger the engine cannot see.
//! The relay polls the engine for approval signals, looks up each referenced
//! transaction on the foreign ledger, and approves the deals whose
//! transaction exists.

pub mod engine;
pub mod error;
pub mod oracle;
pub mod relay;

pub use engine::{ApprovalSink, LocalEngine, SignalSource};
pub use error::RelayError;
pub use oracle::{ForeignLedger, JsonRpcForeignLedger, Lookup, RpcAuth};
pub use relay::{PollReport, Relay, RelayConfig};
