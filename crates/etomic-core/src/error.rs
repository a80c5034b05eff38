use crate::types::{Address, Amount, SwapId};

/// Escrow engine errors.
///
/// Every variant aborts the whole operation; no partial state change is ever
/// left behind when one of these is returned.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EscrowError {
    #[error("swap {0} is already initialized")]
    AlreadyInitialized(SwapId),

    #[error("swap {id} is not in an initialized state (status {status})")]
    NotInitialized { id: SwapId, status: String },

    #[error("caller {caller} is not authorized for swap {id}")]
    Unauthorized { id: SwapId, caller: Address },

    #[error("secret does not match the commitment of swap {0}")]
    InvalidSecret(SwapId),

    #[error("amount mismatch: expected {expected}, got {actual}")]
    AmountMismatch { expected: Amount, actual: Amount },

    #[error("unsupported hash algorithm code: {0}")]
    UnsupportedHashAlgorithm(u8),

    #[error("lock of swap {id} expires at {expiry}, now {now}")]
    NotYetExpired { id: SwapId, now: u64, expiry: u64 },

    #[error("claim window of swap {id} closed at {expiry}, now {now}")]
    Expired { id: SwapId, now: u64, expiry: u64 },

    #[error("asset transfer failed: {0}")]
    AssetTransferFailed(String),

    #[error("{field} does not match the stored value for swap {id}")]
    ParameterMismatch { id: SwapId, field: &'static str },

    #[error("invalid commitment: expected {expected} bytes, got {actual}")]
    InvalidCommitment { expected: usize, actual: usize },

    #[error("amount must be greater than zero")]
    InvalidAmount,

    #[error(
        "payment leg of swap {id} locks until {payment_lock}, which with margin {margin} overlaps the deposit lock {deposit_lock}"
    )]
    WindowOverlap {
        id: SwapId,
        payment_lock: u64,
        deposit_lock: u64,
        margin: u64,
    },

    #[error("validation error: {0}")]
    Validation(String),

    #[error("storage error: {0}")]
    Storage(String),
}

impl EscrowError {
    /// Whether the error reports a record that is not (or no longer) in the
    /// status the operation needs.
    pub fn is_status_conflict(&self) -> bool {
        matches!(
            self,
            Self::AlreadyInitialized(_) | Self::NotInitialized { .. }
        )
    }
}
