//! Status enums and transition tables for every escrow record family.
//!
//! Each family has exactly one initial status, one active status, and two
//! terminal statuses. A terminal status never transitions again, so at most
//! one of the terminating events can ever be applied to a record.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::EscrowError;
use crate::types::SwapId;

fn already_initialized<S>(id: SwapId) -> Result<S, EscrowError> {
    Err(EscrowError::AlreadyInitialized(id))
}

fn not_initialized<S>(id: SwapId, current: impl fmt::Display) -> Result<S, EscrowError> {
    Err(EscrowError::NotInitialized {
        id,
        status: current.to_string(),
    })
}

// ---------------------------------------------------------------------------
// HTLC payment
// ---------------------------------------------------------------------------

/// Lifecycle of a generic HTLC payment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum PaymentStatus {
    #[default]
    Uninitialized,
    /// Funds are locked against the commitment.
    Sent,
    /// The receiver revealed the secret and took the funds. Final state.
    ReceiverSpent,
    /// The sender reclaimed the funds after expiry. Final state.
    SenderRefunded,
}

/// Events that move a payment between statuses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaymentEvent {
    Fund,
    ReceiverSpend,
    SenderRefund,
}

impl PaymentStatus {
    pub fn is_final(&self) -> bool {
        matches!(self, Self::ReceiverSpent | Self::SenderRefunded)
    }

    /// Valid transitions:
    /// - Uninitialized → Sent (Fund)
    /// - Sent → ReceiverSpent (ReceiverSpend)
    /// - Sent → SenderRefunded (SenderRefund)
    pub fn transition(self, id: SwapId, event: PaymentEvent) -> Result<Self, EscrowError> {
        let next = match (self, event) {
            (Self::Uninitialized, PaymentEvent::Fund) => Self::Sent,
            (_, PaymentEvent::Fund) => return already_initialized(id),
            (Self::Sent, PaymentEvent::ReceiverSpend) => Self::ReceiverSpent,
            (Self::Sent, PaymentEvent::SenderRefund) => Self::SenderRefunded,
            (current, _) => return not_initialized(id, current),
        };

        tracing::debug!(swap_id = %id, from = %self, to = %next, event = ?event, "payment status transition");
        Ok(next)
    }

    pub fn can_transition(self, id: SwapId, event: PaymentEvent) -> bool {
        self.transition(id, event).is_ok()
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Uninitialized => write!(f, "Uninitialized"),
            Self::Sent => write!(f, "Sent"),
            Self::ReceiverSpent => write!(f, "ReceiverSpent"),
            Self::SenderRefunded => write!(f, "SenderRefunded"),
        }
    }
}

// ---------------------------------------------------------------------------
// Deposit / payment legs
// ---------------------------------------------------------------------------

/// Lifecycle of one leg (deposit or payment) in the dual-timelock role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum LegStatus {
    #[default]
    Uninitialized,
    /// The owner locked funds for the counterparty.
    Made,
    /// The counterparty claimed with the secret inside the window. Final state.
    CounterpartyClaimed,
    /// The owner reclaimed after the lock expired. Final state.
    OwnerClaimed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LegEvent {
    Make,
    CounterpartyClaim,
    OwnerReclaim,
}

impl LegStatus {
    pub fn is_final(&self) -> bool {
        matches!(self, Self::CounterpartyClaimed | Self::OwnerClaimed)
    }

    pub fn transition(self, id: SwapId, event: LegEvent) -> Result<Self, EscrowError> {
        let next = match (self, event) {
            (Self::Uninitialized, LegEvent::Make) => Self::Made,
            (_, LegEvent::Make) => return already_initialized(id),
            (Self::Made, LegEvent::CounterpartyClaim) => Self::CounterpartyClaimed,
            (Self::Made, LegEvent::OwnerReclaim) => Self::OwnerClaimed,
            (current, _) => return not_initialized(id, current),
        };

        tracing::debug!(swap_id = %id, from = %self, to = %next, event = ?event, "leg status transition");
        Ok(next)
    }
}

impl fmt::Display for LegStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Uninitialized => write!(f, "Uninitialized"),
            Self::Made => write!(f, "Made"),
            Self::CounterpartyClaimed => write!(f, "CounterpartyClaimed"),
            Self::OwnerClaimed => write!(f, "OwnerClaimed"),
        }
    }
}

// ---------------------------------------------------------------------------
// Two-secret deal
// ---------------------------------------------------------------------------

/// Lifecycle of a two-secret deal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum DealStatus {
    #[default]
    Uninitialized,
    Initialized,
    /// Final state.
    PaidToCounterparty,
    /// Final state.
    PaidToInitiator,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DealEvent {
    Init,
    CounterpartyClaim,
    InitiatorClaim,
}

impl DealStatus {
    pub fn is_final(&self) -> bool {
        matches!(self, Self::PaidToCounterparty | Self::PaidToInitiator)
    }

    pub fn transition(self, id: SwapId, event: DealEvent) -> Result<Self, EscrowError> {
        let next = match (self, event) {
            (Self::Uninitialized, DealEvent::Init) => Self::Initialized,
            (_, DealEvent::Init) => return already_initialized(id),
            (Self::Initialized, DealEvent::CounterpartyClaim) => Self::PaidToCounterparty,
            (Self::Initialized, DealEvent::InitiatorClaim) => Self::PaidToInitiator,
            (current, _) => return not_initialized(id, current),
        };

        tracing::debug!(swap_id = %id, from = %self, to = %next, event = ?event, "deal status transition");
        Ok(next)
    }
}

impl fmt::Display for DealStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Uninitialized => write!(f, "Uninitialized"),
            Self::Initialized => write!(f, "Initialized"),
            Self::PaidToCounterparty => write!(f, "PaidToCounterparty"),
            Self::PaidToInitiator => write!(f, "PaidToInitiator"),
        }
    }
}

// ---------------------------------------------------------------------------
// Relay-approved deal
// ---------------------------------------------------------------------------

/// Lifecycle of a relay-approved deal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum RelayDealStatus {
    #[default]
    Uninitialized,
    Initialized,
    /// Released to the receiver, by confirmation or relay approval. Final state.
    PaidToReceiver,
    /// Reclaimed by the initiator after the claim deadline. Final state.
    PaidToInitiator,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayDealEvent {
    Init,
    Confirm,
    Approve,
    InitiatorClaim,
}

impl RelayDealStatus {
    pub fn is_final(&self) -> bool {
        matches!(self, Self::PaidToReceiver | Self::PaidToInitiator)
    }

    /// Valid transitions:
    /// - Uninitialized → Initialized (Init)
    /// - Initialized → PaidToReceiver (Confirm, Approve)
    /// - Initialized → PaidToInitiator (InitiatorClaim)
    pub fn transition(self, id: SwapId, event: RelayDealEvent) -> Result<Self, EscrowError> {
        let next = match (self, event) {
            (Self::Uninitialized, RelayDealEvent::Init) => Self::Initialized,
            (_, RelayDealEvent::Init) => return already_initialized(id),
            (Self::Initialized, RelayDealEvent::Confirm | RelayDealEvent::Approve) => {
                Self::PaidToReceiver
            }
            (Self::Initialized, RelayDealEvent::InitiatorClaim) => Self::PaidToInitiator,
            (current, _) => return not_initialized(id, current),
        };

        tracing::debug!(swap_id = %id, from = %self, to = %next, event = ?event, "relay deal status transition");
        Ok(next)
    }
}

impl fmt::Display for RelayDealStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Uninitialized => write!(f, "Uninitialized"),
            Self::Initialized => write!(f, "Initialized"),
            Self::PaidToReceiver => write!(f, "PaidToReceiver"),
            Self::PaidToInitiator => write!(f, "PaidToInitiator"),
        }
    }
}
