//! Commands dispatched from the HTTP API and the relay to the node event loop.

use serde::{Deserialize, Serialize};
use tokio::sync::oneshot;

use etomic_core::{Address, Amount, Call, EscrowError, SwapId};
use etomic_escrow::{
    ApprovalSignal, CounterpartyDealClaim, DealRecord, DealRef, DealRequest, InitiatorDealClaim,
    Leg, LegClaimRequest, LegReclaimRequest, LegRecord, LegRequest, PaymentRecord,
    PaymentRequest, ReceiverClaim, RefundRequest, RelayDealRecord, RelayDealRequest,
    SpendRequest,
};

/// Channel the event loop answers a command on.
pub type Reply<T> = oneshot::Sender<Result<T, EscrowError>>;

/// A state-changing operation, with the authenticated caller.
pub enum NodeCommand {
    Pay {
        call: Call,
        request: PaymentRequest,
        reply: Reply<PaymentRecord>,
    },
    SpendPayment {
        call: Call,
        request: SpendRequest,
        reply: Reply<PaymentRecord>,
    },
    RefundPayment {
        call: Call,
        request: RefundRequest,
        reply: Reply<PaymentRecord>,
    },
    MakeLeg {
        leg: Leg,
        call: Call,
        request: LegRequest,
        reply: Reply<LegRecord>,
    },
    ClaimLeg {
        leg: Leg,
        call: Call,
        request: LegClaimRequest,
        reply: Reply<LegRecord>,
    },
    ReclaimLeg {
        leg: Leg,
        call: Call,
        request: LegReclaimRequest,
        reply: Reply<LegRecord>,
    },
    InitDeal {
        call: Call,
        request: DealRequest,
        reply: Reply<DealRecord>,
    },
    CounterpartyClaimDeal {
        call: Call,
        request: CounterpartyDealClaim,
        reply: Reply<DealRecord>,
    },
    InitiatorClaimDeal {
        call: Call,
        request: InitiatorDealClaim,
        reply: Reply<DealRecord>,
    },
    InitRelayDeal {
        call: Call,
        request: RelayDealRequest,
        reply: Reply<RelayDealRecord>,
    },
    ConfirmRelayDeal {
        call: Call,
        deal: DealRef,
        reply: Reply<RelayDealRecord>,
    },
    ClaimRelayDeal {
        call: Call,
        claim: ReceiverClaim,
        reply: Reply<ApprovalSignal>,
    },
    ApproveRelayDeal {
        call: Call,
        deal: DealRef,
        reply: Reply<RelayDealRecord>,
    },
    RefundRelayDeal {
        call: Call,
        deal: DealRef,
        reply: Reply<RelayDealRecord>,
    },
    /// Set the caller's token allowance on the reference ledger.
    ApproveAllowance {
        call: Call,
        request: AllowanceRequest,
        reply: Reply<AllowanceResponse>,
    },
}

impl NodeCommand {
    /// Operation name for logs.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Pay { .. } => "pay",
            Self::SpendPayment { .. } => "receiver_spend",
            Self::RefundPayment { .. } => "sender_refund",
            Self::MakeLeg { .. } => "make_leg",
            Self::ClaimLeg { .. } => "counterparty_claim_leg",
            Self::ReclaimLeg { .. } => "owner_reclaim_leg",
            Self::InitDeal { .. } => "init_deal",
            Self::CounterpartyClaimDeal { .. } => "counterparty_claims_deal",
            Self::InitiatorClaimDeal { .. } => "initiator_claims_deal",
            Self::InitRelayDeal { .. } => "init_relay_deal",
            Self::ConfirmRelayDeal { .. } => "confirm_deal",
            Self::ClaimRelayDeal { .. } => "receiver_claims_payment",
            Self::ApproveRelayDeal { .. } => "approve",
            Self::RefundRelayDeal { .. } => "initiator_claims_payment",
            Self::ApproveAllowance { .. } => "ledger_approve",
        }
    }
}

/// Body of `POST /api/v1/ledger/approve`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllowanceRequest {
    pub token: Address,
    /// Defaults to the escrow account.
    #[serde(default)]
    pub spender: Option<Address>,
    pub amount: Amount,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllowanceResponse {
    pub token: Address,
    pub owner: Address,
    pub spender: Address,
    pub allowance: Amount,
}

/// A record together with the id it is stored under.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordResponse<T> {
    pub id: SwapId,
    pub record: T,
}
