//! Relay-approved deals.
//!
//! The initiator locks funds for a receiver until `claim_until`. The receiver
//! is paid either when the initiator confirms or when the configured relay
//! approves after seeing the receiver's side of the trade on a foreign
//! ledger. The receiver asks for approval by raising a signal carrying the
//! foreign transaction reference. After `claim_until` only the initiator can
//! take the funds back.

use std::sync::Arc;

use dashmap::DashMap;
use serde::{Deserialize, Serialize};

use etomic_core::{
    Address, Amount, Asset, Call, EscrowError, ForeignTxRef, RelayDealEvent, RelayDealStatus,
    SwapId,
};

use crate::engine::EngineContext;
use crate::locks::IdLocks;
use crate::store::RecordStore;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelayDealRecord {
    pub initiator: Address,
    pub receiver: Address,
    pub asset: Asset,
    pub amount: Amount,
    pub claim_until: u64,
    pub status: RelayDealStatus,
}

/// A receiver's request for relay approval.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApprovalSignal {
    pub id: SwapId,
    pub foreign_tx: ForeignTxRef,
    pub raised_at: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelayDealRequest {
    pub id: SwapId,
    pub receiver: Address,
    pub amount: Amount,
    pub asset: Asset,
}

/// Parameters of operations that only name the deal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DealRef {
    pub id: SwapId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReceiverClaim {
    pub id: SwapId,
    pub foreign_tx: ForeignTxRef,
}

pub struct RelayDeals {
    ctx: EngineContext,
    deals: Arc<dyn RecordStore<RelayDealRecord>>,
    signals: Arc<dyn RecordStore<ApprovalSignal>>,
    /// Latest signal of every deal still `Initialized`. Updated under the
    /// deal's lock, together with the stores.
    pending: DashMap<SwapId, ApprovalSignal>,
    locks: IdLocks,
}

impl RelayDeals {
    /// Build over existing stores, indexing the signals of deals that are
    /// still open.
    pub fn new(
        ctx: EngineContext,
        deals: Arc<dyn RecordStore<RelayDealRecord>>,
        signals: Arc<dyn RecordStore<ApprovalSignal>>,
    ) -> Result<Self, EscrowError> {
        let pending = DashMap::new();
        for (id, signal) in signals.entries()? {
            let open = deals
                .load(&id)?
                .is_some_and(|deal| deal.status == RelayDealStatus::Initialized);
            if open {
                pending.insert(id, signal);
            }
        }
        tracing::debug!(pending = pending.len(), "relay deal signals indexed");
        Ok(Self {
            ctx,
            deals,
            signals,
            pending,
            locks: IdLocks::new(),
        })
    }

    pub fn relay_address(&self) -> Option<Address> {
        self.ctx.config.relay_address
    }

    pub fn init_deal(
        &self,
        call: &Call,
        request: RelayDealRequest,
    ) -> Result<RelayDealRecord, EscrowError> {
        let id = request.id;
        self.locks.with(id, || {
            let current = self
                .deals
                .load(&id)?
                .map(|record| record.status)
                .unwrap_or_default();
            let status = current.transition(id, RelayDealEvent::Init)?;
            if request.amount == 0 {
                return Err(EscrowError::InvalidAmount);
            }

            let record = RelayDealRecord {
                initiator: call.caller,
                receiver: request.receiver,
                asset: request.asset,
                amount: request.amount,
                claim_until: self.ctx.now().saturating_add(self.ctx.config.deal_period),
                status,
            };
            let record = self.ctx.open(
                self.deals.as_ref(),
                id,
                record.asset,
                record.amount,
                call,
                record,
            )?;
            tracing::info!(
                swap_id = %id,
                initiator = %record.initiator,
                receiver = %record.receiver,
                amount = %record.amount,
                claim_until = record.claim_until,
                "relay deal initialized"
            );
            Ok(record)
        })
    }

    /// The initiator releases the funds to the receiver directly.
    pub fn confirm_deal(&self, call: &Call, deal: DealRef) -> Result<RelayDealRecord, EscrowError> {
        let id = deal.id;
        self.locks.with(id, || {
            let current = self.load_initialized(&id)?;
            let status = current.status.transition(id, RelayDealEvent::Confirm)?;
            if call.caller != current.initiator {
                return Err(EscrowError::Unauthorized {
                    id,
                    caller: call.caller,
                });
            }
            self.check_open(id, &current)?;
            let receiver = current.receiver;
            self.pay_out(id, current, status, receiver)
        })
    }

    /// The receiver reports the foreign transaction that fulfils its side of
    /// the trade. The deal stays `Initialized`; a signal is raised for the
    /// relay. Raising again replaces the reference.
    pub fn receiver_claims_payment(
        &self,
        call: &Call,
        claim: ReceiverClaim,
    ) -> Result<ApprovalSignal, EscrowError> {
        let id = claim.id;
        self.locks.with(id, || {
            let current = self.load_initialized(&id)?;
            if current.status != RelayDealStatus::Initialized {
                return Err(EscrowError::NotInitialized {
                    id,
                    status: current.status.to_string(),
                });
            }
            if call.caller != current.receiver {
                return Err(EscrowError::Unauthorized {
                    id,
                    caller: call.caller,
                });
            }
            if claim.foreign_tx.as_str().trim().is_empty() {
                return Err(EscrowError::Validation(
                    "foreign transaction reference is empty".into(),
                ));
            }
            let now = self.check_open(id, &current)?;

            let signal = ApprovalSignal {
                id,
                foreign_tx: claim.foreign_tx,
                raised_at: now,
            };
            self.signals.save(&id, &signal)?;
            self.pending.insert(id, signal.clone());
            tracing::info!(swap_id = %id, foreign_tx = %signal.foreign_tx, "approval requested");
            Ok(signal)
        })
    }

    /// The relay releases the funds to the receiver.
    pub fn approve(&self, call: &Call, deal: DealRef) -> Result<RelayDealRecord, EscrowError> {
        let id = deal.id;
        self.locks.with(id, || {
            let current = self.load_initialized(&id)?;
            let status = current.status.transition(id, RelayDealEvent::Approve)?;
            if self.relay_address() != Some(call.caller) {
                return Err(EscrowError::Unauthorized {
                    id,
                    caller: call.caller,
                });
            }
            self.check_open(id, &current)?;
            let receiver = current.receiver;
            let record = self.pay_out(id, current, status, receiver)?;
            tracing::info!(swap_id = %id, relay = %call.caller, "relay deal approved");
            Ok(record)
        })
    }

    /// The initiator takes the funds back after the claim deadline.
    pub fn initiator_claims_payment(
        &self,
        call: &Call,
        deal: DealRef,
    ) -> Result<RelayDealRecord, EscrowError> {
        let id = deal.id;
        self.locks.with(id, || {
            let current = self.load_initialized(&id)?;
            let status = current
                .status
                .transition(id, RelayDealEvent::InitiatorClaim)?;
            if call.caller != current.initiator {
                return Err(EscrowError::Unauthorized {
                    id,
                    caller: call.caller,
                });
            }
            let now = self.ctx.now();
            if now < current.claim_until {
                return Err(EscrowError::NotYetExpired {
                    id,
                    now,
                    expiry: current.claim_until,
                });
            }
            let initiator = current.initiator;
            self.pay_out(id, current, status, initiator)
        })
    }

    pub fn relay_deal(&self, id: &SwapId) -> Result<Option<RelayDealRecord>, EscrowError> {
        self.deals.load(id)
    }

    /// Signals whose deal is still waiting for a decision, oldest first.
    pub fn pending_approvals(&self) -> Result<Vec<ApprovalSignal>, EscrowError> {
        let mut pending: Vec<ApprovalSignal> = self
            .pending
            .iter()
            .map(|entry| entry.value().clone())
            .collect();
        pending.sort_by_key(|signal| (signal.raised_at, signal.id));
        Ok(pending)
    }

    /// Reject once the claim deadline has passed; returns the current time.
    fn check_open(&self, id: SwapId, deal: &RelayDealRecord) -> Result<u64, EscrowError> {
        let now = self.ctx.now();
        if now >= deal.claim_until {
            return Err(EscrowError::Expired {
                id,
                now,
                expiry: deal.claim_until,
            });
        }
        Ok(now)
    }

    fn pay_out(
        &self,
        id: SwapId,
        current: RelayDealRecord,
        status: RelayDealStatus,
        to: Address,
    ) -> Result<RelayDealRecord, EscrowError> {
        let next = RelayDealRecord {
            status,
            ..current.clone()
        };
        let next = self.ctx.settle(
            self.deals.as_ref(),
            id,
            &current,
            next,
            current.asset,
            current.amount,
            to,
        )?;
        self.pending.remove(&id);
        tracing::info!(swap_id = %id, to = %to, status = %next.status, "relay deal paid out");
        Ok(next)
    }

    fn load_initialized(&self, id: &SwapId) -> Result<RelayDealRecord, EscrowError> {
        self.deals
            .load(id)?
            .ok_or_else(|| EscrowError::NotInitialized {
                id: *id,
                status: RelayDealStatus::Uninitialized.to_string(),
            })
    }
}
