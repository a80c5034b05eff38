//! Two-secret deals for the initiator ("Alice") role.
//!
//! The initiator locks funds against two commitments: its own and the
//! counterparty's. Revealing the initiator's secret pays the counterparty;
//! revealing the counterparty's secret pays the initiator back. There is no
//! timelock: whichever secret is published first decides the deal.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use etomic_core::{
    Address, Amount, Asset, Call, Commitment, DealEvent, DealStatus, EscrowError, SwapId,
};
use etomic_crypto::{validate_commitment, verify_secret, HashAlgorithm, Secret};

use crate::engine::EngineContext;
use crate::locks::IdLocks;
use crate::store::RecordStore;

pub const DEAL_ALGORITHM: HashAlgorithm = HashAlgorithm::Dhash160;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DealRecord {
    pub initiator: Address,
    pub counterparty: Address,
    pub asset: Asset,
    pub amount: Amount,
    pub initiator_commitment: Commitment,
    pub counterparty_commitment: Commitment,
    pub status: DealStatus,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DealRequest {
    pub id: SwapId,
    pub counterparty: Address,
    pub amount: Amount,
    pub asset: Asset,
    pub initiator_commitment: Commitment,
    pub counterparty_commitment: Commitment,
}

/// The counterparty claims with the initiator's secret.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CounterpartyDealClaim {
    pub id: SwapId,
    pub amount: Amount,
    pub asset: Asset,
    pub initiator: Address,
    pub counterparty_commitment: Commitment,
    pub secret: Secret,
}

/// The initiator takes the funds back with the counterparty's secret.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InitiatorDealClaim {
    pub id: SwapId,
    pub amount: Amount,
    pub asset: Asset,
    pub counterparty: Address,
    pub initiator_commitment: Commitment,
    pub secret: Secret,
}

pub struct TwoSecretDeals {
    ctx: EngineContext,
    store: Arc<dyn RecordStore<DealRecord>>,
    locks: IdLocks,
}

impl TwoSecretDeals {
    pub fn new(ctx: EngineContext, store: Arc<dyn RecordStore<DealRecord>>) -> Self {
        Self {
            ctx,
            store,
            locks: IdLocks::new(),
        }
    }

    pub fn init_deal(&self, call: &Call, request: DealRequest) -> Result<DealRecord, EscrowError> {
        let id = request.id;
        self.locks.with(id, || {
            let current = self
                .store
                .load(&id)?
                .map(|record| record.status)
                .unwrap_or_default();
            let status = current.transition(id, DealEvent::Init)?;
            if request.amount == 0 {
                return Err(EscrowError::InvalidAmount);
            }
            validate_commitment(&request.initiator_commitment, DEAL_ALGORITHM)?;
            validate_commitment(&request.counterparty_commitment, DEAL_ALGORITHM)?;

            let record = DealRecord {
                initiator: call.caller,
                counterparty: request.counterparty,
                asset: request.asset,
                amount: request.amount,
                initiator_commitment: request.initiator_commitment,
                counterparty_commitment: request.counterparty_commitment,
                status,
            };
            let record = self.ctx.open(
                self.store.as_ref(),
                id,
                record.asset,
                record.amount,
                call,
                record,
            )?;
            tracing::info!(
                swap_id = %id,
                initiator = %record.initiator,
                counterparty = %record.counterparty,
                amount = %record.amount,
                "deal initialized"
            );
            Ok(record)
        })
    }

    pub fn counterparty_claims_deal(
        &self,
        call: &Call,
        claim: CounterpartyDealClaim,
    ) -> Result<DealRecord, EscrowError> {
        let id = claim.id;
        self.locks.with(id, || {
            let current = self.load_initialized(&id)?;
            let status = current.status.transition(id, DealEvent::CounterpartyClaim)?;
            if call.caller != current.counterparty {
                return Err(EscrowError::Unauthorized {
                    id,
                    caller: call.caller,
                });
            }
            check_params(id, &current, claim.amount, claim.asset)?;
            if claim.initiator != current.initiator {
                return Err(EscrowError::ParameterMismatch {
                    id,
                    field: "initiator",
                });
            }
            if claim.counterparty_commitment != current.counterparty_commitment {
                return Err(EscrowError::ParameterMismatch {
                    id,
                    field: "counterparty_commitment",
                });
            }
            if !verify_secret(
                claim.secret.as_bytes(),
                &current.initiator_commitment,
                DEAL_ALGORITHM,
            ) {
                return Err(EscrowError::InvalidSecret(id));
            }
            self.pay_out(id, current, status, call.caller)
        })
    }

    pub fn initiator_claims_deal(
        &self,
        call: &Call,
        claim: InitiatorDealClaim,
    ) -> Result<DealRecord, EscrowError> {
        let id = claim.id;
        self.locks.with(id, || {
            let current = self.load_initialized(&id)?;
            let status = current.status.transition(id, DealEvent::InitiatorClaim)?;
            if call.caller != current.initiator {
                return Err(EscrowError::Unauthorized {
                    id,
                    caller: call.caller,
                });
            }
            check_params(id, &current, claim.amount, claim.asset)?;
            if claim.counterparty != current.counterparty {
                return Err(EscrowError::ParameterMismatch {
                    id,
                    field: "counterparty",
                });
            }
            if claim.initiator_commitment != current.initiator_commitment {
                return Err(EscrowError::ParameterMismatch {
                    id,
                    field: "initiator_commitment",
                });
            }
            if !verify_secret(
                claim.secret.as_bytes(),
                &current.counterparty_commitment,
                DEAL_ALGORITHM,
            ) {
                return Err(EscrowError::InvalidSecret(id));
            }
            self.pay_out(id, current, status, call.caller)
        })
    }

    pub fn deal(&self, id: &SwapId) -> Result<Option<DealRecord>, EscrowError> {
        self.store.load(id)
    }

    fn pay_out(
        &self,
        id: SwapId,
        current: DealRecord,
        status: DealStatus,
        to: Address,
    ) -> Result<DealRecord, EscrowError> {
        let next = DealRecord {
            status,
            ..current.clone()
        };
        let next = self.ctx.settle(
            self.store.as_ref(),
            id,
            &current,
            next,
            current.asset,
            current.amount,
            to,
        )?;
        tracing::info!(swap_id = %id, to = %to, status = %next.status, "deal paid out");
        Ok(next)
    }

    fn load_initialized(&self, id: &SwapId) -> Result<DealRecord, EscrowError> {
        self.store
            .load(id)?
            .ok_or_else(|| EscrowError::NotInitialized {
                id: *id,
                status: DealStatus::Uninitialized.to_string(),
            })
    }
}

fn check_params(
    id: SwapId,
    record: &DealRecord,
    amount: Amount,
    asset: Asset,
) -> Result<(), EscrowError> {
    if amount != record.amount {
        return Err(EscrowError::AmountMismatch {
            expected: record.amount,
            actual: amount,
        });
    }
    if asset != record.asset {
        return Err(EscrowError::ParameterMismatch { id, field: "asset" });
    }
    Ok(())
}
