//! Dual-timelock legs for the owner ("Bob") role.
//!
//! The owner first makes a deposit that locks for two deal periods, then a
//! payment that locks for one. On each leg the counterparty may claim with
//! the secret while `now < lock_expiry`; from `lock_expiry` on only the owner
//! may reclaim. The payment leg must expire at least `safety_margin` before
//! the deposit leg does.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use etomic_core::{
    Address, Amount, Asset, Call, Commitment, EscrowError, LegEvent, LegStatus, SwapId,
};
use etomic_crypto::{validate_commitment, verify_secret, HashAlgorithm, Secret};

use crate::engine::EngineContext;
use crate::locks::IdLocks;
use crate::store::RecordStore;

/// Leg commitments are always RIPEMD160 of SHA256.
pub const LEG_ALGORITHM: HashAlgorithm = HashAlgorithm::Dhash160;

/// A stored deposit or payment leg.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LegRecord {
    pub owner: Address,
    pub counterparty: Address,
    pub asset: Asset,
    pub amount: Amount,
    pub commitment: Commitment,
    pub funded_at: u64,
    pub lock_expiry: u64,
    pub status: LegStatus,
}

pub type DepositRecord = LegRecord;
pub type LegPaymentRecord = LegRecord;

/// Which of the two legs an operation targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Leg {
    Deposit,
    Payment,
}

impl std::fmt::Display for Leg {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Deposit => write!(f, "deposit"),
            Self::Payment => write!(f, "payment"),
        }
    }
}

/// Parameters of [`DualLegEscrow::make_deposit`] and
/// [`DualLegEscrow::make_payment`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LegRequest {
    pub id: SwapId,
    pub counterparty: Address,
    pub amount: Amount,
    pub asset: Asset,
    pub commitment: Commitment,
}

/// Parameters of a counterparty claim on either leg.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LegClaimRequest {
    pub id: SwapId,
    pub amount: Amount,
    pub secret: Secret,
    pub asset: Asset,
    pub owner: Address,
}

/// Parameters of an owner reclaim on either leg.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LegReclaimRequest {
    pub id: SwapId,
    pub amount: Amount,
    pub commitment: Commitment,
    pub asset: Asset,
    pub counterparty: Address,
}

/// Deposit and payment legs sharing one identifier space.
pub struct DualLegEscrow {
    ctx: EngineContext,
    deposits: Arc<dyn RecordStore<LegRecord>>,
    payments: Arc<dyn RecordStore<LegRecord>>,
    // One lock per id covers both legs, since making a payment reads the
    // deposit.
    locks: IdLocks,
}

impl DualLegEscrow {
    pub fn new(
        ctx: EngineContext,
        deposits: Arc<dyn RecordStore<LegRecord>>,
        payments: Arc<dyn RecordStore<LegRecord>>,
    ) -> Self {
        Self {
            ctx,
            deposits,
            payments,
            locks: IdLocks::new(),
        }
    }

    fn store(&self, leg: Leg) -> &dyn RecordStore<LegRecord> {
        match leg {
            Leg::Deposit => self.deposits.as_ref(),
            Leg::Payment => self.payments.as_ref(),
        }
    }

    pub fn make_deposit(&self, call: &Call, request: LegRequest) -> Result<LegRecord, EscrowError> {
        self.make(Leg::Deposit, call, request)
    }

    pub fn make_payment(&self, call: &Call, request: LegRequest) -> Result<LegRecord, EscrowError> {
        self.make(Leg::Payment, call, request)
    }

    pub fn counterparty_claims_deposit(
        &self,
        call: &Call,
        request: LegClaimRequest,
    ) -> Result<LegRecord, EscrowError> {
        self.counterparty_claim(Leg::Deposit, call, request)
    }

    pub fn counterparty_claims_payment(
        &self,
        call: &Call,
        request: LegClaimRequest,
    ) -> Result<LegRecord, EscrowError> {
        self.counterparty_claim(Leg::Payment, call, request)
    }

    pub fn owner_reclaims_deposit(
        &self,
        call: &Call,
        request: LegReclaimRequest,
    ) -> Result<LegRecord, EscrowError> {
        self.owner_reclaim(Leg::Deposit, call, request)
    }

    pub fn owner_reclaims_payment(
        &self,
        call: &Call,
        request: LegReclaimRequest,
    ) -> Result<LegRecord, EscrowError> {
        self.owner_reclaim(Leg::Payment, call, request)
    }

    pub fn deposit(&self, id: &SwapId) -> Result<Option<DepositRecord>, EscrowError> {
        self.deposits.load(id)
    }

    pub fn leg_payment(&self, id: &SwapId) -> Result<Option<LegPaymentRecord>, EscrowError> {
        self.payments.load(id)
    }

    /// Fund a leg for `request.counterparty`.
    pub fn make(&self, leg: Leg, call: &Call, request: LegRequest) -> Result<LegRecord, EscrowError> {
        let id = request.id;
        self.locks.with(id, || {
            let store = self.store(leg);
            let current = store
                .load(&id)?
                .map(|record| record.status)
                .unwrap_or_default();
            let status = current.transition(id, LegEvent::Make)?;
            if request.amount == 0 {
                return Err(EscrowError::InvalidAmount);
            }
            validate_commitment(&request.commitment, LEG_ALGORITHM)?;

            let now = self.ctx.now();
            let config = &self.ctx.config;
            let lock_expiry = match leg {
                Leg::Deposit => now.saturating_add(config.deposit_period()),
                Leg::Payment => {
                    let lock_expiry = now.saturating_add(config.payment_period());
                    self.check_deposit_covers(id, call, &request, lock_expiry)?;
                    lock_expiry
                }
            };

            let record = LegRecord {
                owner: call.caller,
                counterparty: request.counterparty,
                asset: request.asset,
                amount: request.amount,
                commitment: request.commitment,
                funded_at: now,
                lock_expiry,
                status,
            };
            let record = self
                .ctx
                .open(store, id, record.asset, record.amount, call, record)?;

            tracing::info!(
                swap_id = %id,
                leg = %leg,
                owner = %record.owner,
                counterparty = %record.counterparty,
                amount = %record.amount,
                lock_expiry = record.lock_expiry,
                "leg made"
            );
            Ok(record)
        })
    }

    /// A payment leg needs a live deposit from the same owner to the same
    /// counterparty whose reclaim window opens at least `safety_margin`
    /// after the payment's claim window closes.
    fn check_deposit_covers(
        &self,
        id: SwapId,
        call: &Call,
        request: &LegRequest,
        payment_lock: u64,
    ) -> Result<(), EscrowError> {
        let deposit = self.deposits.load(&id)?;
        let deposit = match deposit {
            Some(deposit) if deposit.status == LegStatus::Made => deposit,
            other => {
                return Err(EscrowError::NotInitialized {
                    id,
                    status: other.map(|d| d.status).unwrap_or_default().to_string(),
                })
            }
        };
        if deposit.owner != call.caller {
            return Err(EscrowError::Unauthorized {
                id,
                caller: call.caller,
            });
        }
        if deposit.counterparty != request.counterparty {
            return Err(EscrowError::ParameterMismatch {
                id,
                field: "counterparty",
            });
        }
        let margin = self.ctx.config.safety_margin;
        if payment_lock.saturating_add(margin) > deposit.lock_expiry {
            return Err(EscrowError::WindowOverlap {
                id,
                payment_lock,
                deposit_lock: deposit.lock_expiry,
                margin,
            });
        }
        tracing::debug!(
            swap_id = %id,
            payment_lock,
            deposit_lock = deposit.lock_expiry,
            margin,
            "deposit covers payment leg"
        );
        Ok(())
    }

    /// The counterparty takes a leg by revealing the secret before it expires.
    pub fn counterparty_claim(
        &self,
        leg: Leg,
        call: &Call,
        request: LegClaimRequest,
    ) -> Result<LegRecord, EscrowError> {
        let id = request.id;
        self.locks.with(id, || {
            let store = self.store(leg);
            let current = load_made(store, id)?;
            let status = current.status.transition(id, LegEvent::CounterpartyClaim)?;
            if call.caller != current.counterparty {
                return Err(EscrowError::Unauthorized {
                    id,
                    caller: call.caller,
                });
            }
            check_params(id, &current, request.amount, request.asset)?;
            if request.owner != current.owner {
                return Err(EscrowError::ParameterMismatch { id, field: "owner" });
            }
            let now = self.ctx.now();
            if now >= current.lock_expiry {
                return Err(EscrowError::Expired {
                    id,
                    now,
                    expiry: current.lock_expiry,
                });
            }
            if !verify_secret(request.secret.as_bytes(), &current.commitment, LEG_ALGORITHM) {
                return Err(EscrowError::InvalidSecret(id));
            }

            let next = LegRecord {
                status,
                ..current.clone()
            };
            let next = self.ctx.settle(
                store,
                id,
                &current,
                next,
                current.asset,
                current.amount,
                call.caller,
            )?;
            tracing::info!(swap_id = %id, leg = %leg, counterparty = %call.caller, "leg claimed by counterparty");
            Ok(next)
        })
    }

    /// The owner takes a leg back once it has expired.
    pub fn owner_reclaim(
        &self,
        leg: Leg,
        call: &Call,
        request: LegReclaimRequest,
    ) -> Result<LegRecord, EscrowError> {
        let id = request.id;
        self.locks.with(id, || {
            let store = self.store(leg);
            let current = load_made(store, id)?;
            let status = current.status.transition(id, LegEvent::OwnerReclaim)?;
            if call.caller != current.owner {
                return Err(EscrowError::Unauthorized {
                    id,
                    caller: call.caller,
                });
            }
            check_params(id, &current, request.amount, request.asset)?;
            if request.commitment != current.commitment {
                return Err(EscrowError::ParameterMismatch {
                    id,
                    field: "commitment",
                });
            }
            if request.counterparty != current.counterparty {
                return Err(EscrowError::ParameterMismatch {
                    id,
                    field: "counterparty",
                });
            }
            let now = self.ctx.now();
            if now < current.lock_expiry {
                return Err(EscrowError::NotYetExpired {
                    id,
                    now,
                    expiry: current.lock_expiry,
                });
            }

            let next = LegRecord {
                status,
                ..current.clone()
            };
            let next = self.ctx.settle(
                store,
                id,
                &current,
                next,
                current.asset,
                current.amount,
                call.caller,
            )?;
            tracing::info!(swap_id = %id, leg = %leg, owner = %call.caller, "leg reclaimed by owner");
            Ok(next)
        })
    }
}

fn load_made(store: &dyn RecordStore<LegRecord>, id: SwapId) -> Result<LegRecord, EscrowError> {
    store.load(&id)?.ok_or_else(|| EscrowError::NotInitialized {
        id,
        status: LegStatus::Uninitialized.to_string(),
    })
}

fn check_params(
    id: SwapId,
    record: &LegRecord,
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
