//! Generic hash-time-locked payments.
//!
//! The sender locks an asset for a receiver against a hash commitment. The
//! receiver can spend at any time by revealing the secret; once the lock
//! expires the sender can refund instead. Whichever terminal call lands first
//! wins.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use etomic_core::{
    Address, Amount, Asset, Call, Commitment, EscrowError, PaymentEvent, PaymentStatus, SwapId,
};
use etomic_crypto::{validate_commitment, verify_secret, HashAlgorithm, Secret};

use crate::engine::EngineContext;
use crate::locks::IdLocks;
use crate::store::RecordStore;

/// A stored HTLC payment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentRecord {
    pub sender: Address,
    pub receiver: Address,
    pub asset: Asset,
    pub amount: Amount,
    pub lock_expiry: u64,
    pub algorithm: HashAlgorithm,
    pub commitment: Commitment,
    pub status: PaymentStatus,
}

/// Parameters of [`HtlcPayments::pay`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentRequest {
    pub id: SwapId,
    pub receiver: Address,
    pub amount: Amount,
    pub asset: Asset,
    pub lock_expiry: u64,
    /// Wire code of the hash algorithm.
    pub algorithm: u8,
    pub commitment: Commitment,
}

/// Parameters of [`HtlcPayments::receiver_spend`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpendRequest {
    pub id: SwapId,
    pub amount: Amount,
    pub secret: Secret,
    pub asset: Asset,
    pub sender: Address,
}

/// Parameters of [`HtlcPayments::sender_refund`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefundRequest {
    pub id: SwapId,
    pub amount: Amount,
    pub commitment: Commitment,
    pub asset: Asset,
    pub receiver: Address,
}

/// HTLC payment state machine.
pub struct HtlcPayments {
    ctx: EngineContext,
    store: Arc<dyn RecordStore<PaymentRecord>>,
    locks: IdLocks,
}

impl HtlcPayments {
    pub fn new(ctx: EngineContext, store: Arc<dyn RecordStore<PaymentRecord>>) -> Self {
        Self {
            ctx,
            store,
            locks: IdLocks::new(),
        }
    }

    /// Lock funds for `request.receiver`. Covers both native and token
    /// payments; the asset decides which.
    pub fn pay(&self, call: &Call, request: PaymentRequest) -> Result<PaymentRecord, EscrowError> {
        let id = request.id;
        self.locks.with(id, || {
            let current = self.status_of(&id)?;
            let status = current.transition(id, PaymentEvent::Fund)?;
            if request.amount == 0 {
                return Err(EscrowError::InvalidAmount);
            }
            let algorithm = HashAlgorithm::from_code(request.algorithm)?;
            validate_commitment(&request.commitment, algorithm)?;

            let record = PaymentRecord {
                sender: call.caller,
                receiver: request.receiver,
                asset: request.asset,
                amount: request.amount,
                lock_expiry: request.lock_expiry,
                algorithm,
                commitment: request.commitment,
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
                sender = %record.sender,
                receiver = %record.receiver,
                asset = %record.asset,
                amount = %record.amount,
                lock_expiry = record.lock_expiry,
                algorithm = %record.algorithm,
                "payment sent"
            );
            Ok(record)
        })
    }

    /// Release the funds to the receiver on presentation of the secret.
    ///
    /// There is no expiry check: the receiver may spend even after the lock
    /// expired, as long as the sender has not refunded first.
    pub fn receiver_spend(
        &self,
        call: &Call,
        request: SpendRequest,
    ) -> Result<PaymentRecord, EscrowError> {
        let id = request.id;
        self.locks.with(id, || {
            let current = self.load_sent(&id)?;
            let status = current.status.transition(id, PaymentEvent::ReceiverSpend)?;
            if call.caller != current.receiver {
                return Err(EscrowError::Unauthorized {
                    id,
                    caller: call.caller,
                });
            }
            check_params(id, &current, request.amount, request.asset)?;
            if request.sender != current.sender {
                return Err(EscrowError::ParameterMismatch { id, field: "sender" });
            }
            tracing::debug!(swap_id = %id, "payment guards passed, verifying secret");
            if !verify_secret(request.secret.as_bytes(), &current.commitment, current.algorithm) {
                return Err(EscrowError::InvalidSecret(id));
            }

            let next = PaymentRecord {
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
                call.caller,
            )?;
            tracing::info!(swap_id = %id, receiver = %call.caller, status = %next.status, "payment spent by receiver");
            Ok(next)
        })
    }

    /// Return the funds to the sender once the lock has expired.
    pub fn sender_refund(
        &self,
        call: &Call,
        request: RefundRequest,
    ) -> Result<PaymentRecord, EscrowError> {
        let id = request.id;
        self.locks.with(id, || {
            let current = self.load_sent(&id)?;
            let status = current.status.transition(id, PaymentEvent::SenderRefund)?;
            if call.caller != current.sender {
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
            if request.receiver != current.receiver {
                return Err(EscrowError::ParameterMismatch {
                    id,
                    field: "receiver",
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

            let next = PaymentRecord {
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
                call.caller,
            )?;
            tracing::info!(swap_id = %id, sender = %call.caller, status = %next.status, "payment refunded to sender");
            Ok(next)
        })
    }

    pub fn payment(&self, id: &SwapId) -> Result<Option<PaymentRecord>, EscrowError> {
        self.store.load(id)
    }

    fn status_of(&self, id: &SwapId) -> Result<PaymentStatus, EscrowError> {
        Ok(self
            .store
            .load(id)?
            .map(|record| record.status)
            .unwrap_or_default())
    }

    fn load_sent(&self, id: &SwapId) -> Result<PaymentRecord, EscrowError> {
        self.store
            .load(id)?
            .ok_or_else(|| EscrowError::NotInitialized {
                id: *id,
                status: PaymentStatus::Uninitialized.to_string(),
            })
    }
}

fn check_params(
    id: SwapId,
    record: &PaymentRecord,
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
