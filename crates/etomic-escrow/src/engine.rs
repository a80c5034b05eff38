use std::sync::Arc;

use etomic_core::{Address, Amount, Asset, Call, EngineConfig, EscrowError, SwapId};

use crate::clock::Clock;
use crate::deal::{DealRecord, TwoSecretDeals};
use crate::deposit::{DualLegEscrow, LegRecord};
use crate::ledger::AssetLedger;
use crate::payment::{HtlcPayments, PaymentRecord};
use crate::relay_deal::{ApprovalSignal, RelayDealRecord, RelayDeals};
use crate::store::{MemoryStore, RecordStore};

/// Collaborators shared by every escrow variant of one engine instance.
#[derive(Clone)]
pub struct EngineContext {
    pub config: EngineConfig,
    pub clock: Arc<dyn Clock>,
    pub ledger: Arc<dyn AssetLedger>,
}

impl EngineContext {
    pub fn new(config: EngineConfig, clock: Arc<dyn Clock>, ledger: Arc<dyn AssetLedger>) -> Self {
        Self {
            config,
            clock,
            ledger,
        }
    }

    pub fn now(&self) -> u64 {
        self.clock.now()
    }

    /// Lock the caller's funds, then persist the new record. If the write
    /// fails the funds go back to the caller.
    pub(crate) fn open<R>(
        &self,
        store: &dyn RecordStore<R>,
        id: SwapId,
        asset: Asset,
        amount: Amount,
        call: &Call,
        record: R,
    ) -> Result<R, EscrowError> {
        self.ledger.lock(asset, amount, call)?;
        if let Err(err) = store.save(&id, &record) {
            if let Err(refund_err) = self.ledger.release(asset, amount, call.caller) {
                tracing::error!(
                    swap_id = %id,
                    error = %refund_err,
                    "failed to return locked funds after a storage error"
                );
            }
            return Err(err);
        }
        Ok(record)
    }

    /// Persist the terminal record, then pay out. If the payout fails the
    /// previous record is restored, so funds move at most once.
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn settle<R>(
        &self,
        store: &dyn RecordStore<R>,
        id: SwapId,
        previous: &R,
        next: R,
        asset: Asset,
        amount: Amount,
        to: Address,
    ) -> Result<R, EscrowError> {
        store.save(&id, &next)?;
        if let Err(err) = self.ledger.release(asset, amount, to) {
            if let Err(restore_err) = store.save(&id, previous) {
                tracing::error!(
                    swap_id = %id,
                    error = %restore_err,
                    "failed to restore record after a rejected payout"
                );
            }
            return Err(match err {
                EscrowError::AssetTransferFailed(_) => err,
                other => EscrowError::AssetTransferFailed(other.to_string()),
            });
        }
        Ok(next)
    }
}

/// Storage backing every record family.
#[derive(Clone)]
pub struct EscrowStores {
    pub payments: Arc<dyn RecordStore<PaymentRecord>>,
    pub deposits: Arc<dyn RecordStore<LegRecord>>,
    pub legs: Arc<dyn RecordStore<LegRecord>>,
    pub deals: Arc<dyn RecordStore<DealRecord>>,
    pub relay_deals: Arc<dyn RecordStore<RelayDealRecord>>,
    pub signals: Arc<dyn RecordStore<ApprovalSignal>>,
}

impl EscrowStores {
    pub fn in_memory() -> Self {
        Self {
            payments: Arc::new(MemoryStore::new()),
            deposits: Arc::new(MemoryStore::new()),
            legs: Arc::new(MemoryStore::new()),
            deals: Arc::new(MemoryStore::new()),
            relay_deals: Arc::new(MemoryStore::new()),
            signals: Arc::new(MemoryStore::new()),
        }
    }
}

/// The complete escrow engine: one state machine per record family over a
/// shared clock and asset ledger.
pub struct Escrow {
    pub context: EngineContext,
    pub payments: HtlcPayments,
    pub legs: DualLegEscrow,
    pub deals: TwoSecretDeals,
    pub relay_deals: RelayDeals,
}

impl Escrow {
    pub fn new(context: EngineContext, stores: EscrowStores) -> Result<Self, EscrowError> {
        if !context.config.windows_are_separated() {
            return Err(EscrowError::Validation(format!(
                "safety margin {} does not fit between the payment lock ({}) and the deposit lock ({})",
                context.config.safety_margin,
                context.config.payment_period(),
                context.config.deposit_period()
            )));
        }
        Ok(Self {
            payments: HtlcPayments::new(context.clone(), stores.payments),
            legs: DualLegEscrow::new(context.clone(), stores.deposits, stores.legs),
            deals: TwoSecretDeals::new(context.clone(), stores.deals),
            relay_deals: RelayDeals::new(context.clone(), stores.relay_deals, stores.signals)?,
            context,
        })
    }

    pub fn in_memory(
        config: EngineConfig,
        clock: Arc<dyn Clock>,
        ledger: Arc<dyn AssetLedger>,
    ) -> Result<Self, EscrowError> {
        Self::new(
            EngineContext::new(config, clock, ledger),
            EscrowStores::in_memory(),
        )
    }
}
