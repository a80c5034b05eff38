use std::sync::Arc;

use async_trait::async_trait;

use etomic_core::{Address, Call, SwapId};
use etomic_escrow::{ApprovalSignal, DealRef, Escrow};

use crate::error::RelayError;

/// Where the relay reads pending approval signals from.
#[async_trait]
pub trait SignalSource: Send + Sync {
    async fn pending_approvals(&self) -> Result<Vec<ApprovalSignal>, RelayError>;
}

/// Where the relay submits approvals. Engine rejections come back as
/// [`RelayError::Rejected`].
#[async_trait]
pub trait ApprovalSink: Send + Sync {
    async fn approve(&self, id: SwapId) -> Result<(), RelayError>;
}

/// Direct access to an in-process engine, acting as `relay`.
#[derive(Clone)]
pub struct LocalEngine {
    escrow: Arc<Escrow>,
    relay: Address,
}

impl LocalEngine {
    pub fn new(escrow: Arc<Escrow>, relay: Address) -> Self {
        Self { escrow, relay }
    }
}

#[async_trait]
impl SignalSource for LocalEngine {
    async fn pending_approvals(&self) -> Result<Vec<ApprovalSignal>, RelayError> {
        Ok(self.escrow.relay_deals.pending_approvals()?)
    }
}

#[async_trait]
impl ApprovalSink for LocalEngine {
    async fn approve(&self, id: SwapId) -> Result<(), RelayError> {
        self.escrow
            .relay_deals
            .approve(&Call::new(self.relay), DealRef { id })?;
        Ok(())
    }
}
