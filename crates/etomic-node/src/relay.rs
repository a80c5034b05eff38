//! Wiring between the relay worker and the running node.

use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::oneshot;

use etomic_core::{Address, Call, SwapId};
use etomic_escrow::{ApprovalSignal, DealRef};
use etomic_relay::{ApprovalSink, RelayError, SignalSource};

use crate::commands::NodeCommand;
use crate::state::NodeState;

/// Reads signals from the engine and submits approvals through the node
/// event loop, signed as the relay.
pub struct NodeEngine {
    state: Arc<NodeState>,
    relay: Address,
}

impl NodeEngine {
    pub fn new(state: Arc<NodeState>, relay: Address) -> Self {
        Self { state, relay }
    }
}

#[async_trait]
impl SignalSource for NodeEngine {
    async fn pending_approvals(&self) -> Result<Vec<ApprovalSignal>, RelayError> {
        Ok(self.state.escrow.relay_deals.pending_approvals()?)
    }
}

#[async_trait]
impl ApprovalSink for NodeEngine {
    async fn approve(&self, id: SwapId) -> Result<(), RelayError> {
        let (reply, reply_rx) = oneshot::channel();
        let cmd = NodeCommand::ApproveRelayDeal {
            call: Call::new(self.relay),
            deal: DealRef { id },
            reply,
        };
        self.state
            .command_tx
            .send(cmd)
            .await
            .map_err(|_| RelayError::Unavailable("node event loop not running".into()))?;
        reply_rx
            .await
            .map_err(|_| RelayError::Unavailable("event loop dropped the reply channel".into()))??;
        Ok(())
    }
}
