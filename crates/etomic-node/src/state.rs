//! Shared node state for cross-task communication.

use std::sync::Arc;
use std::time::Instant;
use tokio::sync::mpsc;

use etomic_escrow::{Escrow, MemoryLedger};

use crate::commands::NodeCommand;
use crate::replay::ReplayGuard;

/// Shared state for the running node, accessible from HTTP handlers.
///
/// Reads go straight to the engine; every mutation goes through
/// `command_tx` so the event loop stays the only writer.
pub struct NodeState {
    /// When the node started.
    pub start_time: Instant,
    /// The escrow engine.
    pub escrow: Arc<Escrow>,
    /// Reference asset ledger the engine moves funds on.
    pub ledger: Arc<MemoryLedger>,
    /// Channel to send commands to the event loop.
    pub command_tx: mpsc::Sender<NodeCommand>,
    /// Nonces of signed requests already accepted.
    pub replay: ReplayGuard,
}

impl NodeState {
    pub fn new(
        escrow: Arc<Escrow>,
        ledger: Arc<MemoryLedger>,
        command_tx: mpsc::Sender<NodeCommand>,
    ) -> Self {
        Self {
            start_time: Instant::now(),
            escrow,
            ledger,
            command_tx,
            replay: ReplayGuard::new(),
        }
    }

    /// Current engine time, in the configured lock unit.
    pub fn now(&self) -> u64 {
        self.escrow.context.now()
    }
}
