//! The Etomic node orchestrator.
//!
//! Opens the record stores, builds the escrow engine over them, and runs the
//! HTTP API, the height clock and the relay worker in background tasks. All
//! mutations funnel through the main event loop.
//!
//! The height clock and the reference ledger live alongside the records in
//! RocksDB, so a restarted node resumes from where it stopped instead of from
//! genesis.

use anyhow::Result;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use etomic_core::{Amount, EngineConfig, EscrowError, LockUnit, SwapId};
use etomic_crypto::KeyPair;
use etomic_escrow::{Clock, EngineContext, Escrow, ManualClock, MemoryLedger, SystemClock};
use etomic_relay::{JsonRpcForeignLedger, Relay};

use crate::commands::{AllowanceResponse, NodeCommand, Reply};
use crate::config::EtomicConfig;
use crate::relay::NodeEngine;
use crate::state::NodeState;
use crate::storage::Storage;

/// The Etomic node, hosting one escrow engine.
pub struct EtomicNode {
    /// Node configuration, with the relay address resolved.
    config: EtomicConfig,
    /// Reference asset ledger.
    ledger: Arc<MemoryLedger>,
    /// Engine clock.
    clock: Arc<dyn Clock>,
    /// Set when the engine locks by height; ticked by a background task.
    height: Option<Arc<ManualClock>>,
    /// Persistent storage.
    storage: Option<Storage>,
    /// The engine, once started.
    escrow: Option<Arc<Escrow>>,
    /// Shared state accessible from HTTP handlers.
    node_state: Option<Arc<NodeState>>,
    /// Receives commands from the HTTP API and the relay.
    command_rx: Option<mpsc::Receiver<NodeCommand>>,
    /// Stops the background tasks.
    shutdown_tx: Option<watch::Sender<bool>>,
    /// Background tasks, awaited on shutdown.
    tasks: Vec<JoinHandle<()>>,
}

/// How long shutdown waits for a background task to finish.
const TASK_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

impl EtomicNode {
    /// Create a new node with the given config.
    pub fn new(mut config: EtomicConfig) -> Result<Self> {
        if config.relay.enabled {
            let path = config.relay.key_path.clone().ok_or_else(|| {
                anyhow::anyhow!("relay.key_path must be set when the relay is enabled")
            })?;
            let relay = Self::load_or_generate_relay_key(&path)?.address();
            match config.engine.relay_address {
                Some(configured) if configured != relay => anyhow::bail!(
                    "engine.relay_address {} does not match the relay key address {}",
                    configured,
                    relay
                ),
                _ => config.engine.relay_address = Some(relay),
            }
        }

        let (clock, height): (Arc<dyn Clock>, Option<Arc<ManualClock>>) =
            match config.engine.lock_unit {
                LockUnit::Height => {
                    let height = Arc::new(ManualClock::new(config.clock.start_height));
                    (height.clone() as Arc<dyn Clock>, Some(height))
                }
                LockUnit::Timestamp => (Arc::new(SystemClock) as Arc<dyn Clock>, None),
            };

        let ledger = Arc::new(MemoryLedger::new(config.engine.escrow_account));
        for account in &config.ledger.accounts {
            ledger.mint(account.asset, account.address, Amount::from(account.amount))?;
        }

        tracing::info!(
            lock_unit = %config.engine.lock_unit,
            deal_period = config.engine.deal_period,
            relay = ?config.engine.relay_address,
            genesis_accounts = config.ledger.accounts.len(),
            "Etomic node created"
        );

        Ok(Self {
            config,
            ledger,
            clock,
            height,
            storage: None,
            escrow: None,
            node_state: None,
            command_rx: None,
            shutdown_tx: None,
            tasks: Vec::new(),
        })
    }

    /// Initialize and start the node: storage, engine, HTTP API, clock, relay.
    pub async fn start(&mut self) -> Result<()> {
        tracing::info!("starting Etomic node");

        // Initialize storage
        let storage = Storage::open(&self.config.storage.data_dir)?;
        tracing::info!(path = %self.config.storage.data_dir.display(), "storage initialized");
        self.resume(&storage)?;

        let context = EngineContext::new(
            self.config.engine.clone(),
            self.clock.clone(),
            self.ledger.clone(),
        );
        let escrow = Arc::new(Escrow::new(context, storage.escrow_stores())?);

        // Create the NodeCommand channel (HTTP API / relay -> main event loop)
        let (command_tx, command_rx) = mpsc::channel::<NodeCommand>(256);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        // Create shared state
        let node_state = Arc::new(NodeState::new(
            escrow.clone(),
            self.ledger.clone(),
            command_tx,
        ));

        // Spawn the HTTP API server
        let api_addr: SocketAddr = self.config.api_addr().parse()?;
        let listener = tokio::net::TcpListener::bind(api_addr).await?;
        let api_state = node_state.clone();
        let api_shutdown = shutdown_rx.clone();
        self.tasks.push(tokio::spawn(async move {
            if let Err(e) = crate::api::serve(listener, api_state, api_shutdown).await {
                tracing::error!(error = %e, "HTTP API server error");
            }
        }));

        if let Some(height) = self.height.clone() {
            let interval = self.config.block_interval();
            self.tasks.push(tokio::spawn(tick_height(
                height,
                storage.clone(),
                interval,
                shutdown_rx.clone(),
            )));
        }

        if self.config.relay.enabled {
            self.spawn_relay(node_state.clone(), shutdown_rx)?;
        }

        // Store handles
        self.storage = Some(storage);
        self.escrow = Some(escrow);
        self.node_state = Some(node_state);
        self.command_rx = Some(command_rx);
        self.shutdown_tx = Some(shutdown_tx);

        Ok(())
    }

    /// Pick up the height clock and the ledger books from a previous run.
    fn resume(&self, storage: &Storage) -> Result<()> {
        if let Some(height) = &self.height {
            if let Some(stored) = storage.load_height()? {
                if stored > height.now() {
                    height.set(stored);
                }
                tracing::info!(height = height.now(), stored, "height clock resumed");
            }
        }

        match storage.load_ledger()? {
            Some(snapshot) => {
                tracing::info!(
                    balances = snapshot.balances.len(),
                    allowances = snapshot.allowances.len(),
                    "ledger books restored; genesis accounts ignored"
                );
                self.ledger.restore(snapshot);
            }
            None if storage.has_records()? => anyhow::bail!(
                "{} holds escrow records but no ledger books; refusing to start from genesis",
                self.config.storage.data_dir.display()
            ),
            None => storage.save_ledger(&self.ledger.snapshot())?,
        }
        Ok(())
    }

    fn spawn_relay(
        &mut self,
        state: Arc<NodeState>,
        shutdown: watch::Receiver<bool>,
    ) -> Result<()> {
        let relay_config = &self.config.relay;
        let relay_address = self
            .config
            .engine
            .relay_address
            .ok_or_else(|| anyhow::anyhow!("relay address not resolved"))?;
        let oracle = JsonRpcForeignLedger::new(
            relay_config.rpc_url.clone(),
            relay_config.rpc_auth(),
            Duration::from_secs(relay_config.rpc_timeout_secs),
        )?;
        let engine = Arc::new(NodeEngine::new(state, relay_address));
        let relay = Relay::new(
            Arc::new(oracle),
            engine.clone(),
            engine,
            relay_config.worker_config(),
        );
        tracing::info!(relay = %relay_address, rpc_url = %relay_config.rpc_url, "relay worker enabled");
        self.tasks
            .push(tokio::spawn(async move { relay.run(shutdown).await }));
        Ok(())
    }

    /// Run the node's main event loop: applies commands from the API and the relay.
    pub async fn run(&mut self) -> Result<()> {
        let mut command_rx = self
            .command_rx
            .take()
            .ok_or_else(|| anyhow::anyhow!("node not started"))?;
        let escrow = self
            .escrow
            .clone()
            .ok_or_else(|| anyhow::anyhow!("node not started"))?;
        let storage = self
            .storage
            .clone()
            .ok_or_else(|| anyhow::anyhow!("node not started"))?;
        let ledger = self.ledger.clone();

        tracing::info!("entering main event loop");

        while let Some(cmd) = command_rx.recv().await {
            apply_command(&escrow, &ledger, &storage, cmd);
        }
        tracing::info!("command channel closed");

        Ok(())
    }

    /// Gracefully shut down the node.
    pub async fn shutdown(&mut self) -> Result<()> {
        tracing::info!("shutting down Etomic node");

        if let Some(shutdown_tx) = self.shutdown_tx.take() {
            let _ = shutdown_tx.send(true);
        }
        self.node_state = None;
        self.escrow = None;
        self.command_rx = None;

        for task in self.tasks.drain(..) {
            if tokio::time::timeout(TASK_SHUTDOWN_TIMEOUT, task).await.is_err() {
                tracing::warn!("background task did not stop in time");
            }
        }

        if let Some(storage) = self.storage.take() {
            if let Some(height) = &self.height {
                storage.save_height(height.now())?;
            }
            storage.save_ledger(&self.ledger.snapshot())?;
            drop(storage);
            tracing::info!("storage closed");
        }

        tracing::info!("Etomic node shut down");
        Ok(())
    }

    /// Engine parameters, with the relay address resolved.
    pub fn engine_config(&self) -> &EngineConfig {
        &self.config.engine
    }

    pub fn ledger(&self) -> &Arc<MemoryLedger> {
        &self.ledger
    }

    /// Shared state, once started.
    pub fn state(&self) -> Option<Arc<NodeState>> {
        self.node_state.clone()
    }

    /// Load the relay key from disk, or generate and save a new one.
    fn load_or_generate_relay_key(path: &Path) -> Result<KeyPair> {
        if path.exists() {
            let contents = std::fs::read_to_string(path)?;
            let keypair = KeyPair::from_hex(&contents)
                .map_err(|e| anyhow::anyhow!("failed to decode relay key: {}", e))?;
            tracing::info!(path = %path.display(), "loaded relay key from disk");
            Ok(keypair)
        } else {
            let keypair = KeyPair::generate();
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(path, hex::encode(keypair.secret_bytes()))?;
            tracing::info!(path = %path.display(), "generated and saved new relay key");
            Ok(keypair)
        }
    }
}

/// Advance the height clock once per block interval until shutdown, saving
/// each new height.
async fn tick_height(
    height: Arc<ManualClock>,
    storage: Storage,
    interval: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut ticker = tokio::time::interval(interval);
    // The first tick completes immediately.
    ticker.tick().await;
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let now = height.advance(1);
                tracing::trace!(height = now, "height advanced");
                if let Err(e) = storage.save_height(now) {
                    tracing::error!(height = now, error = %e, "failed to persist height");
                }
            }
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
            }
        }
    }
}

fn respond<T>(op: &'static str, id: SwapId, reply: Reply<T>, result: Result<T, EscrowError>) {
    if let Err(e) = &result {
        tracing::warn!(op, swap_id = %id, error = %e, "operation rejected");
    }
    if reply.send(result).is_err() {
        tracing::debug!(op, swap_id = %id, "caller went away before the reply");
    }
}

/// Apply one command, then save the ledger books it may have moved.
fn apply_command(escrow: &Escrow, ledger: &MemoryLedger, storage: &Storage, cmd: NodeCommand) {
    handle_command(escrow, ledger, cmd);
    if let Err(e) = storage.save_ledger(&ledger.snapshot()) {
        tracing::error!(error = %e, "failed to persist ledger books");
    }
}

/// Apply one command to the engine and answer on its reply channel.
pub(crate) fn handle_command(escrow: &Escrow, ledger: &MemoryLedger, cmd: NodeCommand) {
    let op = cmd.name();
    match cmd {
        NodeCommand::Pay {
            call,
            request,
            reply,
        } => {
            let id = request.id;
            respond(op, id, reply, escrow.payments.pay(&call, request));
        }
        NodeCommand::SpendPayment {
            call,
            request,
            reply,
        } => {
            let id = request.id;
            respond(op, id, reply, escrow.payments.receiver_spend(&call, request));
        }
        NodeCommand::RefundPayment {
            call,
            request,
            reply,
        } => {
            let id = request.id;
            respond(op, id, reply, escrow.payments.sender_refund(&call, request));
        }
        NodeCommand::MakeLeg {
            leg,
            call,
            request,
            reply,
        } => {
            let id = request.id;
            respond(op, id, reply, escrow.legs.make(leg, &call, request));
        }
        NodeCommand::ClaimLeg {
            leg,
            call,
            request,
            reply,
        } => {
            let id = request.id;
            respond(op, id, reply, escrow.legs.counterparty_claim(leg, &call, request));
        }
        NodeCommand::ReclaimLeg {
            leg,
            call,
            request,
            reply,
        } => {
            let id = request.id;
            respond(op, id, reply, escrow.legs.owner_reclaim(leg, &call, request));
        }
        NodeCommand::InitDeal {
            call,
            request,
            reply,
        } => {
            let id = request.id;
            respond(op, id, reply, escrow.deals.init_deal(&call, request));
        }
        NodeCommand::CounterpartyClaimDeal {
            call,
            request,
            reply,
        } => {
            let id = request.id;
            respond(op, id, reply, escrow.deals.counterparty_claims_deal(&call, request));
        }
        NodeCommand::InitiatorClaimDeal {
            call,
            request,
            reply,
        } => {
            let id = request.id;
            respond(op, id, reply, escrow.deals.initiator_claims_deal(&call, request));
        }
        NodeCommand::InitRelayDeal {
            call,
            request,
            reply,
        } => {
            let id = request.id;
            respond(op, id, reply, escrow.relay_deals.init_deal(&call, request));
        }
        NodeCommand::ConfirmRelayDeal { call, deal, reply } => {
            respond(op, deal.id, reply, escrow.relay_deals.confirm_deal(&call, deal));
        }
        NodeCommand::ClaimRelayDeal { call, claim, reply } => {
            let id = claim.id;
            respond(
                op,
                id,
                reply,
                escrow.relay_deals.receiver_claims_payment(&call, claim),
            );
        }
        NodeCommand::ApproveRelayDeal { call, deal, reply } => {
            respond(op, deal.id, reply, escrow.relay_deals.approve(&call, deal));
        }
        NodeCommand::RefundRelayDeal { call, deal, reply } => {
            respond(
                op,
                deal.id,
                reply,
                escrow.relay_deals.initiator_claims_payment(&call, deal),
            );
        }
        NodeCommand::ApproveAllowance {
            call,
            request,
            reply,
        } => {
            let result = if call.value != 0 {
                Err(EscrowError::AmountMismatch {
                    expected: 0,
                    actual: call.value,
                })
            } else {
                let spender = request.spender.unwrap_or(ledger.escrow_account());
                ledger.approve(request.token, call.caller, spender, request.amount);
                tracing::info!(
                    token = %request.token,
                    owner = %call.caller,
                    spender = %spender,
                    amount = %request.amount,
                    "allowance set"
                );
                Ok(AllowanceResponse {
                    token: request.token,
                    owner: call.caller,
                    spender,
                    allowance: ledger.allowance(request.token, call.caller, spender),
                })
            };
            if let Err(e) = &result {
                tracing::warn!(op, owner = %call.caller, error = %e, "operation rejected");
            }
            let _ = reply.send(result);
        }
    }
}
