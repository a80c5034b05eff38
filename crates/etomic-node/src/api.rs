//! HTTP API server for the Etomic node.
//!
//! Reads are served straight from the engine. Every mutation arrives as a
//! [`SignedRequest`]; the handler authenticates the caller for the route's
//! operation, refuses reused nonces, checks that the path names the same
//! swap as the body, and hands the operation to the event loop.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::{oneshot, watch};

use etomic_core::{Address, Amount, Asset, Call, EscrowError, LockUnit, SwapId};
use etomic_crypto::{CryptoError, Operation, SignedRequest};
use etomic_escrow::{
    ApprovalSignal, CounterpartyDealClaim, DealRecord, DealRef, DealRequest, InitiatorDealClaim,
    Leg, LegClaimRequest, LegReclaimRequest, LegRecord, LegRequest, PaymentRecord,
    PaymentRequest, ReceiverClaim, RefundRequest, RelayDealRecord, RelayDealRequest,
    SpendRequest,
};

use crate::commands::{
    AllowanceRequest, AllowanceResponse, NodeCommand, RecordResponse, Reply,
};
use crate::state::NodeState;

// --- Response types ---

#[derive(Serialize)]
pub struct StatusResponse {
    pub version: String,
    pub lock_unit: LockUnit,
    pub now: u64,
    pub deal_period: u64,
    pub safety_margin: u64,
    pub relay_address: Option<Address>,
    pub escrow_account: Address,
    pub uptime_secs: u64,
}

#[derive(Serialize)]
pub struct ApprovalsResponse {
    pub approvals: Vec<ApprovalSignal>,
    pub count: usize,
}

#[derive(Deserialize)]
pub struct BalanceQuery {
    pub account: Address,
    #[serde(default)]
    pub asset: Option<Asset>,
}

#[derive(Serialize)]
pub struct BalanceResponse {
    pub account: Address,
    pub asset: Asset,
    pub balance: Amount,
}

#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
}

type ApiError = (StatusCode, Json<ErrorResponse>);
type ApiResult<T> = Result<Json<T>, ApiError>;

fn api_error(status: StatusCode, error: impl Into<String>) -> ApiError {
    (
        status,
        Json(ErrorResponse {
            error: error.into(),
        }),
    )
}

/// HTTP status for an engine rejection.
pub fn status_for(err: &EscrowError) -> StatusCode {
    match err {
        EscrowError::Unauthorized { .. } => StatusCode::FORBIDDEN,
        EscrowError::AlreadyInitialized(_) | EscrowError::NotInitialized { .. } => {
            StatusCode::CONFLICT
        }
        EscrowError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        _ => StatusCode::BAD_REQUEST,
    }
}

fn escrow_error(err: EscrowError) -> ApiError {
    api_error(status_for(&err), err.to_string())
}

/// Authenticate a signed request for `operation`, consume its nonce, and
/// decode its body.
fn open<T: serde::de::DeserializeOwned>(
    state: &NodeState,
    operation: Operation,
    request: &SignedRequest,
) -> Result<(Call, T), ApiError> {
    let now = chrono::Utc::now().timestamp();
    let (call, body) = request.open(operation, now).map_err(|e| {
        tracing::warn!(
            public_key = %request.public_key,
            %operation,
            error = %e,
            "rejected request"
        );
        match e {
            CryptoError::InvalidInput(_) => api_error(StatusCode::BAD_REQUEST, e.to_string()),
            _ => api_error(StatusCode::UNAUTHORIZED, e.to_string()),
        }
    })?;
    if !state
        .replay
        .admit(call.caller, request.nonce, request.expires_at, now)
    {
        tracing::warn!(
            caller = %call.caller,
            nonce = request.nonce,
            %operation,
            "replayed request"
        );
        return Err(api_error(
            StatusCode::UNAUTHORIZED,
            format!("nonce {} already used", request.nonce),
        ));
    }
    Ok((call, body))
}

fn check_id(path: SwapId, body: SwapId) -> Result<(), ApiError> {
    if path != body {
        return Err(api_error(
            StatusCode::BAD_REQUEST,
            format!("path id {} does not match body id {}", path, body),
        ));
    }
    Ok(())
}

fn found<T>(id: SwapId, record: Result<Option<T>, EscrowError>) -> ApiResult<RecordResponse<T>> {
    match record.map_err(escrow_error)? {
        Some(record) => Ok(Json(RecordResponse { id, record })),
        None => Err(api_error(
            StatusCode::NOT_FOUND,
            format!("no record for {}", id),
        )),
    }
}

/// Helper to send a command and await the reply.
async fn send_command_and_await<T>(
    state: &Arc<NodeState>,
    command: impl FnOnce(Reply<T>) -> NodeCommand,
) -> Result<T, ApiError> {
    let (reply_tx, reply_rx) = oneshot::channel();
    state
        .command_tx
        .send(command(reply_tx))
        .await
        .map_err(|_| {
            api_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "node event loop not running",
            )
        })?;

    match reply_rx.await {
        Ok(result) => result.map_err(escrow_error),
        Err(_) => Err(api_error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "event loop dropped the reply channel",
        )),
    }
}

// --- Handlers ---

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".into(),
    })
}

async fn handle_status(State(state): State<Arc<NodeState>>) -> Json<StatusResponse> {
    let config = &state.escrow.context.config;
    Json(StatusResponse {
        version: env!("CARGO_PKG_VERSION").to_string(),
        lock_unit: config.lock_unit,
        now: state.now(),
        deal_period: config.deal_period,
        safety_margin: config.safety_margin,
        relay_address: config.relay_address,
        escrow_account: config.escrow_account,
        uptime_secs: state.start_time.elapsed().as_secs(),
    })
}

// Payments

async fn handle_pay(
    State(state): State<Arc<NodeState>>,
    Json(req): Json<SignedRequest>,
) -> ApiResult<RecordResponse<PaymentRecord>> {
    let (call, request): (Call, PaymentRequest) = open(&state, Operation::Pay, &req)?;
    let id = request.id;
    let record = send_command_and_await(&state, |reply| NodeCommand::Pay {
        call,
        request,
        reply,
    })
    .await?;
    Ok(Json(RecordResponse { id, record }))
}

async fn handle_spend(
    State(state): State<Arc<NodeState>>,
    Path(id): Path<SwapId>,
    Json(req): Json<SignedRequest>,
) -> ApiResult<RecordResponse<PaymentRecord>> {
    let (call, request): (Call, SpendRequest) = open(&state, Operation::SpendPayment, &req)?;
    check_id(id, request.id)?;
    let record = send_command_and_await(&state, |reply| NodeCommand::SpendPayment {
        call,
        request,
        reply,
    })
    .await?;
    Ok(Json(RecordResponse { id, record }))
}

async fn handle_refund(
    State(state): State<Arc<NodeState>>,
    Path(id): Path<SwapId>,
    Json(req): Json<SignedRequest>,
) -> ApiResult<RecordResponse<PaymentRecord>> {
    let (call, request): (Call, RefundRequest) = open(&state, Operation::RefundPayment, &req)?;
    check_id(id, request.id)?;
    let record = send_command_and_await(&state, |reply| NodeCommand::RefundPayment {
        call,
        request,
        reply,
    })
    .await?;
    Ok(Json(RecordResponse { id, record }))
}

async fn handle_get_payment(
    State(state): State<Arc<NodeState>>,
    Path(id): Path<SwapId>,
) -> ApiResult<RecordResponse<PaymentRecord>> {
    found(id, state.escrow.payments.payment(&id))
}

// Deposit and payment legs

#[derive(Clone, Copy)]
enum LegAction {
    Make,
    Claim,
    Reclaim,
}

/// Each leg signs its own operations, so an envelope for one leg is
/// refused by the other.
fn leg_operation(leg: Leg, action: LegAction) -> Operation {
    match (leg, action) {
        (Leg::Deposit, LegAction::Make) => Operation::MakeDeposit,
        (Leg::Deposit, LegAction::Claim) => Operation::ClaimDeposit,
        (Leg::Deposit, LegAction::Reclaim) => Operation::ReclaimDeposit,
        (Leg::Payment, LegAction::Make) => Operation::MakeLegPayment,
        (Leg::Payment, LegAction::Claim) => Operation::ClaimLegPayment,
        (Leg::Payment, LegAction::Reclaim) => Operation::ReclaimLegPayment,
    }
}

async fn make_leg(
    leg: Leg,
    state: Arc<NodeState>,
    req: SignedRequest,
) -> ApiResult<RecordResponse<LegRecord>> {
    let (call, request): (Call, LegRequest) =
        open(&state, leg_operation(leg, LegAction::Make), &req)?;
    let id = request.id;
    let record = send_command_and_await(&state, |reply| NodeCommand::MakeLeg {
        leg,
        call,
        request,
        reply,
    })
    .await?;
    Ok(Json(RecordResponse { id, record }))
}

async fn claim_leg(
    leg: Leg,
    state: Arc<NodeState>,
    id: SwapId,
    req: SignedRequest,
) -> ApiResult<RecordResponse<LegRecord>> {
    let (call, request): (Call, LegClaimRequest) =
        open(&state, leg_operation(leg, LegAction::Claim), &req)?;
    check_id(id, request.id)?;
    let record = send_command_and_await(&state, |reply| NodeCommand::ClaimLeg {
        leg,
        call,
        request,
        reply,
    })
    .await?;
    Ok(Json(RecordResponse { id, record }))
}

async fn reclaim_leg(
    leg: Leg,
    state: Arc<NodeState>,
    id: SwapId,
    req: SignedRequest,
) -> ApiResult<RecordResponse<LegRecord>> {
    let (call, request): (Call, LegReclaimRequest) =
        open(&state, leg_operation(leg, LegAction::Reclaim), &req)?;
    check_id(id, request.id)?;
    let record = send_command_and_await(&state, |reply| NodeCommand::ReclaimLeg {
        leg,
        call,
        request,
        reply,
    })
    .await?;
    Ok(Json(RecordResponse { id, record }))
}

async fn handle_make_deposit(
    State(state): State<Arc<NodeState>>,
    Json(req): Json<SignedRequest>,
) -> ApiResult<RecordResponse<LegRecord>> {
    make_leg(Leg::Deposit, state, req).await
}

async fn handle_claim_deposit(
    State(state): State<Arc<NodeState>>,
    Path(id): Path<SwapId>,
    Json(req): Json<SignedRequest>,
) -> ApiResult<RecordResponse<LegRecord>> {
    claim_leg(Leg::Deposit, state, id, req).await
}

async fn handle_reclaim_deposit(
    State(state): State<Arc<NodeState>>,
    Path(id): Path<SwapId>,
    Json(req): Json<SignedRequest>,
) -> ApiResult<RecordResponse<LegRecord>> {
    reclaim_leg(Leg::Deposit, state, id, req).await
}

async fn handle_get_deposit(
    State(state): State<Arc<NodeState>>,
    Path(id): Path<SwapId>,
) -> ApiResult<RecordResponse<LegRecord>> {
    found(id, state.escrow.legs.deposit(&id))
}

async fn handle_make_leg_payment(
    State(state): State<Arc<NodeState>>,
    Json(req): Json<SignedRequest>,
) -> ApiResult<RecordResponse<LegRecord>> {
    make_leg(Leg::Payment, state, req).await
}

async fn handle_claim_leg_payment(
    State(state): State<Arc<NodeState>>,
    Path(id): Path<SwapId>,
    Json(req): Json<SignedRequest>,
) -> ApiResult<RecordResponse<LegRecord>> {
    claim_leg(Leg::Payment, state, id, req).await
}

async fn handle_reclaim_leg_payment(
    State(state): State<Arc<NodeState>>,
    Path(id): Path<SwapId>,
    Json(req): Json<SignedRequest>,
) -> ApiResult<RecordResponse<LegRecord>> {
    reclaim_leg(Leg::Payment, state, id, req).await
}

async fn handle_get_leg_payment(
    State(state): State<Arc<NodeState>>,
    Path(id): Path<SwapId>,
) -> ApiResult<RecordResponse<LegRecord>> {
    found(id, state.escrow.legs.leg_payment(&id))
}

// Two-secret deals

async fn handle_init_deal(
    State(state): State<Arc<NodeState>>,
    Json(req): Json<SignedRequest>,
) -> ApiResult<RecordResponse<DealRecord>> {
    let (call, request): (Call, DealRequest) = open(&state, Operation::InitDeal, &req)?;
    let id = request.id;
    let record = send_command_and_await(&state, |reply| NodeCommand::InitDeal {
        call,
        request,
        reply,
    })
    .await?;
    Ok(Json(RecordResponse { id, record }))
}

async fn handle_counterparty_claim_deal(
    State(state): State<Arc<NodeState>>,
    Path(id): Path<SwapId>,
    Json(req): Json<SignedRequest>,
) -> ApiResult<RecordResponse<DealRecord>> {
    let (call, request): (Call, CounterpartyDealClaim) =
        open(&state, Operation::CounterpartyClaimDeal, &req)?;
    check_id(id, request.id)?;
    let record = send_command_and_await(&state, |reply| NodeCommand::CounterpartyClaimDeal {
        call,
        request,
        reply,
    })
    .await?;
    Ok(Json(RecordResponse { id, record }))
}

async fn handle_initiator_claim_deal(
    State(state): State<Arc<NodeState>>,
    Path(id): Path<SwapId>,
    Json(req): Json<SignedRequest>,
) -> ApiResult<RecordResponse<DealRecord>> {
    let (call, request): (Call, InitiatorDealClaim) =
        open(&state, Operation::InitiatorClaimDeal, &req)?;
    check_id(id, request.id)?;
    let record = send_command_and_await(&state, |reply| NodeCommand::InitiatorClaimDeal {
        call,
        request,
        reply,
    })
    .await?;
    Ok(Json(RecordResponse { id, record }))
}

async fn handle_get_deal(
    State(state): State<Arc<NodeState>>,
    Path(id): Path<SwapId>,
) -> ApiResult<RecordResponse<DealRecord>> {
    found(id, state.escrow.deals.deal(&id))
}

// Relay deals

async fn handle_init_relay_deal(
    State(state): State<Arc<NodeState>>,
    Json(req): Json<SignedRequest>,
) -> ApiResult<RecordResponse<RelayDealRecord>> {
    let (call, request): (Call, RelayDealRequest) = open(&state, Operation::InitRelayDeal, &req)?;
    let id = request.id;
    let record = send_command_and_await(&state, |reply| NodeCommand::InitRelayDeal {
        call,
        request,
        reply,
    })
    .await?;
    Ok(Json(RecordResponse { id, record }))
}

async fn handle_confirm_relay_deal(
    State(state): State<Arc<NodeState>>,
    Path(id): Path<SwapId>,
    Json(req): Json<SignedRequest>,
) -> ApiResult<RecordResponse<RelayDealRecord>> {
    let (call, deal): (Call, DealRef) = open(&state, Operation::ConfirmRelayDeal, &req)?;
    check_id(id, deal.id)?;
    let record = send_command_and_await(&state, |reply| NodeCommand::ConfirmRelayDeal {
        call,
        deal,
        reply,
    })
    .await?;
    Ok(Json(RecordResponse { id, record }))
}

async fn handle_claim_relay_deal(
    State(state): State<Arc<NodeState>>,
    Path(id): Path<SwapId>,
    Json(req): Json<SignedRequest>,
) -> ApiResult<ApprovalSignal> {
    let (call, claim): (Call, ReceiverClaim) = open(&state, Operation::ClaimRelayDeal, &req)?;
    check_id(id, claim.id)?;
    let signal = send_command_and_await(&state, |reply| NodeCommand::ClaimRelayDeal {
        call,
        claim,
        reply,
    })
    .await?;
    Ok(Json(signal))
}

async fn handle_approve_relay_deal(
    State(state): State<Arc<NodeState>>,
    Path(id): Path<SwapId>,
    Json(req): Json<SignedRequest>,
) -> ApiResult<RecordResponse<RelayDealRecord>> {
    let (call, deal): (Call, DealRef) = open(&state, Operation::ApproveRelayDeal, &req)?;
    check_id(id, deal.id)?;
    let record = send_command_and_await(&state, |reply| NodeCommand::ApproveRelayDeal {
        call,
        deal,
        reply,
    })
    .await?;
    Ok(Json(RecordResponse { id, record }))
}

async fn handle_refund_relay_deal(
    State(state): State<Arc<NodeState>>,
    Path(id): Path<SwapId>,
    Json(req): Json<SignedRequest>,
) -> ApiResult<RecordResponse<RelayDealRecord>> {
    let (call, deal): (Call, DealRef) = open(&state, Operation::RefundRelayDeal, &req)?;
    check_id(id, deal.id)?;
    let record = send_command_and_await(&state, |reply| NodeCommand::RefundRelayDeal {
        call,
        deal,
        reply,
    })
    .await?;
    Ok(Json(RecordResponse { id, record }))
}

async fn handle_get_relay_deal(
    State(state): State<Arc<NodeState>>,
    Path(id): Path<SwapId>,
) -> ApiResult<RecordResponse<RelayDealRecord>> {
    found(id, state.escrow.relay_deals.relay_deal(&id))
}

async fn handle_approvals(State(state): State<Arc<NodeState>>) -> ApiResult<ApprovalsResponse> {
    let approvals = state
        .escrow
        .relay_deals
        .pending_approvals()
        .map_err(escrow_error)?;
    let count = approvals.len();
    Ok(Json(ApprovalsResponse { approvals, count }))
}

// Reference ledger

async fn handle_ledger_approve(
    State(state): State<Arc<NodeState>>,
    Json(req): Json<SignedRequest>,
) -> ApiResult<AllowanceResponse> {
    let (call, request): (Call, AllowanceRequest) = open(&state, Operation::LedgerApprove, &req)?;
    let allowance = send_command_and_await(&state, |reply| NodeCommand::ApproveAllowance {
        call,
        request,
        reply,
    })
    .await?;
    Ok(Json(allowance))
}

async fn handle_ledger_balance(
    State(state): State<Arc<NodeState>>,
    Query(query): Query<BalanceQuery>,
) -> Json<BalanceResponse> {
    let asset = query.asset.unwrap_or(Asset::Native);
    Json(BalanceResponse {
        account: query.account,
        asset,
        balance: state.ledger.balance_of(asset, query.account),
    })
}

// --- Server ---

pub fn build_router(state: Arc<NodeState>) -> Router {
    Router::new()
        .route("/api/v1/health", get(handle_health))
        .route("/api/v1/status", get(handle_status))
        .route("/api/v1/payments", post(handle_pay))
        .route("/api/v1/payments/{id}", get(handle_get_payment))
        .route("/api/v1/payments/{id}/spend", post(handle_spend))
        .route("/api/v1/payments/{id}/refund", post(handle_refund))
        .route("/api/v1/deposits", post(handle_make_deposit))
        .route("/api/v1/deposits/{id}", get(handle_get_deposit))
        .route("/api/v1/deposits/{id}/claim", post(handle_claim_deposit))
        .route("/api/v1/deposits/{id}/reclaim", post(handle_reclaim_deposit))
        .route("/api/v1/legs", post(handle_make_leg_payment))
        .route("/api/v1/legs/{id}", get(handle_get_leg_payment))
        .route("/api/v1/legs/{id}/claim", post(handle_claim_leg_payment))
        .route("/api/v1/legs/{id}/reclaim", post(handle_reclaim_leg_payment))
        .route("/api/v1/deals", post(handle_init_deal))
        .route("/api/v1/deals/{id}", get(handle_get_deal))
        .route(
            "/api/v1/deals/{id}/counterparty-claim",
            post(handle_counterparty_claim_deal),
        )
        .route(
            "/api/v1/deals/{id}/initiator-claim",
            post(handle_initiator_claim_deal),
        )
        .route("/api/v1/relay-deals", post(handle_init_relay_deal))
        .route("/api/v1/relay-deals/{id}", get(handle_get_relay_deal))
        .route(
            "/api/v1/relay-deals/{id}/confirm",
            post(handle_confirm_relay_deal),
        )
        .route("/api/v1/relay-deals/{id}/claim", post(handle_claim_relay_deal))
        .route(
            "/api/v1/relay-deals/{id}/approve",
            post(handle_approve_relay_deal),
        )
        .route(
            "/api/v1/relay-deals/{id}/refund",
            post(handle_refund_relay_deal),
        )
        .route("/api/v1/approvals", get(handle_approvals))
        .route("/api/v1/ledger/approve", post(handle_ledger_approve))
        .route("/api/v1/ledger/balance", get(handle_ledger_balance))
        .with_state(state)
}

/// Serve the API until `shutdown` flips to true or its sender goes away.
pub async fn serve(
    listener: tokio::net::TcpListener,
    state: Arc<NodeState>,
    mut shutdown: watch::Receiver<bool>,
) -> anyhow::Result<()> {
    let app = build_router(state);
    let listen_addr = listener.local_addr()?;
    tracing::info!(%listen_addr, "HTTP API server started");
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            while !*shutdown.borrow() {
                if shutdown.changed().await.is_err() {
                    break;
                }
            }
        })
        .await?;
    tracing::info!(%listen_addr, "HTTP API server stopped");
    Ok(())
}
