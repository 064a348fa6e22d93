//! # REST + WebSocket API
//!
//! Builds the axum router that exposes the escrow node's HTTP interface.
//! All endpoints share application state through axum's `State` extractor.
//!
//! ## Endpoints
//!
//! | Method | Path                          | Description                          |
//! |--------|-------------------------------|--------------------------------------|
//! | GET    | `/health`                     | Liveness probe                       |
//! | GET    | `/status`                     | Node status summary                  |
//! | GET    | `/ws`                         | WebSocket for live escrow events     |
//! | POST   | `/transactions`               | Create a transaction (caller=buyer)  |
//! | GET    | `/transactions`               | Transaction count                    |
//! | GET    | `/transactions/:id`           | Transaction record                   |
//! | POST   | `/transactions/:id/deposit`   | Buyer deposits the purchase amount   |
//! | POST   | `/transactions/:id/confirm`   | Buyer confirms delivery              |
//! | POST   | `/transactions/:id/dispute`   | Buyer or seller contests delivery    |
//! | POST   | `/transactions/:id/resolve`   | Arbitrator rules on a dispute        |
//! | POST   | `/withdrawals`                | Caller pulls their pending balance   |
//! | GET    | `/withdrawals/:address`       | Pending balance of an address        |
//! | GET    | `/accounts/:address`          | Settled (paid-out) balance           |
//! | GET    | `/config`                     | Arbitrator, fee rate, accrued fees   |
//! | POST   | `/config/arbitrator`          | Owner replaces the arbitrator        |
//! | POST   | `/config/fee-rate`            | Owner retunes the fee rate           |
//! | POST   | `/config/fees/withdraw`       | Owner withdraws accrued fees         |
//!
//! ## Caller Identity
//!
//! Mutating requests declare the calling address in the request body. On
//! devnet the declaration is trusted as-is; in production the transport
//! layer authenticates callers (signed requests verified against the
//! declared public key) before the engine ever sees them.

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Path, State,
    },
    http::{Method, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::{broadcast, RwLock};
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use vela_protocol::config::PROTOCOL_FINGERPRINT;
use vela_protocol::escrow::{
    EscrowEngine, EscrowError, EscrowEvent, EscrowTransaction, WithdrawOutcome,
};
use vela_protocol::runtime::{Address, CallContext, MemorySettlement};

use crate::metrics::SharedMetrics;

// ---------------------------------------------------------------------------
// Application State
// ---------------------------------------------------------------------------

/// Shared application state available to all request handlers.
///
/// Cheap to clone — everything behind `Arc`.
#[derive(Clone)]
pub struct AppState {
    /// The node's reported version string.
    pub version: String,
    /// Network identifier (e.g., "devnet", "testnet").
    pub network: String,
    /// The escrow engine. The write lock serializes mutating calls, which
    /// is exactly the atomic-execution guarantee the engine asks of its
    /// runtime.
    pub engine: Arc<RwLock<EscrowEngine>>,
    /// Devnet settlement backend for outbound payouts.
    pub settlement: Arc<RwLock<MemorySettlement>>,
    /// Broadcast channel for live event notifications.
    pub event_tx: broadcast::Sender<EscrowEvent>,
    /// Reference to Prometheus metrics for in-handler recording.
    pub metrics: SharedMetrics,
}

// ---------------------------------------------------------------------------
// Router Construction
// ---------------------------------------------------------------------------

/// Builds the full axum [`Router`] with all API routes, CORS, and tracing.
///
/// The returned router is ready to be served on the configured RPC port.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health_handler))
        .route("/status", get(status_handler))
        .route("/ws", get(ws_handler))
        .route(
            "/transactions",
            post(create_transaction_handler).get(transaction_count_handler),
        )
        .route("/transactions/:id", get(get_transaction_handler))
        .route("/transactions/:id/deposit", post(deposit_handler))
        .route("/transactions/:id/confirm", post(confirm_handler))
        .route("/transactions/:id/dispute", post(dispute_handler))
        .route("/transactions/:id/resolve", post(resolve_handler))
        .route("/withdrawals", post(withdraw_handler))
        .route("/withdrawals/:address", get(pending_withdrawal_handler))
        .route("/accounts/:address", get(account_handler))
        .route("/config", get(config_handler))
        .route("/config/arbitrator", post(change_arbitrator_handler))
        .route("/config/fee-rate", post(change_fee_rate_handler))
        .route("/config/fees/withdraw", post(withdraw_fees_handler))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors),
        )
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Request Types
// ---------------------------------------------------------------------------

/// Body for `POST /transactions`.
#[derive(Debug, Deserialize)]
pub struct CreateTransactionRequest {
    /// The calling address — becomes the transaction's buyer.
    pub caller: String,
    /// The seller the funds will be escrowed for.
    pub seller: String,
}

/// Body for `POST /transactions/:id/deposit`.
#[derive(Debug, Deserialize)]
pub struct DepositRequest {
    /// The calling address — must be the buyer.
    pub caller: String,
    /// Value in photons attached to the call.
    pub value: u64,
}

/// Body for operations that carry only the calling address.
#[derive(Debug, Deserialize)]
pub struct CallerRequest {
    /// The calling address.
    pub caller: String,
}

/// Body for `POST /transactions/:id/resolve`.
#[derive(Debug, Deserialize)]
pub struct ResolveRequest {
    /// The calling address — must be the arbitrator.
    pub caller: String,
    /// `true` releases to the seller (fee applies); `false` refunds the
    /// buyer in full.
    pub release_to_seller: bool,
}

/// Body for `POST /config/arbitrator`.
#[derive(Debug, Deserialize)]
pub struct ChangeArbitratorRequest {
    /// The calling address — must be the owner.
    pub caller: String,
    /// The replacement arbitrator.
    pub arbitrator: String,
}

/// Body for `POST /config/fee-rate`.
#[derive(Debug, Deserialize)]
pub struct ChangeFeeRateRequest {
    /// The calling address — must be the owner.
    pub caller: String,
    /// The new fee rate in basis points.
    pub fee_rate_bps: u32,
}

// ---------------------------------------------------------------------------
// Response Types
// ---------------------------------------------------------------------------

/// Response payload for `GET /status`.
#[derive(Debug, Serialize, Deserialize)]
pub struct StatusResponse {
    /// Node software version.
    pub version: String,
    /// Protocol family fingerprint.
    pub fingerprint: String,
    /// Network identifier.
    pub network: String,
    /// Transactions ever created.
    pub transaction_count: u64,
    /// Accrued, not-yet-withdrawn protocol fees in photons.
    pub collected_fees: u64,
    /// Sum of all pending withdrawal balances in photons.
    pub total_pending: u128,
    /// ISO-8601 timestamp of the response.
    pub timestamp: String,
}

/// Response payload for transaction creation.
#[derive(Debug, Serialize, Deserialize)]
pub struct CreatedResponse {
    /// The new transaction's ID.
    pub id: u64,
}

/// Response payload for `GET /transactions`.
#[derive(Debug, Serialize, Deserialize)]
pub struct TransactionCountResponse {
    /// Transactions ever created.
    pub count: u64,
}

/// Response payload for a transaction record.
#[derive(Debug, Serialize, Deserialize)]
pub struct TransactionResponse {
    /// Transaction ID.
    pub id: u64,
    /// Buyer address.
    pub buyer: String,
    /// Seller address.
    pub seller: String,
    /// Escrowed amount in photons (zero until deposited).
    pub amount: u64,
    /// Lifecycle state name.
    pub state: String,
    /// Creation timestamp (ISO-8601).
    pub created_at: String,
    /// Terminal timestamp (ISO-8601), if the record is terminal.
    pub completed_at: Option<String>,
}

impl TransactionResponse {
    fn from_record(record: &EscrowTransaction) -> Self {
        Self {
            id: record.id,
            buyer: record.buyer.as_str().to_string(),
            seller: record.seller.as_str().to_string(),
            amount: record.amount,
            state: record.state.to_string(),
            created_at: record.created_at.to_rfc3339(),
            completed_at: record.completed_at.map(|t| t.to_rfc3339()),
        }
    }
}

/// Response payload for `POST /withdrawals`.
#[derive(Debug, Serialize, Deserialize)]
pub struct WithdrawResponse {
    /// "paid" if the payout succeeded, "restored" if the transfer failed
    /// and the pending balance was put back.
    pub outcome: String,
    /// The amount involved, in photons.
    pub amount: u64,
}

/// Response payload for `GET /withdrawals/:address`.
#[derive(Debug, Serialize, Deserialize)]
pub struct PendingWithdrawalResponse {
    /// The queried address.
    pub address: String,
    /// Pending (withdrawable) balance in photons.
    pub pending: u64,
}

/// Response payload for `GET /accounts/:address`.
#[derive(Debug, Serialize, Deserialize)]
pub struct AccountResponse {
    /// The queried address.
    pub address: String,
    /// Value settled (paid out) to this address, in photons.
    pub settled_balance: u64,
}

/// Response payload for `GET /config`.
#[derive(Debug, Serialize, Deserialize)]
pub struct ConfigResponse {
    /// Current arbitrator address.
    pub arbitrator: String,
    /// Current fee rate in basis points.
    pub fee_rate_bps: u32,
    /// Accrued, not-yet-withdrawn protocol fees in photons.
    pub collected_fees: u64,
}

/// Generic error body returned by REST endpoints on failure.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

// ---------------------------------------------------------------------------
// Error Mapping
// ---------------------------------------------------------------------------

/// Maps an engine rejection to an HTTP status.
fn error_status(err: &EscrowError) -> StatusCode {
    match err {
        EscrowError::Unauthorized { .. } => StatusCode::FORBIDDEN,
        EscrowError::InvalidState { .. } | EscrowError::NothingToWithdraw => StatusCode::CONFLICT,
        EscrowError::TransactionNotFound(_) => StatusCode::NOT_FOUND,
        EscrowError::InvalidParty(_)
        | EscrowError::InvalidAmount
        | EscrowError::FeeRateOutOfBounds { .. } => StatusCode::BAD_REQUEST,
        EscrowError::BalanceOverflow { .. } => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn reject(err: EscrowError) -> Response {
    let status = error_status(&err);
    (
        status,
        Json(ErrorResponse {
            error: err.to_string(),
        }),
    )
        .into_response()
}

/// Fans drained engine events out to metrics, logs, and WebSocket
/// subscribers.
fn publish(state: &AppState, events: Vec<EscrowEvent>) {
    for event in events {
        state.metrics.record(&event);
        tracing::info!(?event, "escrow event");
        let _ = state.event_tx.send(event);
    }
}

/// A call context for the declared caller, stamped with the node's clock.
fn context(caller: &str) -> CallContext {
    CallContext::new(Address::new(caller), chrono::Utc::now())
}

// ---------------------------------------------------------------------------
// Probe Handlers
// ---------------------------------------------------------------------------

/// `GET /health` — returns 200 if the node is alive.
///
/// This is the liveness probe for orchestrators (k8s, systemd, etc.). It
/// intentionally does not check internal subsystem health — that belongs
/// in `/status`.
async fn health_handler() -> impl IntoResponse {
    (StatusCode::OK, Json(serde_json::json!({ "status": "ok" })))
}

/// `GET /status` — returns a custody and configuration summary.
async fn status_handler(State(state): State<AppState>) -> impl IntoResponse {
    let engine = state.engine.read().await;
    Json(StatusResponse {
        version: state.version.clone(),
        fingerprint: PROTOCOL_FINGERPRINT.to_string(),
        network: state.network.clone(),
        transaction_count: engine.transaction_count(),
        collected_fees: engine.collected_fees(),
        total_pending: engine.total_pending(),
        timestamp: chrono::Utc::now().to_rfc3339(),
    })
}

// ---------------------------------------------------------------------------
// Transaction Lifecycle Handlers
// ---------------------------------------------------------------------------

/// `POST /transactions` — creates a transaction; the caller becomes the
/// buyer.
async fn create_transaction_handler(
    State(state): State<AppState>,
    Json(req): Json<CreateTransactionRequest>,
) -> Response {
    let mut engine = state.engine.write().await;
    match engine.create_transaction(&context(&req.caller), Address::new(req.seller)) {
        Ok(id) => {
            publish(&state, engine.take_events());
            (StatusCode::CREATED, Json(CreatedResponse { id })).into_response()
        }
        Err(err) => reject(err),
    }
}

/// `GET /transactions` — the number of transactions ever created.
async fn transaction_count_handler(State(state): State<AppState>) -> impl IntoResponse {
    let engine = state.engine.read().await;
    Json(TransactionCountResponse {
        count: engine.transaction_count(),
    })
}

/// `GET /transactions/:id` — a single transaction record.
async fn get_transaction_handler(
    State(state): State<AppState>,
    Path(id): Path<u64>,
) -> Response {
    let engine = state.engine.read().await;
    match engine.transaction(id) {
        Ok(record) => Json(TransactionResponse::from_record(record)).into_response(),
        Err(err) => reject(err),
    }
}

/// `POST /transactions/:id/deposit` — the buyer funds the escrow.
async fn deposit_handler(
    State(state): State<AppState>,
    Path(id): Path<u64>,
    Json(req): Json<DepositRequest>,
) -> Response {
    let ctx = context(&req.caller).with_value(req.value);
    let mut engine = state.engine.write().await;
    match engine.deposit_payment(&ctx, id) {
        Ok(()) => {
            publish(&state, engine.take_events());
            StatusCode::NO_CONTENT.into_response()
        }
        Err(err) => reject(err),
    }
}

/// `POST /transactions/:id/confirm` — the buyer confirms delivery.
async fn confirm_handler(
    State(state): State<AppState>,
    Path(id): Path<u64>,
    Json(req): Json<CallerRequest>,
) -> Response {
    let mut engine = state.engine.write().await;
    match engine.confirm_delivery(&context(&req.caller), id) {
        Ok(()) => {
            publish(&state, engine.take_events());
            StatusCode::NO_CONTENT.into_response()
        }
        Err(err) => reject(err),
    }
}

/// `POST /transactions/:id/dispute` — buyer or seller contests delivery.
async fn dispute_handler(
    State(state): State<AppState>,
    Path(id): Path<u64>,
    Json(req): Json<CallerRequest>,
) -> Response {
    let mut engine = state.engine.write().await;
    match engine.initiate_dispute(&context(&req.caller), id) {
        Ok(()) => {
            publish(&state, engine.take_events());
            StatusCode::NO_CONTENT.into_response()
        }
        Err(err) => reject(err),
    }
}

/// `POST /transactions/:id/resolve` — the arbitrator rules.
async fn resolve_handler(
    State(state): State<AppState>,
    Path(id): Path<u64>,
    Json(req): Json<ResolveRequest>,
) -> Response {
    let mut engine = state.engine.write().await;
    match engine.resolve_dispute(&context(&req.caller), id, req.release_to_seller) {
        Ok(()) => {
            publish(&state, engine.take_events());
            StatusCode::NO_CONTENT.into_response()
        }
        Err(err) => reject(err),
    }
}

// ---------------------------------------------------------------------------
// Withdrawal Handlers
// ---------------------------------------------------------------------------

/// `POST /withdrawals` — the caller pulls their entire pending balance.
///
/// A failed payout is a 200 with `outcome: "restored"`, not an error: the
/// balance was put back and the caller can retry.
async fn withdraw_handler(
    State(state): State<AppState>,
    Json(req): Json<CallerRequest>,
) -> Response {
    let ctx = context(&req.caller);
    let mut engine = state.engine.write().await;
    let mut settlement = state.settlement.write().await;
    match engine.withdraw_funds(&ctx, &mut *settlement) {
        Ok(outcome) => {
            publish(&state, engine.take_events());
            let (label, amount) = match outcome {
                WithdrawOutcome::Paid { amount } => ("paid", amount),
                WithdrawOutcome::Restored { amount } => ("restored", amount),
            };
            Json(WithdrawResponse {
                outcome: label.to_string(),
                amount,
            })
            .into_response()
        }
        Err(err) => reject(err),
    }
}

/// `GET /withdrawals/:address` — the pending balance of an address.
async fn pending_withdrawal_handler(
    State(state): State<AppState>,
    Path(address): Path<String>,
) -> impl IntoResponse {
    let engine = state.engine.read().await;
    let pending = engine.pending_withdrawal(&Address::new(address.clone()));
    Json(PendingWithdrawalResponse { address, pending })
}

/// `GET /accounts/:address` — the settled (paid-out) balance of an
/// address in the devnet account book.
async fn account_handler(
    State(state): State<AppState>,
    Path(address): Path<String>,
) -> impl IntoResponse {
    let settlement = state.settlement.read().await;
    let settled_balance = settlement.balance(&Address::new(address.clone()));
    Json(AccountResponse {
        address,
        settled_balance,
    })
}

// ---------------------------------------------------------------------------
// Configuration Handlers
// ---------------------------------------------------------------------------

/// `GET /config` — current arbitrator, fee rate, and accrued fees.
async fn config_handler(State(state): State<AppState>) -> impl IntoResponse {
    let engine = state.engine.read().await;
    Json(ConfigResponse {
        arbitrator: engine.arbitrator().as_str().to_string(),
        fee_rate_bps: engine.fee_rate_bps(),
        collected_fees: engine.collected_fees(),
    })
}

/// `POST /config/arbitrator` — the owner replaces the arbitrator.
async fn change_arbitrator_handler(
    State(state): State<AppState>,
    Json(req): Json<ChangeArbitratorRequest>,
) -> Response {
    let mut engine = state.engine.write().await;
    match engine.change_arbitrator(&context(&req.caller), Address::new(req.arbitrator)) {
        Ok(()) => {
            publish(&state, engine.take_events());
            StatusCode::NO_CONTENT.into_response()
        }
        Err(err) => reject(err),
    }
}

/// `POST /config/fee-rate` — the owner retunes the fee rate.
async fn change_fee_rate_handler(
    State(state): State<AppState>,
    Json(req): Json<ChangeFeeRateRequest>,
) -> Response {
    let mut engine = state.engine.write().await;
    match engine.change_fee_rate(&context(&req.caller), req.fee_rate_bps) {
        Ok(()) => {
            publish(&state, engine.take_events());
            StatusCode::NO_CONTENT.into_response()
        }
        Err(err) => reject(err),
    }
}

/// `POST /config/fees/withdraw` — the owner moves accrued fees into their
/// pending balance.
async fn withdraw_fees_handler(
    State(state): State<AppState>,
    Json(req): Json<CallerRequest>,
) -> Response {
    let mut engine = state.engine.write().await;
    match engine.withdraw_fees(&context(&req.caller)) {
        Ok(()) => {
            publish(&state, engine.take_events());
            StatusCode::NO_CONTENT.into_response()
        }
        Err(err) => reject(err),
    }
}

// ---------------------------------------------------------------------------
// WebSocket
// ---------------------------------------------------------------------------

/// `GET /ws` — upgrades to a WebSocket that streams escrow events as JSON.
async fn ws_handler(State(state): State<AppState>, ws: WebSocketUpgrade) -> impl IntoResponse {
    let rx = state.event_tx.subscribe();
    ws.on_upgrade(move |socket| stream_events(socket, rx))
}

/// Forwards broadcast events to one WebSocket client until it disconnects.
async fn stream_events(mut socket: WebSocket, mut rx: broadcast::Receiver<EscrowEvent>) {
    loop {
        match rx.recv().await {
            Ok(event) => {
                let payload = match serde_json::to_string(&event) {
                    Ok(p) => p,
                    Err(e) => {
                        tracing::error!("failed to serialize event: {}", e);
                        continue;
                    }
                };
                if socket.send(Message::Text(payload)).await.is_err() {
                    break;
                }
            }
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                tracing::warn!(skipped, "websocket subscriber lagged behind event stream");
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
