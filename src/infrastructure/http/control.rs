//! Control surface (§6): connect, heartbeat, symbols, commands, transactions.

use crate::domain::errors::{AppError, ValidationError};
use crate::domain::types::{
    BrokerSymbol, Command, CommandPayload, CommandStatus, SubscribedSymbol,
};
use crate::infrastructure::http::auth::{authenticate, hash_api_key};
use crate::infrastructure::http::response::ApiResponse;
use crate::infrastructure::http::state::AppState;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::Json;
use chrono::Utc;
use rand::distr::Alphanumeric;
use rand::Rng;
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::info;
use uuid::Uuid;

pub async fn status() -> ApiResponse {
    ApiResponse::ok(json!({
        "service": "mt5-trading-backend",
        "version": env!("CARGO_PKG_VERSION"),
        "time": Utc::now().to_rfc3339(),
    }))
}

/// Prometheus scrape target for the `worker_health` gauge and friends
/// (§4.14) — plain text, not the `ApiResponse` envelope the rest of this
/// surface uses.
pub async fn metrics(State(state): State<AppState>) -> String {
    state.metrics.render()
}

fn generate_api_key() -> String {
    rand::rng().sample_iter(&Alphanumeric).take(48).map(char::from).collect()
}

#[derive(Deserialize)]
pub struct ConnectRequest {
    pub account: i64,
    pub broker: String,
    pub platform: String,
}

/// Idempotent on account number (§6, §8): calling twice never creates a
/// second account row. The plaintext key is only ever visible in the
/// response of the call that created it — it cannot be recovered later
/// since only its hash is persisted (§10).
pub async fn connect(State(state): State<AppState>, Json(req): Json<ConnectRequest>) -> Result<ApiResponse, AppError> {
    let plaintext_key = generate_api_key();
    let candidate_hash = hash_api_key(&plaintext_key);

    let (account, is_new) = state
        .accounts
        .get_or_create(req.account, &req.broker, &req.platform, &candidate_hash)
        .await?;

    if is_new {
        Ok(ApiResponse::ok(json!({
            "account": account.account_number,
            "api_key": plaintext_key,
        })))
    } else {
        Ok(ApiResponse::ok(json!({
            "account": account.account_number,
            "message": "account already connected; api_key was issued on first connect",
        })))
    }
}

#[derive(Deserialize)]
pub struct HeartbeatRequest {
    pub account: i64,
    pub api_key: Option<String>,
    pub balance: Decimal,
    pub equity: Decimal,
    pub margin: Decimal,
    pub free_margin: Decimal,
}

pub async fn heartbeat(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<HeartbeatRequest>,
) -> Result<ApiResponse, AppError> {
    authenticate(&state, &headers, req.api_key.as_deref(), req.account).await?;
    let now = Utc::now();
    state
        .accounts
        .update_heartbeat(req.account, req.balance, req.equity, req.margin, req.free_margin, now)
        .await?;
    state.connection_registry.record_heartbeat(req.account, now, None).await;
    Ok(ApiResponse::ok_empty())
}

#[derive(Deserialize)]
pub struct SymbolsRequest {
    pub account: i64,
    pub api_key: Option<String>,
}

pub async fn symbols(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<SymbolsRequest>,
) -> Result<ApiResponse, AppError> {
    authenticate(&state, &headers, req.api_key.as_deref(), req.account).await?;
    let subs = state.symbols.subscribed_for_account(req.account).await?;
    let symbols: Vec<String> = subs.into_iter().map(|s| s.symbol).collect();
    Ok(ApiResponse::ok(json!({ "symbols": symbols })))
}

#[derive(Deserialize)]
pub struct SubscribeRequest {
    pub account: i64,
    pub api_key: Option<String>,
    pub symbol: String,
}

pub async fn subscribe(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<SubscribeRequest>,
) -> Result<ApiResponse, AppError> {
    authenticate(&state, &headers, req.api_key.as_deref(), req.account).await?;
    state
        .symbols
        .subscribe(&SubscribedSymbol { account_number: req.account, symbol: req.symbol })
        .await?;
    Ok(ApiResponse::ok_empty())
}

#[derive(Deserialize)]
pub struct SymbolSpecsRequest {
    pub account: i64,
    pub api_key: Option<String>,
    pub symbol: String,
    pub volume_min: Decimal,
    pub volume_max: Decimal,
    pub volume_step: Decimal,
    pub stops_level: i32,
    pub freeze_level: i32,
    pub digits: u32,
    pub point_value: Decimal,
    pub trade_mode: String,
}

pub async fn symbol_specs(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<SymbolSpecsRequest>,
) -> Result<ApiResponse, AppError> {
    authenticate(&state, &headers, req.api_key.as_deref(), req.account).await?;
    state
        .symbols
        .upsert_symbol_spec(&BrokerSymbol {
            symbol: req.symbol,
            volume_min: req.volume_min,
            volume_max: req.volume_max,
            volume_step: req.volume_step,
            stops_level: req.stops_level,
            freeze_level: req.freeze_level,
            digits: req.digits,
            point_value: req.point_value,
            trade_mode: req.trade_mode,
        })
        .await?;
    Ok(ApiResponse::ok_empty())
}

#[derive(Deserialize)]
pub struct GetCommandsRequest {
    pub account: i64,
    pub api_key: Option<String>,
    pub limit: Option<usize>,
}

/// §4.1/§4.2: fast path from the per-account queue, recovery path from the
/// DB CAS scan for anything the queue lost.
pub async fn get_commands(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<GetCommandsRequest>,
) -> Result<ApiResponse, AppError> {
    authenticate(&state, &headers, req.api_key.as_deref(), req.account).await?;
    let limit = req.limit.unwrap_or(state.config.commands_per_poll);

    let mut from_queue = state.queue.pop_batch(req.account, limit).await.unwrap_or_default();
    if !from_queue.is_empty() {
        let ids: Vec<Uuid> = from_queue.iter().map(|c| c.id).collect();
        state.commands.mark_sent(&ids).await?;
        for cmd in &mut from_queue {
            cmd.status = CommandStatus::Sent;
        }
    }

    let remaining = limit.saturating_sub(from_queue.len());
    let mut commands = from_queue;
    if remaining > 0 {
        let from_db = state.commands.pull_pending(req.account, remaining).await?;
        commands.extend(from_db);
    }

    for cmd in &commands {
        state.metrics.inc_command(&format!("{:?}", cmd.payload.command_type()), "sent");
    }

    Ok(ApiResponse::ok(json!({ "commands": commands })))
}

#[derive(Deserialize)]
pub struct CreateCommandRequest {
    pub account: i64,
    pub api_key: Option<String>,
    pub payload: CommandPayload,
}

pub async fn create_command(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<CreateCommandRequest>,
) -> Result<ApiResponse, AppError> {
    authenticate(&state, &headers, req.api_key.as_deref(), req.account).await?;
    req.payload.validate().map_err(|reason| ValidationError::InvalidValue { field: "payload", reason: reason.to_string() })?;

    let now = Utc::now();
    let command_type = req.payload.command_type();
    let command = Command::new(req.account, req.payload, now);
    state.commands.insert(&command).await?;
    let _ = state.queue.enqueue(req.account, &command).await;
    state.metrics.inc_command(&format!("{:?}", command_type), "created");

    Ok(ApiResponse::ok(json!({ "command_id": command.id })))
}

#[derive(Deserialize)]
pub struct CommandResponseRequest {
    pub account: i64,
    pub api_key: Option<String>,
    pub command_id: Uuid,
    pub status: String, // "completed" | "failed"
    #[serde(default)]
    pub response: Value,
}

/// Idempotent on `command_id` (§6, §8): a repeated call for an
/// already-terminal command is a no-op, never an error.
pub async fn command_response(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<CommandResponseRequest>,
) -> Result<ApiResponse, AppError> {
    authenticate(&state, &headers, req.api_key.as_deref(), req.account).await?;

    let status = match req.status.as_str() {
        "completed" => CommandStatus::Completed,
        "failed" => CommandStatus::Failed,
        other => {
            return Err(ValidationError::InvalidValue { field: "status", reason: format!("unknown command status {other}") }.into())
        }
    };

    let transitioned = state.commands.complete(req.command_id, status, req.response.clone()).await?;
    if transitioned {
        let label = if status == CommandStatus::Completed { "completed" } else { "failed" };
        state.metrics.inc_command("any", label);
        let _ = state.queue.publish_response(req.command_id, &req.response).await;

        let balance = state.accounts.find_by_account_number(req.account).await?.map(|a| a.balance).unwrap_or_default();
        let mut protection = state.protection.get_or_create(req.account, balance).await?;
        let now = Utc::now();
        let tripped = crate::application::risk_management::protection::record_command_result(
            &mut protection,
            status == CommandStatus::Completed,
            now,
            state.config.cb_threshold,
        );
        state.protection.save(&protection).await?;
        if tripped {
            tracing::warn!(account = req.account, "command-failure circuit breaker tripped");
        }
    }

    Ok(ApiResponse::ok_empty())
}

#[derive(Deserialize)]
pub struct TransactionRequest {
    pub account: i64,
    pub api_key: Option<String>,
    pub ticket: i64,
    pub kind: String, // "deposit" | "withdrawal"
    pub amount: Decimal,
}

/// Out-of-scope per §1 beyond acknowledging the notification (balance is
/// kept current through `/api/heartbeat`); idempotent on `ticket` by virtue
/// of only ever being logged, never mutating state twice.
pub async fn transaction(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<TransactionRequest>,
) -> Result<ApiResponse, AppError> {
    authenticate(&state, &headers, req.api_key.as_deref(), req.account).await?;
    info!(
        account = req.account,
        ticket = req.ticket,
        kind = %req.kind,
        amount = %req.amount,
        "transaction notification"
    );
    Ok(ApiResponse::ok_empty())
}
