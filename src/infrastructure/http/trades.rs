//! Trade surface (§6): `/api/trades/sync` (bulk), `/api/trades/update`
//! (single-trade delta). Both funnel into the same reconciliation routine
//! the periodic loop uses (§4.11).

use crate::application::reconciliation::{reconcile_account, TerminalTradeReport};
use crate::domain::errors::AppError;
use crate::domain::types::Direction;
use crate::infrastructure::http::auth::authenticate;
use crate::infrastructure::http::broker_time::to_utc;
use crate::infrastructure::http::response::ApiResponse;
use crate::infrastructure::http::state::AppState;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::Json;
use chrono::{NaiveDateTime, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::json;

#[derive(Deserialize)]
pub struct TradeReportPayload {
    pub ticket: i64,
    pub symbol: String,
    pub direction: Direction,
    pub volume: Decimal,
    pub open_price: Decimal,
    pub open_time: NaiveDateTime,
    pub sl: Decimal,
    pub tp: Decimal,
    pub profit: Decimal,
    #[serde(default)]
    pub commission: Decimal,
    #[serde(default)]
    pub swap: Decimal,
    pub is_open: bool,
    pub close_price: Option<Decimal>,
    pub close_time: Option<NaiveDateTime>,
}

impl From<TradeReportPayload> for TerminalTradeReport {
    fn from(p: TradeReportPayload) -> Self {
        TerminalTradeReport {
            ticket: p.ticket,
            symbol: p.symbol,
            direction: p.direction,
            volume: p.volume,
            open_price: p.open_price,
            open_time: to_utc(p.open_time),
            sl: p.sl,
            tp: p.tp,
            profit: p.profit,
            commission: p.commission,
            swap: p.swap,
            is_open: p.is_open,
            close_price: p.close_price,
            close_time: p.close_time.map(to_utc),
        }
    }
}

#[derive(Deserialize)]
pub struct TradesSyncRequest {
    pub account: i64,
    pub api_key: Option<String>,
    pub trades: Vec<TradeReportPayload>,
}

pub async fn sync(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<TradesSyncRequest>,
) -> Result<ApiResponse, AppError> {
    authenticate(&state, &headers, req.api_key.as_deref(), req.account).await?;

    let reports: Vec<TerminalTradeReport> = req.trades.into_iter().map(Into::into).collect();
    let now = Utc::now();
    let equity = state.accounts.find_by_account_number(req.account).await?.map(|a| a.equity).unwrap_or_default();
    let summary = reconcile_account(
        &state.trades,
        &state.ticks,
        &state.symbols,
        &state.protection,
        &state.symbol_configs,
        req.account,
        equity,
        &reports,
        true,
        state.config.sl_cooldown_secs,
        state.config.sl_cooldown_extended_secs,
        now,
    )
    .await?;

    Ok(ApiResponse::ok(json!({
        "inserted": summary.inserted,
        "closed": summary.closed,
        "updated": summary.updated,
    })))
}

#[derive(Deserialize)]
pub struct TradeUpdateRequest {
    pub account: i64,
    pub api_key: Option<String>,
    pub trade: TradeReportPayload,
}

pub async fn update(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<TradeUpdateRequest>,
) -> Result<ApiResponse, AppError> {
    authenticate(&state, &headers, req.api_key.as_deref(), req.account).await?;

    let report: TerminalTradeReport = req.trade.into();
    let now = Utc::now();
    let equity = state.accounts.find_by_account_number(req.account).await?.map(|a| a.equity).unwrap_or_default();
    let summary = reconcile_account(
        &state.trades,
        &state.ticks,
        &state.symbols,
        &state.protection,
        &state.symbol_configs,
        req.account,
        equity,
        std::slice::from_ref(&report),
        false,
        state.config.sl_cooldown_secs,
        state.config.sl_cooldown_extended_secs,
        now,
    )
    .await?;

    Ok(ApiResponse::ok(json!({
        "inserted": summary.inserted,
        "closed": summary.closed,
        "updated": summary.updated,
    })))
}
