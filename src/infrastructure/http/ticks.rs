//! Tick/market-data surface (§6): `/api/ticks`, `/api/ohlc/historical`.

use crate::application::market_data::ohlc_ingestion::ingest_candles;
use crate::domain::errors::AppError;
use crate::domain::timeframe::Timeframe;
use crate::domain::types::{OhlcCandle, Tick};
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
use crate::domain::errors::ValidationError;

#[derive(Deserialize)]
pub struct TickPayload {
    pub symbol: String,
    pub bid: Decimal,
    pub ask: Decimal,
    pub volume: Decimal,
    pub timestamp: NaiveDateTime,
    #[serde(default = "default_true")]
    pub tradeable: bool,
}

fn default_true() -> bool {
    true
}

#[derive(Deserialize)]
pub struct TicksRequest {
    pub account: i64,
    pub api_key: Option<String>,
    pub ticks: Vec<TickPayload>,
    pub balance: Decimal,
    pub equity: Decimal,
    pub margin: Decimal,
    pub free_margin: Decimal,
}

pub async fn ticks(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<TicksRequest>,
) -> Result<ApiResponse, AppError> {
    authenticate(&state, &headers, req.api_key.as_deref(), req.account).await?;

    for tick in &req.ticks {
        if tick.ask < tick.bid {
            return Err(ValidationError::NegativeSpread { spread: tick.ask - tick.bid }.into());
        }
    }

    let now = Utc::now();
    state
        .accounts
        .update_heartbeat(req.account, req.balance, req.equity, req.margin, req.free_margin, now)
        .await?;

    let count = req.ticks.len();
    let domain_ticks: Vec<Tick> = req
        .ticks
        .into_iter()
        .map(|t| Tick::new(t.symbol, t.bid, t.ask, t.volume, to_utc(t.timestamp), t.tradeable))
        .collect();
    state.tick_writer.ingest(domain_ticks);
    state.connection_registry.record_tick(req.account, now).await;

    Ok(ApiResponse::ok(json!({ "accepted": count })))
}

#[derive(Deserialize)]
pub struct CandlePayload {
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
    pub volume: Decimal,
    pub timestamp: NaiveDateTime,
}

#[derive(Deserialize)]
pub struct OhlcHistoricalRequest {
    pub account: i64,
    pub api_key: Option<String>,
    pub symbol: String,
    pub timeframe: String,
    pub candles: Vec<CandlePayload>,
}

pub async fn ohlc_historical(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<OhlcHistoricalRequest>,
) -> Result<ApiResponse, AppError> {
    authenticate(&state, &headers, req.api_key.as_deref(), req.account).await?;

    let timeframe = Timeframe::parse(&req.timeframe)
        .ok_or_else(|| ValidationError::InvalidValue { field: "timeframe", reason: req.timeframe.clone() })?;

    let candles: Vec<OhlcCandle> = req
        .candles
        .into_iter()
        .map(|c| OhlcCandle {
            symbol: req.symbol.clone(),
            timeframe,
            open: c.open,
            high: c.high,
            low: c.low,
            close: c.close,
            volume: c.volume,
            timestamp: to_utc(c.timestamp),
        })
        .collect();

    let (inserted, skipped) = ingest_candles(&state.candles, candles).await?;
    state.metrics.inc_candles(&req.symbol, timeframe.as_str(), inserted);

    Ok(ApiResponse::ok(json!({ "inserted": inserted, "skipped": skipped })))
}
