//! Repository port traits (§9 "Global state -> explicit long-lived
//! services"). Following the teacher's `domain::repositories` Repository
//! Pattern: business logic depends on these traits, not on `sqlx` directly.
//! One `sqlx`-backed implementation lives in
//! `infrastructure::persistence::repositories`.

use crate::domain::timeframe::Timeframe;
use crate::domain::types::{
    Account, AiDecisionLog, BrokerSymbol, Command, CommandStatus, IndicatorScore, OhlcCandle,
    ProtectionState, SignalStatus, SubscribedSymbol, SymbolTradingConfig, Tick, Trade,
    TradeHistoryEvent, TradingSignal,
};
use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

#[async_trait]
pub trait AccountRepository: Send + Sync {
    /// Idempotent on account number: returns the existing account if
    /// already connected, otherwise creates it (§6 `/api/connect`).
    async fn get_or_create(&self, account_number: i64, broker: &str, platform: &str, api_key_hash: &str) -> Result<(Account, bool)>;
    async fn find_by_account_number(&self, account_number: i64) -> Result<Option<Account>>;
    async fn find_by_api_key_hash(&self, api_key_hash: &str) -> Result<Option<Account>>;
    async fn update_heartbeat(&self, account_number: i64, balance: rust_decimal::Decimal, equity: rust_decimal::Decimal, margin: rust_decimal::Decimal, free_margin: rust_decimal::Decimal, at: DateTime<Utc>) -> Result<()>;
    async fn set_auto_trading_enabled(&self, account_number: i64, enabled: bool) -> Result<()>;
    /// Accounts whose `last_heartbeat` is within `within` of `now` (§4.3 watchdog).
    async fn count_connected(&self, now: DateTime<Utc>, within: chrono::Duration) -> Result<usize>;
    /// Every known account, for the watchdog sweep and the decision pipeline's
    /// per-account driving loop (§4.3, §4.7).
    async fn list_all(&self) -> Result<Vec<Account>>;
}

#[async_trait]
pub trait SymbolRepository: Send + Sync {
    async fn upsert_symbol_spec(&self, spec: &BrokerSymbol) -> Result<()>;
    async fn find_symbol(&self, symbol: &str) -> Result<Option<BrokerSymbol>>;
    async fn subscribe(&self, sub: &SubscribedSymbol) -> Result<()>;
    async fn subscribed_for_account(&self, account_number: i64) -> Result<Vec<SubscribedSymbol>>;
    async fn all_subscribed_symbols(&self) -> Result<Vec<String>>;
}

#[async_trait]
pub trait TickRepository: Send + Sync {
    async fn insert_batch(&self, ticks: &[Tick]) -> Result<usize>;
    async fn latest(&self, symbol: &str) -> Result<Option<Tick>>;
    async fn recent(&self, symbol: &str, since: DateTime<Utc>) -> Result<Vec<Tick>>;
    async fn delete_older_than(&self, cutoff: DateTime<Utc>) -> Result<u64>;
}

#[async_trait]
pub trait CandleRepository: Send + Sync {
    /// Returns (inserted, skipped-as-duplicate) per §4.4.
    async fn insert_batch(&self, candles: &[OhlcCandle]) -> Result<(usize, usize)>;
    async fn latest_n(&self, symbol: &str, timeframe: Timeframe, n: usize) -> Result<Vec<OhlcCandle>>;
    async fn delete_older_than(&self, timeframe: Timeframe, cutoff: DateTime<Utc>) -> Result<u64>;
}

#[async_trait]
pub trait SignalRepository: Send + Sync {
    /// Expires any prior active signal for `(symbol, timeframe)` then
    /// inserts the new one — §4.6 step 6, enforced atomically to preserve
    /// the "at most one active signal" invariant (§3, §5, §8 invariant 2).
    async fn expire_active_and_insert(&self, signal: &TradingSignal) -> Result<()>;
    async fn active_signals(&self) -> Result<Vec<TradingSignal>>;
    async fn find_active_for(&self, symbol: &str, timeframe: Timeframe) -> Result<Option<TradingSignal>>;
    async fn set_status(&self, id: uuid::Uuid, status: SignalStatus) -> Result<()>;
    async fn expire_stale(&self, now: DateTime<Utc>) -> Result<u64>;
}

#[async_trait]
pub trait CommandRepository: Send + Sync {
    async fn insert(&self, command: &Command) -> Result<()>;
    async fn find(&self, id: uuid::Uuid) -> Result<Option<Command>>;
    /// Pulls up to `limit` pending commands for the account and atomically
    /// transitions them to `sent` (§4.1 `/api/get_commands`); uses a
    /// `WHERE status = 'pending'` CAS-style update per §5.
    async fn pull_pending(&self, account_number: i64, limit: usize) -> Result<Vec<Command>>;
    async fn mark_sent(&self, ids: &[uuid::Uuid]) -> Result<()>;
    /// Idempotent CAS: `UPDATE ... WHERE status = 'sent'` (§5, §8 — a
    /// second `/api/command_response` call for the same id is a no-op).
    async fn complete(&self, id: uuid::Uuid, status: CommandStatus, response: serde_json::Value) -> Result<bool>;
    async fn find_overdue(&self, now: DateTime<Utc>, timeout: chrono::Duration) -> Result<Vec<Command>>;
    async fn mark_failed(&self, id: uuid::Uuid, reason: &str) -> Result<()>;
    async fn count_pending(&self) -> Result<usize>;
}

#[async_trait]
pub trait TradeRepository: Send + Sync {
    /// Enforces "at most one open trade per (account, symbol)" via a
    /// unique-conditional-index-style conflict check (§3, §5, §8 invariant
    /// 1); returns `Err` (conflict) on a duplicate-open race.
    async fn insert_open(&self, trade: &Trade) -> Result<()>;
    async fn find_open_for_symbol(&self, account_number: i64, symbol: &str) -> Result<Option<Trade>>;
    async fn open_trades_for_account(&self, account_number: i64) -> Result<Vec<Trade>>;
    async fn open_trades_count(&self, account_number: i64) -> Result<usize>;
    async fn open_trades_for_symbols(&self, account_number: i64, symbols: &[String]) -> Result<Vec<Trade>>;
    async fn open_trades_for_timeframe(&self, account_number: i64, symbol: &str, timeframe: &str) -> Result<usize>;
    async fn find_by_ticket(&self, ticket: i64) -> Result<Option<Trade>>;
    async fn update_sl_tp(&self, trade_id: uuid::Uuid, sl: rust_decimal::Decimal, tp: rust_decimal::Decimal) -> Result<()>;
    /// Applied by the trailing-stop manager (§4.10) in place of
    /// `update_sl_tp`: also flags the trade as trailing and records the move
    /// count, so a later close near this SL is classified as a trailing stop
    /// rather than a plain SL hit.
    async fn mark_trailing_stop(&self, trade_id: uuid::Uuid, sl: rust_decimal::Decimal, moves: u32) -> Result<()>;
    async fn close(&self, trade_id: uuid::Uuid, close_price: rust_decimal::Decimal, close_time: DateTime<Utc>, profit: rust_decimal::Decimal, reason: crate::domain::types::CloseReason) -> Result<()>;
    async fn append_history_event(&self, event: &TradeHistoryEvent) -> Result<()>;
    async fn recent_closed(&self, account_number: i64, limit: usize) -> Result<Vec<Trade>>;
    async fn count_all_open(&self) -> Result<usize>;
}

#[async_trait]
pub trait SymbolConfigRepository: Send + Sync {
    async fn get_or_create(&self, account_number: i64, symbol: &str) -> Result<SymbolTradingConfig>;
    async fn save(&self, config: &SymbolTradingConfig) -> Result<()>;
}

#[async_trait]
pub trait IndicatorScoreRepository: Send + Sync {
    async fn get(&self, symbol: &str, timeframe: Timeframe, indicator_name: &str) -> Result<Option<IndicatorScore>>;
    async fn upsert(&self, score: &IndicatorScore) -> Result<()>;
}

#[async_trait]
pub trait ProtectionRepository: Send + Sync {
    async fn get_or_create(&self, account_number: i64, initial_balance: rust_decimal::Decimal) -> Result<ProtectionState>;
    async fn save(&self, state: &ProtectionState) -> Result<()>;
}

#[async_trait]
pub trait DecisionLogRepository: Send + Sync {
    async fn append(&self, log: &AiDecisionLog) -> Result<()>;
    async fn delete_older_than(&self, cutoff: DateTime<Utc>) -> Result<u64>;
}
