//! `sqlx`-backed implementations of every trait in `domain::ports`,
//! grounded in the teacher's `SqliteOrderRepository` pattern: `Decimal`
//! bound via `.to_string()`, enums bound as strings, rows mapped back
//! through small `try_get` helper functions.

use crate::domain::errors::PersistenceError;
use crate::domain::ports::{
    AccountRepository, CandleRepository, CommandRepository, DecisionLogRepository,
    IndicatorScoreRepository, ProtectionRepository, SignalRepository, SymbolConfigRepository,
    SymbolRepository, TickRepository, TradeRepository,
};
use crate::domain::timeframe::Timeframe;
use crate::domain::types::{
    Account, AiDecisionLog, BrokerSymbol, CloseReason, Command, CommandPayload, CommandStatus,
    DecisionType, ImpactLevel, IndicatorScore, OhlcCandle, ProtectionState, SignalStatus,
    SignalType, SubscribedSymbol, SymbolStatus, SymbolTradingConfig, Tick, Trade,
    TradeHistoryEvent, TradeSource, TradeStatus, TradingSignal,
};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use rust_decimal::Decimal;
use sqlx::{Row, SqlitePool, sqlite::SqliteRow};
use std::str::FromStr;

fn to_ts(dt: DateTime<Utc>) -> i64 {
    dt.timestamp()
}

fn from_ts(ts: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(ts, 0).single().unwrap_or_else(Utc::now)
}

fn dec(row: &SqliteRow, col: &str) -> Result<Decimal, sqlx::Error> {
    let s: String = row.try_get(col)?;
    Decimal::from_str(&s).map_err(|e| sqlx::Error::Decode(Box::new(e)))
}

fn opt_dec(row: &SqliteRow, col: &str) -> Result<Option<Decimal>, sqlx::Error> {
    let s: Option<String> = row.try_get(col)?;
    s.map(|s| Decimal::from_str(&s).map_err(|e| sqlx::Error::Decode(Box::new(e))))
        .transpose()
}

pub struct SqliteAccountRepository {
    pool: SqlitePool,
}

impl SqliteAccountRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn map_row(row: &SqliteRow) -> Result<Account> {
        Ok(Account {
            account_number: row.try_get("account_number")?,
            api_key_hash: row.try_get("api_key_hash")?,
            broker: row.try_get("broker")?,
            platform: row.try_get("platform")?,
            balance: dec(row, "balance")?,
            equity: dec(row, "equity")?,
            margin: dec(row, "margin")?,
            free_margin: dec(row, "free_margin")?,
            last_heartbeat: row.try_get::<Option<i64>, _>("last_heartbeat")?.map(from_ts),
            auto_trading_enabled: row.try_get("auto_trading_enabled")?,
            created_at: from_ts(row.try_get("created_at")?),
        })
    }
}

#[async_trait]
impl AccountRepository for SqliteAccountRepository {
    async fn get_or_create(
        &self,
        account_number: i64,
        broker: &str,
        platform: &str,
        api_key_hash: &str,
    ) -> Result<(Account, bool)> {
        if let Some(existing) = self.find_by_account_number(account_number).await? {
            return Ok((existing, false));
        }

        let now = Utc::now();
        sqlx::query(
            r#"
            INSERT INTO accounts
                (account_number, api_key_hash, broker, platform, balance, equity, margin, free_margin, auto_trading_enabled, created_at)
            VALUES (?, ?, ?, ?, '0', '0', '0', '0', 1, ?)
            ON CONFLICT(account_number) DO NOTHING
            "#,
        )
        .bind(account_number)
        .bind(api_key_hash)
        .bind(broker)
        .bind(platform)
        .bind(to_ts(now))
        .execute(&self.pool)
        .await
        .context("failed to insert account")?;

        let account = self
            .find_by_account_number(account_number)
            .await?
            .context("account vanished immediately after insert")?;
        Ok((account, true))
    }

    async fn find_by_account_number(&self, account_number: i64) -> Result<Option<Account>> {
        let row = sqlx::query("SELECT * FROM accounts WHERE account_number = ?")
            .bind(account_number)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(Self::map_row).transpose()
    }

    async fn find_by_api_key_hash(&self, api_key_hash: &str) -> Result<Option<Account>> {
        let row = sqlx::query("SELECT * FROM accounts WHERE api_key_hash = ?")
            .bind(api_key_hash)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(Self::map_row).transpose()
    }

    async fn update_heartbeat(
        &self,
        account_number: i64,
        balance: Decimal,
        equity: Decimal,
        margin: Decimal,
        free_margin: Decimal,
        at: DateTime<Utc>,
    ) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE accounts
            SET balance = ?, equity = ?, margin = ?, free_margin = ?, last_heartbeat = ?
            WHERE account_number = ?
            "#,
        )
        .bind(balance.to_string())
        .bind(equity.to_string())
        .bind(margin.to_string())
        .bind(free_margin.to_string())
        .bind(to_ts(at))
        .bind(account_number)
        .execute(&self.pool)
        .await
        .context("failed to update heartbeat")?;
        Ok(())
    }

    async fn set_auto_trading_enabled(&self, account_number: i64, enabled: bool) -> Result<()> {
        sqlx::query("UPDATE accounts SET auto_trading_enabled = ? WHERE account_number = ?")
            .bind(enabled)
            .bind(account_number)
            .execute(&self.pool)
            .await
            .context("failed to update auto_trading_enabled")?;
        Ok(())
    }

    async fn count_connected(&self, now: DateTime<Utc>, within: chrono::Duration) -> Result<usize> {
        let cutoff = to_ts(now - within);
        let row = sqlx::query("SELECT COUNT(*) as count FROM accounts WHERE last_heartbeat >= ?")
            .bind(cutoff)
            .fetch_one(&self.pool)
            .await?;
        Ok(row.try_get::<i64, _>("count")? as usize)
    }

    async fn list_all(&self) -> Result<Vec<Account>> {
        let rows = sqlx::query("SELECT * FROM accounts").fetch_all(&self.pool).await?;
        rows.iter().map(Self::map_row).collect()
    }
}

pub struct SqliteSymbolRepository {
    pool: SqlitePool,
}

impl SqliteSymbolRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn map_row(row: &SqliteRow) -> Result<BrokerSymbol> {
        Ok(BrokerSymbol {
            symbol: row.try_get("symbol")?,
            volume_min: dec(row, "volume_min")?,
            volume_max: dec(row, "volume_max")?,
            volume_step: dec(row, "volume_step")?,
            stops_level: row.try_get("stops_level")?,
            freeze_level: row.try_get("freeze_level")?,
            digits: row.try_get::<i64, _>("digits")? as u32,
            point_value: dec(row, "point_value")?,
            trade_mode: row.try_get("trade_mode")?,
        })
    }
}

#[async_trait]
impl SymbolRepository for SqliteSymbolRepository {
    async fn upsert_symbol_spec(&self, spec: &BrokerSymbol) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO broker_symbols
                (symbol, volume_min, volume_max, volume_step, stops_level, freeze_level, digits, point_value, trade_mode)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(symbol) DO UPDATE SET
                volume_min = excluded.volume_min,
                volume_max = excluded.volume_max,
                volume_step = excluded.volume_step,
                stops_level = excluded.stops_level,
                freeze_level = excluded.freeze_level,
                digits = excluded.digits,
                point_value = excluded.point_value,
                trade_mode = excluded.trade_mode
            "#,
        )
        .bind(&spec.symbol)
        .bind(spec.volume_min.to_string())
        .bind(spec.volume_max.to_string())
        .bind(spec.volume_step.to_string())
        .bind(spec.stops_level)
        .bind(spec.freeze_level)
        .bind(spec.digits as i64)
        .bind(spec.point_value.to_string())
        .bind(&spec.trade_mode)
        .execute(&self.pool)
        .await
        .context("failed to upsert symbol spec")?;
        Ok(())
    }

    async fn find_symbol(&self, symbol: &str) -> Result<Option<BrokerSymbol>> {
        let row = sqlx::query("SELECT * FROM broker_symbols WHERE symbol = ?")
            .bind(symbol)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(Self::map_row).transpose()
    }

    async fn subscribe(&self, sub: &SubscribedSymbol) -> Result<()> {
        sqlx::query(
            "INSERT INTO subscribed_symbols (account_number, symbol) VALUES (?, ?) ON CONFLICT DO NOTHING",
        )
        .bind(sub.account_number)
        .bind(&sub.symbol)
        .execute(&self.pool)
        .await
        .context("failed to subscribe symbol")?;
        Ok(())
    }

    async fn subscribed_for_account(&self, account_number: i64) -> Result<Vec<SubscribedSymbol>> {
        let rows = sqlx::query("SELECT * FROM subscribed_symbols WHERE account_number = ?")
            .bind(account_number)
            .fetch_all(&self.pool)
            .await?;
        rows.iter()
            .map(|r| {
                Ok(SubscribedSymbol {
                    account_number: r.try_get("account_number")?,
                    symbol: r.try_get("symbol")?,
                })
            })
            .collect()
    }

    async fn all_subscribed_symbols(&self) -> Result<Vec<String>> {
        let rows = sqlx::query("SELECT DISTINCT symbol FROM subscribed_symbols")
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(|r| Ok(r.try_get("symbol")?)).collect()
    }
}

pub struct SqliteTickRepository {
    pool: SqlitePool,
}

impl SqliteTickRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn map_row(row: &SqliteRow) -> Result<Tick> {
        Ok(Tick {
            symbol: row.try_get("symbol")?,
            bid: dec(row, "bid")?,
            ask: dec(row, "ask")?,
            spread: dec(row, "spread")?,
            volume: dec(row, "volume")?,
            timestamp: from_ts(row.try_get("timestamp")?),
            tradeable: row.try_get("tradeable")?,
        })
    }
}

#[async_trait]
impl TickRepository for SqliteTickRepository {
    async fn insert_batch(&self, ticks: &[Tick]) -> Result<usize> {
        let mut tx = self.pool.begin().await?;
        for tick in ticks {
            sqlx::query(
                "INSERT INTO ticks (symbol, bid, ask, spread, volume, tradeable, timestamp) VALUES (?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(&tick.symbol)
            .bind(tick.bid.to_string())
            .bind(tick.ask.to_string())
            .bind(tick.spread.to_string())
            .bind(tick.volume.to_string())
            .bind(tick.tradeable)
            .bind(to_ts(tick.timestamp))
            .execute(&mut *tx)
            .await
            .context("failed to insert tick")?;
        }
        tx.commit().await?;
        Ok(ticks.len())
    }

    async fn latest(&self, symbol: &str) -> Result<Option<Tick>> {
        let row = sqlx::query("SELECT * FROM ticks WHERE symbol = ? ORDER BY timestamp DESC LIMIT 1")
            .bind(symbol)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(Self::map_row).transpose()
    }

    async fn recent(&self, symbol: &str, since: DateTime<Utc>) -> Result<Vec<Tick>> {
        let rows = sqlx::query("SELECT * FROM ticks WHERE symbol = ? AND timestamp >= ? ORDER BY timestamp ASC")
            .bind(symbol)
            .bind(to_ts(since))
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(Self::map_row).collect()
    }

    async fn delete_older_than(&self, cutoff: DateTime<Utc>) -> Result<u64> {
        let result = sqlx::query("DELETE FROM ticks WHERE timestamp < ?")
            .bind(to_ts(cutoff))
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}

pub struct SqliteCandleRepository {
    pool: SqlitePool,
}

impl SqliteCandleRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn map_row(row: &SqliteRow) -> Result<OhlcCandle> {
        let tf_str: String = row.try_get("timeframe")?;
        Ok(OhlcCandle {
            symbol: row.try_get("symbol")?,
            timeframe: Timeframe::parse(&tf_str).context("invalid timeframe in row")?,
            open: dec(row, "open")?,
            high: dec(row, "high")?,
            low: dec(row, "low")?,
            close: dec(row, "close")?,
            volume: dec(row, "volume")?,
            timestamp: from_ts(row.try_get("timestamp")?),
        })
    }
}

#[async_trait]
impl CandleRepository for SqliteCandleRepository {
    async fn insert_batch(&self, candles: &[OhlcCandle]) -> Result<(usize, usize)> {
        let mut inserted = 0;
        let mut skipped = 0;
        let mut tx = self.pool.begin().await?;
        for candle in candles {
            let result = sqlx::query(
                r#"
                INSERT OR IGNORE INTO ohlc_candles
                    (symbol, timeframe, open, high, low, close, volume, timestamp)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(&candle.symbol)
            .bind(candle.timeframe.as_str())
            .bind(candle.open.to_string())
            .bind(candle.high.to_string())
            .bind(candle.low.to_string())
            .bind(candle.close.to_string())
            .bind(candle.volume.to_string())
            .bind(to_ts(candle.timestamp))
            .execute(&mut *tx)
            .await
            .context("failed to insert candle")?;

            if result.rows_affected() > 0 {
                inserted += 1;
            } else {
                skipped += 1;
            }
        }
        tx.commit().await?;
        Ok((inserted, skipped))
    }

    async fn latest_n(&self, symbol: &str, timeframe: Timeframe, n: usize) -> Result<Vec<OhlcCandle>> {
        let rows = sqlx::query(
            "SELECT * FROM ohlc_candles WHERE symbol = ? AND timeframe = ? ORDER BY timestamp DESC LIMIT ?",
        )
        .bind(symbol)
        .bind(timeframe.as_str())
        .bind(n as i64)
        .fetch_all(&self.pool)
        .await?;
        let mut candles: Vec<OhlcCandle> = rows.iter().map(Self::map_row).collect::<Result<_>>()?;
        candles.reverse();
        Ok(candles)
    }

    async fn delete_older_than(&self, timeframe: Timeframe, cutoff: DateTime<Utc>) -> Result<u64> {
        let result = sqlx::query("DELETE FROM ohlc_candles WHERE timeframe = ? AND timestamp < ?")
            .bind(timeframe.as_str())
            .bind(to_ts(cutoff))
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}

pub struct SqliteSignalRepository {
    pool: SqlitePool,
}

impl SqliteSignalRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn map_row(row: &SqliteRow) -> Result<TradingSignal> {
        let tf_str: String = row.try_get("timeframe")?;
        let signal_type: String = row.try_get("signal_type")?;
        let status: String = row.try_get("status")?;
        Ok(TradingSignal {
            id: row.try_get("id")?,
            symbol: row.try_get("symbol")?,
            timeframe: Timeframe::parse(&tf_str).context("invalid timeframe in signal row")?,
            signal_type: match signal_type.as_str() {
                "buy" => SignalType::Buy,
                "sell" => SignalType::Sell,
                _ => SignalType::Hold,
            },
            confidence: row.try_get("confidence")?,
            entry_price: dec(row, "entry_price")?,
            sl: opt_dec(row, "suggested_sl")?.unwrap_or(Decimal::ZERO),
            tp: opt_dec(row, "suggested_tp")?.unwrap_or(Decimal::ZERO),
            indicator_snapshot: serde_json::from_str(&row.try_get::<String, _>("reasoning_json")?)
                .unwrap_or(serde_json::Value::Null),
            patterns: vec![],
            status: match status.as_str() {
                "active" => SignalStatus::Active,
                "executed" => SignalStatus::Executed,
                "ignored" => SignalStatus::Ignored,
                _ => SignalStatus::Expired,
            },
            created_at: from_ts(row.try_get("created_at")?),
            expires_at: from_ts(row.try_get("expires_at")?),
        })
    }
}

fn signal_type_str(t: SignalType) -> &'static str {
    match t {
        SignalType::Buy => "buy",
        SignalType::Sell => "sell",
        SignalType::Hold => "hold",
    }
}

fn signal_status_str(s: SignalStatus) -> &'static str {
    match s {
        SignalStatus::Active => "active",
        SignalStatus::Expired => "expired",
        SignalStatus::Executed => "executed",
        SignalStatus::Ignored => "ignored",
    }
}

#[async_trait]
impl SignalRepository for SqliteSignalRepository {
    async fn expire_active_and_insert(&self, signal: &TradingSignal) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "UPDATE trading_signals SET status = 'expired' WHERE symbol = ? AND timeframe = ? AND status = 'active'",
        )
        .bind(&signal.symbol)
        .bind(signal.timeframe.as_str())
        .execute(&mut *tx)
        .await
        .context("failed to expire prior active signal")?;

        sqlx::query(
            r#"
            INSERT INTO trading_signals
                (id, symbol, timeframe, signal_type, confidence, entry_price, suggested_sl, suggested_tp, reasoning_json, status, created_at, expires_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(signal.id)
        .bind(&signal.symbol)
        .bind(signal.timeframe.as_str())
        .bind(signal_type_str(signal.signal_type))
        .bind(signal.confidence)
        .bind(signal.entry_price.to_string())
        .bind(signal.sl.to_string())
        .bind(signal.tp.to_string())
        .bind(signal.indicator_snapshot.to_string())
        .bind(signal_status_str(signal.status))
        .bind(to_ts(signal.created_at))
        .bind(to_ts(signal.expires_at))
        .execute(&mut *tx)
        .await
        .context("failed to insert signal")?;

        tx.commit().await?;
        Ok(())
    }

    async fn active_signals(&self) -> Result<Vec<TradingSignal>> {
        let rows = sqlx::query("SELECT * FROM trading_signals WHERE status = 'active'")
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(Self::map_row).collect()
    }

    async fn find_active_for(&self, symbol: &str, timeframe: Timeframe) -> Result<Option<TradingSignal>> {
        let row = sqlx::query(
            "SELECT * FROM trading_signals WHERE symbol = ? AND timeframe = ? AND status = 'active' LIMIT 1",
        )
        .bind(symbol)
        .bind(timeframe.as_str())
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(Self::map_row).transpose()
    }

    async fn set_status(&self, id: uuid::Uuid, status: SignalStatus) -> Result<()> {
        sqlx::query("UPDATE trading_signals SET status = ? WHERE id = ?")
            .bind(signal_status_str(status))
            .bind(id)
            .execute(&self.pool)
            .await
            .context("failed to update signal status")?;
        Ok(())
    }

    async fn expire_stale(&self, now: DateTime<Utc>) -> Result<u64> {
        let result = sqlx::query(
            "UPDATE trading_signals SET status = 'expired' WHERE status = 'active' AND expires_at < ?",
        )
        .bind(to_ts(now))
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }
}

pub struct SqliteCommandRepository {
    pool: SqlitePool,
}

impl SqliteCommandRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn map_row(row: &SqliteRow) -> Result<Command> {
        let payload_json: String = row.try_get("payload_json")?;
        let status: String = row.try_get("status")?;
        let response_json: Option<String> = row.try_get("response_json")?;
        Ok(Command {
            id: row.try_get("id")?,
            account_number: row.try_get("account_number")?,
            payload: serde_json::from_str::<CommandPayload>(&payload_json)
                .context("failed to decode command payload")?,
            status: match status.as_str() {
                "pending" => CommandStatus::Pending,
                "sent" => CommandStatus::Sent,
                "completed" => CommandStatus::Completed,
                _ => CommandStatus::Failed,
            },
            response: response_json.map(|s| serde_json::from_str(&s)).transpose()?,
            created_at: from_ts(row.try_get("created_at")?),
            executed_at: row.try_get::<Option<i64>, _>("completed_at")?.map(from_ts),
        })
    }
}

fn command_status_str(s: CommandStatus) -> &'static str {
    match s {
        CommandStatus::Pending => "pending",
        CommandStatus::Sent => "sent",
        CommandStatus::Completed => "completed",
        CommandStatus::Failed => "failed",
    }
}

#[async_trait]
impl CommandRepository for SqliteCommandRepository {
    async fn insert(&self, command: &Command) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO commands (id, account_number, command_type, payload_json, status, created_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(command.id)
        .bind(command.account_number)
        .bind(format!("{:?}", command.payload.command_type()))
        .bind(serde_json::to_string(&command.payload)?)
        .bind(command_status_str(command.status))
        .bind(to_ts(command.created_at))
        .execute(&self.pool)
        .await
        .context("failed to insert command")?;
        Ok(())
    }

    async fn find(&self, id: uuid::Uuid) -> Result<Option<Command>> {
        let row = sqlx::query("SELECT * FROM commands WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(Self::map_row).transpose()
    }

    async fn pull_pending(&self, account_number: i64, limit: usize) -> Result<Vec<Command>> {
        let mut tx = self.pool.begin().await?;
        let rows = sqlx::query(
            "SELECT id FROM commands WHERE account_number = ? AND status = 'pending' ORDER BY created_at ASC LIMIT ?",
        )
        .bind(account_number)
        .bind(limit as i64)
        .fetch_all(&mut *tx)
        .await?;

        let ids: Vec<uuid::Uuid> = rows
            .iter()
            .map(|r| r.try_get::<uuid::Uuid, _>("id"))
            .collect::<Result<_, _>>()?;

        let mut pulled = Vec::with_capacity(ids.len());
        for id in &ids {
            // CAS-style: only transitions rows still pending, guarding against
            // a second sweeper instance racing the same account.
            let result = sqlx::query("UPDATE commands SET status = 'sent', sent_at = ? WHERE id = ? AND status = 'pending'")
                .bind(to_ts(Utc::now()))
                .bind(id)
                .execute(&mut *tx)
                .await?;
            if result.rows_affected() > 0 {
                let row = sqlx::query("SELECT * FROM commands WHERE id = ?")
                    .bind(id)
                    .fetch_one(&mut *tx)
                    .await?;
                pulled.push(Self::map_row(&row)?);
            }
        }
        tx.commit().await?;
        Ok(pulled)
    }

    async fn mark_sent(&self, ids: &[uuid::Uuid]) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        for id in ids {
            sqlx::query("UPDATE commands SET status = 'sent', sent_at = ? WHERE id = ? AND status = 'pending'")
                .bind(to_ts(Utc::now()))
                .bind(id)
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn complete(&self, id: uuid::Uuid, status: CommandStatus, response: serde_json::Value) -> Result<bool> {
        // Idempotent CAS: only a command still `sent` can complete; a retried
        // `/api/command_response` call for an already-completed id is a no-op.
        let result = sqlx::query(
            "UPDATE commands SET status = ?, response_json = ?, completed_at = ? WHERE id = ? AND status = 'sent'",
        )
        .bind(command_status_str(status))
        .bind(response.to_string())
        .bind(to_ts(Utc::now()))
        .bind(id)
        .execute(&self.pool)
        .await
        .context("failed to complete command")?;
        Ok(result.rows_affected() > 0)
    }

    async fn find_overdue(&self, now: DateTime<Utc>, timeout: chrono::Duration) -> Result<Vec<Command>> {
        let cutoff = to_ts(now - timeout);
        let rows = sqlx::query(
            "SELECT * FROM commands WHERE status IN ('pending', 'sent') AND created_at < ?",
        )
        .bind(cutoff)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(Self::map_row).collect()
    }

    async fn mark_failed(&self, id: uuid::Uuid, reason: &str) -> Result<()> {
        sqlx::query("UPDATE commands SET status = 'failed', response_json = ?, completed_at = ? WHERE id = ?")
            .bind(serde_json::json!({ "error": reason }).to_string())
            .bind(to_ts(Utc::now()))
            .bind(id)
            .execute(&self.pool)
            .await
            .context("failed to mark command failed")?;
        Ok(())
    }

    async fn count_pending(&self) -> Result<usize> {
        let row = sqlx::query("SELECT COUNT(*) as count FROM commands WHERE status = 'pending'")
            .fetch_one(&self.pool)
            .await?;
        Ok(row.try_get::<i64, _>("count")? as usize)
    }
}

pub struct SqliteTradeRepository {
    pool: SqlitePool,
}

impl SqliteTradeRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn map_row(row: &SqliteRow) -> Result<Trade> {
        let direction: String = row.try_get("direction")?;
        let status: String = row.try_get("status")?;
        let source: String = row.try_get("source")?;
        let close_reason: Option<String> = row.try_get("close_reason")?;
        Ok(Trade {
            id: row.try_get("id")?,
            account_number: row.try_get("account_number")?,
            ticket: row.try_get::<Option<i64>, _>("ticket")?.unwrap_or_default(),
            symbol: row.try_get("symbol")?,
            direction: if direction == "buy" { crate::domain::types::Direction::Buy } else { crate::domain::types::Direction::Sell },
            volume: dec(row, "volume")?,
            open_price: dec(row, "entry_price")?,
            open_time: from_ts(row.try_get("open_time")?),
            close_price: opt_dec(row, "close_price")?,
            close_time: row.try_get::<Option<i64>, _>("close_time")?.map(from_ts),
            sl: dec(row, "sl")?,
            tp: dec(row, "tp")?,
            initial_sl: dec(row, "sl")?,
            initial_tp: dec(row, "tp")?,
            profit: opt_dec(row, "profit")?.unwrap_or(Decimal::ZERO),
            commission: opt_dec(row, "commission")?.unwrap_or(Decimal::ZERO),
            swap: opt_dec(row, "swap")?.unwrap_or(Decimal::ZERO),
            status: if status == "open" { TradeStatus::Open } else { TradeStatus::Closed },
            source: match source.as_str() {
                "ea_command" => TradeSource::EaCommand,
                "mt5_manual" => TradeSource::Mt5Manual,
                _ => TradeSource::Autotrade,
            },
            command_id: row.try_get::<Option<uuid::Uuid>, _>("command_id")?,
            signal_id: row.try_get::<Option<uuid::Uuid>, _>("signal_id")?,
            entry_confidence: row.try_get("entry_confidence")?,
            timeframe: row.try_get("timeframe")?,
            close_reason: close_reason.map(|s| match s.as_str() {
                "tp_hit" => CloseReason::TpHit,
                "sl_hit" => CloseReason::SlHit,
                "trailing_stop" => CloseReason::TrailingStop,
                "timeout" => CloseReason::Timeout,
                "opportunity_cost" => CloseReason::OpportunityCost,
                _ => CloseReason::Manual,
            }),
            mfe: opt_dec(row, "mfe")?.unwrap_or(Decimal::ZERO),
            mae: opt_dec(row, "mae")?.unwrap_or(Decimal::ZERO),
            trailing_stop_active: row.try_get("trailing_stop_active")?,
            trailing_stop_moves: row.try_get::<i64, _>("trailing_stop_moves")? as u32,
            entry_bid: opt_dec(row, "entry_bid")?,
            entry_ask: opt_dec(row, "entry_ask")?,
            entry_spread: opt_dec(row, "entry_spread")?,
            session: row.try_get("session")?,
        })
    }
}

fn direction_str(d: crate::domain::types::Direction) -> &'static str {
    match d {
        crate::domain::types::Direction::Buy => "buy",
        crate::domain::types::Direction::Sell => "sell",
    }
}

fn source_str(s: TradeSource) -> &'static str {
    match s {
        TradeSource::Autotrade => "autotrade",
        TradeSource::EaCommand => "ea_command",
        TradeSource::Mt5Manual => "mt5_manual",
    }
}

fn close_reason_str(r: CloseReason) -> &'static str {
    match r {
        CloseReason::TpHit => "tp_hit",
        CloseReason::SlHit => "sl_hit",
        CloseReason::TrailingStop => "trailing_stop",
        CloseReason::Manual => "manual",
        CloseReason::Timeout => "timeout",
        CloseReason::OpportunityCost => "opportunity_cost",
    }
}

#[async_trait]
impl TradeRepository for SqliteTradeRepository {
    async fn insert_open(&self, trade: &Trade) -> Result<()> {
        // Enforces "at most one open trade per (account, symbol)" (§3, §5):
        // a prior open row for the same pair makes this a conflict, not an
        // upsert.
        let existing = self.find_open_for_symbol(trade.account_number, &trade.symbol).await?;
        if existing.is_some() {
            return Err(PersistenceError::Conflict(format!(
                "open trade already exists for account {} symbol {}",
                trade.account_number, trade.symbol
            ))
            .into());
        }

        sqlx::query(
            r#"
            INSERT INTO trades
                (id, account_number, ticket, symbol, direction, volume, entry_price, sl, tp, source,
                 signal_id, timeframe, status, open_time, command_id, entry_confidence, commission, swap,
                 entry_bid, entry_ask, entry_spread, session)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, 'open', ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(trade.id)
        .bind(trade.account_number)
        .bind(trade.ticket)
        .bind(&trade.symbol)
        .bind(direction_str(trade.direction))
        .bind(trade.volume.to_string())
        .bind(trade.open_price.to_string())
        .bind(trade.sl.to_string())
        .bind(trade.tp.to_string())
        .bind(source_str(trade.source))
        .bind(trade.signal_id)
        .bind(&trade.timeframe)
        .bind(to_ts(trade.open_time))
        .bind(trade.command_id)
        .bind(trade.entry_confidence)
        .bind(trade.commission.to_string())
        .bind(trade.swap.to_string())
        .bind(trade.entry_bid.map(|d| d.to_string()))
        .bind(trade.entry_ask.map(|d| d.to_string()))
        .bind(trade.entry_spread.map(|d| d.to_string()))
        .bind(&trade.session)
        .execute(&self.pool)
        .await
        .context("failed to insert open trade")?;
        Ok(())
    }

    async fn find_open_for_symbol(&self, account_number: i64, symbol: &str) -> Result<Option<Trade>> {
        let row = sqlx::query(
            "SELECT * FROM trades WHERE account_number = ? AND symbol = ? AND status = 'open' LIMIT 1",
        )
        .bind(account_number)
        .bind(symbol)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(Self::map_row).transpose()
    }

    async fn open_trades_for_account(&self, account_number: i64) -> Result<Vec<Trade>> {
        let rows = sqlx::query("SELECT * FROM trades WHERE account_number = ? AND status = 'open'")
            .bind(account_number)
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(Self::map_row).collect()
    }

    async fn open_trades_count(&self, account_number: i64) -> Result<usize> {
        let row = sqlx::query("SELECT COUNT(*) as count FROM trades WHERE account_number = ? AND status = 'open'")
            .bind(account_number)
            .fetch_one(&self.pool)
            .await?;
        Ok(row.try_get::<i64, _>("count")? as usize)
    }

    async fn open_trades_for_symbols(&self, account_number: i64, symbols: &[String]) -> Result<Vec<Trade>> {
        if symbols.is_empty() {
            return Ok(vec![]);
        }
        let placeholders = symbols.iter().map(|_| "?").collect::<Vec<_>>().join(",");
        let sql = format!(
            "SELECT * FROM trades WHERE account_number = ? AND status = 'open' AND symbol IN ({})",
            placeholders
        );
        let mut query = sqlx::query(&sql).bind(account_number);
        for symbol in symbols {
            query = query.bind(symbol);
        }
        let rows = query.fetch_all(&self.pool).await?;
        rows.iter().map(Self::map_row).collect()
    }

    async fn open_trades_for_timeframe(&self, account_number: i64, symbol: &str, timeframe: &str) -> Result<usize> {
        let row = sqlx::query(
            "SELECT COUNT(*) as count FROM trades WHERE account_number = ? AND symbol = ? AND timeframe = ? AND status = 'open'",
        )
        .bind(account_number)
        .bind(symbol)
        .bind(timeframe)
        .fetch_one(&self.pool)
        .await?;
        Ok(row.try_get::<i64, _>("count")? as usize)
    }

    async fn find_by_ticket(&self, ticket: i64) -> Result<Option<Trade>> {
        let row = sqlx::query("SELECT * FROM trades WHERE ticket = ?")
            .bind(ticket)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(Self::map_row).transpose()
    }

    async fn update_sl_tp(&self, trade_id: uuid::Uuid, sl: Decimal, tp: Decimal) -> Result<()> {
        sqlx::query("UPDATE trades SET sl = ?, tp = ? WHERE id = ?")
            .bind(sl.to_string())
            .bind(tp.to_string())
            .bind(trade_id)
            .execute(&self.pool)
            .await
            .context("failed to update sl/tp")?;
        Ok(())
    }

    async fn mark_trailing_stop(&self, trade_id: uuid::Uuid, sl: Decimal, moves: u32) -> Result<()> {
        sqlx::query("UPDATE trades SET sl = ?, trailing_stop_active = 1, trailing_stop_moves = ? WHERE id = ?")
            .bind(sl.to_string())
            .bind(moves as i64)
            .bind(trade_id)
            .execute(&self.pool)
            .await
            .context("failed to mark trailing stop")?;
        Ok(())
    }

    async fn close(
        &self,
        trade_id: uuid::Uuid,
        close_price: Decimal,
        close_time: DateTime<Utc>,
        profit: Decimal,
        reason: CloseReason,
    ) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE trades
            SET status = 'closed', close_price = ?, close_time = ?, profit = ?, close_reason = ?
            WHERE id = ?
            "#,
        )
        .bind(close_price.to_string())
        .bind(to_ts(close_time))
        .bind(profit.to_string())
        .bind(close_reason_str(reason))
        .bind(trade_id)
        .execute(&self.pool)
        .await
        .context("failed to close trade")?;
        Ok(())
    }

    async fn append_history_event(&self, event: &TradeHistoryEvent) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO trade_history_events (id, trade_id, event_type, detail_json, timestamp)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(event.id)
        .bind(event.trade_id)
        .bind(&event.event_type)
        .bind(serde_json::to_string(&serde_json::json!({
            "old_value": event.old_value.map(|d| d.to_string()),
            "new_value": event.new_value.map(|d| d.to_string()),
            "reason": event.reason,
            "source": event.source,
            "price_at_change": event.price_at_change.map(|d| d.to_string()),
            "spread_at_change": event.spread_at_change.map(|d| d.to_string()),
        }))?)
        .bind(to_ts(event.timestamp))
        .execute(&self.pool)
        .await
        .context("failed to append trade history event")?;
        Ok(())
    }

    async fn recent_closed(&self, account_number: i64, limit: usize) -> Result<Vec<Trade>> {
        let rows = sqlx::query(
            "SELECT * FROM trades WHERE account_number = ? AND status = 'closed' ORDER BY close_time DESC LIMIT ?",
        )
        .bind(account_number)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(Self::map_row).collect()
    }

    async fn count_all_open(&self) -> Result<usize> {
        let row = sqlx::query("SELECT COUNT(*) as count FROM trades WHERE status = 'open'")
            .fetch_one(&self.pool)
            .await?;
        Ok(row.try_get::<i64, _>("count")? as usize)
    }
}

pub struct SqliteSymbolConfigRepository {
    pool: SqlitePool,
}

impl SqliteSymbolConfigRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn map_row(row: &SqliteRow) -> Result<SymbolTradingConfig> {
        let status: String = row.try_get("status")?;
        Ok(SymbolTradingConfig {
            account_number: row.try_get("account_number")?,
            symbol: row.try_get("symbol")?,
            direction: row.try_get("direction")?,
            min_confidence_threshold: row.try_get("min_confidence_threshold")?,
            risk_multiplier: row.try_get("risk_multiplier")?,
            status: match status.as_str() {
                "paused" => SymbolStatus::Paused,
                "disabled" => SymbolStatus::Disabled,
                _ => SymbolStatus::Active,
            },
            rolling_winrate: row.try_get("rolling_winrate")?,
            consecutive_wins: row.try_get::<i64, _>("consecutive_wins")? as u32,
            consecutive_losses: row.try_get::<i64, _>("consecutive_losses")? as u32,
            pause_reason: row.try_get("pause_reason")?,
            paused_until: row.try_get::<Option<i64>, _>("paused_until")?.map(from_ts),
            last_sl_hit_at: row.try_get::<Option<i64>, _>("last_sl_hit_at")?.map(from_ts),
        })
    }
}

fn symbol_status_str(s: SymbolStatus) -> &'static str {
    match s {
        SymbolStatus::Active => "active",
        SymbolStatus::Paused => "paused",
        SymbolStatus::Disabled => "disabled",
    }
}

#[async_trait]
impl SymbolConfigRepository for SqliteSymbolConfigRepository {
    async fn get_or_create(&self, account_number: i64, symbol: &str) -> Result<SymbolTradingConfig> {
        let row = sqlx::query("SELECT * FROM symbol_trading_configs WHERE account_number = ? AND symbol = ?")
            .bind(account_number)
            .bind(symbol)
            .fetch_optional(&self.pool)
            .await?;
        if let Some(row) = row {
            return Self::map_row(&row);
        }

        let config = SymbolTradingConfig::new(account_number, symbol.to_string());
        self.save(&config).await?;
        Ok(config)
    }

    async fn save(&self, config: &SymbolTradingConfig) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO symbol_trading_configs
                (account_number, symbol, direction, min_confidence_threshold, risk_multiplier, status, rolling_winrate, consecutive_wins, consecutive_losses, pause_reason, paused_until, last_sl_hit_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(account_number, symbol) DO UPDATE SET
                direction = excluded.direction,
                min_confidence_threshold = excluded.min_confidence_threshold,
                risk_multiplier = excluded.risk_multiplier,
                status = excluded.status,
                rolling_winrate = excluded.rolling_winrate,
                consecutive_wins = excluded.consecutive_wins,
                consecutive_losses = excluded.consecutive_losses,
                pause_reason = excluded.pause_reason,
                paused_until = excluded.paused_until,
                last_sl_hit_at = excluded.last_sl_hit_at
            "#,
        )
        .bind(config.account_number)
        .bind(&config.symbol)
        .bind(&config.direction)
        .bind(config.min_confidence_threshold)
        .bind(config.risk_multiplier)
        .bind(symbol_status_str(config.status))
        .bind(config.rolling_winrate)
        .bind(config.consecutive_wins as i64)
        .bind(config.consecutive_losses as i64)
        .bind(&config.pause_reason)
        .bind(config.paused_until.map(to_ts))
        .bind(config.last_sl_hit_at.map(to_ts))
        .execute(&self.pool)
        .await
        .context("failed to save symbol trading config")?;
        Ok(())
    }
}

pub struct SqliteIndicatorScoreRepository {
    pool: SqlitePool,
}

impl SqliteIndicatorScoreRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl IndicatorScoreRepository for SqliteIndicatorScoreRepository {
    async fn get(&self, symbol: &str, timeframe: Timeframe, indicator_name: &str) -> Result<Option<IndicatorScore>> {
        let row = sqlx::query(
            "SELECT * FROM indicator_scores WHERE symbol = ? AND timeframe = ? AND indicator_name = ?",
        )
        .bind(symbol)
        .bind(timeframe.as_str())
        .bind(indicator_name)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|row| -> Result<IndicatorScore> {
            let tf_str: String = row.try_get("timeframe")?;
            Ok(IndicatorScore {
                symbol: row.try_get("symbol")?,
                timeframe: Timeframe::parse(&tf_str).context("invalid timeframe")?,
                indicator_name: row.try_get("indicator_name")?,
                win_rate: row.try_get("win_rate")?,
                profit_factor: row.try_get("profit_factor")?,
                total_signals: row.try_get::<i64, _>("total_signals")? as u64,
                last_updated: from_ts(row.try_get("last_updated")?),
            })
        })
        .transpose()
    }

    async fn upsert(&self, score: &IndicatorScore) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO indicator_scores
                (symbol, timeframe, indicator_name, win_rate, profit_factor, total_signals, last_updated)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(symbol, timeframe, indicator_name) DO UPDATE SET
                win_rate = excluded.win_rate,
                profit_factor = excluded.profit_factor,
                total_signals = excluded.total_signals,
                last_updated = excluded.last_updated
            "#,
        )
        .bind(&score.symbol)
        .bind(score.timeframe.as_str())
        .bind(&score.indicator_name)
        .bind(score.win_rate)
        .bind(score.profit_factor)
        .bind(score.total_signals as i64)
        .bind(to_ts(score.last_updated))
        .execute(&self.pool)
        .await
        .context("failed to upsert indicator score")?;
        Ok(())
    }
}

pub struct SqliteProtectionRepository {
    pool: SqlitePool,
}

impl SqliteProtectionRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn map_row(row: &SqliteRow) -> Result<ProtectionState> {
        let date_str: String = row.try_get("tracking_date")?;
        Ok(ProtectionState {
            account_number: row.try_get("account_number")?,
            protection_enabled: row.try_get("protection_enabled")?,
            max_daily_loss_percent: row.try_get("max_daily_loss_percent")?,
            max_daily_loss_eur: opt_dec(row, "max_daily_loss_eur")?,
            max_total_drawdown_percent: row.try_get("max_total_drawdown_percent")?,
            pause_after_consecutive_losses: row.try_get::<i64, _>("pause_after_consecutive_losses")? as u32,
            circuit_breaker_tripped: row.try_get("circuit_breaker_tripped")?,
            tracking_date: NaiveDate::parse_from_str(&date_str, "%Y-%m-%d").context("invalid tracking_date")?,
            daily_pnl: dec(row, "daily_pnl")?,
            limit_reached: row.try_get("limit_reached")?,
            auto_trading_disabled_at: row.try_get::<Option<i64>, _>("auto_trading_disabled_at")?.map(from_ts),
            initial_balance: dec(row, "initial_balance")?,
            consecutive_command_failures: row.try_get::<i64, _>("consecutive_command_failures")? as u32,
            command_breaker_tripped_at: row.try_get::<Option<i64>, _>("command_breaker_tripped_at")?.map(from_ts),
        })
    }
}

#[async_trait]
impl ProtectionRepository for SqliteProtectionRepository {
    async fn get_or_create(&self, account_number: i64, initial_balance: Decimal) -> Result<ProtectionState> {
        let row = sqlx::query("SELECT * FROM protection_states WHERE account_number = ?")
            .bind(account_number)
            .fetch_optional(&self.pool)
            .await?;
        if let Some(row) = row {
            return Self::map_row(&row);
        }

        let state = ProtectionState::new(account_number, initial_balance, Utc::now().date_naive());
        self.save(&state).await?;
        Ok(state)
    }

    async fn save(&self, state: &ProtectionState) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO protection_states
                (account_number, protection_enabled, max_daily_loss_percent, max_daily_loss_eur, max_total_drawdown_percent, pause_after_consecutive_losses, circuit_breaker_tripped, tracking_date, daily_pnl, limit_reached, auto_trading_disabled_at, initial_balance, consecutive_command_failures, command_breaker_tripped_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(account_number) DO UPDATE SET
                protection_enabled = excluded.protection_enabled,
                max_daily_loss_percent = excluded.max_daily_loss_percent,
                max_daily_loss_eur = excluded.max_daily_loss_eur,
                max_total_drawdown_percent = excluded.max_total_drawdown_percent,
                pause_after_consecutive_losses = excluded.pause_after_consecutive_losses,
                circuit_breaker_tripped = excluded.circuit_breaker_tripped,
                tracking_date = excluded.tracking_date,
                daily_pnl = excluded.daily_pnl,
                limit_reached = excluded.limit_reached,
                auto_trading_disabled_at = excluded.auto_trading_disabled_at,
                initial_balance = excluded.initial_balance,
                consecutive_command_failures = excluded.consecutive_command_failures,
                command_breaker_tripped_at = excluded.command_breaker_tripped_at
            "#,
        )
        .bind(state.account_number)
        .bind(state.protection_enabled)
        .bind(state.max_daily_loss_percent)
        .bind(state.max_daily_loss_eur.map(|d| d.to_string()))
        .bind(state.max_total_drawdown_percent)
        .bind(state.pause_after_consecutive_losses as i64)
        .bind(state.circuit_breaker_tripped)
        .bind(state.tracking_date.format("%Y-%m-%d").to_string())
        .bind(state.daily_pnl.to_string())
        .bind(state.limit_reached)
        .bind(state.auto_trading_disabled_at.map(to_ts))
        .bind(state.initial_balance.to_string())
        .bind(state.consecutive_command_failures as i64)
        .bind(state.command_breaker_tripped_at.map(to_ts))
        .execute(&self.pool)
        .await
        .context("failed to save protection state")?;
        Ok(())
    }
}

pub struct SqliteDecisionLogRepository {
    pool: SqlitePool,
}

impl SqliteDecisionLogRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

fn decision_type_str(t: DecisionType) -> &'static str {
    match t {
        DecisionType::SignalEvaluation => "signal_evaluation",
        DecisionType::RiskCheck => "risk_check",
        DecisionType::ProtectionTrip => "protection_trip",
        DecisionType::ConnectionEvent => "connection_event",
    }
}

fn impact_level_str(i: ImpactLevel) -> &'static str {
    match i {
        ImpactLevel::Low => "low",
        ImpactLevel::Medium => "medium",
        ImpactLevel::High => "high",
        ImpactLevel::Critical => "critical",
    }
}

#[async_trait]
impl DecisionLogRepository for SqliteDecisionLogRepository {
    async fn append(&self, log: &AiDecisionLog) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO ai_decision_logs
                (id, decision_type, decision, symbol, timeframe, primary_reason, detailed_reasoning_json, impact_level, confidence_score, risk_score, timestamp)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(log.id)
        .bind(decision_type_str(log.decision_type))
        .bind(&log.decision)
        .bind(&log.symbol)
        .bind(&log.timeframe)
        .bind(&log.primary_reason)
        .bind(log.detailed_reasoning.to_string())
        .bind(impact_level_str(log.impact_level))
        .bind(log.confidence_score)
        .bind(log.risk_score)
        .bind(to_ts(log.timestamp))
        .execute(&self.pool)
        .await
        .context("failed to append decision log")?;
        Ok(())
    }

    async fn delete_older_than(&self, cutoff: DateTime<Utc>) -> Result<u64> {
        let result = sqlx::query("DELETE FROM ai_decision_logs WHERE timestamp < ?")
            .bind(to_ts(cutoff))
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}
