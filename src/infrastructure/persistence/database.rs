use anyhow::{Context, Result};

use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::path::Path;
use std::str::FromStr;
use tokio::fs;
use tracing::info;

/// Singleton database wrapper
#[allow(dead_code)]
#[derive(Clone)]
pub struct Database {
    pub pool: SqlitePool,
}

impl Database {
    pub async fn new(db_url: &str) -> Result<Self> {
        // Ensure the directory exists if it's a file path
        if let Some(path_part) = db_url.strip_prefix("sqlite://") {
            let path = Path::new(path_part);
            if let Some(parent) = path.parent()
                && !parent.exists()
            {
                fs::create_dir_all(parent)
                    .await
                    .context("Failed to create database directory")?;
            }
        }

        let options = SqliteConnectOptions::from_str(db_url)?
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal); // Better for concurrency

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await
            .context("Failed to connect to SQLite database")?;

        info!("Connected to database: {}", db_url);

        let db = Self { pool };
        db.init().await?;

        Ok(db)
    }

    /// Initialize database schema
    async fn init(&self) -> Result<()> {
        let mut conn = self.pool.acquire().await?;

        // 1. Accounts Table
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS accounts (
                account_number INTEGER PRIMARY KEY,
                api_key_hash TEXT NOT NULL,
                broker TEXT NOT NULL,
                platform TEXT NOT NULL,
                balance TEXT NOT NULL,
                equity TEXT NOT NULL,
                margin TEXT NOT NULL,
                free_margin TEXT NOT NULL,
                last_heartbeat INTEGER,
                auto_trading_enabled BOOLEAN NOT NULL DEFAULT 1,
                created_at INTEGER NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_accounts_api_key_hash
            ON accounts (api_key_hash);
            "#,
        )
        .execute(&mut *conn)
        .await
        .context("Failed to create accounts table")?;

        // 2. Broker Symbols Table
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS broker_symbols (
                symbol TEXT PRIMARY KEY,
                volume_min TEXT NOT NULL,
                volume_max TEXT NOT NULL,
                volume_step TEXT NOT NULL,
                stops_level INTEGER NOT NULL,
                freeze_level INTEGER NOT NULL,
                digits INTEGER NOT NULL,
                point_value TEXT NOT NULL,
                trade_mode TEXT NOT NULL
            );
            "#,
        )
        .execute(&mut *conn)
        .await
        .context("Failed to create broker_symbols table")?;

        // 3. Subscribed Symbols Table
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS subscribed_symbols (
                account_number INTEGER NOT NULL,
                symbol TEXT NOT NULL,
                PRIMARY KEY (account_number, symbol)
            );
            "#,
        )
        .execute(&mut *conn)
        .await
        .context("Failed to create subscribed_symbols table")?;

        // 4. Ticks Table
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS ticks (
                symbol TEXT NOT NULL,
                bid TEXT NOT NULL,
                ask TEXT NOT NULL,
                spread TEXT NOT NULL,
                volume INTEGER NOT NULL,
                tradeable BOOLEAN NOT NULL,
                timestamp INTEGER NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_ticks_symbol_time
            ON ticks (symbol, timestamp);
            "#,
        )
        .execute(&mut *conn)
        .await
        .context("Failed to create ticks table")?;

        // 5. OHLC Candles Table (one per timeframe, retained per §4.4 policy)
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS ohlc_candles (
                symbol TEXT NOT NULL,
                timeframe TEXT NOT NULL,
                open TEXT NOT NULL,
                high TEXT NOT NULL,
                low TEXT NOT NULL,
                close TEXT NOT NULL,
                volume INTEGER NOT NULL,
                timestamp INTEGER NOT NULL,
                PRIMARY KEY (symbol, timeframe, timestamp)
            );
            CREATE INDEX IF NOT EXISTS idx_candles_symbol_tf_time
            ON ohlc_candles (symbol, timeframe, timestamp);
            "#,
        )
        .execute(&mut *conn)
        .await
        .context("Failed to create ohlc_candles table")?;

        // 6. Trading Signals Table
        // "at most one active signal per (symbol, timeframe)" (§3, §5, §8
        // invariant 2) is enforced in the repository layer via
        // expire_active_and_insert, not a DB constraint, because SQLite has
        // no partial-unique-index support old enough to rely on uniformly.
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS trading_signals (
                id TEXT PRIMARY KEY,
                symbol TEXT NOT NULL,
                timeframe TEXT NOT NULL,
                signal_type TEXT NOT NULL,
                confidence REAL NOT NULL,
                entry_price TEXT NOT NULL,
                suggested_sl TEXT,
                suggested_tp TEXT,
                reasoning_json TEXT NOT NULL,
                status TEXT NOT NULL,
                created_at INTEGER NOT NULL,
                expires_at INTEGER NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_signals_symbol_tf_status
            ON trading_signals (symbol, timeframe, status);
            "#,
        )
        .execute(&mut *conn)
        .await
        .context("Failed to create trading_signals table")?;

        // 7. Commands Table (client-generated UUID ids, §9)
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS commands (
                id TEXT PRIMARY KEY,
                account_number INTEGER NOT NULL,
                command_type TEXT NOT NULL,
                payload_json TEXT NOT NULL,
                status TEXT NOT NULL,
                response_json TEXT,
                created_at INTEGER NOT NULL,
                sent_at INTEGER,
                completed_at INTEGER
            );
            CREATE INDEX IF NOT EXISTS idx_commands_account_status
            ON commands (account_number, status);
            "#,
        )
        .execute(&mut *conn)
        .await
        .context("Failed to create commands table")?;

        // 8. Trades Table
        // "at most one open trade per (account, symbol)" (§3, §5, §8
        // invariant 1) is likewise enforced at the repository layer.
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS trades (
                id TEXT PRIMARY KEY,
                account_number INTEGER NOT NULL,
                ticket INTEGER,
                symbol TEXT NOT NULL,
                direction TEXT NOT NULL,
                volume TEXT NOT NULL,
                entry_price TEXT NOT NULL,
                sl TEXT NOT NULL,
                tp TEXT NOT NULL,
                source TEXT NOT NULL,
                signal_id TEXT,
                timeframe TEXT,
                status TEXT NOT NULL,
                open_time INTEGER NOT NULL,
                close_time INTEGER,
                close_price TEXT,
                profit TEXT,
                close_reason TEXT,
                command_id TEXT,
                entry_confidence REAL,
                commission TEXT NOT NULL DEFAULT '0',
                swap TEXT NOT NULL DEFAULT '0',
                mfe TEXT NOT NULL DEFAULT '0',
                mae TEXT NOT NULL DEFAULT '0',
                trailing_stop_active BOOLEAN NOT NULL DEFAULT 0,
                trailing_stop_moves INTEGER NOT NULL DEFAULT 0,
                entry_bid TEXT,
                entry_ask TEXT,
                entry_spread TEXT,
                session TEXT
            );
            CREATE INDEX IF NOT EXISTS idx_trades_account_symbol_status
            ON trades (account_number, symbol, status);
            CREATE UNIQUE INDEX IF NOT EXISTS idx_trades_ticket
            ON trades (ticket) WHERE ticket IS NOT NULL;
            "#,
        )
        .execute(&mut *conn)
        .await
        .context("Failed to create trades table")?;

        // 9. Trade History Events Table
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS trade_history_events (
                id TEXT PRIMARY KEY,
                trade_id TEXT NOT NULL,
                event_type TEXT NOT NULL,
                detail_json TEXT NOT NULL,
                timestamp INTEGER NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_trade_history_trade_id
            ON trade_history_events (trade_id);
            "#,
        )
        .execute(&mut *conn)
        .await
        .context("Failed to create trade_history_events table")?;

        // 10. Symbol Trading Configs Table (adaptive per-account config, §4.13)
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS symbol_trading_configs (
                account_number INTEGER NOT NULL,
                symbol TEXT NOT NULL,
                direction TEXT,
                min_confidence_threshold REAL NOT NULL,
                risk_multiplier REAL NOT NULL,
                status TEXT NOT NULL,
                rolling_winrate REAL NOT NULL,
                consecutive_wins INTEGER NOT NULL,
                consecutive_losses INTEGER NOT NULL,
                pause_reason TEXT,
                paused_until INTEGER,
                last_sl_hit_at INTEGER,
                PRIMARY KEY (account_number, symbol)
            );
            "#,
        )
        .execute(&mut *conn)
        .await
        .context("Failed to create symbol_trading_configs table")?;

        // 11. Indicator Scores Table (global, not account-scoped, §9)
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS indicator_scores (
                symbol TEXT NOT NULL,
                timeframe TEXT NOT NULL,
                indicator_name TEXT NOT NULL,
                win_rate REAL NOT NULL,
                profit_factor REAL NOT NULL,
                total_signals INTEGER NOT NULL,
                last_updated INTEGER NOT NULL,
                PRIMARY KEY (symbol, timeframe, indicator_name)
            );
            "#,
        )
        .execute(&mut *conn)
        .await
        .context("Failed to create indicator_scores table")?;

        // 12. Protection States Table (1:1 per account, §4.12)
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS protection_states (
                account_number INTEGER PRIMARY KEY,
                protection_enabled BOOLEAN NOT NULL,
                max_daily_loss_percent REAL NOT NULL,
                max_daily_loss_eur TEXT,
                max_total_drawdown_percent REAL NOT NULL,
                pause_after_consecutive_losses INTEGER NOT NULL,
                circuit_breaker_tripped BOOLEAN NOT NULL,
                tracking_date DATE NOT NULL,
                daily_pnl TEXT NOT NULL,
                limit_reached BOOLEAN NOT NULL,
                auto_trading_disabled_at INTEGER,
                initial_balance TEXT NOT NULL,
                consecutive_command_failures INTEGER NOT NULL DEFAULT 0,
                command_breaker_tripped_at INTEGER
            );
            "#,
        )
        .execute(&mut *conn)
        .await
        .context("Failed to create protection_states table")?;

        // 13. AI Decision Log Table (append-only, 48h default retention, §9)
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS ai_decision_logs (
                id TEXT PRIMARY KEY,
                decision_type TEXT NOT NULL,
                decision TEXT NOT NULL,
                symbol TEXT NOT NULL,
                timeframe TEXT,
                primary_reason TEXT NOT NULL,
                detailed_reasoning_json TEXT NOT NULL,
                impact_level TEXT NOT NULL,
                confidence_score REAL,
                risk_score REAL,
                timestamp INTEGER NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_decision_logs_timestamp
            ON ai_decision_logs (timestamp);
            "#,
        )
        .execute(&mut *conn)
        .await
        .context("Failed to create ai_decision_logs table")?;

        info!("Database schema initialized.");
        Ok(())
    }
}
