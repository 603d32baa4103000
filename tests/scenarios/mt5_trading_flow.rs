//! End-to-end scenario tests (§8) against a real SQLite-backed
//! `DecisionPipeline`, one temp file per test so the pool's multiple
//! connections all see the same schema and rows.

use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use rustrade::application::decision::pipeline::{DecisionOutcome, DecisionPipeline};
use rustrade::domain::errors::DecisionRejection;
use rustrade::domain::ports::*;
use rustrade::domain::timeframe::Timeframe;
use rustrade::domain::types::*;
use rustrade::infrastructure::cache::CommandQueue;
use rustrade::infrastructure::external::{InMemoryMlScoreSource, InMemoryNewsWindowSource, InMemoryParameterSource};
use rustrade::infrastructure::persistence::repositories::{
    SqliteAccountRepository, SqliteCommandRepository, SqliteDecisionLogRepository, SqliteProtectionRepository,
    SqliteSignalRepository, SqliteSymbolConfigRepository, SqliteSymbolRepository, SqliteTickRepository,
    SqliteTradeRepository,
};
use rustrade::infrastructure::persistence::Database;
use std::sync::Arc;
use uuid::Uuid;

/// No Redis in a test binary; the pipeline treats an enqueue failure as a
/// recoverable DB-poll case (it already logs and continues), so a queue
/// that always fails exercises exactly that path instead of silently no-op
/// succeeding on writes never meant to be observed.
struct NullCommandQueue;

#[async_trait]
impl CommandQueue for NullCommandQueue {
    async fn enqueue(&self, _account_number: i64, _command: &Command) -> Result<()> {
        anyhow::bail!("no queue in tests")
    }
    async fn pop_batch(&self, _account_number: i64, _n: usize) -> Result<Vec<Command>> {
        Ok(vec![])
    }
    async fn publish_response(&self, _command_id: Uuid, _payload: &serde_json::Value) -> Result<()> {
        Ok(())
    }
}

async fn test_db() -> Database {
    let path = std::env::temp_dir().join(format!("mt5backend_test_{}.db", Uuid::new_v4()));
    Database::new(&format!("sqlite://{}", path.display())).await.expect("test db should open")
}

fn eurusd() -> BrokerSymbol {
    BrokerSymbol {
        symbol: "EURUSD".into(),
        volume_min: dec!(0.01),
        volume_max: dec!(100),
        volume_step: dec!(0.01),
        stops_level: 10,
        freeze_level: 5,
        digits: 5,
        point_value: dec!(1),
        trade_mode: "full".into(),
    }
}

/// Wires a full pipeline against a fresh database, with the standard
/// `EURUSD` spec, an active account, a fresh tick and a default symbol
/// config (§4.7 dependencies).
async fn build_pipeline(db: &Database, balance: Decimal) -> Result<(Arc<DecisionPipeline>, i64)> {
    let pool = db.pool.clone();
    let accounts: Arc<dyn AccountRepository> = Arc::new(SqliteAccountRepository::new(pool.clone()));
    let symbols: Arc<dyn SymbolRepository> = Arc::new(SqliteSymbolRepository::new(pool.clone()));
    let ticks: Arc<dyn TickRepository> = Arc::new(SqliteTickRepository::new(pool.clone()));
    let signals: Arc<dyn SignalRepository> = Arc::new(SqliteSignalRepository::new(pool.clone()));
    let commands: Arc<dyn CommandRepository> = Arc::new(SqliteCommandRepository::new(pool.clone()));
    let trades: Arc<dyn TradeRepository> = Arc::new(SqliteTradeRepository::new(pool.clone()));
    let symbol_configs: Arc<dyn SymbolConfigRepository> = Arc::new(SqliteSymbolConfigRepository::new(pool.clone()));
    let protection: Arc<dyn ProtectionRepository> = Arc::new(SqliteProtectionRepository::new(pool.clone()));
    let decision_logs: Arc<dyn DecisionLogRepository> = Arc::new(SqliteDecisionLogRepository::new(pool.clone()));

    let account_number = 10001;
    let (_, _) = accounts.get_or_create(account_number, "BX", "MT5", "hash").await?;
    accounts.update_heartbeat(account_number, balance, balance, Decimal::ZERO, balance, Utc::now()).await?;
    symbols.upsert_symbol_spec(&eurusd()).await?;

    let tick = Tick::new("EURUSD".into(), dec!(1.10000), dec!(1.10010), dec!(100), Utc::now(), true);
    ticks.insert_batch(&[tick]).await?;

    Ok((
        Arc::new(DecisionPipeline {
            accounts,
            symbols,
            ticks,
            signals,
            commands,
            trades,
            symbol_configs,
            protection,
            decision_log: decision_logs,
            queue: Arc::new(NullCommandQueue),
            news: Arc::new(InMemoryNewsWindowSource::default()),
            ml_scores: Arc::new(InMemoryMlScoreSource::default()),
            parameters: Arc::new(InMemoryParameterSource::default()),
            max_signal_age_secs: 300,
            watchdog_heartbeat_lost_secs: 90,
            max_open_positions_global: 20,
            max_open_positions_per_timeframe: 1,
            max_spread_points: 30,
            base_risk_pct: 1.0,
            cb_cooldown_secs: 300,
        }),
        account_number,
    ))
}

fn buy_signal(confidence: f64) -> TradingSignal {
    TradingSignal::new(
        "EURUSD".into(),
        Timeframe::H1,
        SignalType::Buy,
        confidence,
        dec!(1.10000),
        dec!(1.09800),
        dec!(1.10400),
        serde_json::Value::Null,
        vec![],
        Utc::now(),
    )
}

/// Scenario 1: connect is idempotent on account number, and the plaintext
/// key is only ever returned on the call that actually created the row.
#[tokio::test]
async fn new_account_connect_is_idempotent() -> Result<()> {
    let db = test_db().await;
    let accounts: Arc<dyn AccountRepository> = Arc::new(SqliteAccountRepository::new(db.pool.clone()));

    let (first, first_is_new) = accounts.get_or_create(10001, "BX", "MT5", "hash-a").await?;
    assert!(first_is_new);

    let (second, second_is_new) = accounts.get_or_create(10001, "BX", "MT5", "hash-b").await?;
    assert!(!second_is_new);
    assert_eq!(first.account_number, second.account_number);
    // the hash recorded on first connect is never overwritten by a later one
    assert_eq!(second.api_key_hash, "hash-a");

    Ok(())
}

/// Scenario 2: a fresh, confident signal on a connected, auto-trading
/// account with a live tick produces exactly one approved `OPEN_TRADE`
/// command and the signal transitions to `executed`.
#[tokio::test]
async fn signal_then_trade_is_approved() -> Result<()> {
    let db = test_db().await;
    let (pipeline, account_number) = build_pipeline(&db, dec!(1000)).await?;
    let signal = buy_signal(72.0);

    let outcome = pipeline.evaluate(account_number, &signal).await?;

    match outcome {
        DecisionOutcome::Approved { .. } => {}
        DecisionOutcome::Rejected(reason) => panic!("expected approval, got {:?}", reason),
    }

    let refreshed = pipeline.signals.active_signals().await?;
    assert!(refreshed.iter().all(|s| s.id != signal.id), "signal should no longer be active once executed");

    Ok(())
}

/// Scenario 3: a second signal for a symbol that already has an open
/// position is rejected with `PositionLimit`, and no second command is
/// emitted.
#[tokio::test]
async fn duplicate_open_is_blocked() -> Result<()> {
    let db = test_db().await;
    let (pipeline, account_number) = build_pipeline(&db, dec!(1000)).await?;

    let open_trade = Trade {
        id: Uuid::new_v4(),
        account_number,
        ticket: 555,
        symbol: "EURUSD".into(),
        direction: Direction::Buy,
        volume: dec!(0.01),
        open_price: dec!(1.10000),
        open_time: Utc::now(),
        close_price: None,
        close_time: None,
        sl: dec!(1.09800),
        tp: dec!(1.10400),
        initial_sl: dec!(1.09800),
        initial_tp: dec!(1.10400),
        profit: Decimal::ZERO,
        commission: Decimal::ZERO,
        swap: Decimal::ZERO,
        status: TradeStatus::Open,
        source: TradeSource::Autotrade,
        command_id: None,
        signal_id: None,
        entry_confidence: Some(70.0),
        timeframe: Some("H1".into()),
        close_reason: None,
        mfe: Decimal::ZERO,
        mae: Decimal::ZERO,
        trailing_stop_active: false,
        trailing_stop_moves: 0,
        entry_bid: None,
        entry_ask: None,
        entry_spread: None,
        session: None,
    };
    pipeline.trades.insert_open(&open_trade).await?;

    let signal = buy_signal(80.0);
    let outcome = pipeline.evaluate(account_number, &signal).await?;

    assert_eq!(outcome, DecisionOutcome::Rejected(DecisionRejection::PositionLimit));
    assert_eq!(pipeline.trades.open_trades_count(account_number).await?, 1);

    Ok(())
}

/// Scenario 4: three closing losses that together breach the daily-loss
/// percentage trip the limit on the third close; a signal evaluated
/// afterward is rejected with `RiskLimit`.
#[tokio::test]
async fn daily_drawdown_trips_and_blocks_further_signals() -> Result<()> {
    use rustrade::application::risk_management::protection::apply_trade_close;

    let db = test_db().await;
    let (pipeline, account_number) = build_pipeline(&db, dec!(1000)).await?;

    let mut state = pipeline.protection.get_or_create(account_number, dec!(1000)).await?;
    state.max_daily_loss_percent = 2.0;

    let closes = [(dec!(-8), dec!(992)), (dec!(-7), dec!(985)), (dec!(-6), dec!(979))];
    let mut tripped = false;
    for (profit, equity) in closes {
        let events = apply_trade_close(&mut state, profit, equity, Utc::now());
        pipeline.protection.save(&state).await?;
        if !events.is_empty() {
            tripped = true;
        }
    }
    assert!(tripped, "cumulative -21 on a 1000 balance at 2% should trip the daily limit");
    assert!(state.limit_reached);
    assert!(state.auto_trading_disabled_at.is_some());

    let signal = buy_signal(90.0);
    let outcome = pipeline.evaluate(account_number, &signal).await?;
    assert_eq!(outcome, DecisionOutcome::Rejected(DecisionRejection::RiskLimit));

    Ok(())
}

/// Scenario 5: the trailing-stop manager only ever moves SL toward TP, and
/// each successive, deeper-in-profit call proposes a tighter SL than the
/// last (§8 invariant 8 — monotonic, never backward).
#[tokio::test]
async fn trailing_stop_moves_are_monotonic_toward_tp() {
    use rustrade::application::trailing_stops::evaluate;

    let broker = eurusd();
    let mut trade = Trade {
        id: Uuid::new_v4(),
        account_number: 1,
        ticket: 1,
        symbol: "EURUSD".into(),
        direction: Direction::Buy,
        volume: dec!(0.1),
        open_price: dec!(1.10000),
        open_time: Utc::now(),
        close_price: None,
        close_time: None,
        sl: dec!(1.09800),
        tp: dec!(1.10400),
        initial_sl: dec!(1.09800),
        initial_tp: dec!(1.10400),
        profit: Decimal::ZERO,
        commission: Decimal::ZERO,
        swap: Decimal::ZERO,
        status: TradeStatus::Open,
        source: TradeSource::Autotrade,
        command_id: None,
        signal_id: None,
        entry_confidence: Some(72.0),
        timeframe: Some("H1".into()),
        close_reason: None,
        mfe: Decimal::ZERO,
        mae: Decimal::ZERO,
        trailing_stop_active: false,
        trailing_stop_moves: 0,
        entry_bid: None,
        entry_ask: None,
        entry_spread: None,
        session: None,
    };

    // 30% progress: break-even stage.
    let tick_30 = Tick::new("EURUSD".into(), dec!(1.10120), dec!(1.10122), dec!(10), Utc::now(), true);
    let move_30 = evaluate(&trade, &tick_30, &broker, dec!(1000)).expect("30% progress should already trigger break-even");
    assert!(move_30.new_sl > trade.sl, "first move only ever tightens toward tp");
    trade.sl = move_30.new_sl;
    trade.trailing_stop_moves += 1;

    // 75% progress: aggressive trail, must be tighter than the break-even SL.
    let tick_75 = Tick::new("EURUSD".into(), dec!(1.10300), dec!(1.10302), dec!(10), Utc::now(), true);
    let move_75 = evaluate(&trade, &tick_75, &broker, dec!(1000)).expect("75% progress should trail further");
    assert!(move_75.new_sl > trade.sl, "later stages never move sl backward");
}

/// Scenario 6: a naive lot size whose SL distance would risk more than the
/// configured cap is shrunk by SL enforcement (§4.9) rather than rejected
/// outright, and the trade still opens.
#[tokio::test]
async fn sl_enforcement_shrinks_oversized_lot_but_still_opens() -> Result<()> {
    let db = test_db().await;
    let (pipeline, account_number) = build_pipeline(&db, dec!(500)).await?;

    // Widen the SL so the naive sizer's risk would exceed 2% of a 500 balance.
    let signal = TradingSignal::new(
        "EURUSD".into(),
        Timeframe::H1,
        SignalType::Buy,
        85.0,
        dec!(1.10000),
        dec!(1.09500),
        dec!(1.11000),
        serde_json::Value::Null,
        vec![],
        Utc::now(),
    );

    let outcome = pipeline.evaluate(account_number, &signal).await?;

    let command_id = match outcome {
        DecisionOutcome::Approved { command_id } => command_id,
        DecisionOutcome::Rejected(reason) => panic!("expected the lot to be shrunk and opened, got {:?}", reason),
    };
    let command = pipeline.commands.find(command_id).await?.expect("command was just inserted");
    if let CommandPayload::OpenTrade { volume, .. } = command.payload {
        assert!(volume > Decimal::ZERO);
        assert!(volume < dec!(0.05), "naive sizing for this sl distance would be ~0.05; enforcement must shrink it");
    } else {
        panic!("expected an OpenTrade payload");
    }

    Ok(())
}
