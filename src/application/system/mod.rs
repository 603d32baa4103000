//! System bootstrap: wires every repository, external port, and background
//! worker into a running server (`Application::build()` then `.start()`,
//! mirroring the teacher's two-phase `build()`/`start()` split so
//! construction errors surface before anything is spawned).

pub mod shutdown_service;

use crate::application::decision::pipeline::DecisionPipeline;
use crate::application::indicators::RegimeCache;
use crate::application::market_data::retention::RetentionSweeper;
use crate::application::market_data::TickWriter;
use crate::application::registry::ConnectionRegistry;
use crate::application::system::shutdown_service::ShutdownService;
use crate::application::{supervisor, trailing_stops};
use crate::config::Config;
use crate::domain::ports::{
    AccountRepository, CandleRepository, CommandRepository, DecisionLogRepository,
    IndicatorScoreRepository, ProtectionRepository, SignalRepository, SymbolConfigRepository,
    SymbolRepository, TickRepository, TradeRepository,
};
use crate::domain::timeframe::Timeframe;
use crate::infrastructure::cache::{CommandQueue, RedisCommandQueue};
use crate::infrastructure::external::{InMemoryMlScoreSource, InMemoryNewsWindowSource, InMemoryParameterSource};
use crate::infrastructure::http::serve_all;
use crate::infrastructure::http::state::AppState;
use crate::infrastructure::observability::{Metrics, MetricsReporter};
use crate::infrastructure::persistence::repositories::{
    SqliteAccountRepository, SqliteCandleRepository, SqliteCommandRepository,
    SqliteDecisionLogRepository, SqliteIndicatorScoreRepository, SqliteProtectionRepository,
    SqliteSignalRepository, SqliteSymbolConfigRepository, SqliteSymbolRepository,
    SqliteTickRepository, SqliteTradeRepository,
};
use crate::infrastructure::persistence::Database;
use anyhow::Result;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Ticks older than this are dropped by the retention sweeper (§4.4); not a
/// `Config` field since it is a storage-policy constant, not a per-deployment
/// tuning knob.
const TICK_RETENTION_DAYS: i64 = 30;

/// Handle returned by `Application::start()`. Holding it keeps the
/// supervised workers and HTTP listeners alive; dropping it does not stop
/// them (they are already detached via `tokio::spawn`) but is the natural
/// place for a caller to await shutdown.
pub struct SystemHandle {
    pub shutdown: Arc<AtomicBool>,
    pub shutdown_service: Arc<ShutdownService>,
}

impl SystemHandle {
    /// Flips the shared shutdown flag so every supervised worker stops
    /// accepting new iterations, then flushes the tick writer one last time.
    pub async fn shutdown(&self) {
        self.shutdown_service.shutdown().await;
    }
}

/// Every wired dependency, held so `start()` can spawn workers against them
/// without re-deriving anything `build()` already assembled.
pub struct Application {
    pub config: Arc<Config>,
    pub metrics: Metrics,

    pub accounts: Arc<dyn AccountRepository>,
    pub symbols: Arc<dyn SymbolRepository>,
    pub ticks: Arc<dyn TickRepository>,
    pub candles: Arc<dyn CandleRepository>,
    pub signals: Arc<dyn SignalRepository>,
    pub commands: Arc<dyn CommandRepository>,
    pub trades: Arc<dyn TradeRepository>,
    pub symbol_configs: Arc<dyn SymbolConfigRepository>,
    pub protection: Arc<dyn ProtectionRepository>,
    pub decision_logs: Arc<dyn DecisionLogRepository>,
    pub indicator_scores: Arc<dyn IndicatorScoreRepository>,
    pub queue: Arc<dyn CommandQueue>,

    pub tick_writer: Arc<TickWriter>,
    pub connection_registry: Arc<ConnectionRegistry>,
    pub decision_pipeline: Arc<DecisionPipeline>,
}

impl Application {
    pub async fn build(config: Config) -> Result<Self> {
        info!("building application: control={} ticks={} trades={} logs={}", config.control_port, config.tick_port, config.trade_port, config.log_port);

        let metrics = Metrics::new()?;
        let db = Database::new(&config.database_url).await?;
        let pool = db.pool.clone();

        let accounts: Arc<dyn AccountRepository> = Arc::new(SqliteAccountRepository::new(pool.clone()));
        let symbols: Arc<dyn SymbolRepository> = Arc::new(SqliteSymbolRepository::new(pool.clone()));
        let ticks: Arc<dyn TickRepository> = Arc::new(SqliteTickRepository::new(pool.clone()));
        let candles: Arc<dyn CandleRepository> = Arc::new(SqliteCandleRepository::new(pool.clone()));
        let signals: Arc<dyn SignalRepository> = Arc::new(SqliteSignalRepository::new(pool.clone()));
        let commands: Arc<dyn CommandRepository> = Arc::new(SqliteCommandRepository::new(pool.clone()));
        let trades: Arc<dyn TradeRepository> = Arc::new(SqliteTradeRepository::new(pool.clone()));
        let symbol_configs: Arc<dyn SymbolConfigRepository> = Arc::new(SqliteSymbolConfigRepository::new(pool.clone()));
        let protection: Arc<dyn ProtectionRepository> = Arc::new(SqliteProtectionRepository::new(pool.clone()));
        let decision_logs: Arc<dyn DecisionLogRepository> = Arc::new(SqliteDecisionLogRepository::new(pool.clone()));
        let indicator_scores: Arc<dyn IndicatorScoreRepository> = Arc::new(SqliteIndicatorScoreRepository::new(pool.clone()));

        let queue: Arc<dyn CommandQueue> = Arc::new(RedisCommandQueue::connect(&config.redis_url).await?);

        let tick_writer = Arc::new(TickWriter::new(ticks.clone(), metrics.clone()));
        let connection_registry = Arc::new(ConnectionRegistry::new(config.watchdog_heartbeat_lost_secs, config.watchdog_tick_stale_secs));

        let news = Arc::new(InMemoryNewsWindowSource::default());
        let ml_scores = Arc::new(InMemoryMlScoreSource::default());
        let parameters = Arc::new(InMemoryParameterSource::default());

        let decision_pipeline = Arc::new(DecisionPipeline {
            accounts: accounts.clone(),
            symbols: symbols.clone(),
            ticks: ticks.clone(),
            signals: signals.clone(),
            commands: commands.clone(),
            trades: trades.clone(),
            symbol_configs: symbol_configs.clone(),
            protection: protection.clone(),
            decision_log: decision_logs.clone(),
            queue: queue.clone(),
            news,
            ml_scores,
            parameters,
            max_signal_age_secs: config.max_signal_age_secs,
            watchdog_heartbeat_lost_secs: config.watchdog_heartbeat_lost_secs,
            cb_cooldown_secs: config.cb_cooldown_secs,
            max_open_positions_global: config.max_open_positions_global,
            max_open_positions_per_timeframe: config.max_open_positions_per_timeframe,
            max_spread_points: config.max_spread_points,
            base_risk_pct: config.risk_per_trade_percent,
        });

        Ok(Self {
            config: Arc::new(config),
            metrics,
            accounts,
            symbols,
            ticks,
            candles,
            signals,
            commands,
            trades,
            symbol_configs,
            protection,
            decision_logs,
            indicator_scores,
            queue,
            tick_writer,
            connection_registry,
            decision_pipeline,
        })
    }

    pub async fn start(self) -> Result<SystemHandle> {
        let shutdown = Arc::new(AtomicBool::new(false));

        let state = AppState {
            accounts: self.accounts.clone(),
            symbols: self.symbols.clone(),
            ticks: self.ticks.clone(),
            candles: self.candles.clone(),
            signals: self.signals.clone(),
            commands: self.commands.clone(),
            trades: self.trades.clone(),
            symbol_configs: self.symbol_configs.clone(),
            protection: self.protection.clone(),
            decision_logs: self.decision_logs.clone(),
            queue: self.queue.clone(),
            tick_writer: self.tick_writer.clone(),
            connection_registry: self.connection_registry.clone(),
            metrics: self.metrics.clone(),
            config: self.config.clone(),
        };

        let config = self.config.clone();

        tokio::spawn({
            let state = state.clone();
            let config = config.clone();
            async move {
                if let Err(e) = serve_all(state, config.control_port, config.tick_port, config.trade_port, config.log_port).await {
                    tracing::error!("http surfaces exited: {}", e);
                }
            }
        });

        tokio::spawn(self.tick_writer.clone().run(Duration::from_millis(config.tick_flush_interval_ms)));
        tokio::spawn(
            Arc::new(RetentionSweeper::new(self.ticks.clone(), self.candles.clone(), TICK_RETENTION_DAYS))
                .run(Duration::from_secs(config.retention_sweep_interval_secs)),
        );

        // Signal generator (§4.6): one pass per subscribed symbol x configured timeframe.
        {
            let candles = self.candles.clone();
            let ticks = self.ticks.clone();
            let symbols = self.symbols.clone();
            let signals = self.signals.clone();
            let indicator_scores = self.indicator_scores.clone();
            let metrics = self.metrics.clone();
            let shutdown = shutdown.clone();
            let interval = Duration::from_secs(config.signal_generator_interval_secs);
            let cache = Arc::new(RegimeCache::new(interval));
            tokio::spawn(supervisor::run_supervised("signal_generator", interval, config.worker_backoff_cap_secs, metrics, shutdown, move || {
                let candles = candles.clone();
                let ticks = ticks.clone();
                let symbols = symbols.clone();
                let signals = signals.clone();
                let indicator_scores = indicator_scores.clone();
                let cache = cache.clone();
                async move {
                    for symbol in symbols.all_subscribed_symbols().await? {
                        for timeframe in Timeframe::all() {
                            if let Some(generated) = crate::application::signals::generate_signal(&candles, &ticks, &symbols, &signals, &indicator_scores, &cache, &symbol, timeframe).await? {
                                signals.expire_active_and_insert(&generated.signal).await?;
                            }
                        }
                    }
                    Ok(())
                }
            }));
        }

        // Decision pipeline driving loop (§4.7): every active signal, fanned
        // out to every account subscribed to that symbol.
        {
            let accounts = self.accounts.clone();
            let symbols = self.symbols.clone();
            let signals = self.signals.clone();
            let pipeline = self.decision_pipeline.clone();
            let metrics = self.metrics.clone();
            let shutdown = shutdown.clone();
            let interval = Duration::from_secs(config.decision_pipeline_interval_secs);
            tokio::spawn(supervisor::run_supervised("decision_pipeline", interval, config.worker_backoff_cap_secs, metrics, shutdown, move || {
                let accounts = accounts.clone();
                let symbols = symbols.clone();
                let signals = signals.clone();
                let pipeline = pipeline.clone();
                async move {
                    let active = signals.active_signals().await?;
                    for account in accounts.list_all().await? {
                        let subscribed = symbols.subscribed_for_account(account.account_number).await?;
                        for signal in &active {
                            if subscribed.iter().any(|s| s.symbol == signal.symbol) {
                                if let Err(e) = pipeline.evaluate(account.account_number, signal).await {
                                    warn!(account = account.account_number, symbol = %signal.symbol, error = %e, "decision pipeline iteration failed for signal");
                                }
                            }
                        }
                    }
                    Ok(())
                }
            }));
        }

        // Trailing-stop manager (§4.10): re-evaluated every open trade on each pass.
        {
            let accounts = self.accounts.clone();
            let trades = self.trades.clone();
            let ticks = self.ticks.clone();
            let symbols = self.symbols.clone();
            let metrics = self.metrics.clone();
            let shutdown = shutdown.clone();
            let interval = Duration::from_secs(config.trailing_stop_interval_secs);
            tokio::spawn(supervisor::run_supervised("trailing_stops", interval, config.worker_backoff_cap_secs, metrics, shutdown, move || {
                let accounts = accounts.clone();
                let trades = trades.clone();
                let ticks = ticks.clone();
                let symbols = symbols.clone();
                async move {
                    for account in accounts.list_all().await? {
                        for trade in trades.open_trades_for_account(account.account_number).await? {
                            let (Some(tick), Some(broker)) = (ticks.latest(&trade.symbol).await?, symbols.find_symbol(&trade.symbol).await?) else {
                                continue;
                            };
                            if let Some(mv) = trailing_stops::evaluate(&trade, &tick, &broker, account.balance) {
                                trades.mark_trailing_stop(trade.id, mv.new_sl, trade.trailing_stop_moves + 1).await?;
                                info!(trade = %trade.id, stage = mv.stage, new_sl = %mv.new_sl, "trailing stop moved");
                            }
                        }
                    }
                    Ok(())
                }
            }));
        }

        // Connection watchdog (§4.3): sweeps for stale heartbeats/ticks.
        {
            let accounts = self.accounts.clone();
            let symbols = self.symbols.clone();
            let ticks = self.ticks.clone();
            let decision_logs = self.decision_logs.clone();
            let registry = self.connection_registry.clone();
            let metrics = self.metrics.clone();
            let shutdown = shutdown.clone();
            let interval = Duration::from_secs(config.watchdog_interval_secs);
            tokio::spawn(supervisor::run_supervised("connection_watchdog", interval, config.worker_backoff_cap_secs, metrics, shutdown, move || {
                let accounts = accounts.clone();
                let symbols = symbols.clone();
                let ticks = ticks.clone();
                let decision_logs = decision_logs.clone();
                let registry = registry.clone();
                async move { registry.sweep(&accounts, &symbols, &ticks, &decision_logs, chrono::Utc::now()).await }
            }));
        }

        // Decision log retention: reuses the retention interval/horizon pair
        // dedicated to it rather than the tick/candle sweeper's own policy.
        {
            let decision_logs = self.decision_logs.clone();
            let retention_hours = config.decision_log_retention_hours;
            let interval = Duration::from_secs(config.retention_sweep_interval_secs);
            let metrics = self.metrics.clone();
            let shutdown = shutdown.clone();
            tokio::spawn(supervisor::run_supervised("decision_log_retention", interval, config.worker_backoff_cap_secs, metrics, shutdown, move || {
                let decision_logs = decision_logs.clone();
                async move {
                    let cutoff = chrono::Utc::now() - chrono::Duration::hours(retention_hours);
                    decision_logs.delete_older_than(cutoff).await?;
                    Ok(())
                }
            }));
        }

        // Command timeout sweeper (§4.2): EA commands the terminal never
        // responds to within `command_timeout_secs` are marked failed so the
        // decision pipeline's position-limit accounting doesn't count them
        // as forever-pending.
        {
            let commands = self.commands.clone();
            let command_timeout_secs = config.command_timeout_secs;
            let metrics = self.metrics.clone();
            let shutdown = shutdown.clone();
            let interval = Duration::from_secs(config.command_sweep_interval_secs);
            tokio::spawn(supervisor::run_supervised("command_timeout_sweeper", interval, config.worker_backoff_cap_secs, metrics, shutdown, move || {
                let commands = commands.clone();
                async move {
                    let overdue = commands.find_overdue(chrono::Utc::now(), chrono::Duration::seconds(command_timeout_secs)).await?;
                    for command in overdue {
                        commands.mark_failed(command.id, "timed out waiting for EA response").await?;
                        warn!(command = %command.id, "command timeout sweeper: marked overdue command failed");
                    }
                    Ok(())
                }
            }));
        }

        // Push-based JSON snapshot to stdout, alongside the Prometheus pull
        // endpoint at `/metrics` — the teacher's dual posture, gated by the
        // same env var that used to gate it alone.
        if config.observability_enabled {
            let reporter = MetricsReporter::new(
                self.accounts.clone(),
                self.trades.clone(),
                self.commands.clone(),
                self.metrics.clone(),
                config.observability_interval_secs,
            );
            tokio::spawn(reporter.run());
        }

        // Reconciliation (§4.11) is EA-driven via `/api/trades/sync` and
        // `/api/trades/update` — there is no standalone periodic worker here.

        // Ctrl-c is awaited by the caller of `start()` (see `src/bin/server.rs`),
        // which calls `SystemHandle::shutdown()` directly rather than this
        // module racing its own signal handler against that one.
        let shutdown_service = Arc::new(ShutdownService::new(shutdown.clone(), self.tick_writer.clone()));

        Ok(SystemHandle { shutdown, shutdown_service })
    }
}
