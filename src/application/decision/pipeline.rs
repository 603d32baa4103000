//! Decision pipeline (§4.7). The auto-trader: given one account and one
//! active signal, runs the full gate sequence and either emits an
//! `OPEN_TRADE` command or logs a rejection. Every path writes an
//! `AiDecisionLog` row (§4.7 closing sentence).

use crate::application::indicators::engine::IndicatorVote;
use crate::application::risk_management::correlation;
use crate::application::risk_management::position_sizer::{size_position, PositionSizerInput};
use crate::application::risk_management::sl_enforcer::{enforce, SlEnforcementInput};
use crate::domain::errors::DecisionRejection;
use crate::domain::ports::{
    AccountRepository, CommandRepository, DecisionLogRepository, ProtectionRepository, SignalRepository,
    SymbolConfigRepository, SymbolRepository, TickRepository, TradeRepository,
};
use crate::domain::types::{
    AiDecisionLog, Command, CommandPayload, ImpactLevel, SignalStatus, SignalType, SymbolStatus, TradingSignal,
};
use crate::infrastructure::cache::CommandQueue;
use crate::infrastructure::external::{MlScoreSource, NewsWindowSource, ParameterSource};
use chrono::{Duration, Timelike, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde_json::json;
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Debug, Clone, PartialEq)]
pub enum DecisionOutcome {
    Approved { command_id: uuid::Uuid },
    Rejected(DecisionRejection),
}

/// Every dependency the pipeline needs, grouped like the teacher's
/// `AppState`/service-struct convention — constructed once at startup and
/// shared via `Arc`.
pub struct DecisionPipeline {
    pub accounts: Arc<dyn AccountRepository>,
    pub symbols: Arc<dyn SymbolRepository>,
    pub ticks: Arc<dyn TickRepository>,
    pub signals: Arc<dyn SignalRepository>,
    pub commands: Arc<dyn CommandRepository>,
    pub trades: Arc<dyn TradeRepository>,
    pub symbol_configs: Arc<dyn SymbolConfigRepository>,
    pub protection: Arc<dyn ProtectionRepository>,
    pub decision_log: Arc<dyn DecisionLogRepository>,
    pub queue: Arc<dyn CommandQueue>,
    pub news: Arc<dyn NewsWindowSource>,
    pub ml_scores: Arc<dyn MlScoreSource>,
    pub parameters: Arc<dyn ParameterSource>,

    pub max_signal_age_secs: i64,
    pub watchdog_heartbeat_lost_secs: i64,
    pub cb_cooldown_secs: i64,
    pub max_open_positions_global: usize,
    pub max_open_positions_per_timeframe: usize,
    pub max_spread_points: i32,
    pub base_risk_pct: f64,
}

fn session_adjustment(now: chrono::DateTime<Utc>) -> f64 {
    match now.hour() {
        0..=6 => 5.0,   // Asian session: thinner liquidity, demand a bit more confidence
        7..=15 => 0.0,  // London session
        _ => -5.0,      // New York session: best liquidity
    }
}

/// Realized-volatility term of step 7's dynamic confidence (§4.7): a
/// choppier symbol at signal-generation time demands more confidence, a
/// quiet one demands less. Reads the ATR the signal generator already
/// snapshotted rather than recomputing it from candles.
fn volatility_adjustment(indicator_snapshot: &serde_json::Value, entry_price: Decimal) -> f64 {
    let atr = indicator_snapshot
        .get("readings")
        .and_then(|r| r.get("atr"))
        .and_then(|v| v.as_f64())
        .unwrap_or(0.0);
    let price = entry_price.to_f64().unwrap_or(0.0);
    if price <= 0.0 || atr <= 0.0 {
        return 0.0;
    }
    let atr_pct = atr / price * 100.0;
    if atr_pct > 0.5 {
        10.0
    } else if atr_pct > 0.25 {
        5.0
    } else if atr_pct < 0.05 {
        -5.0
    } else {
        0.0
    }
}

fn currency_for_news(symbol: &str) -> &str {
    let s = symbol;
    if s.len() >= 3 {
        &s[0..3]
    } else {
        s
    }
}

impl DecisionPipeline {
    /// §4.7 full gate sequence for one `(account, signal)` pair.
    pub async fn evaluate(&self, account_number: i64, signal: &TradingSignal) -> anyhow::Result<DecisionOutcome> {
        let now = Utc::now();

        macro_rules! reject {
            ($reason:expr, $impact:expr, $detail:expr) => {{
                let rejection: DecisionRejection = $reason;
                let log = AiDecisionLog::rejected(&signal.symbol, Some(signal.timeframe.as_str()), rejection.reason_code(), $impact, $detail, now);
                self.decision_log.append(&log).await?;
                return Ok(DecisionOutcome::Rejected(rejection));
            }};
        }

        let account = match self.accounts.find_by_account_number(account_number).await? {
            Some(a) => a,
            None => reject!(DecisionRejection::Mt5Disconnect, ImpactLevel::High, json!({"error": "unknown account"})),
        };

        // 1. Global auto-trading enabled?
        if !account.auto_trading_enabled {
            reject!(DecisionRejection::AutoTradingDisabled, ImpactLevel::Low, json!({}));
        }

        // 2. Protection gate.
        let mut protection = self.protection.get_or_create(account_number, account.balance).await?;
        let had_tripped_breaker = protection.command_breaker_tripped_at.is_some();
        crate::application::risk_management::protection::maybe_reset_command_breaker(&mut protection, now, self.cb_cooldown_secs);
        if had_tripped_breaker && protection.command_breaker_tripped_at.is_none() {
            self.protection.save(&protection).await?;
        }
        if protection.circuit_breaker_tripped || protection.command_breaker_tripped_at.is_some() {
            reject!(DecisionRejection::CircuitBreaker, ImpactLevel::Critical, json!({}));
        }
        if protection.limit_reached || protection.auto_trading_disabled_at.is_some() {
            reject!(DecisionRejection::RiskLimit, ImpactLevel::High, json!({"daily_pnl": protection.daily_pnl}));
        }

        // 3. Connection gate.
        let heartbeat_fresh = account
            .last_heartbeat
            .map(|hb| (now - hb) <= Duration::seconds(self.watchdog_heartbeat_lost_secs))
            .unwrap_or(false);
        if !heartbeat_fresh {
            reject!(DecisionRejection::Mt5Disconnect, ImpactLevel::High, json!({"last_heartbeat": account.last_heartbeat}));
        }

        // 4. Freshness.
        if !signal.is_fresh(now, Duration::seconds(self.max_signal_age_secs)) {
            reject!(DecisionRejection::SignalExpired, ImpactLevel::Low, json!({"created_at": signal.created_at}));
        }

        // 5. Missing-field gate.
        if signal.entry_price.is_zero() || signal.sl.is_zero() || signal.tp.is_zero() {
            reject!(DecisionRejection::MissingFields, ImpactLevel::Medium, json!({}));
        }

        // 6. Symbol gate.
        let mut symbol_config = self.symbol_configs.get_or_create(account_number, &signal.symbol).await?;
        if symbol_config.status != SymbolStatus::Active {
            reject!(DecisionRejection::SymbolDisabled, ImpactLevel::Low, json!({"status": format!("{:?}", symbol_config.status)}));
        }

        if let Some(over) = self.parameters.get_override(account_number, &signal.symbol).await? {
            if let Some(threshold) = over.min_confidence_threshold {
                symbol_config.min_confidence_threshold = threshold;
            }
            if let Some(mult) = over.risk_multiplier {
                symbol_config.risk_multiplier = mult.to_f64().unwrap_or(symbol_config.risk_multiplier);
            }
        }

        // 7. Dynamic confidence.
        let prevailing_trend = signal
            .indicator_snapshot
            .get("votes")
            .and_then(|v| v.get("ema_cross"))
            .and_then(|v| serde_json::from_value::<IndicatorVote>(v.clone()).ok())
            .map(|v| v.direction)
            .unwrap_or(SignalType::Hold);

        let trend_adjustment = if prevailing_trend == signal.signal_type {
            -15.0
        } else if prevailing_trend == SignalType::Hold {
            0.0
        } else {
            20.0
        };
        let risk_adjustment = if symbol_config.risk_multiplier < 1.0 {
            5.0
        } else if symbol_config.risk_multiplier > 1.2 {
            -5.0
        } else {
            0.0
        };
        let volatility_adjustment = volatility_adjustment(&signal.indicator_snapshot, signal.entry_price);
        let required_confidence = (symbol_config.min_confidence_threshold
            + session_adjustment(now)
            + risk_adjustment
            + trend_adjustment
            + volatility_adjustment)
            .clamp(0.0, 100.0);

        let ml_score = self.ml_scores.score(&signal.symbol, signal.timeframe).await?;
        let effective_confidence = match ml_score {
            Some(score) => (signal.confidence + score) / 2.0,
            None => signal.confidence,
        };

        if effective_confidence < required_confidence {
            reject!(
                DecisionRejection::LowConfidence,
                ImpactLevel::Low,
                json!({"required": required_confidence, "effective": effective_confidence})
            );
        }

        // 8. Position limits.
        if self.trades.find_open_for_symbol(account_number, &signal.symbol).await?.is_some() {
            reject!(DecisionRejection::PositionLimit, ImpactLevel::Low, json!({}));
        }
        let per_timeframe = self
            .trades
            .open_trades_for_timeframe(account_number, &signal.symbol, signal.timeframe.as_str())
            .await?;
        if per_timeframe >= self.max_open_positions_per_timeframe {
            reject!(DecisionRejection::TimeframeLimit, ImpactLevel::Low, json!({"count": per_timeframe}));
        }
        let open_trades = self.trades.open_trades_for_account(account_number).await?;
        let open_symbols: Vec<String> = open_trades.iter().map(|t| t.symbol.clone()).collect();
        if correlation::exceeds_cap(&open_symbols, &signal.symbol) {
            reject!(DecisionRejection::CorrelationLimit, ImpactLevel::Medium, json!({"open_symbols": open_symbols}));
        }
        let global_open = self.trades.open_trades_count(account_number).await?;
        if global_open >= self.max_open_positions_global {
            reject!(DecisionRejection::GlobalPositionLimit, ImpactLevel::Medium, json!({"count": global_open}));
        }

        // 9. Spread gate.
        let latest_tick = self.ticks.latest(&signal.symbol).await?;
        let tick = match &latest_tick {
            Some(t) if (now - t.timestamp) <= Duration::seconds(60) => t,
            Some(t) => reject!(DecisionRejection::TickStale, ImpactLevel::Medium, json!({"tick_age_secs": (now - t.timestamp).num_seconds()})),
            None => reject!(DecisionRejection::TickStale, ImpactLevel::Medium, json!({"error": "no tick"})),
        };
        let recent_ticks = self.ticks.recent(&signal.symbol, now - Duration::hours(1)).await?;
        let rolling_avg_spread = if recent_ticks.is_empty() {
            tick.spread
        } else {
            recent_ticks.iter().map(|t| t.spread).sum::<Decimal>() / Decimal::from(recent_ticks.len())
        };
        let spread_multiplier = if signal.symbol.to_ascii_uppercase().contains("XAU") || signal.symbol.to_ascii_uppercase().contains("XAG") {
            Decimal::from(5)
        } else {
            Decimal::from(3)
        };
        let broker = match self.symbols.find_symbol(&signal.symbol).await? {
            Some(b) => b,
            None => reject!(DecisionRejection::Unsizeable, ImpactLevel::Medium, json!({"error": "no broker symbol spec"})),
        };
        let absolute_limit = broker.point() * Decimal::from(self.max_spread_points);
        let spread_limit = absolute_limit.max(rolling_avg_spread * spread_multiplier);
        if tick.spread > spread_limit {
            reject!(DecisionRejection::SpreadRejected, ImpactLevel::Medium, json!({"spread": tick.spread, "limit": spread_limit}));
        }

        // 10. News gate.
        let currency = currency_for_news(&signal.symbol);
        if let Some(window) = self.news.active_window(currency, now).await? {
            let blackout = match window.impact {
                ImpactLevel::High | ImpactLevel::Critical => window.contains(now),
                ImpactLevel::Medium => window.contains(now),
                ImpactLevel::Low => false,
            };
            if blackout {
                reject!(DecisionRejection::NewsPause, ImpactLevel::Medium, json!({"currency": currency}));
            }
        }

        // 11. SL direction & distance validation.
        let sl_ok = match signal.signal_type {
            SignalType::Buy => signal.sl < signal.entry_price,
            SignalType::Sell => signal.sl > signal.entry_price,
            SignalType::Hold => false,
        };
        let min_sl_distance = broker.point() * Decimal::from(broker.stops_level);
        let sl_distance = (signal.entry_price - signal.sl).abs();
        if !sl_ok || sl_distance < min_sl_distance {
            reject!(DecisionRejection::InvalidStopLoss, ImpactLevel::Medium, json!({"sl": signal.sl, "entry": signal.entry_price}));
        }

        // 12. Position size.
        let sl_distance_pips = (sl_distance / broker.point()).to_f64().unwrap_or(0.0);
        let lot = match size_position(&PositionSizerInput {
            balance: account.balance,
            confidence: effective_confidence,
            sl_distance_pips,
            pip_value: broker.point_value,
            symbol: &signal.symbol,
            base_risk_pct: self.base_risk_pct,
            risk_multiplier: symbol_config.risk_multiplier,
            broker: &broker,
        }) {
            Some(lot) => lot,
            None => reject!(DecisionRejection::Unsizeable, ImpactLevel::Medium, json!({})),
        };

        // 13. SL enforcement.
        let final_lot = match enforce(&SlEnforcementInput {
            proposed_lot: lot,
            sl_distance_pips,
            balance: account.balance,
            symbol: &signal.symbol,
            broker: &broker,
        }) {
            Some(lot) => lot,
            None => reject!(DecisionRejection::Unsizeable, ImpactLevel::Medium, json!({"reason": "sl enforcement could not find a safe lot"})),
        };

        // 14. Command emission.
        let order_type = match signal.signal_type {
            SignalType::Buy => "BUY",
            SignalType::Sell => "SELL",
            SignalType::Hold => unreachable!("signal_type is never Hold by the time it reaches the decision pipeline"),
        };
        let payload = CommandPayload::OpenTrade {
            symbol: signal.symbol.clone(),
            order_type: order_type.to_string(),
            volume: final_lot,
            sl: signal.sl,
            tp: signal.tp,
            comment: Some(format!("signal:{}", signal.id)),
            signal_id: Some(signal.id),
            timeframe: Some(signal.timeframe.as_str().to_string()),
        };
        let command = Command::new(account_number, payload, now);
        self.commands.insert(&command).await?;
        if let Err(e) = self.queue.enqueue(account_number, &command).await {
            warn!("decision pipeline: failed to push command to queue, DB poll will recover it: {}", e);
        }
        self.signals.set_status(signal.id, SignalStatus::Executed).await?;

        let log = AiDecisionLog::approved(
            &signal.symbol,
            Some(signal.timeframe.as_str()),
            effective_confidence,
            json!({"volume": final_lot, "command_id": command.id}),
            now,
        );
        self.decision_log.append(&log).await?;
        info!(account_number, symbol = %signal.symbol, command_id = %command.id, "decision pipeline: approved, OPEN_TRADE emitted");

        Ok(DecisionOutcome::Approved { command_id: command.id })
    }
}
