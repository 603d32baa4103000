use crate::application::market_data::TickWriter;
use crate::application::registry::ConnectionRegistry;
use crate::config::Config;
use crate::domain::ports::{
    AccountRepository, CandleRepository, CommandRepository, DecisionLogRepository,
    ProtectionRepository, SignalRepository, SymbolConfigRepository, SymbolRepository,
    TickRepository, TradeRepository,
};
use crate::infrastructure::cache::CommandQueue;
use crate::infrastructure::observability::metrics::Metrics;
use std::sync::Arc;

/// Shared state for every axum surface. Cheap to clone — everything inside
/// is an `Arc`.
#[derive(Clone)]
pub struct AppState {
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
    pub queue: Arc<dyn CommandQueue>,
    pub tick_writer: Arc<TickWriter>,
    pub connection_registry: Arc<ConnectionRegistry>,
    pub metrics: Metrics,
    pub config: Arc<Config>,
}
