//! §3 DATA MODEL — entities and their invariants.

pub mod account;
pub mod command;
pub mod decision_log;
pub mod indicator_score;
pub mod market;
pub mod protection;
pub mod signal;
pub mod symbol;
pub mod symbol_config;
pub mod trade;

pub use account::Account;
pub use command::{Command, CommandPayload, CommandStatus, CommandType};
pub use decision_log::{AiDecisionLog, DecisionType, ImpactLevel};
pub use indicator_score::IndicatorScore;
pub use market::{OhlcCandle, Tick};
pub use protection::ProtectionState;
pub use signal::{SignalStatus, SignalType, TradingSignal};
pub use symbol::{BrokerSymbol, SubscribedSymbol};
pub use symbol_config::{SymbolStatus, SymbolTradingConfig};
pub use trade::{CloseReason, Direction, Trade, TradeHistoryEvent, TradeSource, TradeStatus};
