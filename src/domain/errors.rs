use thiserror::Error;

/// Validation failures on inbound terminal payloads. Always surfaced as
/// `400 Bad Request` with a human-readable `message` — never retried,
/// never crashes a worker.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("missing field: {field}")]
    MissingField { field: &'static str },

    #[error("invalid value for {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },

    #[error("spread must be non-negative, got {spread}")]
    NegativeSpread { spread: rust_decimal::Decimal },

    #[error("stop loss is zero or on the wrong side of entry")]
    InvalidStopLoss,

    #[error("take profit is zero or on the wrong side of entry")]
    InvalidTakeProfit,
}

/// Authentication/authorization failures. `MissingKey` maps to 401,
/// `InvalidKey` / `AccountMismatch` map to 403.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("missing API key")]
    MissingKey,

    #[error("invalid API key")]
    InvalidKey,

    #[error("account number does not match the account bound to this API key")]
    AccountMismatch,
}

/// Errors raised while evaluating the decision pipeline (§4.7). These are
/// never returned as HTTP errors — a rejection is a normal outcome recorded
/// in `AIDecisionLog` (see `domain::types::decision_log`), per the "Business
/// Rule Violation" taxonomy in §7.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DecisionRejection {
    #[error("auto-trading disabled")]
    AutoTradingDisabled,
    #[error("circuit breaker tripped")]
    CircuitBreaker,
    #[error("daily risk limit reached")]
    RiskLimit,
    #[error("MT5 terminal disconnected")]
    Mt5Disconnect,
    #[error("signal expired")]
    SignalExpired,
    #[error("signal missing entry/sl/tp")]
    MissingFields,
    #[error("symbol trading disabled")]
    SymbolDisabled,
    #[error("confidence below required threshold")]
    LowConfidence,
    #[error("one open position per symbol already held")]
    PositionLimit,
    #[error("per-timeframe position cap reached")]
    TimeframeLimit,
    #[error("correlation group exposure cap reached")]
    CorrelationLimit,
    #[error("global open-position cap reached")]
    GlobalPositionLimit,
    #[error("tick is stale")]
    TickStale,
    #[error("spread rejected")]
    SpreadRejected,
    #[error("inside a news blackout window")]
    NewsPause,
    #[error("stop loss direction or distance invalid")]
    InvalidStopLoss,
    #[error("position could not be sized without exceeding risk limits")]
    Unsizeable,
}

impl DecisionRejection {
    /// `primary_reason` string used in `AIDecisionLog` rows.
    pub fn reason_code(&self) -> &'static str {
        match self {
            Self::AutoTradingDisabled => "AUTO_TRADING_DISABLED",
            Self::CircuitBreaker => "CIRCUIT_BREAKER",
            Self::RiskLimit => "RISK_LIMIT",
            Self::Mt5Disconnect => "MT5_DISCONNECT",
            Self::SignalExpired => "SIGNAL_EXPIRED",
            Self::MissingFields => "MISSING_FIELDS",
            Self::SymbolDisabled => "SYMBOL_DISABLE",
            Self::LowConfidence => "LOW_CONFIDENCE",
            Self::PositionLimit => "POSITION_LIMIT",
            Self::TimeframeLimit => "TIMEFRAME_LIMIT",
            Self::CorrelationLimit => "CORRELATION_LIMIT",
            Self::GlobalPositionLimit => "GLOBAL_POSITION_LIMIT",
            Self::TickStale => "TICK_STALE",
            Self::SpreadRejected => "SPREAD_REJECTED",
            Self::NewsPause => "NEWS_PAUSE",
            Self::InvalidStopLoss => "INVALID_SL",
            Self::Unsizeable => "UNSIZEABLE",
        }
    }
}

/// Persistence-layer failures (connection blips, constraint violations).
/// Transient ones are retried with backoff in workers; request handlers
/// convert them to `500`.
#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("unique constraint violated: {0}")]
    Conflict(String),

    #[error("record not found: {0}")]
    NotFound(String),
}

/// Top-level application error used at service boundaries (workers; the
/// HTTP layer maps this to the response envelope of §6).
#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error(transparent)]
    Persistence(#[from] PersistenceError),

    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decision_rejection_reason_codes_are_stable() {
        assert_eq!(DecisionRejection::CircuitBreaker.reason_code(), "CIRCUIT_BREAKER");
        assert_eq!(DecisionRejection::PositionLimit.reason_code(), "POSITION_LIMIT");
    }

    #[test]
    fn validation_error_messages_are_human_readable() {
        let err = ValidationError::NegativeSpread {
            spread: rust_decimal::Decimal::from(-1),
        };
        assert!(err.to_string().contains("non-negative"));
    }
}
