use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CommandType {
    OpenTrade,
    CloseTrade,
    ModifyTrade,
    RequestOhlc,
    RequestHistoricalData,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CommandStatus {
    Pending,
    Sent,
    Completed,
    Failed,
}

/// §6 command payload schemas.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommandPayload {
    OpenTrade {
        symbol: String,
        order_type: String, // BUY | SELL
        volume: Decimal,
        sl: Decimal,
        tp: Decimal,
        comment: Option<String>,
        signal_id: Option<Uuid>,
        timeframe: Option<String>,
    },
    ModifyTrade {
        ticket: i64,
        sl: Decimal,
        tp: Decimal,
    },
    CloseTrade {
        ticket: i64,
    },
    RequestOhlc {
        symbol: String,
        timeframe: String,
        start_date: DateTime<Utc>,
        end_date: DateTime<Utc>,
    },
    RequestHistoricalData {
        symbol: String,
        timeframe: String,
        start_date: DateTime<Utc>,
        end_date: DateTime<Utc>,
    },
}

impl CommandPayload {
    pub fn command_type(&self) -> CommandType {
        match self {
            CommandPayload::OpenTrade { .. } => CommandType::OpenTrade,
            CommandPayload::ModifyTrade { .. } => CommandType::ModifyTrade,
            CommandPayload::CloseTrade { .. } => CommandType::CloseTrade,
            CommandPayload::RequestOhlc { .. } => CommandType::RequestOhlc,
            CommandPayload::RequestHistoricalData { .. } => CommandType::RequestHistoricalData,
        }
    }

    /// §6: "SL and TP both required and non-zero" for `OPEN_TRADE`.
    pub fn validate(&self) -> Result<(), &'static str> {
        if let CommandPayload::OpenTrade { sl, tp, volume, .. } = self {
            if *sl == Decimal::ZERO || *tp == Decimal::ZERO {
                return Err("sl and tp must both be non-zero");
            }
            if *volume <= Decimal::ZERO {
                return Err("volume must be positive");
            }
        }
        Ok(())
    }
}

/// One command destined for the terminal. Owned by the issuing account.
/// Invariant: `id` is a client-generated, globally unique UUID (§9 — relying
/// on DB auto-increment has previously caused NOT-NULL violations during
/// migrations); status transitions are monotonic
/// `pending -> sent -> {completed, failed}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Command {
    pub id: Uuid,
    pub account_number: i64,
    pub payload: CommandPayload,
    pub status: CommandStatus,
    pub response: Option<Value>,
    pub created_at: DateTime<Utc>,
    pub executed_at: Option<DateTime<Utc>>,
}

impl Command {
    pub fn new(account_number: i64, payload: CommandPayload, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            account_number,
            payload,
            status: CommandStatus::Pending,
            response: None,
            created_at: now,
            executed_at: None,
        }
    }

    /// Commands older than `T_cmd_timeout` without completion are marked
    /// failed by the sweeper (§3, §5).
    pub fn is_overdue(&self, now: DateTime<Utc>, timeout: chrono::Duration) -> bool {
        !matches!(self.status, CommandStatus::Completed | CommandStatus::Failed)
            && now.signed_duration_since(self.created_at) > timeout
    }

    /// Status transitions are monotonic: only forward moves are permitted.
    pub fn can_transition_to(&self, next: CommandStatus) -> bool {
        use CommandStatus::*;
        matches!(
            (self.status, next),
            (Pending, Sent) | (Pending, Failed) | (Sent, Completed) | (Sent, Failed)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn open_trade_requires_nonzero_sl_tp() {
        let payload = CommandPayload::OpenTrade {
            symbol: "EURUSD".into(),
            order_type: "BUY".into(),
            volume: dec!(0.01),
            sl: Decimal::ZERO,
            tp: dec!(1.2),
            comment: None,
            signal_id: None,
            timeframe: None,
        };
        assert!(payload.validate().is_err());
    }

    #[test]
    fn status_transitions_are_monotonic() {
        let cmd = Command::new(
            1,
            CommandPayload::CloseTrade { ticket: 1 },
            Utc::now(),
        );
        assert!(cmd.can_transition_to(CommandStatus::Sent));
        assert!(!cmd.can_transition_to(CommandStatus::Completed));
    }

    #[test]
    fn overdue_only_when_not_terminal_and_past_timeout() {
        let now = Utc::now();
        let mut cmd = Command::new(1, CommandPayload::CloseTrade { ticket: 1 }, now - chrono::Duration::seconds(600));
        assert!(cmd.is_overdue(now, chrono::Duration::seconds(300)));
        cmd.status = CommandStatus::Completed;
        assert!(!cmd.is_overdue(now, chrono::Duration::seconds(300)));
    }
}
