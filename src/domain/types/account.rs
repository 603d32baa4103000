use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One MT5 terminal account. Identified by the external terminal account
/// number (unique, immutable). Created on first `/api/connect`; never
/// deleted. Mutated only by the heartbeat and transaction handlers (§3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    pub account_number: i64,
    /// SHA-256 hash of the opaque API key; the plaintext is only ever
    /// returned once, in the `/api/connect` response body (§6, §10).
    pub api_key_hash: String,
    pub broker: String,
    pub platform: String,
    pub balance: rust_decimal::Decimal,
    pub equity: rust_decimal::Decimal,
    pub margin: rust_decimal::Decimal,
    pub free_margin: rust_decimal::Decimal,
    pub last_heartbeat: Option<DateTime<Utc>>,
    pub auto_trading_enabled: bool,
    pub created_at: DateTime<Utc>,
}

impl Account {
    pub fn new(account_number: i64, api_key_hash: String, broker: String, platform: String, now: DateTime<Utc>) -> Self {
        Self {
            account_number,
            api_key_hash,
            broker,
            platform,
            balance: rust_decimal::Decimal::ZERO,
            equity: rust_decimal::Decimal::ZERO,
            margin: rust_decimal::Decimal::ZERO,
            free_margin: rust_decimal::Decimal::ZERO,
            last_heartbeat: None,
            auto_trading_enabled: true,
            created_at: now,
        }
    }
}
