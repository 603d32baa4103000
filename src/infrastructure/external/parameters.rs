//! Read contract for auto-optimization output (§1, §9). The weekly/monthly
//! tuning job that would populate this is out of scope; the pipeline only
//! needs to be able to ask "does this (account, symbol) have a tuned
//! override right now?"

use anyhow::Result;
use async_trait::async_trait;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::RwLock;

/// Tuned parameters for one (account, symbol). Fields are optional: an
/// optimizer run may only have produced some of them.
#[derive(Debug, Clone, Default)]
pub struct ParameterOverride {
    pub min_confidence_threshold: Option<f64>,
    pub risk_multiplier: Option<Decimal>,
}

#[async_trait]
pub trait ParameterSource: Send + Sync {
    async fn get_override(&self, account_number: i64, symbol: &str) -> Result<Option<ParameterOverride>>;
}

/// Default implementation: an in-process map, empty until something writes
/// to it. Used standalone until a real optimizer job is wired in.
#[derive(Default)]
pub struct InMemoryParameterSource {
    overrides: RwLock<HashMap<(i64, String), ParameterOverride>>,
}

impl InMemoryParameterSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, account_number: i64, symbol: &str, over: ParameterOverride) {
        self.overrides
            .write()
            .unwrap()
            .insert((account_number, symbol.to_string()), over);
    }
}

#[async_trait]
impl ParameterSource for InMemoryParameterSource {
    async fn get_override(&self, account_number: i64, symbol: &str) -> Result<Option<ParameterOverride>> {
        Ok(self
            .overrides
            .read()
            .unwrap()
            .get(&(account_number, symbol.to_string()))
            .cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn empty_source_returns_none() {
        let source = InMemoryParameterSource::new();
        assert!(source.get_override(1, "EURUSD").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn set_then_get_round_trips() {
        let source = InMemoryParameterSource::new();
        source.set(
            1,
            "EURUSD",
            ParameterOverride { min_confidence_threshold: Some(60.0), risk_multiplier: None },
        );
        let got = source.get_override(1, "EURUSD").await.unwrap().unwrap();
        assert_eq!(got.min_confidence_threshold, Some(60.0));
    }
}
