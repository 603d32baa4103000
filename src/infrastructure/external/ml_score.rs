//! Read contract for an external ML prediction model (§1). The model's
//! training/inference internals are out of scope; the signal generator and
//! decision pipeline only need a confidence-shaped score per (symbol,
//! timeframe).

use crate::domain::timeframe::Timeframe;
use anyhow::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::RwLock;

#[async_trait]
pub trait MlScoreSource: Send + Sync {
    /// Score in `[0, 100]`, or `None` if the model has no opinion yet.
    async fn score(&self, symbol: &str, timeframe: Timeframe) -> Result<Option<f64>>;
}

#[derive(Default)]
pub struct InMemoryMlScoreSource {
    scores: RwLock<HashMap<(String, Timeframe), f64>>,
}

impl InMemoryMlScoreSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, symbol: &str, timeframe: Timeframe, score: f64) {
        self.scores.write().unwrap().insert((symbol.to_string(), timeframe), score.clamp(0.0, 100.0));
    }
}

#[async_trait]
impl MlScoreSource for InMemoryMlScoreSource {
    async fn score(&self, symbol: &str, timeframe: Timeframe) -> Result<Option<f64>> {
        Ok(self.scores.read().unwrap().get(&(symbol.to_string(), timeframe)).copied())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn unset_symbol_has_no_score() {
        let source = InMemoryMlScoreSource::new();
        assert!(source.score("EURUSD", Timeframe::H1).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn score_is_clamped_to_0_100() {
        let source = InMemoryMlScoreSource::new();
        source.set("EURUSD", Timeframe::H1, 150.0);
        assert_eq!(source.score("EURUSD", Timeframe::H1).await.unwrap(), Some(100.0));
    }
}
