//! OHLC ingestion (§4.4, §6 `/api/ohlc/historical`). Validates bar sanity
//! then delegates to [`CandleRepository::insert_batch`], which enforces the
//! `(symbol, timeframe, timestamp)` uniqueness that makes overlapping
//! re-sends of the same historical window idempotent (§8 round-trip law).

use crate::domain::ports::CandleRepository;
use crate::domain::types::OhlcCandle;
use std::sync::Arc;

/// A candle fails sanity if its high/low bounds are inconsistent. Such bars
/// are dropped rather than rejecting the whole batch — one bad bar from a
/// terminal shouldn't block the rest of a historical backfill.
fn is_sane(candle: &OhlcCandle) -> bool {
    candle.high >= candle.low
        && candle.high >= candle.open
        && candle.high >= candle.close
        && candle.low <= candle.open
        && candle.low <= candle.close
}

/// Returns `(inserted, skipped)` where skipped counts both sanity-dropped
/// and duplicate-dropped bars.
pub async fn ingest_candles(repo: &Arc<dyn CandleRepository>, candles: Vec<OhlcCandle>) -> anyhow::Result<(usize, usize)> {
    let total = candles.len();
    let sane: Vec<OhlcCandle> = candles.into_iter().filter(is_sane).collect();
    let dropped_insane = total - sane.len();

    let (inserted, skipped_dup) = repo.insert_batch(&sane).await?;
    Ok((inserted, skipped_dup + dropped_insane))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use rust_decimal_macros::dec;
    use crate::domain::timeframe::Timeframe;

    fn candle(high: rust_decimal::Decimal, low: rust_decimal::Decimal) -> OhlcCandle {
        OhlcCandle {
            symbol: "EURUSD".into(),
            timeframe: Timeframe::H1,
            open: dec!(1.10),
            high,
            low,
            close: dec!(1.10),
            volume: dec!(100),
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn rejects_high_below_low() {
        assert!(!is_sane(&candle(dec!(1.09), dec!(1.10))));
        assert!(is_sane(&candle(dec!(1.11), dec!(1.09))));
    }
}
