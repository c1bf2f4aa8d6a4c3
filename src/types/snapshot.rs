use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::ohlcv::Timeframe;

/// Immutable per-timeframe bundle of current indicator values plus
/// readiness. Each numeric field is `None` until its indicator is ready;
/// strategies must never read a field they haven't checked readiness for.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct IndicatorSnapshot {
    pub timeframe: Timeframe,
    pub ts: i64,
    pub price: Decimal,
    pub rsi: Option<Decimal>,
    pub macd: Option<Decimal>,
    pub macd_signal: Option<Decimal>,
    pub macd_histogram: Option<Decimal>,
    pub bb_upper: Option<Decimal>,
    pub bb_middle: Option<Decimal>,
    pub bb_lower: Option<Decimal>,
    pub bb_width_percent: Option<Decimal>,
}

impl IndicatorSnapshot {
    pub fn empty(timeframe: Timeframe, ts: i64, price: Decimal) -> Self {
        Self {
            timeframe,
            ts,
            price,
            rsi: None,
            macd: None,
            macd_signal: None,
            macd_histogram: None,
            bb_upper: None,
            bb_middle: None,
            bb_lower: None,
            bb_width_percent: None,
        }
    }

    pub fn has_rsi(&self) -> bool {
        self.rsi.is_some()
    }

    pub fn has_macd(&self) -> bool {
        self.macd.is_some() && self.macd_signal.is_some() && self.macd_histogram.is_some()
    }

    pub fn has_bollinger(&self) -> bool {
        self.bb_upper.is_some() && self.bb_middle.is_some() && self.bb_lower.is_some()
    }
}
