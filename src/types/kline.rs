use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// One price/volume update from the tick source for a single instrument.
///
/// Mirrors an exchange kline/candlestick event: `open`/`high`/`low` describe
/// the bar the event currently belongs to, `close` is the latest trade
/// price. `is_closed` is set once by the source when the bar is final;
/// everything before that is a mid-bar update and may repeat the same
/// `close_time` bucket any number of times.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KlineEvent {
    pub symbol: String,
    pub open_time: i64,
    pub close_time: i64,
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
    pub volume: Decimal,
    pub is_closed: bool,
}

impl KlineEvent {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        symbol: impl Into<String>,
        open_time: i64,
        close_time: i64,
        open: Decimal,
        high: Decimal,
        low: Decimal,
        close: Decimal,
        volume: Decimal,
        is_closed: bool,
    ) -> Self {
        Self {
            symbol: symbol.into(),
            open_time,
            close_time,
            open,
            high,
            low,
            close,
            volume,
            is_closed,
        }
    }
}
