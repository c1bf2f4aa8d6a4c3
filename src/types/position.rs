use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// One instrument, at most one open position at a time. Created on a
/// filled BUY, mutated exactly once to closed on the corresponding SELL.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub id: i64,
    pub symbol: String,
    pub quantity: Decimal,
    pub entry_price: Decimal,
    pub entry_time: DateTime<Utc>,
    pub strategy: String,
    pub is_open: bool,
    pub exit_price: Option<Decimal>,
    pub exit_time: Option<DateTime<Utc>>,
    pub profit_loss: Option<Decimal>,
    pub profit_loss_percent: Option<Decimal>,
    pub buy_trade_id: i64,
    pub sell_trade_id: Option<i64>,
}

impl Position {
    pub fn open(
        symbol: impl Into<String>,
        quantity: Decimal,
        entry_price: Decimal,
        entry_time: DateTime<Utc>,
        strategy: impl Into<String>,
        buy_trade_id: i64,
    ) -> Self {
        Self {
            id: 0,
            symbol: symbol.into(),
            quantity,
            entry_price,
            entry_time,
            strategy: strategy.into(),
            is_open: true,
            exit_price: None,
            exit_time: None,
            profit_loss: None,
            profit_loss_percent: None,
            buy_trade_id,
            sell_trade_id: None,
        }
    }

    pub fn notional_value(&self, price: Decimal) -> Decimal {
        self.quantity * price
    }
}
