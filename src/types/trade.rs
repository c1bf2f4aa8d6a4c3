use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::trading::Side;

/// Append-only ledger row. SELL rows link back to the opening BUY via
/// `related_buy_id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trade {
    pub id: i64,
    pub symbol: String,
    pub side: Side,
    pub quantity: Decimal,
    pub price: Decimal,
    pub total: Decimal,
    pub strategy: String,
    pub signal_reason: String,
    pub indicator_values_json: String,
    pub paper_trade: bool,
    pub ts: DateTime<Utc>,
    pub exchange_order_id: Option<String>,
    pub profit_loss: Option<Decimal>,
    pub profit_loss_percent: Option<Decimal>,
    pub related_buy_id: Option<i64>,
}

impl Trade {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        symbol: impl Into<String>,
        side: Side,
        quantity: Decimal,
        price: Decimal,
        strategy: impl Into<String>,
        signal_reason: impl Into<String>,
        indicator_values_json: impl Into<String>,
        paper_trade: bool,
        ts: DateTime<Utc>,
        exchange_order_id: Option<String>,
    ) -> Self {
        Self {
            id: 0,
            symbol: symbol.into(),
            side,
            quantity,
            price,
            total: quantity * price,
            strategy: strategy.into(),
            signal_reason: signal_reason.into(),
            indicator_values_json: indicator_values_json.into(),
            paper_trade,
            ts,
            exchange_order_id,
            profit_loss: None,
            profit_loss_percent: None,
            related_buy_id: None,
        }
    }

    pub fn with_realized_pnl(mut self, profit_loss: Decimal, profit_loss_percent: Decimal, related_buy_id: i64) -> Self {
        self.profit_loss = Some(profit_loss);
        self.profit_loss_percent = Some(profit_loss_percent);
        self.related_buy_id = Some(related_buy_id);
        self
    }
}
