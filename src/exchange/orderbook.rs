use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct OrderBookLevel {
    pub price: Decimal,
    pub quantity: Decimal,
}

/// Top-of-book snapshot for one symbol, as returned by
/// `ExchangeAdapter::order_book`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderBookSnapshot {
    pub symbol: String,
    pub bids: Vec<OrderBookLevel>,
    pub asks: Vec<OrderBookLevel>,
}

impl OrderBookSnapshot {
    pub fn spread_pct(&self) -> Option<Decimal> {
        let best_bid = self.bids.first()?.price;
        let best_ask = self.asks.first()?.price;
        if best_bid.is_zero() && best_ask.is_zero() {
            return None;
        }
        let mid = (best_bid + best_ask) / Decimal::from(2);
        if mid.is_zero() {
            return None;
        }
        Some((best_ask - best_bid) / mid * Decimal::from(100))
    }

    pub fn bid_depth(&self, levels: usize) -> Decimal {
        self.bids.iter().take(levels).map(|l| l.quantity).sum()
    }

    pub fn ask_depth(&self, levels: usize) -> Decimal {
        self.asks.iter().take(levels).map(|l| l.quantity).sum()
    }

    pub fn total_volume(&self, levels: usize) -> Decimal {
        self.bid_depth(levels) + self.ask_depth(levels)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn snapshot() -> OrderBookSnapshot {
        OrderBookSnapshot {
            symbol: "BTCUSDT".into(),
            bids: vec![
                OrderBookLevel { price: dec!(50000), quantity: dec!(1.0) },
                OrderBookLevel { price: dec!(49990), quantity: dec!(0.5) },
            ],
            asks: vec![
                OrderBookLevel { price: dec!(50010), quantity: dec!(0.8) },
                OrderBookLevel { price: dec!(50020), quantity: dec!(0.4) },
            ],
        }
    }

    #[test]
    fn spread_pct_matches_top_of_book() {
        let spread = snapshot().spread_pct().unwrap();
        assert!(spread > dec!(0.019) && spread < dec!(0.021));
    }

    #[test]
    fn depth_sums_requested_levels() {
        let book = snapshot();
        assert_eq!(book.bid_depth(2), dec!(1.5));
        assert_eq!(book.ask_depth(2), dec!(1.2));
    }
}
