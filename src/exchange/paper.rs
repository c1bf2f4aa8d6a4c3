use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;
use tokio::sync::RwLock;

use crate::error::BotResult;
use crate::types::Side;

use super::{ExchangeAdapter, OrderBookLevel, OrderBookSnapshot, OrderFill};

/// Synthetic fills at the triggering event's close price, recorded with
/// `paperTrade=true`. Used whenever the configuration's `tradingEnabled` is
/// false. Holds the last price it was told about so `order_book` can
/// synthesize a plausible top-of-book around it.
pub struct PaperExchangeAdapter {
    last_price: RwLock<Decimal>,
    spread_bps: Decimal,
}

impl PaperExchangeAdapter {
    pub fn new(initial_price: Decimal) -> Self {
        Self {
            last_price: RwLock::new(initial_price),
            spread_bps: Decimal::new(5, 1), // 0.5 bps synthetic spread
        }
    }

    pub async fn set_last_price(&self, price: Decimal) {
        *self.last_price.write().await = price;
    }
}

#[async_trait]
impl ExchangeAdapter for PaperExchangeAdapter {
    fn is_paper(&self) -> bool {
        true
    }

    async fn place_market_order(
        &self,
        _symbol: &str,
        _side: Side,
        quantity: Decimal,
    ) -> BotResult<OrderFill> {
        let price = *self.last_price.read().await;
        Ok(OrderFill {
            filled_price: price,
            filled_quantity: quantity,
            ts: Utc::now(),
        })
    }

    async fn order_book(&self, symbol: &str, depth: usize) -> BotResult<OrderBookSnapshot> {
        let price = *self.last_price.read().await;
        let half_spread = price * self.spread_bps / Decimal::from(10_000);
        let bid = price - half_spread;
        let ask = price + half_spread;

        let level_qty = Decimal::from(100);
        let bids = (0..depth.max(1))
            .map(|i| OrderBookLevel {
                price: bid - half_spread * Decimal::from(i as u32),
                quantity: level_qty,
            })
            .collect();
        let asks = (0..depth.max(1))
            .map(|i| OrderBookLevel {
                price: ask + half_spread * Decimal::from(i as u32),
                quantity: level_qty,
            })
            .collect();

        Ok(OrderBookSnapshot {
            symbol: symbol.to_string(),
            bids,
            asks,
        })
    }

    async fn server_time(&self) -> BotResult<i64> {
        Ok(Utc::now().timestamp_millis())
    }

    async fn on_price_update(&self, price: Decimal) {
        self.set_last_price(price).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[tokio::test]
    async fn fills_at_last_known_price() {
        let adapter = PaperExchangeAdapter::new(dec!(100));
        let fill = adapter
            .place_market_order("BTCUSDT", Side::Buy, dec!(1))
            .await
            .unwrap();
        assert_eq!(fill.filled_price, dec!(100));
        assert_eq!(fill.filled_quantity, dec!(1));

        adapter.set_last_price(dec!(105)).await;
        let fill = adapter
            .place_market_order("BTCUSDT", Side::Sell, dec!(1))
            .await
            .unwrap();
        assert_eq!(fill.filled_price, dec!(105));
    }

    #[tokio::test]
    async fn order_book_brackets_last_price() {
        let adapter = PaperExchangeAdapter::new(dec!(100));
        let book = adapter.order_book("BTCUSDT", 5).await.unwrap();
        assert_eq!(book.bids.len(), 5);
        assert_eq!(book.asks.len(), 5);
        assert!(book.bids[0].price < dec!(100));
        assert!(book.asks[0].price > dec!(100));
    }
}
