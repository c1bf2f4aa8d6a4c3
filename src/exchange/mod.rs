pub mod binance;
pub mod orderbook;
pub mod paper;
pub mod websocket;

pub use orderbook::{OrderBookLevel, OrderBookSnapshot};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::BotResult;
use crate::types::Side;

pub use binance::BinanceExchangeAdapter;
pub use paper::PaperExchangeAdapter;
pub use websocket::BinanceTickSource;

/// Result of a market order fill, whether simulated or real.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct OrderFill {
    pub filled_price: Decimal,
    pub filled_quantity: Decimal,
    pub ts: DateTime<Utc>,
}

/// The small operation set the engine consumes from a venue. A concrete
/// venue integration is a pluggable implementation of this trait; the venue
/// wire protocol itself is out of scope for the signal engine.
#[async_trait]
pub trait ExchangeAdapter: Send + Sync {
    /// Whether fills from this adapter are simulated rather than real.
    fn is_paper(&self) -> bool;

    /// Places a market order. Fails with `ExchangeTemporary` for a
    /// transport-level or transient venue error (retryable through
    /// `executeWithSafety`), or `ExchangeFatal` for a rejection that retrying
    /// cannot fix (insufficient balance, invalid symbol, ...).
    async fn place_market_order(
        &self,
        symbol: &str,
        side: Side,
        quantity: Decimal,
    ) -> BotResult<OrderFill>;

    /// Read-only top-of-book snapshot consumed by the liquidity check.
    async fn order_book(&self, symbol: &str, depth: usize) -> BotResult<OrderBookSnapshot>;

    /// Venue server time in epoch milliseconds, read once at boot to compute
    /// the clock-skew offset applied to subsequent signed requests.
    async fn server_time(&self) -> BotResult<i64>;

    /// Informs the adapter of the latest traded price. A no-op for a real
    /// venue (its book is authoritative); the paper adapter uses this as the
    /// price it fills and quotes a synthetic book around.
    async fn on_price_update(&self, _price: Decimal) {}
}
