use rust_decimal::Decimal;

use crate::error::{BotError, BotResult};
use crate::exchange::OrderBookSnapshot;
use crate::types::Side;

use super::config::LiquidityConfig;

const DEPTH_LEVELS: usize = 5;

/// Evaluates an order book snapshot against the configured liquidity floor.
/// A depth, volume, or spread violation fails the trade outright -- there is
/// no fallback to a smaller order.
pub fn check(
    book: &OrderBookSnapshot,
    side: Side,
    quantity: Decimal,
    config: &LiquidityConfig,
) -> BotResult<()> {
    let bid_depth = book.bid_depth(DEPTH_LEVELS);
    let ask_depth = book.ask_depth(DEPTH_LEVELS);

    if bid_depth < config.min_depth || ask_depth < config.min_depth {
        return Err(BotError::InsufficientLiquidity(format!(
            "book depth below floor: bid {bid_depth} ask {ask_depth} < {}",
            config.min_depth
        )));
    }

    let total_volume = bid_depth + ask_depth;
    if total_volume < config.min_total_volume {
        return Err(BotError::InsufficientLiquidity(format!(
            "total quoted volume {total_volume} below floor {}",
            config.min_total_volume
        )));
    }

    let spread_pct = book
        .spread_pct()
        .ok_or_else(|| BotError::InsufficientLiquidity("order book has no top of book".into()))?;
    if spread_pct > config.max_spread_pct {
        return Err(BotError::InsufficientLiquidity(format!(
            "spread {spread_pct}% exceeds floor {}%",
            config.max_spread_pct
        )));
    }

    let available_side_volume = match side {
        Side::Buy => ask_depth,
        Side::Sell => bid_depth,
    };
    if quantity > config.min_volume_multiplier * available_side_volume {
        return Err(BotError::InsufficientLiquidity(format!(
            "order quantity {quantity} exceeds {}x available {side:?}-side volume {available_side_volume}",
            config.min_volume_multiplier
        )));
    }

    Ok(())
}
