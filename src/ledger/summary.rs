use rust_decimal::Decimal;
use serde::Serialize;

use crate::types::{Side, Trade};

/// Aggregate statistics over a set of trades, computed from closed (SELL)
/// rows only -- a BUY carries no realized P/L of its own.
#[derive(Debug, Clone, Default, Serialize)]
pub struct LedgerSummary {
    pub total_trades: usize,
    pub buy_count: usize,
    pub sell_count: usize,
    pub wins: usize,
    pub losses: usize,
    pub win_rate_pct: Decimal,
    pub avg_profit_loss: Decimal,
    pub largest_win: Decimal,
    pub largest_loss: Decimal,
}

impl LedgerSummary {
    pub fn from_trades(trades: &[Trade]) -> Self {
        let total_trades = trades.len();
        let buy_count = trades.iter().filter(|t| t.side == Side::Buy).count();
        let sell_count = trades.iter().filter(|t| t.side == Side::Sell).count();

        let realized: Vec<Decimal> = trades.iter().filter_map(|t| t.profit_loss).collect();
        let wins = realized.iter().filter(|pnl| **pnl > Decimal::ZERO).count();
        let losses = realized.iter().filter(|pnl| **pnl < Decimal::ZERO).count();

        let win_rate_pct = if realized.is_empty() {
            Decimal::ZERO
        } else {
            Decimal::from(wins) / Decimal::from(realized.len()) * Decimal::from(100)
        };

        let avg_profit_loss = if realized.is_empty() {
            Decimal::ZERO
        } else {
            realized.iter().sum::<Decimal>() / Decimal::from(realized.len())
        };

        let largest_win = realized
            .iter()
            .copied()
            .fold(Decimal::ZERO, |acc, pnl| acc.max(pnl));
        let largest_loss = realized
            .iter()
            .copied()
            .fold(Decimal::ZERO, |acc, pnl| acc.min(pnl));

        Self {
            total_trades,
            buy_count,
            sell_count,
            wins,
            losses,
            win_rate_pct,
            avg_profit_loss,
            largest_win,
            largest_loss,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use rust_decimal_macros::dec;

    fn sell_with_pnl(pnl: Decimal) -> Trade {
        Trade::new(
            "BTCUSDT",
            Side::Sell,
            dec!(1),
            dec!(100),
            "rsi",
            "test",
            "{}",
            true,
            Utc::now(),
            None,
        )
        .with_realized_pnl(pnl, pnl, 1)
    }

    #[test]
    fn computes_win_rate_and_averages() {
        let trades = vec![
            sell_with_pnl(dec!(10)),
            sell_with_pnl(dec!(-5)),
            sell_with_pnl(dec!(20)),
        ];
        let summary = LedgerSummary::from_trades(&trades);
        assert_eq!(summary.wins, 2);
        assert_eq!(summary.losses, 1);
        assert_eq!(summary.largest_win, dec!(20));
        assert_eq!(summary.largest_loss, dec!(-5));
        assert_eq!(summary.avg_profit_loss, dec!(25) / dec!(3));
    }

    #[test]
    fn empty_trade_list_yields_zeroed_summary() {
        let summary = LedgerSummary::from_trades(&[]);
        assert_eq!(summary.total_trades, 0);
        assert_eq!(summary.win_rate_pct, Decimal::ZERO);
    }
}
