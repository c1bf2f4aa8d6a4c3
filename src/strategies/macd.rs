use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::BotResult;
use crate::indicators::{Indicator, Macd as MacdIndicator};
use crate::types::Signal;

use super::{StrategyCapability, StrategyContext};

/// Single-indicator MACD strategy: edge-triggered on crossover of the MACD
/// line over its signal line. Owns its own MACD kernel and a one-tick memo
/// of the previous (macd, signal) pair for crossover detection.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MacdConfig {
    pub fast: usize,
    pub slow: usize,
    pub signal: usize,
}

pub struct MacdStrategy {
    macd: MacdIndicator,
    prev: Option<(Decimal, Decimal)>,
    reason: String,
}

impl MacdStrategy {
    pub fn new(config: MacdConfig) -> BotResult<Self> {
        Ok(Self {
            macd: MacdIndicator::new(config.fast, config.slow, config.signal)?,
            prev: None,
            reason: "awaiting MACD warmup".into(),
        })
    }
}

impl StrategyCapability for MacdStrategy {
    fn update(&mut self, price: Decimal, _volume: Decimal, ts: i64) {
        if let Err(e) = self.macd.update(price, ts) {
            self.reason = format!("MACD update rejected: {e}");
        }
    }

    fn is_ready(&self) -> bool {
        self.macd.is_ready()
    }

    fn generate_signal(&mut self, ctx: &StrategyContext) -> Signal {
        let (Some(macd_line), Some(signal_line)) = (self.macd.macd_line(), self.macd.signal_line())
        else {
            self.reason = "MACD not ready".into();
            return Signal::none(self.reason.clone());
        };

        let Some((prev_macd, prev_signal)) = self.prev else {
            self.prev = Some((macd_line, signal_line));
            self.reason = "priming crossover memo".into();
            return Signal::none(self.reason.clone());
        };
        self.prev = Some((macd_line, signal_line));

        let bullish_cross = prev_macd <= prev_signal && macd_line > signal_line;
        let bearish_cross = prev_macd >= prev_signal && macd_line < signal_line;

        if bullish_cross && !ctx.is_long() {
            self.reason = format!(
                "MACD bullish crossover: {macd_line} crossed above {signal_line}"
            );
            return Signal::buy(self.reason.clone());
        }

        if bearish_cross && ctx.is_long() {
            self.reason = format!(
                "MACD bearish crossover: {macd_line} crossed below {signal_line}"
            );
            return Signal::sell(self.reason.clone());
        }

        self.reason = "no qualifying MACD crossover".into();
        Signal::none(self.reason.clone())
    }

    fn signal_reason(&self) -> &str {
        &self.reason
    }

    fn reset(&mut self) {
        self.macd.reset();
        self.prev = None;
        self.reason = "awaiting MACD warmup".into();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Position;
    use chrono::Utc;
    use rust_decimal_macros::dec;
    use std::collections::HashMap;

    fn ctx(position: Option<&Position>, price: Decimal) -> StrategyContext<'_> {
        StrategyContext {
            current_price: price,
            position,
            snapshots: Box::leak(Box::new(HashMap::new())),
            now: Utc::now(),
        }
    }

    #[test]
    fn first_ready_update_primes_memo_without_signal() {
        let cfg = MacdConfig {
            fast: 3,
            slow: 6,
            signal: 2,
        };
        let mut strat = MacdStrategy::new(cfg).unwrap();
        let mut price = dec!(100);
        for i in 0..20 {
            strat.update(price, dec!(1), i);
            price += dec!(1);
        }
        assert!(strat.is_ready());
        let first = strat.generate_signal(&ctx(None, price));
        assert!(!first.is_actionable());
    }
}
