use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::BotResult;
use crate::indicators::{BollingerBands, Indicator};
use crate::types::Signal;

use super::{StrategyCapability, StrategyContext};

/// Single-indicator Bollinger Bands strategy: buys on a lower-band touch
/// while flat, sells on an upper-band touch while long. Owns its own bands
/// kernel and a one-tick memo of the previous (price, upper, lower).
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BbandsConfig {
    pub period: usize,
    pub std_dev: Decimal,
}

pub struct BbandsStrategy {
    bands: BollingerBands,
    prev: Option<(Decimal, Decimal, Decimal)>,
    reason: String,
}

impl BbandsStrategy {
    pub fn new(config: BbandsConfig) -> BotResult<Self> {
        Ok(Self {
            bands: BollingerBands::new(config.period, config.std_dev)?,
            prev: None,
            reason: "awaiting Bollinger Bands warmup".into(),
        })
    }
}

impl StrategyCapability for BbandsStrategy {
    fn update(&mut self, price: Decimal, _volume: Decimal, ts: i64) {
        if let Err(e) = self.bands.update(price, ts) {
            self.reason = format!("Bollinger Bands update rejected: {e}");
        }
    }

    fn is_ready(&self) -> bool {
        self.bands.is_ready()
    }

    fn generate_signal(&mut self, ctx: &StrategyContext) -> Signal {
        let (Some(upper), Some(lower)) = (self.bands.upper(), self.bands.lower()) else {
            self.reason = "Bollinger Bands not ready".into();
            return Signal::none(self.reason.clone());
        };
        let price = ctx.current_price;

        let Some((prev_price, prev_upper, prev_lower)) = self.prev else {
            self.prev = Some((price, upper, lower));
            self.reason = "priming band-touch memo".into();
            return Signal::none(self.reason.clone());
        };
        self.prev = Some((price, upper, lower));

        let lower_touch = prev_price > prev_lower && price <= lower;
        let upper_touch = prev_price < prev_upper && price >= upper;

        if lower_touch && !ctx.is_long() {
            self.reason = format!("lower band touch: price {price} <= lower {lower}");
            return Signal::buy(self.reason.clone());
        }

        if upper_touch && ctx.is_long() {
            self.reason = format!("upper band touch: price {price} >= upper {upper}");
            return Signal::sell(self.reason.clone());
        }

        self.reason = "no qualifying band touch".into();
        Signal::none(self.reason.clone())
    }

    fn signal_reason(&self) -> &str {
        &self.reason
    }

    fn reset(&mut self) {
        self.bands.reset();
        self.prev = None;
        self.reason = "awaiting Bollinger Bands warmup".into();
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
    fn first_ready_update_primes_memo() {
        let cfg = BbandsConfig {
            period: 5,
            std_dev: dec!(2),
        };
        let mut strat = BbandsStrategy::new(cfg).unwrap();
        for (i, p) in [10, 11, 9, 12, 8].iter().enumerate() {
            strat.update(Decimal::from(*p), dec!(1), i as i64);
        }
        assert!(strat.is_ready());
        let signal = strat.generate_signal(&ctx(None, dec!(8)));
        assert!(!signal.is_actionable());
    }
}
