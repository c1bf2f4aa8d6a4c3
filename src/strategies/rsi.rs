use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::{BotError, BotResult};
use crate::indicators::{Indicator, Rsi};
use crate::types::Signal;

use super::{StrategyCapability, StrategyContext};

/// Single-indicator RSI strategy: buys when flat and oversold, sells when
/// long and overbought. Owns its own RSI kernel, fed directly from the tick
/// stream rather than through a multi-timeframe snapshot.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RsiConfig {
    pub period: usize,
    pub overbought: Decimal,
    pub oversold: Decimal,
}

pub struct RsiStrategy {
    config: RsiConfig,
    rsi: Rsi,
    reason: String,
}

impl RsiStrategy {
    pub fn new(config: RsiConfig) -> BotResult<Self> {
        if config.overbought <= config.oversold {
            return Err(BotError::InvalidConfig(
                "RSI strategy overbought must be greater than oversold".into(),
            ));
        }
        Ok(Self {
            rsi: Rsi::new(config.period)?,
            config,
            reason: "awaiting RSI warmup".into(),
        })
    }
}

impl StrategyCapability for RsiStrategy {
    fn update(&mut self, price: Decimal, _volume: Decimal, ts: i64) {
        if let Err(e) = self.rsi.update(price, ts) {
            self.reason = format!("RSI update rejected: {e}");
        }
    }

    fn is_ready(&self) -> bool {
        self.rsi.is_ready()
    }

    fn generate_signal(&mut self, ctx: &StrategyContext) -> Signal {
        let Some(rsi) = self.rsi.value() else {
            self.reason = "RSI not ready".into();
            return Signal::none(self.reason.clone());
        };

        if !ctx.is_long() && rsi <= self.config.oversold {
            self.reason = format!("RSI OVERSOLD: {rsi} <= {}", self.config.oversold);
            return Signal::buy(self.reason.clone());
        }

        if ctx.is_long() && rsi >= self.config.overbought {
            self.reason = format!("RSI OVERBOUGHT: {rsi} >= {}", self.config.overbought);
            return Signal::sell(self.reason.clone());
        }

        self.reason = format!("RSI {rsi} inside neutral band");
        Signal::none(self.reason.clone())
    }

    fn signal_reason(&self) -> &str {
        &self.reason
    }

    fn reset(&mut self) {
        self.rsi.reset();
        self.reason = "awaiting RSI warmup".into();
    }
}
