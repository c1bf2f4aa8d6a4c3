pub mod bbands;
pub mod dca;
pub mod macd;
pub mod multitimeframe;
pub mod rsi;

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use crate::clock::Clock;
use crate::error::BotResult;
use crate::types::{IndicatorSnapshot, Position, Signal, Timeframe};

pub use bbands::{BbandsConfig, BbandsStrategy};
pub use dca::{DcaConfig, DcaStrategy};
pub use macd::{MacdConfig, MacdStrategy};
pub use multitimeframe::{MultiTimeframeConfig, MultiTimeframeStrategy};
pub use rsi::{RsiConfig, RsiStrategy};

/// Everything a strategy needs to evaluate one tick. Strategies hold no
/// mutable domain state beyond their own per-variant memo; candles,
/// indicators and the position mirror are all owned elsewhere and handed in
/// by reference here.
pub struct StrategyContext<'a> {
    pub current_price: Decimal,
    pub position: Option<&'a Position>,
    pub snapshots: &'a HashMap<Timeframe, IndicatorSnapshot>,
    pub now: DateTime<Utc>,
}

impl<'a> StrategyContext<'a> {
    pub fn snapshot(&self, timeframe: Timeframe) -> Option<&IndicatorSnapshot> {
        self.snapshots.get(&timeframe)
    }

    pub fn is_long(&self) -> bool {
        self.position.map(|p| p.is_open).unwrap_or(false)
    }
}

/// Capability every strategy variant implements. `generate_signal` never
/// fails for insufficient data -- it returns `Signal::none` with a reason.
/// A strategy can only fail at construction time, on misconfiguration.
pub trait StrategyCapability {
    fn update(&mut self, price: Decimal, volume: Decimal, ts: i64);
    fn is_ready(&self) -> bool;
    fn generate_signal(&mut self, ctx: &StrategyContext) -> Signal;
    fn signal_reason(&self) -> &str;
    fn reset(&mut self);
}

/// Tagged variant over the five strategy kinds, built once through
/// `build_strategy` and dispatched by match rather than dynamic dispatch or
/// a class hierarchy.
pub enum Strategy {
    Rsi(RsiStrategy),
    Macd(MacdStrategy),
    Bbands(BbandsStrategy),
    Dca(DcaStrategy),
    MultiTimeframe(MultiTimeframeStrategy),
}

impl Strategy {
    pub fn name(&self) -> &'static str {
        match self {
            Strategy::Rsi(_) => "rsi",
            Strategy::Macd(_) => "macd",
            Strategy::Bbands(_) => "bbands",
            Strategy::Dca(_) => "dca",
            Strategy::MultiTimeframe(_) => "multitimeframe",
        }
    }
}

impl StrategyCapability for Strategy {
    fn update(&mut self, price: Decimal, volume: Decimal, ts: i64) {
        match self {
            Strategy::Rsi(s) => s.update(price, volume, ts),
            Strategy::Macd(s) => s.update(price, volume, ts),
            Strategy::Bbands(s) => s.update(price, volume, ts),
            Strategy::Dca(s) => s.update(price, volume, ts),
            Strategy::MultiTimeframe(s) => s.update(price, volume, ts),
        }
    }

    fn is_ready(&self) -> bool {
        match self {
            Strategy::Rsi(s) => s.is_ready(),
            Strategy::Macd(s) => s.is_ready(),
            Strategy::Bbands(s) => s.is_ready(),
            Strategy::Dca(s) => s.is_ready(),
            Strategy::MultiTimeframe(s) => s.is_ready(),
        }
    }

    fn generate_signal(&mut self, ctx: &StrategyContext) -> Signal {
        match self {
            Strategy::Rsi(s) => s.generate_signal(ctx),
            Strategy::Macd(s) => s.generate_signal(ctx),
            Strategy::Bbands(s) => s.generate_signal(ctx),
            Strategy::Dca(s) => s.generate_signal(ctx),
            Strategy::MultiTimeframe(s) => s.generate_signal(ctx),
        }
    }

    fn signal_reason(&self) -> &str {
        match self {
            Strategy::Rsi(s) => s.signal_reason(),
            Strategy::Macd(s) => s.signal_reason(),
            Strategy::Bbands(s) => s.signal_reason(),
            Strategy::Dca(s) => s.signal_reason(),
            Strategy::MultiTimeframe(s) => s.signal_reason(),
        }
    }

    fn reset(&mut self) {
        match self {
            Strategy::Rsi(s) => s.reset(),
            Strategy::Macd(s) => s.reset(),
            Strategy::Bbands(s) => s.reset(),
            Strategy::Dca(s) => s.reset(),
            Strategy::MultiTimeframe(s) => s.reset(),
        }
    }
}

/// Per-variant configuration, keyed by `type` on the configuration surface.
pub enum StrategyConfig {
    Rsi(RsiConfig),
    Macd(MacdConfig),
    Bbands(BbandsConfig),
    Dca(DcaConfig),
    MultiTimeframe(MultiTimeframeConfig),
}

/// Single validating factory: every variant's config is checked up front and
/// construction fails with `InvalidConfig` on misconfiguration rather than
/// at first use.
pub fn build_strategy(config: StrategyConfig, clock: Arc<dyn Clock>) -> BotResult<Strategy> {
    Ok(match config {
        StrategyConfig::Rsi(c) => Strategy::Rsi(RsiStrategy::new(c)?),
        StrategyConfig::Macd(c) => Strategy::Macd(MacdStrategy::new(c)?),
        StrategyConfig::Bbands(c) => Strategy::Bbands(BbandsStrategy::new(c)?),
        StrategyConfig::Dca(c) => Strategy::Dca(DcaStrategy::new(c, clock)?),
        StrategyConfig::MultiTimeframe(c) => {
            Strategy::MultiTimeframe(MultiTimeframeStrategy::new(c)?)
        }
    })
}
