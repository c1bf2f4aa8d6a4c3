use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::{BotError, BotResult};
use crate::types::{SignalAction, Signal, Timeframe};

use super::{StrategyCapability, StrategyContext};

/// Configuration for the five-phase multi-timeframe strategy. Requires
/// snapshots on daily (1d), hourly (1h) and five-minute (5m) timeframes,
/// each carrying RSI, MACD and Bollinger Bands.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MultiTimeframeConfig {
    pub rsi_oversold: Decimal,
    pub rsi_overbought: Decimal,
    pub rsi_neutral_low: Decimal,
    pub rsi_neutral_high: Decimal,
    pub macd_min_histogram: Decimal,
    pub bb_min_width: Decimal,
    pub bb_max_width: Decimal,
    pub require_daily_confirmation: bool,
    pub require_hourly_signal: bool,
    pub require_5m_entry: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Bias {
    Bullish,
    Bearish,
    Neutral,
}

pub struct MultiTimeframeStrategy {
    config: MultiTimeframeConfig,
    reason: String,
}

const DAILY: Timeframe = Timeframe::D1;
const HOURLY: Timeframe = Timeframe::H1;
const FIVE_MIN: Timeframe = Timeframe::M5;

impl MultiTimeframeStrategy {
    pub fn new(config: MultiTimeframeConfig) -> BotResult<Self> {
        if config.rsi_overbought <= config.rsi_oversold {
            return Err(BotError::InvalidConfig(
                "multi-timeframe RSI overbought must be greater than oversold".into(),
            ));
        }
        if config.rsi_neutral_high <= config.rsi_neutral_low {
            return Err(BotError::InvalidConfig(
                "multi-timeframe RSI neutral-high must be greater than neutral-low".into(),
            ));
        }
        if config.bb_max_width <= config.bb_min_width {
            return Err(BotError::InvalidConfig(
                "multi-timeframe BB max width must be greater than min width".into(),
            ));
        }
        Ok(Self {
            config,
            reason: "awaiting multi-timeframe snapshots".into(),
        })
    }

    fn reject(&mut self, reason: String) -> Signal {
        self.reason = reason;
        Signal::none(self.reason.clone())
    }

    fn daily_bias(&self, rsi: Decimal, histogram: Decimal, price: Decimal, bb_middle: Decimal) -> Bias {
        let mut bullish = 0u8;
        let mut bearish = 0u8;

        if rsi > self.config.rsi_neutral_high {
            bullish += 1;
        } else if rsi < self.config.rsi_neutral_low {
            bearish += 1;
        }

        if histogram > self.config.macd_min_histogram {
            bullish += 1;
        } else if histogram < -self.config.macd_min_histogram {
            bearish += 1;
        }

        if price > bb_middle {
            bullish += 1;
        } else if price < bb_middle {
            bearish += 1;
        }

        if bullish > bearish {
            Bias::Bullish
        } else if bearish > bullish {
            Bias::Bearish
        } else {
            Bias::Neutral
        }
    }
}

impl StrategyCapability for MultiTimeframeStrategy {
    fn update(&mut self, _price: Decimal, _volume: Decimal, _ts: i64) {
        // Indicator state lives in the multi-timeframe manager; this
        // strategy only consumes its snapshots at signal time.
    }

    fn is_ready(&self) -> bool {
        true
    }

    fn generate_signal(&mut self, ctx: &StrategyContext) -> Signal {
        let Some(daily) = ctx.snapshot(DAILY) else {
            return self.reject("no daily snapshot available".into());
        };
        let Some(hourly) = ctx.snapshot(HOURLY) else {
            return self.reject("no hourly snapshot available".into());
        };
        let Some(five_min) = ctx.snapshot(FIVE_MIN) else {
            return self.reject("no 5m snapshot available".into());
        };

        if !daily.has_rsi() || !daily.has_macd() || !daily.has_bollinger() {
            return self.reject("daily indicators not ready".into());
        }
        if !hourly.has_rsi() || !hourly.has_macd() || !hourly.has_bollinger() {
            return self.reject("hourly indicators not ready".into());
        }
        if !five_min.has_rsi() || !five_min.has_macd() {
            return self.reject("5m indicators not ready".into());
        }

        // Phase 1: daily bias.
        let bias = self.daily_bias(
            daily.rsi.expect("checked"),
            daily.macd_histogram.expect("checked"),
            daily.price,
            daily.bb_middle.expect("checked"),
        );
        if self.config.require_daily_confirmation && bias == Bias::Neutral {
            return self.reject("daily bias NEUTRAL; rejected: daily confirmation required".into());
        }

        // Phase 2: hourly 2-of-3 vote, gated by current position.
        let h_rsi = hourly.rsi.expect("checked");
        let h_macd = hourly.macd.expect("checked");
        let h_signal = hourly.macd_signal.expect("checked");
        let h_histogram = hourly.macd_histogram.expect("checked");
        let h_upper = hourly.bb_upper.expect("checked");
        let h_lower = hourly.bb_lower.expect("checked");
        let h_price = hourly.price;

        let hourly_signal = if !ctx.is_long() {
            let mut votes = 0u8;
            if h_rsi <= self.config.rsi_oversold {
                votes += 1;
            }
            if h_histogram > Decimal::ZERO && h_macd > h_signal {
                votes += 1;
            }
            if h_price <= h_lower * Decimal::new(101, 2) {
                votes += 1;
            }
            if votes >= 2 {
                Some(SignalAction::Buy)
            } else {
                None
            }
        } else {
            let mut votes = 0u8;
            if h_rsi >= self.config.rsi_overbought {
                votes += 1;
            }
            if h_histogram < Decimal::ZERO && h_macd < h_signal {
                votes += 1;
            }
            if h_price >= h_upper * Decimal::new(99, 2) {
                votes += 1;
            }
            if votes >= 2 {
                Some(SignalAction::Sell)
            } else {
                None
            }
        };

        let Some(hourly_signal) = hourly_signal else {
            if self.config.require_hourly_signal {
                return self.reject("no qualifying hourly signal (2-of-3 vote not met)".into());
            }
            return self.reject("hourly vote inconclusive".into());
        };

        // Phase 3: alignment with daily bias.
        if self.config.require_daily_confirmation {
            if bias == Bias::Bullish && hourly_signal == SignalAction::Sell {
                return self.reject(
                    "hourly SELL rejected: bullish daily bias required".into(),
                );
            }
            if bias == Bias::Bearish && hourly_signal == SignalAction::Buy {
                return self.reject(
                    "hourly BUY rejected: bearish daily bias required".into(),
                );
            }
        }

        // Phase 4: 5-minute entry precision.
        if self.config.require_5m_entry {
            let m_rsi = five_min.rsi.expect("checked");
            let m_histogram = five_min.macd_histogram.expect("checked");
            let entry_ok = match hourly_signal {
                SignalAction::Buy => m_rsi < self.config.rsi_neutral_high && m_histogram >= Decimal::ZERO,
                SignalAction::Sell => m_rsi > self.config.rsi_neutral_low && m_histogram <= Decimal::ZERO,
                SignalAction::None => false,
            };
            if !entry_ok {
                return self.reject("rejected: 5m entry precision not met".into());
            }
        }

        // Phase 5: volatility gate on hourly BB width.
        let width = hourly.bb_width_percent.expect("checked via has_bollinger only covers bands");
        if width < self.config.bb_min_width || width > self.config.bb_max_width {
            return self.reject(format!(
                "Volatility outside acceptable range ({width:.2}%)"
            ));
        }

        match hourly_signal {
            SignalAction::Buy => {
                self.reason = format!("daily bias {bias:?}; hourly BUY confirmed, width {width:.2}%");
                Signal::buy(self.reason.clone())
            }
            SignalAction::Sell => {
                self.reason = format!("daily bias {bias:?}; hourly SELL confirmed, width {width:.2}%");
                Signal::sell(self.reason.clone())
            }
            SignalAction::None => self.reject("no qualifying hourly signal".into()),
        }
    }

    fn signal_reason(&self) -> &str {
        &self.reason
    }

    fn reset(&mut self) {
        self.reason = "awaiting multi-timeframe snapshots".into();
    }
}
