use std::collections::VecDeque;
use std::sync::Arc;

use chrono::{DateTime, Datelike, Duration, TimeZone, Timelike, Utc, Weekday};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::clock::Clock;
use crate::error::BotResult;
use crate::types::Signal;

use super::{StrategyCapability, StrategyContext};

/// Time-driven dollar-cost-average strategy. Carries no indicators;
/// `generateSignal` is a pure function of `(now, nextFire, rolling24hHigh,
/// lastDipBuy)` per tick, evaluated against an injectable clock so tests
/// never sleep.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DcaConfig {
    pub weekday: Weekday,
    pub hour_of_day: u32,
    pub quote_amount: Decimal,
    pub dip_enabled: bool,
    pub dip_threshold_pct: Option<Decimal>,
    pub dip_multiplier: Option<Decimal>,
}

pub struct DcaStrategy {
    config: DcaConfig,
    clock: Arc<dyn Clock>,
    next_fire: DateTime<Utc>,
    recent_prices: VecDeque<(i64, Decimal)>,
    last_dip_buy: Option<DateTime<Utc>>,
    reason: String,
}

fn next_scheduled_fire(from: DateTime<Utc>, weekday: Weekday, hour_of_day: u32) -> DateTime<Utc> {
    let mut day = from.date_naive();
    loop {
        if day.weekday() == weekday {
            let candidate = Utc
                .from_utc_datetime(&day.and_hms_opt(hour_of_day, 0, 0).expect("valid hour"));
            if candidate > from {
                return candidate;
            }
        }
        day += Duration::days(1);
    }
}

impl DcaStrategy {
    pub fn new(config: DcaConfig, clock: Arc<dyn Clock>) -> BotResult<Self> {
        let now = clock.now();
        let next_fire = next_scheduled_fire(now, config.weekday, config.hour_of_day);
        Ok(Self {
            config,
            clock,
            next_fire,
            recent_prices: VecDeque::new(),
            last_dip_buy: None,
            reason: "awaiting next scheduled buy".into(),
        })
    }

    fn rolling_24h_high(&self) -> Option<Decimal> {
        self.recent_prices.iter().map(|(_, p)| *p).max()
    }

    fn prune_older_than_24h(&mut self, ts: i64) {
        while let Some((front_ts, _)) = self.recent_prices.front() {
            if ts - front_ts > 24 * 3600 {
                self.recent_prices.pop_front();
            } else {
                break;
            }
        }
    }
}

impl StrategyCapability for DcaStrategy {
    fn update(&mut self, price: Decimal, _volume: Decimal, ts: i64) {
        self.recent_prices.push_back((ts, price));
        self.prune_older_than_24h(ts);
    }

    fn is_ready(&self) -> bool {
        true
    }

    fn generate_signal(&mut self, ctx: &StrategyContext) -> Signal {
        let now = self.clock.now().max(ctx.now);
        let price = ctx.current_price;

        if now >= self.next_fire {
            let quantity = if price.is_zero() {
                Decimal::ZERO
            } else {
                self.config.quote_amount / price
            };
            self.next_fire = next_scheduled_fire(now, self.config.weekday, self.config.hour_of_day);
            self.reason = format!("scheduled DCA buy at {now}");
            return Signal::buy_with_quantity(self.reason.clone(), quantity);
        }

        if self.config.dip_enabled {
            if let (Some(threshold), Some(multiplier)) =
                (self.config.dip_threshold_pct, self.config.dip_multiplier)
            {
                if let Some(high) = self.rolling_24h_high() {
                    let cooled_down = self
                        .last_dip_buy
                        .map(|last| now - last >= Duration::hours(24))
                        .unwrap_or(true);

                    if !high.is_zero() && cooled_down {
                        let drop_pct = (high - price) / high * Decimal::from(100);
                        if drop_pct >= threshold {
                            let quantity = if price.is_zero() {
                                Decimal::ZERO
                            } else {
                                multiplier * self.config.quote_amount / price
                            };
                            self.last_dip_buy = Some(now);
                            self.reason =
                                format!("dip buy: {drop_pct}% below 24h high {high}");
                            return Signal::buy_with_quantity(self.reason.clone(), quantity);
                        }
                    }
                }
            }
        }

        self.reason = format!("next scheduled buy at {}", self.next_fire);
        Signal::none(self.reason.clone())
    }

    fn signal_reason(&self) -> &str {
        &self.reason
    }

    fn reset(&mut self) {
        self.recent_prices.clear();
        self.last_dip_buy = None;
        self.reason = "awaiting next scheduled buy".into();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::test_support::FixedClock;
    use rust_decimal_macros::dec;
    use std::collections::HashMap;

    fn ctx(now: DateTime<Utc>, price: Decimal) -> StrategyContext<'static> {
        StrategyContext {
            current_price: price,
            position: None,
            snapshots: Box::leak(Box::new(HashMap::new())),
            now,
        }
    }

    #[test]
    fn fires_once_and_advances_a_week() {
        let start = Utc.with_ymd_and_hms(2025, 1, 6, 8, 0, 0).unwrap();
        let clock = Arc::new(FixedClock::new(start));
        let cfg = DcaConfig {
            weekday: Weekday::Mon,
            hour_of_day: 9,
            quote_amount: dec!(100),
            dip_enabled: false,
            dip_threshold_pct: None,
            dip_multiplier: None,
        };
        let mut strat = DcaStrategy::new(cfg, clock.clone()).unwrap();

        let before = strat.generate_signal(&ctx(start, dec!(100)));
        assert!(!before.is_actionable());

        clock.set(Utc.with_ymd_and_hms(2025, 1, 6, 9, 0, 0).unwrap());
        let fire_time = clock.now();
        let fired = strat.generate_signal(&ctx(fire_time, dec!(100)));
        assert!(fired.is_actionable());
        assert_eq!(strat.next_fire, fire_time + Duration::days(7));
    }

    #[test]
    fn dip_buy_scales_quantity_by_multiplier() {
        let start = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        let clock = Arc::new(FixedClock::new(start));
        let cfg = DcaConfig {
            weekday: Weekday::Sun,
            hour_of_day: 23,
            quote_amount: dec!(100),
            dip_enabled: true,
            dip_threshold_pct: Some(dec!(5)),
            dip_multiplier: Some(dec!(1.5)),
        };
        let mut strat = DcaStrategy::new(cfg, clock.clone()).unwrap();
        strat.update(dec!(100000), dec!(1), start.timestamp());

        let now = start + Duration::hours(1);
        clock.set(now);
        let signal = strat.generate_signal(&ctx(now, dec!(94000)));
        assert!(signal.is_actionable());
        assert!(signal.suggested_quantity.is_some());
    }
}
