use rust_decimal::Decimal;

use crate::error::{BotError, BotResult};

use super::Indicator;

/// Average true range: `TR = max(high-low, |high-prevClose|, |low-prevClose|)`,
/// then Wilder-smoothed. Ready after `period` bars.
#[derive(Debug, Clone)]
pub struct Atr {
    period: usize,
    prev_close: Option<Decimal>,
    true_ranges: Vec<Decimal>,
    value: Option<Decimal>,
}

impl Atr {
    pub fn new(period: usize) -> BotResult<Self> {
        if period == 0 {
            return Err(BotError::InvalidConfig("ATR period must be > 0".into()));
        }
        Ok(Self {
            period,
            prev_close: None,
            true_ranges: Vec::with_capacity(period),
            value: None,
        })
    }

    pub fn update(&mut self, high: Decimal, low: Decimal, close: Decimal, _ts: i64) -> BotResult<Option<Decimal>> {
        if close <= Decimal::ZERO || high <= Decimal::ZERO || low <= Decimal::ZERO {
            return Err(BotError::InvalidInput(
                "ATR update received non-positive price".into(),
            ));
        }
        if low > high {
            return Err(BotError::InvalidInput("ATR update received low > high".into()));
        }

        let tr = self.true_range(high, low);
        self.prev_close = Some(close);

        self.true_ranges.push(tr);

        if self.true_ranges.len() < self.period {
            return Ok(None);
        }

        if self.true_ranges.len() == self.period && self.value.is_none() {
            let sum: Decimal = self.true_ranges.iter().sum();
            self.value = Some(sum / Decimal::from(self.period as u32));
        } else if let Some(prev_atr) = self.value {
            let period_dec = Decimal::from(self.period as u32);
            self.value = Some((prev_atr * (period_dec - Decimal::ONE) + tr) / period_dec);
        }

        if self.true_ranges.len() > self.period {
            self.true_ranges.remove(0);
        }

        Ok(self.value)
    }

    fn true_range(&self, high: Decimal, low: Decimal) -> Decimal {
        let hl = high - low;
        match self.prev_close {
            Some(prev_close) => {
                let hc = (high - prev_close).abs();
                let lc = (low - prev_close).abs();
                hl.max(hc).max(lc)
            }
            None => hl,
        }
    }

    pub fn value(&self) -> Option<Decimal> {
        self.value
    }

    /// `entry - v*atrMult` for a long stop-loss, `entry + v*atrMult` for a short.
    pub fn stop_loss(&self, entry_price: Decimal, multiplier: Decimal, is_long: bool) -> Option<Decimal> {
        self.value.map(|atr| {
            let distance = atr * multiplier;
            if is_long {
                entry_price - distance
            } else {
                entry_price + distance
            }
        })
    }
}

impl Indicator for Atr {
    fn name(&self) -> &'static str {
        "ATR"
    }

    fn is_ready(&self) -> bool {
        self.value.is_some()
    }

    fn reset(&mut self) {
        self.prev_close = None;
        self.true_ranges.clear();
        self.value = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn ready_after_period_bars() {
        let mut atr = Atr::new(3).unwrap();
        for (i, (h, l, c)) in [
            (dec!(10), dec!(8), dec!(9)),
            (dec!(11), dec!(9), dec!(10)),
            (dec!(12), dec!(10), dec!(11)),
        ]
        .iter()
        .enumerate()
        {
            let out = atr.update(*h, *l, *c, i as i64).unwrap();
            if i < 2 {
                assert!(out.is_none());
            }
        }
        assert!(atr.is_ready());
    }

    #[test]
    fn rejects_low_greater_than_high() {
        let mut atr = Atr::new(3).unwrap();
        assert!(atr.update(dec!(5), dec!(10), dec!(7), 0).is_err());
    }
}
