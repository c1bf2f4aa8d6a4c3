use rust_decimal::Decimal;

use crate::error::{BotError, BotResult};

use super::{sma, stddev, Indicator};

/// Bollinger Bands(period, k): rolling mean and sample standard deviation
/// over the last `period` closes. `upper = mean + k*stddev`,
/// `lower = mean - k*stddev`, `width% = 100*(upper-lower)/mean`.
#[derive(Debug, Clone)]
pub struct BollingerBands {
    period: usize,
    std_dev_multiplier: Decimal,
    prices: Vec<Decimal>,
    upper: Option<Decimal>,
    middle: Option<Decimal>,
    lower: Option<Decimal>,
    width_percent: Option<Decimal>,
}

#[derive(Debug, Clone, Copy)]
pub struct BollingerOutput {
    pub upper: Decimal,
    pub middle: Decimal,
    pub lower: Decimal,
    pub width_percent: Decimal,
}

impl BollingerBands {
    pub fn new(period: usize, std_dev_multiplier: Decimal) -> BotResult<Self> {
        if period < 2 {
            return Err(BotError::InvalidConfig(
                "Bollinger Bands period must be >= 2".into(),
            ));
        }
        if std_dev_multiplier <= Decimal::ZERO {
            return Err(BotError::InvalidConfig(
                "Bollinger Bands stdDev multiplier must be > 0".into(),
            ));
        }
        Ok(Self {
            period,
            std_dev_multiplier,
            prices: Vec::with_capacity(period),
            upper: None,
            middle: None,
            lower: None,
            width_percent: None,
        })
    }

    pub fn update(&mut self, close: Decimal, _ts: i64) -> BotResult<Option<BollingerOutput>> {
        if close <= Decimal::ZERO {
            return Err(BotError::InvalidInput(format!(
                "Bollinger Bands update received non-positive close: {close}"
            )));
        }

        self.prices.push(close);
        if self.prices.len() > self.period {
            self.prices.remove(0);
        }

        if self.prices.len() < self.period {
            return Ok(None);
        }

        let middle = sma(&self.prices, self.period).expect("prices length == period");
        let std_dev = stddev(&self.prices, self.period).expect("prices length == period");

        let deviation = std_dev * self.std_dev_multiplier;
        let upper = middle + deviation;
        let lower = middle - deviation;

        self.upper = Some(upper);
        self.middle = Some(middle);
        self.lower = Some(lower);
        self.width_percent = if !middle.is_zero() {
            Some((upper - lower) / middle * Decimal::from(100))
        } else {
            None
        };

        Ok(self.width_percent.map(|width_percent| BollingerOutput {
            upper,
            middle,
            lower,
            width_percent,
        }))
    }

    pub fn upper(&self) -> Option<Decimal> {
        self.upper
    }

    pub fn middle(&self) -> Option<Decimal> {
        self.middle
    }

    pub fn lower(&self) -> Option<Decimal> {
        self.lower
    }

    pub fn width_percent(&self) -> Option<Decimal> {
        self.width_percent
    }
}

impl Indicator for BollingerBands {
    fn name(&self) -> &'static str {
        "BollingerBands"
    }

    fn is_ready(&self) -> bool {
        self.middle.is_some()
    }

    fn reset(&mut self) {
        self.prices.clear();
        self.upper = None;
        self.middle = None;
        self.lower = None;
        self.width_percent = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn ready_after_period_closes_with_ordered_bands() {
        let mut bb = BollingerBands::new(5, dec!(2)).unwrap();
        let mut out = None;
        for (i, p) in [10, 11, 9, 12, 8].iter().enumerate() {
            out = bb.update(Decimal::from(*p), i as i64).unwrap();
            if i < 4 {
                assert!(!bb.is_ready());
            }
        }
        assert!(bb.is_ready());
        let out = out.unwrap();
        assert!(out.upper >= out.middle && out.middle >= out.lower);
    }

    #[test]
    fn rejects_degenerate_config() {
        assert!(BollingerBands::new(1, dec!(2)).is_err());
        assert!(BollingerBands::new(20, Decimal::ZERO).is_err());
    }
}
