use rust_decimal::Decimal;

use super::Indicator;

/// SMA-seeded exponential moving average. Seeds with the simple mean of the
/// first `period` closes, then applies `ema = alpha*price + (1-alpha)*ema`
/// with `alpha = 2/(period+1)`.
#[derive(Debug, Clone)]
pub struct Ema {
    period: usize,
    multiplier: Decimal,
    value: Option<Decimal>,
    count: usize,
    sum: Decimal,
}

impl Ema {
    pub fn new(period: usize) -> Self {
        let multiplier = Decimal::from(2) / Decimal::from(period as u32 + 1);
        Self {
            period,
            multiplier,
            value: None,
            count: 0,
            sum: Decimal::ZERO,
        }
    }

    pub fn update(&mut self, price: Decimal) -> Option<Decimal> {
        self.count += 1;

        if self.count < self.period {
            self.sum += price;
            return None;
        } else if self.count == self.period {
            self.sum += price;
            self.value = Some(self.sum / Decimal::from(self.period as u32));
            return self.value;
        }

        if let Some(prev_ema) = self.value {
            self.value = Some((price - prev_ema) * self.multiplier + prev_ema);
        }

        self.value
    }

    pub fn value(&self) -> Option<Decimal> {
        self.value
    }

    pub fn period(&self) -> usize {
        self.period
    }
}

impl Indicator for Ema {
    fn name(&self) -> &'static str {
        "EMA"
    }

    fn is_ready(&self) -> bool {
        self.value.is_some()
    }

    fn reset(&mut self) {
        self.value = None;
        self.count = 0;
        self.sum = Decimal::ZERO;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn seeds_with_sma_then_smooths() {
        let mut ema = Ema::new(3);
        assert!(ema.update(dec!(1)).is_none());
        assert!(ema.update(dec!(2)).is_none());
        assert_eq!(ema.update(dec!(3)).unwrap(), dec!(2));
        let next = ema.update(dec!(6));
        assert!(next.unwrap() > dec!(2));
    }
}
