use rust_decimal::Decimal;

use crate::error::{BotError, BotResult};

use super::Indicator;

/// Wilder-smoothed relative strength index.
///
/// The first `period` price differences prime the average gain/loss as a
/// simple mean; every update after that uses Wilder's recursive smoothing.
/// Ready once `period + 1` closes have been seen.
#[derive(Debug, Clone)]
pub struct Rsi {
    period: usize,
    avg_gain: Option<Decimal>,
    avg_loss: Option<Decimal>,
    prev_price: Option<Decimal>,
    gains: Vec<Decimal>,
    losses: Vec<Decimal>,
    value: Option<Decimal>,
    last_ts: Option<i64>,
}

impl Rsi {
    pub fn new(period: usize) -> BotResult<Self> {
        if period == 0 {
            return Err(BotError::InvalidConfig("RSI period must be > 0".into()));
        }
        Ok(Self {
            period,
            avg_gain: None,
            avg_loss: None,
            prev_price: None,
            gains: Vec::with_capacity(period),
            losses: Vec::with_capacity(period),
            value: None,
            last_ts: None,
        })
    }

    pub fn update(&mut self, close: Decimal, ts: i64) -> BotResult<()> {
        if close <= Decimal::ZERO {
            return Err(BotError::InvalidInput(format!(
                "RSI update received non-positive close: {close}"
            )));
        }

        if let Some(prev) = self.prev_price {
            let change = close - prev;
            let gain = if change > Decimal::ZERO { change } else { Decimal::ZERO };
            let loss = if change < Decimal::ZERO { change.abs() } else { Decimal::ZERO };

            if self.gains.len() < self.period {
                self.gains.push(gain);
                self.losses.push(loss);

                if self.gains.len() == self.period {
                    let sum_gain: Decimal = self.gains.iter().sum();
                    let sum_loss: Decimal = self.losses.iter().sum();
                    self.avg_gain = Some(sum_gain / Decimal::from(self.period as u32));
                    self.avg_loss = Some(sum_loss / Decimal::from(self.period as u32));
                    self.value = self.calculate();
                }
            } else if let (Some(avg_gain), Some(avg_loss)) = (self.avg_gain, self.avg_loss) {
                let period_dec = Decimal::from(self.period as u32);
                self.avg_gain = Some((avg_gain * (period_dec - Decimal::ONE) + gain) / period_dec);
                self.avg_loss = Some((avg_loss * (period_dec - Decimal::ONE) + loss) / period_dec);
                self.value = self.calculate();
            }
        }

        self.prev_price = Some(close);
        self.last_ts = Some(ts);
        Ok(())
    }

    fn calculate(&self) -> Option<Decimal> {
        match (self.avg_gain, self.avg_loss) {
            (Some(avg_gain), Some(avg_loss)) => {
                if avg_loss.is_zero() {
                    Some(Decimal::from(100))
                } else {
                    let rs = avg_gain / avg_loss;
                    Some(Decimal::from(100) - (Decimal::from(100) / (Decimal::ONE + rs)))
                }
            }
            _ => None,
        }
    }

    pub fn value(&self) -> Option<Decimal> {
        self.value
    }

    pub fn last_ts(&self) -> Option<i64> {
        self.last_ts
    }
}

impl Indicator for Rsi {
    fn name(&self) -> &'static str {
        "RSI"
    }

    fn is_ready(&self) -> bool {
        self.value.is_some()
    }

    fn reset(&mut self) {
        self.avg_gain = None;
        self.avg_loss = None;
        self.prev_price = None;
        self.gains.clear();
        self.losses.clear();
        self.value = None;
        self.last_ts = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn not_ready_until_period_plus_one_closes() {
        let mut rsi = Rsi::new(14).unwrap();
        for i in 0..14 {
            rsi.update(dec!(100) - Decimal::from(i), i as i64).unwrap();
            assert!(!rsi.is_ready());
        }
        rsi.update(dec!(85), 14).unwrap();
        assert!(rsi.is_ready());
    }

    #[test]
    fn monotone_decline_drives_rsi_toward_zero() {
        let mut rsi = Rsi::new(14).unwrap();
        let mut price = dec!(100);
        for i in 0..16 {
            rsi.update(price, i as i64).unwrap();
            price -= Decimal::ONE;
        }
        let v = rsi.value().unwrap();
        assert!(v >= Decimal::ZERO && v <= Decimal::from(100));
        assert!(v < dec!(30));
    }

    #[test]
    fn rejects_non_positive_close() {
        let mut rsi = Rsi::new(14).unwrap();
        assert!(rsi.update(Decimal::ZERO, 0).is_err());
        assert!(rsi.update(dec!(-5), 0).is_err());
    }
}
