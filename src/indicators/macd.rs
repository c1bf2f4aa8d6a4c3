use rust_decimal::Decimal;

use crate::error::{BotError, BotResult};

use super::{ema::Ema, Indicator};

/// MACD(fast, slow, signal): `macd = EMA_fast - EMA_slow`, then
/// `signal = EMA_signal(macd)`, `histogram = macd - signal`. Ready once both
/// EMAs and the signal EMA are primed (approximately `slow + signal - 1`
/// closes).
#[derive(Debug, Clone)]
pub struct Macd {
    fast_ema: Ema,
    slow_ema: Ema,
    signal_ema: Ema,
    macd_line: Option<Decimal>,
    signal_line: Option<Decimal>,
    histogram: Option<Decimal>,
}

#[derive(Debug, Clone, Copy)]
pub struct MacdOutput {
    pub macd_line: Decimal,
    pub signal_line: Decimal,
    pub histogram: Decimal,
}

impl Macd {
    pub fn new(fast_period: usize, slow_period: usize, signal_period: usize) -> BotResult<Self> {
        if slow_period <= fast_period {
            return Err(BotError::InvalidConfig(
                "MACD slow period must be greater than fast period".into(),
            ));
        }
        if fast_period == 0 || signal_period == 0 {
            return Err(BotError::InvalidConfig(
                "MACD periods must be > 0".into(),
            ));
        }
        Ok(Self {
            fast_ema: Ema::new(fast_period),
            slow_ema: Ema::new(slow_period),
            signal_ema: Ema::new(signal_period),
            macd_line: None,
            signal_line: None,
            histogram: None,
        })
    }

    pub fn update(&mut self, close: Decimal, _ts: i64) -> BotResult<Option<MacdOutput>> {
        if close <= Decimal::ZERO {
            return Err(BotError::InvalidInput(format!(
                "MACD update received non-positive close: {close}"
            )));
        }

        let fast = self.fast_ema.update(close);
        let slow = self.slow_ema.update(close);

        if let (Some(f), Some(s)) = (fast, slow) {
            let macd_line = f - s;
            self.macd_line = Some(macd_line);

            if let Some(signal) = self.signal_ema.update(macd_line) {
                let histogram = macd_line - signal;
                self.signal_line = Some(signal);
                self.histogram = Some(histogram);

                return Ok(Some(MacdOutput {
                    macd_line,
                    signal_line: signal,
                    histogram,
                }));
            }
        }

        Ok(None)
    }

    pub fn macd_line(&self) -> Option<Decimal> {
        self.macd_line
    }

    pub fn signal_line(&self) -> Option<Decimal> {
        self.signal_line
    }

    pub fn histogram(&self) -> Option<Decimal> {
        self.histogram
    }
}

impl Indicator for Macd {
    fn name(&self) -> &'static str {
        "MACD"
    }

    fn is_ready(&self) -> bool {
        self.histogram.is_some()
    }

    fn reset(&mut self) {
        self.fast_ema.reset();
        self.slow_ema.reset();
        self.signal_ema.reset();
        self.macd_line = None;
        self.signal_line = None;
        self.histogram = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn rejects_slow_not_greater_than_fast() {
        assert!(Macd::new(12, 12, 9).is_err());
        assert!(Macd::new(26, 12, 9).is_err());
    }

    #[test]
    fn histogram_sign_matches_macd_minus_signal() {
        let mut macd = Macd::new(3, 6, 2).unwrap();
        let mut price = dec!(100);
        let mut last = None;
        for i in 0..20 {
            last = macd.update(price, i).unwrap();
            price += dec!(1);
        }
        let out = last.unwrap();
        let sign = (out.macd_line - out.signal_line).signum();
        assert_eq!(sign, out.histogram.signum());
    }
}
