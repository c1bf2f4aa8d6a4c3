use rust_decimal::Decimal;

/// Percent-based trailing stop for one open position. Inactive until price
/// rises to `activation_price`; once active, `stop` only ratchets upward.
#[derive(Debug, Clone, Copy)]
pub struct TrailingStopTracker {
    entry: Decimal,
    highest: Decimal,
    activation_price: Decimal,
    trailing_distance_pct: Decimal,
    stop: Option<Decimal>,
    active: bool,
}

impl TrailingStopTracker {
    pub fn new(entry: Decimal, activation_pct: Decimal, trailing_distance_pct: Decimal) -> Self {
        let activation_price = entry * (Decimal::ONE + activation_pct / Decimal::from(100));
        Self {
            entry,
            highest: entry,
            activation_price,
            trailing_distance_pct,
            stop: None,
            active: false,
        }
    }

    /// Returns true once the trailing stop is triggered at this price.
    pub fn update(&mut self, price: Decimal) -> bool {
        if price > self.highest {
            self.highest = price;
        }

        if !self.active && price >= self.activation_price {
            self.active = true;
        }

        if self.active {
            let candidate = self.highest * (Decimal::ONE - self.trailing_distance_pct / Decimal::from(100));
            self.stop = Some(self.stop.map(|s| s.max(candidate)).unwrap_or(candidate));
        }

        match self.stop {
            Some(stop) if self.active => price <= stop,
            _ => false,
        }
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn stop(&self) -> Option<Decimal> {
        self.stop
    }

    pub fn entry(&self) -> Decimal {
        self.entry
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn activates_and_trails_per_boundary_example() {
        let mut tracker = TrailingStopTracker::new(dec!(100), dec!(4), dec!(2));

        assert!(!tracker.update(dec!(103)));
        assert!(!tracker.is_active());

        assert!(!tracker.update(dec!(104)));
        assert!(tracker.is_active());
        assert_eq!(tracker.stop(), Some(dec!(101.92)));

        assert!(tracker.update(dec!(101.92)));
    }

    #[test]
    fn stop_never_moves_down() {
        let mut tracker = TrailingStopTracker::new(dec!(100), dec!(4), dec!(2));
        tracker.update(dec!(110));
        let high_stop = tracker.stop().unwrap();
        tracker.update(dec!(105));
        assert_eq!(tracker.stop().unwrap(), high_stop);
    }
}
