use std::sync::Arc;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use tokio::sync::Mutex;
use tracing::info;

use crate::clock::Clock;
use crate::error::{BotError, BotResult};

struct State {
    realized_loss: Decimal,
    reset_date: NaiveDate,
}

/// Accumulates realized losses against a daily budget, resetting at the
/// next UTC midnight boundary observed during a check or record.
pub struct DailyLossTracker {
    state: Mutex<State>,
    max_daily_loss_usd: Decimal,
    clock: Arc<dyn Clock>,
}

impl DailyLossTracker {
    pub fn new(max_daily_loss_usd: Decimal, clock: Arc<dyn Clock>) -> Self {
        let today = clock.now().date_naive();
        Self {
            state: Mutex::new(State {
                realized_loss: Decimal::ZERO,
                reset_date: today,
            }),
            max_daily_loss_usd,
            clock,
        }
    }

    async fn roll_if_new_day(&self, state: &mut State) {
        let today = self.clock.now().date_naive();
        if today != state.reset_date {
            state.realized_loss = Decimal::ZERO;
            state.reset_date = today;
            info!("daily loss tracker reset for new UTC day");
        }
    }

    /// Only losses (negative `profit`) move the accumulator.
    pub async fn record_trade(&self, profit: Decimal) {
        let mut state = self.state.lock().await;
        self.roll_if_new_day(&mut state).await;
        if profit < Decimal::ZERO {
            state.realized_loss += profit.abs();
        }
    }

    pub async fn check(&self) -> BotResult<()> {
        let mut state = self.state.lock().await;
        self.roll_if_new_day(&mut state).await;
        if state.realized_loss >= self.max_daily_loss_usd {
            return Err(BotError::DailyLossLimit {
                realized: state.realized_loss.to_string(),
                limit: self.max_daily_loss_usd.to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::test_support::FixedClock;
    use chrono::{Duration, Utc};
    use rust_decimal_macros::dec;

    #[tokio::test]
    async fn fails_once_cumulative_loss_reaches_limit() {
        let clock = Arc::new(FixedClock::new(Utc::now()));
        let tracker = DailyLossTracker::new(dec!(100), clock.clone());

        tracker.record_trade(dec!(-60)).await;
        assert!(tracker.check().await.is_ok());

        tracker.record_trade(dec!(-50)).await;
        assert!(matches!(
            tracker.check().await,
            Err(BotError::DailyLossLimit { .. })
        ));
    }

    #[tokio::test]
    async fn resets_on_new_utc_day() {
        let start = Utc::now();
        let clock = Arc::new(FixedClock::new(start));
        let tracker = DailyLossTracker::new(dec!(100), clock.clone());

        tracker.record_trade(dec!(-150)).await;
        assert!(tracker.check().await.is_err());

        clock.advance(Duration::days(1));
        assert!(tracker.check().await.is_ok());
    }
}
