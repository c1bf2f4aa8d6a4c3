use std::sync::Arc;
use std::time::Duration;

use chrono::DateTime;
use chrono::Utc;
use tokio::sync::Mutex;

use crate::clock::Clock;
use crate::error::{BotError, BotResult};

struct State {
    tokens: i64,
    last_refill: DateTime<Utc>,
}

/// Token bucket with continuous refill: `tokens += floor(elapsed/interval *
/// capacity)`, capped at `capacity`. Non-blocking: `allow()` returns
/// immediately rather than sleeping for a token.
pub struct TokenBucketLimiter {
    state: Mutex<State>,
    capacity: i64,
    interval: Duration,
    clock: Arc<dyn Clock>,
}

impl TokenBucketLimiter {
    pub fn new(capacity: i64, interval: Duration, clock: Arc<dyn Clock>) -> Self {
        let now = clock.now();
        Self {
            state: Mutex::new(State {
                tokens: capacity,
                last_refill: now,
            }),
            capacity,
            interval,
            clock,
        }
    }

    pub async fn allow(&self) -> BotResult<()> {
        let mut state = self.state.lock().await;
        let now = self.clock.now();
        let elapsed_ms = (now - state.last_refill).num_milliseconds().max(0);
        let interval_ms = self.interval.as_millis().max(1) as i64;

        let intervals_elapsed = elapsed_ms / interval_ms;
        if intervals_elapsed > 0 {
            let refill = intervals_elapsed * self.capacity;
            state.tokens = (state.tokens + refill).min(self.capacity);
            state.last_refill = state.last_refill + chrono::Duration::milliseconds(intervals_elapsed * interval_ms);
        }

        if state.tokens >= 1 {
            state.tokens -= 1;
            Ok(())
        } else {
            Err(BotError::RateLimited)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::test_support::FixedClock;
    use chrono::Duration as ChronoDuration;

    #[tokio::test]
    async fn exhausts_capacity_then_refills_after_interval() {
        let clock = Arc::new(FixedClock::new(Utc::now()));
        let limiter = TokenBucketLimiter::new(2, Duration::from_secs(1), clock.clone());

        assert!(limiter.allow().await.is_ok());
        assert!(limiter.allow().await.is_ok());
        assert!(matches!(limiter.allow().await, Err(BotError::RateLimited)));

        clock.advance(ChronoDuration::milliseconds(1100));
        assert!(limiter.allow().await.is_ok());
    }
}
