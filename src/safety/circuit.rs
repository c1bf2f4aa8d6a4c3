use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::clock::Clock;
use crate::error::{BotError, BotResult};

#[derive(Debug, Clone, Copy)]
enum State {
    Closed { consecutive_failures: u32 },
    Open { opened_at: DateTime<Utc> },
    HalfOpen,
}

/// Three-state circuit breaker: Closed tallies consecutive failures; at
/// `max_failures` it trips Open for `reset_timeout`; the next call after the
/// timeout gets exactly one HalfOpen trial, which closes the circuit on
/// success or reopens it (with a fresh timer) on failure.
pub struct CircuitBreaker {
    state: Mutex<State>,
    max_failures: u32,
    reset_timeout: Duration,
    clock: Arc<dyn Clock>,
}

impl CircuitBreaker {
    pub fn new(max_failures: u32, reset_timeout: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            state: Mutex::new(State::Closed {
                consecutive_failures: 0,
            }),
            max_failures,
            reset_timeout,
            clock,
        }
    }

    /// Call before attempting the guarded operation. Does not mutate state
    /// except the Open→HalfOpen transition once the timeout has elapsed.
    pub async fn check(&self) -> BotResult<()> {
        let mut state = self.state.lock().await;
        match *state {
            State::Closed { .. } => Ok(()),
            State::HalfOpen => Ok(()),
            State::Open { opened_at } => {
                let elapsed = self.clock.now() - opened_at;
                let elapsed_ms = elapsed.num_milliseconds().max(0) as u128;
                if elapsed_ms >= self.reset_timeout.as_millis() {
                    *state = State::HalfOpen;
                    info!("circuit breaker transitioning to half-open");
                    Ok(())
                } else {
                    let retry_after_ms = self.reset_timeout.as_millis() as i64 - elapsed.num_milliseconds();
                    Err(BotError::CircuitOpen {
                        retry_after_ms: retry_after_ms.max(0),
                    })
                }
            }
        }
    }

    pub async fn record_success(&self) {
        let mut state = self.state.lock().await;
        *state = State::Closed {
            consecutive_failures: 0,
        };
    }

    pub async fn record_failure(&self) {
        let mut state = self.state.lock().await;
        *state = match *state {
            State::HalfOpen => {
                warn!("half-open trial failed, circuit re-opening");
                State::Open {
                    opened_at: self.clock.now(),
                }
            }
            State::Closed { consecutive_failures } => {
                let failures = consecutive_failures + 1;
                if failures >= self.max_failures {
                    warn!(failures, "circuit breaker tripping open");
                    State::Open {
                        opened_at: self.clock.now(),
                    }
                } else {
                    State::Closed {
                        consecutive_failures: failures,
                    }
                }
            }
            open @ State::Open { .. } => open,
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::test_support::FixedClock;
    use chrono::Duration as ChronoDuration;

    #[tokio::test]
    async fn trips_open_after_max_failures_and_half_opens_after_timeout() {
        let clock = Arc::new(FixedClock::new(Utc::now()));
        let breaker = CircuitBreaker::new(3, Duration::from_secs(2), clock.clone());

        for _ in 0..3 {
            breaker.check().await.unwrap();
            breaker.record_failure().await;
        }

        assert!(matches!(
            breaker.check().await,
            Err(BotError::CircuitOpen { .. })
        ));

        clock.advance(ChronoDuration::milliseconds(2100));
        assert!(breaker.check().await.is_ok());

        breaker.record_success().await;
        assert!(breaker.check().await.is_ok());
    }
}
