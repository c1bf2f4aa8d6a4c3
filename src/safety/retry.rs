use std::future::Future;
use std::time::Duration;

use tracing::warn;

use crate::error::BotResult;

use super::circuit::CircuitBreaker;
use super::config::{RecoveryConfig, RetryStrategyKind};

/// Computes the delay before attempt `attempt` (1-indexed) under the
/// configured policy.
fn delay_for(config: &RecoveryConfig, attempt: u32) -> Duration {
    match config.strategy {
        RetryStrategyKind::Immediate => Duration::ZERO,
        RetryStrategyKind::Linear => config.base_delay() * attempt,
        RetryStrategyKind::Exponential => {
            let scaled = config.base_delay().saturating_mul(2u32.saturating_pow(attempt.saturating_sub(1)));
            scaled.min(config.max_delay())
        }
    }
}

/// Routes `f` through the circuit breaker, then a bounded retry loop. Each
/// failed attempt advances the circuit's failure counter; a final failure
/// after `max_retries` is surfaced as-is.
pub async fn execute_with_safety<F, Fut, T>(
    circuit: &CircuitBreaker,
    config: &RecoveryConfig,
    mut f: F,
) -> BotResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = BotResult<T>>,
{
    circuit.check().await?;

    let mut attempt = 0u32;
    loop {
        attempt += 1;
        match f().await {
            Ok(value) => {
                circuit.record_success().await;
                return Ok(value);
            }
            Err(e) => {
                circuit.record_failure().await;
                let retryable = e.is_retryable();
                if !retryable || attempt > config.max_retries {
                    return Err(e);
                }
                let delay = delay_for(config, attempt);
                warn!(attempt, ?delay, error = %e, "retrying after failure");
                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::test_support::FixedClock;
    use crate::error::BotError;
    use chrono::Utc;
    use std::cell::Cell;
    use std::sync::Arc;

    #[tokio::test]
    async fn retries_transient_failures_until_success() {
        let clock = Arc::new(FixedClock::new(Utc::now()));
        let circuit = CircuitBreaker::new(10, Duration::from_secs(10), clock);
        let config = RecoveryConfig {
            strategy: RetryStrategyKind::Immediate,
            max_retries: 3,
            base_delay_ms: 0,
            max_delay_ms: 0,
        };

        let attempts = Cell::new(0);
        let result: BotResult<u32> = execute_with_safety(&circuit, &config, || {
            attempts.set(attempts.get() + 1);
            async move {
                if attempts.get() < 3 {
                    Err(BotError::ExchangeTemporary("timeout".into()))
                } else {
                    Ok(42)
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(attempts.get(), 3);
    }

    #[tokio::test]
    async fn never_retries_fatal_errors() {
        let clock = Arc::new(FixedClock::new(Utc::now()));
        let circuit = CircuitBreaker::new(10, Duration::from_secs(10), clock);
        let config = RecoveryConfig {
            strategy: RetryStrategyKind::Immediate,
            max_retries: 5,
            base_delay_ms: 0,
            max_delay_ms: 0,
        };

        let attempts = Cell::new(0);
        let result: BotResult<u32> = execute_with_safety(&circuit, &config, || {
            attempts.set(attempts.get() + 1);
            async move { Err(BotError::ExchangeFatal("rejected".into())) }
        })
        .await;

        assert!(result.is_err());
        assert_eq!(attempts.get(), 1);
    }
}
