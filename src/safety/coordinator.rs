use std::sync::Arc;

use rust_decimal::Decimal;
use tracing::warn;

use crate::clock::Clock;
use crate::error::{BotError, BotResult};
use crate::exchange::OrderBookSnapshot;
use crate::types::Side;

use super::circuit::CircuitBreaker;
use super::config::SafetyConfig;
use super::daily_loss::DailyLossTracker;
use super::limiter::TokenBucketLimiter;
use super::liquidity;
use super::retry::execute_with_safety;

/// Gates every outbound order through circuit breaker -> daily-loss ceiling
/// -> position-size check -> liquidity check -> rate limiter. No lock is
/// ever held across another, so evaluation order is free to put the limiter
/// last: a rejection at any earlier stage never consumes a token.
pub struct SafetyCoordinator {
    config: SafetyConfig,
    circuit: CircuitBreaker,
    limiter: TokenBucketLimiter,
    daily_loss: DailyLossTracker,
}

impl SafetyCoordinator {
    pub fn new(config: SafetyConfig, clock: Arc<dyn Clock>) -> Self {
        let circuit = CircuitBreaker::new(
            config.circuit_breaker.max_failures,
            config.circuit_breaker.reset_timeout(),
            clock.clone(),
        );
        let limiter = TokenBucketLimiter::new(
            config.rate_limit.max_requests,
            config.rate_limit.interval(),
            clock.clone(),
        );
        let daily_loss = DailyLossTracker::new(config.position_limits.max_daily_loss_usd, clock);
        Self {
            config,
            circuit,
            limiter,
            daily_loss,
        }
    }

    pub async fn record_realized_pnl(&self, profit: Decimal) {
        self.daily_loss.record_trade(profit).await;
    }

    /// Pre-trade pipeline. Evaluated in order; any failure short-circuits.
    pub async fn check_trade_allowed(
        &self,
        side: Side,
        quantity: Decimal,
        price: Decimal,
        portfolio_value: Decimal,
        book: &OrderBookSnapshot,
    ) -> BotResult<()> {
        if !self.config.enabled {
            return Ok(());
        }

        self.circuit.check().await?;

        self.daily_loss.check().await?;

        let notional = quantity * price;
        let limits = &self.config.position_limits;
        if notional > limits.max_position_size_usd {
            return Err(BotError::PositionTooLarge {
                notional: notional.to_string(),
                max: limits.max_position_size_usd.to_string(),
            });
        }
        if !portfolio_value.is_zero() {
            let pct = notional / portfolio_value * Decimal::from(100);
            if pct > limits.max_portfolio_pct {
                return Err(BotError::PositionOverPortfolioPct {
                    pct: pct.to_string(),
                    max_pct: limits.max_portfolio_pct.to_string(),
                });
            }
        }

        liquidity::check(book, side, quantity, &self.config.liquidity)?;

        self.limiter.allow().await?;

        Ok(())
    }

    /// Executes `f` through the circuit breaker and the configured retry
    /// policy. Call only after `check_trade_allowed` has passed.
    pub async fn execute_with_safety<F, Fut, T>(&self, f: F) -> BotResult<T>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = BotResult<T>>,
    {
        let result = execute_with_safety(&self.circuit, &self.config.recovery, f).await;
        if let Err(ref e) = result {
            warn!(error = %e, "trade execution failed after retries");
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::test_support::FixedClock;
    use crate::exchange::OrderBookLevel;
    use crate::safety::config::{
        CircuitBreakerConfig, LiquidityConfig, PositionLimitsConfig, RateLimitConfig,
        RecoveryConfig, RetryStrategyKind,
    };
    use chrono::Utc;
    use rust_decimal_macros::dec;

    fn config() -> SafetyConfig {
        SafetyConfig {
            enabled: true,
            circuit_breaker: CircuitBreakerConfig {
                max_failures: 3,
                reset_timeout_ms: 2000,
            },
            rate_limit: RateLimitConfig {
                max_requests: 5,
                interval_ms: 1000,
            },
            liquidity: LiquidityConfig {
                min_depth: dec!(1),
                min_total_volume: dec!(2),
                max_spread_pct: dec!(1),
                min_volume_multiplier: dec!(0.5),
            },
            position_limits: PositionLimitsConfig {
                max_position_size_usd: dec!(10000),
                max_portfolio_pct: dec!(50),
                max_daily_loss_usd: dec!(500),
                max_total_positions: 3,
            },
            recovery: RecoveryConfig {
                strategy: RetryStrategyKind::Immediate,
                max_retries: 2,
                base_delay_ms: 0,
                max_delay_ms: 0,
            },
        }
    }

    fn book() -> OrderBookSnapshot {
        OrderBookSnapshot {
            symbol: "BTCUSDT".into(),
            bids: vec![OrderBookLevel { price: dec!(100), quantity: dec!(10) }],
            asks: vec![OrderBookLevel { price: dec!(100.1), quantity: dec!(10) }],
        }
    }

    #[tokio::test]
    async fn passes_when_all_checks_clear() {
        let clock = Arc::new(FixedClock::new(Utc::now()));
        let coordinator = SafetyCoordinator::new(config(), clock);
        let result = coordinator
            .check_trade_allowed(Side::Buy, dec!(1), dec!(100), dec!(50000), &book())
            .await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn rejects_position_over_max_size() {
        let clock = Arc::new(FixedClock::new(Utc::now()));
        let coordinator = SafetyCoordinator::new(config(), clock);
        let result = coordinator
            .check_trade_allowed(Side::Buy, dec!(200), dec!(100), dec!(50000), &book())
            .await;
        assert!(matches!(result, Err(BotError::PositionTooLarge { .. })));
    }
}
