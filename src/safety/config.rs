use std::time::Duration;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Config durations are expressed in milliseconds on the wire (TOML/env) and
/// converted to `std::time::Duration` at the point of use.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CircuitBreakerConfig {
    pub max_failures: u32,
    pub reset_timeout_ms: u64,
}

impl CircuitBreakerConfig {
    pub fn reset_timeout(&self) -> Duration {
        Duration::from_millis(self.reset_timeout_ms)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RateLimitConfig {
    pub max_requests: i64,
    pub interval_ms: u64,
}

impl RateLimitConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LiquidityConfig {
    pub min_depth: Decimal,
    pub min_total_volume: Decimal,
    pub max_spread_pct: Decimal,
    pub min_volume_multiplier: Decimal,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PositionLimitsConfig {
    pub max_position_size_usd: Decimal,
    pub max_portfolio_pct: Decimal,
    pub max_daily_loss_usd: Decimal,
    pub max_total_positions: usize,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub enum RetryStrategyKind {
    Immediate,
    Linear,
    Exponential,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RecoveryConfig {
    pub strategy: RetryStrategyKind,
    pub max_retries: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl RecoveryConfig {
    pub fn base_delay(&self) -> Duration {
        Duration::from_millis(self.base_delay_ms)
    }

    pub fn max_delay(&self) -> Duration {
        Duration::from_millis(self.max_delay_ms)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SafetyConfig {
    pub enabled: bool,
    pub circuit_breaker: CircuitBreakerConfig,
    pub rate_limit: RateLimitConfig,
    pub liquidity: LiquidityConfig,
    pub position_limits: PositionLimitsConfig,
    pub recovery: RecoveryConfig,
}
