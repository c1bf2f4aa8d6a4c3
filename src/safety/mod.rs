pub mod circuit;
pub mod config;
pub mod coordinator;
pub mod daily_loss;
pub mod limiter;
pub mod liquidity;
pub mod retry;

pub use circuit::CircuitBreaker;
pub use config::{
    CircuitBreakerConfig, LiquidityConfig, PositionLimitsConfig, RateLimitConfig, RecoveryConfig,
    RetryStrategyKind, SafetyConfig,
};
pub use coordinator::SafetyCoordinator;
pub use daily_loss::DailyLossTracker;
pub use limiter::TokenBucketLimiter;
