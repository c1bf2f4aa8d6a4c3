use thiserror::Error;

/// The closed set of error kinds produced anywhere in the signal engine.
///
/// Every fallible operation in this crate returns `Result<T, BotError>` (or a
/// narrower alias below). Kinds are never re-logged on the way up the stack;
/// the call site that first observes the condition logs it.
#[derive(Error, Debug)]
pub enum BotError {
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("not ready: {0}")]
    NotReady(String),

    #[error("position already open for {symbol}")]
    PositionAlreadyOpen { symbol: String },

    #[error("position {id} is not open")]
    NotOpen { id: i64 },

    #[error("circuit breaker open, retry after {retry_after_ms}ms")]
    CircuitOpen { retry_after_ms: i64 },

    #[error("rate limited")]
    RateLimited,

    #[error("daily loss limit reached: {realized} >= {limit}")]
    DailyLossLimit { realized: String, limit: String },

    #[error("position too large: {notional} > {max}")]
    PositionTooLarge { notional: String, max: String },

    #[error("position exceeds portfolio percent: {pct}% > {max_pct}%")]
    PositionOverPortfolioPct { pct: String, max_pct: String },

    #[error("insufficient liquidity: {0}")]
    InsufficientLiquidity(String),

    #[error("exchange temporary failure: {0}")]
    ExchangeTemporary(String),

    #[error("exchange fatal failure: {0}")]
    ExchangeFatal(String),

    #[error("storage failure: {0}")]
    StorageFailure(#[from] sqlx::Error),

    #[error("cancelled")]
    Cancelled,
}

pub type BotResult<T> = Result<T, BotError>;

impl BotError {
    /// Whether this kind is safe to retry inside `executeWithSafety`.
    pub fn is_retryable(&self) -> bool {
        matches!(self, BotError::ExchangeTemporary(_))
    }
}
