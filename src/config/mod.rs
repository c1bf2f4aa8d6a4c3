pub mod loader;
pub mod runtime;

pub use loader::{load_exchange_config, load_runtime_config};
pub use runtime::{
    ExchangeConfig, InstrumentConfig, MultiTimeframeParams, RuntimeConfig, StrategySelection,
};
