pub mod config;
pub mod sizer;
pub mod trailing;

pub use config::RiskConfig;
pub use sizer::{RiskSizer, SizingResult};
pub use trailing::TrailingStopTracker;
