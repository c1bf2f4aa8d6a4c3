pub mod kline;
pub mod ohlcv;
pub mod position;
pub mod signal;
pub mod snapshot;
pub mod trade;
pub mod trading;

pub use kline::*;
pub use ohlcv::*;
pub use position::*;
pub use signal::*;
pub use snapshot::*;
pub use trade::*;
pub use trading::*;
