use std::sync::Arc;

use rust_decimal::Decimal;
use tracing::info;

use crate::types::{IndicatorSnapshot, Ohlcv, Position, Timeframe, Trade};

/// Events emitted by the orchestrator as it moves through a tick. Named
/// `bot:*` to match the family of event names an operator would grep for in
/// logs.
#[derive(Debug, Clone)]
pub enum BotEvent {
    Started { strategy: String },
    Stopped,
    CandleClosed { timeframe: Timeframe, candle: Ohlcv },
    Indicator { snapshot: IndicatorSnapshot },
    Trade { trade: Trade },
    PositionOpened { position: Position },
    PositionClosed { position: Position, realized_pnl: Decimal },
    Status { message: String },
    Error { message: String },
}

/// Fan-out target for engine events. Implementations must not block the tick
/// loop; delivery is always through a detached task that is allowed to lag
/// or drop.
pub trait BotObserver: Send + Sync {
    fn on_event(&self, event: BotEvent);
}

/// Reference implementation: logs every event at a level matching its
/// severity. Used when no richer observer (metrics, alerting) is wired in.
pub struct TracingObserver;

impl BotObserver for TracingObserver {
    fn on_event(&self, event: BotEvent) {
        match event {
            BotEvent::Started { strategy } => info!(strategy, "bot:started"),
            BotEvent::Stopped => info!("bot:stopped"),
            BotEvent::CandleClosed { timeframe, candle } => {
                info!(%timeframe, close = %candle.close, "bot:candle")
            }
            BotEvent::Indicator { snapshot } => {
                info!(timeframe = %snapshot.timeframe, rsi = ?snapshot.rsi, "bot:indicator")
            }
            BotEvent::Trade { trade } => {
                info!(
                    symbol = %trade.symbol,
                    side = %trade.side,
                    qty = %trade.quantity,
                    price = %trade.price,
                    reason = %trade.signal_reason,
                    paper = trade.paper_trade,
                    "bot:trade"
                )
            }
            BotEvent::PositionOpened { position } => {
                info!(symbol = %position.symbol, qty = %position.quantity, "bot:position_opened")
            }
            BotEvent::PositionClosed { position, realized_pnl } => {
                info!(symbol = %position.symbol, %realized_pnl, "bot:position_closed")
            }
            BotEvent::Status { message } => info!(message, "bot:status"),
            BotEvent::Error { message } => tracing::error!(message, "bot:error"),
        }
    }
}

/// Spawns a detached task to deliver `event` to `observer`, so a slow or
/// stuck observer never stalls the tick loop.
pub fn emit(observer: Arc<dyn BotObserver>, event: BotEvent) {
    tokio::spawn(async move {
        observer.on_event(event);
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct CountingObserver(Arc<AtomicUsize>);

    impl BotObserver for CountingObserver {
        fn on_event(&self, _event: BotEvent) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn tracing_observer_handles_every_variant_without_panicking() {
        let observer = TracingObserver;
        observer.on_event(BotEvent::Started {
            strategy: "rsi".into(),
        });
        observer.on_event(BotEvent::Stopped);
        observer.on_event(BotEvent::Status {
            message: "daily bias BEARISH".into(),
        });
        observer.on_event(BotEvent::Error {
            message: "boom".into(),
        });
    }

    #[test]
    fn counting_observer_receives_dispatched_events() {
        let count = Arc::new(AtomicUsize::new(0));
        let observer = CountingObserver(count.clone());
        observer.on_event(BotEvent::Stopped);
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }
}
