use std::collections::HashMap;
use std::sync::Arc;

use rust_decimal::Decimal;
use tokio_util::sync::CancellationToken;
use tracing::{error, warn};

use crate::clock::Clock;
use crate::config::{ExchangeConfig, InstrumentConfig, RuntimeConfig, StrategySelection};
use crate::error::{BotError, BotResult};
use crate::exchange::{
    BinanceExchangeAdapter, BinanceTickSource, ExchangeAdapter, PaperExchangeAdapter,
};
use crate::indicators::Atr;
use crate::ledger::Ledger;
use crate::observer::{emit, BotEvent, BotObserver};
use crate::risk::RiskSizer;
use crate::safety::SafetyCoordinator;
use crate::strategies::{build_strategy, Strategy, StrategyCapability, StrategyConfig, StrategyContext};
use crate::timeframe::MultiTimeframeManager;
use crate::types::{KlineEvent, Ohlcv, Position, Side, Signal, SignalAction, Timeframe, Trade};

/// The bucket width of the primary tick stream the orchestrator subscribes
/// to. Strategies that want coarser confirmation (daily/hourly bias) read it
/// through their own `MultiTimeframeManager` registrations instead.
const PRIMARY_TIMEFRAME: Timeframe = Timeframe::M5;

/// Conventional Wilder period for the orchestrator's own ATR kernel. Not on
/// the configuration surface -- `RiskConfig` only exposes the stop
/// multiplier, not the averaging window, so this follows the period every
/// other ATR-consuming strategy in this crate defaults to.
const ATR_PERIOD: usize = 14;

/// Owns the tick loop, every stateful component a running bot needs, and the
/// single in-memory mirror of the one open position this instrument may
/// hold. Construction does all the fallible setup (ledger recovery, strategy
/// validation); `run` never fails except by propagating a fatal error or
/// unwinding cleanly on cancellation.
pub struct Orchestrator {
    symbol: String,
    instrument: InstrumentConfig,
    trading_enabled: bool,
    portfolio_value: Decimal,
    strategy: Strategy,
    mtf: Option<MultiTimeframeManager>,
    atr: Option<Atr>,
    risk: RiskSizer,
    safety: SafetyCoordinator,
    ledger: Ledger,
    exchange: Arc<dyn ExchangeAdapter>,
    observer: Arc<dyn BotObserver>,
    position: Option<Position>,
    clock: Arc<dyn Clock>,
}

impl Orchestrator {
    /// Opens the ledger, hydrates any open position for `config`'s symbol,
    /// and builds every downstream component from configuration. Fails with
    /// `InvalidConfig`/`StorageFailure` rather than partially starting.
    pub async fn build(
        config: RuntimeConfig,
        exchange_config: Option<ExchangeConfig>,
        observer: Arc<dyn BotObserver>,
        clock: Arc<dyn Clock>,
    ) -> BotResult<Self> {
        let ledger = Ledger::open(&config.ledger_path).await?;
        let position = ledger.find_open_position(&config.instrument.symbol).await?;

        let mtf = match &config.strategy {
            StrategySelection::Multitimeframe(params) => Some(MultiTimeframeManager::new(
                params.manager_registrations(),
                config.max_candles,
            )?),
            _ => None,
        };

        let strategy_config = match config.strategy.clone() {
            StrategySelection::Rsi(c) => StrategyConfig::Rsi(c),
            StrategySelection::Macd(c) => StrategyConfig::Macd(c),
            StrategySelection::Bbands(c) => StrategyConfig::Bbands(c),
            StrategySelection::Dca(c) => StrategyConfig::Dca(c),
            StrategySelection::Multitimeframe(p) => StrategyConfig::MultiTimeframe(p.thresholds()),
        };
        let strategy = build_strategy(strategy_config, clock.clone())?;

        let atr = if config.risk.use_atr_stop {
            Some(Atr::new(ATR_PERIOD)?)
        } else {
            None
        };

        let risk = RiskSizer::new(config.risk.clone())?;
        let safety = SafetyCoordinator::new(config.safety.clone(), clock.clone());

        let exchange: Arc<dyn ExchangeAdapter> = if config.trading_enabled {
            let creds = exchange_config.ok_or_else(|| {
                BotError::InvalidConfig("tradingEnabled requires exchange credentials".into())
            })?;
            Arc::new(BinanceExchangeAdapter::new(
                creds.api_key,
                creds.api_secret,
                creds.base_url,
            ))
        } else {
            let seed_price = position.as_ref().map(|p| p.entry_price).unwrap_or(Decimal::ZERO);
            Arc::new(PaperExchangeAdapter::new(seed_price))
        };

        Ok(Self {
            symbol: config.instrument.symbol.clone(),
            instrument: config.instrument,
            trading_enabled: config.trading_enabled,
            portfolio_value: config.portfolio_value,
            strategy,
            mtf,
            atr,
            risk,
            safety,
            ledger,
            exchange,
            observer,
            position,
            clock,
        })
    }

    /// Runs the tick loop until `cancel` fires. Every write the loop performs
    /// (ledger insert, position open/close) completes before the matching
    /// observer event is emitted.
    pub async fn run(mut self, cancel: CancellationToken) -> BotResult<()> {
        let tick_source = BinanceTickSource::new(self.symbol.clone(), PRIMARY_TIMEFRAME);
        let mut ticks = tick_source.connect();

        emit(
            self.observer.clone(),
            BotEvent::Started { strategy: self.strategy.name().to_string() },
        );

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                maybe_event = ticks.recv() => {
                    match maybe_event {
                        Some(event) => {
                            if let Err(e) = self.handle_tick(event).await {
                                match e {
                                    BotError::Cancelled => break,
                                    BotError::ExchangeFatal(_) | BotError::StorageFailure(_) => {
                                        error!(error = %e, "fatal error in tick loop");
                                        emit(self.observer.clone(), BotEvent::Error { message: e.to_string() });
                                        return Err(e);
                                    }
                                    _ => {
                                        warn!(error = %e, "tick handling error");
                                        emit(self.observer.clone(), BotEvent::Error { message: e.to_string() });
                                    }
                                }
                            }
                        }
                        None => {
                            warn!("tick source closed");
                            break;
                        }
                    }
                }
            }
        }

        drop(ticks);
        emit(self.observer.clone(), BotEvent::Stopped);
        Ok(())
    }

    async fn handle_tick(&mut self, event: KlineEvent) -> BotResult<()> {
        if event.symbol != self.symbol {
            return Ok(());
        }

        let close_time_secs = event.close_time / 1000;

        if let Some(mtf) = &self.mtf {
            mtf.update(event.close, event.volume, close_time_secs).await?;
        } else if event.is_closed {
            self.strategy.update(event.close, event.volume, close_time_secs);
        }

        if let Some(atr) = &mut self.atr {
            if let Err(e) = atr.update(event.high, event.low, event.close, close_time_secs) {
                warn!(error = %e, "ATR update rejected");
            }
        }

        self.exchange.on_price_update(event.close).await;

        if event.is_closed {
            emit(
                self.observer.clone(),
                BotEvent::CandleClosed {
                    timeframe: PRIMARY_TIMEFRAME,
                    candle: Ohlcv {
                        bucket_start: PRIMARY_TIMEFRAME.bucket_start(close_time_secs),
                        open: event.open,
                        high: event.high,
                        low: event.low,
                        close: event.close,
                        volume: event.volume,
                    },
                },
            );
        }

        let ready = match &self.mtf {
            Some(mtf) => mtf.is_ready().await,
            None => self.strategy.is_ready(),
        };
        if !ready {
            return Ok(());
        }

        let snapshots = match &self.mtf {
            Some(mtf) => mtf.snapshot_all().await,
            None => HashMap::new(),
        };
        for snapshot in snapshots.values() {
            emit(self.observer.clone(), BotEvent::Indicator { snapshot: *snapshot });
        }

        let signal = {
            let ctx = StrategyContext {
                current_price: event.close,
                position: self.position.as_ref(),
                snapshots: &snapshots,
                now: self.clock.now(),
            };
            self.strategy.generate_signal(&ctx)
        };

        match signal.action {
            SignalAction::Buy if self.position.is_none() => self.handle_buy(&event, &signal).await,
            SignalAction::Sell if self.position.is_some() => self.handle_sell(&event, &signal).await,
            SignalAction::None => {
                if !signal.reason.is_empty() {
                    emit(self.observer.clone(), BotEvent::Status { message: signal.reason });
                }
                Ok(())
            }
            _ => Ok(()),
        }
    }

    fn resolve_buy_quantity(&self, signal: &Signal, price: Decimal) -> BotResult<Decimal> {
        if let Some(q) = signal.suggested_quantity {
            return Ok(q);
        }
        if let Some(q) = self.instrument.quantity {
            return Ok(q);
        }
        if let Some(quote) = self.instrument.quote_amount {
            return Ok(quote / price);
        }
        let atr_value = self.atr.as_ref().and_then(|a| a.value());
        Ok(self.risk.calculate(self.portfolio_value, price, atr_value)?.quantity)
    }

    async fn handle_buy(&mut self, event: &KlineEvent, signal: &Signal) -> BotResult<()> {
        let quantity = self.resolve_buy_quantity(signal, event.close)?;
        if quantity <= Decimal::ZERO {
            emit(
                self.observer.clone(),
                BotEvent::Status {
                    message: format!("sized quantity non-positive, buy skipped: {}", signal.reason),
                },
            );
            return Ok(());
        }

        let book = self.exchange.order_book(&self.symbol, 10).await?;
        if let Err(e) = self
            .safety
            .check_trade_allowed(Side::Buy, quantity, event.close, self.portfolio_value, &book)
            .await
        {
            emit(self.observer.clone(), BotEvent::Status { message: format!("buy rejected: {e}") });
            return Ok(());
        }

        let exchange = self.exchange.clone();
        let symbol = self.symbol.clone();
        let fill = self
            .safety
            .execute_with_safety(move || {
                let exchange = exchange.clone();
                let symbol = symbol.clone();
                async move { exchange.place_market_order(&symbol, Side::Buy, quantity).await }
            })
            .await?;

        let trade = Trade::new(
            &self.symbol,
            Side::Buy,
            fill.filled_quantity,
            fill.filled_price,
            self.strategy.name(),
            &signal.reason,
            "{}",
            !self.trading_enabled,
            fill.ts,
            None,
        );
        let trade_id = self.ledger.insert_trade(&trade).await?;
        let mut trade = trade;
        trade.id = trade_id;

        let mut position = Position::open(
            &self.symbol,
            fill.filled_quantity,
            fill.filled_price,
            fill.ts,
            self.strategy.name(),
            trade_id,
        );
        position.id = self.ledger.open_position(&position).await?;

        emit(self.observer.clone(), BotEvent::Trade { trade });
        emit(self.observer.clone(), BotEvent::PositionOpened { position: position.clone() });

        self.position = Some(position);
        Ok(())
    }

    async fn handle_sell(&mut self, event: &KlineEvent, signal: &Signal) -> BotResult<()> {
        let position = self.position.clone().expect("Sell arm only reached when a position is open");
        let quantity = position.quantity;

        let book = self.exchange.order_book(&self.symbol, 10).await?;
        if let Err(e) = self
            .safety
            .check_trade_allowed(Side::Sell, quantity, event.close, self.portfolio_value, &book)
            .await
        {
            emit(self.observer.clone(), BotEvent::Status { message: format!("sell rejected: {e}") });
            return Ok(());
        }

        let exchange = self.exchange.clone();
        let symbol = self.symbol.clone();
        let fill = self
            .safety
            .execute_with_safety(move || {
                let exchange = exchange.clone();
                let symbol = symbol.clone();
                async move { exchange.place_market_order(&symbol, Side::Sell, quantity).await }
            })
            .await?;

        let profit_loss = (fill.filled_price - position.entry_price) * fill.filled_quantity;
        let profit_loss_percent = if position.entry_price.is_zero() {
            Decimal::ZERO
        } else {
            (fill.filled_price - position.entry_price) / position.entry_price * Decimal::from(100)
        };

        let trade = Trade::new(
            &self.symbol,
            Side::Sell,
            fill.filled_quantity,
            fill.filled_price,
            self.strategy.name(),
            &signal.reason,
            "{}",
            !self.trading_enabled,
            fill.ts,
            None,
        )
        .with_realized_pnl(profit_loss, profit_loss_percent, position.buy_trade_id);
        let trade_id = self.ledger.insert_trade(&trade).await?;
        let mut trade = trade;
        trade.id = trade_id;

        self.ledger
            .close_position(position.id, fill.filled_price, fill.ts, profit_loss, profit_loss_percent, trade_id)
            .await?;

        self.safety.record_realized_pnl(profit_loss).await;

        emit(self.observer.clone(), BotEvent::Trade { trade });
        emit(
            self.observer.clone(),
            BotEvent::PositionClosed { position, realized_pnl: profit_loss },
        );

        self.position = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{InstrumentConfig, MultiTimeframeParams, RuntimeConfig, StrategySelection};
    use crate::risk::RiskConfig;
    use crate::safety::{
        CircuitBreakerConfig, LiquidityConfig, PositionLimitsConfig, RateLimitConfig,
        RecoveryConfig, RetryStrategyKind, SafetyConfig,
    };
    use crate::strategies::RsiConfig;
    use rust_decimal_macros::dec;

    struct NullObserver;
    impl BotObserver for NullObserver {
        fn on_event(&self, _event: BotEvent) {}
    }

    fn rsi_config() -> RuntimeConfig {
        RuntimeConfig {
            instrument: InstrumentConfig {
                symbol: "BTCUSDT".into(),
                quantity: Some(dec!(0.01)),
                quote_amount: None,
            },
            trading_enabled: false,
            strategy: StrategySelection::Rsi(RsiConfig {
                period: 3,
                overbought: dec!(60),
                oversold: dec!(40),
            }),
            risk: RiskConfig {
                max_position_size_pct: dec!(25),
                risk_per_trade_pct: dec!(1),
                stop_loss_pct: Some(dec!(3)),
                use_atr_stop: false,
                atr_multiplier: None,
                take_profit_pct: Some(dec!(6)),
                use_rr_ratio: false,
                rr_ratio: None,
                use_trailing_stop: false,
                trailing_activation_pct: dec!(4),
                trailing_distance_pct: dec!(2),
                max_open_positions: 1,
                max_portfolio_risk_pct: dec!(10),
            },
            safety: SafetyConfig {
                enabled: false,
                circuit_breaker: CircuitBreakerConfig { max_failures: 5, reset_timeout_ms: 30_000 },
                rate_limit: RateLimitConfig { max_requests: 10, interval_ms: 1_000 },
                liquidity: LiquidityConfig {
                    min_depth: dec!(1),
                    min_total_volume: dec!(10),
                    max_spread_pct: dec!(1),
                    min_volume_multiplier: dec!(2),
                },
                position_limits: PositionLimitsConfig {
                    max_position_size_usd: dec!(100_000),
                    max_portfolio_pct: dec!(100),
                    max_daily_loss_usd: dec!(10_000),
                    max_total_positions: 3,
                },
                recovery: RecoveryConfig {
                    strategy: RetryStrategyKind::Immediate,
                    max_retries: 1,
                    base_delay_ms: 0,
                    max_delay_ms: 0,
                },
            },
            log_level: "info".into(),
            ledger_path: "sqlite::memory:".into(),
            portfolio_value: dec!(10_000),
            max_candles: 200,
        }
    }

    fn tick(close: Decimal, minute: i64) -> KlineEvent {
        let close_time = (minute + 1) * 60_000;
        KlineEvent::new(
            "BTCUSDT",
            minute * 60_000,
            close_time,
            close,
            close,
            close,
            close,
            dec!(1),
            true,
        )
    }

    async fn build(config: RuntimeConfig) -> Orchestrator {
        Orchestrator::build(
            config,
            None,
            Arc::new(NullObserver),
            Arc::new(crate::clock::SystemClock),
        )
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn oversold_entry_then_overbought_exit_records_ledger_rows() {
        let mut orch = build(rsi_config()).await;

        let mut price = dec!(100);
        for i in 0..10 {
            orch.handle_tick(tick(price, i)).await.unwrap();
            price -= dec!(3);
        }
        assert!(orch.position.is_some(), "expected a position to open on oversold RSI");

        let mut price = price;
        for i in 10..20 {
            orch.handle_tick(tick(price, i)).await.unwrap();
            price += dec!(3);
        }
        assert!(orch.position.is_none(), "expected the position to close on overbought RSI");

        let summary = orch.ledger.summary().await.unwrap();
        assert_eq!(summary.buy_count, 1);
        assert_eq!(summary.sell_count, 1);
    }

    #[tokio::test]
    async fn restart_recovers_open_position_from_ledger() {
        let db_path = format!("/tmp/signal_engine_orchestrator_test_{}.db", std::process::id());
        let _ = std::fs::remove_file(&db_path);
        let mut config = rsi_config();
        config.ledger_path = db_path.clone();

        let mut orch = build(config.clone()).await;
        let mut price = dec!(100);
        for i in 0..10 {
            orch.handle_tick(tick(price, i)).await.unwrap();
            price -= dec!(3);
        }
        let opened = orch.position.clone().unwrap();
        drop(orch);

        let restarted = build(config).await;
        let recovered = restarted.position.clone().unwrap();
        assert_eq!(recovered.quantity, opened.quantity);
        assert_eq!(recovered.entry_price, opened.entry_price);
        assert_eq!(recovered.buy_trade_id, opened.buy_trade_id);

        let _ = std::fs::remove_file(&db_path);
    }

    #[tokio::test]
    async fn multitimeframe_strategy_builds_a_manager() {
        let mut config = rsi_config();
        config.strategy = StrategySelection::Multitimeframe(MultiTimeframeParams {
            rsi_period: 14,
            macd_fast: 12,
            macd_slow: 26,
            macd_signal: 9,
            bb_period: 20,
            bb_std_dev: dec!(2),
            rsi_oversold: dec!(30),
            rsi_overbought: dec!(70),
            rsi_neutral_low: dec!(45),
            rsi_neutral_high: dec!(55),
            macd_min_histogram: dec!(0.001),
            bb_min_width: dec!(1),
            bb_max_width: dec!(10),
            require_daily_confirmation: true,
            require_hourly_signal: true,
            require_5m_entry: true,
        });
        let orch = build(config).await;
        assert!(orch.mtf.is_some());
    }
}
