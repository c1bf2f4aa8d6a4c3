use std::collections::HashMap;

use rust_decimal::Decimal;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::error::BotResult;
use crate::indicators::{Atr, BollingerBands, Indicator, Macd, Rsi};
use crate::types::{IndicatorSnapshot, Ohlcv, Timeframe, TimeframeCandles};

/// Which indicators a timeframe's registration wants updated on each
/// candle-closed edge. Every registered timeframe gets its own instances;
/// kernels are never shared across timeframes.
#[derive(Debug, Clone, Copy, Default)]
pub struct IndicatorConfig {
    pub rsi_period: Option<usize>,
    pub macd: Option<(usize, usize, usize)>,
    pub bollinger: Option<(usize, Decimal)>,
    pub atr_period: Option<usize>,
}

struct TimeframeSlot {
    candles: TimeframeCandles,
    rsi: Option<Rsi>,
    macd: Option<Macd>,
    bollinger: Option<BollingerBands>,
    atr: Option<Atr>,
    config: IndicatorConfig,
}

impl TimeframeSlot {
    fn new(timeframe: Timeframe, max_candles: usize, config: IndicatorConfig) -> BotResult<Self> {
        Ok(Self {
            candles: TimeframeCandles::new(timeframe, max_candles),
            rsi: config.rsi_period.map(Rsi::new).transpose()?,
            macd: config
                .macd
                .map(|(f, s, g)| Macd::new(f, s, g))
                .transpose()?,
            bollinger: config
                .bollinger
                .map(|(p, k)| BollingerBands::new(p, k))
                .transpose()?,
            atr: config.atr_period.map(Atr::new).transpose()?,
            config,
        })
    }

    /// Folds one tick into this timeframe's aggregator; on a candle-closed
    /// edge, feeds the closing price to every registered indicator. Never
    /// updates an indicator for an in-progress bar.
    fn update(&mut self, price: Decimal, volume: Decimal, ts_secs: i64) -> BotResult<Option<Ohlcv>> {
        let edge = self.candles.update(price, volume, ts_secs);
        if let Some(bar) = edge {
            if let Some(rsi) = &mut self.rsi {
                rsi.update(bar.close, bar.bucket_start)?;
            }
            if let Some(macd) = &mut self.macd {
                macd.update(bar.close, bar.bucket_start)?;
            }
            if let Some(bb) = &mut self.bollinger {
                bb.update(bar.close, bar.bucket_start)?;
            }
            if let Some(atr) = &mut self.atr {
                atr.update(bar.high, bar.low, bar.close, bar.bucket_start)?;
            }
        }
        Ok(edge)
    }

    fn is_ready(&self) -> bool {
        self.rsi.as_ref().map(|i| i.is_ready()).unwrap_or(false)
            || self.macd.as_ref().map(|i| i.is_ready()).unwrap_or(false)
            || self.bollinger.as_ref().map(|i| i.is_ready()).unwrap_or(false)
            || self.atr.as_ref().map(|i| i.is_ready()).unwrap_or(false)
    }

    fn snapshot(&self, timeframe: Timeframe) -> IndicatorSnapshot {
        let (ts, price) = self
            .candles
            .latest_completed()
            .map(|c| (c.bucket_start, c.close))
            .unwrap_or((0, Decimal::ZERO));

        let mut snap = IndicatorSnapshot::empty(timeframe, ts, price);
        if let Some(rsi) = &self.rsi {
            snap.rsi = rsi.value();
        }
        if let Some(macd) = &self.macd {
            snap.macd = macd.macd_line();
            snap.macd_signal = macd.signal_line();
            snap.macd_histogram = macd.histogram();
        }
        if let Some(bb) = &self.bollinger {
            snap.bb_upper = bb.upper();
            snap.bb_middle = bb.middle();
            snap.bb_lower = bb.lower();
            snap.bb_width_percent = bb.width_percent();
        }
        snap
    }

    fn reset(&mut self) {
        self.candles.reset();
        if let Some(rsi) = &mut self.rsi {
            rsi.reset();
        }
        if let Some(macd) = &mut self.macd {
            macd.reset();
        }
        if let Some(bb) = &mut self.bollinger {
            bb.reset();
        }
        if let Some(atr) = &mut self.atr {
            atr.reset();
        }
    }
}

struct Inner {
    slots: HashMap<Timeframe, TimeframeSlot>,
}

/// Owns one aggregator + indicator set per registered timeframe. Composition
/// only: no timeframe holds a reference into another. `update` takes the
/// write lock for the duration of one tick's fan-out across every
/// registered timeframe; `snapshot`/`snapshot_all` take the read lock.
pub struct MultiTimeframeManager {
    inner: RwLock<Inner>,
    max_candles: usize,
}

impl MultiTimeframeManager {
    pub fn new(registrations: Vec<(Timeframe, IndicatorConfig)>, max_candles: usize) -> BotResult<Self> {
        let mut slots = HashMap::new();
        for (tf, cfg) in registrations {
            slots.insert(tf, TimeframeSlot::new(tf, max_candles, cfg)?);
        }
        Ok(Self {
            inner: RwLock::new(Inner { slots }),
            max_candles,
        })
    }

    pub fn max_candles(&self) -> usize {
        self.max_candles
    }

    /// Updates every registered timeframe's aggregator with one tick. Feeds
    /// indicators only on each timeframe's own candle-closed edge.
    pub async fn update(&self, price: Decimal, volume: Decimal, ts_secs: i64) -> BotResult<()> {
        let mut inner = self.inner.write().await;
        for (tf, slot) in inner.slots.iter_mut() {
            match slot.update(price, volume, ts_secs) {
                Ok(Some(_)) => debug!(timeframe = %tf, "candle closed"),
                Ok(None) => {}
                Err(e) => warn!(timeframe = %tf, error = %e, "indicator update rejected"),
            }
        }
        Ok(())
    }

    pub async fn snapshot(&self, timeframe: Timeframe) -> Option<IndicatorSnapshot> {
        let inner = self.inner.read().await;
        inner.slots.get(&timeframe).map(|s| s.snapshot(timeframe))
    }

    pub async fn snapshot_all(&self) -> HashMap<Timeframe, IndicatorSnapshot> {
        let inner = self.inner.read().await;
        inner
            .slots
            .iter()
            .map(|(tf, slot)| (*tf, slot.snapshot(*tf)))
            .collect()
    }

    /// True once every registered timeframe has at least one ready indicator.
    pub async fn is_ready(&self) -> bool {
        let inner = self.inner.read().await;
        if inner.slots.is_empty() {
            return false;
        }
        inner.slots.values().all(|s| s.is_ready())
    }

    pub async fn reset(&self) {
        let mut inner = self.inner.write().await;
        for slot in inner.slots.values_mut() {
            slot.reset();
        }
    }
}
