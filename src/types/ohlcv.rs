use std::collections::VecDeque;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A named bucket duration the multi-timeframe manager rolls candles into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Timeframe {
    M5,
    M15,
    H1,
    H4,
    D1,
}

impl Timeframe {
    /// Bucket width in whole seconds.
    pub fn duration_secs(&self) -> i64 {
        match self {
            Timeframe::M5 => 5 * 60,
            Timeframe::M15 => 15 * 60,
            Timeframe::H1 => 60 * 60,
            Timeframe::H4 => 4 * 60 * 60,
            Timeframe::D1 => 24 * 60 * 60,
        }
    }

    /// `floor(ts, duration)` in the stream's time domain (UTC seconds).
    pub fn bucket_start(&self, ts_secs: i64) -> i64 {
        let d = self.duration_secs();
        ts_secs.div_euclid(d) * d
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Timeframe::M5 => "5m",
            Timeframe::M15 => "15m",
            Timeframe::H1 => "1h",
            Timeframe::H4 => "4h",
            Timeframe::D1 => "1d",
        }
    }
}

impl std::fmt::Display for Timeframe {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One completed (or in-progress) OHLCV bar for a timeframe bucket.
///
/// Invariant: `low <= min(open, close) <= max(open, close) <= high`,
/// `volume >= 0`. Callers that mutate a bar in place (the aggregator) are
/// responsible for preserving it; this type itself does not validate.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Ohlcv {
    pub bucket_start: i64,
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
    pub volume: Decimal,
}

impl Ohlcv {
    pub fn open_at(bucket_start: i64, price: Decimal, volume: Decimal) -> Self {
        Self {
            bucket_start,
            open: price,
            high: price,
            low: price,
            close: price,
            volume,
        }
    }

    pub fn absorb(&mut self, price: Decimal, volume: Decimal) {
        if price > self.high {
            self.high = price;
        }
        if price < self.low {
            self.low = price;
        }
        self.close = price;
        self.volume += volume;
    }
}

/// Ordered sequence of completed bars for one timeframe, plus the bar
/// currently accumulating. Bounded capacity; oldest completed bar is
/// evicted (FIFO) once `max_candles` is exceeded.
#[derive(Debug, Clone)]
pub struct TimeframeCandles {
    pub timeframe: Timeframe,
    completed: VecDeque<Ohlcv>,
    current: Option<Ohlcv>,
    max_candles: usize,
}

impl TimeframeCandles {
    pub fn new(timeframe: Timeframe, max_candles: usize) -> Self {
        Self {
            timeframe,
            completed: VecDeque::with_capacity(max_candles),
            current: None,
            max_candles,
        }
    }

    /// Folds one tick into the current bar. Returns the completed bar when
    /// the tick's bucket closes the previous one (a "candle closed" edge).
    /// No edge is emitted for the bar currently accumulating.
    pub fn update(&mut self, price: Decimal, volume: Decimal, ts_secs: i64) -> Option<Ohlcv> {
        let bucket_start = self.timeframe.bucket_start(ts_secs);

        match self.current {
            None => {
                self.current = Some(Ohlcv::open_at(bucket_start, price, volume));
                None
            }
            Some(bar) if bucket_start > bar.bucket_start => {
                self.push_completed(bar);
                self.current = Some(Ohlcv::open_at(bucket_start, price, volume));
                Some(bar)
            }
            Some(ref mut bar) => {
                bar.absorb(price, volume);
                None
            }
        }
    }

    fn push_completed(&mut self, bar: Ohlcv) {
        self.completed.push_back(bar);
        while self.completed.len() > self.max_candles {
            self.completed.pop_front();
        }
    }

    pub fn latest_completed(&self) -> Option<&Ohlcv> {
        self.completed.back()
    }

    pub fn completed_candles(&self) -> impl Iterator<Item = &Ohlcv> {
        self.completed.iter()
    }

    pub fn current_bar(&self) -> Option<&Ohlcv> {
        self.current.as_ref()
    }

    pub fn reset(&mut self) {
        self.completed.clear();
        self.current = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn bucket_start_floors_to_grid() {
        let tf = Timeframe::M5;
        assert_eq!(tf.bucket_start(0), 0);
        assert_eq!(tf.bucket_start(299), 0);
        assert_eq!(tf.bucket_start(300), 300);
        assert_eq!(tf.bucket_start(301), 300);
    }

    #[test]
    fn same_bucket_updates_dont_emit_edge() {
        let mut candles = TimeframeCandles::new(Timeframe::M5, 10);
        assert!(candles.update(dec!(100), dec!(1), 10).is_none());
        assert!(candles.update(dec!(101), dec!(1), 20).is_none());
        assert!(candles.update(dec!(99), dec!(1), 200).is_none());
        assert_eq!(candles.completed_candles().count(), 0);
        let bar = candles.current_bar().unwrap();
        assert_eq!(bar.open, dec!(100));
        assert_eq!(bar.high, dec!(101));
        assert_eq!(bar.low, dec!(99));
        assert_eq!(bar.close, dec!(99));
        assert_eq!(bar.volume, dec!(3));
    }

    #[test]
    fn bucket_flip_emits_exactly_one_edge() {
        let mut candles = TimeframeCandles::new(Timeframe::M5, 10);
        candles.update(dec!(100), dec!(1), 10);
        let edge = candles.update(dec!(105), dec!(1), 301);
        assert!(edge.is_some());
        assert_eq!(edge.unwrap().close, dec!(100));
        assert_eq!(candles.completed_candles().count(), 1);
        assert_eq!(candles.current_bar().unwrap().open, dec!(105));
    }

    #[test]
    fn overflow_evicts_oldest_completed() {
        let mut candles = TimeframeCandles::new(Timeframe::M5, 2);
        for i in 0..5i64 {
            candles.update(dec!(100), dec!(1), i * 300);
        }
        // each update opens a new bucket relative to the previous, so every
        // update after the first emits an edge
        assert!(candles.completed_candles().count() <= 2);
    }
}
