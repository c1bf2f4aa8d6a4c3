use std::time::Duration;

use futures_util::StreamExt;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::str::FromStr;
use tokio::sync::mpsc;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, error, info, warn};

use crate::types::{KlineEvent, Timeframe};

const BINANCE_US_WS: &str = "wss://stream.binance.us:9443/ws";
const INITIAL_BACKOFF: Duration = Duration::from_secs(1);
const MAX_BACKOFF: Duration = Duration::from_secs(60);

/// Streams closed-and-in-progress candles for one symbol/timeframe off
/// Binance's kline websocket. Reconnects with exponential backoff on any
/// failure; on resubscribe mid-bar it re-emits the last bar it saw so a
/// downstream aggregator never silently skips a bucket.
pub struct BinanceTickSource {
    symbol: String,
    timeframe: Timeframe,
}

impl BinanceTickSource {
    pub fn new(symbol: impl Into<String>, timeframe: Timeframe) -> Self {
        Self {
            symbol: symbol.into(),
            timeframe,
        }
    }

    pub fn connect(self) -> mpsc::Receiver<KlineEvent> {
        let (tx, rx) = mpsc::channel(1000);
        tokio::spawn(async move {
            self.run(tx).await;
        });
        rx
    }

    async fn run(self, tx: mpsc::Sender<KlineEvent>) {
        let stream = format!(
            "{}@kline_{}",
            self.symbol.to_lowercase(),
            self.timeframe.as_str()
        );
        let url = format!("{BINANCE_US_WS}/{stream}");

        let mut backoff = INITIAL_BACKOFF;
        let mut last_event: Option<KlineEvent> = None;

        loop {
            if tx.is_closed() {
                return;
            }

            info!(symbol = %self.symbol, timeframe = %self.timeframe, "connecting to kline stream");
            match Self::run_connection(&url, &tx, &mut last_event).await {
                Ok(()) => {
                    warn!("kline stream closed, reconnecting");
                    backoff = INITIAL_BACKOFF;
                }
                Err(e) => {
                    error!(error = %e, ?backoff, "kline stream error, reconnecting after backoff");
                    tokio::time::sleep(backoff).await;
                    backoff = (backoff * 2).min(MAX_BACKOFF);
                    continue;
                }
            }

            if let Some(ref event) = last_event {
                if !event.is_closed && tx.send(event.clone()).await.is_err() {
                    return;
                }
            }
        }
    }

    async fn run_connection(
        url: &str,
        tx: &mpsc::Sender<KlineEvent>,
        last_event: &mut Option<KlineEvent>,
    ) -> Result<(), tokio_tungstenite::tungstenite::Error> {
        let (ws_stream, _) = connect_async(url).await?;
        let (_write, mut read) = ws_stream.split();

        info!("kline stream connected");

        while let Some(msg) = read.next().await {
            match msg {
                Ok(Message::Text(text)) => {
                    if let Some(event) = Self::parse_kline(&text) {
                        *last_event = Some(event.clone());
                        if tx.send(event).await.is_err() {
                            return Ok(());
                        }
                    }
                }
                Ok(Message::Close(_)) => {
                    info!("kline stream closed by server");
                    return Ok(());
                }
                Ok(_) => {}
                Err(e) => return Err(e),
            }
        }

        Ok(())
    }

    fn parse_kline(text: &str) -> Option<KlineEvent> {
        let msg: WsKlineMessage = serde_json::from_str(text).ok()?;
        if msg.event_type != "kline" {
            debug!("unexpected event type: {}", msg.event_type);
            return None;
        }
        let k = msg.kline;
        Some(KlineEvent {
            symbol: msg.symbol,
            open_time: k.start_time,
            close_time: k.close_time,
            open: Decimal::from_str(&k.open).ok()?,
            high: Decimal::from_str(&k.high).ok()?,
            low: Decimal::from_str(&k.low).ok()?,
            close: Decimal::from_str(&k.close).ok()?,
            volume: Decimal::from_str(&k.volume).ok()?,
            is_closed: k.is_closed,
        })
    }
}

#[derive(Debug, Deserialize)]
struct WsKlineMessage {
    #[serde(rename = "e")]
    event_type: String,
    #[serde(rename = "s")]
    symbol: String,
    #[serde(rename = "k")]
    kline: WsKlineData,
}

#[derive(Debug, Deserialize)]
struct WsKlineData {
    #[serde(rename = "t")]
    start_time: i64,
    #[serde(rename = "T")]
    close_time: i64,
    #[serde(rename = "o")]
    open: String,
    #[serde(rename = "h")]
    high: String,
    #[serde(rename = "l")]
    low: String,
    #[serde(rename = "c")]
    close: String,
    #[serde(rename = "v")]
    volume: String,
    #[serde(rename = "x")]
    is_closed: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_closed_kline_payload() {
        let payload = r#"{
            "e": "kline",
            "s": "BTCUSDT",
            "k": {
                "t": 1000, "T": 1299,
                "o": "100.0", "h": "105.0", "l": "99.0", "c": "104.0",
                "v": "12.5", "x": true
            }
        }"#;
        let event = BinanceTickSource::parse_kline(payload).unwrap();
        assert_eq!(event.symbol, "BTCUSDT");
        assert!(event.is_closed);
        assert_eq!(event.close, Decimal::from_str("104.0").unwrap());
    }

    #[test]
    fn ignores_non_kline_events() {
        let payload = r#"{"e": "trade", "s": "BTCUSDT", "k": {
            "t": 0, "T": 0, "o": "0", "h": "0", "l": "0", "c": "0", "v": "0", "x": false
        }}"#;
        assert!(BinanceTickSource::parse_kline(payload).is_none());
    }
}
