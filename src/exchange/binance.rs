use std::collections::HashMap;
use std::str::FromStr;

use async_trait::async_trait;
use chrono::Utc;
use hmac::{Hmac, Mac};
use reqwest::Client;
use rust_decimal::Decimal;
use serde::Deserialize;
use sha2::Sha256;
use tracing::debug;

use crate::error::{BotError, BotResult};
use crate::types::Side;

use super::{ExchangeAdapter, OrderBookLevel, OrderBookSnapshot, OrderFill};

const BINANCE_US_API: &str = "https://api.binance.us";

type HmacSha256 = Hmac<Sha256>;

/// Live Binance venue adapter. Implements only the small operation set
/// `ExchangeAdapter` requires; the rest of Binance's REST surface is out of
/// scope for the signal engine.
#[derive(Debug, Clone)]
pub struct BinanceExchangeAdapter {
    client: Client,
    api_key: String,
    secret_key: String,
    base_url: String,
}

impl BinanceExchangeAdapter {
    /// `base_url` defaults to Binance.US production when not overridden --
    /// pass the testnet URL explicitly to run against it.
    pub fn new(api_key: String, secret_key: String, base_url: Option<String>) -> Self {
        Self {
            client: Client::new(),
            api_key,
            secret_key,
            base_url: base_url.unwrap_or_else(|| BINANCE_US_API.to_string()),
        }
    }

    fn sign(&self, query: &str) -> String {
        let mut mac = HmacSha256::new_from_slice(self.secret_key.as_bytes())
            .expect("HMAC can take key of any size");
        mac.update(query.as_bytes());
        hex::encode(mac.finalize().into_bytes())
    }

    fn build_signed_query(&self, params: &HashMap<&str, String>) -> String {
        let timestamp = Utc::now().timestamp_millis();
        let mut query_parts: Vec<String> =
            params.iter().map(|(k, v)| format!("{k}={v}")).collect();
        query_parts.push(format!("timestamp={timestamp}"));
        query_parts.push("recvWindow=5000".to_string());
        let query = query_parts.join("&");
        let signature = self.sign(&query);
        format!("{query}&signature={signature}")
    }

    /// Maps a non-2xx REST response to the engine's error taxonomy. 5xx and
    /// transport failures are retryable; 4xx rejections are not.
    fn classify_status(status: reqwest::StatusCode, body: &str) -> BotError {
        if status.is_server_error() {
            BotError::ExchangeTemporary(format!("binance {status}: {body}"))
        } else {
            BotError::ExchangeFatal(format!("binance {status}: {body}"))
        }
    }

    fn decimal(raw: &str, field: &str) -> BotResult<Decimal> {
        Decimal::from_str(raw)
            .map_err(|e| BotError::ExchangeTemporary(format!("bad {field} in response: {e}")))
    }
}

#[async_trait]
impl ExchangeAdapter for BinanceExchangeAdapter {
    fn is_paper(&self) -> bool {
        false
    }

    async fn place_market_order(
        &self,
        symbol: &str,
        side: Side,
        quantity: Decimal,
    ) -> BotResult<OrderFill> {
        let url = format!("{}/api/v3/order", self.base_url);

        let mut params: HashMap<&str, String> = HashMap::new();
        params.insert("symbol", symbol.to_string());
        params.insert("side", side.as_str().to_string());
        params.insert("type", "MARKET".to_string());
        params.insert("quantity", quantity.to_string());

        let query = self.build_signed_query(&params);
        let full_url = format!("{url}?{query}");

        debug!(symbol, %side, %quantity, "placing market order");

        let resp = self
            .client
            .post(&full_url)
            .header("X-MBX-APIKEY", &self.api_key)
            .send()
            .await
            .map_err(|e| BotError::ExchangeTemporary(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(Self::classify_status(status, &body));
        }

        let order: OrderResponse = resp
            .json()
            .await
            .map_err(|e| BotError::ExchangeTemporary(format!("bad order response: {e}")))?;

        let filled_quantity = Self::decimal(&order.executed_qty, "executedQty")?;
        let filled_price = if filled_quantity.is_zero() {
            Self::decimal(&order.orig_qty, "origQty")?
        } else {
            let quote = Self::decimal(
                order.cummulative_quote_qty.as_deref().unwrap_or("0"),
                "cummulativeQuoteQty",
            )?;
            quote / filled_quantity
        };

        Ok(OrderFill {
            filled_price,
            filled_quantity,
            ts: Utc::now(),
        })
    }

    async fn order_book(&self, symbol: &str, depth: usize) -> BotResult<OrderBookSnapshot> {
        let url = format!(
            "{}/api/v3/depth?symbol={}&limit={}",
            self.base_url, symbol, depth
        );

        let resp = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| BotError::ExchangeTemporary(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(Self::classify_status(status, &body));
        }

        let body: DepthResponse = resp
            .json()
            .await
            .map_err(|e| BotError::ExchangeTemporary(format!("bad depth response: {e}")))?;

        let to_levels = |raw: Vec<(String, String)>| -> BotResult<Vec<OrderBookLevel>> {
            raw.into_iter()
                .map(|(price, quantity)| {
                    Ok(OrderBookLevel {
                        price: Self::decimal(&price, "price")?,
                        quantity: Self::decimal(&quantity, "quantity")?,
                    })
                })
                .collect()
        };

        Ok(OrderBookSnapshot {
            symbol: symbol.to_string(),
            bids: to_levels(body.bids)?,
            asks: to_levels(body.asks)?,
        })
    }

    async fn server_time(&self) -> BotResult<i64> {
        let url = format!("{}/api/v3/time", self.base_url);
        let resp = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| BotError::ExchangeTemporary(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(Self::classify_status(status, &body));
        }

        let body: ServerTimeResponse = resp
            .json()
            .await
            .map_err(|e| BotError::ExchangeTemporary(format!("bad time response: {e}")))?;
        Ok(body.server_time as i64)
    }
}

#[derive(Debug, Deserialize)]
struct ServerTimeResponse {
    #[serde(rename = "serverTime")]
    server_time: u64,
}

#[derive(Debug, Deserialize)]
struct DepthResponse {
    bids: Vec<(String, String)>,
    asks: Vec<(String, String)>,
}

#[derive(Debug, Deserialize)]
struct OrderResponse {
    #[serde(rename = "origQty")]
    orig_qty: String,
    #[serde(rename = "executedQty")]
    executed_qty: String,
    #[serde(rename = "cummulativeQuoteQty")]
    cummulative_quote_qty: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signs_query_with_hmac_sha256() {
        let adapter = BinanceExchangeAdapter::new("key".into(), "secret".into(), None);
        let signature = adapter.sign("symbol=BTCUSDT&timestamp=1");
        assert_eq!(signature.len(), 64);
        assert!(signature.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn classifies_server_errors_as_retryable() {
        let err = BinanceExchangeAdapter::classify_status(
            reqwest::StatusCode::INTERNAL_SERVER_ERROR,
            "oops",
        );
        assert!(err.is_retryable());
    }

    #[test]
    fn classifies_client_errors_as_fatal() {
        let err = BinanceExchangeAdapter::classify_status(
            reqwest::StatusCode::BAD_REQUEST,
            "insufficient balance",
        );
        assert!(!err.is_retryable());
    }
}
