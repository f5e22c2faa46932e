//! Binance price history (klines) as a [`PriceSource`].
//!
//! Only bars that have closed are kept: the in-progress bar Binance returns
//! last would otherwise enter features and targets with a partial close.

use crate::domain::errors::{PipelineError, PipelineResult};
use crate::domain::market::price_frame::{Candle, PriceFrame};
use crate::domain::market::timeframe::Frequency;
use crate::domain::ports::PriceSource;
use crate::infrastructure::core::http_client_factory::{HttpClientFactory, build_url_with_query};
use async_trait::async_trait;
use chrono::Utc;
use reqwest_middleware::ClientWithMiddleware;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Binance caps one klines request at this many bars
const MAX_KLINES_PER_REQUEST: usize = 1000;

pub struct BinancePriceSource {
    client: ClientWithMiddleware,
    base_url: String,
}

impl BinancePriceSource {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: HttpClientFactory::create_client(3, Duration::from_secs(30)),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// The last `lookback` closed bars of `symbol`, oldest first.
    async fn fetch_symbol(
        &self,
        symbol: &str,
        lookback: usize,
        frequency: Frequency,
    ) -> PipelineResult<Vec<Candle>> {
        let url = format!("{}/api/v3/klines", self.base_url);
        let now_ms = Utc::now().timestamp_millis();
        let mut candles: Vec<Candle> = Vec::with_capacity(lookback);
        let mut end_time: Option<i64> = None;

        // One extra bar per page covers the unclosed one that gets dropped.
        while candles.len() < lookback {
            let limit = (lookback - candles.len() + 1).min(MAX_KLINES_PER_REQUEST);
            let limit_str = limit.to_string();
            let mut params = vec![
                ("symbol", symbol.to_string()),
                ("interval", frequency.to_binance_string().to_string()),
                ("limit", limit_str),
            ];
            if let Some(end) = end_time {
                params.push(("endTime", end.to_string()));
            }

            let response = self
                .client
                .get(build_url_with_query(&url, &params))
                .send()
                .await
                .map_err(|e| PipelineError::data_unavailable(symbol, e.to_string()))?;
            if !response.status().is_success() {
                let status = response.status();
                let error_text = response.text().await.unwrap_or_default();
                return Err(PipelineError::data_unavailable(
                    symbol,
                    format!("klines request failed ({}): {}", status, error_text),
                ));
            }

            let klines: Vec<serde_json::Value> = response.json().await.map_err(|e| {
                PipelineError::data_unavailable(symbol, format!("bad klines payload: {}", e))
            })?;
            let page_len = klines.len();
            let page = parse_klines(symbol, klines, now_ms);
            debug!(
                "BinancePriceSource: {} {} page with {} closed bars",
                symbol,
                frequency,
                page.len()
            );

            let Some(first) = page.first() else {
                break;
            };
            end_time = Some(first.timestamp - 1);
            candles.splice(0..0, page);
            if page_len < limit {
                break;
            }
        }

        if candles.len() > lookback {
            candles.drain(..candles.len() - lookback);
        }
        Ok(candles)
    }
}

#[async_trait]
impl PriceSource for BinancePriceSource {
    async fn fetch(
        &self,
        assets: &[String],
        lookback: usize,
        frequency: Frequency,
    ) -> PipelineResult<PriceFrame> {
        let mut all = Vec::new();
        let mut fetched = 0;
        for symbol in assets {
            match self.fetch_symbol(symbol, lookback, frequency).await {
                Ok(candles) if candles.is_empty() => {
                    warn!("BinancePriceSource: no {} bars for {}", frequency, symbol);
                }
                Ok(candles) => {
                    info!(
                        "BinancePriceSource: fetched {} {} bars for {}",
                        candles.len(),
                        frequency,
                        symbol
                    );
                    fetched += 1;
                    all.extend(candles);
                }
                Err(e) => warn!("BinancePriceSource: {}", e),
            }
        }

        if fetched == 0 {
            return Err(PipelineError::data_unavailable(
                assets.join(","),
                format!("no {} bars returned by Binance", frequency),
            ));
        }
        Ok(PriceFrame::from_candles(frequency, all))
    }

    fn name(&self) -> &str {
        "binance"
    }
}

/// Converts raw kline arrays to candles, dropping malformed rows and bars
/// whose close time is still in the future.
///
/// Kline layout: `[open_time, open, high, low, close, volume, close_time, ...]`
fn parse_klines(symbol: &str, klines: Vec<serde_json::Value>, now_ms: i64) -> Vec<Candle> {
    klines
        .into_iter()
        .filter_map(|k| {
            let arr = k.as_array()?;
            if arr.len() < 7 {
                return None;
            }
            let close_time = arr[6].as_i64()?;
            if close_time > now_ms {
                return None;
            }
            let field = |i: usize| arr[i].as_str()?.parse::<f64>().ok();

            Some(Candle {
                symbol: symbol.to_string(),
                open: field(1)?,
                high: field(2)?,
                low: field(3)?,
                close: field(4)?,
                volume: field(5)?,
                timestamp: arr[0].as_i64()?,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_klines_drops_unclosed_and_malformed() {
        let now = 1_700_000_000_000;
        let klines = vec![
            json!([1, "100.0", "110.0", "90.0", "105.0", "12.5", now - 1, "0", 10]),
            json!([2, "105.0", "111.0", "99.0", "bad", "3.0", now - 1]),
            json!([3, "105.0", "108.0", "101.0", "107.0", "4.0", now + 60_000]),
            json!([4, "1.0"]),
        ];

        let candles = parse_klines("BTCUSDT", klines, now);
        assert_eq!(candles.len(), 1);
        assert_eq!(candles[0].timestamp, 1);
        assert_eq!(candles[0].close, 105.0);
        assert_eq!(candles[0].volume, 12.5);
        assert_eq!(candles[0].symbol, "BTCUSDT");
    }
}
