//! Offline [`PriceSource`] over CSV files laid out as
//! `<root>/<interval>/<asset>.csv` with a
//! `timestamp,open,high,low,close,volume` header.
//!
//! `timestamp` is the bar open time, either epoch milliseconds or an
//! RFC 3339 / `YYYY-MM-DD` date in UTC.

use crate::domain::errors::{PipelineError, PipelineResult};
use crate::domain::market::price_frame::{Candle, PriceFrame};
use crate::domain::market::timeframe::Frequency;
use crate::domain::ports::PriceSource;
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate};
use serde::Deserialize;
use std::fs::File;
use std::io::BufReader;
use std::path::PathBuf;
use tracing::{info, warn};

#[derive(Debug, Deserialize)]
struct BarRecord {
    timestamp: String,
    open: f64,
    high: f64,
    low: f64,
    close: f64,
    volume: f64,
}

pub struct CsvPriceSource {
    root: PathBuf,
}

impl CsvPriceSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn path_for(&self, asset: &str, frequency: Frequency) -> PathBuf {
        self.root
            .join(frequency.to_binance_string())
            .join(format!("{}.csv", asset))
    }

    fn read_asset(&self, asset: &str, lookback: usize, frequency: Frequency) -> PipelineResult<Vec<Candle>> {
        let path = self.path_for(asset, frequency);
        let file = File::open(&path).map_err(|e| {
            PipelineError::data_unavailable(asset, format!("{}: {}", path.display(), e))
        })?;
        let mut rdr = csv::Reader::from_reader(BufReader::new(file));

        let mut candles = Vec::new();
        for (line, result) in rdr.deserialize::<BarRecord>().enumerate() {
            let record = result.map_err(|e| {
                PipelineError::data_unavailable(asset, format!("{} row {}: {}", path.display(), line + 1, e))
            })?;
            let Some(timestamp) = parse_timestamp(&record.timestamp) else {
                return Err(PipelineError::data_unavailable(
                    asset,
                    format!("{} row {}: bad timestamp {:?}", path.display(), line + 1, record.timestamp),
                ));
            };
            candles.push(Candle {
                symbol: asset.to_string(),
                open: record.open,
                high: record.high,
                low: record.low,
                close: record.close,
                volume: record.volume,
                timestamp,
            });
        }

        candles.sort_by_key(|c| c.timestamp);
        candles.dedup_by_key(|c| c.timestamp);
        if candles.len() > lookback {
            candles.drain(..candles.len() - lookback);
        }
        Ok(candles)
    }
}

#[async_trait]
impl PriceSource for CsvPriceSource {
    async fn fetch(
        &self,
        assets: &[String],
        lookback: usize,
        frequency: Frequency,
    ) -> PipelineResult<PriceFrame> {
        let mut all = Vec::new();
        let mut found = 0;
        for asset in assets {
            match self.read_asset(asset, lookback, frequency) {
                Ok(candles) if candles.is_empty() => {
                    warn!("CsvPriceSource: {} has no {} rows", asset, frequency);
                }
                Ok(candles) => {
                    info!("CsvPriceSource: loaded {} {} bars for {}", candles.len(), frequency, asset);
                    found += 1;
                    all.extend(candles);
                }
                Err(e) => warn!("CsvPriceSource: {}", e),
            }
        }

        if found == 0 {
            return Err(PipelineError::data_unavailable(
                assets.join(","),
                format!("no {} files under {}", frequency, self.root.display()),
            ));
        }
        Ok(PriceFrame::from_candles(frequency, all))
    }

    fn name(&self) -> &str {
        "csv"
    }
}

fn parse_timestamp(raw: &str) -> Option<i64> {
    let raw = raw.trim();
    if let Ok(ms) = raw.parse::<i64>() {
        return Some(ms);
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.timestamp_millis());
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc().timestamp_millis())
}
