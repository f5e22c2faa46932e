//! Multi-asset OHLCV table aligned on one timestamp index.

use super::timeframe::Frequency;
use crate::domain::errors::{PipelineError, PipelineResult};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// One OHLCV bar as delivered by a price source
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    pub symbol: String,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
    /// Bar open time, Unix milliseconds
    pub timestamp: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum PriceField {
    Open,
    High,
    Low,
    Close,
    Volume,
}

impl PriceField {
    pub const ALL: [PriceField; 5] = [
        PriceField::Open,
        PriceField::High,
        PriceField::Low,
        PriceField::Close,
        PriceField::Volume,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PriceField::Open => "Open",
            PriceField::High => "High",
            PriceField::Low => "Low",
            PriceField::Close => "Close",
            PriceField::Volume => "Volume",
        }
    }

    fn of(&self, candle: &Candle) -> f64 {
        match self {
            PriceField::Open => candle.open,
            PriceField::High => candle.high,
            PriceField::Low => candle.low,
            PriceField::Close => candle.close,
            PriceField::Volume => candle.volume,
        }
    }
}

impl fmt::Display for PriceField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Price table indexed by timestamp, columns keyed by `(asset, field)`.
///
/// All assets share the frame's frequency and its index, which is the union
/// of every asset's timestamps. A cell an asset has no bar for is `None`;
/// missing cells are kept, never dropped.
#[derive(Debug, Clone, PartialEq)]
pub struct PriceFrame {
    frequency: Frequency,
    index: Vec<i64>,
    columns: BTreeMap<(String, PriceField), Vec<Option<f64>>>,
}

impl PriceFrame {
    pub fn empty(frequency: Frequency) -> Self {
        Self {
            frequency,
            index: Vec::new(),
            columns: BTreeMap::new(),
        }
    }

    /// Builds an aligned frame from bars of any number of assets.
    ///
    /// Non-finite values become missing cells. When an asset has two bars
    /// with the same timestamp the later one wins.
    pub fn from_candles<I>(frequency: Frequency, candles: I) -> Self
    where
        I: IntoIterator<Item = Candle>,
    {
        let candles: Vec<Candle> = candles.into_iter().collect();
        let index: Vec<i64> = candles
            .iter()
            .map(|c| c.timestamp)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        let mut columns: BTreeMap<(String, PriceField), Vec<Option<f64>>> = BTreeMap::new();
        for candle in &candles {
            // Index is sorted and unique, so the lookup always succeeds.
            let Ok(row) = index.binary_search(&candle.timestamp) else {
                continue;
            };
            for field in PriceField::ALL {
                let column = columns
                    .entry((candle.symbol.clone(), field))
                    .or_insert_with(|| vec![None; index.len()]);
                let value = field.of(candle);
                column[row] = value.is_finite().then_some(value);
            }
        }

        Self {
            frequency,
            index,
            columns,
        }
    }

    pub fn frequency(&self) -> Frequency {
        self.frequency
    }

    pub fn index(&self) -> &[i64] {
        &self.index
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Distinct assets in column order
    pub fn assets(&self) -> Vec<&str> {
        let mut assets: Vec<&str> = self.columns.keys().map(|(a, _)| a.as_str()).collect();
        assets.dedup();
        assets
    }

    pub fn contains_asset(&self, asset: &str) -> bool {
        self.columns.keys().any(|(a, _)| a == asset)
    }

    pub fn column(&self, asset: &str, field: PriceField) -> Option<&[Option<f64>]> {
        self.columns
            .get(&(asset.to_string(), field))
            .map(|v| v.as_slice())
    }

    /// Like [`column`](Self::column) but reports the absence as a `FeatureGap`.
    pub fn require(&self, asset: &str, field: PriceField) -> PipelineResult<&[Option<f64>]> {
        self.column(asset, field)
            .ok_or_else(|| PipelineError::FeatureGap {
                asset: asset.to_string(),
                column: field.to_string(),
            })
    }

    /// Present `(timestamp, value)` pairs of one column, in index order.
    pub fn observations(&self, asset: &str, field: PriceField) -> Vec<(i64, f64)> {
        self.column(asset, field)
            .map(|values| {
                self.index
                    .iter()
                    .zip(values)
                    .filter_map(|(ts, v)| v.map(|v| (*ts, v)))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Most recent present value of a column
    pub fn last_value(&self, asset: &str, field: PriceField) -> Option<f64> {
        self.column(asset, field)?.iter().rev().find_map(|v| *v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candle(symbol: &str, ts: i64, close: f64) -> Candle {
        Candle {
            symbol: symbol.to_string(),
            open: close,
            high: close + 1.0,
            low: close - 1.0,
            close,
            volume: 10.0,
            timestamp: ts,
        }
    }

    #[test]
    fn test_alignment_uses_union_index() {
        let frame = PriceFrame::from_candles(
            Frequency::OneDay,
            vec![
                candle("BTCUSDT", 1, 100.0),
                candle("BTCUSDT", 2, 101.0),
                candle("ETHUSDT", 2, 10.0),
                candle("ETHUSDT", 3, 11.0),
            ],
        );

        assert_eq!(frame.index(), &[1, 2, 3]);
        assert_eq!(
            frame.column("BTCUSDT", PriceField::Close).unwrap(),
            &[Some(100.0), Some(101.0), None]
        );
        assert_eq!(
            frame.column("ETHUSDT", PriceField::Close).unwrap(),
            &[None, Some(10.0), Some(11.0)]
        );
        assert_eq!(frame.assets(), vec!["BTCUSDT", "ETHUSDT"]);
    }

    #[test]
    fn test_non_finite_values_are_missing() {
        let frame =
            PriceFrame::from_candles(Frequency::OneDay, vec![candle("BTCUSDT", 1, f64::NAN)]);
        assert_eq!(frame.column("BTCUSDT", PriceField::Close).unwrap(), &[None]);
    }

    #[test]
    fn test_require_reports_feature_gap() {
        let frame = PriceFrame::from_candles(Frequency::OneDay, vec![candle("BTCUSDT", 1, 1.0)]);
        let err = frame.require("SOLUSDT", PriceField::Close).unwrap_err();
        assert_eq!(err.kind(), "FeatureGap");
    }
}
