//! Optional enrichers joined onto the daily index.
//!
//! Each stage reports whether it joined a column or was skipped because its
//! optional input was not there; an `Err` means the input was supplied but
//! unusable. Observations from another frame become visible to a daily row
//! only once their bar has closed, so a weekly close never leaks into the
//! days of the week it summarises.

use crate::application::market_data::statistical_features::grouped_std;
use crate::domain::errors::{PipelineError, PipelineResult};
use crate::domain::market::price_frame::{PriceField, PriceFrame};
use crate::domain::ml::feature_matrix::FeatureColumn;
use crate::domain::ml::feature_registry::{FeatureKey, Indicator};
use chrono::{DateTime, NaiveDate};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    FrameNotSupplied,
    AssetAbsent,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Enrichment {
    Joined(FeatureColumn),
    Skipped(SkipReason),
}

/// Weekly close carried forward onto the daily index (`<asset>_w_close`).
pub fn weekly_close(
    daily: &PriceFrame,
    weekly: Option<&PriceFrame>,
    asset: &str,
) -> PipelineResult<Enrichment> {
    let Some(weekly) = weekly else {
        return Ok(Enrichment::Skipped(SkipReason::FrameNotSupplied));
    };
    if weekly.frequency().to_millis() < daily.frequency().to_millis() {
        return Err(PipelineError::invalid_config(format!(
            "weekly frame has {} bars, finer than the daily {} bars",
            weekly.frequency(),
            daily.frequency()
        )));
    }

    let observations = weekly.observations(asset, PriceField::Close);
    if observations.is_empty() {
        return Ok(Enrichment::Skipped(SkipReason::AssetAbsent));
    }

    let values = as_of_join(daily, weekly, &observations);
    Ok(Enrichment::Joined(FeatureColumn::new(
        FeatureKey::asset(asset, Indicator::WeeklyClose),
        values,
    )))
}

/// Std of intraday log returns per UTC calendar date, joined on the daily
/// row of the same date (`<asset>_i_vol_std`).
pub fn intraday_volatility(
    daily: &PriceFrame,
    intraday: Option<&PriceFrame>,
    asset: &str,
) -> PipelineResult<Enrichment> {
    let Some(intraday) = intraday else {
        return Ok(Enrichment::Skipped(SkipReason::FrameNotSupplied));
    };
    if intraday.frequency().to_millis() >= daily.frequency().to_millis() {
        return Err(PipelineError::invalid_config(format!(
            "intraday frame has {} bars, not finer than the daily {} bars",
            intraday.frequency(),
            daily.frequency()
        )));
    }

    let observations = intraday.observations(asset, PriceField::Close);
    if observations.is_empty() {
        return Ok(Enrichment::Skipped(SkipReason::AssetAbsent));
    }

    // Returns are taken over present observations, keyed by the date of the
    // later bar; the first return of a day spans the overnight gap.
    let mut dated_returns: Vec<(NaiveDate, f64)> = Vec::with_capacity(observations.len());
    for pair in observations.windows(2) {
        let ((_, prev), (ts, curr)) = (pair[0], pair[1]);
        if prev <= 0.0 || curr <= 0.0 {
            continue;
        }
        if let Some(date) = utc_date(ts) {
            dated_returns.push((date, (curr / prev).ln()));
        }
    }

    let by_date: HashMap<NaiveDate, f64> = grouped_std(&dated_returns).into_iter().collect();
    let values = daily
        .index()
        .iter()
        .map(|ts| utc_date(*ts).and_then(|d| by_date.get(&d).copied()))
        .collect();

    Ok(Enrichment::Joined(FeatureColumn::new(
        FeatureKey::asset(asset, Indicator::IntradayVolStd),
        values,
    )))
}

/// Shared `EXOG_<symbol>` close columns, carried forward onto the daily index.
pub fn exogenous_closes(
    daily: &PriceFrame,
    exogenous: Option<&PriceFrame>,
) -> PipelineResult<Vec<FeatureColumn>> {
    let Some(exogenous) = exogenous else {
        return Ok(Vec::new());
    };

    let mut columns = Vec::new();
    for symbol in exogenous.assets() {
        let observations = exogenous.observations(symbol, PriceField::Close);
        if observations.is_empty() {
            continue;
        }
        let values = as_of_join(daily, exogenous, &observations);
        columns.push(FeatureColumn::new(FeatureKey::exogenous(symbol), values));
    }
    Ok(columns)
}

/// Latest observation of `source` whose bar has closed by the close of each
/// daily bar. `observations` must be in timestamp order.
fn as_of_join(
    daily: &PriceFrame,
    source: &PriceFrame,
    observations: &[(i64, f64)],
) -> Vec<Option<f64>> {
    let mut next = 0;
    let mut current = None;
    daily
        .index()
        .iter()
        .map(|ts| {
            let visible_until = daily.frequency().close_time(*ts);
            while next < observations.len()
                && source.frequency().close_time(observations[next].0) <= visible_until
            {
                current = Some(observations[next].1);
                next += 1;
            }
            current
        })
        .collect()
}

fn utc_date(timestamp_ms: i64) -> Option<NaiveDate> {
    DateTime::from_timestamp_millis(timestamp_ms).map(|dt| dt.date_naive())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::market::price_frame::Candle;
    use crate::domain::market::timeframe::Frequency;

    const DAY: i64 = 86_400_000;
    const HOUR: i64 = 3_600_000;
    // 2024-01-01, a Monday
    const MONDAY: i64 = 1_704_067_200_000;

    fn bar(symbol: &str, ts: i64, close: f64) -> Candle {
        Candle {
            symbol: symbol.to_string(),
            open: close,
            high: close,
            low: close,
            close,
            volume: 1.0,
            timestamp: ts,
        }
    }

    fn daily(days: i64) -> PriceFrame {
        PriceFrame::from_candles(
            Frequency::OneDay,
            (0..days).map(|d| bar("BTCUSDT", MONDAY + d * DAY, 100.0 + d as f64)),
        )
    }

    #[test]
    fn test_weekly_close_visible_only_after_week_closes() {
        let weekly = PriceFrame::from_candles(
            Frequency::OneWeek,
            vec![
                bar("BTCUSDT", MONDAY, 1000.0),
                bar("BTCUSDT", MONDAY + 7 * DAY, 2000.0),
            ],
        );
        let daily = daily(15);

        let Enrichment::Joined(column) = weekly_close(&daily, Some(&weekly), "BTCUSDT").unwrap()
        else {
            panic!("weekly close should be joined");
        };
        assert_eq!(column.key.to_string(), "BTCUSDT_w_close");
        // Monday..Saturday of week one: nothing closed yet
        assert!(column.values[..6].iter().all(Option::is_none));
        // Sunday's daily bar closes together with the first weekly bar
        assert_eq!(column.values[6], Some(1000.0));
        assert_eq!(column.values[12], Some(1000.0));
        assert_eq!(column.values[13], Some(2000.0));
        assert_eq!(column.values[14], Some(2000.0));
    }

    #[test]
    fn test_weekly_skips() {
        let daily = daily(3);
        assert_eq!(
            weekly_close(&daily, None, "BTCUSDT").unwrap(),
            Enrichment::Skipped(SkipReason::FrameNotSupplied)
        );
        let weekly = PriceFrame::from_candles(Frequency::OneWeek, vec![bar("ETHUSDT", MONDAY, 1.0)]);
        assert_eq!(
            weekly_close(&daily, Some(&weekly), "BTCUSDT").unwrap(),
            Enrichment::Skipped(SkipReason::AssetAbsent)
        );
    }

    #[test]
    fn test_weekly_rejects_finer_frame() {
        let hourly = PriceFrame::from_candles(Frequency::OneHour, vec![bar("BTCUSDT", MONDAY, 1.0)]);
        assert!(weekly_close(&daily(2), Some(&hourly), "BTCUSDT").is_err());
    }

    #[test]
    fn test_intraday_volatility_per_date() {
        let mut bars = Vec::new();
        // Day one alternates 100/110, day two is flat at 100
        for h in 0..24 {
            let close = if h % 2 == 0 { 100.0 } else { 110.0 };
            bars.push(bar("BTCUSDT", MONDAY + h * HOUR, close));
        }
        for h in 0..24 {
            bars.push(bar("BTCUSDT", MONDAY + DAY + h * HOUR, 100.0));
        }
        let intraday = PriceFrame::from_candles(Frequency::OneHour, bars);
        let daily = daily(3);

        let Enrichment::Joined(column) =
            intraday_volatility(&daily, Some(&intraday), "BTCUSDT").unwrap()
        else {
            panic!("intraday volatility should be joined");
        };
        assert_eq!(column.key.to_string(), "BTCUSDT_i_vol_std");
        assert!(column.values[0].unwrap() > 0.09);
        // Day two: overnight return 110 -> 100 then zeros
        assert!(column.values[1].unwrap() > 0.0);
        assert_eq!(column.values[2], None);
    }

    #[test]
    fn test_exogenous_columns_are_shared() {
        let exog = PriceFrame::from_candles(
            Frequency::OneDay,
            vec![bar("^VIX", MONDAY, 13.0), bar("^VIX", MONDAY + 2 * DAY, 15.0)],
        );
        let columns = exogenous_closes(&daily(4), Some(&exog)).unwrap();
        assert_eq!(columns.len(), 1);
        assert_eq!(columns[0].key.to_string(), "EXOG_VIX");
        assert_eq!(
            columns[0].values,
            vec![Some(13.0), Some(13.0), Some(15.0), Some(15.0)]
        );
        assert!(exogenous_closes(&daily(4), None).unwrap().is_empty());
    }
}
