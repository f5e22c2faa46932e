use super::{Lookup, parse_or};
use crate::application::features::FeatureConfig;
use anyhow::Result;

pub(super) fn from_lookup(lookup: Lookup<'_>) -> Result<FeatureConfig> {
    let d = FeatureConfig::default();
    Ok(FeatureConfig {
        short_window: parse_or(lookup, "FEATURE_SHORT_WINDOW", d.short_window)?,
        long_window: parse_or(lookup, "FEATURE_LONG_WINDOW", d.long_window)?,
        autocorr_window: parse_or(lookup, "AUTOCORR_WINDOW", d.autocorr_window)?,
        autocorr_lag: parse_or(lookup, "AUTOCORR_LAG", d.autocorr_lag)?,
        rsi_period: parse_or(lookup, "RSI_PERIOD", d.rsi_period)?,
        macd_fast_period: parse_or(lookup, "MACD_FAST_PERIOD", d.macd_fast_period)?,
        macd_slow_period: parse_or(lookup, "MACD_SLOW_PERIOD", d.macd_slow_period)?,
        macd_signal_period: parse_or(lookup, "MACD_SIGNAL_PERIOD", d.macd_signal_period)?,
        sma_period: parse_or(lookup, "SMA_PERIOD", d.sma_period)?,
        ema_period: parse_or(lookup, "EMA_PERIOD", d.ema_period)?,
        bb_period: parse_or(lookup, "BB_PERIOD", d.bb_period)?,
        bb_std_dev: parse_or(lookup, "BB_STD_DEV", d.bb_std_dev)?,
        atr_period: parse_or(lookup, "ATR_PERIOD", d.atr_period)?,
    })
}
