use super::{Lookup, parse_or};
use crate::domain::trading::signal::SignalConfig;
use anyhow::Result;

pub(super) fn from_lookup(lookup: Lookup<'_>) -> Result<SignalConfig> {
    let d = SignalConfig::default();
    Ok(SignalConfig {
        threshold_multiplier: parse_or(lookup, "SIGNAL_THRESHOLD_MULTIPLIER", d.threshold_multiplier)?,
        stop_loss_atr_multiple: parse_or(lookup, "STOP_LOSS_ATR_MULTIPLE", d.stop_loss_atr_multiple)?,
        take_profit_atr_multiple: parse_or(
            lookup,
            "TAKE_PROFIT_ATR_MULTIPLE",
            d.take_profit_atr_multiple,
        )?,
        fallback_volatility: parse_or(lookup, "FALLBACK_VOLATILITY", d.fallback_volatility)?,
        fallback_atr_pct: parse_or(lookup, "FALLBACK_ATR_PCT", d.fallback_atr_pct)?,
    })
}
