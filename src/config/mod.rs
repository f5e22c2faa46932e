//! Configuration for the forecasting pipeline.
//!
//! Built once per run from environment variables (after `.env` is loaded by
//! the binary) and passed down to each stage. Every value has a default, so
//! an empty environment yields the standard setup.

mod data_config;
mod feature_env_config;
mod model_config;
mod signal_env_config;

pub use data_config::{DataConfig, DataSourceKind};
pub use model_config::ModelConfig;

use crate::application::features::FeatureConfig;
use crate::domain::trading::signal::SignalConfig;
use anyhow::{Context, Result, bail};
use std::env;
use std::str::FromStr;

/// Source of raw configuration values by key
pub type Lookup<'a> = &'a dyn Fn(&str) -> Option<String>;

#[derive(Debug, Clone, Default)]
pub struct PipelineConfig {
    pub data: DataConfig,
    pub features: FeatureConfig,
    pub model: ModelConfig,
    pub signal: SignalConfig,
}

impl PipelineConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(&|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: Lookup<'_>) -> Result<Self> {
        let config = Self {
            data: DataConfig::from_lookup(lookup)?,
            features: feature_env_config::from_lookup(lookup)?,
            model: ModelConfig::from_lookup(lookup)?,
            signal: signal_env_config::from_lookup(lookup)?,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.data.validate()?;

        let f = &self.features;
        if f.short_window < 2 || f.long_window <= f.short_window {
            bail!(
                "Rolling windows must satisfy 2 <= short ({}) < long ({})",
                f.short_window,
                f.long_window
            );
        }
        if f.autocorr_lag == 0 || f.autocorr_window <= f.autocorr_lag + 1 {
            bail!(
                "AUTOCORR_WINDOW ({}) must exceed AUTOCORR_LAG ({}) + 1",
                f.autocorr_window,
                f.autocorr_lag
            );
        }
        if f.macd_fast_period >= f.macd_slow_period {
            bail!("MACD fast period must be shorter than the slow period");
        }

        let s = &self.signal;
        for (name, value) in [
            ("SIGNAL_THRESHOLD_MULTIPLIER", s.threshold_multiplier),
            ("STOP_LOSS_ATR_MULTIPLE", s.stop_loss_atr_multiple),
            ("TAKE_PROFIT_ATR_MULTIPLE", s.take_profit_atr_multiple),
            ("FALLBACK_VOLATILITY", s.fallback_volatility),
            ("FALLBACK_ATR_PCT", s.fallback_atr_pct),
        ] {
            if !(value.is_finite() && value >= 0.0) {
                bail!("{} must be a non-negative number, got {}", name, value);
            }
        }

        self.model.gbm.validate().context("Invalid GBM parameters")?;
        Ok(())
    }
}

pub(crate) fn parse_or<T>(lookup: Lookup<'_>, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(key) {
        Some(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse::<T>()
            .with_context(|| format!("Failed to parse {}", key)),
        _ => Ok(default),
    }
}

pub(crate) fn parse_list(lookup: Lookup<'_>, key: &str, default: &[&str]) -> Vec<String> {
    match lookup(key) {
        Some(raw) => raw
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect(),
        None => default.iter().map(|s| s.to_string()).collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_from_empty_environment() {
        let config = PipelineConfig::from_lookup(&lookup_from(&[])).unwrap();
        assert_eq!(
            config.data.assets,
            vec!["BTCUSDT", "ETHUSDT", "XRPUSDT", "BNBUSDT"]
        );
        assert_eq!(config.data.training_asset, "BTCUSDT");
        assert_eq!(config.data.daily_lookback, 365);
        assert!(config.data.enable_weekly);
        assert!(config.data.enable_intraday);
        assert_eq!(config.features, FeatureConfig::default());
        assert_eq!(config.signal, SignalConfig::default());
        assert_eq!(
            config.model.model_path.to_str(),
            Some("artifacts/final_gbm_model.json")
        );
    }

    #[test]
    fn test_overrides_are_applied() {
        let config = PipelineConfig::from_lookup(&lookup_from(&[
            ("ASSETS", "ethusdt, solusdt"),
            ("RSI_PERIOD", "10"),
            ("SIGNAL_THRESHOLD_MULTIPLIER", "0.75"),
            ("GBM_LEARNING_RATE", "0.1"),
            ("ENABLE_WEEKLY_FEATURES", "false"),
        ]))
        .unwrap();
        assert_eq!(config.data.assets, vec!["ETHUSDT", "SOLUSDT"]);
        assert_eq!(config.data.training_asset, "ETHUSDT");
        assert!(!config.data.enable_weekly);
        assert!(config.data.enable_intraday);
        assert_eq!(config.features.rsi_period, 10);
        assert_eq!(config.signal.threshold_multiplier, 0.75);
        assert_eq!(config.model.gbm.learning_rate, 0.1);
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        assert!(PipelineConfig::from_lookup(&lookup_from(&[("RSI_PERIOD", "abc")])).is_err());
        assert!(
            PipelineConfig::from_lookup(&lookup_from(&[
                ("FEATURE_SHORT_WINDOW", "30"),
                ("FEATURE_LONG_WINDOW", "21"),
            ]))
            .is_err()
        );
        assert!(
            PipelineConfig::from_lookup(&lookup_from(&[("TRAINING_ASSET", "DOGEUSDT")])).is_err()
        );
        assert!(
            PipelineConfig::from_lookup(&lookup_from(&[("FALLBACK_VOLATILITY", "-1")])).is_err()
        );
    }
}
