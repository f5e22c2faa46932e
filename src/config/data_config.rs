use super::{Lookup, parse_list, parse_or};
use anyhow::{Result, bail};
use std::path::PathBuf;
use std::str::FromStr;

const DEFAULT_ASSETS: &[&str] = &["BTCUSDT", "ETHUSDT", "XRPUSDT", "BNBUSDT"];

/// Where raw price history comes from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataSourceKind {
    Binance,
    Csv,
}

impl FromStr for DataSourceKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "binance" => Ok(DataSourceKind::Binance),
            "csv" => Ok(DataSourceKind::Csv),
            _ => bail!("Invalid DATA_SOURCE: {}. Must be 'binance' or 'csv'", s),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DataConfig {
    pub assets: Vec<String>,
    /// Asset whose target the model is trained on
    pub training_asset: String,
    /// Shared exogenous series joined as `EXOG_<symbol>` columns
    pub exogenous_symbols: Vec<String>,
    pub source: DataSourceKind,
    pub csv_data_dir: PathBuf,
    pub binance_base_url: String,
    /// Daily bars fetched for training
    pub daily_lookback: usize,
    pub weekly_lookback: usize,
    /// Hourly bars fetched for the intraday volatility enricher
    pub intraday_lookback: usize,
    /// Daily bars fetched for batch prediction
    pub forecast_lookback: usize,
    pub enable_weekly: bool,
    pub enable_intraday: bool,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            assets: DEFAULT_ASSETS.iter().map(|s| s.to_string()).collect(),
            training_asset: DEFAULT_ASSETS[0].to_string(),
            exogenous_symbols: Vec::new(),
            source: DataSourceKind::Binance,
            csv_data_dir: PathBuf::from("data/prices"),
            binance_base_url: "https://api.binance.com".to_string(),
            daily_lookback: 365,
            weekly_lookback: 52,
            intraday_lookback: 1440,
            forecast_lookback: 90,
            enable_weekly: true,
            enable_intraday: true,
        }
    }
}

impl DataConfig {
    pub fn from_lookup(lookup: Lookup<'_>) -> Result<Self> {
        let defaults = Self::default();

        let assets: Vec<String> = parse_list(lookup, "ASSETS", DEFAULT_ASSETS)
            .into_iter()
            .map(|a| a.to_uppercase())
            .collect();
        let training_asset = match lookup("TRAINING_ASSET") {
            Some(asset) if !asset.trim().is_empty() => asset.trim().to_uppercase(),
            _ => assets.first().cloned().unwrap_or_default(),
        };
        let source = match lookup("DATA_SOURCE") {
            Some(raw) if !raw.trim().is_empty() => raw.trim().parse()?,
            _ => defaults.source,
        };

        Ok(Self {
            assets,
            training_asset,
            exogenous_symbols: parse_list(lookup, "EXOGENOUS_SYMBOLS", &[]),
            source,
            csv_data_dir: lookup("CSV_DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.csv_data_dir),
            binance_base_url: lookup("BINANCE_BASE_URL").unwrap_or(defaults.binance_base_url),
            daily_lookback: parse_or(lookup, "DAILY_LOOKBACK", defaults.daily_lookback)?,
            weekly_lookback: parse_or(lookup, "WEEKLY_LOOKBACK", defaults.weekly_lookback)?,
            intraday_lookback: parse_or(lookup, "INTRADAY_LOOKBACK", defaults.intraday_lookback)?,
            forecast_lookback: parse_or(lookup, "FORECAST_LOOKBACK", defaults.forecast_lookback)?,
            enable_weekly: parse_or(lookup, "ENABLE_WEEKLY_FEATURES", defaults.enable_weekly)?,
            enable_intraday: parse_or(lookup, "ENABLE_INTRADAY_FEATURES", defaults.enable_intraday)?,
        })
    }

    pub fn validate(&self) -> Result<()> {
        if self.assets.is_empty() {
            bail!("ASSETS must name at least one asset");
        }
        if !self.assets.contains(&self.training_asset) {
            bail!(
                "TRAINING_ASSET {} is not one of ASSETS {:?}",
                self.training_asset,
                self.assets
            );
        }
        for (name, value) in [
            ("DAILY_LOOKBACK", self.daily_lookback),
            ("WEEKLY_LOOKBACK", self.weekly_lookback),
            ("INTRADAY_LOOKBACK", self.intraday_lookback),
            ("FORECAST_LOOKBACK", self.forecast_lookback),
        ] {
            if value < 2 {
                bail!("{} must be at least 2, got {}", name, value);
            }
        }
        Ok(())
    }
}
