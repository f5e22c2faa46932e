//! Typed feature names.
//!
//! A feature column is identified by a [`FeatureKey`]: the asset it was
//! derived from (or the shared scope for exogenous series) and the indicator.
//! The `"<asset>_<indicator>"` string form only exists at the model and
//! storage boundary; everywhere else keys are compared structurally.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Prefix of shared, cross-asset columns in the string form
pub const SHARED_PREFIX: &str = "EXOG";

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Indicator {
    Close,
    High,
    Low,
    Volume,
    LogReturn,
    /// Rolling mean of close over the window
    RollingMean(usize),
    /// Rolling sample std of log returns over the window
    RollingStd(usize),
    /// Rolling autocorrelation of log returns at the given lag
    Autocorr(usize),
    Rsi(usize),
    Macd,
    MacdSignal,
    MacdHist,
    Sma(usize),
    Ema(usize),
    BollingerHigh,
    BollingerLow,
    Atr(usize),
    WeeklyClose,
    IntradayVolStd,
    /// Close of an exogenous symbol (shared scope only)
    Exogenous(String),
}

impl fmt::Display for Indicator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Indicator::Close => f.write_str("close"),
            Indicator::High => f.write_str("high"),
            Indicator::Low => f.write_str("low"),
            Indicator::Volume => f.write_str("volume"),
            Indicator::LogReturn => f.write_str("logret"),
            Indicator::RollingMean(w) => write!(f, "roll_mean_{}", w),
            Indicator::RollingStd(w) => write!(f, "roll_std_{}", w),
            Indicator::Autocorr(lag) => write!(f, "autocorr_{}", lag),
            Indicator::Rsi(n) => write!(f, "rsi{}", n),
            Indicator::Macd => f.write_str("macd"),
            Indicator::MacdSignal => f.write_str("macd_signal"),
            Indicator::MacdHist => f.write_str("macd_hist"),
            Indicator::Sma(n) => write!(f, "sma{}", n),
            Indicator::Ema(n) => write!(f, "ema{}", n),
            Indicator::BollingerHigh => f.write_str("bb_high"),
            Indicator::BollingerLow => f.write_str("bb_low"),
            Indicator::Atr(n) => write!(f, "atr{}", n),
            Indicator::WeeklyClose => f.write_str("w_close"),
            Indicator::IntradayVolStd => f.write_str("i_vol_std"),
            Indicator::Exogenous(name) => f.write_str(name),
        }
    }
}

impl FromStr for Indicator {
    type Err = String;

    /// Parses asset-scoped indicator names. Exogenous names are only
    /// recognised through [`FeatureKey`] with the shared prefix.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let exact = match s {
            "close" => Some(Indicator::Close),
            "high" => Some(Indicator::High),
            "low" => Some(Indicator::Low),
            "volume" => Some(Indicator::Volume),
            "logret" => Some(Indicator::LogReturn),
            "macd" => Some(Indicator::Macd),
            "macd_signal" => Some(Indicator::MacdSignal),
            "macd_hist" => Some(Indicator::MacdHist),
            "bb_high" => Some(Indicator::BollingerHigh),
            "bb_low" => Some(Indicator::BollingerLow),
            "w_close" => Some(Indicator::WeeklyClose),
            "i_vol_std" => Some(Indicator::IntradayVolStd),
            _ => None,
        };
        if let Some(indicator) = exact {
            return Ok(indicator);
        }

        let parametric: [(&str, fn(usize) -> Indicator); 7] = [
            ("roll_mean_", Indicator::RollingMean),
            ("roll_std_", Indicator::RollingStd),
            ("autocorr_", Indicator::Autocorr),
            ("rsi", Indicator::Rsi),
            ("sma", Indicator::Sma),
            ("ema", Indicator::Ema),
            ("atr", Indicator::Atr),
        ];
        for (prefix, build) in parametric {
            if let Some(n) = s.strip_prefix(prefix)
                && !n.is_empty()
                && n.bytes().all(|b| b.is_ascii_digit())
                && let Ok(n) = n.parse::<usize>()
            {
                return Ok(build(n));
            }
        }

        Err(format!("Unknown indicator: {}", s))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum FeatureScope {
    Asset(String),
    Shared,
}

/// One feature column identity: originating scope plus indicator
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FeatureKey {
    pub scope: FeatureScope,
    pub indicator: Indicator,
}

impl FeatureKey {
    pub fn asset(asset: impl Into<String>, indicator: Indicator) -> Self {
        Self {
            scope: FeatureScope::Asset(asset.into()),
            indicator,
        }
    }

    /// Shared exogenous column. `^` and `=` are stripped from the symbol so
    /// that e.g. `^VIX` and `GC=F` give `EXOG_VIX` and `EXOG_GCF`.
    pub fn exogenous(symbol: &str) -> Self {
        let name: String = symbol.chars().filter(|c| *c != '^' && *c != '=').collect();
        Self {
            scope: FeatureScope::Shared,
            indicator: Indicator::Exogenous(name),
        }
    }

    pub fn asset_name(&self) -> Option<&str> {
        match &self.scope {
            FeatureScope::Asset(a) => Some(a),
            FeatureScope::Shared => None,
        }
    }

    pub fn is_shared(&self) -> bool {
        self.scope == FeatureScope::Shared
    }

    pub fn belongs_to(&self, asset: &str) -> bool {
        self.asset_name() == Some(asset)
    }

    /// Same indicator re-attributed to another asset. Shared keys are unchanged.
    pub fn with_asset(&self, asset: &str) -> Self {
        match self.scope {
            FeatureScope::Asset(_) => Self::asset(asset, self.indicator.clone()),
            FeatureScope::Shared => self.clone(),
        }
    }
}

impl fmt::Display for FeatureKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.scope {
            FeatureScope::Asset(asset) => write!(f, "{}_{}", asset, self.indicator),
            FeatureScope::Shared => write!(f, "{}_{}", SHARED_PREFIX, self.indicator),
        }
    }
}

impl FromStr for FeatureKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Some(name) = s
            .strip_prefix(SHARED_PREFIX)
            .and_then(|rest| rest.strip_prefix('_'))
        {
            if name.is_empty() {
                return Err(format!("Empty exogenous name in {}", s));
            }
            return Ok(Self {
                scope: FeatureScope::Shared,
                indicator: Indicator::Exogenous(name.to_string()),
            });
        }

        // Asset symbols may themselves contain underscores, so take the
        // leftmost split whose remainder is a known indicator.
        for (i, _) in s.match_indices('_') {
            let (asset, rest) = (&s[..i], &s[i + 1..]);
            if asset.is_empty() {
                continue;
            }
            if let Ok(indicator) = rest.parse::<Indicator>() {
                return Ok(Self::asset(asset, indicator));
            }
        }

        Err(format!("Not a feature name: {}", s))
    }
}
