//! Forecast-to-decision conversion.
//!
//! The bullish/bearish boundary scales with the asset's own return
//! volatility (`threshold = k * sigma`), and stop-loss / take-profit levels
//! are placed at fixed ATR multiples around the current price.

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Direction {
    Bullish,
    Bearish,
    Neutral,
}

impl Direction {
    /// Bullish above `threshold`, bearish below `-threshold`, neutral otherwise.
    /// A NaN forecast compares false on both sides and is neutral.
    pub fn from_forecast(predicted_return: f64, threshold: f64) -> Self {
        if predicted_return > threshold {
            Direction::Bullish
        } else if predicted_return < -threshold {
            Direction::Bearish
        } else {
            Direction::Neutral
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Bullish => write!(f, "BULLISH"),
            Direction::Bearish => write!(f, "BEARISH"),
            Direction::Neutral => write!(f, "NEUTRAL"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalConfig {
    /// `k` in `threshold = k * sigma`
    pub threshold_multiplier: f64,
    pub stop_loss_atr_multiple: f64,
    pub take_profit_atr_multiple: f64,
    /// Sigma used when the volatility estimate is zero or undefined
    pub fallback_volatility: f64,
    /// ATR proxy as a fraction of price when ATR is unavailable
    pub fallback_atr_pct: f64,
}

impl Default for SignalConfig {
    fn default() -> Self {
        Self {
            threshold_multiplier: 0.5,
            stop_loss_atr_multiple: 1.5,
            take_profit_atr_multiple: 2.0,
            fallback_volatility: 0.02,
            fallback_atr_pct: 0.05,
        }
    }
}

impl SignalConfig {
    pub fn effective_volatility(&self, volatility: Option<f64>) -> f64 {
        match volatility {
            Some(sigma) if sigma.is_finite() && sigma > 0.0 => sigma,
            _ => self.fallback_volatility,
        }
    }

    pub fn threshold(&self, volatility: Option<f64>) -> f64 {
        self.threshold_multiplier * self.effective_volatility(volatility)
    }

    pub fn effective_atr(&self, atr: Option<f64>, price: f64) -> f64 {
        match atr {
            Some(atr) if atr.is_finite() && atr >= 0.0 => atr,
            _ => self.fallback_atr_pct * price,
        }
    }
}

pub struct SignalInputs<'a> {
    pub asset: &'a str,
    pub predicted_return: f64,
    /// Std of historical one-step log returns
    pub volatility: Option<f64>,
    pub atr: Option<f64>,
    pub price: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Signal {
    pub asset: String,
    pub predicted_return: f64,
    pub direction: Direction,
    /// `None` for neutral calls
    pub stop_loss: Option<f64>,
    /// `None` for neutral calls
    pub take_profit: Option<f64>,
    pub volatility: f64,
    pub threshold: f64,
    pub price: f64,
    pub atr: f64,
}

impl Signal {
    /// Price implied by the forecast log return
    pub fn predicted_price(&self) -> f64 {
        self.price * self.predicted_return.exp()
    }
}

pub fn generate_signal(inputs: SignalInputs<'_>, config: &SignalConfig) -> Signal {
    let volatility = config.effective_volatility(inputs.volatility);
    let threshold = config.threshold_multiplier * volatility;
    let direction = Direction::from_forecast(inputs.predicted_return, threshold);
    let atr = config.effective_atr(inputs.atr, inputs.price);

    let stop_distance = config.stop_loss_atr_multiple * atr;
    let target_distance = config.take_profit_atr_multiple * atr;
    let (stop_loss, take_profit) = match direction {
        Direction::Bullish => (
            Some(inputs.price - stop_distance),
            Some(inputs.price + target_distance),
        ),
        Direction::Bearish => (
            Some(inputs.price + stop_distance),
            Some(inputs.price - target_distance),
        ),
        Direction::Neutral => (None, None),
    };

    Signal {
        asset: inputs.asset.to_string(),
        predicted_return: inputs.predicted_return,
        direction,
        stop_loss,
        take_profit,
        volatility,
        threshold,
        price: inputs.price,
        atr,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn signal(r: f64, sigma: Option<f64>, atr: Option<f64>, price: f64) -> Signal {
        generate_signal(
            SignalInputs {
                asset: "BTCUSDT",
                predicted_return: r,
                volatility: sigma,
                atr,
                price,
            },
            &SignalConfig::default(),
        )
    }

    #[test]
    fn test_threshold_scenario() {
        let s = signal(0.015, Some(0.02), Some(100.0), 50000.0);
        assert!((s.threshold - 0.01).abs() < 1e-15);
        assert_eq!(s.direction, Direction::Bullish);
        assert_eq!(
            signal(0.005, Some(0.02), Some(100.0), 50000.0).direction,
            Direction::Neutral
        );
        assert_eq!(
            signal(-0.02, Some(0.02), Some(100.0), 50000.0).direction,
            Direction::Bearish
        );
    }

    #[test]
    fn test_levels_scenario() {
        let bull = signal(0.05, Some(0.02), Some(100.0), 50000.0);
        assert_eq!(bull.stop_loss, Some(49850.0));
        assert_eq!(bull.take_profit, Some(50200.0));

        let bear = signal(-0.05, Some(0.02), Some(100.0), 50000.0);
        assert_eq!(bear.stop_loss, Some(50150.0));
        assert_eq!(bear.take_profit, Some(49800.0));
    }

    #[test]
    fn test_neutral_has_no_levels() {
        let s = signal(0.0, Some(0.02), Some(100.0), 50000.0);
        assert_eq!(s.stop_loss, None);
        assert_eq!(s.take_profit, None);
    }

    #[test]
    fn test_volatility_fallback() {
        for sigma in [None, Some(0.0), Some(f64::NAN), Some(-1.0)] {
            let s = signal(0.011, sigma, Some(1.0), 100.0);
            assert_eq!(s.volatility, 0.02);
            assert!((s.threshold - 0.01).abs() < 1e-15);
            assert_eq!(s.direction, Direction::Bullish);
        }
    }

    #[test]
    fn test_atr_fallback_is_five_percent_of_price() {
        let s = signal(0.05, Some(0.02), None, 1000.0);
        assert_eq!(s.atr, 50.0);
        assert_eq!(s.stop_loss, Some(925.0));
        assert_eq!(s.take_profit, Some(1100.0));
    }

    #[test]
    fn test_nan_forecast_is_neutral() {
        assert_eq!(
            signal(f64::NAN, Some(0.02), Some(1.0), 100.0).direction,
            Direction::Neutral
        );
    }

    #[test]
    fn test_direction_serializes_uppercase() {
        assert_eq!(
            serde_json::to_string(&Direction::Bullish).unwrap(),
            "\"BULLISH\""
        );
    }
}
