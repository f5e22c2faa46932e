use serde::{Deserialize, Serialize};
use tracing::info;

/// Out-of-sample quality of a fit, measured on the chronological holdout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationMetrics {
    pub samples: usize,
    pub rmse: f64,
    pub mae: f64,
    pub r2: f64,
    /// Share of rows where forecast and outcome have the same sign
    pub directional_accuracy: f64,
    pub signals: SignalDistribution,
}

/// How many holdout forecasts would clear the signal threshold each way
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SignalDistribution {
    pub bullish: usize,
    pub bearish: usize,
    pub neutral: usize,
    /// Bullish calls whose realised return was positive
    pub bullish_hits: usize,
    /// Bearish calls whose realised return was negative
    pub bearish_hits: usize,
}

impl ValidationMetrics {
    /// `None` for an empty or misaligned holdout.
    pub fn compute(predictions: &[f64], actuals: &[f64], threshold: f64) -> Option<Self> {
        let n = predictions.len();
        if n == 0 || n != actuals.len() {
            return None;
        }

        let sq_err: f64 = predictions
            .iter()
            .zip(actuals)
            .map(|(p, t)| (p - t).powi(2))
            .sum();
        let mae = predictions
            .iter()
            .zip(actuals)
            .map(|(p, t)| (p - t).abs())
            .sum::<f64>()
            / n as f64;
        let mean_y = actuals.iter().sum::<f64>() / n as f64;
        let var_y = actuals.iter().map(|t| (t - mean_y).powi(2)).sum::<f64>() / n as f64;
        let mse = sq_err / n as f64;
        let r2 = if var_y > 0.0 { 1.0 - mse / var_y } else { 0.0 };

        let mut correct_direction = 0;
        let mut signals = SignalDistribution::default();
        for (pred, actual) in predictions.iter().zip(actuals) {
            if (*pred > 0.0 && *actual > 0.0) || (*pred < 0.0 && *actual < 0.0) {
                correct_direction += 1;
            }
            if *pred > threshold {
                signals.bullish += 1;
                if *actual > 0.0 {
                    signals.bullish_hits += 1;
                }
            } else if *pred < -threshold {
                signals.bearish += 1;
                if *actual < 0.0 {
                    signals.bearish_hits += 1;
                }
            } else {
                signals.neutral += 1;
            }
        }

        Some(Self {
            samples: n,
            rmse: mse.sqrt(),
            mae,
            r2,
            directional_accuracy: correct_direction as f64 / n as f64,
            signals,
        })
    }

    pub fn log_summary(&self) {
        info!(
            "Holdout (n={}): RMSE={:.6}, MAE={:.6}, R²={:.4}, direction hit rate {:.1}%",
            self.samples,
            self.rmse,
            self.mae,
            self.r2,
            self.directional_accuracy * 100.0
        );
        info!(
            "Holdout signals: {} bullish ({} hits), {} bearish ({} hits), {} neutral",
            self.signals.bullish,
            self.signals.bullish_hits,
            self.signals.bearish,
            self.signals.bearish_hits,
            self.signals.neutral
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_perfect_forecast() {
        let y = vec![0.01, -0.02, 0.03, -0.01];
        let m = ValidationMetrics::compute(&y, &y, 0.015).unwrap();
        assert_eq!(m.samples, 4);
        assert!(m.rmse.abs() < 1e-12);
        assert!((m.r2 - 1.0).abs() < 1e-12);
        assert!((m.directional_accuracy - 1.0).abs() < 1e-12);
        assert_eq!(m.signals.bullish, 1);
        assert_eq!(m.signals.bearish, 1);
        assert_eq!(m.signals.neutral, 2);
        assert_eq!(m.signals.bullish_hits, 1);
    }

    #[test]
    fn test_wrong_sign_forecast() {
        let preds = vec![0.02, 0.02];
        let actual = vec![-0.01, -0.03];
        let m = ValidationMetrics::compute(&preds, &actual, 0.01).unwrap();
        assert_eq!(m.directional_accuracy, 0.0);
        assert_eq!(m.signals.bullish, 2);
        assert_eq!(m.signals.bullish_hits, 0);
        assert!((m.mae - 0.035).abs() < 1e-12);
    }

    #[test]
    fn test_empty_holdout() {
        assert!(ValidationMetrics::compute(&[], &[], 0.01).is_none());
        assert!(ValidationMetrics::compute(&[0.1], &[], 0.01).is_none());
    }
}
