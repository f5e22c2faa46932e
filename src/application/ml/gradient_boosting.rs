//! Gradient-boosted regression trees on top of smartcore's decision tree.
//!
//! Squared-error boosting: start from the mean label, then repeatedly fit a
//! shallow tree to the current residuals and add it with shrinkage. Rows are
//! re-bagged every `subsample_freq` rounds and each tree sees a random
//! subset of the columns. The validation rows are the chronological tail of
//! the input, never a shuffled sample, and the ensemble is cut back to the
//! round with the best validation RMSE.

use crate::domain::errors::{PipelineError, PipelineResult};
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::index::sample;
use serde::{Deserialize, Serialize};
use smartcore::linalg::basic::matrix::DenseMatrix;
use smartcore::tree::decision_tree_regressor::{
    DecisionTreeRegressor, DecisionTreeRegressorParameters,
};
use tracing::{debug, info};

type Tree = DecisionTreeRegressor<f64, f64, DenseMatrix<f64>, Vec<f64>>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GbmParams {
    /// Upper bound on boosting rounds
    pub max_rounds: usize,
    pub learning_rate: f64,
    pub max_depth: u16,
    pub min_samples_leaf: usize,
    pub min_samples_split: usize,
    /// Fraction of training rows drawn for each bag
    pub subsample: f64,
    /// Re-draw the bag every this many rounds
    pub subsample_freq: usize,
    /// Fraction of columns each tree is fit on
    pub feature_fraction: f64,
    /// Stop after this many rounds without validation improvement
    pub early_stopping_rounds: usize,
    /// Size of the chronological validation tail
    pub validation_fraction: f64,
    pub seed: u64,
    /// Log training progress every this many rounds
    pub log_every: usize,
}

impl Default for GbmParams {
    fn default() -> Self {
        Self {
            max_rounds: 1000,
            learning_rate: 0.05,
            max_depth: 4,
            min_samples_leaf: 10,
            min_samples_split: 20,
            subsample: 0.8,
            subsample_freq: 5,
            feature_fraction: 0.8,
            early_stopping_rounds: 50,
            validation_fraction: 0.2,
            seed: 42,
            log_every: 100,
        }
    }
}

impl GbmParams {
    pub fn validate(&self) -> PipelineResult<()> {
        let fraction_ok = |f: f64| f > 0.0 && f <= 1.0;
        if self.max_rounds == 0 {
            return Err(PipelineError::invalid_config("max_rounds must be > 0"));
        }
        if self.early_stopping_rounds == 0 {
            return Err(PipelineError::invalid_config(
                "early_stopping_rounds must be > 0",
            ));
        }
        if !(self.learning_rate > 0.0 && self.learning_rate.is_finite()) {
            return Err(PipelineError::invalid_config("learning_rate must be > 0"));
        }
        if !fraction_ok(self.subsample) || !fraction_ok(self.feature_fraction) {
            return Err(PipelineError::invalid_config(
                "subsample and feature_fraction must be in (0, 1]",
            ));
        }
        if !(0.0..1.0).contains(&self.validation_fraction) {
            return Err(PipelineError::invalid_config(
                "validation_fraction must be in [0, 1)",
            ));
        }
        Ok(())
    }

    fn tree_parameters(&self) -> DecisionTreeRegressorParameters {
        DecisionTreeRegressorParameters::default()
            .with_max_depth(self.max_depth)
            .with_min_samples_leaf(self.min_samples_leaf)
            .with_min_samples_split(self.min_samples_split)
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct Stage {
    /// Input columns this tree was fit on, in order
    columns: Vec<usize>,
    tree: Tree,
}

/// Outcome of one fit, used for logging and model metadata
#[derive(Debug, Clone, PartialEq)]
pub struct FitReport {
    pub rounds_run: usize,
    pub best_round: usize,
    pub train_rmse: f64,
    pub validation_rmse: Option<f64>,
    /// Final-model predictions on the validation tail
    pub validation_predictions: Vec<f64>,
    pub validation_targets: Vec<f64>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct GradientBoostedRegressor {
    base_score: f64,
    learning_rate: f64,
    n_features: usize,
    stages: Vec<Stage>,
}

impl GradientBoostedRegressor {
    /// Fits on rows in chronological order; the last `validation_fraction`
    /// of them are held out for early stopping.
    pub fn fit(x: &[Vec<f64>], y: &[f64], params: &GbmParams) -> PipelineResult<(Self, FitReport)> {
        params.validate()?;
        if x.is_empty() || x.len() != y.len() {
            return Err(PipelineError::insufficient(format!(
                "{} feature rows for {} labels",
                x.len(),
                y.len()
            )));
        }
        let n_features = x[0].len();
        if n_features == 0 || x.iter().any(|row| row.len() != n_features) {
            return Err(PipelineError::insufficient(
                "feature rows must be non-empty and of equal width",
            ));
        }

        let n = x.len();
        let mut n_valid = (n as f64 * params.validation_fraction).floor() as usize;
        if n - n_valid < 2 {
            n_valid = 0;
        }
        let n_train = n - n_valid;
        let (x_train, x_valid) = x.split_at(n_train);
        let (y_train, y_valid) = y.split_at(n_train);

        let base_score = y_train.iter().sum::<f64>() / n_train as f64;
        let mut model = Self {
            base_score,
            learning_rate: params.learning_rate,
            n_features,
            stages: Vec::new(),
        };

        let mut train_pred = vec![base_score; n_train];
        let mut valid_pred = vec![base_score; n_valid];
        let mut best_rmse = f64::INFINITY;
        let mut best_round = 0;

        let mut rng = StdRng::seed_from_u64(params.seed);
        let bag_size = ((n_train as f64 * params.subsample).round() as usize).clamp(1, n_train);
        let column_count =
            ((n_features as f64 * params.feature_fraction).ceil() as usize).clamp(1, n_features);
        let mut bag: Vec<usize> = (0..n_train).collect();

        let mut rounds_run = 0;
        for round in 0..params.max_rounds {
            if bag_size < n_train && round % params.subsample_freq.max(1) == 0 {
                bag = sample(&mut rng, n_train, bag_size).into_vec();
                bag.sort_unstable();
            }
            let mut columns = if column_count < n_features {
                sample(&mut rng, n_features, column_count).into_vec()
            } else {
                (0..n_features).collect()
            };
            columns.sort_unstable();

            let bag_rows: Vec<Vec<f64>> = bag.iter().map(|&i| project(&x_train[i], &columns)).collect();
            let residuals: Vec<f64> = bag.iter().map(|&i| y_train[i] - train_pred[i]).collect();
            let tree = Tree::fit(&to_matrix(&bag_rows)?, &residuals, params.tree_parameters())
                .map_err(|e| PipelineError::Training {
                    reason: format!("round {}: {}", round, e),
                })?;

            let stage = Stage { columns, tree };
            for (pred, update) in train_pred.iter_mut().zip(stage.predict(x_train)?) {
                *pred += params.learning_rate * update;
            }
            model.stages.push(stage);
            rounds_run = round + 1;

            if n_valid == 0 {
                best_round = rounds_run;
                continue;
            }

            let Some(stage) = model.stages.last() else {
                continue;
            };
            for (pred, update) in valid_pred.iter_mut().zip(stage.predict(x_valid)?) {
                *pred += params.learning_rate * update;
            }
            let valid_rmse = rmse(&valid_pred, y_valid);
            if valid_rmse < best_rmse {
                best_rmse = valid_rmse;
                best_round = rounds_run;
            }

            if params.log_every > 0 && rounds_run % params.log_every == 0 {
                debug!(
                    "[{}] train rmse: {:.6}  valid rmse: {:.6}",
                    rounds_run,
                    rmse(&train_pred, y_train),
                    valid_rmse
                );
            }
            if rounds_run - best_round >= params.early_stopping_rounds {
                info!(
                    "Early stopping at round {}, best round {} (valid rmse {:.6})",
                    rounds_run, best_round, best_rmse
                );
                break;
            }
        }

        model.stages.truncate(best_round);
        let train_rmse = rmse(&model.predict(x_train)?, y_train);
        let validation_predictions = if n_valid > 0 {
            model.predict(x_valid)?
        } else {
            Vec::new()
        };
        let validation_rmse =
            (n_valid > 0).then(|| rmse(&validation_predictions, y_valid));

        let report = FitReport {
            rounds_run,
            best_round,
            train_rmse,
            validation_rmse,
            validation_predictions,
            validation_targets: y_valid.to_vec(),
        };
        Ok((model, report))
    }

    pub fn predict(&self, rows: &[Vec<f64>]) -> PipelineResult<Vec<f64>> {
        if let Some(row) = rows.iter().find(|r| r.len() != self.n_features) {
            return Err(PipelineError::insufficient(format!(
                "model expects {} features, got {}",
                self.n_features,
                row.len()
            )));
        }
        let mut out = vec![self.base_score; rows.len()];
        if rows.is_empty() {
            return Ok(out);
        }
        for stage in &self.stages {
            for (pred, update) in out.iter_mut().zip(stage.predict(rows)?) {
                *pred += self.learning_rate * update;
            }
        }
        Ok(out)
    }

    pub fn predict_row(&self, row: &[f64]) -> PipelineResult<f64> {
        let predictions = self.predict(&[row.to_vec()])?;
        predictions
            .first()
            .copied()
            .ok_or_else(|| PipelineError::insufficient("no prediction returned"))
    }

    pub fn n_features(&self) -> usize {
        self.n_features
    }

    pub fn n_stages(&self) -> usize {
        self.stages.len()
    }
}

impl Stage {
    fn predict(&self, rows: &[Vec<f64>]) -> PipelineResult<Vec<f64>> {
        let projected: Vec<Vec<f64>> = rows.iter().map(|r| project(r, &self.columns)).collect();
        self.tree
            .predict(&to_matrix(&projected)?)
            .map_err(|e| PipelineError::Training {
                reason: format!("tree prediction failed: {}", e),
            })
    }
}

fn project(row: &[f64], columns: &[usize]) -> Vec<f64> {
    columns.iter().map(|&c| row[c]).collect()
}

fn to_matrix(rows: &[Vec<f64>]) -> PipelineResult<DenseMatrix<f64>> {
    DenseMatrix::from_2d_vec(&rows.to_vec()).map_err(|e| PipelineError::Training {
        reason: format!("matrix error: {}", e),
    })
}

pub fn rmse(predictions: &[f64], targets: &[f64]) -> f64 {
    if predictions.is_empty() {
        return 0.0;
    }
    let sq_err: f64 = predictions
        .iter()
        .zip(targets)
        .map(|(p, t)| (p - t).powi(2))
        .sum();
    (sq_err / predictions.len() as f64).sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn linear_data(n: usize) -> (Vec<Vec<f64>>, Vec<f64>) {
        let x: Vec<Vec<f64>> = (0..n)
            .map(|i| {
                let a = (i as f64 * 0.37).sin();
                let b = (i as f64 * 0.11).cos();
                vec![a, b, (i % 7) as f64]
            })
            .collect();
        let y = x.iter().map(|r| 0.03 * r[0] - 0.01 * r[1]).collect();
        (x, y)
    }

    fn fast_params() -> GbmParams {
        GbmParams {
            max_rounds: 60,
            learning_rate: 0.2,
            min_samples_leaf: 3,
            min_samples_split: 6,
            early_stopping_rounds: 10,
            ..GbmParams::default()
        }
    }

    #[test]
    fn test_fit_beats_mean_baseline() {
        let (x, y) = linear_data(200);
        let (model, report) = GradientBoostedRegressor::fit(&x, &y, &fast_params()).unwrap();

        let mean = y[..160].iter().sum::<f64>() / 160.0;
        let baseline = rmse(&vec![mean; 40], &y[160..]);
        assert!(report.validation_rmse.unwrap() < baseline);
        assert_eq!(report.validation_targets.len(), 40);
        assert_eq!(model.n_stages(), report.best_round);
        assert!(report.best_round <= report.rounds_run);
    }

    #[test]
    fn test_fit_is_deterministic_for_seed() {
        let (x, y) = linear_data(120);
        let (a, _) = GradientBoostedRegressor::fit(&x, &y, &fast_params()).unwrap();
        let (b, _) = GradientBoostedRegressor::fit(&x, &y, &fast_params()).unwrap();
        assert_eq!(a.predict(&x).unwrap(), b.predict(&x).unwrap());
    }

    #[test]
    fn test_tiny_set_trains_without_validation() {
        let x = vec![vec![1.0], vec![2.0]];
        let y = vec![0.01, 0.02];
        let (model, report) = GradientBoostedRegressor::fit(&x, &y, &fast_params()).unwrap();
        assert_eq!(report.validation_rmse, None);
        assert_eq!(model.n_stages(), 60);
    }

    #[test]
    fn test_rejects_empty_and_ragged_input() {
        assert!(GradientBoostedRegressor::fit(&[], &[], &fast_params()).is_err());
        let ragged = vec![vec![1.0, 2.0], vec![1.0]];
        assert!(GradientBoostedRegressor::fit(&ragged, &[0.0, 0.0], &fast_params()).is_err());
    }

    #[test]
    fn test_predict_checks_width() {
        let (x, y) = linear_data(50);
        let (model, _) = GradientBoostedRegressor::fit(&x, &y, &fast_params()).unwrap();
        assert!(model.predict_row(&[1.0]).is_err());
        assert!(model.predict_row(&x[0]).is_ok());
    }

    #[test]
    fn test_params_validation() {
        let params = GbmParams {
            subsample: 0.0,
            ..GbmParams::default()
        };
        assert!(params.validate().is_err());
        let no_patience = GbmParams {
            early_stopping_rounds: 0,
            ..GbmParams::default()
        };
        assert_eq!(no_patience.validate().unwrap_err().kind(), "InvalidConfig");
        assert!(GbmParams::default().validate().is_ok());
    }
}
