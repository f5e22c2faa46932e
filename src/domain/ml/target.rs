//! Supervised label construction.
//!
//! The label attached to row `t` is the log return realised between `t` and
//! `t + 1`. It depends on the close at `t` and `t + 1` only; the last row has
//! no future close and therefore no label.

use super::feature_matrix::FeatureMatrix;
use super::feature_registry::{FeatureKey, Indicator};
use crate::domain::errors::{PipelineError, PipelineResult};
use statrs::statistics::{Data, Distribution};

#[derive(Debug, Clone, PartialEq)]
pub struct TargetSeries {
    asset: String,
    index: Vec<i64>,
    values: Vec<Option<f64>>,
}

impl TargetSeries {
    /// One-step-ahead log return of `close`, aligned to `index`.
    pub fn from_close(asset: &str, index: &[i64], close: &[Option<f64>]) -> Self {
        let log_close = |v: Option<f64>| v.filter(|p| *p > 0.0).map(f64::ln);
        let values = (0..close.len())
            .map(|t| {
                let next = close.get(t + 1).copied().flatten();
                Some(log_close(next)? - log_close(close[t])?)
            })
            .collect();

        Self {
            asset: asset.to_string(),
            index: index.to_vec(),
            values,
        }
    }

    /// Builds the target from the `<asset>_close` column of a feature matrix.
    pub fn from_matrix(matrix: &FeatureMatrix, asset: &str) -> PipelineResult<Self> {
        let key = FeatureKey::asset(asset, Indicator::Close);
        let close = matrix.column(&key).ok_or_else(|| PipelineError::FeatureGap {
            asset: asset.to_string(),
            column: key.to_string(),
        })?;
        Ok(Self::from_close(asset, matrix.index(), close))
    }

    pub fn asset(&self) -> &str {
        &self.asset
    }

    pub fn index(&self) -> &[i64] {
        &self.index
    }

    pub fn values(&self) -> &[Option<f64>] {
        &self.values
    }

    /// Sample standard deviation of the defined labels
    pub fn volatility(&self) -> Option<f64> {
        sample_std(self.values.iter().filter_map(|v| *v).collect())
    }
}

/// Features joined with the target, restricted to complete rows.
#[derive(Debug, Clone, PartialEq)]
pub struct TrainingSet {
    pub feature_names: Vec<FeatureKey>,
    pub index: Vec<i64>,
    pub rows: Vec<Vec<f64>>,
    pub target: Vec<f64>,
}

impl TrainingSet {
    /// Joins `feature_names` columns of `features` with `target` and drops
    /// every row with a missing feature or label. This removes indicator
    /// warm-up rows and the final, unlabeled row.
    pub fn assemble(
        features: &FeatureMatrix,
        target: &TargetSeries,
        feature_names: &[FeatureKey],
    ) -> PipelineResult<Self> {
        if features.index() != target.index() {
            return Err(PipelineError::insufficient(
                "target series is not aligned with the feature index",
            ));
        }
        if feature_names.is_empty() {
            return Err(PipelineError::insufficient("no feature columns selected"));
        }

        let columns = feature_names
            .iter()
            .map(|key| {
                features.column(key).ok_or_else(|| PipelineError::FeatureGap {
                    asset: key
                        .asset_name()
                        .unwrap_or(super::feature_registry::SHARED_PREFIX)
                        .to_string(),
                    column: key.to_string(),
                })
            })
            .collect::<PipelineResult<Vec<_>>>()?;

        let mut index = Vec::new();
        let mut rows = Vec::new();
        let mut labels = Vec::new();
        for (t, label) in target.values().iter().enumerate() {
            let Some(label) = label else { continue };
            let row: Option<Vec<f64>> = columns.iter().map(|c| c[t]).collect();
            if let Some(row) = row {
                index.push(features.index()[t]);
                rows.push(row);
                labels.push(*label);
            }
        }

        if rows.is_empty() {
            return Err(PipelineError::insufficient(format!(
                "no complete rows for {} after dropping missing values",
                target.asset()
            )));
        }

        Ok(Self {
            feature_names: feature_names.to_vec(),
            index,
            rows,
            target: labels,
        })
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Sample standard deviation of the labels that survived the join
    pub fn target_volatility(&self) -> Option<f64> {
        sample_std(self.target.clone())
    }
}

fn sample_std(values: Vec<f64>) -> Option<f64> {
    if values.len() < 2 {
        return None;
    }
    Data::new(values).std_dev().filter(|s| s.is_finite())
}
