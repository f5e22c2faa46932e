use super::feature_matrix::FeatureMatrix;
use super::feature_registry::FeatureKey;
use crate::domain::errors::{PipelineError, PipelineResult};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// How a missing value in the latest row is resolved at prediction time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FillPolicy {
    /// Missing values become zero
    #[default]
    Zero,
    /// Carry the last present value forward first, zero if there is none
    ForwardFill,
}

/// Ordered feature names a model was fit on.
///
/// Stored in string form since this is the model/storage boundary.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct FeatureContract {
    names: Vec<String>,
}

impl FeatureContract {
    pub fn new(keys: &[FeatureKey]) -> Self {
        Self {
            names: keys.iter().map(|k| k.to_string()).collect(),
        }
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// The asset whose prefix the asset-scoped names carry, if exactly one.
    pub fn training_asset(&self) -> Option<String> {
        let mut asset: Option<String> = None;
        for name in &self.names {
            let Ok(key) = name.parse::<FeatureKey>() else {
                continue;
            };
            if let Some(a) = key.asset_name() {
                match &asset {
                    None => asset = Some(a.to_string()),
                    Some(existing) if existing != a => return None,
                    Some(_) => {}
                }
            }
        }
        asset
    }

    /// Re-attributes `from_asset`'s columns to the training asset and checks
    /// that the result covers every contract column.
    pub fn adapt(&self, matrix: &FeatureMatrix, from_asset: &str) -> PipelineResult<FeatureMatrix> {
        let target_asset = self
            .training_asset()
            .unwrap_or_else(|| from_asset.to_string());
        let renamed = matrix.renamed_asset(from_asset, &target_asset);

        let present: Vec<String> = renamed.keys().map(|k| k.to_string()).collect();
        let missing: Vec<String> = self
            .names
            .iter()
            .filter(|name| !present.contains(name))
            .cloned()
            .collect();
        if !missing.is_empty() {
            return Err(PipelineError::ContractMismatch { missing });
        }
        Ok(renamed)
    }

    /// Latest-row input vector in contract order.
    ///
    /// Columns absent from the matrix and missing cells are filled with zero
    /// (after forward filling, when asked). `None` when the matrix has no rows.
    pub fn design_row(&self, matrix: &FeatureMatrix, fill: FillPolicy) -> Option<Vec<f64>> {
        if matrix.is_empty() {
            return None;
        }
        let last = matrix.len() - 1;
        let by_name: HashMap<String, &[Option<f64>]> = matrix
            .columns()
            .iter()
            .map(|c| (c.key.to_string(), c.values.as_slice()))
            .collect();

        let row = self
            .names
            .iter()
            .map(|name| match by_name.get(name) {
                None => 0.0,
                Some(values) => match (values[last], fill) {
                    (Some(v), _) => v,
                    (None, FillPolicy::ForwardFill) => {
                        values.iter().rev().find_map(|v| *v).unwrap_or(0.0)
                    }
                    (None, FillPolicy::Zero) => 0.0,
                },
            })
            .collect();
        Some(row)
    }
}
