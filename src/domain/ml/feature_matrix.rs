use super::feature_registry::FeatureKey;
use crate::domain::errors::{PipelineError, PipelineResult};
use std::collections::HashSet;

#[derive(Debug, Clone, PartialEq)]
pub struct FeatureColumn {
    pub key: FeatureKey,
    pub values: Vec<Option<f64>>,
}

impl FeatureColumn {
    pub fn new(key: FeatureKey, values: Vec<Option<f64>>) -> Self {
        Self { key, values }
    }
}

/// Model-ready feature table: a timestamp index and ordered, uniquely keyed
/// columns of equal length. Immutable once built; renaming yields a new matrix.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FeatureMatrix {
    index: Vec<i64>,
    columns: Vec<FeatureColumn>,
}

impl FeatureMatrix {
    pub fn from_columns(index: Vec<i64>, columns: Vec<FeatureColumn>) -> PipelineResult<Self> {
        let mut seen = HashSet::with_capacity(columns.len());
        for column in &columns {
            if column.values.len() != index.len() {
                return Err(PipelineError::insufficient(format!(
                    "column {} has {} rows, index has {}",
                    column.key,
                    column.values.len(),
                    index.len()
                )));
            }
            if !seen.insert(&column.key) {
                return Err(PipelineError::insufficient(format!(
                    "duplicate feature column {}",
                    column.key
                )));
            }
        }
        Ok(Self { index, columns })
    }

    pub fn index(&self) -> &[i64] {
        &self.index
    }

    /// Number of rows
    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    pub fn width(&self) -> usize {
        self.columns.len()
    }

    pub fn columns(&self) -> &[FeatureColumn] {
        &self.columns
    }

    pub fn keys(&self) -> impl Iterator<Item = &FeatureKey> {
        self.columns.iter().map(|c| &c.key)
    }

    pub fn contains(&self, key: &FeatureKey) -> bool {
        self.columns.iter().any(|c| &c.key == key)
    }

    pub fn column(&self, key: &FeatureKey) -> Option<&[Option<f64>]> {
        self.columns
            .iter()
            .find(|c| &c.key == key)
            .map(|c| c.values.as_slice())
    }

    /// Most recent present value of a column
    pub fn last_value(&self, key: &FeatureKey) -> Option<f64> {
        self.column(key)?.iter().rev().find_map(|v| *v)
    }

    /// Distinct asset names, in column order
    pub fn assets(&self) -> Vec<&str> {
        let mut assets: Vec<&str> = Vec::new();
        for key in self.keys() {
            if let Some(asset) = key.asset_name()
                && !assets.contains(&asset)
            {
                assets.push(asset);
            }
        }
        assets
    }

    /// Columns one model may be trained on when it must generalise across
    /// assets: the asset's own columns plus every shared column.
    pub fn contract_columns_for(&self, asset: &str) -> Vec<FeatureKey> {
        self.keys()
            .filter(|k| k.belongs_to(asset) || k.is_shared())
            .cloned()
            .collect()
    }

    /// The `from` asset's columns re-attributed to `to`, together with the
    /// shared columns. Other assets' columns are left out.
    pub fn renamed_asset(&self, from: &str, to: &str) -> FeatureMatrix {
        let columns = self
            .columns
            .iter()
            .filter(|c| c.key.belongs_to(from) || c.key.is_shared())
            .map(|c| FeatureColumn::new(c.key.with_asset(to), c.values.clone()))
            .collect();
        FeatureMatrix {
            index: self.index.clone(),
            columns,
        }
    }

    /// Column-concatenates blocks built on the same index.
    pub fn concat(index: Vec<i64>, blocks: Vec<FeatureMatrix>) -> PipelineResult<Self> {
        let mut columns = Vec::new();
        for block in blocks {
            if block.index != index {
                return Err(PipelineError::insufficient(
                    "feature blocks are not aligned on the same index",
                ));
            }
            columns.extend(block.columns);
        }
        Self::from_columns(index, columns)
    }
}
