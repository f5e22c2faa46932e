use crate::domain::errors::PipelineResult;
use crate::domain::ml::contract::FillPolicy;
use crate::domain::ml::feature_matrix::FeatureMatrix;

/// Interface for fitted next-period return models
pub trait ReturnPredictor: Send + Sync {
    /// Forecast log return for the row after the last row of `latest`.
    /// `Ok(None)` when `latest` has no rows.
    fn predict_latest(&self, latest: &FeatureMatrix, fill: FillPolicy) -> PipelineResult<Option<f64>>;

    /// Get model name/type
    fn name(&self) -> &str;

    /// Identifier of the fitted artifact
    fn version(&self) -> String;
}
