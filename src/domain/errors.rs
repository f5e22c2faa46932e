use thiserror::Error;

/// Errors raised by the forecasting pipeline stages.
///
/// Per-asset variants (`FeatureGap`, `DataUnavailable` for one symbol) are
/// isolated by batch callers; the end-to-end entry points convert every
/// variant into a structured failure instead of propagating it.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Data unavailable for {asset}: {reason}")]
    DataUnavailable { asset: String, reason: String },

    #[error("Feature gap for {asset}: missing column {column}")]
    FeatureGap { asset: String, column: String },

    #[error("Model not found: {reason}")]
    ModelNotFound { reason: String },

    #[error("Insufficient data: {reason}")]
    InsufficientData { reason: String },

    #[error("Feature contract not covered, missing {missing:?}")]
    ContractMismatch { missing: Vec<String> },

    #[error("Training failed: {reason}")]
    Training { reason: String },

    #[error("Persistence error at {path}: {reason}")]
    Persistence { path: String, reason: String },

    #[error("Invalid configuration: {reason}")]
    InvalidConfig { reason: String },
}

impl PipelineError {
    /// Stable machine-readable name of the variant, used in failure payloads.
    pub fn kind(&self) -> &'static str {
        match self {
            PipelineError::DataUnavailable { .. } => "DataUnavailable",
            PipelineError::FeatureGap { .. } => "FeatureGap",
            PipelineError::ModelNotFound { .. } => "ModelNotFound",
            PipelineError::InsufficientData { .. } => "InsufficientData",
            PipelineError::ContractMismatch { .. } => "ContractMismatch",
            PipelineError::Training { .. } => "Training",
            PipelineError::Persistence { .. } => "Persistence",
            PipelineError::InvalidConfig { .. } => "InvalidConfig",
        }
    }

    pub fn data_unavailable(asset: impl Into<String>, reason: impl Into<String>) -> Self {
        PipelineError::DataUnavailable {
            asset: asset.into(),
            reason: reason.into(),
        }
    }

    pub fn insufficient(reason: impl Into<String>) -> Self {
        PipelineError::InsufficientData {
            reason: reason.into(),
        }
    }

    pub fn model_not_found(reason: impl Into<String>) -> Self {
        PipelineError::ModelNotFound {
            reason: reason.into(),
        }
    }

    pub fn invalid_config(reason: impl Into<String>) -> Self {
        PipelineError::InvalidConfig {
            reason: reason.into(),
        }
    }

    pub fn persistence(path: &std::path::Path, reason: impl ToString) -> Self {
        PipelineError::Persistence {
            path: path.display().to_string(),
            reason: reason.to_string(),
        }
    }
}

pub type PipelineResult<T> = Result<T, PipelineError>;
