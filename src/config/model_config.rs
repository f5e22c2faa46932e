use super::{Lookup, parse_or};
use crate::application::ml::gradient_boosting::GbmParams;
use anyhow::Result;
use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq)]
pub struct ModelConfig {
    /// Model file; the contract is stored next to it as `<stem>_features.json`
    pub model_path: PathBuf,
    pub gbm: GbmParams,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            model_path: PathBuf::from("artifacts/final_gbm_model.json"),
            gbm: GbmParams::default(),
        }
    }
}

impl ModelConfig {
    pub fn from_lookup(lookup: Lookup<'_>) -> Result<Self> {
        let d = Self::default();
        let g = d.gbm;
        Ok(Self {
            model_path: lookup("MODEL_PATH").map(PathBuf::from).unwrap_or(d.model_path),
            gbm: GbmParams {
                max_rounds: parse_or(lookup, "GBM_MAX_ROUNDS", g.max_rounds)?,
                learning_rate: parse_or(lookup, "GBM_LEARNING_RATE", g.learning_rate)?,
                max_depth: parse_or(lookup, "GBM_MAX_DEPTH", g.max_depth)?,
                min_samples_leaf: parse_or(lookup, "GBM_MIN_SAMPLES_LEAF", g.min_samples_leaf)?,
                min_samples_split: parse_or(lookup, "GBM_MIN_SAMPLES_SPLIT", g.min_samples_split)?,
                subsample: parse_or(lookup, "GBM_SUBSAMPLE", g.subsample)?,
                subsample_freq: parse_or(lookup, "GBM_SUBSAMPLE_FREQ", g.subsample_freq)?,
                feature_fraction: parse_or(lookup, "GBM_FEATURE_FRACTION", g.feature_fraction)?,
                early_stopping_rounds: parse_or(
                    lookup,
                    "GBM_EARLY_STOPPING_ROUNDS",
                    g.early_stopping_rounds,
                )?,
                validation_fraction: parse_or(
                    lookup,
                    "GBM_VALIDATION_FRACTION",
                    g.validation_fraction,
                )?,
                seed: parse_or(lookup, "GBM_SEED", g.seed)?,
                log_every: parse_or(lookup, "GBM_LOG_EVERY", g.log_every)?,
            },
        })
    }
}
