use super::evaluation::ValidationMetrics;
use super::gradient_boosting::{GbmParams, GradientBoostedRegressor};
use super::predictor::ReturnPredictor;
use crate::domain::errors::{PipelineError, PipelineResult};
use crate::domain::ml::contract::{FeatureContract, FillPolicy};
use crate::domain::ml::feature_matrix::FeatureMatrix;
use crate::domain::ml::feature_registry::FeatureKey;
use crate::domain::ml::target::{TargetSeries, TrainingSet};
use crate::domain::trading::signal::SignalConfig;
use crate::infrastructure::persistence::model_store::ModelStore;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::{info, warn};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelMetadata {
    pub trained_at: DateTime<Utc>,
    pub training_asset: String,
    pub training_rows: usize,
    /// Sample std of the training labels
    pub target_volatility: Option<f64>,
    pub rounds: usize,
    pub train_rmse: f64,
    pub validation: Option<ValidationMetrics>,
}

/// A fitted regressor with the ordered feature names it expects.
#[derive(Debug)]
pub struct TrainedModel {
    pub artifact_id: Uuid,
    pub regressor: GradientBoostedRegressor,
    pub contract: FeatureContract,
    pub metadata: ModelMetadata,
}

#[derive(Serialize)]
struct StoredModelRef<'a> {
    regressor: &'a GradientBoostedRegressor,
    metadata: &'a ModelMetadata,
}

#[derive(Deserialize)]
struct StoredModel {
    regressor: GradientBoostedRegressor,
    metadata: ModelMetadata,
}

impl TrainedModel {
    /// The contract to score with. A model saved without feature names can
    /// still be used when the input has exactly as many columns as it was
    /// fit on, in which case the input order is trusted.
    fn resolve_contract(&self, latest: &FeatureMatrix) -> PipelineResult<FeatureContract> {
        if !self.contract.is_empty() {
            return Ok(self.contract.clone());
        }
        if latest.width() != self.regressor.n_features() {
            return Err(PipelineError::model_not_found(format!(
                "model has no feature names and input width {} differs from the {} it was fit on",
                latest.width(),
                self.regressor.n_features()
            )));
        }
        warn!(
            "Model {} has no stored feature names, using the input column order",
            self.artifact_id
        );
        let keys: Vec<FeatureKey> = latest.keys().cloned().collect();
        Ok(FeatureContract::new(&keys))
    }
}

impl ReturnPredictor for TrainedModel {
    fn predict_latest(&self, latest: &FeatureMatrix, fill: FillPolicy) -> PipelineResult<Option<f64>> {
        let contract = self.resolve_contract(latest)?;
        let Some(row) = contract.design_row(latest, fill) else {
            return Ok(None);
        };
        self.regressor.predict_row(&row).map(Some)
    }

    fn name(&self) -> &str {
        "Gradient Boosted Trees"
    }

    fn version(&self) -> String {
        self.artifact_id.to_string()
    }
}

#[derive(Debug, Clone, Copy)]
pub struct TrainOptions {
    /// Write the model and its contract to the store after fitting
    pub persist: bool,
}

impl Default for TrainOptions {
    fn default() -> Self {
        Self { persist: true }
    }
}

/// Fits, stores and serves the single active model.
pub struct ModelTrainer {
    store: ModelStore,
    params: GbmParams,
    signal_config: SignalConfig,
    model: Option<TrainedModel>,
}

impl ModelTrainer {
    pub fn new(model_path: impl Into<PathBuf>, params: GbmParams) -> Self {
        Self {
            store: ModelStore::new(model_path),
            params,
            signal_config: SignalConfig::default(),
            model: None,
        }
    }

    /// Threshold rule used when scoring the holdout
    pub fn with_signal_config(mut self, signal_config: SignalConfig) -> Self {
        self.signal_config = signal_config;
        self
    }

    pub fn store(&self) -> &ModelStore {
        &self.store
    }

    pub fn model(&self) -> Option<&TrainedModel> {
        self.model.as_ref()
    }

    /// Fits a new model on `feature_names` against `target`.
    ///
    /// Rows with a missing feature or label are dropped first; if none
    /// survive this fails with `InsufficientData` and nothing is written.
    pub fn train(
        &mut self,
        features: &FeatureMatrix,
        target: &TargetSeries,
        feature_names: &[FeatureKey],
        options: TrainOptions,
    ) -> PipelineResult<&TrainedModel> {
        let mut set = TrainingSet::assemble(features, target, feature_names)?;
        for value in set.rows.iter_mut().flatten() {
            if !value.is_finite() {
                *value = 0.0;
            }
        }

        info!(
            "Training gradient boosting on {} rows x {} features for {}",
            set.len(),
            feature_names.len(),
            target.asset()
        );
        let (regressor, report) = GradientBoostedRegressor::fit(&set.rows, &set.target, &self.params)?;

        let target_volatility = set.target_volatility();
        let threshold = self.signal_config.threshold(target_volatility);
        let validation = ValidationMetrics::compute(
            &report.validation_predictions,
            &report.validation_targets,
            threshold,
        );
        if let Some(metrics) = &validation {
            metrics.log_summary();
        }
        let rounds = regressor.n_stages();
        info!(
            "Kept {} of {} boosting rounds, train RMSE {:.6}",
            rounds,
            report.rounds_run,
            report.train_rmse
        );

        let model = TrainedModel {
            artifact_id: Uuid::new_v4(),
            regressor,
            contract: FeatureContract::new(&set.feature_names),
            metadata: ModelMetadata {
                trained_at: Utc::now(),
                training_asset: target.asset().to_string(),
                training_rows: set.len(),
                target_volatility,
                rounds,
                train_rmse: report.train_rmse,
                validation,
            },
        };

        if options.persist {
            Self::persist(&self.store, &model)?;
        }
        Ok(self.model.insert(model))
    }

    /// Forecast for the last row of `latest`, loading the stored model on
    /// first use.
    pub fn predict(&mut self, latest: &FeatureMatrix, fill: FillPolicy) -> PipelineResult<Option<f64>> {
        self.loaded()?.predict_latest(latest, fill)
    }

    /// The active model, loaded from the store if none is in memory.
    pub fn loaded(&mut self) -> PipelineResult<&TrainedModel> {
        if self.model.is_none() {
            self.load_model()?;
        }
        self.model
            .as_ref()
            .ok_or_else(|| PipelineError::model_not_found("no model loaded"))
    }

    pub fn load_model(&mut self) -> PipelineResult<&TrainedModel> {
        let (artifact_id, stored, contract) = self.store.load::<StoredModel>()?;
        let model = TrainedModel {
            artifact_id,
            regressor: stored.regressor,
            contract,
            metadata: stored.metadata,
        };
        info!(
            "{} {} trained on {} at {} ({} features)",
            model.name(),
            model.version(),
            model.metadata.training_asset,
            model.metadata.trained_at,
            model.contract.len()
        );
        Ok(self.model.insert(model))
    }

    pub fn save_model(&self) -> PipelineResult<()> {
        let model = self
            .model
            .as_ref()
            .ok_or_else(|| PipelineError::model_not_found("no trained model to save"))?;
        Self::persist(&self.store, model)
    }

    fn persist(store: &ModelStore, model: &TrainedModel) -> PipelineResult<()> {
        let stored = StoredModelRef {
            regressor: &model.regressor,
            metadata: &model.metadata,
        };
        store.save(model.artifact_id, &stored, &model.contract)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ml::feature_matrix::FeatureColumn;
    use crate::domain::ml::feature_registry::Indicator;
    use tempfile::TempDir;

    fn params() -> GbmParams {
        GbmParams {
            max_rounds: 40,
            learning_rate: 0.2,
            min_samples_leaf: 2,
            min_samples_split: 4,
            early_stopping_rounds: 10,
            ..GbmParams::default()
        }
    }

    fn dataset(n: usize) -> (FeatureMatrix, TargetSeries, Vec<FeatureKey>) {
        let index: Vec<i64> = (0..n as i64).collect();
        let close: Vec<Option<f64>> = (0..n)
            .map(|i| Some(100.0 + (i as f64 * 0.4).sin() * 3.0 + i as f64 * 0.05))
            .collect();
        let rsi: Vec<Option<f64>> = (0..n).map(|i| Some(((i * 13) % 100) as f64)).collect();
        let keys = vec![
            FeatureKey::asset("BTCUSDT", Indicator::Close),
            FeatureKey::asset("BTCUSDT", Indicator::Rsi(14)),
        ];
        let matrix = FeatureMatrix::from_columns(
            index.clone(),
            vec![
                FeatureColumn::new(keys[0].clone(), close.clone()),
                FeatureColumn::new(keys[1].clone(), rsi),
            ],
        )
        .unwrap();
        let target = TargetSeries::from_close("BTCUSDT", &index, &close);
        (matrix, target, keys)
    }

    #[test]
    fn test_train_then_predict_in_memory() {
        let dir = TempDir::new().unwrap();
        let (matrix, target, keys) = dataset(120);
        let mut trainer = ModelTrainer::new(dir.path().join("model.json"), params());

        let model = trainer
            .train(&matrix, &target, &keys, TrainOptions { persist: false })
            .unwrap();
        assert_eq!(model.contract.names(), &["BTCUSDT_close", "BTCUSDT_rsi14"]);
        assert_eq!(model.metadata.training_rows, 119);
        assert!(!trainer.store().exists());

        let forecast = trainer.predict(&matrix, FillPolicy::Zero).unwrap();
        assert!(forecast.unwrap().is_finite());
    }

    #[test]
    fn test_saved_model_predicts_identically_after_reload() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("model.json");
        let (matrix, target, keys) = dataset(120);

        let mut trainer = ModelTrainer::new(&path, params());
        trainer.train(&matrix, &target, &keys, TrainOptions::default()).unwrap();
        let before = trainer.predict(&matrix, FillPolicy::Zero).unwrap();

        let mut fresh = ModelTrainer::new(&path, params());
        let after = fresh.predict(&matrix, FillPolicy::Zero).unwrap();
        assert_eq!(before, after);
        assert_eq!(
            fresh.model().unwrap().version(),
            trainer.model().unwrap().artifact_id.to_string()
        );
        let reloaded = fresh.model().unwrap();
        assert_eq!(reloaded.regressor.n_stages(), reloaded.metadata.rounds);
    }

    #[test]
    fn test_predict_without_model_is_model_not_found() {
        let dir = TempDir::new().unwrap();
        let (matrix, _, _) = dataset(10);
        let mut trainer = ModelTrainer::new(dir.path().join("absent.json"), params());
        let err = trainer.predict(&matrix, FillPolicy::Zero).unwrap_err();
        assert_eq!(err.kind(), "ModelNotFound");
    }

    #[test]
    fn test_all_rows_dropped_writes_nothing() {
        let dir = TempDir::new().unwrap();
        let index: Vec<i64> = (0..5).collect();
        let key = FeatureKey::asset("BTCUSDT", Indicator::Rsi(14));
        let matrix =
            FeatureMatrix::from_columns(index.clone(), vec![FeatureColumn::new(key.clone(), vec![None; 5])])
                .unwrap();
        let target = TargetSeries::from_close("BTCUSDT", &index, &[Some(1.0); 5]);

        let mut trainer = ModelTrainer::new(dir.path().join("model.json"), params());
        let err = trainer
            .train(&matrix, &target, &[key], TrainOptions::default())
            .unwrap_err();
        assert_eq!(err.kind(), "InsufficientData");
        assert!(!trainer.store().model_path().exists());
        assert!(!trainer.store().contract_path().exists());
    }

    #[test]
    fn test_empty_contract_falls_back_to_input_order() {
        let dir = TempDir::new().unwrap();
        let (matrix, target, keys) = dataset(60);
        let mut trainer = ModelTrainer::new(dir.path().join("model.json"), params());
        trainer
            .train(&matrix, &target, &keys, TrainOptions { persist: false })
            .unwrap();
        let mut model = trainer.model.take().unwrap();
        model.contract = FeatureContract::default();

        assert!(model.predict_latest(&matrix, FillPolicy::Zero).unwrap().is_some());

        let narrow = FeatureMatrix::from_columns(
            matrix.index().to_vec(),
            vec![matrix.columns()[0].clone()],
        )
        .unwrap();
        let err = model.predict_latest(&narrow, FillPolicy::Zero).unwrap_err();
        assert_eq!(err.kind(), "ModelNotFound");
    }
}
