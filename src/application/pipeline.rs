//! End-to-end runs: ingest, build features, train or load, predict, signal.

use crate::application::features::{FeatureBuilder, FeatureInputs};
use crate::application::ml::model_trainer::{ModelMetadata, ModelTrainer, TrainOptions};
use crate::config::PipelineConfig;
use crate::domain::errors::{PipelineError, PipelineResult};
use crate::domain::market::price_frame::PriceFrame;
use crate::domain::market::timeframe::Frequency;
use crate::domain::ml::contract::{FeatureContract, FillPolicy};
use crate::domain::ml::feature_matrix::FeatureMatrix;
use crate::domain::ml::feature_registry::{FeatureKey, Indicator};
use crate::domain::ml::target::TargetSeries;
use crate::domain::ports::PriceSource;
use crate::domain::trading::signal::{Direction, Signal, SignalInputs, generate_signal};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info, warn};

/// One asset's call in the shape the CLI prints
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalReport {
    pub ticker: String,
    pub direction: Direction,
    pub predicted_return: f64,
    pub predicted_pct: f64,
    pub volatility: f64,
    pub threshold: f64,
    pub current_price: f64,
    pub predicted_price: f64,
    pub stop_loss: Option<f64>,
    pub take_profit: Option<f64>,
}

impl From<&Signal> for SignalReport {
    fn from(signal: &Signal) -> Self {
        Self {
            ticker: signal.asset.clone(),
            direction: signal.direction,
            predicted_return: signal.predicted_return,
            predicted_pct: signal.predicted_return * 100.0,
            volatility: signal.volatility,
            threshold: signal.threshold,
            current_price: signal.price,
            predicted_price: signal.predicted_price(),
            stop_loss: signal.stop_loss,
            take_profit: signal.take_profit,
        }
    }
}

/// Result of a single-asset run. Errors never escape a run; they become
/// `Failed` with the error kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RunOutcome {
    Success(SignalReport),
    Failed { error: String, kind: String },
}

impl RunOutcome {
    pub fn failed(err: &PipelineError) -> Self {
        RunOutcome::Failed {
            error: err.to_string(),
            kind: err.kind().to_string(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, RunOutcome::Success(_))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssetFailure {
    pub asset: String,
    pub error: String,
    pub kind: String,
}

/// Signals for every configured asset, best forecast first
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionReport {
    pub generated_at: DateTime<Utc>,
    pub model_id: String,
    pub training_asset: String,
    pub signals: Vec<SignalReport>,
    /// Top-ranked signal, only when it is bullish
    pub best_pick: Option<SignalReport>,
    pub failures: Vec<AssetFailure>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingSummary {
    pub model_id: String,
    pub model_path: String,
    pub feature_count: usize,
    pub metadata: ModelMetadata,
}

/// Frames fetched for one run
struct MarketInputs {
    daily: PriceFrame,
    weekly: Option<PriceFrame>,
    intraday: Option<PriceFrame>,
    exogenous: Option<PriceFrame>,
}

impl MarketInputs {
    fn feature_inputs(&self) -> FeatureInputs<'_> {
        FeatureInputs {
            daily: &self.daily,
            weekly: self.weekly.as_ref(),
            intraday: self.intraday.as_ref(),
            exogenous: self.exogenous.as_ref(),
        }
    }
}

pub struct Pipeline {
    config: PipelineConfig,
    source: Arc<dyn PriceSource>,
    builder: FeatureBuilder,
    trainer: ModelTrainer,
}

impl Pipeline {
    pub fn new(config: PipelineConfig, source: Arc<dyn PriceSource>) -> Self {
        let builder = FeatureBuilder::new(config.features.clone());
        let trainer = new_trainer(&config);
        Self {
            config,
            source,
            builder,
            trainer,
        }
    }

    pub fn trainer(&self) -> &ModelTrainer {
        &self.trainer
    }

    /// Trains on `asset` alone and forecasts its next period.
    ///
    /// The fitted model lives only for this run: neither the stored artifact
    /// nor the model held for batch prediction is touched. σ for the
    /// threshold is the std of the training target.
    pub async fn run_training_and_prediction(&mut self, asset: &str) -> RunOutcome {
        info!("Pipeline: end-to-end run for {} via {}", asset, self.source.name());
        match self.train_and_predict(asset).await {
            Ok(signal) => {
                info!(
                    "Pipeline: {} {} (forecast {:+.4}%, threshold {:.4}%)",
                    signal.asset,
                    signal.direction,
                    signal.predicted_return * 100.0,
                    signal.threshold * 100.0
                );
                RunOutcome::Success(SignalReport::from(&signal))
            }
            Err(e) => {
                error!("Pipeline: run for {} failed: {}", asset, e);
                RunOutcome::failed(&e)
            }
        }
    }

    async fn train_and_predict(&mut self, asset: &str) -> PipelineResult<Signal> {
        let assets = [asset.to_string()];
        let inputs = self.fetch_inputs(&assets, self.config.data.daily_lookback).await?;
        let matrix = self.builder.build(&inputs.feature_inputs(), &assets)?;
        let target = TargetSeries::from_matrix(&matrix, asset)?;
        let feature_names = matrix.contract_columns_for(asset);

        let mut trainer = new_trainer(&self.config);
        let volatility = trainer
            .train(&matrix, &target, &feature_names, TrainOptions { persist: false })?
            .metadata
            .target_volatility;
        let forecast = trainer
            .predict(&matrix, FillPolicy::Zero)?
            .ok_or_else(|| PipelineError::insufficient(format!("no feature rows for {}", asset)))?;

        self.signal_for(&matrix, asset, forecast, volatility)
    }

    /// Scheduled training job: fits the training asset and stores the model.
    pub async fn run_training(&mut self) -> PipelineResult<TrainingSummary> {
        let asset = self.config.data.training_asset.clone();
        let assets = [asset.clone()];
        info!("Pipeline: training job for {}", asset);

        let inputs = self.fetch_inputs(&assets, self.config.data.daily_lookback).await?;
        let matrix = self.builder.build(&inputs.feature_inputs(), &assets)?;
        let target = TargetSeries::from_matrix(&matrix, &asset)?;
        let feature_names = matrix.contract_columns_for(&asset);
        let model_path = self.trainer.store().model_path().display().to_string();

        let model = self
            .trainer
            .train(&matrix, &target, &feature_names, TrainOptions { persist: true })?;
        Ok(TrainingSummary {
            model_id: model.artifact_id.to_string(),
            model_path,
            feature_count: model.contract.len(),
            metadata: model.metadata.clone(),
        })
    }

    /// Scores every configured asset with the stored model, re-read from the
    /// store on every call.
    ///
    /// Each asset's columns are renamed to the training asset's prefix before
    /// prediction; assets that cannot be scored are listed in `failures`.
    pub async fn run_batch_prediction(&mut self) -> PipelineResult<PredictionReport> {
        let (model_id, contract, stored_asset) = {
            let model = self.trainer.load_model()?;
            (
                model.artifact_id.to_string(),
                model.contract.clone(),
                model.metadata.training_asset.clone(),
            )
        };
        let training_asset = contract.training_asset().unwrap_or(stored_asset);

        let assets = self.config.data.assets.clone();
        let inputs = self.fetch_inputs(&assets, self.config.data.forecast_lookback).await?;
        let matrix = self.builder.build(&inputs.feature_inputs(), &assets)?;

        let mut signals = Vec::new();
        let mut failures = Vec::new();
        for asset in &assets {
            match self.score_asset(&matrix, &contract, asset) {
                Ok(signal) => signals.push(signal),
                Err(e) => {
                    warn!("Pipeline: cannot score {}: {}", asset, e);
                    failures.push(AssetFailure {
                        asset: asset.clone(),
                        error: e.to_string(),
                        kind: e.kind().to_string(),
                    });
                }
            }
        }

        signals.sort_by(|a, b| b.predicted_return.total_cmp(&a.predicted_return));
        let best_pick = signals
            .first()
            .filter(|s| s.direction == Direction::Bullish)
            .map(SignalReport::from);
        match &best_pick {
            Some(pick) => info!("Pipeline: best pick {} ({:+.4}%)", pick.ticker, pick.predicted_pct),
            None => info!("Pipeline: no bullish asset, no pick"),
        }

        Ok(PredictionReport {
            generated_at: Utc::now(),
            model_id,
            training_asset,
            signals: signals.iter().map(SignalReport::from).collect(),
            best_pick,
            failures,
        })
    }

    fn score_asset(
        &mut self,
        matrix: &FeatureMatrix,
        contract: &FeatureContract,
        asset: &str,
    ) -> PipelineResult<Signal> {
        if !matrix.assets().contains(&asset) {
            return Err(PipelineError::data_unavailable(asset, "no feature columns built"));
        }
        let adapted = contract.adapt(matrix, asset)?;
        let forecast = self
            .trainer
            .predict(&adapted, FillPolicy::Zero)?
            .ok_or_else(|| PipelineError::insufficient(format!("no feature rows for {}", asset)))?;
        let volatility = TargetSeries::from_matrix(matrix, asset)?.volatility();
        self.signal_for(matrix, asset, forecast, volatility)
    }

    fn signal_for(
        &self,
        matrix: &FeatureMatrix,
        asset: &str,
        forecast: f64,
        volatility: Option<f64>,
    ) -> PipelineResult<Signal> {
        let price = matrix
            .last_value(&FeatureKey::asset(asset, Indicator::Close))
            .ok_or_else(|| PipelineError::data_unavailable(asset, "no latest close"))?;
        let atr = matrix.last_value(&FeatureKey::asset(
            asset,
            Indicator::Atr(self.config.features.atr_period),
        ));

        Ok(generate_signal(
            SignalInputs {
                asset,
                predicted_return: forecast,
                volatility,
                atr,
                price,
            },
            &self.config.signal,
        ))
    }

    async fn fetch_inputs(&self, assets: &[String], daily_lookback: usize) -> PipelineResult<MarketInputs> {
        let data = &self.config.data;
        let daily = self.source.fetch(assets, daily_lookback, Frequency::OneDay).await?;

        let weekly = if data.enable_weekly {
            self.fetch_optional(assets, data.weekly_lookback, Frequency::OneWeek).await
        } else {
            None
        };
        let intraday = if data.enable_intraday {
            self.fetch_optional(assets, data.intraday_lookback, Frequency::OneHour).await
        } else {
            None
        };
        let exogenous = if data.exogenous_symbols.is_empty() {
            None
        } else {
            self.fetch_optional(&data.exogenous_symbols, daily_lookback, Frequency::OneDay)
                .await
        };

        Ok(MarketInputs {
            daily,
            weekly,
            intraday,
            exogenous,
        })
    }

    /// Enricher inputs are best effort; a failed fetch drops the stage.
    async fn fetch_optional(&self, assets: &[String], lookback: usize, frequency: Frequency) -> Option<PriceFrame> {
        match self.source.fetch(assets, lookback, frequency).await {
            Ok(frame) => Some(frame),
            Err(e) => {
                warn!("Pipeline: {} frame unavailable, continuing without it: {}", frequency, e);
                None
            }
        }
    }
}

fn new_trainer(config: &PipelineConfig) -> ModelTrainer {
    ModelTrainer::new(config.model.model_path.clone(), config.model.gbm.clone())
        .with_signal_config(config.signal.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::trading::signal::SignalConfig;

    #[test]
    fn test_outcome_serialization_shapes() {
        let signal = generate_signal(
            SignalInputs {
                asset: "BTCUSDT",
                predicted_return: 0.015,
                volatility: Some(0.02),
                atr: Some(100.0),
                price: 50_000.0,
            },
            &SignalConfig::default(),
        );
        let json = serde_json::to_value(RunOutcome::Success(SignalReport::from(&signal))).unwrap();
        assert_eq!(json["ticker"], "BTCUSDT");
        assert_eq!(json["direction"], "BULLISH");
        assert_eq!(json["stop_loss"], 49_850.0);
        assert_eq!(json["take_profit"], 50_200.0);

        let failed = RunOutcome::failed(&PipelineError::model_not_found("no artifact"));
        let json = serde_json::to_value(&failed).unwrap();
        assert_eq!(json["kind"], "ModelNotFound");
        assert!(json["error"].as_str().unwrap().contains("no artifact"));
        assert!(!failed.is_success());
    }

    #[test]
    fn test_neutral_levels_serialize_as_null() {
        let signal = generate_signal(
            SignalInputs {
                asset: "ETHUSDT",
                predicted_return: 0.001,
                volatility: Some(0.02),
                atr: None,
                price: 3_000.0,
            },
            &SignalConfig::default(),
        );
        let json = serde_json::to_value(SignalReport::from(&signal)).unwrap();
        assert_eq!(json["direction"], "NEUTRAL");
        assert!(json["stop_loss"].is_null());
        assert!(json["take_profit"].is_null());
    }
}
