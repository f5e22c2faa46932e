//! Feature Builder: raw price frames to one model-ready [`FeatureMatrix`].
//!
//! Every asset gets a self-contained block of `<asset>_<indicator>` columns.
//! Keeping the blocks independent is what lets one model trained on asset A
//! score asset B after B's prefix is renamed to A's.

pub mod enrichment;
pub mod technical;

use crate::application::market_data::statistical_features::{
    log_returns, rolling_autocorr, rolling_mean, rolling_std,
};
use crate::domain::errors::{PipelineError, PipelineResult};
use crate::domain::market::price_frame::{PriceField, PriceFrame};
use crate::domain::ml::feature_matrix::{FeatureColumn, FeatureMatrix};
use crate::domain::ml::feature_registry::{FeatureKey, Indicator};
use enrichment::{Enrichment, SkipReason};
use serde::{Deserialize, Serialize};
use technical::TechnicalIndicators;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureConfig {
    pub short_window: usize,
    pub long_window: usize,
    pub autocorr_window: usize,
    pub autocorr_lag: usize,
    pub rsi_period: usize,
    pub macd_fast_period: usize,
    pub macd_slow_period: usize,
    pub macd_signal_period: usize,
    pub sma_period: usize,
    pub ema_period: usize,
    pub bb_period: usize,
    pub bb_std_dev: f64,
    pub atr_period: usize,
}

impl Default for FeatureConfig {
    fn default() -> Self {
        Self {
            short_window: 7,
            long_window: 21,
            autocorr_window: 30,
            autocorr_lag: 1,
            rsi_period: 14,
            macd_fast_period: 12,
            macd_slow_period: 26,
            macd_signal_period: 9,
            sma_period: 20,
            ema_period: 20,
            bb_period: 20,
            bb_std_dev: 2.0,
            atr_period: 14,
        }
    }
}

/// Frames one build draws from. Only the daily frame is required.
#[derive(Debug, Clone, Copy)]
pub struct FeatureInputs<'a> {
    pub daily: &'a PriceFrame,
    pub weekly: Option<&'a PriceFrame>,
    pub intraday: Option<&'a PriceFrame>,
    pub exogenous: Option<&'a PriceFrame>,
}

impl<'a> FeatureInputs<'a> {
    pub fn daily_only(daily: &'a PriceFrame) -> Self {
        Self {
            daily,
            weekly: None,
            intraday: None,
            exogenous: None,
        }
    }
}

pub struct FeatureBuilder {
    config: FeatureConfig,
}

impl FeatureBuilder {
    pub fn new(config: FeatureConfig) -> Self {
        Self { config }
    }

    /// Indicators every asset block carries, in column order, before the
    /// optional weekly and intraday enrichers.
    pub fn base_indicators(&self) -> Vec<Indicator> {
        let c = &self.config;
        vec![
            Indicator::Close,
            Indicator::High,
            Indicator::Low,
            Indicator::Volume,
            Indicator::LogReturn,
            Indicator::RollingMean(c.short_window),
            Indicator::RollingStd(c.short_window),
            Indicator::RollingMean(c.long_window),
            Indicator::RollingStd(c.long_window),
            Indicator::Autocorr(c.autocorr_lag),
            Indicator::Rsi(c.rsi_period),
            Indicator::Macd,
            Indicator::MacdSignal,
            Indicator::MacdHist,
            Indicator::Sma(c.sma_period),
            Indicator::Ema(c.ema_period),
            Indicator::BollingerHigh,
            Indicator::BollingerLow,
            Indicator::Atr(c.atr_period),
        ]
    }

    /// Builds the feature matrix for `assets` on the daily index.
    ///
    /// An asset whose daily data cannot be located is skipped with a warning;
    /// the batch fails only when no asset could be built at all.
    pub fn build(&self, inputs: &FeatureInputs<'_>, assets: &[String]) -> PipelineResult<FeatureMatrix> {
        let index = inputs.daily.index().to_vec();
        let mut blocks = Vec::with_capacity(assets.len() + 1);

        for asset in assets {
            match self.build_asset(inputs, asset) {
                Ok(block) => blocks.push(block),
                Err(
                    e @ (PipelineError::FeatureGap { .. }
                    | PipelineError::DataUnavailable { .. }
                    | PipelineError::InsufficientData { .. }),
                ) => {
                    warn!("FeatureBuilder: skipping {}: {}", asset, e);
                }
                Err(e) => return Err(e),
            }
        }

        if blocks.is_empty() {
            return Err(PipelineError::data_unavailable(
                assets.join(","),
                "none of the requested assets has daily data",
            ));
        }

        let shared = enrichment::exogenous_closes(inputs.daily, inputs.exogenous)?;
        if !shared.is_empty() {
            debug!("FeatureBuilder: joined {} exogenous columns", shared.len());
            blocks.push(FeatureMatrix::from_columns(index.clone(), shared)?);
        }

        let matrix = FeatureMatrix::concat(index, blocks)?;
        info!(
            "FeatureBuilder: built {} rows x {} columns for {:?}",
            matrix.len(),
            matrix.width(),
            matrix.assets()
        );
        Ok(matrix)
    }

    /// One asset's self-contained feature block.
    pub fn build_asset(&self, inputs: &FeatureInputs<'_>, asset: &str) -> PipelineResult<FeatureMatrix> {
        let daily = inputs.daily;
        let close = daily.require(asset, PriceField::Close)?;
        let high = daily.require(asset, PriceField::High)?;
        let low = daily.require(asset, PriceField::Low)?;
        let volume = daily.require(asset, PriceField::Volume)?;
        if close.iter().all(Option::is_none) {
            return Err(PipelineError::data_unavailable(asset, "daily close series is empty"));
        }

        let c = &self.config;
        let logret = log_returns(close);
        let technical = TechnicalIndicators::new(c)?.compute(close, high, low);

        let returns_std_short = rolling_std(&logret, c.short_window);
        let returns_std_long = rolling_std(&logret, c.long_window);
        let autocorr = rolling_autocorr(&logret, c.autocorr_window, c.autocorr_lag);

        let key = |indicator: Indicator| FeatureKey::asset(asset, indicator);
        let mut columns = vec![
            FeatureColumn::new(key(Indicator::Close), close.to_vec()),
            FeatureColumn::new(key(Indicator::High), high.to_vec()),
            FeatureColumn::new(key(Indicator::Low), low.to_vec()),
            FeatureColumn::new(key(Indicator::Volume), volume.to_vec()),
            FeatureColumn::new(key(Indicator::LogReturn), logret),
            FeatureColumn::new(
                key(Indicator::RollingMean(c.short_window)),
                rolling_mean(close, c.short_window),
            ),
            FeatureColumn::new(key(Indicator::RollingStd(c.short_window)), returns_std_short),
            FeatureColumn::new(
                key(Indicator::RollingMean(c.long_window)),
                rolling_mean(close, c.long_window),
            ),
            FeatureColumn::new(key(Indicator::RollingStd(c.long_window)), returns_std_long),
            FeatureColumn::new(key(Indicator::Autocorr(c.autocorr_lag)), autocorr),
            FeatureColumn::new(key(Indicator::Rsi(c.rsi_period)), technical.rsi),
            FeatureColumn::new(key(Indicator::Macd), technical.macd),
            FeatureColumn::new(key(Indicator::MacdSignal), technical.macd_signal),
            FeatureColumn::new(key(Indicator::MacdHist), technical.macd_hist),
            FeatureColumn::new(key(Indicator::Sma(c.sma_period)), technical.sma),
            FeatureColumn::new(key(Indicator::Ema(c.ema_period)), technical.ema),
            FeatureColumn::new(key(Indicator::BollingerHigh), technical.bb_high),
            FeatureColumn::new(key(Indicator::BollingerLow), technical.bb_low),
            FeatureColumn::new(key(Indicator::Atr(c.atr_period)), technical.atr),
        ];

        for (stage, outcome) in [
            ("weekly", enrichment::weekly_close(daily, inputs.weekly, asset)?),
            (
                "intraday",
                enrichment::intraday_volatility(daily, inputs.intraday, asset)?,
            ),
        ] {
            match outcome {
                Enrichment::Joined(column) => columns.push(column),
                Enrichment::Skipped(SkipReason::FrameNotSupplied) => {
                    debug!("FeatureBuilder: {} stage not requested for {}", stage, asset);
                }
                Enrichment::Skipped(SkipReason::AssetAbsent) => {
                    warn!("FeatureBuilder: {} frame has no data for {}", stage, asset);
                }
            }
        }

        FeatureMatrix::from_columns(daily.index().to_vec(), columns)
    }
}
