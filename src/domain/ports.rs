use crate::domain::errors::PipelineResult;
use crate::domain::market::price_frame::PriceFrame;
use crate::domain::market::timeframe::Frequency;
use async_trait::async_trait;

/// Supplier of aligned OHLCV frames.
///
/// Implementations own retries; an error means the data could not be obtained
/// at all and is reported as `PipelineError::DataUnavailable`.
#[async_trait]
pub trait PriceSource: Send + Sync {
    /// Latest `lookback` bars of every asset at `frequency`, aligned into one frame.
    async fn fetch(
        &self,
        assets: &[String],
        lookback: usize,
        frequency: Frequency,
    ) -> PipelineResult<PriceFrame>;

    fn name(&self) -> &str;
}
