use crate::domain::errors::{PipelineError, PipelineResult};
use crate::domain::market::price_frame::{Candle, PriceFrame};
use crate::domain::market::timeframe::Frequency;
use crate::domain::ports::PriceSource;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::debug;

/// Price source backed by candles held in memory, for tests and offline runs.
#[derive(Default)]
pub struct InMemoryPriceSource {
    candles: HashMap<Frequency, Vec<Candle>>,
    fetch_count: AtomicUsize,
}

impl InMemoryPriceSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_candles(mut self, frequency: Frequency, candles: impl IntoIterator<Item = Candle>) -> Self {
        self.candles.entry(frequency).or_default().extend(candles);
        self
    }

    /// Number of `fetch` calls served so far
    pub fn fetch_count(&self) -> usize {
        self.fetch_count.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl PriceSource for InMemoryPriceSource {
    async fn fetch(
        &self,
        assets: &[String],
        lookback: usize,
        frequency: Frequency,
    ) -> PipelineResult<PriceFrame> {
        self.fetch_count.fetch_add(1, Ordering::Relaxed);
        let stored = self.candles.get(&frequency).map(Vec::as_slice).unwrap_or_default();

        let mut selected = Vec::new();
        for asset in assets {
            let mut bars: Vec<&Candle> = stored.iter().filter(|c| &c.symbol == asset).collect();
            bars.sort_by_key(|c| c.timestamp);
            let skip = bars.len().saturating_sub(lookback);
            selected.extend(bars.into_iter().skip(skip).cloned());
        }

        if selected.is_empty() {
            return Err(PipelineError::data_unavailable(
                assets.join(","),
                format!("no {} candles in memory", frequency),
            ));
        }
        debug!("InMemoryPriceSource: serving {} {} bars", selected.len(), frequency);
        Ok(PriceFrame::from_candles(frequency, selected))
    }

    fn name(&self) -> &str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candle(symbol: &str, ts: i64) -> Candle {
        Candle {
            symbol: symbol.to_string(),
            open: 1.0,
            high: 1.0,
            low: 1.0,
            close: ts as f64,
            volume: 1.0,
            timestamp: ts,
        }
    }

    #[tokio::test]
    async fn test_fetch_applies_lookback_per_asset() {
        let source = InMemoryPriceSource::new().with_candles(
            Frequency::OneDay,
            vec![candle("A", 3), candle("A", 1), candle("A", 2), candle("B", 2)],
        );
        let frame = source
            .fetch(&["A".to_string(), "B".to_string()], 2, Frequency::OneDay)
            .await
            .unwrap();
        assert_eq!(frame.index(), &[2, 3]);
        assert_eq!(frame.assets(), vec!["A", "B"]);
        assert_eq!(source.fetch_count(), 1);

        assert!(source.fetch(&["A".to_string()], 2, Frequency::OneWeek).await.is_err());
    }
}
