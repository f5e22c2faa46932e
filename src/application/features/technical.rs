use super::FeatureConfig;
use crate::domain::errors::{PipelineError, PipelineResult};
use ta::Next;
use ta::indicators::{
    AverageTrueRange, BollingerBands, ExponentialMovingAverage, MovingAverageConvergenceDivergence,
    RelativeStrengthIndex, SimpleMovingAverage,
};

/// High/low/close triple fed to range-based indicators
struct Bar {
    high: f64,
    low: f64,
    close: f64,
}

impl ta::High for Bar {
    fn high(&self) -> f64 {
        self.high
    }
}

impl ta::Low for Bar {
    fn low(&self) -> f64 {
        self.low
    }
}

impl ta::Close for Bar {
    fn close(&self) -> f64 {
        self.close
    }
}

/// Indicator output columns, aligned to the input rows
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TechnicalSeries {
    pub rsi: Vec<Option<f64>>,
    pub macd: Vec<Option<f64>>,
    pub macd_signal: Vec<Option<f64>>,
    pub macd_hist: Vec<Option<f64>>,
    pub sma: Vec<Option<f64>>,
    pub ema: Vec<Option<f64>>,
    pub bb_high: Vec<Option<f64>>,
    pub bb_low: Vec<Option<f64>>,
    pub atr: Vec<Option<f64>>,
}

/// Streaming indicator state for one asset.
///
/// Rows with a missing close are skipped (the state does not advance) and
/// produce missing outputs; so do rows before an indicator's warm-up is
/// complete.
pub struct TechnicalIndicators {
    rsi: RelativeStrengthIndex,
    macd: MovingAverageConvergenceDivergence,
    sma: SimpleMovingAverage,
    ema: ExponentialMovingAverage,
    bb: BollingerBands,
    atr: AverageTrueRange,
    config: FeatureConfig,
    close_count: usize,
    range_count: usize,
}

impl TechnicalIndicators {
    pub fn new(config: &FeatureConfig) -> PipelineResult<Self> {
        let invalid = |name: &str, e: ta::errors::TaError| {
            PipelineError::invalid_config(format!("{} parameters rejected: {:?}", name, e))
        };

        Ok(Self {
            rsi: RelativeStrengthIndex::new(config.rsi_period).map_err(|e| invalid("RSI", e))?,
            macd: MovingAverageConvergenceDivergence::new(
                config.macd_fast_period,
                config.macd_slow_period,
                config.macd_signal_period,
            )
            .map_err(|e| invalid("MACD", e))?,
            sma: SimpleMovingAverage::new(config.sma_period).map_err(|e| invalid("SMA", e))?,
            ema: ExponentialMovingAverage::new(config.ema_period).map_err(|e| invalid("EMA", e))?,
            bb: BollingerBands::new(config.bb_period, config.bb_std_dev)
                .map_err(|e| invalid("Bollinger", e))?,
            atr: AverageTrueRange::new(config.atr_period).map_err(|e| invalid("ATR", e))?,
            config: config.clone(),
            close_count: 0,
            range_count: 0,
        })
    }

    /// Runs every indicator over aligned close/high/low columns.
    pub fn compute(
        mut self,
        close: &[Option<f64>],
        high: &[Option<f64>],
        low: &[Option<f64>],
    ) -> TechnicalSeries {
        let n = close.len();
        let mut out = TechnicalSeries {
            rsi: Vec::with_capacity(n),
            macd: Vec::with_capacity(n),
            macd_signal: Vec::with_capacity(n),
            macd_hist: Vec::with_capacity(n),
            sma: Vec::with_capacity(n),
            ema: Vec::with_capacity(n),
            bb_high: Vec::with_capacity(n),
            bb_low: Vec::with_capacity(n),
            atr: Vec::with_capacity(n),
        };

        for t in 0..n {
            let row = close[t].map(|c| self.next_close(c));
            let (rsi, macd, macd_signal, macd_hist, sma, ema, bb_high, bb_low) =
                row.unwrap_or_default();
            out.rsi.push(rsi);
            out.macd.push(macd);
            out.macd_signal.push(macd_signal);
            out.macd_hist.push(macd_hist);
            out.sma.push(sma);
            out.ema.push(ema);
            out.bb_high.push(bb_high);
            out.bb_low.push(bb_low);

            let atr = match (high.get(t).copied().flatten(), low.get(t).copied().flatten(), close[t]) {
                (Some(high), Some(low), Some(close)) => self.next_range(Bar { high, low, close }),
                _ => None,
            };
            out.atr.push(atr);
        }
        out
    }

    #[allow(clippy::type_complexity)]
    fn next_close(
        &mut self,
        close: f64,
    ) -> (
        Option<f64>,
        Option<f64>,
        Option<f64>,
        Option<f64>,
        Option<f64>,
        Option<f64>,
        Option<f64>,
        Option<f64>,
    ) {
        self.close_count += 1;
        let seen = self.close_count;
        let cfg = &self.config;
        let ready = |warm_up: usize, value: f64| (seen >= warm_up).then_some(value);

        let rsi = self.rsi.next(close);
        let macd = self.macd.next(close);
        let sma = self.sma.next(close);
        let ema = self.ema.next(close);
        let bb = self.bb.next(close);

        // RSI needs `period` price changes, the MACD signal line needs a full
        // slow EMA before its own window starts filling.
        let signal_warm_up = cfg.macd_slow_period + cfg.macd_signal_period - 1;
        (
            ready(cfg.rsi_period + 1, rsi),
            ready(cfg.macd_slow_period, macd.macd),
            ready(signal_warm_up, macd.signal),
            ready(signal_warm_up, macd.histogram),
            ready(cfg.sma_period, sma),
            ready(cfg.ema_period, ema),
            ready(cfg.bb_period, bb.upper),
            ready(cfg.bb_period, bb.lower),
        )
    }

    fn next_range(&mut self, bar: Bar) -> Option<f64> {
        self.range_count += 1;
        let atr = self.atr.next(&bar);
        (self.range_count >= self.config.atr_period).then_some(atr)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn closes(n: usize) -> Vec<Option<f64>> {
        (0..n).map(|i| Some(100.0 + (i as f64 * 0.7).sin() * 5.0)).collect()
    }

    #[test]
    fn test_warm_up_periods() {
        let close = closes(60);
        let high: Vec<Option<f64>> = close.iter().map(|c| c.map(|c| c + 1.0)).collect();
        let low: Vec<Option<f64>> = close.iter().map(|c| c.map(|c| c - 1.0)).collect();
        let config = FeatureConfig::default();

        let series = TechnicalIndicators::new(&config)
            .unwrap()
            .compute(&close, &high, &low);

        assert_eq!(series.rsi.iter().position(Option::is_some), Some(14));
        assert_eq!(series.macd.iter().position(Option::is_some), Some(25));
        assert_eq!(series.macd_signal.iter().position(Option::is_some), Some(33));
        assert_eq!(series.sma.iter().position(Option::is_some), Some(19));
        assert_eq!(series.bb_high.iter().position(Option::is_some), Some(19));
        assert_eq!(series.atr.iter().position(Option::is_some), Some(13));
        assert!(series.rsi[59].unwrap() > 0.0 && series.rsi[59].unwrap() < 100.0);
        assert!(series.bb_high[59].unwrap() > series.bb_low[59].unwrap());
    }

    #[test]
    fn test_constant_range_gives_constant_atr() {
        let close: Vec<Option<f64>> = vec![Some(100.0); 30];
        let high: Vec<Option<f64>> = vec![Some(101.0); 30];
        let low: Vec<Option<f64>> = vec![Some(99.0); 30];

        let series = TechnicalIndicators::new(&FeatureConfig::default())
            .unwrap()
            .compute(&close, &high, &low);
        assert!((series.atr[29].unwrap() - 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_missing_rows_do_not_advance_state() {
        let mut close = closes(40);
        close[30] = None;
        let series = TechnicalIndicators::new(&FeatureConfig::default())
            .unwrap()
            .compute(&close, &close, &close);
        assert_eq!(series.sma[30], None);
        assert_eq!(series.atr[30], None);
        assert!(series.sma[31].is_some());
    }

    #[test]
    fn test_invalid_period_is_config_error() {
        let config = FeatureConfig {
            rsi_period: 0,
            ..FeatureConfig::default()
        };
        match TechnicalIndicators::new(&config) {
            Err(e) => assert_eq!(e.kind(), "InvalidConfig"),
            Ok(_) => panic!("zero RSI period must be rejected"),
        }
    }
}
