#![allow(dead_code)]

use crypto_signal::application::ml::gradient_boosting::GbmParams;
use crypto_signal::domain::market::price_frame::{Candle, PriceFrame};
use crypto_signal::domain::market::timeframe::Frequency;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

pub const HOUR: i64 = 3_600_000;
pub const DAY: i64 = 24 * HOUR;
// 2024-01-01, a Monday
pub const START: i64 = 1_704_067_200_000;

/// Seeded random walk of daily bars
pub fn daily_candles(symbol: &str, days: usize, start_price: f64, seed: u64) -> Vec<Candle> {
    candles_every(symbol, DAY, days, start_price, seed)
}

/// Seeded random walk of `count` bars opening every `step` ms from `START`
pub fn candles_every(symbol: &str, step: i64, count: usize, start_price: f64, seed: u64) -> Vec<Candle> {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut close = start_price;
    (0..count)
        .map(|d| {
            let open = close;
            close = open * rng.random_range(-0.03..0.03_f64).exp();
            Candle {
                symbol: symbol.to_string(),
                open,
                high: open.max(close) * 1.01,
                low: open.min(close) * 0.99,
                close,
                volume: rng.random_range(1_000.0..5_000.0),
                timestamp: START + d as i64 * step,
            }
        })
        .collect()
}

pub fn daily_frame(assets: &[(&str, f64)], days: usize) -> PriceFrame {
    let candles = assets
        .iter()
        .enumerate()
        .flat_map(|(i, (symbol, price))| daily_candles(symbol, days, *price, 7 + i as u64));
    PriceFrame::from_candles(Frequency::OneDay, candles)
}

/// Small booster settings so tests stay fast
pub fn quick_gbm() -> GbmParams {
    GbmParams {
        max_rounds: 60,
        learning_rate: 0.1,
        min_samples_leaf: 5,
        min_samples_split: 10,
        early_stopping_rounds: 15,
        ..GbmParams::default()
    }
}
