use approx::assert_relative_eq;
use crypto_signal::domain::trading::signal::{Direction, SignalConfig, SignalInputs, generate_signal};

fn direction(r: f64, sigma: f64) -> Direction {
    generate_signal(
        SignalInputs {
            asset: "ETHUSDT",
            predicted_return: r,
            volatility: Some(sigma),
            atr: Some(10.0),
            price: 2_000.0,
        },
        &SignalConfig::default(),
    )
    .direction
}

#[test]
fn test_threshold_is_half_sigma() {
    let config = SignalConfig::default();
    for sigma in [0.005, 0.02, 0.1] {
        assert_relative_eq!(config.threshold(Some(sigma)), 0.5 * sigma);
    }
}

#[test]
fn test_raising_sigma_never_flips_direction() {
    let forecasts = [-0.08, -0.02, -0.004, 0.0, 0.003, 0.012, 0.05];
    for r in forecasts {
        let mut previous = direction(r, 0.001);
        for step in 1..200 {
            let sigma = 0.001 + step as f64 * 0.001;
            let current = direction(r, sigma);
            if current != previous {
                assert_eq!(current, Direction::Neutral, "r={} sigma={}", r, sigma);
            }
            previous = current;
        }
    }
}

#[test]
fn test_reference_levels() {
    let inputs = |r: f64| SignalInputs {
        asset: "BTCUSDT",
        predicted_return: r,
        volatility: Some(0.02),
        atr: Some(100.0),
        price: 50_000.0,
    };
    let config = SignalConfig::default();

    let bull = generate_signal(inputs(0.015), &config);
    assert_eq!(bull.direction, Direction::Bullish);
    assert_relative_eq!(bull.stop_loss.unwrap(), 49_850.0);
    assert_relative_eq!(bull.take_profit.unwrap(), 50_200.0);
    assert_relative_eq!(bull.predicted_price(), 50_000.0 * 0.015_f64.exp());

    let bear = generate_signal(inputs(-0.02), &config);
    assert_eq!(bear.direction, Direction::Bearish);
    assert_relative_eq!(bear.stop_loss.unwrap(), 50_150.0);
    assert_relative_eq!(bear.take_profit.unwrap(), 49_800.0);

    let flat = generate_signal(inputs(0.005), &config);
    assert_eq!(flat.direction, Direction::Neutral);
    assert!(flat.stop_loss.is_none() && flat.take_profit.is_none());
}
