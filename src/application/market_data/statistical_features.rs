//! Rolling statistics over series with explicit gaps.
//!
//! A window that contains a missing value yields a missing result, and so
//! does a window that is not yet full.

use statrs::statistics::{Data, Distribution};

/// Log return of consecutive values; the first element and any pair with a
/// missing or non-positive value are missing.
pub fn log_returns(values: &[Option<f64>]) -> Vec<Option<f64>> {
    let mut out = Vec::with_capacity(values.len());
    out.push(None);
    for pair in values.windows(2) {
        let ret = match (pair[0], pair[1]) {
            (Some(prev), Some(curr)) if prev > 0.0 && curr > 0.0 => Some((curr / prev).ln()),
            _ => None,
        };
        out.push(ret);
    }
    out.truncate(values.len());
    out
}

/// Applies `stat` to every full, gap-free trailing window.
pub fn rolling<F>(values: &[Option<f64>], window: usize, stat: F) -> Vec<Option<f64>>
where
    F: Fn(&[f64]) -> Option<f64>,
{
    if window == 0 {
        return vec![None; values.len()];
    }
    let mut buffer = Vec::with_capacity(window);
    (0..values.len())
        .map(|t| {
            if t + 1 < window {
                return None;
            }
            buffer.clear();
            for v in &values[t + 1 - window..=t] {
                buffer.push((*v)?);
            }
            stat(&buffer)
        })
        .collect()
}

pub fn rolling_mean(values: &[Option<f64>], window: usize) -> Vec<Option<f64>> {
    rolling(values, window, |w| Some(w.iter().sum::<f64>() / w.len() as f64))
}

/// Rolling sample standard deviation (n - 1 denominator)
pub fn rolling_std(values: &[Option<f64>], window: usize) -> Vec<Option<f64>> {
    rolling(values, window, sample_std)
}

/// Rolling Pearson correlation between each window and itself shifted by `lag`.
pub fn rolling_autocorr(values: &[Option<f64>], window: usize, lag: usize) -> Vec<Option<f64>> {
    rolling(values, window, |w| lag_autocorrelation(w, lag))
}

pub fn sample_std(values: &[f64]) -> Option<f64> {
    if values.len() < 2 {
        return None;
    }
    Data::new(values.to_vec())
        .std_dev()
        .filter(|s| s.is_finite())
}

/// Pearson correlation of `values[lag..]` with `values[..len - lag]`.
///
/// `None` when fewer than two pairs exist or either side is constant.
pub fn lag_autocorrelation(values: &[f64], lag: usize) -> Option<f64> {
    if values.len() < lag + 2 {
        return None;
    }
    let lead = &values[lag..];
    let lagged = &values[..values.len() - lag];
    let n = lead.len() as f64;

    let mean_a = lead.iter().sum::<f64>() / n;
    let mean_b = lagged.iter().sum::<f64>() / n;
    let mut cov = 0.0;
    let mut var_a = 0.0;
    let mut var_b = 0.0;
    for (a, b) in lead.iter().zip(lagged) {
        let da = a - mean_a;
        let db = b - mean_b;
        cov += da * db;
        var_a += da * da;
        var_b += db * db;
    }

    let denominator = (var_a * var_b).sqrt();
    if denominator < 1e-300 {
        return None;
    }
    Some(cov / denominator)
}

/// Per-group sample std of `(key, value)` pairs already sorted by key.
pub fn grouped_std<K: PartialEq + Copy>(pairs: &[(K, f64)]) -> Vec<(K, f64)> {
    let mut out = Vec::new();
    let mut start = 0;
    while start < pairs.len() {
        let key = pairs[start].0;
        let end = pairs[start..]
            .iter()
            .position(|(k, _)| *k != key)
            .map_or(pairs.len(), |offset| start + offset);
        let group: Vec<f64> = pairs[start..end].iter().map(|(_, v)| *v).collect();
        if let Some(std) = sample_std(&group) {
            out.push((key, std));
        }
        start = end;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn some(values: &[f64]) -> Vec<Option<f64>> {
        values.iter().map(|v| Some(*v)).collect()
    }

    #[test]
    fn test_log_returns() {
        let r = log_returns(&[Some(100.0), Some(110.0), None, Some(121.0)]);
        assert_eq!(r.len(), 4);
        assert_eq!(r[0], None);
        assert!((r[1].unwrap() - 1.1f64.ln()).abs() < 1e-15);
        assert_eq!(r[2], None);
        assert_eq!(r[3], None);
        assert!(log_returns(&[]).is_empty());
    }

    #[test]
    fn test_rolling_mean_warm_up_and_gaps() {
        let mut values = some(&[1.0, 2.0, 3.0, 4.0, 5.0]);
        values[3] = None;
        let m = rolling_mean(&values, 2);
        assert_eq!(m, vec![None, Some(1.5), Some(2.5), None, None]);
    }

    #[test]
    fn test_rolling_std_is_sample_std() {
        let s = rolling_std(&some(&[2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0]), 8);
        // Sample std of the classic example: sqrt(32 / 7)
        assert!((s[7].unwrap() - (32.0f64 / 7.0).sqrt()).abs() < 1e-12);
    }

    #[test]
    fn test_autocorrelation_alternating_series() {
        let values: Vec<f64> = (0..30).map(|i| if i % 2 == 0 { 1.0 } else { -1.0 }).collect();
        let ac = lag_autocorrelation(&values, 1).unwrap();
        assert!((ac + 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_autocorrelation_constant_series_is_undefined() {
        assert_eq!(lag_autocorrelation(&[1.0; 10], 1), None);
    }

    #[test]
    fn test_grouped_std() {
        let pairs = vec![(1, 1.0), (1, 3.0), (2, 5.0), (3, 1.0), (3, 1.0)];
        let out = grouped_std(&pairs);
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].0, 1);
        assert!((out[0].1 - 2f64.sqrt()).abs() < 1e-12);
        assert_eq!(out[1], (3, 0.0));
    }
}
